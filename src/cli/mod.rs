pub mod onboard;
pub mod render;

use crate::models::Priority;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "taskpulse",
    about = "Energy-aware task planner with streaks and achievements"
)]
pub struct Cli {
    /// Act as this user instead of the configured `user_id`.
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    /// Run the local JSON API until Ctrl+C.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    Step {
        #[command(subcommand)]
        command: StepCommands,
    },
    Dump {
        #[command(subcommand)]
        command: DumpCommands,
    },
    Dashboard {
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        energy: Option<u8>,
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    Achievements,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum TaskCommands {
    Add {
        title: String,
        #[command(flatten)]
        fields: TaskFieldArgs,
    },
    List {
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Include completed tasks.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    Show {
        id: i64,
    },
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: TaskFieldArgs,
    },
    /// Toggle between active and completed.
    Done {
        id: i64,
    },
    Delete {
        id: i64,
        #[arg(long, short, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct TaskFieldArgs {
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub energy: Option<u8>,
    /// Emotional importance, 0-100.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub importance: Option<u8>,
    /// Estimated minutes.
    #[arg(long)]
    pub estimate: Option<i64>,
    #[arg(long)]
    pub context: Option<String>,
    /// YYYY-MM-DD (end of that local day) or RFC 3339.
    #[arg(long)]
    pub due: Option<String>,
    /// Drop the due date.
    #[arg(long, default_value_t = false, conflicts_with = "due")]
    pub clear_due: bool,
}

#[derive(Debug, Subcommand)]
pub enum StepCommands {
    Add {
        task_id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    Edit {
        step_id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Toggle a step's completion.
    Done {
        step_id: i64,
    },
    Delete {
        step_id: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum DumpCommands {
    Add {
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
    List {
        /// Print full content instead of previews.
        #[arg(long, default_value_t = false)]
        full: bool,
    },
    Edit {
        id: i64,
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
    Delete {
        id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, TaskCommands};
    use crate::models::Priority;
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_task_add_with_fields() {
        let cli = Cli::try_parse_from([
            "taskpulse",
            "--user",
            "sam",
            "task",
            "add",
            "Renew passport",
            "--priority",
            "quick-win",
            "--energy",
            "2",
            "--due",
            "2026-03-01",
        ])
        .unwrap();

        assert_eq!(cli.user.as_deref(), Some("sam"));
        match cli.command {
            Commands::Task {
                command: TaskCommands::Add { title, fields },
            } => {
                assert_eq!(title, "Renew passport");
                assert_eq!(fields.priority, Some(Priority::QuickWin));
                assert_eq!(fields.energy, Some(2));
                assert_eq!(fields.due.as_deref(), Some("2026-03-01"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_energy_out_of_range() {
        assert!(Cli::try_parse_from(["taskpulse", "dashboard", "--energy", "6"]).is_err());
        assert!(Cli::try_parse_from(["taskpulse", "task", "list", "--priority", "someday"]).is_err());
    }
}
