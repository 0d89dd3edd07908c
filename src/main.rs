mod api;
mod cli;
mod config;
mod engine;
mod error;
mod models;
mod service;
mod store;

use crate::cli::onboard::run_onboarding;
use crate::cli::{
    Cli, Commands, ConfigCommands, DumpCommands, StepCommands, TaskCommands, TaskFieldArgs, render,
};
use crate::config::{Config, StoreBackend};
use crate::engine::achievement;
use crate::engine::dashboard::TaskFilters;
use crate::engine::streak;
use crate::models::{BrainDumpDraft, Priority, StepDraft, TaskDraft};
use crate::service::Planner;
use crate::store::{Query, Table};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::Parser;
use dialoguer::Confirm;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let user = cli.user.as_deref();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(user),
        Commands::Doctor => handle_doctor(),
        Commands::Serve { port } => handle_serve(port).await,
        Commands::Task { command } => handle_task_command(command, user),
        Commands::Step { command } => handle_step_command(command, user),
        Commands::Dump { command } => handle_dump_command(command, user),
        Commands::Dashboard {
            energy,
            context,
            priority,
        } => handle_dashboard(user, energy, context, priority),
        Commands::Achievements => handle_achievements(user),
    }
}

/// Loaded config plus a planner bound to the acting user.
struct Session {
    config: Config,
    planner: Planner,
    user_id: String,
}

fn open_session(user: Option<&str>) -> Result<Session> {
    let config = load_config()?;
    let planner = Planner::new(store::open(&config)?, config.streak_rule);
    let user_id = user
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| config.user_id.clone());

    Ok(Session {
        config,
        planner,
        user_id,
    })
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let tasks = session.planner.list_tasks(&session.user_id)?;
    let completed = tasks.iter().filter(|task| task.is_completed()).count();
    let current_streak = session.planner.streak(&session.user_id)?;

    println!("TaskPulse status");
    println!("- store: {}", session.planner.backend());
    println!("- user_id: {}", session.user_id);
    println!("- active_tasks: {}", tasks.len() - completed);
    println!("- completed_tasks: {completed}");
    println!(
        "- streak: {}",
        current_streak
            .map(|current| {
                let state = if streak::is_active(&current, Utc::now()) {
                    "active"
                } else {
                    "inactive"
                };
                format!("{} ({state})", streak::days_label(current.count))
            })
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "- api_server: {}",
        if is_port_open(session.config.api_port) {
            format!("running on port {}", session.config.api_port)
        } else {
            "not running".to_string()
        }
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    if config.store == StoreBackend::Remote {
        if config.resolve_api_key().is_some() {
            println!("[OK] remote API key is configured");
        } else {
            println!("[WARN] remote store selected but no API key (config or TASKPULSE_API_KEY)");
            issues.push("remote api key missing".to_string());
        }
    }

    let probe = Query::new().eq("userId", config.user_id.as_str());
    match store::open(&config).and_then(|store| store.select(Table::Tasks, &probe)) {
        Ok(rows) => println!(
            "[OK] {} store reachable ({} task(s) for {})",
            config.store.as_str(),
            rows.len(),
            config.user_id
        ),
        Err(error) => {
            println!("[WARN] {} store check failed: {error}", config.store.as_str());
            issues.push("store unreachable".to_string());
        }
    }

    match models::validate_energy(config.default_energy) {
        Ok(level) => println!(
            "[OK] default energy: {level} ({})",
            models::energy_label(level)
        ),
        Err(error) => {
            println!("[WARN] invalid default_energy setting: {error}");
            issues.push("invalid default_energy".to_string());
        }
    }

    println!("[OK] streak rule: {}", config.streak_rule.as_str());

    if is_port_open(config.api_port) {
        println!("[OK] API server answering on port {}", config.api_port);
    } else {
        println!(
            "[OK] API port {} is free (start with `taskpulse serve`)",
            config.api_port
        );
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

async fn handle_serve(port: Option<u16>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(port) = port {
        config.api_port = port;
    }

    let planner = Planner::new(store::open(&config)?, config.streak_rule);
    info!(store = planner.backend(), user_id = %config.user_id, "starting API server");

    api::run_server(Arc::new(config), planner, async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    })
    .await
}

fn handle_task_command(command: TaskCommands, user: Option<&str>) -> Result<()> {
    let Session {
        config,
        planner,
        user_id,
    } = open_session(user)?;
    let now = Utc::now();

    match command {
        TaskCommands::Add { title, fields } => {
            let mut draft = TaskDraft {
                title,
                energy_level: config.default_energy,
                ..TaskDraft::default()
            };
            apply_task_fields(&mut draft, fields)?;

            let task = planner.create_task(&user_id, draft, now)?;
            println!("Task added: {}", render::task_line(&task, now));
        }
        TaskCommands::List {
            context,
            priority,
            all,
        } => {
            let filters = TaskFilters { context, priority };
            let view = planner.dashboard(&user_id, &filters, config.default_energy)?;

            println!("{}", render::task_list(&view.active, now));
            if all && !view.completed.is_empty() {
                println!("{}", render::task_list(&view.completed, now));
            }
        }
        TaskCommands::Show { id } => {
            let detail = planner.task_detail(&user_id, id)?;
            println!("{}", render::task_detail(&detail, now));
        }
        TaskCommands::Edit { id, title, fields } => {
            let current = planner.get_task(&user_id, id)?;
            let mut draft = TaskDraft::from(&current);
            if let Some(title) = title {
                draft.title = title;
            }
            apply_task_fields(&mut draft, fields)?;

            let task = planner.update_task(&user_id, id, draft)?;
            println!("Task updated: {}", render::task_line(&task, now));
        }
        TaskCommands::Done { id } => {
            let toggle = planner.toggle_task(&user_id, id, &Local::now())?;
            if !toggle.task.is_completed() {
                println!("Task reopened: {}", render::task_line(&toggle.task, now));
                return Ok(());
            }

            println!("Task completed: {}", render::task_line(&toggle.task, now));
            if let Some(entry) = toggle.achievement {
                println!("- achievement: {}", entry.description);
            }
            if let Some(current) = toggle.streak {
                println!(
                    "- streak: {} (next milestone {})",
                    streak::days_label(current.count),
                    streak::milestone_progress(current.count).label()
                );
            }
        }
        TaskCommands::Delete { id, yes } => {
            let task = planner.get_task(&user_id, id)?;
            if !yes && !confirm(&format!("Delete task #{id} \"{}\" and its steps?", task.title))? {
                println!("Cancelled");
                return Ok(());
            }

            planner.delete_task(&user_id, id)?;
            println!("Task deleted: #{id}");
        }
    }

    Ok(())
}

fn handle_step_command(command: StepCommands, user: Option<&str>) -> Result<()> {
    let Session {
        planner, user_id, ..
    } = open_session(user)?;

    match command {
        StepCommands::Add {
            task_id,
            title,
            description,
        } => {
            let step = planner.add_step(
                &user_id,
                task_id,
                StepDraft {
                    step_title: title,
                    step_description: description,
                },
            )?;
            println!("Step added: {}", render::step_line(&step));
        }
        StepCommands::Edit {
            step_id,
            title,
            description,
        } => {
            let step = planner.update_step(
                &user_id,
                step_id,
                StepDraft {
                    step_title: title,
                    step_description: description,
                },
            )?;
            println!("Step updated: {}", render::step_line(&step));
        }
        StepCommands::Done { step_id } => {
            let toggle = planner.toggle_step(&user_id, step_id)?;
            println!("{}", render::step_line(&toggle.step));
            if toggle.all_steps_completed {
                println!(
                    "All steps done. Run `taskpulse task done {}` to complete the task.",
                    toggle.step.task_id
                );
            }
        }
        StepCommands::Delete { step_id } => {
            planner.delete_step(&user_id, step_id)?;
            println!("Step deleted: #{step_id}");
        }
    }

    Ok(())
}

fn handle_dump_command(command: DumpCommands, user: Option<&str>) -> Result<()> {
    let Session {
        planner, user_id, ..
    } = open_session(user)?;

    match command {
        DumpCommands::Add { content } => {
            let dump = planner.create_brain_dump(
                &user_id,
                BrainDumpDraft {
                    content: content.join(" "),
                },
                Utc::now(),
            )?;
            println!("Brain dump saved: #{}", dump.id);
        }
        DumpCommands::List { full } => {
            let dumps = planner.list_brain_dumps(&user_id)?;
            println!("{}", render::brain_dumps(&dumps, full));
        }
        DumpCommands::Edit { id, content } => {
            planner.update_brain_dump(
                &user_id,
                id,
                BrainDumpDraft {
                    content: content.join(" "),
                },
            )?;
            println!("Brain dump updated: #{id}");
        }
        DumpCommands::Delete { id } => {
            planner.delete_brain_dump(&user_id, id)?;
            println!("Brain dump deleted: #{id}");
        }
    }

    Ok(())
}

fn handle_dashboard(
    user: Option<&str>,
    energy: Option<u8>,
    context: Option<String>,
    priority: Option<Priority>,
) -> Result<()> {
    let session = open_session(user)?;
    let energy = energy.unwrap_or(session.config.default_energy);
    let filters = TaskFilters { context, priority };

    let view = session
        .planner
        .dashboard(&session.user_id, &filters, energy)?;
    println!("{}", render::dashboard(&view, Utc::now()));

    Ok(())
}

fn handle_achievements(user: Option<&str>) -> Result<()> {
    let session = open_session(user)?;
    let report = session
        .planner
        .achievement_report(&session.user_id, Utc::now())?;
    let days = achievement::timeline(&report.achievements, &Local);

    println!("{}", render::achievements(&report.overview, &days));
    Ok(())
}

fn apply_task_fields(draft: &mut TaskDraft, fields: TaskFieldArgs) -> Result<()> {
    if let Some(description) = fields.description {
        draft.description = Some(description);
    }
    if let Some(priority) = fields.priority {
        draft.priority = priority;
    }
    if let Some(energy) = fields.energy {
        draft.energy_level = energy;
    }
    if let Some(importance) = fields.importance {
        draft.emotional_importance = importance;
    }
    if let Some(estimate) = fields.estimate {
        draft.estimated_time = Some(estimate);
    }
    if let Some(context) = fields.context {
        draft.context = context;
    }
    if let Some(due) = fields.due.as_deref() {
        draft.due_date = Some(parse_due(due)?);
    }
    if fields.clear_due {
        draft.due_date = None;
    }

    Ok(())
}

/// A bare date means the end of that day in local time.
fn parse_due(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(input) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid due date: {input}. Example: 2026-02-18"))?;

    let local = date
        .and_hms_opt(23, 59, 59)
        .context("Failed to create due timestamp")?
        .and_local_timezone(Local)
        .earliest()
        .context("Failed to convert due date to local time")?;

    Ok(local.with_timezone(&Utc))
}

fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    let config = Config::load()
        .with_context(|| "Config file not found. Run `taskpulse onboard` first.".to_string())?;

    if config.user_id.trim().is_empty() {
        bail!("user_id is empty. Run `taskpulse config set user_id <id>`.");
    }

    Ok(config)
}

fn is_port_open(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(250)).is_ok()
}
