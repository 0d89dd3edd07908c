use crate::engine::achievement::{AchievementDay, AchievementOverview};
use crate::engine::dashboard::DashboardView;
use crate::engine::streak;
use crate::models::{BrainDump, Task, TaskStep, energy_label};
use crate::service::TaskDetail;
use chrono::{DateTime, Local, Utc};

pub fn task_line(task: &Task, now: DateTime<Utc>) -> String {
    let check = if task.is_completed() { "x" } else { " " };
    let overdue = if task.is_overdue(now) { " OVERDUE" } else { "" };

    format!(
        "[{check}] #{} {} ({}, energy {}, {}){overdue}",
        task.id,
        task.title,
        task.priority.label(),
        task.energy_level,
        task.context
    )
}

pub fn task_list(tasks: &[Task], now: DateTime<Utc>) -> String {
    if tasks.is_empty() {
        return "- No tasks".to_string();
    }

    tasks
        .iter()
        .map(|task| task_line(task, now))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn task_detail(detail: &TaskDetail, now: DateTime<Utc>) -> String {
    let task = &detail.task;
    let mut lines = vec![
        task_line(task, now),
        format!(
            "- energy: {} ({})",
            task.energy_level,
            energy_label(task.energy_level)
        ),
        format!("- emotional importance: {}", task.emotional_importance),
        format!(
            "- estimate: {}",
            task.estimated_time
                .map(format_minutes)
                .unwrap_or_else(|| "none".to_string())
        ),
        format!(
            "- due: {}",
            task.due_date
                .map(local_time)
                .unwrap_or_else(|| "none".to_string())
        ),
        format!("- created: {}", local_time(task.created_at)),
    ];

    if let Some(completed_at) = task.completed_at {
        lines.push(format!("- completed: {}", local_time(completed_at)));
    }
    if let Some(description) = &task.description {
        lines.push(String::new());
        lines.push(description.clone());
    }

    lines.push(String::new());
    lines.push(format!(
        "Steps {}/{} ({}%)",
        detail.progress.completed, detail.progress.total, detail.progress.percent
    ));
    lines.push(step_list(&detail.steps));

    lines.join("\n")
}

pub fn step_line(step: &TaskStep) -> String {
    let check = if step.is_completed { "x" } else { " " };
    match &step.step_description {
        Some(description) => format!("[{check}] #{} {} - {description}", step.id, step.step_title),
        None => format!("[{check}] #{} {}", step.id, step.step_title),
    }
}

fn step_list(steps: &[TaskStep]) -> String {
    if steps.is_empty() {
        return "- No steps".to_string();
    }

    steps.iter().map(step_line).collect::<Vec<_>>().join("\n")
}

pub fn brain_dumps(dumps: &[BrainDump], full: bool) -> String {
    if dumps.is_empty() {
        return "- No brain dumps".to_string();
    }

    dumps
        .iter()
        .map(|dump| {
            let content = if full { dump.content.clone() } else { dump.preview() };
            format!("#{} {}\n{}", dump.id, local_time(dump.created_at), content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn dashboard(view: &DashboardView, now: DateTime<Utc>) -> String {
    let section = |title: String, tasks: &[Task]| format!("## {title}\n{}", task_list(tasks, now));

    [
        format!(
            "Progress: {}/{} completed ({}%)",
            view.completed_count,
            view.total,
            view.completion_percent()
        ),
        section(
            format!(
                "Matches your energy ({})",
                energy_label(view.energy_level)
            ),
            &view.energy_matched,
        ),
        section("Urgent".to_string(), &view.urgent),
        section("Quick wins".to_string(), &view.quick_wins),
        section(format!("Active ({})", view.active.len()), &view.active),
        section(
            format!("Completed ({})", view.completed.len()),
            &view.completed,
        ),
        format!("Contexts: {}", join_or_none(&view.contexts)),
    ]
    .join("\n\n")
}

pub fn achievements(
    overview: &AchievementOverview,
    days: &[AchievementDay],
) -> String {
    let streak_line = if overview.streak_count == 0 {
        "Streak: none yet".to_string()
    } else {
        let state = if overview.streak_active { "active" } else { "inactive" };
        let milestone = overview
            .milestone
            .map(|progress| format!(", next milestone {}", progress.label()))
            .unwrap_or_default();
        format!(
            "Streak: {} ({state}{milestone})",
            streak::days_label(overview.streak_count)
        )
    };

    let timeline = if days.is_empty() {
        "- No achievements yet".to_string()
    } else {
        days.iter()
            .map(|day| {
                let entries = day
                    .achievements
                    .iter()
                    .map(|entry| format!("- {}: {}", entry.title, entry.description))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("## {}\n{entries}", day.date.format("%Y-%m-%d"))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "Completed: {}/{} tasks ({}%)\n{streak_line}\nAchievements: {}\n\n{timeline}",
        overview.completed_tasks,
        overview.total_tasks,
        overview.completion_percent,
        overview.total_achievements
    )
}

pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let remain = minutes % 60;

    match (hours, remain) {
        (0, remain) => format!("{remain}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, remain) => format!("{hours}h {remain}m"),
    }
}

fn local_time(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}
