use crate::models::{Priority, Task, TaskStep};
use serde::{Deserialize, Serialize};

pub const BUCKET_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskFilters {
    pub context: Option<String>,
    pub priority: Option<Priority>,
}

impl TaskFilters {
    fn matches(&self, task: &Task) -> bool {
        self.context
            .as_deref()
            .is_none_or(|context| task.context == context)
            && self.priority.is_none_or(|priority| task.priority == priority)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressVariant {
    Default,
    Warning,
    Success,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub energy_level: u8,
    pub energy_matched: Vec<Task>,
    pub urgent: Vec<Task>,
    pub quick_wins: Vec<Task>,
    pub active: Vec<Task>,
    pub completed: Vec<Task>,
    pub total: usize,
    pub completed_count: usize,
    pub completion_rate: f64,
    pub progress: ProgressVariant,
    pub contexts: Vec<String>,
    pub priorities: Vec<Priority>,
}

impl DashboardView {
    pub fn completion_percent(&self) -> u32 {
        (self.completion_rate * 100.0).round() as u32
    }
}

/// Buckets are computed independently over the same filtered pool, so a task
/// may show up in more than one of them. Input order is kept.
pub fn derive_view(tasks: &[Task], filters: &TaskFilters, energy_level: u8) -> DashboardView {
    let filtered = tasks
        .iter()
        .filter(|task| filters.matches(task))
        .collect::<Vec<_>>();

    let (completed, active): (Vec<&Task>, Vec<&Task>) =
        filtered.iter().copied().partition(|task| task.is_completed());

    let capped = |keep: &dyn Fn(&Task) -> bool| -> Vec<Task> {
        active
            .iter()
            .copied()
            .filter(|task| keep(task))
            .take(BUCKET_LIMIT)
            .cloned()
            .collect()
    };

    let energy_matched = capped(&|task: &Task| task.energy_level == energy_level);
    let urgent = capped(&|task: &Task| task.priority == Priority::Urgent);
    let quick_wins = capped(&|task: &Task| task.priority == Priority::QuickWin);

    let total = filtered.len();
    let completed_count = completed.len();
    let completion_rate = completion_rate(completed_count, total);

    DashboardView {
        energy_level,
        energy_matched,
        urgent,
        quick_wins,
        active: active.into_iter().cloned().collect(),
        completed: completed.into_iter().cloned().collect(),
        total,
        completed_count,
        completion_rate,
        progress: progress_variant(completion_rate),
        contexts: distinct(tasks.iter().map(|task| task.context.clone())),
        priorities: distinct(tasks.iter().map(|task| task.priority)),
    }
}

pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }

    completed as f64 / total as f64
}

pub fn progress_variant(rate: f64) -> ProgressVariant {
    if rate > 0.75 {
        ProgressVariant::Success
    } else if rate > 0.25 {
        ProgressVariant::Warning
    } else {
        ProgressVariant::Default
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u32,
}

pub fn step_progress(steps: &[TaskStep]) -> StepProgress {
    let total = steps.len();
    let completed = steps.iter().filter(|step| step.is_completed).count();

    StepProgress {
        completed,
        total,
        percent: (completion_rate(completed, total) * 100.0).round() as u32,
    }
}

fn distinct<T: PartialEq>(values: impl Iterator<Item = T>) -> Vec<T> {
    values.fold(Vec::new(), |mut seen, value| {
        if !seen.contains(&value) {
            seen.push(value);
        }
        seen
    })
}
