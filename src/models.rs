use crate::error::{ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_USER_ID: &str = "single-user";
pub const MIN_ENERGY: u8 = 1;
pub const MAX_ENERGY: u8 = 5;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Urgent,
    Important,
    Medium,
    Low,
    QuickWin,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Urgent,
        Priority::Important,
        Priority::Medium,
        Priority::Low,
        Priority::QuickWin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::Important => "important",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::QuickWin => "quick-win",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Urgent => "Urgent",
            Priority::Important => "Important",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::QuickWin => "Quick Win",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ServiceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_lowercase().replace(['_', ' '], "-");
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == normalized)
            .ok_or_else(|| {
                ServiceError::validation(format!(
                    "Unknown priority: {raw}. Expected urgent|important|medium|low|quick-win"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Active => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Active,
        }
    }
}

pub fn energy_label(level: u8) -> &'static str {
    match level {
        1 => "Very Low",
        2 => "Low",
        3 => "Medium",
        4 => "High",
        5 => "Very High",
        _ => "Unknown",
    }
}

pub fn validate_energy(level: u8) -> ServiceResult<u8> {
    if (MIN_ENERGY..=MAX_ENERGY).contains(&level) {
        Ok(level)
    } else {
        Err(ServiceError::validation(format!(
            "Energy level must be between {MIN_ENERGY} and {MAX_ENERGY}, got {level}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: Priority,
    pub energy_level: u8,
    pub emotional_importance: u8,
    #[serde(default)]
    pub estimated_time: Option<i64>,
    #[serde(default)]
    pub actual_time: Option<i64>,
    pub context: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub user_id: String,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed() && self.due_date.is_some_and(|due| due < now)
    }
}

/// Editable task fields after validation. Serialized as-is for updates, so
/// cleared optionals are sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub energy_level: u8,
    pub emotional_importance: u8,
    pub estimated_time: Option<i64>,
    pub context: String,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(flatten)]
    pub fields: TaskFields,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub energy_level: u8,
    pub emotional_importance: u8,
    pub estimated_time: Option<i64>,
    pub context: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            priority: Priority::Medium,
            energy_level: 3,
            emotional_importance: 50,
            estimated_time: Some(30),
            context: "work".to_string(),
            due_date: None,
        }
    }
}

impl TaskDraft {
    pub fn validate(self) -> ServiceResult<TaskFields> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::validation("Title is required"));
        }

        let context = self.context.trim().to_string();
        if context.is_empty() {
            return Err(ServiceError::validation("Context is required"));
        }

        let energy_level = validate_energy(self.energy_level)?;

        if self.emotional_importance > 100 {
            return Err(ServiceError::validation(format!(
                "Emotional importance must be between 0 and 100, got {}",
                self.emotional_importance
            )));
        }

        if let Some(minutes) = self.estimated_time.filter(|minutes| *minutes < 0) {
            return Err(ServiceError::validation(format!(
                "Estimated time cannot be negative, got {minutes}"
            )));
        }

        Ok(TaskFields {
            title,
            description: non_blank(self.description),
            priority: self.priority,
            energy_level,
            emotional_importance: self.emotional_importance,
            estimated_time: self.estimated_time,
            context,
            due_date: self.due_date,
        })
    }
}

impl TaskDraft {
    /// Applies the fields present in a partial JSON body; absent fields keep
    /// their current value and an explicit `null` clears optional ones.
    pub fn merged(self, patch: &Value) -> ServiceResult<TaskDraft> {
        let changes = patch
            .as_object()
            .ok_or_else(|| ServiceError::validation("Task update must be a JSON object"))?;

        let mut current = serde_json::to_value(&self)
            .map_err(|error| ServiceError::validation(format!("Invalid task: {error}")))?;
        if let Some(fields) = current.as_object_mut() {
            fields.extend(changes.iter().map(|(key, value)| (key.clone(), value.clone())));
        }

        serde_json::from_value(current)
            .map_err(|error| ServiceError::validation(format!("Invalid task update: {error}")))
    }
}

impl From<&Task> for TaskDraft {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            energy_level: task.energy_level,
            emotional_importance: task.emotional_importance,
            estimated_time: task.estimated_time,
            context: task.context.clone(),
            due_date: task.due_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub id: i64,
    pub task_id: i64,
    pub step_title: String,
    #[serde(default)]
    pub step_description: Option<String>,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFields {
    pub step_title: String,
    pub step_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStep {
    pub task_id: i64,
    #[serde(flatten)]
    pub fields: StepFields,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepDraft {
    pub step_title: String,
    pub step_description: Option<String>,
}

impl StepDraft {
    pub fn validate(self) -> ServiceResult<StepFields> {
        let step_title = self.step_title.trim().to_string();
        if step_title.is_empty() {
            return Err(ServiceError::validation("Step title is required"));
        }

        Ok(StepFields {
            step_title,
            step_description: non_blank(self.step_description),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainDump {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
}

impl BrainDump {
    pub fn preview(&self) -> String {
        match self.content.char_indices().nth(PREVIEW_CHARS) {
            Some((cut, _)) => format!("{}...", &self.content[..cut]),
            None => self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBrainDump {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentPatch {
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrainDumpDraft {
    pub content: String,
}

impl BrainDumpDraft {
    pub fn validate(self) -> ServiceResult<ContentPatch> {
        if self.content.trim().is_empty() {
            return Err(ServiceError::validation("Brain dump content is required"));
        }

        Ok(ContentPatch {
            content: self.content,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAchievement {
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub id: i64,
    pub count: u32,
    pub last_completed_at: DateTime<Utc>,
    pub user_id: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
