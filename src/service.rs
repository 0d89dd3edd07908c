use crate::engine::achievement::{self, AchievementOverview};
use crate::engine::dashboard::{self, DashboardView, StepProgress, TaskFilters};
use crate::engine::streak::{self, StreakRule, StreakUpdate};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Achievement, BrainDump, BrainDumpDraft, NewBrainDump, NewStep, NewTask, StatusPatch, Streak,
    StepDraft, Task, TaskDraft, TaskStatus, TaskStep, validate_energy,
};
use crate::store::{Query, Table, TableStore, insert_row, select_rows, update_rows};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Use cases over the hosted tables. Every call takes the owning user id;
/// results are returned only after the store has confirmed the write.
#[derive(Clone)]
pub struct Planner {
    store: Arc<dyn TableStore>,
    streak_rule: StreakRule,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub task: Task,
    pub steps: Vec<TaskStep>,
    pub progress: StepProgress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskToggle {
    pub task: Task,
    pub achievement: Option<Achievement>,
    pub streak: Option<Streak>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepToggle {
    pub step: TaskStep,
    /// Advisory only; the task is never completed automatically.
    pub all_steps_completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementReport {
    pub overview: AchievementOverview,
    pub achievements: Vec<Achievement>,
}

impl Planner {
    pub fn new(store: Arc<dyn TableStore>, streak_rule: StreakRule) -> Self {
        Self { store, streak_rule }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub fn list_tasks(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        let query = Query::new()
            .eq("userId", user_id)
            .order_by("createdAt", false);
        Ok(select_rows(self.store.as_ref(), Table::Tasks, &query)?)
    }

    pub fn get_task(&self, user_id: &str, task_id: i64) -> ServiceResult<Task> {
        let query = Query::new().eq("id", task_id).eq("userId", user_id);
        select_rows::<Task>(self.store.as_ref(), Table::Tasks, &query)?
            .into_iter()
            .next()
            .ok_or_else(|| task_not_found(task_id))
    }

    pub fn task_detail(&self, user_id: &str, task_id: i64) -> ServiceResult<TaskDetail> {
        let task = self.get_task(user_id, task_id)?;
        let steps = self.steps_of(task.id)?;
        let progress = dashboard::step_progress(&steps);

        Ok(TaskDetail {
            task,
            steps,
            progress,
        })
    }

    pub fn create_task(
        &self,
        user_id: &str,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let record = NewTask {
            fields: draft.validate()?,
            status: TaskStatus::Active,
            created_at: now,
            completed_at: None,
            user_id: user_id.to_string(),
        };

        let task: Task = insert_row(self.store.as_ref(), Table::Tasks, &record)?;
        info!(task_id = task.id, user_id, "task created");
        Ok(task)
    }

    pub fn update_task(&self, user_id: &str, task_id: i64, draft: TaskDraft) -> ServiceResult<Task> {
        let fields = draft.validate()?;
        let query = Query::new().eq("id", task_id).eq("userId", user_id);

        let task = update_rows::<_, Task>(self.store.as_ref(), Table::Tasks, &fields, &query)?
            .into_iter()
            .next()
            .ok_or_else(|| task_not_found(task_id))?;
        info!(task_id, user_id, "task updated");
        Ok(task)
    }

    /// Removes the breakdown steps first so no orphaned steps survive a
    /// failed task delete.
    pub fn delete_task(&self, user_id: &str, task_id: i64) -> ServiceResult<()> {
        let task = self.get_task(user_id, task_id)?;

        self.store
            .delete(Table::TaskBreakdowns, &Query::new().eq("taskId", task.id))?;
        self.store.delete(
            Table::Tasks,
            &Query::new().eq("id", task.id).eq("userId", user_id),
        )?;

        info!(task_id, user_id, "task deleted");
        Ok(())
    }

    /// `active -> completed` stamps `completedAt`, appends an achievement and
    /// advances the streak. `completed -> active` only clears `completedAt`.
    pub fn toggle_task<Tz: TimeZone>(
        &self,
        user_id: &str,
        task_id: i64,
        now: &DateTime<Tz>,
    ) -> ServiceResult<TaskToggle> {
        let current = self.get_task(user_id, task_id)?;
        let status = current.status.toggled();
        let completing = status == TaskStatus::Completed;
        let now_utc = now.with_timezone(&Utc);

        let patch = StatusPatch {
            status,
            completed_at: completing.then_some(now_utc),
        };
        let query = Query::new().eq("id", task_id).eq("userId", user_id);
        let task = update_rows::<_, Task>(self.store.as_ref(), Table::Tasks, &patch, &query)?
            .into_iter()
            .next()
            .ok_or_else(|| task_not_found(task_id))?;

        info!(task_id, user_id, status = status.as_str(), "task status changed");

        if !completing {
            return Ok(TaskToggle {
                task,
                achievement: None,
                streak: None,
            });
        }

        let achievement = self
            .append_achievement(&task, now_utc)
            .inspect_err(|error| {
                warn!(error = %error, task_id, "failed to record achievement");
            })
            .ok();

        let streak = self
            .advance_streak(user_id, now)
            .inspect_err(|error| {
                warn!(error = %error, task_id, "failed to update streak");
            })
            .ok();

        Ok(TaskToggle {
            task,
            achievement,
            streak,
        })
    }

    pub fn list_steps(&self, user_id: &str, task_id: i64) -> ServiceResult<Vec<TaskStep>> {
        let task = self.get_task(user_id, task_id)?;
        Ok(self.steps_of(task.id)?)
    }

    pub fn add_step(&self, user_id: &str, task_id: i64, draft: StepDraft) -> ServiceResult<TaskStep> {
        let fields = draft.validate()?;
        let task = self.get_task(user_id, task_id)?;

        let record = NewStep {
            task_id: task.id,
            fields,
            is_completed: false,
        };
        let step: TaskStep = insert_row(self.store.as_ref(), Table::TaskBreakdowns, &record)?;
        info!(task_id, step_id = step.id, "step added");
        Ok(step)
    }

    pub fn update_step(
        &self,
        user_id: &str,
        step_id: i64,
        draft: StepDraft,
    ) -> ServiceResult<TaskStep> {
        let fields = draft.validate()?;
        self.owned_step(user_id, step_id)?;

        let step = update_rows::<_, TaskStep>(
            self.store.as_ref(),
            Table::TaskBreakdowns,
            &fields,
            &Query::new().eq("id", step_id),
        )?
        .into_iter()
        .next()
        .ok_or_else(|| step_not_found(step_id))?;
        info!(step_id, "step updated");
        Ok(step)
    }

    pub fn delete_step(&self, user_id: &str, step_id: i64) -> ServiceResult<()> {
        self.owned_step(user_id, step_id)?;
        self.store
            .delete(Table::TaskBreakdowns, &Query::new().eq("id", step_id))?;
        info!(step_id, "step deleted");
        Ok(())
    }

    pub fn toggle_step(&self, user_id: &str, step_id: i64) -> ServiceResult<StepToggle> {
        let (task, current) = self.owned_step(user_id, step_id)?;

        let step = update_rows::<_, TaskStep>(
            self.store.as_ref(),
            Table::TaskBreakdowns,
            &json!({ "isCompleted": !current.is_completed }),
            &Query::new().eq("id", step_id),
        )?
        .into_iter()
        .next()
        .ok_or_else(|| step_not_found(step_id))?;

        let all_steps_completed = step.is_completed
            && !task.is_completed()
            && self.steps_of(task.id)?.iter().all(|other| other.is_completed);

        debug!(step_id, completed = step.is_completed, all_steps_completed, "step toggled");
        Ok(StepToggle {
            step,
            all_steps_completed,
        })
    }

    pub fn list_brain_dumps(&self, user_id: &str) -> ServiceResult<Vec<BrainDump>> {
        let query = Query::new()
            .eq("userId", user_id)
            .order_by("createdAt", false);
        Ok(select_rows(self.store.as_ref(), Table::BrainDumps, &query)?)
    }

    pub fn create_brain_dump(
        &self,
        user_id: &str,
        draft: BrainDumpDraft,
        now: DateTime<Utc>,
    ) -> ServiceResult<BrainDump> {
        let content = draft.validate()?.content;
        let record = NewBrainDump {
            content,
            created_at: now,
            user_id: user_id.to_string(),
        };

        let dump: BrainDump = insert_row(self.store.as_ref(), Table::BrainDumps, &record)?;
        info!(dump_id = dump.id, user_id, "brain dump saved");
        Ok(dump)
    }

    /// Only the content changes; `createdAt` is kept.
    pub fn update_brain_dump(
        &self,
        user_id: &str,
        dump_id: i64,
        draft: BrainDumpDraft,
    ) -> ServiceResult<BrainDump> {
        let patch = draft.validate()?;
        let query = Query::new().eq("id", dump_id).eq("userId", user_id);

        update_rows::<_, BrainDump>(self.store.as_ref(), Table::BrainDumps, &patch, &query)?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found(format!("Brain dump {dump_id} not found")))
    }

    pub fn delete_brain_dump(&self, user_id: &str, dump_id: i64) -> ServiceResult<()> {
        let query = Query::new().eq("id", dump_id).eq("userId", user_id);
        let existing = self.store.select(Table::BrainDumps, &query)?;
        if existing.is_empty() {
            return Err(ServiceError::not_found(format!(
                "Brain dump {dump_id} not found"
            )));
        }

        self.store.delete(Table::BrainDumps, &query)?;
        info!(dump_id, user_id, "brain dump deleted");
        Ok(())
    }

    pub fn list_achievements(&self, user_id: &str) -> ServiceResult<Vec<Achievement>> {
        let query = Query::new()
            .eq("userId", user_id)
            .order_by("createdAt", false);
        Ok(select_rows(self.store.as_ref(), Table::Achievements, &query)?)
    }

    pub fn achievement_report(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<AchievementReport> {
        let achievements = self.list_achievements(user_id)?;
        let streak = self.streak(user_id)?;
        let tasks = self.list_tasks(user_id)?;

        Ok(AchievementReport {
            overview: achievement::overview(&tasks, &achievements, streak.as_ref(), now),
            achievements,
        })
    }

    pub fn streak(&self, user_id: &str) -> ServiceResult<Option<Streak>> {
        let query = Query::new().eq("userId", user_id);
        Ok(select_rows::<Streak>(self.store.as_ref(), Table::Streaks, &query)?
            .into_iter()
            .next())
    }

    pub fn dashboard(
        &self,
        user_id: &str,
        filters: &TaskFilters,
        energy_level: u8,
    ) -> ServiceResult<DashboardView> {
        let energy_level = validate_energy(energy_level)?;
        let tasks = self.list_tasks(user_id)?;
        Ok(dashboard::derive_view(&tasks, filters, energy_level))
    }

    fn steps_of(&self, task_id: i64) -> Result<Vec<TaskStep>> {
        select_rows(
            self.store.as_ref(),
            Table::TaskBreakdowns,
            &Query::new().eq("taskId", task_id).order_by("id", true),
        )
    }

    /// Steps carry no user id; ownership comes from the parent task.
    fn owned_step(&self, user_id: &str, step_id: i64) -> ServiceResult<(Task, TaskStep)> {
        let step = select_rows::<TaskStep>(
            self.store.as_ref(),
            Table::TaskBreakdowns,
            &Query::new().eq("id", step_id),
        )?
        .into_iter()
        .next()
        .ok_or_else(|| step_not_found(step_id))?;

        let task = match self.get_task(user_id, step.task_id) {
            Err(ServiceError::NotFound(_)) => return Err(step_not_found(step_id)),
            other => other?,
        };

        Ok((task, step))
    }

    fn append_achievement(&self, task: &Task, now: DateTime<Utc>) -> Result<Achievement> {
        let record = achievement::task_completed(task, now);
        insert_row(self.store.as_ref(), Table::Achievements, &record)
    }

    fn advance_streak<Tz: TimeZone>(&self, user_id: &str, now: &DateTime<Tz>) -> Result<Streak> {
        let query = Query::new().eq("userId", user_id);
        let existing = select_rows::<Streak>(self.store.as_ref(), Table::Streaks, &query)?
            .into_iter()
            .next();

        let StreakUpdate {
            id,
            count,
            last_completed_at,
            transition,
        } = streak::record_completion(existing.as_ref(), now, self.streak_rule);

        let streak = match id {
            Some(id) => update_rows::<_, Streak>(
                self.store.as_ref(),
                Table::Streaks,
                &json!({ "count": count, "lastCompletedAt": last_completed_at }),
                &Query::new().eq("id", id),
            )?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Streak {id} disappeared during update"))?,
            None => insert_row(
                self.store.as_ref(),
                Table::Streaks,
                &json!({
                    "count": count,
                    "lastCompletedAt": last_completed_at,
                    "userId": user_id,
                }),
            )?,
        };

        info!(user_id, count = streak.count, ?transition, "streak updated");
        Ok(streak)
    }
}

fn task_not_found(task_id: i64) -> ServiceError {
    ServiceError::not_found(format!("Task {task_id} not found"))
}

fn step_not_found(step_id: i64) -> ServiceError {
    ServiceError::not_found(format!("Step {step_id} not found"))
}
