use crate::engine::streak::{self, MilestoneProgress};
use crate::models::{Achievement, NewAchievement, Streak, Task};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

pub const TASK_COMPLETED_TITLE: &str = "Task Completed";

pub fn record_achievement(
    title: &str,
    description: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> NewAchievement {
    NewAchievement {
        title: title.to_string(),
        description: description.to_string(),
        created_at: now,
        user_id: user_id.to_string(),
    }
}

pub fn task_completed(task: &Task, now: DateTime<Utc>) -> NewAchievement {
    record_achievement(
        TASK_COMPLETED_TITLE,
        &format!("Completed task: {}", task.title),
        &task.user_id,
        now,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDay {
    pub date: NaiveDate,
    pub achievements: Vec<Achievement>,
}

/// Groups by calendar day in `tz`, keeping the first-seen order of days and
/// the input order within each day.
pub fn timeline<Tz: TimeZone>(achievements: &[Achievement], tz: &Tz) -> Vec<AchievementDay> {
    achievements
        .iter()
        .fold(Vec::<AchievementDay>::new(), |mut days, achievement| {
            let date = achievement.created_at.with_timezone(tz).date_naive();
            match days.iter_mut().find(|day| day.date == date) {
                Some(day) => day.achievements.push(achievement.clone()),
                None => days.push(AchievementDay {
                    date,
                    achievements: vec![achievement.clone()],
                }),
            }
            days
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementOverview {
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub completion_percent: u32,
    pub streak_count: u32,
    pub streak_active: bool,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub milestone: Option<MilestoneProgress>,
    pub total_achievements: usize,
}

pub fn overview(
    tasks: &[Task],
    achievements: &[Achievement],
    streak: Option<&Streak>,
    now: DateTime<Utc>,
) -> AchievementOverview {
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|task| task.is_completed()).count();
    let completion_percent = if total_tasks > 0 {
        (completed_tasks as f64 / total_tasks as f64 * 100.0).round() as u32
    } else {
        0
    };

    let streak_count = streak.map(|current| current.count).unwrap_or_default();

    AchievementOverview {
        completed_tasks,
        total_tasks,
        completion_percent,
        streak_count,
        streak_active: streak.is_some_and(|current| streak::is_active(current, now)),
        last_completed_at: streak.map(|current| current.last_completed_at),
        milestone: (streak_count > 0).then(|| streak::milestone_progress(streak_count)),
        total_achievements: achievements.len(),
    }
}
