use crate::models::Streak;
use anyhow::{Result, bail};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const MILESTONES: [u32; 3] = [7, 30, 100];

/// How two completion days are judged consecutive.
///
/// `DayOfMonth` subtracts raw day-of-month numbers, so the 31st followed by
/// the 1st resets the streak while the 5th of one month followed by the 6th
/// of the next extends it. `Calendar` compares real calendar dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreakRule {
    #[default]
    Calendar,
    DayOfMonth,
}

impl StreakRule {
    pub fn as_str(self) -> &'static str {
        match self {
            StreakRule::Calendar => "calendar",
            StreakRule::DayOfMonth => "day-of-month",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "calendar" => Ok(StreakRule::Calendar),
            "day-of-month" | "day_of_month" => Ok(StreakRule::DayOfMonth),
            _ => bail!("streak_rule must be calendar|day-of-month, got {raw}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakTransition {
    Started,
    Extended,
    Reset,
}

/// New streak state after a completion. `id` is `None` when no streak row
/// exists yet and the caller has to insert one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub id: Option<i64>,
    pub count: u32,
    pub last_completed_at: DateTime<Utc>,
    pub transition: StreakTransition,
}

pub fn record_completion<Tz: TimeZone>(
    existing: Option<&Streak>,
    now: &DateTime<Tz>,
    rule: StreakRule,
) -> StreakUpdate {
    let last_completed_at = now.with_timezone(&Utc);

    let Some(streak) = existing else {
        return StreakUpdate {
            id: None,
            count: 1,
            last_completed_at,
            transition: StreakTransition::Started,
        };
    };

    let (count, transition) = if is_consecutive(streak.last_completed_at, now, rule) {
        (streak.count.saturating_add(1), StreakTransition::Extended)
    } else {
        (1, StreakTransition::Reset)
    };

    StreakUpdate {
        id: Some(streak.id),
        count,
        last_completed_at,
        transition,
    }
}

/// Same calendar day counts as consecutive, so several completions in one
/// day each extend the streak.
pub fn is_consecutive<Tz: TimeZone>(
    last_completed_at: DateTime<Utc>,
    now: &DateTime<Tz>,
    rule: StreakRule,
) -> bool {
    let previous = last_completed_at.with_timezone(&now.timezone()).date_naive();
    let today = now.date_naive();

    match rule {
        StreakRule::Calendar => matches!((today - previous).num_days(), 0 | 1),
        StreakRule::DayOfMonth => {
            previous == today || i64::from(today.day()) - i64::from(previous.day()) == 1
        }
    }
}

/// A streak stays lit for 24 hours after the last completion.
pub fn is_active(streak: &Streak, now: DateTime<Utc>) -> bool {
    now - streak.last_completed_at < Duration::hours(24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneProgress {
    pub count: u32,
    pub milestone: u32,
    pub percent: u32,
}

impl MilestoneProgress {
    pub fn label(&self) -> String {
        format!("{}/{}", self.count, self.milestone)
    }
}

pub fn next_milestone(count: u32) -> u32 {
    MILESTONES
        .into_iter()
        .find(|milestone| count < *milestone)
        .unwrap_or(MILESTONES[MILESTONES.len() - 1])
}

pub fn milestone_progress(count: u32) -> MilestoneProgress {
    let milestone = next_milestone(count);
    let percent = (f64::from(count) / f64::from(milestone) * 100.0).round() as u32;

    MilestoneProgress {
        count,
        milestone,
        percent,
    }
}

pub fn days_label(count: u32) -> String {
    if count == 1 {
        "1 day".to_string()
    } else {
        format!("{count} days")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn streak(count: u32, last: DateTime<Utc>) -> Streak {
        Streak {
            id: 11,
            count,
            last_completed_at: last,
            user_id: "single-user".to_string(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn first_completion_starts_at_one() {
        let now = at(2026, 2, 18, 10);
        let update = record_completion(None, &now, StreakRule::Calendar);

        assert_eq!(update.id, None);
        assert_eq!(update.count, 1);
        assert_eq!(update.last_completed_at, now);
        assert_eq!(update.transition, StreakTransition::Started);
    }

    #[test]
    fn same_day_and_next_day_extend_by_one() {
        let last = at(2026, 2, 18, 8);

        for now in [at(2026, 2, 18, 22), at(2026, 2, 19, 1), at(2026, 2, 19, 23)] {
            let update = record_completion(Some(&streak(4, last)), &now, StreakRule::Calendar);
            assert_eq!(update.count, 5);
            assert_eq!(update.id, Some(11));
            assert_eq!(update.last_completed_at, now);
            assert_eq!(update.transition, StreakTransition::Extended);
        }
    }

    #[test]
    fn gap_of_two_days_or_more_resets() {
        let last = at(2026, 2, 18, 8);

        for now in [at(2026, 2, 20, 0), at(2026, 3, 19, 8), at(2027, 2, 18, 8)] {
            let update = record_completion(Some(&streak(9, last)), &now, StreakRule::Calendar);
            assert_eq!(update.count, 1);
            assert_eq!(update.last_completed_at, now);
            assert_eq!(update.transition, StreakTransition::Reset);
        }
    }

    #[test]
    fn completion_sequence_over_hours() {
        let t0 = at(2026, 2, 18, 10);

        let first = record_completion(None, &t0, StreakRule::Calendar);
        assert_eq!(first.count, 1);

        let stored = streak(first.count, first.last_completed_at);
        let t1 = t0 + Duration::hours(25);
        let second = record_completion(Some(&stored), &t1, StreakRule::Calendar);
        assert_eq!(second.count, 2);

        let stored = streak(second.count, second.last_completed_at);
        let t2 = t0 + Duration::hours(100);
        let third = record_completion(Some(&stored), &t2, StreakRule::Calendar);
        assert_eq!(third.count, 1);
    }

    #[test]
    fn month_rollover_depends_on_rule() {
        let last = at(2026, 1, 31, 20);
        let now = at(2026, 2, 1, 9);

        assert!(is_consecutive(last, &now, StreakRule::Calendar));
        assert!(!is_consecutive(last, &now, StreakRule::DayOfMonth));

        let last = at(2026, 1, 5, 9);
        let now = at(2026, 2, 6, 9);
        assert!(!is_consecutive(last, &now, StreakRule::Calendar));
        assert!(is_consecutive(last, &now, StreakRule::DayOfMonth));
    }

    #[test]
    fn calendar_days_follow_the_callers_time_zone() {
        let seoul = FixedOffset::east_opt(9 * 3600).unwrap();
        // 2026-02-18 23:30 in Seoul, then 2026-02-20 00:30 in Seoul.
        let last = seoul.with_ymd_and_hms(2026, 2, 18, 23, 30, 0).unwrap().with_timezone(&Utc);
        let now = seoul.with_ymd_and_hms(2026, 2, 20, 0, 30, 0).unwrap();

        assert!(!is_consecutive(last, &now, StreakRule::Calendar));
        assert!(is_consecutive(last, &now.with_timezone(&Utc), StreakRule::Calendar));
    }

    #[test]
    fn activity_window_is_twenty_four_hours() {
        let last = at(2026, 2, 18, 10);
        assert!(is_active(&streak(3, last), last + Duration::hours(23)));
        assert!(!is_active(&streak(3, last), last + Duration::hours(24)));
    }

    #[test]
    fn milestones_band_at_seven_thirty_hundred() {
        assert_eq!(next_milestone(0), 7);
        assert_eq!(next_milestone(6), 7);
        assert_eq!(next_milestone(7), 30);
        assert_eq!(next_milestone(29), 30);
        assert_eq!(next_milestone(30), 100);
        assert_eq!(next_milestone(250), 100);

        let progress = milestone_progress(15);
        assert_eq!(progress.milestone, 30);
        assert_eq!(progress.percent, 50);
        assert_eq!(progress.label(), "15/30");
    }

    #[test]
    fn day_labels_pluralize() {
        assert_eq!(days_label(1), "1 day");
        assert_eq!(days_label(0), "0 days");
        assert_eq!(days_label(12), "12 days");
    }

    #[test]
    fn parses_rule_names() {
        assert_eq!(StreakRule::parse("calendar").unwrap(), StreakRule::Calendar);
        assert_eq!(StreakRule::parse("Day_Of_Month").unwrap(), StreakRule::DayOfMonth);
        assert!(StreakRule::parse("weekly").is_err());
    }
}
