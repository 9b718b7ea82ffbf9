//! Derived views over worklog collections: totals, per-task breakdowns and
//! progress toward a monthly hour target.
//!
//! Everything here is recomputed on demand from already-cached worklogs.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::jira::WorkLog;

/// Default monthly target in hours.
pub const DEFAULT_TARGET_HOURS: f64 = 168.0;

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthPeriod {
  year: i32,
  month: u32,
}

impl MonthPeriod {
  /// `None` unless `month` is 1..=12 and the year is representable.
  pub fn new(year: i32, month: u32) -> Option<Self> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
  }

  /// The month that contains `date`.
  pub fn containing(date: NaiveDate) -> Self {
    Self {
      year: date.year(),
      month: date.month(),
    }
  }

  pub fn first_day(&self) -> NaiveDate {
    NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
  }

  pub fn days_in_month(&self) -> u32 {
    let (year, month) = if self.month == 12 {
      (self.year + 1, 1)
    } else {
      (self.year, self.month + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
      .and_then(|next| next.pred_opt())
      .map(|last| last.day())
      .unwrap_or(31)
  }

  /// Whether `timestamp`, read in its own offset, falls in this month.
  pub fn contains<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> bool {
    timestamp.year() == self.year && timestamp.month() == self.month
  }
}

impl fmt::Display for MonthPeriod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

/// Worklogs of one task, in the order they were given.
#[derive(Debug, Clone)]
pub struct TaskGroup {
  pub issue_key: String,
  pub worklogs: Vec<WorkLog>,
}

impl TaskGroup {
  pub fn total_minutes(&self) -> u64 {
    total_minutes(&self.worklogs)
  }
}

/// Minutes spent on one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTotal {
  pub issue_key: String,
  pub minutes: u64,
}

/// Sum of logged minutes, saturating like [`crate::duration::parse`].
pub fn total_minutes(worklogs: &[WorkLog]) -> u64 {
  worklogs
    .iter()
    .map(|w| w.time_spent_minutes)
    .fold(0, u64::saturating_add)
}

/// Partition worklogs by issue key. Groups appear in order of first
/// appearance of their key.
pub fn group_by_task(worklogs: &[WorkLog]) -> Vec<TaskGroup> {
  let mut groups: Vec<TaskGroup> = Vec::new();
  let mut index: HashMap<&str, usize> = HashMap::new();

  for worklog in worklogs {
    match index.get(worklog.issue_key.as_str()) {
      Some(&i) => groups[i].worklogs.push(worklog.clone()),
      None => {
        index.insert(worklog.issue_key.as_str(), groups.len());
        groups.push(TaskGroup {
          issue_key: worklog.issue_key.clone(),
          worklogs: vec![worklog.clone()],
        });
      }
    }
  }

  groups
}

/// Per-task totals, most time first. Ties keep first-appearance order.
pub fn task_totals(worklogs: &[WorkLog]) -> Vec<TaskTotal> {
  let mut totals: Vec<TaskTotal> = group_by_task(worklogs)
    .into_iter()
    .map(|g| TaskTotal {
      minutes: g.total_minutes(),
      issue_key: g.issue_key,
    })
    .collect();
  totals.sort_by(|a, b| b.minutes.cmp(&a.minutes));
  totals
}

pub fn percentage_of_target(total_minutes: u64, target_hours: f64) -> f64 {
  if target_hours <= 0.0 {
    return 0.0;
  }
  (total_minutes as f64 / 60.0) / target_hours * 100.0
}

/// Weekdays from `start_day` through the last day of the month, inclusive.
pub fn business_days_remaining(period: MonthPeriod, start_day: u32) -> u32 {
  let last = period.days_in_month();
  (start_day.max(1)..=last)
    .filter_map(|day| NaiveDate::from_ymd_opt(period.year, period.month, day))
    .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
    .count() as u32
}

/// Minutes per business day still needed to reach the target. Zero when no
/// business days remain or the target is already met.
pub fn daily_minutes_needed(total_minutes: u64, target_hours: f64, business_days: u32) -> f64 {
  if business_days == 0 {
    return 0.0;
  }
  remaining_minutes(total_minutes, target_hours) as f64 / business_days as f64
}

fn remaining_minutes(total_minutes: u64, target_hours: f64) -> u64 {
  let target_minutes = (target_hours.max(0.0) * 60.0).round() as u64;
  target_minutes.saturating_sub(total_minutes)
}

/// Most recent `updated` timestamp. Worklogs without one are skipped.
pub fn last_logged_at(worklogs: &[WorkLog]) -> Option<DateTime<FixedOffset>> {
  worklogs.iter().filter_map(|w| w.updated).max()
}

/// Everything the monthly statistics view shows.
#[derive(Debug, Clone)]
pub struct MonthlySummary {
  pub period: MonthPeriod,
  pub total_minutes: u64,
  pub target_hours: f64,
  pub percentage: f64,
  pub remaining_minutes: u64,
  pub business_days_left: u32,
  pub daily_minutes_needed: f64,
  pub tasks: Vec<TaskTotal>,
  pub last_logged_at: Option<DateTime<FixedOffset>>,
}

impl MonthlySummary {
  /// Build the summary for `period` as seen on `today`.
  ///
  /// Business days are counted from today for the current month, from the
  /// 1st for future months, and are zero for past months.
  pub fn compute(
    worklogs: &[WorkLog],
    period: MonthPeriod,
    today: NaiveDate,
    target_hours: f64,
  ) -> Self {
    let total = total_minutes(worklogs);
    let current = MonthPeriod::containing(today);

    let business_days_left = if period == current {
      business_days_remaining(period, today.day())
    } else if period.first_day() > today {
      business_days_remaining(period, 1)
    } else {
      0
    };

    Self {
      period,
      total_minutes: total,
      target_hours,
      percentage: percentage_of_target(total, target_hours),
      remaining_minutes: remaining_minutes(total, target_hours),
      business_days_left,
      daily_minutes_needed: daily_minutes_needed(total, target_hours, business_days_left),
      tasks: task_totals(worklogs),
      last_logged_at: last_logged_at(worklogs),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn log(issue_key: &str, minutes: u64, updated: &str) -> WorkLog {
    WorkLog {
      id: format!("{}-{}", issue_key, minutes),
      issue_id: issue_key.to_string(),
      issue_key: issue_key.to_string(),
      time_spent: crate::duration::format(minutes),
      time_spent_minutes: minutes,
      comment: String::new(),
      updated: DateTime::parse_from_rfc3339(updated).ok(),
    }
  }

  fn sample() -> Vec<WorkLog> {
    vec![
      log("A", 60, "2024-06-03T10:00:00+02:00"),
      log("A", 30, "2024-06-04T10:00:00+02:00"),
      log("B", 120, "2024-06-05T10:00:00+02:00"),
    ]
  }

  fn june_2024() -> MonthPeriod {
    MonthPeriod::new(2024, 6).unwrap()
  }

  #[test]
  fn test_total_minutes() {
    assert_eq!(total_minutes(&sample()), 210);
    assert_eq!(total_minutes(&[]), 0);
  }

  #[test]
  fn test_total_minutes_saturates() {
    let huge = crate::duration::parse("18446744073709551615m");
    assert_eq!(huge, u64::MAX);

    let logs = vec![
      log("A", huge, "2024-06-03T10:00:00+02:00"),
      log("A", huge, "2024-06-04T10:00:00+02:00"),
      log("B", 30, "2024-06-05T10:00:00+02:00"),
    ];
    assert_eq!(total_minutes(&logs), u64::MAX);
    assert_eq!(task_totals(&logs)[0].minutes, u64::MAX);

    let summary = MonthlySummary::compute(&logs, june_2024(), june_2024().first_day(), 168.0);
    assert_eq!(summary.total_minutes, u64::MAX);
    assert_eq!(summary.remaining_minutes, 0);
  }

  #[test]
  fn test_last_logged_at_skips_missing_timestamps() {
    let mut logs = sample();
    logs.push(log("C", 45, "not a timestamp"));
    assert!(logs[3].updated.is_none());
    assert_eq!(total_minutes(&logs), 255);
    assert_eq!(
      last_logged_at(&logs),
      DateTime::parse_from_rfc3339("2024-06-05T10:00:00+02:00").ok()
    );
  }

  #[test]
  fn test_group_by_task_preserves_order() {
    let mut logs = sample();
    logs.push(log("A", 15, "2024-06-06T10:00:00+02:00"));

    let groups = group_by_task(&logs);
    let shape: Vec<(&str, Vec<u64>)> = groups
      .iter()
      .map(|g| {
        (
          g.issue_key.as_str(),
          g.worklogs.iter().map(|w| w.time_spent_minutes).collect(),
        )
      })
      .collect();

    assert_eq!(shape, vec![("A", vec![60, 30, 15]), ("B", vec![120])]);
    assert_eq!(groups[0].total_minutes(), 105);
  }

  #[test]
  fn test_task_totals_sorted_by_time() {
    let totals = task_totals(&sample());
    assert_eq!(
      totals,
      vec![
        TaskTotal {
          issue_key: "B".into(),
          minutes: 120
        },
        TaskTotal {
          issue_key: "A".into(),
          minutes: 90
        },
      ]
    );
  }

  #[test]
  fn test_percentage_of_target() {
    assert!((percentage_of_target(168 * 60, 168.0) - 100.0).abs() < 1e-9);
    assert!((percentage_of_target(84 * 60, 168.0) - 50.0).abs() < 1e-9);
    assert_eq!(percentage_of_target(600, 0.0), 0.0);
  }

  #[test]
  fn test_business_days_full_week() {
    // May 2024 ends on Friday the 31st.
    let may = MonthPeriod::new(2024, 5).unwrap();
    assert_eq!(business_days_remaining(may, 27), 5);
  }

  #[test]
  fn test_business_days_weekend_only() {
    // June 2024 ends on Sunday the 30th.
    assert_eq!(business_days_remaining(june_2024(), 29), 0);
  }

  #[test]
  fn test_business_days_whole_month() {
    assert_eq!(business_days_remaining(june_2024(), 1), 20);
    assert_eq!(business_days_remaining(june_2024(), 0), 20);
    assert_eq!(business_days_remaining(june_2024(), 31), 0);
  }

  #[test]
  fn test_daily_minutes_needed() {
    assert_eq!(daily_minutes_needed(0, 10.0, 0), 0.0);
    assert_eq!(daily_minutes_needed(0, 10.0, 5), 120.0);
    assert_eq!(daily_minutes_needed(700, 10.0, 5), 0.0);
  }

  #[test]
  fn test_month_period_basics() {
    assert!(MonthPeriod::new(2024, 13).is_none());
    assert!(MonthPeriod::new(2024, 0).is_none());
    assert_eq!(MonthPeriod::new(2024, 2).unwrap().days_in_month(), 29);
    assert_eq!(MonthPeriod::new(2023, 12).unwrap().days_in_month(), 31);
    assert_eq!(june_2024().to_string(), "2024-06");
  }

  #[test]
  fn test_month_period_contains_uses_recorded_offset() {
    let late = DateTime::parse_from_rfc3339("2024-06-30T23:30:00-02:00").unwrap();
    assert!(june_2024().contains(&late));
    assert!(!june_2024().contains(&late.with_timezone(&chrono::Utc)));
  }

  #[test]
  fn test_monthly_summary_current_month() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 24).unwrap();
    let summary = MonthlySummary::compute(&sample(), june_2024(), today, 10.0);

    assert_eq!(summary.total_minutes, 210);
    assert_eq!(summary.remaining_minutes, 390);
    assert_eq!(summary.business_days_left, 5);
    assert_eq!(summary.daily_minutes_needed, 78.0);
    assert_eq!(summary.tasks[0].issue_key, "B");
    assert_eq!(
      summary.last_logged_at,
      Some(DateTime::parse_from_rfc3339("2024-06-05T10:00:00+02:00").unwrap())
    );
  }

  #[test]
  fn test_monthly_summary_past_and_future_months() {
    let today = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
    let past = MonthlySummary::compute(&sample(), june_2024(), today, 168.0);
    assert_eq!(past.business_days_left, 0);
    assert_eq!(past.daily_minutes_needed, 0.0);

    let future = MonthPeriod::new(2024, 8).unwrap();
    let ahead = MonthlySummary::compute(&[], future, today, 168.0);
    assert_eq!(ahead.business_days_left, 22);
  }
}
