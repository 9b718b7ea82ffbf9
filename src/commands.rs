//! Subcommand handlers and their plain-text output.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use color_eyre::{eyre::eyre, Result};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

use crate::duration;
use crate::jira::{CachedJiraClient, Task, WorkLog};
use crate::poller::{self, StalenessPolicy};
use crate::stats::{group_by_task, MonthPeriod, MonthlySummary};

/// Resolve `--month`/`--year` flags. A month without a year means this year.
pub fn resolve_period(
  month: Option<u32>,
  year: Option<i32>,
  today: NaiveDate,
) -> Result<Option<MonthPeriod>> {
  match (month, year) {
    (None, None) => Ok(None),
    (None, Some(_)) => Err(eyre!("--year requires --month")),
    (Some(month), year) => {
      let year = year.unwrap_or(today.year());
      MonthPeriod::new(year, month)
        .map(Some)
        .ok_or_else(|| eyre!("Invalid month: {}-{}", year, month))
    }
  }
}

pub async fn tasks(client: &CachedJiraClient, refresh: bool) -> Result<()> {
  let tasks = if refresh {
    client.refresh_user_tasks().await?
  } else {
    client.get_user_tasks().await?
  };

  print!("{}", format_tasks(&tasks));
  if let Some(at) = client.tasks_last_refreshed() {
    println!("\nlast refreshed {}", format_age(client.now(), at));
  }
  Ok(())
}

pub async fn worklogs(
  client: &CachedJiraClient,
  task: Option<&str>,
  period: Option<MonthPeriod>,
  refresh: bool,
) -> Result<()> {
  let mut worklogs = match (task, refresh) {
    (Some(task), false) => client.get_task_worklogs(task).await?,
    (Some(task), true) => client.refresh_task_worklogs(task).await?,
    (None, false) => client.get_all_worklogs(period).await?,
    (None, true) => client.refresh_all_worklogs(period).await?,
  };
  if let (Some(_), Some(period)) = (task, period) {
    worklogs.retain(|w| w.updated.is_some_and(|at| period.contains(&at)));
  }

  print!("{}", format_worklogs(&worklogs));
  Ok(())
}

pub async fn log(
  client: &CachedJiraClient,
  task: &str,
  time_spent: &str,
  comment: &str,
  started: Option<DateTime<FixedOffset>>,
) -> Result<()> {
  if duration::parse(time_spent) == 0 {
    return Err(eyre!(
      "Unrecognized duration '{}'. Use units like 1w 2d 3h 30m",
      time_spent
    ));
  }

  let worklog = client
    .add_worklog(task, time_spent, comment, started)
    .await?;
  println!(
    "Logged {} on {} ({})",
    duration::format(worklog.time_spent_minutes),
    worklog.issue_key,
    format_timestamp(worklog.updated, "%Y-%m-%d %H:%M")
  );
  Ok(())
}

pub async fn stats(
  client: &CachedJiraClient,
  period: MonthPeriod,
  target_hours: f64,
  refresh: bool,
) -> Result<()> {
  let worklogs = if refresh {
    client.refresh_all_worklogs(Some(period)).await?
  } else {
    client.get_all_worklogs(Some(period)).await?
  };

  let today = client.now().date_naive();
  let summary = MonthlySummary::compute(&worklogs, period, today, target_hours);
  print!("{}", format_summary(&summary));
  Ok(())
}

pub async fn check(client: &CachedJiraClient) -> Result<()> {
  if client.test_connection().await {
    let user = client.get_current_user().await?;
    println!("Connected as {}", user.display_name);
    Ok(())
  } else {
    Err(eyre!("Could not connect to Jira. See the log file for details."))
  }
}

/// Keep the cache warm until Ctrl-C.
pub async fn watch(client: Arc<CachedJiraClient>, policy: StalenessPolicy) -> Result<()> {
  println!(
    "Refreshing stale data every {}s. Press Ctrl-C to stop.",
    policy.interval.as_secs()
  );
  let handle = poller::spawn(client, policy);

  tokio::signal::ctrl_c()
    .await
    .map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;

  handle.cancel();
  info!("watch stopped");
  Ok(())
}

pub fn url(client: &CachedJiraClient, task: &str) -> Result<()> {
  let url = client
    .task_url(task)
    .ok_or_else(|| eyre!("Jira credentials are not configured"))?;
  println!("{}", url);
  Ok(())
}

pub fn cache_status(client: &CachedJiraClient) -> Result<()> {
  let now = client.now();
  let entries = client.cache().entries()?;
  if entries.is_empty() {
    println!("Cache is empty");
    return Ok(());
  }

  for entry in entries {
    let written = entry
      .written_at
      .map(|at| format_age(now, at))
      .unwrap_or_else(|| "-".to_string());
    let state = match entry.expires_at {
      Some(expires) if expires > now => "fresh",
      Some(_) => "expired",
      None => "-",
    };
    println!("{:<50} {:<8} {}", entry.key, state, written);
  }
  Ok(())
}

pub fn cache_clear(client: &CachedJiraClient) -> Result<()> {
  client.cache().clear_all()?;
  println!("Cache cleared");
  Ok(())
}

fn format_tasks(tasks: &[Task]) -> String {
  if tasks.is_empty() {
    return "No assigned tasks\n".to_string();
  }

  let width = tasks.iter().map(|t| t.key.len()).max().unwrap_or(0);
  let mut out = String::new();
  for task in tasks {
    let _ = writeln!(
      out,
      "{:<width$}  {:<14}  {}",
      task.key,
      task.status,
      task.summary,
      width = width
    );
  }
  out
}

fn format_worklogs(worklogs: &[WorkLog]) -> String {
  if worklogs.is_empty() {
    return "No worklogs\n".to_string();
  }

  let mut out = String::new();
  for group in group_by_task(worklogs) {
    let _ = writeln!(
      out,
      "{}  {}",
      group.issue_key,
      duration::format(group.total_minutes())
    );
    for log in &group.worklogs {
      let _ = write!(
        out,
        "  {}  {:>8}",
        format_timestamp(log.updated, "%Y-%m-%d"),
        duration::format(log.time_spent_minutes)
      );
      if log.comment.is_empty() {
        out.push('\n');
      } else {
        let _ = writeln!(out, "  {}", log.comment.replace('\n', " "));
      }
    }
  }
  out
}

fn format_summary(summary: &MonthlySummary) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{}", summary.period);
  let _ = writeln!(
    out,
    "Logged:     {} of {}h ({:.1}%)",
    duration::format(summary.total_minutes),
    summary.target_hours,
    summary.percentage
  );
  let _ = writeln!(
    out,
    "Remaining:  {}",
    duration::format(summary.remaining_minutes)
  );
  let _ = writeln!(
    out,
    "Days left:  {} business days, {:.1}h per day",
    summary.business_days_left,
    summary.daily_minutes_needed / 60.0
  );
  if let Some(last) = summary.last_logged_at {
    let _ = writeln!(out, "Last log:   {}", last.format("%Y-%m-%d %H:%M"));
  }

  if !summary.tasks.is_empty() {
    out.push('\n');
    for task in &summary.tasks {
      let _ = writeln!(
        out,
        "{:<12} {}",
        task.issue_key,
        duration::format(task.minutes)
      );
    }
  }
  out
}

fn format_timestamp(at: Option<DateTime<FixedOffset>>, pattern: &str) -> String {
  match at {
    Some(at) => at.format(pattern).to_string(),
    None => "?".to_string(),
  }
}

fn format_age(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
  let minutes = (now - then).num_minutes();
  match minutes {
    m if m < 1 => "just now".to_string(),
    m if m < 60 => format!("{}m ago", m),
    m if m < 24 * 60 => format!("{}h ago", m / 60),
    m => format!("{}d ago", m / (24 * 60)),
  }
}
