//! Background refresh of stale Jira data.
//!
//! Checks the age of the cached task list and of the current month's
//! worklogs on a fixed interval and forces a refresh of whichever is too old.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::jira::CachedJiraClient;
use crate::stats::MonthPeriod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
  /// How often the check runs
  pub interval: Duration,
  pub tasks_max_age: Duration,
  pub worklogs_max_age: Duration,
}

impl Default for StalenessPolicy {
  fn default() -> Self {
    Self {
      interval: Duration::from_secs(5 * 60),
      tasks_max_age: Duration::from_secs(30 * 60),
      worklogs_max_age: Duration::from_secs(15 * 60),
    }
  }
}

/// What a check did with one kind of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
  Fresh,
  Refreshed,
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
  pub tasks: Refresh,
  pub worklogs: Refresh,
}

fn is_stale(last: Option<DateTime<Utc>>, now: DateTime<Utc>, max_age: Duration) -> bool {
  match last {
    None => true,
    // A write in the future (clock moved back) counts as fresh
    Some(last) => (now - last).to_std().is_ok_and(|age| age >= max_age),
  }
}

/// Refresh the task list and the current month's worklogs if their cached
/// copies are missing or older than the policy allows.
///
/// Returns `None` when no credentials are configured. Failures are logged
/// and reported in the outcome, never propagated.
pub async fn check_and_refresh(
  client: &CachedJiraClient,
  policy: &StalenessPolicy,
) -> Option<RefreshOutcome> {
  client.email()?;

  let now = client.now();
  let period = MonthPeriod::containing(now.date_naive());

  let tasks = if is_stale(client.tasks_last_refreshed(), now, policy.tasks_max_age) {
    match client.refresh_user_tasks().await {
      Ok(tasks) => {
        info!(count = tasks.len(), "refreshed stale task list");
        Refresh::Refreshed
      }
      Err(e) => {
        warn!(error = %e, "background task refresh failed");
        Refresh::Failed
      }
    }
  } else {
    Refresh::Fresh
  };

  let worklogs = if is_stale(
    client.worklogs_last_refreshed(Some(period)),
    now,
    policy.worklogs_max_age,
  ) {
    match client.refresh_all_worklogs(Some(period)).await {
      Ok(worklogs) => {
        info!(count = worklogs.len(), %period, "refreshed stale worklogs");
        Refresh::Refreshed
      }
      Err(e) => {
        warn!(error = %e, %period, "background worklog refresh failed");
        Refresh::Failed
      }
    }
  } else {
    Refresh::Fresh
  };

  Some(RefreshOutcome { tasks, worklogs })
}

/// Owns the background poll task. Dropping the handle stops polling.
pub struct PollerHandle {
  task: JoinHandle<()>,
}

impl PollerHandle {
  pub fn cancel(self) {
    self.task.abort();
  }
}

impl Drop for PollerHandle {
  fn drop(&mut self) {
    self.task.abort();
  }
}

/// Run a check right away, then once per `policy.interval`.
pub fn spawn(client: Arc<CachedJiraClient>, policy: StalenessPolicy) -> PollerHandle {
  let period = policy.interval.max(Duration::from_secs(1));

  let task = tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;
      match check_and_refresh(&client, &policy).await {
        Some(outcome) => debug!(?outcome, "staleness check done"),
        None => debug!("no credentials configured, skipping staleness check"),
      }
    }
  });

  PollerHandle { task }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheStore, MemoryStore};
  use crate::clock::testing::ManualClock;
  use crate::jira::testing::FakeJira;
  use crate::jira::transport::Method;
  use crate::jira::Credentials;
  use chrono::Duration as ChronoDuration;

  fn setup() -> (Arc<FakeJira>, Arc<ManualClock>, Arc<CachedJiraClient>) {
    let jira = Arc::new(
      FakeJira::new("Jane Doe")
        .with_task("A-1", "Login page")
        .with_worklog("A-1", "Jane Doe", "2h", "2024-06-03T10:00:00.000+0000"),
    );
    let clock = Arc::new(ManualClock::at(2024, 6, 10));
    let cache = CacheStore::new(Arc::new(MemoryStore::new()), clock.clone());
    let client = CachedJiraClient::new(jira.clone(), cache);
    client.set_credentials(Credentials::new("jane@acme.com", "token", "acme.atlassian.net"));
    (jira, clock, Arc::new(client))
  }

  #[test]
  fn test_is_stale() {
    let now = Utc::now();
    let max = Duration::from_secs(60);
    assert!(is_stale(None, now, max));
    assert!(!is_stale(Some(now - ChronoDuration::seconds(59)), now, max));
    assert!(is_stale(Some(now - ChronoDuration::seconds(60)), now, max));
    assert!(!is_stale(Some(now + ChronoDuration::seconds(5)), now, max));
  }

  #[tokio::test]
  async fn test_refreshes_only_what_is_stale() {
    let (jira, clock, client) = setup();
    let policy = StalenessPolicy::default();

    let outcome = check_and_refresh(&client, &policy).await.unwrap();
    assert_eq!(outcome.tasks, Refresh::Refreshed);
    assert_eq!(outcome.worklogs, Refresh::Refreshed);
    assert_eq!(jira.calls(Method::Get, "/search"), 1);

    let outcome = check_and_refresh(&client, &policy).await.unwrap();
    assert_eq!(outcome.tasks, Refresh::Fresh);
    assert_eq!(outcome.worklogs, Refresh::Fresh);

    clock.advance(ChronoDuration::minutes(15));
    let outcome = check_and_refresh(&client, &policy).await.unwrap();
    assert_eq!(outcome.tasks, Refresh::Fresh);
    assert_eq!(outcome.worklogs, Refresh::Refreshed);
    assert_eq!(jira.calls(Method::Get, "/search"), 1);
    assert_eq!(jira.calls(Method::Get, "/issue/A-1/worklog"), 2);

    clock.advance(ChronoDuration::minutes(15));
    let outcome = check_and_refresh(&client, &policy).await.unwrap();
    assert_eq!(outcome.tasks, Refresh::Refreshed);
    assert_eq!(outcome.worklogs, Refresh::Refreshed);
    assert_eq!(jira.calls(Method::Get, "/search"), 2);
  }

  #[tokio::test]
  async fn test_failures_are_reported_not_raised() {
    let (jira, _clock, client) = setup();
    jira.set_failing(true);

    let outcome = check_and_refresh(&client, &StalenessPolicy::default())
      .await
      .unwrap();
    assert_eq!(outcome.tasks, Refresh::Failed);
    assert_eq!(outcome.worklogs, Refresh::Failed);
  }

  #[tokio::test]
  async fn test_skips_without_credentials() {
    let jira = Arc::new(FakeJira::new("Jane Doe"));
    let cache = CacheStore::new(
      Arc::new(MemoryStore::new()),
      Arc::new(ManualClock::at(2024, 6, 10)),
    );
    let client = CachedJiraClient::new(jira.clone(), cache);

    let outcome = check_and_refresh(&client, &StalenessPolicy::default()).await;
    assert_eq!(outcome, None);
    assert_eq!(jira.total_calls(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_spawned_poller_runs_on_interval_until_cancelled() {
    let (jira, clock, client) = setup();
    let policy = StalenessPolicy::default();

    let handle = spawn(client, policy);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(jira.calls(Method::Get, "/search"), 1);

    clock.advance(ChronoDuration::minutes(31));
    tokio::time::sleep(policy.interval).await;
    assert_eq!(jira.calls(Method::Get, "/search"), 2);

    handle.cancel();
    clock.advance(ChronoDuration::minutes(31));
    tokio::time::sleep(policy.interval * 2).await;
    assert_eq!(jira.calls(Method::Get, "/search"), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropping_handle_stops_poller() {
    let (jira, clock, client) = setup();
    let policy = StalenessPolicy::default();

    drop(spawn(client, policy));
    clock.advance(ChronoDuration::hours(1));
    tokio::time::sleep(policy.interval * 2).await;
    assert_eq!(jira.total_calls(), 0);
  }
}
