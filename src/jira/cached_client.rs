//! Cached Jira client that wraps JiraClient with transparent caching.

use chrono::{DateTime, FixedOffset, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::duration;
use crate::stats::MonthPeriod;

use super::api_types::ApiWorklog;
use super::cache::{
  all_worklogs_prefix, task_worklogs_prefix, CacheTtls, JiraCacheKey, IDENTITY_KEY, NAMESPACE,
};
use super::client::JiraClient;
use super::error::TrackerError;
use super::transport::Transport;
use super::types::{Credentials, CurrentUser, Task, WorkLog};

/// Jira client with transparent caching support.
///
/// Every read has a cached variant (`get_*`) that serves a fresh cache entry
/// when there is one, and a forced variant (`refresh_*`) that drops the entry
/// first. Results are only written to the cache after a successful fetch, so
/// a failed fetch leaves the previous entry in place.
pub struct CachedJiraClient {
  inner: JiraClient,
  cache: CacheStore,
  credentials: RwLock<Option<Credentials>>,
  ttls: CacheTtls,
  worklog_concurrency: usize,
}

impl CachedJiraClient {
  pub fn new(transport: Arc<dyn Transport>, cache: CacheStore) -> Self {
    Self {
      inner: JiraClient::new(transport),
      cache,
      credentials: RwLock::new(None),
      ttls: CacheTtls::default(),
      worklog_concurrency: 1,
    }
  }

  pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
    self.ttls = ttls;
    self
  }

  /// How many per-task worklog fetches `get_all_worklogs` keeps in flight.
  /// Results are concatenated in task order whatever the value.
  pub fn with_worklog_concurrency(mut self, concurrency: usize) -> Self {
    self.worklog_concurrency = concurrency.max(1);
    self
  }

  pub fn cache(&self) -> &CacheStore {
    &self.cache
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.cache.now()
  }

  fn credentials(&self) -> Result<Credentials, TrackerError> {
    self
      .credentials
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
      .ok_or(TrackerError::NotConfigured)
  }

  /// Email of the active credentials, if any.
  pub fn email(&self) -> Option<String> {
    self.credentials().ok().map(|c| c.email)
  }

  /// Adopt new credentials.
  ///
  /// When they differ from the active ones (or, on a fresh client, from the
  /// fingerprint persisted by the previous run) every cached Jira entry is
  /// purged first.
  pub fn set_credentials(&self, credentials: Credentials) {
    let mut current = self
      .credentials
      .write()
      .unwrap_or_else(PoisonError::into_inner);

    let fingerprint = credentials.fingerprint();
    let changed = match current.as_ref() {
      Some(active) => *active != credentials,
      None => self.stored_fingerprint().as_deref() != Some(fingerprint.as_str()),
    };

    if changed {
      let email = &credentials.email;
      match self.cache.remove_prefix(NAMESPACE) {
        Ok(removed) => info!(removed, %email, "credentials changed, cleared cached Jira data"),
        Err(e) => warn!(error = %e, "failed to clear cached Jira data"),
      }
      if let Err(e) = self.cache.store().set(IDENTITY_KEY, &fingerprint) {
        warn!(error = %e, "failed to persist credentials fingerprint");
      }
    }

    *current = Some(credentials);
  }

  fn stored_fingerprint(&self) -> Option<String> {
    match self.cache.store().get(IDENTITY_KEY) {
      Ok(fingerprint) => fingerprint,
      Err(e) => {
        warn!(error = %e, "failed to read credentials fingerprint");
        None
      }
    }
  }

  /// Serve `key` from the cache, or fetch and store it.
  async fn cached<T, F, Fut>(&self, key: &JiraCacheKey<'_>, fetcher: F) -> Result<T, TrackerError>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, TrackerError>>,
  {
    let cache_key = key.to_string();

    if let Some(hit) = self.cache.get::<T>(&cache_key) {
      debug!(key = %cache_key, "cache hit");
      return Ok(hit);
    }

    debug!(what = %key.description(), "cache miss, fetching from Jira");
    let value = match fetcher().await {
      Ok(value) => value,
      Err(e) => {
        error!(what = %key.description(), error = %e, "Jira request failed");
        return Err(e);
      }
    };

    if let Err(e) = self
      .cache
      .set_with_ttl(&cache_key, &value, key.ttl(&self.ttls))
    {
      warn!(key = %cache_key, error = %e, "failed to cache Jira response");
    }

    Ok(value)
  }

  /// The Jira account matching the configured email.
  pub async fn get_current_user(&self) -> Result<CurrentUser, TrackerError> {
    let credentials = self.credentials()?;
    let key = JiraCacheKey::CurrentUser {
      email: &credentials.email,
    };

    self
      .cached(&key, || self.inner.find_user(&credentials))
      .await
  }

  pub async fn refresh_current_user(&self) -> Result<CurrentUser, TrackerError> {
    let credentials = self.credentials()?;
    let key = JiraCacheKey::CurrentUser {
      email: &credentials.email,
    };
    self.cache.remove(&key.to_string());
    self.get_current_user().await
  }

  /// Issues assigned to the current user.
  pub async fn get_user_tasks(&self) -> Result<Vec<Task>, TrackerError> {
    let credentials = self.credentials()?;
    let key = JiraCacheKey::Tasks {
      email: &credentials.email,
    };

    self
      .cached(&key, || self.inner.assigned_tasks(&credentials))
      .await
  }

  pub async fn refresh_user_tasks(&self) -> Result<Vec<Task>, TrackerError> {
    let credentials = self.credentials()?;
    let key = JiraCacheKey::Tasks {
      email: &credentials.email,
    };
    self.cache.remove(&key.to_string());
    self.get_user_tasks().await
  }

  /// The current user's worklogs on one issue.
  ///
  /// Authorship is decided by comparing display names with the current
  /// user's.
  pub async fn get_task_worklogs(&self, task_key: &str) -> Result<Vec<WorkLog>, TrackerError> {
    let credentials = self.credentials()?;
    let creds = &credentials;
    let key = JiraCacheKey::TaskWorklogs {
      email: &creds.email,
      task_key,
    };

    self
      .cached(&key, move || async move {
        let worklogs = self.inner.task_worklogs(creds, task_key).await?;
        let user = self.get_current_user().await?;

        Ok(
          worklogs
            .into_iter()
            .filter(|w| w.author_name() == Some(user.display_name.as_str()))
            .map(|w| w.into_worklog(task_key))
            .collect(),
        )
      })
      .await
  }

  pub async fn refresh_task_worklogs(&self, task_key: &str) -> Result<Vec<WorkLog>, TrackerError> {
    let credentials = self.credentials()?;
    let key = JiraCacheKey::TaskWorklogs {
      email: &credentials.email,
      task_key,
    };
    self.cache.remove(&key.to_string());
    self.get_task_worklogs(task_key).await
  }

  /// The current user's worklogs across every assigned issue, limited to
  /// `period` when given (by each worklog's `updated` date).
  pub async fn get_all_worklogs(
    &self,
    period: Option<MonthPeriod>,
  ) -> Result<Vec<WorkLog>, TrackerError> {
    let credentials = self.credentials()?;
    let key = JiraCacheKey::AllWorklogs {
      email: &credentials.email,
      period,
    };

    self
      .cached(&key, move || async move {
        let tasks = self.get_user_tasks().await?;

        let per_task: Vec<Vec<WorkLog>> = stream::iter(tasks.into_iter().map(|t| t.key))
          .map(move |task_key| async move { self.get_task_worklogs(&task_key).await })
          .buffered(self.worklog_concurrency)
          .try_collect()
          .await?;

        let mut worklogs: Vec<WorkLog> = per_task.into_iter().flatten().collect();
        if let Some(period) = period {
          worklogs.retain(|w| w.updated.is_some_and(|at| period.contains(&at)));
        }
        Ok(worklogs)
      })
      .await
  }

  /// Drops the aggregate entry and every per-task worklog entry of the
  /// identity before fetching. The task list keeps its own freshness.
  pub async fn refresh_all_worklogs(
    &self,
    period: Option<MonthPeriod>,
  ) -> Result<Vec<WorkLog>, TrackerError> {
    let credentials = self.credentials()?;
    let key = JiraCacheKey::AllWorklogs {
      email: &credentials.email,
      period,
    };
    self.cache.remove(&key.to_string());
    if let Err(e) = self
      .cache
      .remove_prefix(&task_worklogs_prefix(&credentials.email))
    {
      warn!(error = %e, "failed to drop cached task worklogs");
    }
    self.get_all_worklogs(period).await
  }

  /// Log time on an issue, then invalidate every cached view it may affect.
  pub async fn add_worklog(
    &self,
    task_key: &str,
    time_spent: &str,
    comment: &str,
    started: Option<DateTime<FixedOffset>>,
  ) -> Result<WorkLog, TrackerError> {
    let credentials = self.credentials()?;

    let created = match self
      .inner
      .create_worklog(&credentials, task_key, time_spent, comment, started)
      .await
    {
      Ok(created) => created,
      Err(e) => {
        error!(task_key, time_spent, error = %e, "failed to add worklog");
        return Err(e);
      }
    };

    self.invalidate_worklogs(&credentials.email, task_key);
    info!(task_key, time_spent, "worklog added");

    // The worklog exists in Jira at this point, so an unreadable response
    // must not be reported as a failure.
    match serde_json::from_value::<ApiWorklog>(created) {
      Ok(api) => Ok(api.into_worklog(task_key)),
      Err(e) => {
        warn!(task_key, error = %e, "unreadable worklog response, using submitted values");
        Ok(WorkLog {
          id: String::new(),
          issue_id: task_key.to_string(),
          issue_key: task_key.to_string(),
          time_spent: time_spent.to_string(),
          time_spent_minutes: duration::parse(time_spent),
          comment: comment.to_string(),
          updated: Some(started.unwrap_or_else(|| self.now().fixed_offset())),
        })
      }
    }
  }

  fn invalidate_worklogs(&self, email: &str, task_key: &str) {
    let key = JiraCacheKey::TaskWorklogs { email, task_key };
    self.cache.remove(&key.to_string());
    if let Err(e) = self.cache.remove_prefix(&all_worklogs_prefix(email)) {
      warn!(error = %e, "failed to invalidate aggregate worklogs");
    }
  }

  /// Whether the configured credentials work. Never fails.
  pub async fn test_connection(&self) -> bool {
    match self.get_current_user().await {
      Ok(user) => {
        info!(user = %user.display_name, "connected to Jira");
        true
      }
      Err(e) => {
        warn!(error = %e, "connection test failed");
        false
      }
    }
  }

  /// When `key` was last written to the cache.
  pub fn last_refreshed(&self, key: &JiraCacheKey<'_>) -> Option<DateTime<Utc>> {
    self.cache.last_written(&key.to_string())
  }

  pub fn tasks_last_refreshed(&self) -> Option<DateTime<Utc>> {
    let email = self.email()?;
    self.last_refreshed(&JiraCacheKey::Tasks { email: &email })
  }

  pub fn worklogs_last_refreshed(&self, period: Option<MonthPeriod>) -> Option<DateTime<Utc>> {
    let email = self.email()?;
    self.last_refreshed(&JiraCacheKey::AllWorklogs {
      email: &email,
      period,
    })
  }

  /// Browser URL of an issue.
  pub fn task_url(&self, task_key: &str) -> Option<String> {
    let credentials = self.credentials().ok()?;
    Some(format!("{}/browse/{}", credentials.base_url(), task_key))
  }
}
