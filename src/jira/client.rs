use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use url::form_urlencoded;

use crate::jira::api_types::{
  adf_document, format_timestamp, ApiSearchResponse, ApiUser, ApiWorklog, ApiWorklogsResponse,
};
use crate::jira::error::TrackerError;
use crate::jira::transport::{Method, Transport};
use crate::jira::types::{Credentials, CurrentUser, Task};

/// Issues assigned to whoever is authenticated.
const ASSIGNED_JQL: &str = "assignee = currentUser() ORDER BY updated DESC";

const PAGE_SIZE: u64 = 50;

/// Jira API client wrapper. Stateless apart from the transport; callers pass
/// the credentials for each call.
#[derive(Clone)]
pub struct JiraClient {
  transport: Arc<dyn Transport>,
}

fn encode(value: &str) -> String {
  form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

impl JiraClient {
  pub fn new(transport: Arc<dyn Transport>) -> Self {
    Self { transport }
  }

  async fn get<T: DeserializeOwned>(
    &self,
    credentials: &Credentials,
    endpoint: &str,
  ) -> Result<T, TrackerError> {
    let value = self
      .transport
      .call(credentials, endpoint, Method::Get, None)
      .await?;

    serde_json::from_value(value).map_err(|e| TrackerError::UnexpectedResponse {
      endpoint: endpoint.to_string(),
      reason: e.to_string(),
    })
  }

  /// Find the account whose email matches the credentials
  pub async fn find_user(&self, credentials: &Credentials) -> Result<CurrentUser, TrackerError> {
    let endpoint = format!("/user/search?query={}", encode(&credentials.email));

    let users: Vec<ApiUser> = self.get(credentials, &endpoint).await?;

    users
      .into_iter()
      .next()
      .map(CurrentUser::from)
      .ok_or_else(|| TrackerError::UserNotFound(credentials.email.clone()))
  }

  /// Get every issue assigned to the authenticated user
  pub async fn assigned_tasks(&self, credentials: &Credentials) -> Result<Vec<Task>, TrackerError> {
    let mut all_tasks = Vec::new();
    let mut start_at = 0u64;

    loop {
      let endpoint = format!(
        "/search?jql={}&fields=summary,status,updated&startAt={}&maxResults={}",
        encode(ASSIGNED_JQL),
        start_at,
        PAGE_SIZE
      );

      let response: ApiSearchResponse = self.get(credentials, &endpoint).await?;

      let count = response.issues.len() as u64;
      all_tasks.extend(response.issues.into_iter().map(Task::from));

      // Check if we've fetched all issues
      if count == 0 || start_at + count >= response.total {
        break;
      }
      start_at += count;
    }

    Ok(all_tasks)
  }

  /// Get all worklogs of an issue, whoever wrote them
  pub async fn task_worklogs(
    &self,
    credentials: &Credentials,
    task_key: &str,
  ) -> Result<Vec<ApiWorklog>, TrackerError> {
    let mut all_worklogs = Vec::new();
    let mut start_at = 0u64;

    loop {
      let endpoint = format!(
        "/issue/{}/worklog?startAt={}&maxResults={}",
        encode(task_key),
        start_at,
        PAGE_SIZE
      );

      let response: ApiWorklogsResponse = self.get(credentials, &endpoint).await?;

      let count = response.worklogs.len() as u64;
      all_worklogs.extend(response.worklogs);

      if count == 0 || start_at + count >= response.total {
        break;
      }
      start_at += count;
    }

    Ok(all_worklogs)
  }

  /// Log time on an issue. Returns the raw created worklog.
  pub async fn create_worklog(
    &self,
    credentials: &Credentials,
    task_key: &str,
    time_spent: &str,
    comment: &str,
    started: Option<DateTime<FixedOffset>>,
  ) -> Result<Value, TrackerError> {
    let endpoint = format!("/issue/{}/worklog", encode(task_key));

    let mut body = json!({
      "timeSpent": time_spent,
      "comment": adf_document(comment),
    });
    if let Some(started) = started {
      body["started"] = json!(format_timestamp(&started));
    }

    let created = self
      .transport
      .call(credentials, &endpoint, Method::Post, Some(&body))
      .await?;

    Ok(created)
  }
}
