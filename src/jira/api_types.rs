//! Serde-deserializable types matching Jira API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::types::{CurrentUser, Task, WorkLog};
use crate::duration;

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  #[serde(rename = "accountId", default)]
  pub account_id: String,
  #[serde(rename = "displayName")]
  pub display_name: String,
  #[serde(rename = "emailAddress")]
  pub email_address: Option<String>,
}

impl From<ApiUser> for CurrentUser {
  fn from(user: ApiUser) -> Self {
    CurrentUser {
      account_id: user.account_id,
      display_name: user.display_name,
      email_address: user.email_address,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthor {
  #[serde(rename = "displayName", default)]
  pub display_name: String,
}

// ============================================================================
// Issue search
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
  pub name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiIssueFields {
  #[serde(default)]
  pub summary: String,
  pub status: Option<ApiStatus>,
  pub updated: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub id: String,
  pub key: String,
  #[serde(default)]
  pub fields: ApiIssueFields,
}

impl From<ApiIssue> for Task {
  fn from(issue: ApiIssue) -> Self {
    Task {
      id: issue.id,
      key: issue.key,
      summary: issue.fields.summary,
      status: issue.fields.status.map(|s| s.name).unwrap_or_default(),
      last_updated: issue.fields.updated,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  #[serde(default)]
  pub issues: Vec<ApiIssue>,
  #[serde(default)]
  pub total: u64,
}

// ============================================================================
// Worklogs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiWorklog {
  pub id: String,
  #[serde(rename = "issueId")]
  pub issue_id: Option<String>,
  pub author: Option<ApiAuthor>,
  #[serde(rename = "timeSpent", default)]
  pub time_spent: String,
  // Plain text on older servers, Atlassian Document Format on Cloud
  pub comment: Option<Value>,
  #[serde(default)]
  pub updated: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiWorklogsResponse {
  #[serde(default)]
  pub worklogs: Vec<ApiWorklog>,
  #[serde(default)]
  pub total: u64,
}

impl ApiWorklog {
  pub fn author_name(&self) -> Option<&str> {
    self.author.as_ref().map(|a| a.display_name.as_str())
  }

  /// Convert to the domain type. An unreadable timestamp is kept as `None`
  /// so the time still counts toward unfiltered totals.
  pub fn into_worklog(self, issue_key: &str) -> WorkLog {
    let updated = parse_timestamp(&self.updated);
    if updated.is_none() {
      warn!(worklog = %self.id, timestamp = %self.updated, "unreadable worklog timestamp");
    }

    WorkLog {
      issue_id: self.issue_id.unwrap_or_else(|| issue_key.to_string()),
      issue_key: issue_key.to_string(),
      time_spent_minutes: duration::parse(&self.time_spent),
      time_spent: self.time_spent,
      comment: self.comment.as_ref().map(comment_text).unwrap_or_default(),
      updated,
      id: self.id,
    }
  }
}

/// Parse a Jira timestamp (`2024-06-03T10:15:00.000+0200`) or RFC 3339.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
  DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
    .or_else(|_| DateTime::parse_from_rfc3339(s))
    .ok()
}

/// Format a timestamp the way the worklog endpoint expects it.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
  ts.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
}

/// Plain text of a comment, from either a string or an ADF document.
/// Paragraphs are joined with newlines.
pub fn comment_text(comment: &Value) -> String {
  match comment {
    Value::String(s) => s.clone(),
    Value::Object(_) => {
      let mut blocks = Vec::new();
      collect_blocks(comment, &mut blocks);
      blocks.join("\n")
    }
    _ => String::new(),
  }
}

fn collect_blocks(node: &Value, blocks: &mut Vec<String>) {
  let children = node.get("content").and_then(Value::as_array);
  let has_inline = children
    .map(|c| c.iter().any(|n| n.get("type") == Some(&json!("text"))))
    .unwrap_or(false);

  if has_inline {
    let mut line = String::new();
    collect_text(node, &mut line);
    blocks.push(line);
  } else if let Some(children) = children {
    for child in children {
      collect_blocks(child, blocks);
    }
  }
}

fn collect_text(node: &Value, out: &mut String) {
  if let Some(text) = node.get("text").and_then(Value::as_str) {
    out.push_str(text);
  }
  if let Some(children) = node.get("content").and_then(Value::as_array) {
    for child in children {
      collect_text(child, out);
    }
  }
}

/// Wrap plain text in a single-paragraph ADF document.
pub fn adf_document(text: &str) -> Value {
  json!({
    "type": "doc",
    "version": 1,
    "content": [
      {
        "type": "paragraph",
        "content": [
          { "type": "text", "text": text }
        ]
      }
    ]
  })
}
