use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity used for every Jira call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub email: String,
  pub api_token: String,
  /// Site URL, e.g. `https://acme.atlassian.net`. The scheme may be omitted.
  pub domain: String,
}

impl Credentials {
  pub fn new(
    email: impl Into<String>,
    api_token: impl Into<String>,
    domain: impl Into<String>,
  ) -> Self {
    Self {
      email: email.into(),
      api_token: api_token.into(),
      domain: domain.into(),
    }
  }

  /// Site URL with a scheme and without a trailing slash.
  pub fn base_url(&self) -> String {
    let domain = self.domain.trim().trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
      domain.to_string()
    } else {
      format!("https://{}", domain)
    }
  }

  /// Stable hash of all three fields, safe to persist.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.email.as_bytes());
    hasher.update([0]);
    hasher.update(self.api_token.as_bytes());
    hasher.update([0]);
    hasher.update(self.base_url().as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("email", &self.email)
      .field("api_token", &"<redacted>")
      .field("domain", &self.domain)
      .finish()
  }
}

/// The Jira account behind the configured email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
  pub account_id: String,
  pub display_name: String,
  pub email_address: Option<String>,
}

/// Issue assigned to the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub id: String,
  pub key: String,
  pub summary: String,
  pub status: String,
  pub last_updated: Option<String>,
}

/// Time logged against one issue by the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLog {
  pub id: String,
  pub issue_id: String,
  pub issue_key: String,
  /// Duration as Jira reports it, e.g. `1h 30m`
  pub time_spent: String,
  pub time_spent_minutes: u64,
  pub comment: String,
  /// Last modification, in the offset Jira reported. `None` when Jira sent
  /// a timestamp we could not read.
  pub updated: Option<DateTime<FixedOffset>>,
}
