//! Cache keys and TTLs for Jira data.
//!
//! Every key lives under the `jira:` namespace and is scoped to the email of
//! the identity that fetched it, so switching accounts never serves another
//! account's data.

use std::fmt;
use std::time::Duration;

use crate::stats::MonthPeriod;

/// Prefix shared by every cached Jira entity.
pub const NAMESPACE: &str = "jira:";

/// Where the fingerprint of the last active credentials is kept. Lives
/// outside [`NAMESPACE`] so purging the namespace keeps it.
pub const IDENTITY_KEY: &str = "identity:fingerprint";

const MINUTE: Duration = Duration::from_secs(60);

/// Time-to-live per kind of entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
  pub default: Duration,
  pub current_user: Duration,
  pub tasks: Duration,
  pub worklogs: Duration,
}

impl Default for CacheTtls {
  fn default() -> Self {
    Self {
      default: 60 * MINUTE,
      current_user: 24 * 60 * MINUTE,
      tasks: 30 * MINUTE,
      worklogs: 15 * MINUTE,
    }
  }
}

/// Cache key for one kind of Jira data.
#[derive(Clone, Debug)]
pub enum JiraCacheKey<'a> {
  /// The account matching the configured email
  CurrentUser { email: &'a str },
  /// Issues assigned to the current user
  Tasks { email: &'a str },
  /// The current user's worklogs on one issue
  TaskWorklogs { email: &'a str, task_key: &'a str },
  /// The current user's worklogs on all assigned issues, optionally one month
  AllWorklogs {
    email: &'a str,
    period: Option<MonthPeriod>,
  },
}

impl JiraCacheKey<'_> {
  pub fn ttl(&self, ttls: &CacheTtls) -> Duration {
    match self {
      Self::CurrentUser { .. } => ttls.current_user,
      Self::Tasks { .. } => ttls.tasks,
      Self::TaskWorklogs { .. } | Self::AllWorklogs { .. } => ttls.worklogs,
    }
  }

  /// Human readable description for logs and status output.
  pub fn description(&self) -> String {
    match self {
      Self::CurrentUser { email } => format!("user {}", email),
      Self::Tasks { email } => format!("tasks of {}", email),
      Self::TaskWorklogs { email, task_key } => format!("{} worklogs of {}", task_key, email),
      Self::AllWorklogs { email, period } => match period {
        Some(p) => format!("{} worklogs of {}", p, email),
        None => format!("all worklogs of {}", email),
      },
    }
  }
}

impl fmt::Display for JiraCacheKey<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::CurrentUser { email } => write!(f, "{}current_user:{}", NAMESPACE, email),
      Self::Tasks { email } => write!(f, "{}tasks:{}", NAMESPACE, email),
      Self::TaskWorklogs { email, task_key } => {
        write!(f, "{}{}", task_worklogs_prefix(email), task_key)
      }
      Self::AllWorklogs { email, period } => match period {
        Some(p) => write!(f, "{}{}", all_worklogs_prefix(email), p),
        None => write!(f, "{}all", all_worklogs_prefix(email)),
      },
    }
  }
}

/// Prefix of every per-task worklog entry of `email`.
pub fn task_worklogs_prefix(email: &str) -> String {
  format!("{}worklogs:{}:", NAMESPACE, email)
}

/// Prefix of every aggregate worklog entry of `email`, whatever the period.
pub fn all_worklogs_prefix(email: &str) -> String {
  format!("{}all_worklogs:{}:", NAMESPACE, email)
}
