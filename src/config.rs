use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::jira::{CacheTtls, Credentials};
use crate::poller::StalenessPolicy;
use crate::stats::DEFAULT_TARGET_HOURS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub jira: JiraConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub tracking: TrackingConfig,
  #[serde(default)]
  pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  /// Site URL, e.g. `https://acme.atlassian.net`
  pub url: String,
  pub email: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// SQLite file, survives restarts
  #[default]
  Sqlite,
  /// Process memory only
  Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: CacheBackend,
  /// SQLite file location (defaults to the data directory)
  pub path: Option<PathBuf>,
  #[serde(default)]
  pub ttl_minutes: TtlConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
  pub default: u64,
  pub tasks: u64,
  pub worklogs: u64,
  pub current_user: u64,
}

impl Default for TtlConfig {
  fn default() -> Self {
    Self {
      default: 60,
      tasks: 30,
      worklogs: 15,
      current_user: 24 * 60,
    }
  }
}

impl From<&TtlConfig> for CacheTtls {
  fn from(ttl: &TtlConfig) -> Self {
    let minutes = |m: u64| Duration::from_secs(m.saturating_mul(60));
    CacheTtls {
      default: minutes(ttl.default),
      current_user: minutes(ttl.current_user),
      tasks: minutes(ttl.tasks),
      worklogs: minutes(ttl.worklogs),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
  /// Monthly goal in hours
  pub target_hours: f64,
  /// Per-task worklog requests kept in flight when loading all worklogs
  pub worklog_fetch_concurrency: usize,
}

impl Default for TrackingConfig {
  fn default() -> Self {
    Self {
      target_hours: DEFAULT_TARGET_HOURS,
      worklog_fetch_concurrency: 1,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
  pub interval_secs: u64,
  pub tasks_max_age_secs: u64,
  pub worklogs_max_age_secs: u64,
}

impl Default for RefreshConfig {
  fn default() -> Self {
    let policy = StalenessPolicy::default();
    Self {
      interval_secs: policy.interval.as_secs(),
      tasks_max_age_secs: policy.tasks_max_age.as_secs(),
      worklogs_max_age_secs: policy.worklogs_max_age.as_secs(),
    }
  }
}

impl From<&RefreshConfig> for StalenessPolicy {
  fn from(refresh: &RefreshConfig) -> Self {
    StalenessPolicy {
      interval: Duration::from_secs(refresh.interval_secs),
      tasks_max_age: Duration::from_secs(refresh.tasks_max_age_secs),
      worklogs_max_age: Duration::from_secs(refresh.worklogs_max_age_secs),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jlog.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jlog/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/jlog/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jlog.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jlog").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    if config.jira.url.trim().is_empty() || config.jira.email.trim().is_empty() {
      return Err(eyre!("jira.url and jira.email must not be empty"));
    }
    if config.tracking.target_hours.is_nan() || config.tracking.target_hours <= 0.0 {
      return Err(eyre!("tracking.target_hours must be positive"));
    }

    Ok(config)
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JLOG_JIRA_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("JLOG_JIRA_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!(
          "Jira API token not found. Set JLOG_JIRA_TOKEN or JIRA_API_TOKEN environment variable."
        )
      })
  }

  /// Credentials from the config file plus the token from the environment.
  pub fn credentials(&self) -> Result<Credentials> {
    let token = Self::get_api_token()?;
    Ok(Credentials::new(self.jira.email.trim(), token, self.jira.url.trim()))
  }

  pub fn ttls(&self) -> CacheTtls {
    CacheTtls::from(&self.cache.ttl_minutes)
  }

  pub fn staleness_policy(&self) -> StalenessPolicy {
    StalenessPolicy::from(&self.refresh)
  }
}

/// Directory for the cache database and log files.
pub fn data_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .map(|dir| dir.join("jlog"))
    .ok_or_else(|| eyre!("Could not determine data directory"))
}
