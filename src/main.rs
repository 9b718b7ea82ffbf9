mod cache;
mod clock;
mod commands;
mod config;
mod duration;
mod jira;
mod logging;
mod poller;
mod stats;

use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheStore, MemoryStore, PersistentStore, SqliteStore};
use crate::clock::SystemClock;
use crate::config::CacheBackend;
use crate::jira::{CachedJiraClient, HttpTransport};
use crate::stats::MonthPeriod;

#[derive(Parser, Debug)]
#[command(name = "jlog")]
#[command(about = "Track time logged in Jira against a monthly target")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jlog/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Also print logs to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List issues assigned to you
  Tasks {
    /// Bypass the cache
    #[arg(short, long)]
    refresh: bool,
  },
  /// List your worklogs, grouped by issue
  Worklogs {
    /// Only this issue
    #[arg(short, long)]
    task: Option<String>,
    #[arg(short, long)]
    month: Option<u32>,
    #[arg(short, long, requires = "month")]
    year: Option<i32>,
    #[arg(short, long)]
    refresh: bool,
  },
  /// Log time on an issue
  Log {
    task: String,
    /// Jira duration, e.g. "1h 30m"
    duration: String,
    #[arg(short = 'm', long, default_value = "")]
    comment: String,
    /// When the work started (RFC 3339)
    #[arg(long, value_parser = parse_started)]
    started: Option<DateTime<FixedOffset>>,
  },
  /// Progress toward the monthly target
  Stats {
    #[arg(short, long)]
    month: Option<u32>,
    #[arg(short, long, requires = "month")]
    year: Option<i32>,
    /// Override the configured target
    #[arg(long)]
    target_hours: Option<f64>,
    #[arg(short, long)]
    refresh: bool,
  },
  /// Verify the credentials against Jira
  Check,
  /// Refresh stale data in the background until interrupted
  Watch,
  /// Print the browser URL of an issue
  Url { task: String },
  /// Inspect or clear the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// List cached entries with their age
  Status,
  /// Remove every cached entry
  Clear,
}

fn parse_started(s: &str) -> Result<DateTime<FixedOffset>, String> {
  DateTime::parse_from_rfc3339(s).map_err(|e| format!("expected RFC 3339 timestamp: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config::data_dir()?, args.verbose)?;

  let store: Arc<dyn PersistentStore> = match config.cache.backend {
    CacheBackend::Sqlite => match &config.cache.path {
      Some(path) => Arc::new(SqliteStore::open_at(path)?),
      None => Arc::new(SqliteStore::open()?),
    },
    CacheBackend::Memory => Arc::new(MemoryStore::new()),
  };
  let ttls = config.ttls();
  let cache = CacheStore::new(store, Arc::new(SystemClock)).with_default_ttl(ttls.default);

  let client = CachedJiraClient::new(Arc::new(HttpTransport::new()?), cache)
    .with_ttls(ttls)
    .with_worklog_concurrency(config.tracking.worklog_fetch_concurrency);
  client.set_credentials(config.credentials()?);

  let today = client.now().date_naive();

  match args.command {
    Command::Tasks { refresh } => commands::tasks(&client, refresh).await,
    Command::Worklogs {
      task,
      month,
      year,
      refresh,
    } => {
      let period = commands::resolve_period(month, year, today)?;
      commands::worklogs(&client, task.as_deref(), period, refresh).await
    }
    Command::Log {
      task,
      duration,
      comment,
      started,
    } => commands::log(&client, &task, &duration, &comment, started).await,
    Command::Stats {
      month,
      year,
      target_hours,
      refresh,
    } => {
      let period = commands::resolve_period(month, year, today)?
        .unwrap_or_else(|| MonthPeriod::containing(today));
      let target = target_hours.unwrap_or(config.tracking.target_hours);
      commands::stats(&client, period, target, refresh).await
    }
    Command::Check => commands::check(&client).await,
    Command::Watch => commands::watch(Arc::new(client), config.staleness_policy()).await,
    Command::Url { task } => commands::url(&client, &task),
    Command::Cache { action } => match action {
      CacheAction::Status => commands::cache_status(&client),
      CacheAction::Clear => commands::cache_clear(&client),
    },
  }
}
