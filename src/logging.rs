use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "jlog=info";
const MAX_LOG_FILES: usize = 7;

/// Install the global subscriber: a daily rolling file under `data_dir/logs`,
/// plus stderr when `verbose`. `RUST_LOG` overrides the default filter.
///
/// Keep the returned guard alive until exit so buffered lines get flushed.
pub fn init(data_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
  let appender = Builder::new()
    .rotation(Rotation::DAILY)
    .max_log_files(MAX_LOG_FILES)
    .filename_prefix("jlog")
    .filename_suffix("log")
    .build(data_dir.join("logs"))
    .map_err(|e| eyre!("Failed to create log file appender: {}", e))?;
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
  let stderr_layer = verbose.then(|| {
    fmt::layer()
      .with_writer(std::io::stderr)
      .with_target(false)
      .without_time()
      .boxed()
  });

  tracing_subscriber::registry()
    .with(filter)
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
