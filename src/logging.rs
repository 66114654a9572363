use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

use crate::model::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "plugin-runtime.log";

/// Installs the global subscriber. With a log directory configured, output
/// goes to a daily-rolling file there and the returned guard must be held
/// for as long as logs should be flushed. Otherwise output goes to stderr.
/// Never writes to stdout.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("invalid log filter {:?}", config.filter))?;

    let Some(dir) = config.directory.as_deref() else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;
        return Ok(None);
    };

    let (writer, guard) = file_writer(Path::new(dir))?;
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;

    tracing::info!("plugin runtime logging to {dir}");
    Ok(Some(guard))
}

fn file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir).with_context(|| format!("{}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}
