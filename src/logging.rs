//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for the filter:
//! 1. `BATCHFORGE_LOG` environment variable (any `EnvFilter` directive)
//! 2. `debug` when `--verbose` is given
//! 3. `info`
//!
//! Every event goes to stdout and, when a log file is given, is appended to
//! it without ANSI colours. The file is never rotated.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

pub const LOG_ENV_VAR: &str = "BATCHFORGE_LOG";

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit; dropping it flushes the file
/// writer.
pub fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stdout);

    Registry::default()
        .with(build_filter(verbose))
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
