//! Log setup for the poller.
//!
//! Everything goes to stdout so cron and systemd capture it. A daemon can
//! additionally keep a daily-rotated file. `RUST_LOG` overrides the level.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "zentao_notify=info,warn";

/// Log file name prefix inside the log directory.
const LOG_FILE_PREFIX: &str = "zentao-notify.log";

/// Install the global subscriber.
///
/// With `log_dir`, records are also written without ANSI colours to
/// `zentao-notify.log.<date>` in that directory. Use
/// `RUST_LOG=zentao_notify=debug` to see request-level detail.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            Some(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stdout).with_target(true))
        .with(file_layer)
        .with(filter);

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "zentao-notify starting up");
    if let Some(dir) = log_dir {
        tracing::debug!(log_dir = %dir.display(), "Log directory");
    }

    Ok(())
}

/// The default directory for log files.
///
/// Returns the platform-specific local data directory with
/// `zentao-notify/logs` appended.
pub fn default_log_directory() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("zentao-notify").join("logs"))
}

/// Mark the end of the run in the log.
pub fn shutdown() {
    tracing::info!("zentao-notify shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_directory_has_expected_structure() {
        if let Some(dir) = default_log_directory() {
            assert!(dir.ends_with("zentao-notify/logs"));
        }
    }
}
