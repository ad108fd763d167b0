//! Logging setup for the incident server
//!
//! Logs to a daily-rolling file in the app data directory and to stderr.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with file output
///
/// Returns a guard that must be held for the lifetime of the process
/// to ensure logs are flushed.
pub fn init_logging(log_dir: &Path) -> WorkerGuard {
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "incident-server.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,incident_server=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(true))
        .init();

    tracing::info!("Logging initialized, log directory: {:?}", log_dir);

    guard
}

/// Default log directory under the platform data dir
pub fn get_log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Application data directory: database, logs
pub fn data_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("incident-hub");
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".incident-hub");
    }

    PathBuf::from("./incident_data")
}
