// Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::APP_DIR;
use crate::error::{Error, Result};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "BREW_SERVICES_LOG";

/// Initialize the logging subsystem
///
/// The terminal belongs to the UI, so logs go to a daily rotated file under
/// `~/.local/share/brew-services-tui/logs/` (platform equivalent elsewhere).
///
/// # Examples
/// ```bash
/// BREW_SERVICES_LOG=debug brew-services-tui
/// ```
pub fn init() -> Result<PathBuf> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "brew-services.log");

    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new("brew_services_tui=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| Error::logging(e.to_string()))?;

    tracing::info!("brew-services-tui {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log directory: {}", log_dir.display());

    Ok(log_dir)
}

fn log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_DIR).join("logs")
}
