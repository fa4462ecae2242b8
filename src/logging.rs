//! Logging setup
//!
//! One-shot tracing initialization for binaries embedding the runtime.
//! Filtering follows `RUST_LOG` when set, otherwise the configured default.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub default_filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// When set, write to a daily-rolled file in this directory instead of stderr
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
            log_dir: None,
        }
    }
}

/// Initialize the global tracing subscriber
///
/// Returns the appender guard when file logging is enabled; the caller must
/// hold it for the process lifetime or buffered lines are lost on exit.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "taskstream.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            if config.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .json()
                    .try_init()
                    .map_err(|e| anyhow!("failed to init logging: {}", e))?;
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .try_init()
                    .map_err(|e| anyhow!("failed to init logging: {}", e))?;
            }
            Ok(Some(guard))
        }
        None => {
            if config.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .try_init()
                    .map_err(|e| anyhow!("failed to init logging: {}", e))?;
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .try_init()
                    .map_err(|e| anyhow!("failed to init logging: {}", e))?;
            }
            Ok(None)
        }
    }
}
