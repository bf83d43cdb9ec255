//! Logging initialization using the `tracing` ecosystem.
//!
//! Provides:
//! - Console output on stderr (colored, human-readable) so stdout stays free
//!   for machine-readable results
//! - Optional file output through a size-capped [`RotatingFile`], made
//!   non-blocking via `tracing-appender`
//! - Configurable log level via env var `RUST_LOG` or explicit parameter
//!
//! Order attempts and responses are logged at INFO by `fapi-td`; with a file
//! configured that stream is the bot's only durable audit trail.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::error::FapiError;
use crate::rotating_file::RotatingFile;

/// Keeps the background file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start. After this, all `tracing::info!()`
/// etc. macros will produce output.
///
/// # Parameters
///
/// - `config.level`: default level if `RUST_LOG` env var is not set (e.g. `"info"`)
/// - `config.file`: optional path of the rotating log file
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard, FapiError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(true);

    let (file_layer, file_guard) = match config.file.as_deref() {
        Some(path) => {
            let sink = RotatingFile::open(path, config.max_bytes, config.max_backups)?;
            let (writer, guard) = tracing_appender::non_blocking(sink);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| FapiError::Config(format!("logging already initialized: {e}")))?;

    if let Some(path) = config.file.as_deref() {
        tracing::debug!(path, max_bytes = config.max_bytes, max_backups = config.max_backups, "file logging enabled");
    }
    Ok(LogGuard { _file: file_guard })
}
