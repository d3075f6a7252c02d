//! Structured logging setup

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

/// Level named in configuration; unknown names fall back to `info`
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. The `json` format
/// emits one JSON object per event, anything else the human readable form.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let default = LevelFilter::from_level(parse_level(&config.level));
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    let fmt = if config.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}
