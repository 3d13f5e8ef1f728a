//! Structured logging init.
//!
//! An `EnvFilter` plus a JSON or pretty `tracing_subscriber::fmt` layer.
//! No file rotation: this core has no log-file/rotation surface.

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format for the stdout log layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event, for log aggregators.
    Json,
    /// Human-readable, for local development.
    Pretty,
}

/// Logging configuration, handed to [`init`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is unset, e.g. `"info"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Stdout rendering.
    #[serde(default = "default_format")]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level(), format: default_format() }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> LogFormat {
    LogFormat::Pretty
}

/// Initialize the global `tracing` subscriber. Call once, near process
/// start; a second call is a no-op error the caller may safely ignore.
pub fn init(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.parse().unwrap_or_else(|_| "info".parse().unwrap()))
        .from_env_lossy();

    match config.format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().json().with_target(true).with_current_span(true);
            tracing_subscriber::registry().with(env_filter).with(layer).try_init()
        }
        LogFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer().pretty().with_target(true);
            tracing_subscriber::registry().with(env_filter).with(layer).try_init()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_pretty_info() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
