//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set and valid; otherwise the configured filter is
//! used, and [`DEFAULT_LOG_FILTER`] when that does not parse either.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig, DEFAULT_LOG_FILTER};

/// Install the global fmt subscriber described by `config`.
///
/// Returns `false` when a global subscriber was already installed; the
/// existing one is left in place.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = env_filter(config);

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(format = ?config.format, "tracing initialized");
    }
    installed
}

/// Resolve the `EnvFilter` for `config`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
