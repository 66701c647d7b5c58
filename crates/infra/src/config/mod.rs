//! Configuration loading and management
//!
//! Retry overrides per adapter plus the logging section, read from a
//! TOML/JSON file and then from `WAYFARE_*` environment variables.

/// File and environment loading
pub mod loader;

use serde::{Deserialize, Serialize};
use wayfare_common::resilience::{RetryOverrides, RetryPolicy};
use wayfare_common::CommonResult;

// Re-export commonly used items
pub use loader::{apply_env, apply_env_with, load, load_from_file, probe_config_paths};

/// Default `EnvFilter` directive when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,wayfare=debug";

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info,wayfare_infra=trace`.
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: DEFAULT_LOG_FILTER.to_string(), format: LogFormat::Text }
    }
}

/// Retry configuration for every adapter.
///
/// Each section only carries overrides; unset fields keep the adapter preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Tracing filter and format
    pub logging: LoggingConfig,
    /// Overrides for the HTTP adapter
    pub http: RetryOverrides,
    /// Overrides for the store adapter
    pub database: RetryOverrides,
    /// Overrides for query-cache reads
    pub query_read: RetryOverrides,
    /// Overrides for query-cache mutations
    pub query_mutation: RetryOverrides,
}

impl ResilienceConfig {
    /// HTTP preset with the `http` section applied
    pub fn http_policy(&self) -> CommonResult<RetryPolicy> {
        RetryPolicy::http().with_overrides(&self.http)
    }

    /// Store preset with the `database` section applied
    pub fn database_policy(&self) -> CommonResult<RetryPolicy> {
        RetryPolicy::database().with_overrides(&self.database)
    }

    /// Read preset with the `query_read` section applied
    pub fn query_read_policy(&self) -> CommonResult<RetryPolicy> {
        RetryPolicy::query_read().with_overrides(&self.query_read)
    }

    /// Mutation preset with the `query_mutation` section applied
    pub fn query_mutation_policy(&self) -> CommonResult<RetryPolicy> {
        RetryPolicy::query_mutation().with_overrides(&self.query_mutation)
    }

    /// Resolve every section so bad overrides surface at startup.
    pub fn validate(&self) -> CommonResult<()> {
        self.http_policy()?;
        self.database_policy()?;
        self.query_read_policy()?;
        self.query_mutation_policy()?;
        Ok(())
    }
}
