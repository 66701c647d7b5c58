//! Retry policy values and the override surface used by configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backoff::{self, BackoffSchedule};
use super::constants::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, HTTP_PER_ATTEMPT_TIMEOUT,
    MIN_MAX_ATTEMPTS, MUTATION_MAX_ATTEMPTS, MUTATION_MAX_DELAY,
};
use crate::error::{CommonError, CommonResult};

/// Immutable retry configuration for one call (or one adapter).
///
/// Invariants, enforced by [`RetryPolicyBuilder::build`]:
/// `max_attempts >= 1` and `base_delay <= max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    per_attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            per_attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy builder seeded with the defaults
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Outbound HTTP: 3 attempts, 1s base, 30s cap, 10s per attempt.
    pub const fn http() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            per_attempt_timeout: Some(HTTP_PER_ATTEMPT_TIMEOUT),
        }
    }

    /// Data-store operations: 3 attempts, 1s base, 30s cap, no per-attempt
    /// timeout.
    pub const fn database() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            per_attempt_timeout: None,
        }
    }

    /// Query-cache reads: 3 attempts, 1s base, 30s cap.
    pub const fn query_read() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            per_attempt_timeout: None,
        }
    }

    /// Query-cache mutations: 2 attempts, 1s base, 10s cap.
    pub const fn query_mutation() -> Self {
        Self {
            max_attempts: MUTATION_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: MUTATION_MAX_DELAY,
            per_attempt_timeout: None,
        }
    }

    /// Total attempt budget, the first try included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any single delay
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Deadline applied to each attempt independently, if any.
    pub fn per_attempt_timeout(&self) -> Option<Duration> {
        self.per_attempt_timeout
    }

    /// Backoff before the retry following a failure at `attempt_index`
    /// (zero-based).
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        backoff::delay_for(attempt_index, self)
    }

    /// The delays this policy sleeps between attempts when every attempt
    /// fails with a retryable error.
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule::new(*self)
    }

    /// Start a builder from this policy's values
    pub fn to_builder(&self) -> RetryPolicyBuilder {
        RetryPolicyBuilder { policy: *self }
    }

    /// Apply configuration overrides on top of this policy.
    ///
    /// A `retry_delay_ms` larger than the current cap raises the cap to the
    /// same value. `per_attempt_timeout_ms = 0` disables the per-attempt
    /// timeout.
    pub fn with_overrides(&self, overrides: &RetryOverrides) -> CommonResult<Self> {
        let mut builder = self.to_builder();

        if let Some(retries) = overrides.retries {
            builder = builder.max_attempts(retries);
        }

        if let Some(delay_ms) = overrides.retry_delay_ms {
            let delay = Duration::from_millis(delay_ms);
            builder = builder.base_delay(delay).max_delay(self.max_delay.max(delay));
        }

        if let Some(timeout_ms) = overrides.per_attempt_timeout_ms {
            builder = if timeout_ms == 0 {
                builder.no_per_attempt_timeout()
            } else {
                builder.per_attempt_timeout(Duration::from_millis(timeout_ms))
            };
        }

        builder.build()
    }
}

/// Builder for [`RetryPolicy`] with fluent API
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    /// Builder seeded with the default policy
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    /// Set the total attempt budget, the first try included
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    /// Set the cap on any single delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Abandon each attempt after `timeout`
    pub fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.policy.per_attempt_timeout = Some(timeout);
        self
    }

    /// Let attempts run without a deadline
    pub fn no_per_attempt_timeout(mut self) -> Self {
        self.policy.per_attempt_timeout = None;
        self
    }

    /// Validate and produce the policy
    pub fn build(self) -> CommonResult<RetryPolicy> {
        let policy = self.policy;

        if policy.max_attempts < MIN_MAX_ATTEMPTS {
            return Err(CommonError::config_field(
                "max_attempts",
                format!("must be at least {MIN_MAX_ATTEMPTS}, got {}", policy.max_attempts),
            ));
        }

        if policy.base_delay > policy.max_delay {
            return Err(CommonError::config(format!(
                "base_delay ({:?}) cannot be greater than max_delay ({:?})",
                policy.base_delay, policy.max_delay
            )));
        }

        if policy.per_attempt_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(CommonError::config_field(
                "per_attempt_timeout",
                "must be greater than zero when set",
            ));
        }

        Ok(policy)
    }
}

/// Recognised retry options from configuration files and environment.
///
/// Every field is optional; unset fields keep the adapter's preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOverrides {
    /// Total attempt budget, the first try included.
    pub retries: Option<u32>,
    /// Base backoff delay in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Per-attempt timeout in milliseconds; `0` disables it.
    pub per_attempt_timeout_ms: Option<u64>,
}

impl RetryOverrides {
    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.retries.is_none()
            && self.retry_delay_ms.is_none()
            && self.per_attempt_timeout_ms.is_none()
    }
}
