// Constants for the resilience module
use std::time::Duration;

/// Default total attempt budget (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default maximum delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Per-attempt timeout applied by the HTTP adapter
pub const HTTP_PER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempt budget for query-cache mutations
pub const MUTATION_MAX_ATTEMPTS: u32 = 2;

/// Backoff cap for query-cache mutations
pub const MUTATION_MAX_DELAY: Duration = Duration::from_secs(10);

/// Minimum allowed max_attempts value
pub const MIN_MAX_ATTEMPTS: u32 = 1;
