//! Error raised by the executor itself.

use std::time::Duration;

use thiserror::Error;

/// An attempt did not complete within the policy's per-attempt timeout.
///
/// The executor converts this into the caller's error type through
/// `E: From<AttemptTimeout>`, so adapters decide how a timed-out attempt is
/// represented and classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attempt {attempt} timed out after {timeout:?}")]
pub struct AttemptTimeout {
    /// One-based attempt number that timed out
    pub attempt: u32,
    /// The deadline that elapsed
    pub timeout: Duration,
}
