//! Resilient call execution for remote boundaries.
//!
//! This module holds the generic pieces every adapter shares:
//! - **Classification**: boundary errors describe themselves with a closed
//!   [`FailureKind`] tag and a classifier maps the tag to
//!   [`Classification::Retryable`] or [`Classification::Permanent`]
//! - **Backoff**: `min(base_delay * 2^i, max_delay)`, no jitter
//! - **Policy**: validated [`RetryPolicy`] values plus the per-adapter presets
//! - **Executor**: [`CallExecutor`] runs an operation with bounded attempts,
//!   an optional per-attempt timeout and an injectable [`Sleeper`]
//!
//! Adapters (HTTP, store, query cache) live in `wayfare-infra` and only
//! contribute a classifier, a preset policy and an error type implementing
//! `From<AttemptTimeout>`.
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "runtime")]
//! # async fn demo() {
//! use wayfare_common::resilience::{classify_with, execute, Classification, RetryPolicy};
//! use wayfare_common::resilience::AttemptTimeout;
//!
//! #[derive(Debug)]
//! struct Flaky;
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         f.write_str("flaky")
//!     }
//! }
//! impl From<AttemptTimeout> for Flaky {
//!     fn from(_: AttemptTimeout) -> Self {
//!         Flaky
//!     }
//! }
//!
//! let classifier = classify_with(|_: &Flaky| Classification::Retryable);
//! let result: Result<u32, Flaky> =
//!     execute(RetryPolicy::default(), classifier, |attempt| async move {
//!         Ok(attempt.number())
//!     })
//!     .await;
//! assert_eq!(result.ok(), Some(1));
//! # }
//! ```

/// Capped exponential backoff
pub mod backoff;
/// Failure kinds and per-adapter classifiers
pub mod classify;
/// Preset numbers for the adapter policies
pub mod constants;
/// Retry policy values and overrides
pub mod policy;

/// Errors raised by the executor itself
#[cfg(feature = "runtime")]
pub mod error;
/// The attempt loop
#[cfg(feature = "runtime")]
pub mod executor;
/// Sleep capability used between attempts
#[cfg(feature = "runtime")]
pub mod sleep;

pub use backoff::BackoffSchedule;
pub use classify::{
    classify_with, Classification, DescribeFailure, ErrorClassifier, ErrorInfo, FailureKind,
    FnClassifier, HttpClassifier, QueryClassifier, StoreClassifier, StoreFault,
};
#[cfg(feature = "runtime")]
pub use error::AttemptTimeout;
#[cfg(feature = "runtime")]
pub use executor::{execute, Attempt, AttemptOutcome, CallExecutor, CallOutcome};
pub use policy::{RetryOverrides, RetryPolicy, RetryPolicyBuilder};
#[cfg(feature = "runtime")]
pub use sleep::{Sleeper, TokioSleeper};
