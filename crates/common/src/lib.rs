//! Retry engine and failure classification shared by Wayfare adapters.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors, failure classification, backoff and policy values
//! - `runtime`: the async call executor, sleep capability and attempt timeout
//! - `test-utils`: recording sleeper and scripted operations for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
/// Shared error type and result alias
#[cfg(feature = "foundation")]
pub mod error;
/// Retry engine: classification, backoff, policies and the call executor
#[cfg(feature = "foundation")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
/// Test doubles for the executor
#[cfg(any(feature = "test-utils", all(test, feature = "runtime")))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult};
#[cfg(feature = "foundation")]
pub use resilience::{
    Classification, DescribeFailure, ErrorClassifier, ErrorInfo, FailureKind, RetryOverrides,
    RetryPolicy, StoreFault,
};
#[cfg(feature = "runtime")]
pub use resilience::{execute, Attempt, AttemptTimeout, CallExecutor, CallOutcome, Sleeper};
