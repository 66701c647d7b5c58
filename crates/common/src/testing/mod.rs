//! Testing utilities and helpers
//!
//! - **[`time`]**: a [`Sleeper`](crate::resilience::Sleeper) that records
//!   backoff delays instead of waiting
//! - **[`mocks`]**: scripted operations that fail or succeed in a fixed order
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "test-utils")]
//! # async fn demo() {
//! use std::sync::Arc;
//!
//! use wayfare_common::resilience::{CallExecutor, HttpClassifier, RetryPolicy};
//! use wayfare_common::testing::RecordingSleeper;
//!
//! let sleeper = RecordingSleeper::new();
//! let executor = CallExecutor::new(RetryPolicy::http(), HttpClassifier)
//!     .with_sleeper(Arc::new(sleeper.clone()));
//! // ... run calls, then assert on sleeper.recorded()
//! # }
//! ```

/// Scripted operations
pub mod mocks;
/// Recording sleeper
pub mod time;

pub use mocks::{ScriptedOperation, Step};
pub use time::RecordingSleeper;
