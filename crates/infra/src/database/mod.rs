//! Data-store adapter
//!
//! SQLite through an r2d2 pool, driven by the call executor with the store
//! preset (three attempts, 1s base delay, 30s cap, no per-attempt timeout)
//! and the store classifier.

/// Store error and driver-code table
pub mod error;
/// Pool handle and retrying runners
pub mod manager;

pub use error::{fault_for_code, StoreError};
pub use manager::{Database, DatabaseBuilder, OperationKind, SqlitePool};
