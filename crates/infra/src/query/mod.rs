//! Client-side query cache
//!
//! Successful query results are cached in moka keyed by query key. Reads and
//! mutations run under separate budgets: reads get three attempts, mutations
//! two with a 10s cap.

/// Cache-backed client
pub mod client;

pub use client::{QueryClient, QueryClientBuilder, DEFAULT_QUERY_CACHE_CAPACITY};
