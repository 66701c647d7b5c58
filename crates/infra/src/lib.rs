//! # Wayfare Infrastructure
//!
//! Adapters that route remote calls through the shared call executor.
//!
//! This crate contains:
//! - An outbound HTTP client (reqwest) with per-attempt timeouts
//! - A pooled SQLite store with fault classification of driver errors
//! - A moka-backed query cache with separate read and mutation budgets
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Retry semantics live in `wayfare-common::resilience`
//! - Each adapter picks a preset policy and its classifier, and accepts
//!   per-call overrides

/// Configuration loading
pub mod config;
/// Pooled SQLite store adapter
pub mod database;
/// Boundary error conversions
pub mod errors;
/// Outbound HTTP adapter
pub mod http;
/// Tracing subscriber setup
pub mod observability;
/// Client-side query cache
pub mod query;

// Re-export commonly used items
pub use config::{LogFormat, LoggingConfig, ResilienceConfig};
pub use database::{Database, DatabaseBuilder, OperationKind, StoreError};
pub use http::{HttpClient, HttpClientBuilder, HttpError, RequestOptions};
pub use observability::init_tracing;
pub use query::{QueryClient, QueryClientBuilder};
