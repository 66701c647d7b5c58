//! Outbound HTTP adapter
//!
//! reqwest client wired to the call executor with the HTTP preset: three
//! attempts, 1s base delay, 30s cap and a 10s per-attempt timeout.

/// Retrying client and per-call options
pub mod client;
/// HTTP adapter error
pub mod error;

pub use client::{HttpClient, HttpClientBuilder, RequestOptions};
pub use error::HttpError;
