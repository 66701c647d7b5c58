//! Errors produced by the HTTP adapter.

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;
use wayfare_common::resilience::{AttemptTimeout, DescribeFailure, ErrorInfo, FailureKind};
use wayfare_common::CommonError;

/// Failure of an outbound HTTP call.
///
/// Only 5xx responses become [`HttpError::Status`] inside the retry loop;
/// other non-2xx responses are handed back to the caller as responses.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The server answered with an error status
    #[error("server responded with {status} for {url}")]
    Status {
        /// Status returned by the server
        status: StatusCode,
        /// Request URL
        url: String,
    },

    /// Connection refused/reset, DNS failure or a transport-level timeout
    #[error("network error: {message}")]
    Network {
        /// Transport error message
        message: String,
        /// The transport reported a timeout (connect or read)
        timed_out: bool,
        /// Underlying reqwest error, when there is one
        #[source]
        source: Option<Arc<reqwest::Error>>,
    },

    /// The attempt ran past its per-attempt deadline and was aborted
    #[error("request aborted: {0}")]
    Aborted(#[from] AttemptTimeout),

    /// The request could not be built or replayed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be read or decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Invalid client or per-call configuration
    #[error(transparent)]
    Config(#[from] CommonError),
}

impl HttpError {
    /// Network failure without an underlying reqwest error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into(), timed_out: false, source: None }
    }

    /// Status code of a [`HttpError::Status`] failure
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl DescribeFailure for HttpError {
    fn failure_info(&self) -> ErrorInfo {
        let message = self.to_string();
        match self {
            Self::Status { status, .. } => {
                ErrorInfo::new(FailureKind::Http(status.as_u16()), message)
                    .with_code(status.as_str())
            }
            Self::Network { timed_out: true, .. } => ErrorInfo::new(FailureKind::Timeout, message),
            Self::Network { .. } => ErrorInfo::new(FailureKind::Network, message),
            Self::Aborted(_) => ErrorInfo::new(FailureKind::Aborted, message),
            Self::InvalidRequest(_) | Self::Decode(_) | Self::Config(_) => {
                ErrorInfo::new(FailureKind::Unknown, message)
            }
        }
    }
}
