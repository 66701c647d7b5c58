//! Errors produced by the store adapter.

use std::fmt;

use wayfare_common::resilience::{
    AttemptTimeout, DescribeFailure, ErrorInfo, FailureKind, StoreFault,
};
use wayfare_common::CommonError;

/// Store failure normalised at the driver boundary.
///
/// `fault` is the closed tag classifiers match on; `code` keeps the driver's
/// own identifier (ORM error code, errno name, SQLite extended code) for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    fault: StoreFault,
    code: Option<String>,
    message: String,
}

impl StoreError {
    /// Create an error without a driver code
    pub fn new(fault: StoreFault, message: impl Into<String>) -> Self {
        Self { fault, code: None, message: message.into() }
    }

    /// Attach the driver code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build an error from a driver code reported by an ORM or the socket
    /// layer. Unrecognised codes map to [`StoreFault::Other`].
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self::new(fault_for_code(&code), message).with_code(code)
    }

    /// Normalised fault used for classification
    pub fn fault(&self) -> StoreFault {
        self.fault
    }

    /// Driver code, e.g. `P2002` or `SQLITE_2067`
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Driver message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Map ORM-style (`P1xxx`/`P2xxx`) and errno codes onto store faults.
pub fn fault_for_code(code: &str) -> StoreFault {
    match code {
        // Can't reach database server
        "P1001" => StoreFault::ConnectionError,
        // Server reached but timed out / operations timed out
        "P1002" | "P1008" => StoreFault::OperationTimedOut,
        // Server closed the connection
        "P1017" => StoreFault::ConnectionClosed,
        // Timed out fetching a connection from the pool
        "P2024" => StoreFault::QueryTimeout,
        "P2002" => StoreFault::UniqueViolation,
        "P2003" => StoreFault::ForeignKeyViolation,
        "P2001" | "P2018" | "P2025" => StoreFault::NotFound,
        "P2000" | "P2005" | "P2006" | "P2007" | "P2011" | "P2012" | "P2013" | "P2019"
        | "P2020" => StoreFault::Validation,
        "ECONNRESET" => StoreFault::ConnectionReset,
        "ECONNREFUSED" | "ENOTFOUND" | "EHOSTUNREACH" => StoreFault::ConnectionError,
        "ETIMEDOUT" => StoreFault::OperationTimedOut,
        "EPIPE" => StoreFault::ConnectionClosed,
        _ => StoreFault::Other,
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "store error [{} {}]: {}", self.fault, code, self.message),
            None => write!(f, "store error [{}]: {}", self.fault, self.message),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<AttemptTimeout> for StoreError {
    fn from(timeout: AttemptTimeout) -> Self {
        Self::new(StoreFault::OperationTimedOut, timeout.to_string()).with_code("ATTEMPT_TIMEOUT")
    }
}

impl From<CommonError> for StoreError {
    fn from(err: CommonError) -> Self {
        Self::new(StoreFault::Validation, err.to_string()).with_code("INVALID_POLICY")
    }
}

impl DescribeFailure for StoreError {
    fn failure_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(FailureKind::Store(self.fault), self.message.clone());
        match &self.code {
            Some(code) => info.with_code(code.clone()),
            None => info,
        }
    }

    fn failure_kind(&self) -> FailureKind {
        FailureKind::Store(self.fault)
    }
}
