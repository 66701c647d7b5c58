//! Failure classification for the call executor.
//!
//! Every boundary error (HTTP, store driver, per-attempt timeout) describes
//! itself as an [`ErrorInfo`] record through [`DescribeFailure`]. Classifiers
//! match on the closed [`FailureKind`] tag of that record and return a
//! [`Classification`]. Nothing here inspects human-readable messages.
//!
//! All classifiers fail closed: a kind they cannot positively identify as
//! transient is [`Classification::Permanent`].

use std::fmt;
use std::sync::Arc;

/// Verdict assigned to an observed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// The failure is transient; another attempt may succeed.
    Retryable,
    /// The failure is terminal; surface it immediately.
    Permanent,
}

impl Classification {
    /// Returns `true` for [`Classification::Retryable`].
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// Store-driver failure identifiers, normalised at the store boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFault {
    /// The server closed the connection.
    ConnectionClosed,
    /// The connection was reset by the peer.
    ConnectionReset,
    /// The operation did not complete in time (busy/locked, socket timeout).
    OperationTimedOut,
    /// The client could not obtain a working connection (unreachable server,
    /// pool checkout timeout).
    ConnectionError,
    /// The query itself exceeded its time limit.
    QueryTimeout,
    /// A uniqueness constraint rejected the write.
    UniqueViolation,
    /// A foreign-key constraint rejected the write.
    ForeignKeyViolation,
    /// The addressed record does not exist.
    NotFound,
    /// The input was rejected by the store (bad value, bad parameter).
    Validation,
    /// Any other driver failure.
    Other,
}

impl StoreFault {
    /// Whether this fault is one of the connection or timeout faults that may
    /// clear up on their own.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::ConnectionReset
                | Self::OperationTimedOut
                | Self::ConnectionError
                | Self::QueryTimeout
        )
    }

    /// Stable snake_case name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionClosed => "connection_closed",
            Self::ConnectionReset => "connection_reset",
            Self::OperationTimedOut => "operation_timed_out",
            Self::ConnectionError => "connection_error",
            Self::QueryTimeout => "query_timeout",
            Self::UniqueViolation => "unique_violation",
            Self::ForeignKeyViolation => "foreign_key_violation",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of failure kinds produced at the adapter boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connection refused/reset, DNS failure, generic fetch failure.
    Network,
    /// A deadline elapsed (per-attempt timeout or transport timeout).
    Timeout,
    /// The attempt was aborted through its cancellation token.
    Aborted,
    /// The remote answered with this HTTP status.
    Http(u16),
    /// A normalised store-driver failure.
    Store(StoreFault),
    /// Anything the boundary could not identify.
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Timeout => f.write_str("timeout"),
            Self::Aborted => f.write_str("aborted"),
            Self::Http(status) => write!(f, "http_{status}"),
            Self::Store(fault) => write!(f, "store_{fault}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Structured description of a failure: kind tag, optional driver or status
/// code, and the human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Boundary classification of the failure
    pub kind: FailureKind,
    /// Driver or protocol code, when the boundary has one
    pub code: Option<String>,
    /// Human-readable description
    pub message: String,
}

impl ErrorInfo {
    /// Create a record without a code
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, code: None, message: message.into() }
    }

    /// Attach a driver or protocol code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{} {}] {}", self.kind, code, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Errors that can describe themselves as an [`ErrorInfo`].
pub trait DescribeFailure {
    /// Full structured description of the failure.
    fn failure_info(&self) -> ErrorInfo;

    /// Kind tag only. Override when the full record is expensive to build.
    fn failure_kind(&self) -> FailureKind {
        self.failure_info().kind
    }
}

impl<T: DescribeFailure + ?Sized> DescribeFailure for &T {
    fn failure_info(&self) -> ErrorInfo {
        (**self).failure_info()
    }

    fn failure_kind(&self) -> FailureKind {
        (**self).failure_kind()
    }
}

/// Maps an error to a [`Classification`]. Implementations must be pure.
pub trait ErrorClassifier<E: ?Sized> {
    fn classify(&self, error: &E) -> Classification;
}

impl<E: ?Sized, C: ErrorClassifier<E> + ?Sized> ErrorClassifier<E> for &C {
    fn classify(&self, error: &E) -> Classification {
        (**self).classify(error)
    }
}

impl<E: ?Sized, C: ErrorClassifier<E> + ?Sized> ErrorClassifier<E> for Arc<C> {
    fn classify(&self, error: &E) -> Classification {
        (**self).classify(error)
    }
}

/// HTTP-aware classifier: 5xx and transport failures retry, 4xx and anything
/// unrecognised do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpClassifier;

impl HttpClassifier {
    /// 5xx is retryable; every other status is terminal.
    pub fn classify_status(status: u16) -> Classification {
        match status {
            500..=599 => Classification::Retryable,
            _ => Classification::Permanent,
        }
    }

    /// Verdict for a failure kind under the HTTP rules
    pub fn classify_kind(kind: FailureKind) -> Classification {
        match kind {
            FailureKind::Network | FailureKind::Timeout | FailureKind::Aborted => {
                Classification::Retryable
            }
            FailureKind::Http(status) => Self::classify_status(status),
            FailureKind::Store(_) | FailureKind::Unknown => Classification::Permanent,
        }
    }
}

impl<E: DescribeFailure + ?Sized> ErrorClassifier<E> for HttpClassifier {
    fn classify(&self, error: &E) -> Classification {
        Self::classify_kind(error.failure_kind())
    }
}

/// Store classifier: only connection and timeout faults retry. Constraint
/// violations, missing records, validation failures and every non-store
/// kind are permanent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreClassifier;

impl StoreClassifier {
    /// Verdict for a failure kind under the store rules
    pub fn classify_kind(kind: FailureKind) -> Classification {
        match kind {
            FailureKind::Store(fault) if fault.is_transient() => Classification::Retryable,
            FailureKind::Timeout => Classification::Retryable,
            _ => Classification::Permanent,
        }
    }
}

impl<E: DescribeFailure + ?Sized> ErrorClassifier<E> for StoreClassifier {
    fn classify(&self, error: &E) -> Classification {
        Self::classify_kind(error.failure_kind())
    }
}

/// Classifier for query-cache reads and mutations.
///
/// Applies the HTTP rule to the error surfaced by the fetcher, with 4xx
/// checked first so client errors stay terminal regardless of how many
/// attempts remain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryClassifier;

impl QueryClassifier {
    /// Verdict for a failure kind under the query-cache rules
    pub fn classify_kind(kind: FailureKind) -> Classification {
        match kind {
            FailureKind::Http(400..=499) => Classification::Permanent,
            other => HttpClassifier::classify_kind(other),
        }
    }
}

impl<E: DescribeFailure + ?Sized> ErrorClassifier<E> for QueryClassifier {
    fn classify(&self, error: &E) -> Classification {
        Self::classify_kind(error.failure_kind())
    }
}

/// Classifier backed by a closure, for call sites with their own error types.
#[derive(Debug, Clone)]
pub struct FnClassifier<F> {
    classify: F,
}

impl<F> FnClassifier<F> {
    /// Wrap a closure as a classifier
    pub fn new(classify: F) -> Self {
        Self { classify }
    }
}

impl<E: ?Sized, F> ErrorClassifier<E> for FnClassifier<F>
where
    F: Fn(&E) -> Classification,
{
    fn classify(&self, error: &E) -> Classification {
        (self.classify)(error)
    }
}

/// Build a [`FnClassifier`] from a closure.
pub fn classify_with<F>(classify: F) -> FnClassifier<F> {
    FnClassifier::new(classify)
}
