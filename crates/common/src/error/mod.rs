//! Common error types shared across Wayfare crates.
//!
//! `CommonError` covers the failure patterns that are not specific to any one
//! adapter: invalid configuration, unreadable configuration sources and
//! serialization problems. Adapter errors (`HttpError`, `StoreError`) live
//! next to their adapters and are never wrapped into `CommonError`; the call
//! executor hands them back to the caller unchanged.
//!
//! ## When to Use CommonError
//!
//! | Pattern | CommonError Variant | When to Use |
//! |---------|-------------------|-------------|
//! | **Configuration** | `Config` | Invalid retry policy, bad override values |
//! | **Serialization** | `Serialization` | TOML/JSON parsing of config files |
//! | **Persistence** | `Persistence` | Reading config files from disk |

use std::fmt;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Configuration-related errors
    Config {
        /// What is wrong
        message: String,
        /// Offending field or environment variable, when known
        field: Option<String>,
    },

    /// Serialization or deserialization errors
    Serialization {
        /// Parser message
        message: String,
        /// Format being parsed, e.g. `TOML`
        format: Option<String>,
    },

    /// Data persistence errors (file I/O)
    Persistence {
        /// I/O error message
        message: String,
        /// Operation that failed, e.g. `read_config`
        operation: Option<String>,
    },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field } => {
                if let Some(field) = field {
                    write!(f, "Configuration error in field '{}': {}", field, message)
                } else {
                    write!(f, "Configuration error: {}", message)
                }
            }
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Persistence { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Persistence error during '{}': {}", op, message)
                } else {
                    write!(f, "Persistence error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error for a specific field
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a persistence error for a specific operation
    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_field() {
        let err = CommonError::config_field("http.retries", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Configuration error in field 'http.retries': must be at least 1"
        );

        let err = CommonError::config("base_delay exceeds max_delay");
        assert_eq!(err.to_string(), "Configuration error: base_delay exceeds max_delay");
    }

    #[test]
    fn serialization_and_persistence_display() {
        let err = CommonError::serialization_format("TOML", "expected a table");
        assert_eq!(err.to_string(), "Serialization error (TOML): expected a table");

        let err = CommonError::persistence_op("read_config", "permission denied");
        assert_eq!(err.to_string(), "Persistence error during 'read_config': permission denied");
    }
}
