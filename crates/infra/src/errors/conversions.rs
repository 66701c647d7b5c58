//! Conversions from external infrastructure errors into adapter errors.
//!
//! This is the only place driver-specific error shapes are inspected. Every
//! conversion lands on a closed [`StoreFault`] or HTTP error variant so that
//! classification never has to look at messages.

use std::sync::Arc;

use r2d2::Error as PoolError;
use reqwest::Error as ReqwestError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;
use wayfare_common::resilience::StoreFault;

use crate::database::StoreError;
use crate::http::HttpError;

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StoreError */
/* -------------------------------------------------------------------------- */

/// SQLITE_CONSTRAINT_UNIQUE
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
/// SQLITE_CONSTRAINT_PRIMARYKEY
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
/// SQLITE_CONSTRAINT_FOREIGNKEY
const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;

impl From<SqlError> for StoreError {
    fn from(err: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match err {
            RE::SqliteFailure(failure, maybe_message) => {
                let code = format!("SQLITE_{}", failure.extended_code);
                let message = maybe_message.unwrap_or_else(|| failure.to_string());
                let fault = match (failure.code, failure.extended_code) {
                    (ErrorCode::DatabaseBusy, _) | (ErrorCode::DatabaseLocked, _) => {
                        StoreFault::OperationTimedOut
                    }
                    (ErrorCode::CannotOpen, _) | (ErrorCode::NotADatabase, _) => {
                        StoreFault::ConnectionError
                    }
                    (ErrorCode::ConstraintViolation, SQLITE_CONSTRAINT_UNIQUE)
                    | (ErrorCode::ConstraintViolation, SQLITE_CONSTRAINT_PRIMARYKEY) => {
                        StoreFault::UniqueViolation
                    }
                    (ErrorCode::ConstraintViolation, SQLITE_CONSTRAINT_FOREIGNKEY) => {
                        StoreFault::ForeignKeyViolation
                    }
                    (ErrorCode::ConstraintViolation, _)
                    | (ErrorCode::TypeMismatch, _)
                    | (ErrorCode::TooBig, _) => StoreFault::Validation,
                    _ => StoreFault::Other,
                };
                StoreError::new(fault, message).with_code(code)
            }
            RE::QueryReturnedNoRows => {
                StoreError::new(StoreFault::NotFound, "no rows returned by query")
            }
            RE::FromSqlConversionFailure(_, _, cause) => StoreError::new(
                StoreFault::Validation,
                format!("failed to convert sqlite value: {cause}"),
            ),
            RE::InvalidColumnType(_, name, ty) => StoreError::new(
                StoreFault::Validation,
                format!("invalid column type for '{name}': {ty}"),
            ),
            RE::InvalidParameterName(parameter_name) => StoreError::new(
                StoreFault::Validation,
                format!("invalid parameter name: {parameter_name}"),
            ),
            RE::InvalidParameterCount(given, expected) => StoreError::new(
                StoreFault::Validation,
                format!("expected {expected} parameters, got {given}"),
            ),
            RE::InvalidPath(path) => StoreError::new(
                StoreFault::ConnectionError,
                format!("invalid database path: {}", path.to_string_lossy()),
            ),
            RE::InvalidQuery => StoreError::new(StoreFault::Validation, "invalid SQL query"),
            other => StoreError::new(StoreFault::Other, other.to_string()),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error / JoinError → StoreError */
/* -------------------------------------------------------------------------- */

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        StoreError::new(StoreFault::ConnectionError, format!("connection pool: {err}"))
            .with_code("POOL_TIMEOUT")
    }
}

impl From<JoinError> for StoreError {
    fn from(err: JoinError) -> Self {
        StoreError::new(StoreFault::Other, format!("store task failed: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → HttpError */
/* -------------------------------------------------------------------------- */

impl From<ReqwestError> for HttpError {
    fn from(err: ReqwestError) -> Self {
        if err.is_builder() {
            return HttpError::InvalidRequest(err.to_string());
        }

        if err.is_decode() {
            return HttpError::Decode(err.to_string());
        }

        if let Some(status) = err.status() {
            let url = err.url().map(ToString::to_string).unwrap_or_default();
            return HttpError::Status { status, url };
        }

        HttpError::Network {
            message: err.to_string(),
            timed_out: err.is_timeout(),
            source: Some(Arc::new(err)),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
