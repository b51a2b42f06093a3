//! Error types for every layer of the service.
//!
//! Each layer owns one enum: configuration, store, validation, operation
//! contracts, and server startup. Handlers never swallow errors; the HTTP
//! boundary maps `OperationError` variants onto status codes.

use thiserror::Error;

/// Configuration loading failures. Always names the offending key.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value '{key}'")]
    MissingValue { key: String },

    #[error("invalid configuration value '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Store-level failures, backend-agnostic.
///
/// Unique-constraint violations get their own variant so the operation
/// layer can surface them as a distinct error kind instead of a generic
/// persistence failure.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("unique constraint violated on {constraint}")]
    UniqueViolation { constraint: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DatabaseError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            if db_err.code() == &tokio_postgres::error::SqlState::UNIQUE_VIOLATION {
                return DatabaseError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        DatabaseError::Query(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        DatabaseError::Pool(err.to_string())
    }
}

/// libsql reports constraint failures as e.g.
/// "SQLite failure: `UNIQUE constraint failed: clients.email`".
#[cfg(feature = "libsql")]
fn unique_constraint_from_message(message: &str) -> Option<String> {
    const MARKER: &str = "UNIQUE constraint failed: ";
    let idx = message.find(MARKER)?;
    let rest = &message[idx + MARKER.len()..];
    let constraint = rest
        .split(|c: char| c == '`' || c.is_whitespace())
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown");
    Some(constraint.to_string())
}

#[cfg(feature = "libsql")]
impl From<libsql::Error> for DatabaseError {
    fn from(err: libsql::Error) -> Self {
        let message = err.to_string();
        if let Some(constraint) = unique_constraint_from_message(&message) {
            return DatabaseError::UniqueViolation { constraint };
        }
        DatabaseError::Query(message)
    }
}

/// Input failed a shape or domain constraint. Raised before any store
/// access, with the offending field named.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid '{field}': {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationError {
    pub fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Failure modes of the operation contracts.
///
/// `NotFound` covers update/mark-paid targets; plain gets report absence as
/// `Ok(None)` instead. Policy refusals (deleting a client that still has
/// invoices) are a boolean `false` result, never an error.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Client with ID {id} not found")]
    ClientNotFound { id: i32 },

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("unique constraint violated on {constraint}")]
    UniqueViolation { constraint: String },

    #[error(transparent)]
    Store(DatabaseError),
}

impl From<DatabaseError> for OperationError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation { constraint } => {
                OperationError::UniqueViolation { constraint }
            }
            other => OperationError::Store(other),
        }
    }
}

/// Server startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to start server: {reason}")]
    StartupFailed { reason: String },
}
