//! Error types for the todo store.
//!
//! # Design
//! `NotFound` gets a dedicated variant because handlers map it to 404 while
//! every other storage failure is a 500. `StorageUnavailable` is split from
//! `Storage` so callers can tell "the store is gone" (closed pool, unopenable
//! file) from "this query failed".

use thiserror::Error;

/// Result alias used throughout the repository.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by `TodoRepository` and input validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The input failed validation (empty title, blank patch field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// No todo exists with the given id.
    #[error("todo {0} not found")]
    NotFound(i64),

    /// The store cannot be reached: closed, never opened, or the file is
    /// inaccessible.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other query or I/O failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("field '{field}' cannot be empty"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => StoreError::StorageUnavailable(err.to_string()),
            other => StoreError::Storage(other.to_string()),
        }
    }
}
