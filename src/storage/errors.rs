//! Error types for persistent storage.

use thiserror::Error;

/// Storage error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A stored row holds a value the model cannot represent.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// An account with this email already exists.
    #[error("email already registered")]
    DuplicateEmail,
    /// Referenced row does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Convenience result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
