//! Storage error types
//!
//! Defines all errors that can occur in the log store.

use thiserror::Error;

/// Errors that can occur in the log store
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed (creating the database directory, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite rejected a statement or the connection failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Metadata could not be encoded as JSON text
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored row could not be mapped back into a record
    #[error("Corrupt record {id}: {reason}")]
    Corruption { id: i64, reason: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
