//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Every engine-specific failure is converted into one of these variants
/// inside the backend that produced it, so callers never match on
/// `redb` or `rusqlite` error types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The underlying engine reported a failure.
    #[error("{engine} engine error: {message}")]
    Engine {
        /// Engine that produced the error.
        engine: &'static str,
        /// The engine's message.
        message: String,
    },

    /// The storage file is corrupted or needs recovery.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A table was used before it was created.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A table or column name is not a plain identifier.
    #[error("invalid identifier: {0}")]
    InvalidName(String),

    /// A transaction call arrived in the wrong state.
    #[error("transaction state: {0}")]
    TransactionState(String),

    /// Another handle holds the engine's exclusive file lock.
    #[error("storage locked: {0}")]
    Locked(String),

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Creates an engine error.
    pub fn engine(engine: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            engine,
            message: message.into(),
        }
    }

    /// Creates a transaction state error.
    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState(message.into())
    }
}
