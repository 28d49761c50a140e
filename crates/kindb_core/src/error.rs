//! Error types for kindb core.

use crate::model::{Handle, RecordKind};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in kindb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Backend I/O, corruption or recovery failure.
    #[error("storage fault: {0}")]
    StorageFault(#[from] kindb_storage::StorageError),

    /// Payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] kindb_codec::CodecError),

    /// I/O error outside the storage engine (lock file, directory).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No record with this handle exists.
    #[error("{kind} not found: {handle}")]
    HandleNotFound {
        /// Kind that was searched.
        kind: RecordKind,
        /// The missing handle.
        handle: Handle,
    },

    /// A transaction was begun while another was open.
    ///
    /// The transaction that was open has been aborted.
    #[error("transaction conflict: '{active}' was still open and has been aborted")]
    TransactionConflict {
        /// Description of the aborted transaction.
        active: String,
    },

    /// The stored schema version cannot be opened as is.
    #[error("schema version {found} (supported {supported}): {reason}")]
    SchemaVersion {
        /// Version found on disk.
        found: u32,
        /// Version this build writes.
        supported: u32,
        /// Why the store was refused.
        reason: String,
    },

    /// A query set was modified after iteration started.
    #[error("invalid query order: {message}")]
    InvalidQueryOrder {
        /// What was attempted.
        message: String,
    },

    /// A predicate could not be evaluated.
    #[error("invalid predicate: {message}")]
    InvalidPredicate {
        /// Description of the problem.
        message: String,
    },

    /// Stored relationships do not match the requested change.
    ///
    /// Raised before anything is written; the caller should abort the
    /// transaction.
    #[error("referential inconsistency: {message}")]
    ReferentialInconsistency {
        /// Description of the mismatch.
        message: String,
    },

    /// Another process holds the store lock.
    #[error("database locked: {path}")]
    DatabaseLocked {
        /// Lock file path.
        path: String,
    },

    /// The store was opened read-only.
    #[error("database is read-only")]
    ReadOnly,

    /// The store is closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Invalid database layout.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// An upgrade step failed.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a handle-not-found error.
    pub fn handle_not_found(kind: RecordKind, handle: &Handle) -> Self {
        Self::HandleNotFound {
            kind,
            handle: handle.clone(),
        }
    }

    /// Creates an invalid query order error.
    pub fn invalid_query_order(message: impl Into<String>) -> Self {
        Self::InvalidQueryOrder {
            message: message.into(),
        }
    }

    /// Creates an invalid predicate error.
    pub fn invalid_predicate(message: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            message: message.into(),
        }
    }

    /// Creates a referential inconsistency error.
    pub fn referential_inconsistency(message: impl Into<String>) -> Self {
        Self::ReferentialInconsistency {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a migration failed error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }

    /// Returns true for errors that mean the record is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HandleNotFound { .. })
    }
}
