//! Transactions and the undo history.
//!
//! A [`Transaction`] is a token handed out by the store. All writes name
//! the token; the store keeps the log itself. Only one transaction can be
//! open at a time.

mod log;
mod undo;

pub(crate) use log::{change_groups, ActiveTxn, ChangeGroups, DerivedSnapshot, DirectWrite, LogEntry};
pub use log::{CommittedTxn, RecordOp};
pub use undo::UndoHistory;

use crate::types::TransactionId;

/// An open unit of work.
///
/// Obtained from `Store::begin_transaction` and consumed by
/// `commit_transaction` or `abort_transaction`. Prefer
/// `Store::with_transaction`, which commits on success and aborts on
/// error.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    description: String,
    batch: bool,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, description: String, batch: bool) -> Self {
        Self {
            id,
            description,
            batch,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the description given at begin.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// True for batch transactions, which are not undoable.
    #[must_use]
    pub fn is_batch(&self) -> bool {
        self.batch
    }

    /// Changes the description, e.g. once the edit is known.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }
}
