//! Undo and redo stacks.

use super::log::CommittedTxn;

/// Committed interactive transactions available for undo and redo.
///
/// Committing a new transaction clears the redo stack. When `depth` is
/// non-zero the oldest entries are dropped once it is exceeded.
#[derive(Debug, Default)]
pub struct UndoHistory {
    undo: Vec<CommittedTxn>,
    redo: Vec<CommittedTxn>,
    depth: usize,
}

impl UndoHistory {
    /// Creates an empty history with a depth cap (0 = unbounded).
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            depth,
        }
    }

    /// Records a freshly committed transaction.
    pub fn push(&mut self, txn: CommittedTxn) {
        self.redo.clear();
        self.undo.push(txn);
        self.trim();
    }

    fn trim(&mut self) {
        if self.depth > 0 && self.undo.len() > self.depth {
            let excess = self.undo.len() - self.depth;
            self.undo.drain(..excess);
        }
    }

    /// Takes the most recent transaction to undo.
    pub fn pop_undo(&mut self) -> Option<CommittedTxn> {
        self.undo.pop()
    }

    /// Takes the most recently undone transaction.
    pub fn pop_redo(&mut self) -> Option<CommittedTxn> {
        self.redo.pop()
    }

    /// Moves an undone transaction to the redo stack.
    pub fn push_redo(&mut self, txn: CommittedTxn) {
        self.redo.push(txn);
    }

    /// Moves a redone transaction back to the undo stack.
    pub fn push_undone(&mut self, txn: CommittedTxn) {
        self.undo.push(txn);
        self.trim();
    }

    /// True if there is something to undo.
    #[must_use]
    pub fn undo_available(&self) -> bool {
        !self.undo.is_empty()
    }

    /// True if there is something to redo.
    #[must_use]
    pub fn redo_available(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Descriptions of undoable transactions, most recent first.
    #[must_use]
    pub fn undo_descriptions(&self) -> Vec<String> {
        self.undo.iter().rev().map(|t| t.description.clone()).collect()
    }

    /// Descriptions of redoable transactions, next first.
    #[must_use]
    pub fn redo_descriptions(&self) -> Vec<String> {
        self.redo.iter().rev().map(|t| t.description.clone()).collect()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
