//! Transaction lifecycle, undo and redo.

use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::Store;
use crate::dispatch::descriptor;
use crate::error::{CoreError, CoreResult};
use crate::index::reference::{delete_edge, put_edge, rebuild_backlinks};
use crate::index::secondary::{clear_fields, rebuild_fields, write_fields, FieldSet};
use crate::model::{Person, Record, RecordKind};
use crate::signals::Signal;
use crate::transaction::{change_groups, ActiveTxn, ChangeGroups, CommittedTxn, DirectWrite, LogEntry, Transaction};

impl Store {
    /// Begins a transaction.
    ///
    /// Batch transactions are not undoable. During a batch only lookup
    /// fields (external IDs, tag names, enclosing places) are kept
    /// current; sort fields and backlinks are rebuilt once after commit.
    ///
    /// # Errors
    ///
    /// If a transaction is already open it is aborted and
    /// `TransactionConflict` is returned. Also fails with `ReadOnly` or
    /// `DatabaseClosed`.
    pub fn begin_transaction(&mut self, description: &str, batch: bool) -> CoreResult<Transaction> {
        self.ensure_writable()?;
        if let Some(active) = self.active.take() {
            let previous = active.description.clone();
            warn!(txn = %active.id, description = %previous, "second transaction begun; aborting the open one");
            self.rollback_active(active)?;
            return Err(CoreError::TransactionConflict { active: previous });
        }
        let id = self.next_txn;
        self.next_txn = id.next();
        self.backend.begin()?;
        self.active = Some(ActiveTxn::new(id, description.to_string(), batch, self.snapshot()));
        debug!(txn = %id, description, batch, "began transaction");
        Ok(Transaction::new(id, description.to_string(), batch))
    }

    /// True while a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.active.is_some()
    }

    /// Commits `txn`, records it for undo and emits notifications.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `txn` is not the open transaction, or
    /// a storage error. On a storage error the transaction is rolled back.
    pub fn commit_transaction(&mut self, txn: Transaction) -> CoreResult<()> {
        self.ensure_open()?;
        let active = self.take_active(&txn)?;

        if let Err(e) = self.persist_derived() {
            self.rollback_active(active)?;
            return Err(e);
        }
        if let Err(e) = self.backend.commit() {
            if self.backend.in_transaction() {
                self.rollback_active(active)?;
            } else {
                self.restore(active.snapshot);
            }
            return Err(e.into());
        }

        let description = txn.description().to_string();
        if active.batch {
            self.finish_batch(active, description)
        } else {
            self.finish_interactive(active, description);
            Ok(())
        }
    }

    fn finish_interactive(&mut self, active: ActiveTxn, description: String) {
        let groups = change_groups(&active.entries, false);
        let committed = CommittedTxn {
            id: active.id,
            description: description.clone(),
            timestamp: Utc::now().timestamp(),
            entries: active.entries,
        };
        debug!(
            txn = %committed.id,
            description = %description,
            records = committed.record_changes(),
            "committed transaction"
        );
        if committed.record_changes() > 0 {
            self.history.push(committed);
        }
        self.emit_groups(groups);
        self.signals.emit(&Signal::TransactionCommitted {
            description,
            batch: false,
        });
    }

    fn finish_batch(&mut self, active: ActiveTxn, description: String) -> CoreResult<()> {
        self.history.clear();
        self.reattach(&active.touched)?;
        debug!(
            txn = %active.id,
            description = %description,
            kinds = active.touched.len(),
            "committed batch transaction"
        );
        for kind in &active.touched {
            self.signals.emit(&Signal::Rebuilt(*kind));
        }
        self.signals.emit(&Signal::TransactionCommitted {
            description,
            batch: true,
        });
        Ok(())
    }

    /// Rebuilds what a batch leaves detached: sort fields of the touched
    /// kinds, then backlinks, then the surname list.
    fn reattach(&mut self, touched: &BTreeSet<RecordKind>) -> CoreResult<()> {
        if touched.is_empty() {
            return Ok(());
        }
        self.backend.begin()?;
        match self.rebuild_detached(touched) {
            Ok(()) => self.backend.commit()?,
            Err(e) => {
                let _ = self.backend.rollback();
                return Err(e);
            }
        }
        self.rebuild_surnames()
    }

    fn rebuild_detached(&mut self, touched: &BTreeSet<RecordKind>) -> CoreResult<()> {
        for kind in touched {
            rebuild_fields(&mut *self.backend, self.serializer, descriptor(*kind), FieldSet::Sort, || {})?;
        }
        rebuild_backlinks(&mut *self.backend, self.serializer)?;
        Ok(())
    }

    /// Aborts `txn`, discarding its writes.
    ///
    /// Engines without native rollback replay the change log backwards.
    /// For a batch transaction there is no log; see
    /// [`Store::begin_transaction`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `txn` is not the open transaction, or
    /// a storage error.
    pub fn abort_transaction(&mut self, txn: Transaction) -> CoreResult<()> {
        self.ensure_open()?;
        let active = self.take_active(&txn)?;
        self.rollback_active(active)
    }

    fn take_active(&mut self, txn: &Transaction) -> CoreResult<ActiveTxn> {
        self.check_txn(txn)?;
        self.active
            .take()
            .ok_or_else(|| CoreError::invalid_operation(format!("{} is not open", txn.id())))
    }

    /// Re-applies writes that are not part of a transaction after the
    /// engine rolled them back along with it.
    fn replay_direct(&mut self, writes: &[DirectWrite]) -> CoreResult<()> {
        for write in writes {
            match &write.value {
                Some(bytes) => self.backend.put(write.table, &write.key, bytes)?,
                None => {
                    self.backend.delete(write.table, &write.key)?;
                }
            }
        }
        if !writes.is_empty() {
            debug!(writes = writes.len(), "replayed direct writes after rollback");
        }
        Ok(())
    }

    pub(super) fn rollback_active(&mut self, active: ActiveTxn) -> CoreResult<()> {
        let ActiveTxn {
            id,
            batch,
            entries,
            touched,
            snapshot,
            direct,
            ..
        } = active;

        if self.backend.supports_rollback() {
            if self.backend.in_transaction() {
                self.backend.rollback()?;
            }
            self.restore(snapshot);
            self.replay_direct(&direct)?;
        } else if !batch {
            let replayed = entries
                .iter()
                .rev()
                .try_for_each(|entry| self.apply_raw(&entry.inverted(), false));
            if self.backend.in_transaction() {
                self.backend.rollback()?;
            }
            self.restore(snapshot);
            replayed?;
        } else {
            warn!(
                txn = %id,
                backend = self.backend.name(),
                "batch abort without native rollback is best effort; writes made so far are kept"
            );
            if self.backend.in_transaction() {
                self.backend.rollback()?;
            }
            self.restore(snapshot);
            self.stats = self.count_gender_stats()?;
            self.reattach(&touched)?;
        }
        debug!(txn = %id, batch, "aborted transaction");
        Ok(())
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits if `f` returns `Ok`, aborts if it returns `Err`. The error
    /// from `f` is returned unchanged.
    ///
    /// # Errors
    ///
    /// Whatever `f`, begin or commit return.
    pub fn with_transaction<T, F>(&mut self, description: &str, batch: bool, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Self, &Transaction) -> CoreResult<T>,
    {
        let txn = self.begin_transaction(description, batch)?;
        match f(self, &txn) {
            Ok(value) => {
                self.commit_transaction(txn)?;
                Ok(value)
            }
            Err(e) => {
                if self.check_txn(&txn).is_ok() {
                    if let Err(abort) = self.abort_transaction(txn) {
                        warn!(error = %abort, "abort after failed transaction body also failed");
                    }
                }
                Err(e)
            }
        }
    }

    /// Reverts the most recent interactive transaction.
    ///
    /// Returns false if there is nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` while a transaction is open, or a
    /// storage error; on error the transaction stays undoable.
    pub fn undo(&mut self) -> CoreResult<bool> {
        self.ensure_writable()?;
        if self.active.is_some() {
            return Err(CoreError::invalid_operation("cannot undo while a transaction is open"));
        }
        let Some(txn) = self.history.pop_undo() else {
            return Ok(false);
        };
        if let Err(e) = self.replay(&txn.entries, true) {
            self.history.push_undone(txn);
            return Err(e);
        }
        debug!(txn = %txn.id, description = %txn.description, "undid transaction");
        let groups = change_groups(&txn.entries, true);
        let description = txn.description.clone();
        self.history.push_redo(txn);
        self.emit_groups(groups);
        self.signals.emit(&Signal::UndoApplied { description });
        Ok(true)
    }

    /// Re-applies the most recently undone transaction.
    ///
    /// Returns false if there is nothing to redo.
    ///
    /// # Errors
    ///
    /// As for [`Store::undo`].
    pub fn redo(&mut self) -> CoreResult<bool> {
        self.ensure_writable()?;
        if self.active.is_some() {
            return Err(CoreError::invalid_operation("cannot redo while a transaction is open"));
        }
        let Some(txn) = self.history.pop_redo() else {
            return Ok(false);
        };
        if let Err(e) = self.replay(&txn.entries, false) {
            self.history.push_redo(txn);
            return Err(e);
        }
        debug!(txn = %txn.id, description = %txn.description, "redid transaction");
        let groups = change_groups(&txn.entries, false);
        let description = txn.description.clone();
        self.history.push_undone(txn);
        self.emit_groups(groups);
        self.signals.emit(&Signal::RedoApplied { description });
        Ok(true)
    }

    /// True if [`Store::undo`] has something to revert.
    #[must_use]
    pub fn undo_available(&self) -> bool {
        self.history.undo_available()
    }

    /// True if [`Store::redo`] has something to re-apply.
    #[must_use]
    pub fn redo_available(&self) -> bool {
        self.history.redo_available()
    }

    /// Descriptions of undoable transactions, most recent first.
    #[must_use]
    pub fn undo_history(&self) -> Vec<String> {
        self.history.undo_descriptions()
    }

    /// Descriptions of redoable transactions, next first.
    #[must_use]
    pub fn redo_history(&self) -> Vec<String> {
        self.history.redo_descriptions()
    }

    /// Applies a logged transaction in one engine transaction.
    fn replay(&mut self, entries: &[LogEntry], backwards: bool) -> CoreResult<()> {
        let snapshot = self.snapshot();
        self.backend.begin()?;
        let applied = if backwards {
            entries
                .iter()
                .rev()
                .try_for_each(|entry| self.apply_raw(&entry.inverted(), true))
        } else {
            entries.iter().try_for_each(|entry| self.apply_raw(entry, true))
        };
        match applied.and_then(|()| self.persist_derived()) {
            Ok(()) => {
                self.backend.commit()?;
                Ok(())
            }
            Err(e) => {
                if !self.backend.supports_rollback() {
                    warn!(backend = self.backend.name(), "replay failed part way; earlier entries stay applied");
                }
                let _ = self.backend.rollback();
                self.restore(snapshot);
                Err(e)
            }
        }
    }

    /// Writes the `new` side of one log entry.
    ///
    /// Secondary fields always follow. With `derived`, gender statistics,
    /// the surname list and vocabularies follow too; otherwise the caller
    /// restores them from a snapshot.
    fn apply_raw(&mut self, entry: &LogEntry, derived: bool) -> CoreResult<()> {
        match entry {
            LogEntry::Record {
                kind, handle, new, ..
            } => {
                let desc = descriptor(*kind);
                let key = handle.as_str();
                let person_side = derived && *kind == RecordKind::Person;
                let previous: Option<Person> = if person_side {
                    self.backend
                        .get(desc.table, key)?
                        .map(|bytes| self.serializer.decode(&bytes))
                        .transpose()?
                } else {
                    None
                };
                let next = match new {
                    Some(bytes) => {
                        self.backend.put(desc.table, key, bytes)?;
                        let record = Record::decode(*kind, self.serializer, bytes)?;
                        write_fields(&mut *self.backend, desc, key, &record, FieldSet::All)?;
                        if derived {
                            self.vocab.extend(record.custom_types());
                        }
                        record.into_type::<Person>()
                    }
                    None => {
                        clear_fields(&mut *self.backend, desc, key, FieldSet::All)?;
                        self.backend.delete(desc.table, key)?;
                        None
                    }
                };
                if person_side {
                    self.adjust_person(previous.as_ref(), next.as_ref(), true)?;
                }
            }
            LogEntry::Reference {
                key, target, new, ..
            } => match new {
                Some(bytes) => put_edge(&mut *self.backend, key, bytes, target, true)?,
                None => delete_edge(&mut *self.backend, key)?,
            },
        }
        Ok(())
    }

    fn emit_groups(&self, groups: ChangeGroups) {
        for (kind, handles) in groups.deleted {
            self.signals.emit(&Signal::Deleted(kind, handles));
        }
        for (kind, handles) in groups.added {
            self.signals.emit(&Signal::Added(kind, handles));
        }
        for (kind, handles) in groups.updated {
            self.signals.emit(&Signal::Updated(kind, handles));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::contract::{ReadableStore, WritableStore};
    use crate::model::{Gender, Note};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn memory() -> Store {
        Store::open_in_memory(Config::default()).unwrap()
    }

    fn record_signals(store: &Store) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.signals().connect(move |signal| sink.lock().push(signal.name()));
        seen
    }

    #[test]
    fn conflicting_begin_aborts_the_open_transaction() {
        let mut store = memory();
        let first = store.begin_transaction("first", false).unwrap();
        let mut note = Note::new("draft");
        store.add_note(&mut note, &first, true).unwrap();

        let err = store.begin_transaction("second", false).unwrap_err();
        assert!(matches!(err, CoreError::TransactionConflict { ref active } if active == "first"));
        assert!(!store.in_transaction());
        assert_eq!(store.count_notes().unwrap(), 0);
        assert!(store.commit_transaction(first).is_err());
    }

    #[test]
    fn notifications_follow_commit_in_group_order() {
        let mut store = memory();
        let keep = store
            .with_transaction("seed", false, |s, txn| s.add_note(&mut Note::new("keep"), txn, true))
            .unwrap();
        let seen = record_signals(&store);

        store
            .with_transaction("mixed", false, |s, txn| {
                let mut note = s.get_note(&keep)?;
                note.text = "changed".into();
                s.commit_note(&mut note, txn, None)?;
                let gone = s.add_note(&mut Note::new("temporary"), txn, true)?;
                s.remove_note(&gone, txn)?;
                s.add_person(&mut Person::new("Anna", "Garner", Gender::Female), txn, true)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec!["note-delete", "person-add", "note-update", "transaction-committed"]
        );
    }

    #[test]
    fn nothing_is_emitted_for_aborted_work() {
        let mut store = memory();
        let seen = record_signals(&store);
        let result: CoreResult<()> = store.with_transaction("fails", false, |s, txn| {
            s.add_note(&mut Note::new("lost"), txn, true)?;
            Err(CoreError::invalid_operation("stop"))
        });
        assert!(result.is_err());
        assert!(seen.lock().is_empty());
        assert_eq!(store.count_notes().unwrap(), 0);
    }

    #[test]
    fn undo_emits_swapped_signals() {
        let mut store = memory();
        store
            .with_transaction("add", false, |s, txn| s.add_note(&mut Note::new("n"), txn, true))
            .unwrap();
        let seen = record_signals(&store);
        assert!(store.undo().unwrap());
        assert_eq!(*seen.lock(), vec!["note-delete", "undo-applied"]);
        assert!(store.redo().unwrap());
        assert_eq!(seen.lock()[2..], ["note-add".to_string(), "redo-applied".to_string()]);
    }

    #[test]
    fn undo_is_refused_inside_a_transaction() {
        let mut store = memory();
        let txn = store.begin_transaction("open", false).unwrap();
        assert!(matches!(store.undo(), Err(CoreError::InvalidOperation { .. })));
        store.abort_transaction(txn).unwrap();
        assert!(!store.undo().unwrap());
    }

    #[test]
    fn empty_transactions_are_not_undoable() {
        let mut store = memory();
        store.with_transaction("nothing", false, |_, _| Ok(())).unwrap();
        assert!(!store.undo_available());
    }

    #[test]
    fn batch_commit_emits_rebuild_signals() {
        let mut store = memory();
        let seen = record_signals(&store);
        store
            .with_transaction("import", true, |s, txn| {
                s.add_person(&mut Person::new("Anna", "Garner", Gender::Female), txn, true)?;
                s.add_note(&mut Note::new("n"), txn, true)
            })
            .unwrap();
        assert_eq!(
            *seen.lock(),
            vec!["person-rebuild", "note-rebuild", "transaction-committed"]
        );
        assert_eq!(store.surname_list(), ["Garner".to_string()]);
    }
}
