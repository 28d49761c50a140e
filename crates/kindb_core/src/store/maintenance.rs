//! Rebuilds and consistency checks of derived state.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::Store;
use crate::dispatch::{descriptor, REFERENCE_TABLE, REF_HANDLE};
use crate::error::CoreResult;
use crate::index::reference::{put_edge, rebuild_backlinks, ReferenceEdge};
use crate::index::secondary::{rebuild_fields, FieldSet};
use crate::metadata;
use crate::model::{Record, RecordKind};
use crate::progress::Progress;
use crate::transaction::Transaction;

/// Findings of [`Store::check_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Records examined.
    pub records: usize,
    /// Edges whose target record does not exist.
    pub dangling: Vec<ReferenceEdge>,
    /// References a record makes that have no stored edge.
    pub missing_edges: Vec<ReferenceEdge>,
    /// Stored edges no record accounts for.
    pub stale_edges: Vec<ReferenceEdge>,
    /// Stored edges the backlink field does not find.
    pub unindexed_edges: Vec<ReferenceEdge>,
}

impl IntegrityReport {
    /// True if nothing was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty()
            && self.missing_edges.is_empty()
            && self.stale_edges.is_empty()
            && self.unindexed_edges.is_empty()
    }
}

impl Store {
    fn progress<'a>(&self, callback: &'a mut dyn FnMut(u8), total: usize) -> Progress<'a> {
        Progress::new(
            callback,
            total,
            self.config.progress_interval,
            self.config.progress_step,
        )
    }

    fn total_records(&self) -> CoreResult<usize> {
        let mut total = 0;
        for kind in RecordKind::ALL {
            total += self.backend.count(kind.table())?;
        }
        Ok(total)
    }

    /// Recomputes the whole reference map from every record.
    ///
    /// Runs as a batch transaction, so it clears the undo history.
    /// Returns the number of edges written.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly`, `TransactionConflict` or a storage error.
    pub fn reindex_reference_map(&mut self, progress: &mut dyn FnMut(u8)) -> CoreResult<usize> {
        self.with_transaction("Rebuild reference map", true, |store, txn| {
            store.reindex_references_in(txn, progress)
        })
    }

    pub(crate) fn reindex_references_in(
        &mut self,
        txn: &Transaction,
        callback: &mut dyn FnMut(u8),
    ) -> CoreResult<usize> {
        self.check_txn(txn)?;
        let total = self.total_records()?;
        let mut progress = self.progress(callback, total);
        self.backend.clear(REFERENCE_TABLE)?;
        let mut edges = 0;
        for kind in RecordKind::ALL {
            for (_, bytes) in self.backend.scan(kind.table())? {
                let record = Record::decode(kind, self.serializer, &bytes)?;
                for edge in expected_edges(&record) {
                    let bytes = self.serializer.encode(&edge)?;
                    put_edge(&mut *self.backend, &edge.key(), &bytes, edge.target.as_str(), false)?;
                    edges += 1;
                }
                progress.tick();
            }
        }
        rebuild_backlinks(&mut *self.backend, self.serializer)?;
        progress.finish();
        info!(edges, records = total, "rebuilt reference map");
        Ok(edges)
    }

    /// Recomputes every secondary field, the backlink field and the
    /// surname list.
    ///
    /// Runs as a batch transaction. Returns the number of records visited.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly`, `TransactionConflict` or a storage error.
    pub fn rebuild_secondary(&mut self, progress: &mut dyn FnMut(u8)) -> CoreResult<usize> {
        self.with_transaction("Rebuild secondary indices", true, |store, txn| {
            store.rebuild_secondary_in(txn, progress)
        })
    }

    pub(crate) fn rebuild_secondary_in(
        &mut self,
        txn: &Transaction,
        callback: &mut dyn FnMut(u8),
    ) -> CoreResult<usize> {
        self.check_txn(txn)?;
        let total = self.total_records()?;
        let mut progress = self.progress(callback, total);
        let mut records = 0;
        for kind in RecordKind::ALL {
            records += rebuild_fields(
                &mut *self.backend,
                self.serializer,
                descriptor(kind),
                FieldSet::All,
                || progress.tick(),
            )?;
        }
        rebuild_backlinks(&mut *self.backend, self.serializer)?;
        self.rebuild_surnames()?;
        progress.finish();
        info!(records, "rebuilt secondary indices");
        Ok(records)
    }

    /// Recounts gender statistics from every person and persists them.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` or a storage error.
    pub fn rebuild_gender_stats(&mut self) -> CoreResult<()> {
        self.ensure_writable()?;
        self.stats = self.count_gender_stats()?;
        debug!(names = self.stats.len(), "rebuilt gender statistics");
        metadata::write(&mut *self.backend, self.serializer, metadata::GENDER_STATS, &self.stats)
    }

    /// Compares the stored reference map with what the records say.
    ///
    /// A pure read.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    pub fn check_integrity(&self, callback: &mut dyn FnMut(u8)) -> CoreResult<IntegrityReport> {
        self.ensure_open()?;
        let total = self.total_records()?;
        let mut progress = self.progress(callback, total);
        let mut report = IntegrityReport::default();

        let mut expected = BTreeSet::new();
        for kind in RecordKind::ALL {
            for (_, bytes) in self.backend.scan(kind.table())? {
                let record = Record::decode(kind, self.serializer, &bytes)?;
                for edge in expected_edges(&record) {
                    if self.backend.get(edge.target_kind.table(), edge.target.as_str())?.is_none() {
                        report.dangling.push(edge.clone());
                    }
                    expected.insert(edge);
                }
                report.records += 1;
                progress.tick();
            }
        }

        let mut stored = BTreeSet::new();
        for (key, bytes) in self.backend.scan(REFERENCE_TABLE)? {
            let edge: ReferenceEdge = self.serializer.decode(&bytes)?;
            let found = self
                .backend
                .lookup_indexed(REFERENCE_TABLE, REF_HANDLE, edge.target.as_str())?;
            if !found.contains(&key) {
                report.unindexed_edges.push(edge.clone());
            }
            stored.insert(edge);
        }

        report.missing_edges = expected.difference(&stored).cloned().collect();
        report.stale_edges = stored.difference(&expected).cloned().collect();
        progress.finish();
        debug!(
            records = report.records,
            dangling = report.dangling.len(),
            missing = report.missing_edges.len(),
            stale = report.stale_edges.len(),
            "checked integrity"
        );
        Ok(report)
    }
}

fn expected_edges(record: &Record) -> impl Iterator<Item = ReferenceEdge> + '_ {
    record
        .referenced_handles()
        .into_iter()
        .map(move |(target_kind, target)| ReferenceEdge {
            owner_kind: record.kind(),
            owner: record.handle().clone(),
            target_kind,
            target,
        })
}
