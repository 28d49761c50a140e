//! The per-transaction change log.

use std::collections::{BTreeSet, HashSet};

use crate::model::{Handle, RecordKind};
use crate::stats::GenderStats;
use crate::surnames::SurnameList;
use crate::types::TransactionId;
use crate::vocab::VocabularySet;

/// Operation recorded for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordOp {
    /// The record did not exist before.
    Add,
    /// The record existed and was replaced.
    Update,
    /// The record was removed.
    Delete,
}

/// One logged change. Payloads are the exact stored bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogEntry {
    Record {
        kind: RecordKind,
        handle: Handle,
        old: Option<Vec<u8>>,
        new: Option<Vec<u8>>,
    },
    Reference {
        key: String,
        target: String,
        old: Option<Vec<u8>>,
        new: Option<Vec<u8>>,
    },
}

impl LogEntry {
    /// The same change in the other direction.
    pub(crate) fn inverted(&self) -> Self {
        match self.clone() {
            Self::Record {
                kind,
                handle,
                old,
                new,
            } => Self::Record {
                kind,
                handle,
                old: new,
                new: old,
            },
            Self::Reference {
                key,
                target,
                old,
                new,
            } => Self::Reference {
                key,
                target,
                old: new,
                new: old,
            },
        }
    }
}

fn op_of(old: Option<&Vec<u8>>, new: Option<&Vec<u8>>) -> RecordOp {
    match (old, new) {
        (None, _) => RecordOp::Add,
        (Some(_), None) => RecordOp::Delete,
        (Some(_), Some(_)) => RecordOp::Update,
    }
}

/// Derived state captured at begin, restored on abort.
#[derive(Debug, Clone)]
pub(crate) struct DerivedSnapshot {
    pub stats: GenderStats,
    pub surnames: SurnameList,
    pub vocab: VocabularySet,
    pub counters: [u64; 10],
}

/// The transaction currently open on a store.
#[derive(Debug)]
pub(crate) struct ActiveTxn {
    pub id: TransactionId,
    pub description: String,
    pub batch: bool,
    pub entries: Vec<LogEntry>,
    pub touched: BTreeSet<RecordKind>,
    pub snapshot: DerivedSnapshot,
    pub direct: Vec<DirectWrite>,
}

/// A write that lives outside transactions but reached the engine while
/// one was open. Replayed after an engine rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirectWrite {
    pub table: &'static str,
    pub key: String,
    pub value: Option<Vec<u8>>,
}

impl ActiveTxn {
    pub(crate) fn new(
        id: TransactionId,
        description: String,
        batch: bool,
        snapshot: DerivedSnapshot,
    ) -> Self {
        Self {
            id,
            description,
            batch,
            entries: Vec::new(),
            touched: BTreeSet::new(),
            snapshot,
            direct: Vec::new(),
        }
    }

    /// Logs a change. Batch transactions keep no log.
    pub(crate) fn log(&mut self, entry: LogEntry) {
        if let LogEntry::Record { kind, .. } = &entry {
            self.touched.insert(*kind);
        }
        if !self.batch {
            self.entries.push(entry);
        }
    }
}

/// A committed interactive transaction, as kept for undo.
#[derive(Debug, Clone)]
pub struct CommittedTxn {
    /// Transaction ID.
    pub id: TransactionId,
    /// Description given at begin.
    pub description: String,
    /// Commit time, seconds since the Unix epoch.
    pub timestamp: i64,
    pub(crate) entries: Vec<LogEntry>,
}

impl CommittedTxn {
    /// Number of record changes, ignoring reference-map upkeep.
    #[must_use]
    pub fn record_changes(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, LogEntry::Record { .. }))
            .count()
    }
}

/// Handles grouped for notification, per kind and operation.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ChangeGroups {
    pub deleted: Vec<(RecordKind, Vec<Handle>)>,
    pub added: Vec<(RecordKind, Vec<Handle>)>,
    pub updated: Vec<(RecordKind, Vec<Handle>)>,
}

/// Groups the record entries of a log.
///
/// Added and updated handles exclude any handle that ends up deleted in
/// the same log, and updated handles exclude added ones. Handles keep the
/// order of their first entry; kinds follow [`RecordKind::ALL`]. With
/// `reverse`, the log is read as its own undo.
pub(crate) fn change_groups(entries: &[LogEntry], reverse: bool) -> ChangeGroups {
    let mut per_op: [Vec<(RecordKind, Handle)>; 3] = Default::default();
    let mut seen: [HashSet<(RecordKind, Handle)>; 3] = Default::default();

    let ordered: Box<dyn Iterator<Item = &LogEntry>> = if reverse {
        Box::new(entries.iter().rev())
    } else {
        Box::new(entries.iter())
    };
    for entry in ordered {
        let LogEntry::Record {
            kind,
            handle,
            old,
            new,
        } = entry
        else {
            continue;
        };
        let (old, new) = if reverse { (new, old) } else { (old, new) };
        let slot = match op_of(old.as_ref(), new.as_ref()) {
            RecordOp::Delete => 0,
            RecordOp::Add => 1,
            RecordOp::Update => 2,
        };
        let key = (*kind, handle.clone());
        if seen[slot].insert(key.clone()) {
            per_op[slot].push(key);
        }
    }

    let [deleted, added, updated] = per_op;
    let is_deleted = |k: &(RecordKind, Handle)| seen[0].contains(k);
    let added: Vec<_> = added.into_iter().filter(|k| !is_deleted(k)).collect();
    let updated: Vec<_> = updated
        .into_iter()
        .filter(|k| !is_deleted(k) && !seen[1].contains(k))
        .collect();

    ChangeGroups {
        deleted: by_kind(deleted),
        added: by_kind(added),
        updated: by_kind(updated),
    }
}

fn by_kind(items: Vec<(RecordKind, Handle)>) -> Vec<(RecordKind, Vec<Handle>)> {
    RecordKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let handles: Vec<Handle> = items
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, h)| h.clone())
                .collect();
            (!handles.is_empty()).then_some((kind, handles))
        })
        .collect()
}
