//! Storage of reference edges.
//!
//! One row per edge in the `reference` table, keyed
//! `<owner handle>\x1e<target handle>` so that all edges of one owner
//! share a key prefix. The `ref_handle` secondary field holds the target
//! and answers backlink queries. Edge keys are themselves indexed, so
//! their separator differs from the one inside secondary index keys.

use kindb_codec::Serializer;
use kindb_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatch::{REFERENCE_TABLE, REF_HANDLE};
use crate::error::CoreResult;
use crate::model::{Handle, RecordKind};

/// Separates owner and target in an edge key.
const EDGE_SEPARATOR: char = '\u{1e}';

/// A derived "owner references target" pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceEdge {
    /// Kind of the referencing record.
    pub owner_kind: RecordKind,
    /// Handle of the referencing record.
    pub owner: Handle,
    /// Kind of the referenced record.
    pub target_kind: RecordKind,
    /// Handle of the referenced record.
    pub target: Handle,
}

impl ReferenceEdge {
    /// Row key of this edge.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}{EDGE_SEPARATOR}{}", self.owner, self.target)
    }
}

fn owner_prefix(owner: &Handle) -> String {
    let mut prefix = owner.to_string();
    prefix.push(EDGE_SEPARATOR);
    prefix
}

/// Every stored edge owned by `owner`, as `(key, payload, edge)`.
pub(crate) fn edges_of(
    backend: &dyn StorageBackend,
    serializer: Serializer,
    owner: &Handle,
) -> CoreResult<Vec<(String, Vec<u8>, ReferenceEdge)>> {
    backend
        .scan_prefix(REFERENCE_TABLE, &owner_prefix(owner))?
        .into_iter()
        .map(|(key, bytes)| {
            let edge = serializer.decode(&bytes)?;
            Ok((key, bytes, edge))
        })
        .collect()
}

/// Writes an edge row. The backlink field is set only when `index` is true.
pub(crate) fn put_edge(
    backend: &mut dyn StorageBackend,
    key: &str,
    bytes: &[u8],
    target: &str,
    index: bool,
) -> CoreResult<()> {
    backend.put(REFERENCE_TABLE, key, bytes)?;
    if index {
        backend.set_indexed(REFERENCE_TABLE, key, &[(REF_HANDLE, target)])?;
    }
    Ok(())
}

/// Deletes an edge row and its backlink field.
pub(crate) fn delete_edge(backend: &mut dyn StorageBackend, key: &str) -> CoreResult<()> {
    backend.clear_indexed(REFERENCE_TABLE, key, &[REF_HANDLE])?;
    backend.delete(REFERENCE_TABLE, key)?;
    Ok(())
}

/// Owners of every edge whose target is `target`.
pub(crate) fn backlinks(
    backend: &dyn StorageBackend,
    serializer: Serializer,
    target: &Handle,
) -> CoreResult<Vec<ReferenceEdge>> {
    let mut out = Vec::new();
    for key in backend.lookup_indexed(REFERENCE_TABLE, REF_HANDLE, target.as_str())? {
        if let Some(bytes) = backend.get(REFERENCE_TABLE, &key)? {
            out.push(serializer.decode(&bytes)?);
        }
    }
    Ok(out)
}

/// Rebuilds the backlink field from the stored edges.
pub(crate) fn rebuild_backlinks(
    backend: &mut dyn StorageBackend,
    serializer: Serializer,
) -> CoreResult<usize> {
    backend.reset_indexed(REFERENCE_TABLE, REF_HANDLE)?;
    let rows = backend.scan(REFERENCE_TABLE)?;
    for (key, bytes) in &rows {
        let edge: ReferenceEdge = serializer.decode(bytes)?;
        backend.set_indexed(REFERENCE_TABLE, key, &[(REF_HANDLE, edge.target.as_str())])?;
    }
    debug!(edges = rows.len(), "rebuilt backlink index");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindb_storage::InMemoryBackend;

    fn edge(owner: &str, target: &str) -> ReferenceEdge {
        ReferenceEdge {
            owner_kind: RecordKind::Family,
            owner: Handle::from(owner),
            target_kind: RecordKind::Person,
            target: Handle::from(target),
        }
    }

    fn store(backend: &mut InMemoryBackend, e: &ReferenceEdge, index: bool) {
        let bytes = Serializer::Blob.encode(e).unwrap();
        put_edge(backend, &e.key(), &bytes, e.target.as_str(), index).unwrap();
    }

    #[test]
    fn owner_prefix_does_not_match_longer_handles() {
        let mut backend = InMemoryBackend::new();
        store(&mut backend, &edge("f1", "p1"), true);
        store(&mut backend, &edge("f10", "p1"), true);
        let own = edges_of(&backend, Serializer::Blob, &Handle::from("f1")).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].2, edge("f1", "p1"));
    }

    #[test]
    fn backlinks_follow_deletes() {
        let mut backend = InMemoryBackend::new();
        let e = edge("f1", "p1");
        store(&mut backend, &e, true);
        assert_eq!(backlinks(&backend, Serializer::Blob, &Handle::from("p1")).unwrap(), vec![e.clone()]);
        delete_edge(&mut backend, &e.key()).unwrap();
        assert!(backlinks(&backend, Serializer::Blob, &Handle::from("p1")).unwrap().is_empty());
    }

    #[test]
    fn unindexed_edges_reappear_after_rebuild() {
        let mut backend = InMemoryBackend::new();
        store(&mut backend, &edge("f1", "p1"), false);
        store(&mut backend, &edge("f2", "p1"), false);
        assert!(backlinks(&backend, Serializer::Blob, &Handle::from("p1")).unwrap().is_empty());
        assert_eq!(rebuild_backlinks(&mut backend, Serializer::Blob).unwrap(), 2);
        assert_eq!(backlinks(&backend, Serializer::Blob, &Handle::from("p1")).unwrap().len(), 2);
    }
}
