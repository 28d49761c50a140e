//! Keeping secondary fields in step with record payloads.

use kindb_codec::Serializer;
use kindb_storage::StorageBackend;
use tracing::debug;

use crate::dispatch::KindDescriptor;
use crate::error::CoreResult;
use crate::model::Record;

/// Which secondary fields an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldSet {
    /// Lookup fields only; what batch writes maintain.
    Lookup,
    /// Sort fields only; what is rebuilt after a batch.
    Sort,
    /// Everything.
    All,
}

impl FieldSet {
    fn includes(self, desc: &KindDescriptor, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Lookup => desc.lookup_fields.contains(&field),
            Self::Sort => desc.sort_fields.contains(&field),
        }
    }

    fn fields(self, desc: &KindDescriptor) -> Vec<&'static str> {
        desc.all_fields().filter(|f| self.includes(desc, f)).collect()
    }
}

/// Writes the secondary values of `record` under `key`.
///
/// Empty values are cleared rather than indexed, so a lookup for an empty
/// external ID never matches.
pub(crate) fn write_fields(
    backend: &mut dyn StorageBackend,
    desc: &KindDescriptor,
    key: &str,
    record: &Record,
    set: FieldSet,
) -> CoreResult<()> {
    let values = desc.values(record);
    let mut present: Vec<(&str, &str)> = Vec::new();
    let mut empty: Vec<&str> = Vec::new();
    for (field, value) in &values {
        if !set.includes(desc, field) {
            continue;
        }
        if value.is_empty() {
            empty.push(*field);
        } else {
            present.push((*field, value.as_str()));
        }
    }
    if !empty.is_empty() {
        backend.clear_indexed(desc.table, key, &empty)?;
    }
    if !present.is_empty() {
        backend.set_indexed(desc.table, key, &present)?;
    }
    Ok(())
}

/// Removes the secondary values of `key`.
pub(crate) fn clear_fields(
    backend: &mut dyn StorageBackend,
    desc: &KindDescriptor,
    key: &str,
    set: FieldSet,
) -> CoreResult<()> {
    let fields = set.fields(desc);
    if !fields.is_empty() {
        backend.clear_indexed(desc.table, key, &fields)?;
    }
    Ok(())
}

/// Recomputes secondary fields of one kind from a full scan.
///
/// `tick` is called once per record. Returns the number of records.
pub(crate) fn rebuild_fields(
    backend: &mut dyn StorageBackend,
    serializer: Serializer,
    desc: &KindDescriptor,
    set: FieldSet,
    mut tick: impl FnMut(),
) -> CoreResult<usize> {
    let fields = set.fields(desc);
    if fields.is_empty() {
        return Ok(0);
    }
    for field in &fields {
        backend.reset_indexed(desc.table, field)?;
    }
    let rows = backend.scan(desc.table)?;
    for (key, bytes) in &rows {
        let record = Record::decode(desc.kind, serializer, bytes)?;
        write_fields(backend, desc, key, &record, set)?;
        tick();
    }
    debug!(kind = %desc.kind, rows = rows.len(), ?set, "rebuilt secondary fields");
    Ok(rows.len())
}
