//! List command implementation.

use kindb_core::RecordKind;
use serde::Serialize;
use std::path::Path;

use super::{open_read_only, print_json};
use crate::error::CliResult;

/// One listed record.
#[derive(Debug, Serialize)]
pub struct ListEntry {
    /// Record handle.
    pub handle: String,
    /// External ID, empty for tags.
    pub external_id: String,
}

/// Lists the handles of `kind` in the store at `path`.
pub fn collect(path: &Path, kind: &str, sorted: bool, locale: Option<&str>) -> CliResult<Vec<ListEntry>> {
    let kind: RecordKind = kind.parse()?;
    let mut store = open_read_only(path)?;
    let mut entries = Vec::new();
    for handle in store.handles(kind, sorted, locale)? {
        let record = store.get(kind, &handle)?;
        entries.push(ListEntry {
            handle: handle.to_string(),
            external_id: record.external_id().to_string(),
        });
    }
    store.close()?;
    Ok(entries)
}

/// Runs the list command.
pub fn run(path: &Path, kind: &str, sorted: bool, locale: Option<&str>, json: bool) -> CliResult<()> {
    let entries = collect(path, kind, sorted, locale)?;
    if json {
        return print_json(&entries);
    }
    for entry in &entries {
        println!("{}\t{}", entry.handle, entry.external_id);
    }
    Ok(())
}
