//! Rebuild command implementation.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use super::{open_writable, print_json};
use crate::error::CliResult;

/// What a rebuild touched.
#[derive(Debug, Default, Serialize)]
pub struct RebuildResult {
    /// Edges written, if the reference map was rebuilt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<usize>,
    /// Records visited, if secondary indices were rebuilt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
}

/// Rebuilds the chosen indices of the store at `path`.
pub fn execute(path: &Path, references: bool, secondary: bool) -> CliResult<RebuildResult> {
    let mut store = open_writable(path, false)?;
    let mut result = RebuildResult::default();
    if references {
        info!("rebuilding reference map");
        result.edges = Some(store.reindex_reference_map(&mut |percent| debug!(percent, "reference map"))?);
    }
    if secondary {
        info!("rebuilding secondary indices");
        result.records = Some(store.rebuild_secondary(&mut |percent| debug!(percent, "secondary indices"))?);
        store.rebuild_gender_stats()?;
    }
    store.close()?;
    Ok(result)
}

/// Runs the rebuild command.
pub fn run(path: &Path, references: bool, secondary: bool, json: bool) -> CliResult<()> {
    let result = execute(path, references, secondary)?;
    if json {
        return print_json(&result);
    }
    if let Some(edges) = result.edges {
        println!("Reference map: {edges} edges");
    }
    if let Some(records) = result.records {
        println!("Secondary indices: {records} records");
    }
    Ok(())
}
