//! Check command implementation.

use kindb_core::{IntegrityReport, ReferenceEdge};
use std::path::Path;
use tracing::debug;

use super::{open_read_only, print_json};
use crate::error::{CliError, CliResult};

/// Checks the store at `path`.
pub fn collect(path: &Path) -> CliResult<IntegrityReport> {
    let mut store = open_read_only(path)?;
    let report = store.check_integrity(&mut |percent| debug!(percent, "checking"))?;
    store.close()?;
    Ok(report)
}

/// Runs the check command. Fails if any problem was found.
pub fn run(path: &Path, json: bool) -> CliResult<()> {
    let report = collect(path)?;
    if json {
        print_json(&report)?;
    } else {
        print_text_output(&report);
    }
    let problems = report.dangling.len()
        + report.missing_edges.len()
        + report.stale_edges.len()
        + report.unindexed_edges.len();
    if problems > 0 {
        return Err(CliError::Integrity { problems });
    }
    Ok(())
}

fn print_text_output(report: &IntegrityReport) {
    println!("Checked {} records", report.records);
    section("Dangling references", &report.dangling);
    section("Missing edges", &report.missing_edges);
    section("Stale edges", &report.stale_edges);
    section("Unindexed edges", &report.unindexed_edges);
    if report.is_clean() {
        println!("✓ Reference map is consistent");
    }
}

fn section(title: &str, edges: &[ReferenceEdge]) {
    if edges.is_empty() {
        return;
    }
    println!("{title}: {}", edges.len());
    for e in edges {
        println!("  {} {} -> {} {}", e.owner_kind, e.owner, e.target_kind, e.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindb_testkit::{household, TestStore};

    #[test]
    fn consistent_store_reports_clean() {
        let mut store = TestStore::sqlite();
        household(&mut store, "Berg");
        store.close().unwrap();

        let report = collect(store.path().unwrap()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.records, 4);
        run(store.path().unwrap(), true).unwrap();
    }
}
