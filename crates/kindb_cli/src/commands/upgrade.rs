//! Upgrade command implementation.

use kindb_core::migration::{MigrationInfo, MigrationManager};
use kindb_core::{CoreError, SCHEMA_VERSION};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use super::{open_read_only, open_writable, print_json};
use crate::error::{CliError, CliResult};

/// Outcome of an upgrade request.
#[derive(Debug, Serialize)]
pub struct UpgradeResult {
    /// Version found on disk.
    pub from: u32,
    /// Version after the command.
    pub to: u32,
    /// Whether migrations ran.
    pub applied: bool,
    /// Steps that apply to this store.
    pub steps: Vec<String>,
}

fn step_names(steps: &[MigrationInfo]) -> Vec<String> {
    steps.iter().map(|m| format!("v{}: {}", m.version, m.name)).collect()
}

/// Upgrades the store at `path` if `confirmed`; otherwise only reports.
pub fn execute(path: &Path, confirmed: bool) -> CliResult<UpgradeResult> {
    let manager = MigrationManager::builtin();
    match open_read_only(path) {
        Ok(mut store) => {
            let version = store.schema_version();
            store.close()?;
            Ok(UpgradeResult {
                from: version,
                to: version,
                applied: false,
                steps: Vec::new(),
            })
        }
        Err(CliError::Core(CoreError::SchemaVersion { found, .. })) if found < SCHEMA_VERSION => {
            let steps = step_names(&manager.pending(found));
            if !confirmed {
                return Ok(UpgradeResult {
                    from: found,
                    to: found,
                    applied: false,
                    steps,
                });
            }
            info!(from = found, to = SCHEMA_VERSION, "upgrading store");
            let mut store = open_writable(path, true)?;
            let to = store.schema_version();
            store.close()?;
            Ok(UpgradeResult {
                from: found,
                to,
                applied: true,
                steps,
            })
        }
        Err(e) => Err(e),
    }
}

/// Runs the upgrade command.
pub fn run(path: &Path, confirmed: bool, json: bool) -> CliResult<()> {
    let result = execute(path, confirmed)?;
    if json {
        return print_json(&result);
    }
    if result.steps.is_empty() {
        println!("Store is at schema version {}; nothing to do.", result.to);
        return Ok(());
    }
    let verb = if result.applied { "Applied" } else { "Pending" };
    println!("{verb} migrations (v{} -> v{SCHEMA_VERSION}):", result.from);
    for step in &result.steps {
        println!("  {step}");
    }
    if !result.applied {
        println!("Rerun with --yes to upgrade.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindb_testkit::TestStore;

    #[test]
    fn current_store_needs_nothing() {
        let mut store = TestStore::kv();
        store.close().unwrap();
        let result = execute(store.path().unwrap(), true).unwrap();
        assert_eq!(result.from, SCHEMA_VERSION);
        assert!(!result.applied);
        assert!(result.steps.is_empty());
    }
}
