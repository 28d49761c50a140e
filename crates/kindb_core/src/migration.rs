//! Schema upgrades.
//!
//! A store records the schema version it was written with. Opening an
//! older store with `allow_upgrade` runs every registered migration above
//! that version, in order, each inside its own batch transaction. The new
//! version is stamped once, after every step has committed.
//!
//! Migrations are forward only.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::store::Store;
use crate::transaction::Transaction;

/// Schema version written by this build.
pub const SCHEMA_VERSION: MigrationVersion = 3;

/// Version number for migrations.
pub type MigrationVersion = u32;

/// Information about a registered migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    /// Version the migration brings the store to.
    pub version: MigrationVersion,
    /// Short name.
    pub name: String,
    /// What the migration does.
    pub description: Option<String>,
}

/// One upgrade step.
pub trait Migration: Send + Sync {
    /// The version this step upgrades to.
    fn version(&self) -> MigrationVersion;

    /// Short name, used as the transaction description.
    fn name(&self) -> &str;

    /// Returns an optional description.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Applies the step inside `txn`, a batch transaction.
    fn up(&self, store: &mut Store, txn: &Transaction) -> CoreResult<()>;
}

/// Rebuilds the reference map and backlink field from the records.
struct RebuildReferenceMap;

impl Migration for RebuildReferenceMap {
    fn version(&self) -> MigrationVersion {
        2
    }

    fn name(&self) -> &str {
        "rebuild_reference_map"
    }

    fn description(&self) -> Option<&str> {
        Some("recompute every reference edge with the current edge key layout")
    }

    fn up(&self, store: &mut Store, txn: &Transaction) -> CoreResult<()> {
        let edges = store.reindex_references_in(txn, &mut |_| {})?;
        debug!(edges, "reference map migrated");
        Ok(())
    }
}

/// Rewrites secondary fields and recounts gender statistics.
struct RebuildSecondaryIndices;

impl Migration for RebuildSecondaryIndices {
    fn version(&self) -> MigrationVersion {
        3
    }

    fn name(&self) -> &str {
        "rebuild_secondary_indices"
    }

    fn description(&self) -> Option<&str> {
        Some("rewrite lookup and sort fields and recount gender statistics")
    }

    fn up(&self, store: &mut Store, txn: &Transaction) -> CoreResult<()> {
        store.rebuild_secondary_in(txn, &mut |_| {})?;
        store.rebuild_gender_stats()
    }
}

/// Registry of migrations, keyed by version.
pub struct MigrationManager {
    migrations: BTreeMap<MigrationVersion, Box<dyn Migration>>,
}

impl MigrationManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// A manager holding the migrations this build ships with.
    #[must_use]
    pub fn builtin() -> Self {
        let mut migrations: BTreeMap<MigrationVersion, Box<dyn Migration>> = BTreeMap::new();
        migrations.insert(2, Box::new(RebuildReferenceMap));
        migrations.insert(3, Box::new(RebuildSecondaryIndices));
        Self { migrations }
    }

    /// Registers a migration.
    ///
    /// # Errors
    ///
    /// `MigrationFailed` if the version is already registered.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> CoreResult<()> {
        let version = migration.version();
        if self.migrations.contains_key(&version) {
            return Err(CoreError::migration_failed(format!(
                "migration version {version} already registered"
            )));
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Every registered migration, in version order.
    #[must_use]
    pub fn list(&self) -> Vec<MigrationInfo> {
        self.migrations.values().map(|m| info_of(m.as_ref())).collect()
    }

    /// Migrations that would run for a store at version `from`.
    #[must_use]
    pub fn pending(&self, from: MigrationVersion) -> Vec<MigrationInfo> {
        self.migrations
            .range(from + 1..)
            .map(|(_, m)| info_of(m.as_ref()))
            .collect()
    }

    /// Checks that registered versions are consecutive.
    ///
    /// # Errors
    ///
    /// `MigrationFailed` naming the first gap.
    pub fn validate(&self) -> CoreResult<()> {
        let mut versions = self.migrations.keys().copied();
        let Some(mut previous) = versions.next() else {
            return Ok(());
        };
        for version in versions {
            if version != previous + 1 {
                return Err(CoreError::migration_failed(format!(
                    "migration version gap: expected {}, got {version}",
                    previous + 1
                )));
            }
            previous = version;
        }
        Ok(())
    }

    /// Runs every migration above `from` and returns the version reached.
    ///
    /// Each step commits on its own. The stored schema version is only
    /// written once the last step has committed.
    ///
    /// # Errors
    ///
    /// `MigrationFailed` wrapping the first failing step's error. Steps
    /// already committed stay applied and the stored version is unchanged.
    pub fn run(&self, store: &mut Store, from: MigrationVersion) -> CoreResult<MigrationVersion> {
        let mut reached = from;
        for (&version, migration) in self.migrations.range(from + 1..) {
            info!(version, name = migration.name(), "applying migration");
            store
                .with_transaction(migration.name(), true, |s, txn| migration.up(s, txn))
                .map_err(|e| {
                    CoreError::migration_failed(format!(
                        "{} (version {version}): {e}",
                        migration.name()
                    ))
                })?;
            reached = version;
        }
        if reached != from {
            store.set_schema_version(reached)?;
        }
        Ok(reached)
    }
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

fn info_of(migration: &dyn Migration) -> MigrationInfo {
    MigrationInfo {
        version: migration.version(),
        name: migration.name().to_string(),
        description: migration.description().map(String::from),
    }
}

/// Brings an open store from `from` to [`SCHEMA_VERSION`].
pub(crate) fn upgrade(store: &mut Store, from: MigrationVersion) -> CoreResult<()> {
    let reached = MigrationManager::builtin().run(store, from)?;
    if reached < SCHEMA_VERSION {
        store.set_schema_version(SCHEMA_VERSION)?;
    }
    info!(from, to = SCHEMA_VERSION, "store upgraded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, Config};
    use crate::contract::{ReadableStore, WritableStore};
    use crate::model::{Family, Gender, Note, Person};
    use tempfile::tempdir;

    struct AddNoteThenFail;

    impl Migration for AddNoteThenFail {
        fn version(&self) -> MigrationVersion {
            SCHEMA_VERSION + 1
        }

        fn name(&self) -> &str {
            "add_note_then_fail"
        }

        fn up(&self, store: &mut Store, txn: &Transaction) -> CoreResult<()> {
            store.add_note(&mut Note::new("half done"), txn, true)?;
            Err(CoreError::invalid_operation("step failed"))
        }
    }

    #[test]
    fn builtin_migrations_are_consecutive() {
        let manager = MigrationManager::builtin();
        manager.validate().unwrap();
        assert_eq!(manager.list().last().map(|m| m.version), Some(SCHEMA_VERSION));
        let pending: Vec<_> = manager.pending(1).into_iter().map(|m| m.version).collect();
        assert_eq!(pending, vec![2, 3]);
        assert!(manager.pending(SCHEMA_VERSION).is_empty());
    }

    #[test]
    fn duplicate_versions_are_refused() {
        let mut manager = MigrationManager::builtin();
        let err = manager.register(Box::new(RebuildReferenceMap)).unwrap_err();
        assert!(matches!(err, CoreError::MigrationFailed { .. }));
    }

    #[test]
    fn gaps_fail_validation() {
        let mut manager = MigrationManager::new();
        manager.register(Box::new(RebuildReferenceMap)).unwrap();
        manager.register(Box::new(AddNoteThenFail)).unwrap();
        assert!(manager.validate().is_err());
    }

    #[test]
    fn old_store_upgrades_only_with_confirmation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree");
        let (father, family) = {
            let mut store = Store::open(&path, Config::default()).unwrap();
            let handles = store
                .with_transaction("setup", false, |s, txn| {
                    let father = s.add_person(&mut Person::new("Karl", "Berg", Gender::Male), txn, true)?;
                    let mut family = Family {
                        father_handle: Some(father.clone()),
                        ..Family::default()
                    };
                    let family = s.add_family(&mut family, txn, true)?;
                    Ok((father, family))
                })
                .unwrap();
            store.set_schema_version(1).unwrap();
            handles
        };

        let err = Store::open(&path, Config::default()).unwrap_err();
        assert!(matches!(err, CoreError::SchemaVersion { found: 1, .. }));
        let err = Store::open(&path, Config::default().read_only(true).allow_upgrade(true)).unwrap_err();
        assert!(matches!(err, CoreError::SchemaVersion { .. }));

        let store = Store::open(&path, Config::default().allow_upgrade(true)).unwrap();
        assert_eq!(store.schema_version(), SCHEMA_VERSION);
        assert!(store.check_integrity(&mut |_| {}).unwrap().is_clean());
        let owners: Vec<_> = store
            .find_backlink_handles(&father, None)
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(owners, vec![family]);
        assert_eq!(store.surname_list(), ["Berg".to_string()]);
    }

    #[test]
    fn failing_step_rolls_back_and_keeps_version() {
        let dir = tempdir().unwrap();
        let config = Config::default().backend(BackendKind::Sqlite);
        let mut store = Store::open(&dir.path().join("tree"), config).unwrap();
        let mut manager = MigrationManager::new();
        manager.register(Box::new(AddNoteThenFail)).unwrap();

        let err = manager.run(&mut store, SCHEMA_VERSION).unwrap_err();
        assert!(matches!(err, CoreError::MigrationFailed { ref message } if message.contains("step failed")));
        assert_eq!(store.count_notes().unwrap(), 0);
        assert_eq!(store.schema_version(), SCHEMA_VERSION);
        assert!(!store.in_transaction());
    }
}
