//! Test stores and canned data.
//!
//! Provides stores over each engine with automatic cleanup, and a few
//! common family layouts.

use kindb_core::{BackendKind, Config, Gender, Family, Handle, Person, Store, WritableStore};
use kindb_storage::SqliteBackend;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The engine a [`TestStore`] runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// In-memory maps, no native rollback.
    Memory,
    /// `redb` in a temporary directory.
    Kv,
    /// SQLite in a temporary directory.
    Sqlite,
}

impl Engine {
    /// Every engine.
    pub const ALL: [Engine; 3] = [Engine::Memory, Engine::Kv, Engine::Sqlite];

    /// Engines that persist to a directory.
    pub const PERSISTENT: [Engine; 2] = [Engine::Kv, Engine::Sqlite];

    /// True if aborting a transaction restores the engine natively.
    pub fn has_native_rollback(self) -> bool {
        !matches!(self, Engine::Memory)
    }

    fn backend(self) -> Option<BackendKind> {
        match self {
            Engine::Memory => None,
            Engine::Kv => Some(BackendKind::Kv),
            Engine::Sqlite => Some(BackendKind::Sqlite),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Engine::Memory => "memory",
            Engine::Kv => "kv",
            Engine::Sqlite => "sqlite",
        })
    }
}

/// A store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    engine: Engine,
    path: Option<PathBuf>,
    /// Kept alive so the directory outlives the store.
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Opens a store on `engine` with the default configuration.
    pub fn new(engine: Engine) -> Self {
        Self::with_config(engine, Config::default())
    }

    /// Opens a store on `engine`. The backend named in `config` is
    /// replaced by the engine's.
    pub fn with_config(engine: Engine, config: Config) -> Self {
        match engine.backend() {
            None => Self {
                store: Store::open_in_memory(config).expect("Failed to open in-memory store"),
                engine,
                path: None,
                _temp_dir: None,
            },
            Some(backend) => {
                let temp_dir = TempDir::new().expect("Failed to create temp directory");
                let path = temp_dir.path().join("tree");
                let store = Store::open(&path, config.backend(backend)).expect("Failed to open store");
                Self {
                    store,
                    engine,
                    path: Some(path),
                    _temp_dir: Some(temp_dir),
                }
            }
        }
    }

    /// An in-memory store.
    pub fn memory() -> Self {
        Self::new(Engine::Memory)
    }

    /// A `redb` store in a temporary directory.
    pub fn kv() -> Self {
        Self::new(Engine::Kv)
    }

    /// A SQLite store in a temporary directory.
    pub fn sqlite() -> Self {
        Self::new(Engine::Sqlite)
    }

    /// A SQLite store with no directory, for tests that need native
    /// rollback without touching the disk.
    pub fn sqlite_in_memory(config: Config) -> Store {
        let backend = SqliteBackend::open_in_memory().expect("Failed to open SQLite in memory");
        let serializer = config.serializer;
        Store::with_backend(config, Box::new(backend), serializer).expect("Failed to open store")
    }

    /// The engine in use.
    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// The store directory, `None` in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Closes the store and opens the same directory again.
    ///
    /// # Panics
    ///
    /// For in-memory stores, which cannot be reopened.
    pub fn reopen(&mut self, config: Config) {
        let path = self.path.clone().expect("In-memory stores cannot be reopened");
        self.store.close().expect("Failed to close store");
        self.store = Store::open(&path, config).expect("Failed to reopen store");
    }
}

impl Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Runs a test once per engine, each on a fresh store.
pub fn with_each_engine<F>(mut f: F)
where
    F: FnMut(&mut TestStore),
{
    for engine in Engine::ALL {
        let mut store = TestStore::new(engine);
        f(&mut store);
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut Store) -> R,
{
    let mut test_store = TestStore::memory();
    f(&mut test_store.store)
}

/// Two parents and a child in one family.
#[derive(Debug, Clone)]
pub struct Household {
    /// The father.
    pub father: Handle,
    /// The mother.
    pub mother: Handle,
    /// The only child.
    pub child: Handle,
    /// The family joining them.
    pub family: Handle,
}

/// Adds a [`Household`] with the given surname in one transaction.
pub fn household(store: &mut Store, surname: &str) -> Household {
    store
        .with_transaction("Add household", false, |s, txn| {
            let mut father = Person::new("Karl", surname, Gender::Male);
            let mut mother = Person::new("Anna", surname, Gender::Female);
            let mut child = Person::new("Liv", surname, Gender::Female);
            s.add_person(&mut father, txn, true)?;
            s.add_person(&mut mother, txn, true)?;
            s.add_person(&mut child, txn, true)?;
            let mut family = Family {
                father_handle: Some(father.handle.clone()),
                mother_handle: Some(mother.handle.clone()),
                ..Family::default()
            };
            s.add_family(&mut family, txn, true)?;
            father.family_list.push(family.handle.clone());
            mother.family_list.push(family.handle.clone());
            s.commit_person(&mut father, txn, None)?;
            s.commit_person(&mut mother, txn, None)?;
            s.add_child_to_family(&mut family, &mut child, txn)?;
            Ok(Household {
                father: father.handle,
                mother: mother.handle,
                child: child.handle,
                family: family.handle,
            })
        })
        .expect("Failed to add household")
}

/// Adds `count` unrelated persons in one interactive transaction.
pub fn populate_people(store: &mut Store, count: usize) -> Vec<Handle> {
    store
        .with_transaction("Add people", false, |s, txn| {
            (0..count)
                .map(|i| {
                    let gender = if i % 2 == 0 { Gender::Female } else { Gender::Male };
                    let mut person = Person::new(format!("Given{i}"), format!("Surname{}", i % 7), gender);
                    s.add_person(&mut person, txn, true)
                })
                .collect()
        })
        .expect("Failed to add people")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindb_core::ReadableStore;

    #[test]
    fn household_links_every_member() {
        with_each_engine(|store| {
            let h = household(store, "Berg");
            let family = store.get_family(&h.family).unwrap();
            assert_eq!(family.father_handle.as_ref(), Some(&h.father));
            assert_eq!(family.child_ref_list.len(), 1);
            assert_eq!(store.count_people().unwrap(), 3);
        });
    }

    #[test]
    fn persistent_stores_reopen() {
        for engine in Engine::PERSISTENT {
            let mut store = TestStore::new(engine);
            populate_people(&mut store, 4);
            store.reopen(Config::default());
            assert_eq!(store.count_people().unwrap(), 4, "{engine}");
        }
    }

    #[test]
    fn sqlite_in_memory_store_opens() {
        let store = TestStore::sqlite_in_memory(Config::default());
        assert_eq!(store.backend_name(), "sqlite");
    }
}
