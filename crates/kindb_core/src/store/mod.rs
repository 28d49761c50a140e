//! The store facade.
//!
//! [`Store`] is the backend-independent layer between callers and a
//! physical engine. It owns handle and ID assignment, the reference map,
//! secondary fields, derived statistics, transactions and undo. Engines
//! only ever see opaque payload bytes.

mod maintenance;
mod read;
mod relations;
mod txn;
mod write;

pub use maintenance::IntegrityReport;
pub use read::StoreSummary;

use kindb_codec::Serializer;
use serde::Serialize;
use kindb_storage::{InMemoryBackend, PayloadKind, Rows, StorageBackend, StorageError, StorageResult, TableSpec};
use std::fmt;
use std::mem;
use std::path::Path;
use tracing::{info, warn};

use crate::collation::Collator;
use crate::config::{BackendKind, Config};
use crate::dir::{Layout, StoreDir};
use crate::dispatch::table_specs;
use crate::error::{CoreError, CoreResult};
use crate::ids::{default_prefix, IdPattern};
use crate::metadata;
use crate::migration::{self, SCHEMA_VERSION};
use crate::model::{Person, RecordKind};
use crate::signals::{EventBus, Signal};
use crate::stats::GenderStats;
use crate::surnames::SurnameList;
use crate::transaction::{ActiveTxn, DerivedSnapshot, DirectWrite, LogEntry, Transaction, UndoHistory};
use crate::types::TransactionId;
use crate::vocab::{Vocabulary, VocabularySet};

const KINDS: usize = RecordKind::ALL.len();

/// An open genealogical store.
///
/// # Opening
///
/// ```rust,no_run
/// use kindb_core::{Config, Store};
/// use std::path::Path;
///
/// let store = Store::open(Path::new("family-tree"), Config::default())?;
/// # Ok::<(), kindb_core::CoreError>(())
/// ```
///
/// A directory store holds a lock file while open. [`Store::open_in_memory`]
/// gives a transient store for imports and tests.
///
/// # Writing
///
/// Every write names the open [`Transaction`]. [`Store::with_transaction`]
/// commits when the closure succeeds and aborts when it fails:
///
/// ```rust
/// use kindb_core::{Config, Gender, Person, Store, WritableStore};
///
/// let mut store = Store::open_in_memory(Config::default()).unwrap();
/// let handle = store
///     .with_transaction("Add person", false, |store, txn| {
///         let mut person = Person::new("Anna", "Garner", Gender::Female);
///         store.add_person(&mut person, txn, true)
///     })
///     .unwrap();
/// assert!(!handle.is_empty());
/// ```
pub struct Store {
    config: Config,
    dir: Option<StoreDir>,
    backend: Box<dyn StorageBackend>,
    serializer: Serializer,
    open: bool,
    schema_version: u32,
    patterns: [IdPattern; KINDS],
    counters: [u64; KINDS],
    stats: GenderStats,
    surnames: SurnameList,
    vocab: VocabularySet,
    collator: Collator,
    active: Option<ActiveTxn>,
    history: UndoHistory,
    signals: EventBus,
    next_txn: TransactionId,
}

impl Store {
    /// Opens or creates a store directory.
    ///
    /// The engine and payload format of a new directory come from
    /// `config`; an existing directory keeps those it was created with.
    ///
    /// # Errors
    ///
    /// - `DatabaseLocked` if another writer holds the lock, or, on the kv
    ///   engine, if any other handle has the engine file open
    /// - `SchemaVersion` if the schema is newer than supported, or older
    ///   and `allow_upgrade` is not set
    /// - `InvalidFormat` if the directory is not a store and may not be
    ///   created
    /// - `StorageFault` for engine failures
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing, config.read_only)?;
        let layout = match dir.load_layout()? {
            Some(layout) => layout,
            None if config.read_only => {
                return Err(CoreError::invalid_format(format!(
                    "{} is not a kindb store",
                    path.display()
                )))
            }
            None => {
                let layout = Layout {
                    backend: config.backend,
                    serializer: config.serializer,
                };
                dir.save_layout(layout)?;
                layout
            }
        };
        let engine_path = dir.engine_path(layout.backend);
        let backend = open_engine(layout.backend, &engine_path).map_err(|e| match e {
            CoreError::StorageFault(StorageError::Locked(_)) => CoreError::DatabaseLocked {
                path: engine_path.display().to_string(),
            },
            other => other,
        })?;
        info!(
            path = %path.display(),
            backend = layout.backend.name(),
            serializer = layout.serializer.name(),
            read_only = config.read_only,
            "opening store"
        );
        Self::assemble(config, Some(dir), backend, layout.serializer)
    }

    /// Opens a transient store with no persistence and no lock.
    ///
    /// # Errors
    ///
    /// Returns an error only if the initial metadata cannot be written.
    pub fn open_in_memory(config: Config) -> CoreResult<Self> {
        let serializer = config.serializer;
        Self::assemble(config, None, Box::new(InMemoryBackend::new()), serializer)
    }

    /// Opens a store over an already constructed backend.
    ///
    /// # Errors
    ///
    /// As for [`Store::open`], minus the directory errors.
    pub fn with_backend(
        config: Config,
        backend: Box<dyn StorageBackend>,
        serializer: Serializer,
    ) -> CoreResult<Self> {
        Self::assemble(config, None, backend, serializer)
    }

    fn assemble(
        config: Config,
        dir: Option<StoreDir>,
        mut backend: Box<dyn StorageBackend>,
        serializer: Serializer,
    ) -> CoreResult<Self> {
        backend.create_tables(&table_specs(payload_kind(serializer)))?;
        let collator = Collator::for_locale(&config.locale);
        let history = UndoHistory::new(config.undo_depth);
        let mut store = Self {
            dir,
            backend,
            serializer,
            open: true,
            schema_version: SCHEMA_VERSION,
            patterns: RecordKind::ALL.map(IdPattern::for_kind),
            counters: [1; KINDS],
            stats: GenderStats::new(),
            surnames: SurnameList::new(),
            vocab: VocabularySet::new(),
            collator,
            active: None,
            history,
            signals: EventBus::new(),
            next_txn: TransactionId::new(1),
            config,
        };

        if let Err(e) = store.initialize() {
            store.abandon();
            return Err(e);
        }
        info!(
            schema = store.schema_version,
            people = store.backend.count(RecordKind::Person.table())?,
            "store opened"
        );
        store.signals.emit(&Signal::DatabaseOpened);
        Ok(store)
    }

    fn initialize(&mut self) -> CoreResult<()> {
        let found: Option<u32> = metadata::read(&*self.backend, self.serializer, metadata::VERSION)?;
        let upgrade_from = self.check_version(found)?;
        self.load_metadata()?;
        if let Some(from) = upgrade_from {
            migration::upgrade(self, from)?;
        }
        if !self.config.read_only {
            metadata::write(&mut *self.backend, self.serializer, metadata::LOCALE, self.collator.locale())?;
        }
        Ok(())
    }

    /// Gives up on a store that failed to open, without persisting.
    fn abandon(&mut self) {
        self.open = false;
        self.active = None;
        if self.backend.in_transaction() {
            let _ = self.backend.rollback();
        }
        self.release_engine();
        if let Some(dir) = self.dir.as_mut() {
            let _ = dir.release();
        }
    }

    /// Drops the engine, releasing any file handles and locks it holds.
    fn release_engine(&mut self) {
        let name = self.backend.name();
        drop(mem::replace(&mut self.backend, Box::new(Released(name))));
    }

    /// Decides what to do with the stored schema version.
    ///
    /// Returns the version to upgrade from, if an upgrade must run.
    fn check_version(&mut self, found: Option<u32>) -> CoreResult<Option<u32>> {
        let Some(found) = found else {
            if !self.config.read_only {
                metadata::write(&mut *self.backend, self.serializer, metadata::VERSION, &SCHEMA_VERSION)?;
            }
            return Ok(None);
        };
        self.schema_version = found;
        if found > SCHEMA_VERSION {
            return Err(CoreError::SchemaVersion {
                found,
                supported: SCHEMA_VERSION,
                reason: "the store was written by a newer version".into(),
            });
        }
        if found == SCHEMA_VERSION {
            return Ok(None);
        }
        if !self.config.allow_upgrade || self.config.read_only {
            warn!(found, supported = SCHEMA_VERSION, "refusing to upgrade store without confirmation");
            return Err(CoreError::SchemaVersion {
                found,
                supported: SCHEMA_VERSION,
                reason: "the store needs an upgrade; reopen with allow_upgrade to confirm".into(),
            });
        }
        Ok(Some(found))
    }

    fn load_metadata(&mut self) -> CoreResult<()> {
        for kind in RecordKind::ALL {
            let Some(default) = default_prefix(kind) else {
                continue;
            };
            let template: Option<String> =
                metadata::read(&*self.backend, self.serializer, &metadata::prefix_key(kind))?;
            if let Some(template) = template {
                self.patterns[kind.index()] = IdPattern::parse(&template, default);
            }
            let counter: Option<u64> =
                metadata::read(&*self.backend, self.serializer, &metadata::counter_key(kind))?;
            self.counters[kind.index()] = counter.unwrap_or(1).max(1);
        }

        for vocab in Vocabulary::ALL {
            let labels: Option<Vec<String>> =
                metadata::read(&*self.backend, self.serializer, &metadata::vocab_key(vocab))?;
            if let Some(labels) = labels {
                self.vocab.load(vocab, labels);
            }
        }
        self.vocab.mark_clean();

        let stats: Option<GenderStats> =
            metadata::read(&*self.backend, self.serializer, metadata::GENDER_STATS)?;
        self.stats = match stats {
            Some(stats) => stats,
            None => self.count_gender_stats()?,
        };
        self.rebuild_surnames()
    }

    /// Recounts gender statistics from every stored person.
    pub(crate) fn count_gender_stats(&self) -> CoreResult<GenderStats> {
        let mut stats = GenderStats::new();
        for (_, bytes) in self.backend.scan(RecordKind::Person.table())? {
            let person: Person = self.serializer.decode(&bytes)?;
            stats.count_person(&person);
        }
        Ok(stats)
    }

    /// Rebuilds the surname list from the person surname field.
    pub(crate) fn rebuild_surnames(&mut self) -> CoreResult<()> {
        let values = self.backend.scan_indexed(RecordKind::Person.table(), "surname")?;
        self.surnames
            .rebuild(values.into_iter().map(|(surname, _)| surname), &self.collator);
        Ok(())
    }

    /// Writes counters, vocabularies and gender statistics.
    pub(crate) fn persist_derived(&mut self) -> CoreResult<()> {
        for kind in RecordKind::ALL {
            if default_prefix(kind).is_some() {
                metadata::write(
                    &mut *self.backend,
                    self.serializer,
                    &metadata::counter_key(kind),
                    &self.counters[kind.index()],
                )?;
            }
        }
        if self.vocab.is_dirty() {
            for vocab in Vocabulary::ALL {
                let labels = self.vocab.get(vocab);
                if !labels.is_empty() {
                    metadata::write(&mut *self.backend, self.serializer, &metadata::vocab_key(vocab), &labels)?;
                }
            }
            self.vocab.mark_clean();
        }
        metadata::write(&mut *self.backend, self.serializer, metadata::GENDER_STATS, &self.stats)
    }

    /// Closes the store.
    ///
    /// An open transaction is aborted. Derived state is persisted, the
    /// engine flushed and dropped, and the lock released, so the same
    /// directory can be opened again at once. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting or flushing fails. The store is
    /// marked closed regardless.
    pub fn close(&mut self) -> CoreResult<()> {
        if !self.open {
            return Ok(());
        }
        let result = self.shutdown();
        self.open = false;
        self.release_engine();
        if let Some(dir) = self.dir.as_mut() {
            dir.release()?;
        }
        info!("store closed");
        self.signals.emit(&Signal::DatabaseClosed);
        result
    }

    fn shutdown(&mut self) -> CoreResult<()> {
        if let Some(active) = self.active.take() {
            warn!(txn = %active.id, description = %active.description, "aborting open transaction on close");
            self.rollback_active(active)?;
        }
        if !self.config.read_only {
            self.persist_derived()?;
            self.backend.flush()?;
        }
        Ok(())
    }

    /// True until [`Store::close`].
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// True if the store refuses writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory of a persistent store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Name of the engine in use.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Payload format in use.
    #[must_use]
    pub fn serializer(&self) -> Serializer {
        self.serializer
    }

    /// Schema version of the open store.
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub(crate) fn set_schema_version(&mut self, version: u32) -> CoreResult<()> {
        metadata::write(&mut *self.backend, self.serializer, metadata::VERSION, &version)?;
        self.schema_version = version;
        Ok(())
    }

    /// The collation used for sorted listings.
    #[must_use]
    pub fn collator(&self) -> &Collator {
        &self.collator
    }

    /// The notification bus. Clones share listeners.
    #[must_use]
    pub fn signals(&self) -> &EventBus {
        &self.signals
    }

    /// The ID pattern of a kind.
    #[must_use]
    pub fn id_pattern(&self, kind: RecordKind) -> &IdPattern {
        &self.patterns[kind.index()]
    }

    /// Sets the ID pattern of a kind, validating it first.
    ///
    /// Returns the pattern that was stored, which is the default if
    /// `template` was not usable.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` on a read-only store, `InvalidOperation` for
    /// tags, or a storage error.
    pub fn set_id_pattern(&mut self, kind: RecordKind, template: &str) -> CoreResult<IdPattern> {
        self.ensure_writable()?;
        let default = default_prefix(kind)
            .ok_or_else(|| CoreError::invalid_operation(format!("{kind} records have no external IDs")))?;
        let pattern = IdPattern::parse(template, default);
        self.write_meta(&metadata::prefix_key(kind), &pattern.template())?;
        self.patterns[kind.index()] = pattern.clone();
        Ok(pattern)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        self.ensure_open()?;
        if self.config.read_only {
            Err(CoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Confirms `txn` is the open transaction and returns its batch flag.
    fn check_txn(&self, txn: &Transaction) -> CoreResult<bool> {
        match &self.active {
            Some(active) if active.id == txn.id() => Ok(active.batch),
            Some(active) => Err(CoreError::invalid_operation(format!(
                "{} is not the open transaction ({})",
                txn.id(),
                active.id
            ))),
            None => Err(CoreError::invalid_operation(format!(
                "{} is not open",
                txn.id()
            ))),
        }
    }

    fn log(&mut self, entry: LogEntry) {
        if let Some(active) = self.active.as_mut() {
            active.log(entry);
        }
    }

    /// Writes a value that is not part of any transaction.
    ///
    /// If a transaction is open the engine may be inside it, so the write
    /// is remembered and replayed should that transaction roll back.
    fn write_direct(&mut self, table: &'static str, key: &str, value: Option<Vec<u8>>) -> CoreResult<()> {
        match &value {
            Some(bytes) => self.backend.put(table, key, bytes)?,
            None => {
                self.backend.delete(table, key)?;
            }
        }
        if let Some(active) = self.active.as_mut() {
            active.direct.push(DirectWrite {
                table,
                key: key.to_string(),
                value,
            });
        }
        Ok(())
    }

    fn write_meta<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> CoreResult<()> {
        let bytes = self.serializer.encode(value)?;
        self.write_direct(metadata::TABLE, key, Some(bytes))
    }

    fn remove_meta(&mut self, key: &str) -> CoreResult<()> {
        self.write_direct(metadata::TABLE, key, None)
    }

    fn snapshot(&self) -> DerivedSnapshot {
        DerivedSnapshot {
            stats: self.stats.clone(),
            surnames: self.surnames.clone(),
            vocab: self.vocab.clone(),
            counters: self.counters,
        }
    }

    fn restore(&mut self, snapshot: DerivedSnapshot) {
        self.stats = snapshot.stats;
        self.surnames = snapshot.surnames;
        self.vocab = snapshot.vocab;
        self.counters = snapshot.counters;
    }

    /// Moves person-derived state from `old` to `new`.
    ///
    /// Secondary fields must already reflect `new`, since the surname list
    /// asks the surname field whether an old surname is still in use.
    fn adjust_person(
        &mut self,
        old: Option<&Person>,
        new: Option<&Person>,
        surnames_live: bool,
    ) -> CoreResult<()> {
        if let Some(person) = old {
            self.stats.uncount_person(person);
        }
        if let Some(person) = new {
            self.stats.count_person(person);
        }
        if !surnames_live {
            return Ok(());
        }
        let old_surname = old.map_or("", |p| p.primary_name.surname());
        let new_surname = new.map_or("", |p| p.primary_name.surname());
        if old_surname == new_surname {
            return Ok(());
        }
        self.surnames.insert(new_surname, &self.collator);
        if !old_surname.is_empty()
            && self
                .backend
                .lookup_indexed(RecordKind::Person.table(), "surname", old_surname)?
                .is_empty()
        {
            self.surnames.remove(old_surname);
        }
        Ok(())
    }
}

fn payload_kind(serializer: Serializer) -> PayloadKind {
    match serializer {
        Serializer::Blob => PayloadKind::Blob,
        Serializer::Json => PayloadKind::Text,
    }
}

fn open_engine(kind: BackendKind, path: &Path) -> CoreResult<Box<dyn StorageBackend>> {
    match kind {
        #[cfg(feature = "kv")]
        BackendKind::Kv => Ok(Box::new(kindb_storage::KvBackend::open(path)?)),
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => Ok(Box::new(kindb_storage::SqliteBackend::open(path)?)),
        #[allow(unreachable_patterns)]
        other => Err(CoreError::invalid_format(format!(
            "backend '{other}' is not compiled in ({})",
            path.display()
        ))),
    }
}

/// Stands in for the engine of a closed store.
struct Released(&'static str);

impl StorageBackend for Released {
    fn name(&self) -> &'static str {
        self.0
    }

    fn create_tables(&mut self, _specs: &[TableSpec]) -> StorageResult<()> {
        Err(StorageError::Closed)
    }

    fn get(&self, _table: &str, _key: &str) -> StorageResult<Option<Vec<u8>>> {
        Err(StorageError::Closed)
    }

    fn put(&mut self, _table: &str, _key: &str, _value: &[u8]) -> StorageResult<()> {
        Err(StorageError::Closed)
    }

    fn delete(&mut self, _table: &str, _key: &str) -> StorageResult<bool> {
        Err(StorageError::Closed)
    }

    fn scan(&self, _table: &str) -> StorageResult<Rows> {
        Err(StorageError::Closed)
    }

    fn begin(&mut self) -> StorageResult<()> {
        Err(StorageError::Closed)
    }

    fn commit(&mut self) -> StorageResult<()> {
        Err(StorageError::Closed)
    }

    fn rollback(&mut self) -> StorageResult<()> {
        Err(StorageError::Closed)
    }

    fn supports_rollback(&self) -> bool {
        false
    }

    fn in_transaction(&self) -> bool {
        false
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path())
            .field("backend", &self.backend.name())
            .field("serializer", &self.serializer)
            .field("open", &self.open)
            .field("schema_version", &self.schema_version)
            .field("in_transaction", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ReadableStore, WritableStore};
    use crate::model::{Family, Gender, PrimaryRecord};
    use tempfile::tempdir;

    fn memory() -> Store {
        Store::open_in_memory(Config::default()).unwrap()
    }

    #[test]
    fn in_memory_store_opens_at_current_schema() {
        let store = memory();
        assert!(store.is_open());
        assert_eq!(store.schema_version(), SCHEMA_VERSION);
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn closed_store_refuses_work() {
        let mut store = memory();
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(store.count(RecordKind::Person), Err(CoreError::DatabaseClosed)));
        assert!(matches!(
            store.begin_transaction("late", false),
            Err(CoreError::DatabaseClosed)
        ));
    }

    #[test]
    fn directory_store_locks_and_releases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree");
        let mut first = Store::open(&path, Config::default()).unwrap();
        assert!(matches!(
            Store::open(&path, Config::default()),
            Err(CoreError::DatabaseLocked { .. })
        ));
        first.close().unwrap();
        let second = Store::open(&path, Config::default()).unwrap();
        assert!(second.is_open());
    }

    #[test]
    fn kv_store_reopens_after_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree");
        let config = Config::default().backend(BackendKind::Kv);
        let mut store = Store::open(&path, config.clone()).unwrap();
        let handle = store
            .with_transaction("Add", false, |s, txn| {
                s.add_person(&mut Person::new("Anna", "Garner", Gender::Female), txn, true)
            })
            .unwrap();
        store.close().unwrap();
        assert_eq!(store.backend_name(), "kv");
        assert!(matches!(store.count_people(), Err(CoreError::DatabaseClosed)));

        let reopened = Store::open(&path, config).unwrap();
        assert!(reopened.has_person(&handle).unwrap());
    }

    #[test]
    fn kv_read_only_open_beside_a_writer_reports_the_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree");
        let mut writer = Store::open(&path, Config::default().backend(BackendKind::Kv)).unwrap();
        let reader = Store::open(&path, Config::default().read_only(true));
        assert!(matches!(reader, Err(CoreError::DatabaseLocked { .. })));
        writer.close().unwrap();
        assert!(Store::open(&path, Config::default().read_only(true)).is_ok());
    }

    #[test]
    fn existing_directory_keeps_its_engine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree");
        drop(Store::open(&path, Config::default().backend(BackendKind::Sqlite)).unwrap());
        let store = Store::open(&path, Config::default().backend(BackendKind::Kv)).unwrap();
        assert_eq!(store.backend_name(), "sqlite");
    }

    #[test]
    fn counters_and_stats_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree");
        {
            let mut store = Store::open(&path, Config::default()).unwrap();
            store
                .with_transaction("Add", false, |s, txn| {
                    s.add_person(&mut Person::new("Anna", "Garner", Gender::Female), txn, true)
                })
                .unwrap();
        }
        let mut store = Store::open(&path, Config::default()).unwrap();
        assert_eq!(store.gender_stats().name_stats("Anna").female, 1);
        assert_eq!(store.surname_list(), ["Garner".to_string()]);
        assert_eq!(store.find_next_external_id(RecordKind::Person).unwrap(), "I0002");
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree");
        {
            let mut store = Store::open(&path, Config::default()).unwrap();
            store.set_schema_version(SCHEMA_VERSION + 1).unwrap();
        }
        let err = Store::open(&path, Config::default().allow_upgrade(true)).unwrap_err();
        assert!(matches!(err, CoreError::SchemaVersion { found, .. } if found == SCHEMA_VERSION + 1));
    }

    #[test]
    fn id_patterns_are_validated_and_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree");
        {
            let mut store = Store::open(&path, Config::default()).unwrap();
            assert_eq!(store.set_id_pattern(RecordKind::Family, "FAM").unwrap().template(), "FAM%d");
            assert_eq!(store.set_id_pattern(RecordKind::Event, "E%x").unwrap().template(), "E%04d");
            assert!(store.set_id_pattern(RecordKind::Tag, "T%d").is_err());
        }
        let mut store = Store::open(&path, Config::default()).unwrap();
        assert_eq!(store.find_next_external_id(RecordKind::Family).unwrap(), "FAM1");
    }

    #[test]
    fn surname_list_follows_commits_and_removals() {
        let mut store = memory();
        let (a, b) = store
            .with_transaction("Add", false, |s, txn| {
                let a = s.add_person(&mut Person::new("Anna", "Garner", Gender::Female), txn, true)?;
                let b = s.add_person(&mut Person::new("Lewis", "Garner", Gender::Male), txn, true)?;
                s.add_person(&mut Person::new("Eva", "Åberg", Gender::Female), txn, true)?;
                Ok((a, b))
            })
            .unwrap();
        assert_eq!(store.surname_list(), ["Åberg".to_string(), "Garner".to_string()]);

        store
            .with_transaction("Remove one Garner", false, |s, txn| s.remove_person(&a, txn))
            .unwrap();
        assert!(store.surname_list().contains(&"Garner".to_string()));

        store
            .with_transaction("Rename", false, |s, txn| {
                let mut lewis = s.get_person(&b)?;
                lewis.primary_name = crate::model::Name::new("Lewis", "Zieliński");
                s.commit_person(&mut lewis, txn, None)
            })
            .unwrap();
        assert_eq!(store.surname_list(), ["Åberg".to_string(), "Zieliński".to_string()]);
    }

    #[test]
    fn stale_transaction_tokens_are_rejected() {
        let mut store = memory();
        let old = store.begin_transaction("first", false).unwrap();
        store.commit_transaction(old).unwrap();
        let txn = store.begin_transaction("second", false).unwrap();
        let stray = Transaction::new(TransactionId::new(99), "stray".into(), false);
        let mut family = Family::default();
        assert!(matches!(
            store.add_family(&mut family, &stray, true),
            Err(CoreError::InvalidOperation { .. })
        ));
        store.abort_transaction(txn).unwrap();
        assert!(family.handle().is_empty());
    }
}
