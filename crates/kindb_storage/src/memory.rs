//! In-memory storage backend.

use crate::backend::{Rows, StorageBackend, TableSpec};
use crate::error::{StorageError, StorageResult};
use std::collections::BTreeMap;

/// An in-memory map of maps.
///
/// Nothing is persisted. This backend is suitable for:
/// - Materializing an import before it is merged into a real store
/// - Temporary filtered views
/// - Unit and integration tests
///
/// # Transactions
///
/// `begin`/`commit` only track state. `rollback` does **not** restore
/// earlier contents and [`StorageBackend::supports_rollback`] is false;
/// callers that need abort semantics must replay their own change log.
///
/// # Example
///
/// ```rust
/// use kindb_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// backend.put("note", "n1", b"text").unwrap();
/// assert_eq!(backend.count("note").unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    in_txn: bool,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all tables that hold at least one row.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl StorageBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_tables(&mut self, specs: &[TableSpec]) -> StorageResult<()> {
        for spec in specs {
            self.tables.entry(spec.name.clone()).or_default();
        }
        Ok(())
    }

    fn get(&self, table: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.tables.get(table).and_then(|rows| rows.get(key)).cloned())
    }

    fn put(&mut self, table: &str, key: &str, value: &[u8]) -> StorageResult<()> {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, table: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .tables
            .get_mut(table)
            .is_some_and(|rows| rows.remove(key).is_some()))
    }

    fn scan(&self, table: &str) -> StorageResult<Rows> {
        Ok(self
            .tables
            .get(table)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn keys(&self, table: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .tables
            .get(table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn scan_prefix(&self, table: &str, prefix: &str) -> StorageResult<Rows> {
        let Some(rows) = self.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn count(&self, table: &str) -> StorageResult<usize> {
        Ok(self.tables.get(table).map_or(0, BTreeMap::len))
    }

    fn clear(&mut self, table: &str) -> StorageResult<()> {
        if let Some(rows) = self.tables.get_mut(table) {
            rows.clear();
        }
        Ok(())
    }

    fn begin(&mut self) -> StorageResult<()> {
        if self.in_txn {
            return Err(StorageError::transaction_state("transaction already open"));
        }
        self.in_txn = true;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        if !self.in_txn {
            return Err(StorageError::transaction_state("no transaction to commit"));
        }
        self.in_txn = false;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        if !self.in_txn {
            return Err(StorageError::transaction_state("no transaction to roll back"));
        }
        self.in_txn = false;
        Ok(())
    }

    fn supports_rollback(&self) -> bool {
        false
    }

    fn in_transaction(&self) -> bool {
        self.in_txn
    }
}
