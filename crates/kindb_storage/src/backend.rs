//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::secondary;

/// Rows returned by a table scan, as `(key, payload)` pairs.
pub type Rows = Vec<(String, Vec<u8>)>;

/// How a table stores its payload column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Arbitrary bytes.
    Blob,
    /// UTF-8 text (JSON payloads).
    Text,
}

/// Declares one table and the secondary fields derived from its rows.
///
/// Relational engines turn `indexed` into real columns with SQL indices at
/// schema-creation time; other engines keep ordered index tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name. Must be a lowercase identifier.
    pub name: String,
    /// Payload column kind.
    pub payload: PayloadKind,
    /// Names of derived scalar fields maintained alongside each row.
    pub indexed: Vec<String>,
}

impl TableSpec {
    /// A table with a binary payload and no secondary fields.
    pub fn blob(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: PayloadKind::Blob,
            indexed: Vec::new(),
        }
    }

    /// A table with the given payload kind.
    pub fn new(name: impl Into<String>, payload: PayloadKind) -> Self {
        Self {
            name: name.into(),
            payload,
            indexed: Vec::new(),
        }
    }

    /// Adds secondary fields.
    #[must_use]
    pub fn with_indexed<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexed.extend(fields.into_iter().map(Into::into));
        self
    }
}

/// A physical storage engine for kindb.
///
/// Backends are **opaque table stores**. They map `(table, key)` to payload
/// bytes and know nothing about records, references or undo.
///
/// # Invariants
///
/// - `get` returns exactly the bytes last `put` under that key
/// - Writes made between `begin` and `commit` become durable together
/// - `rollback` discards them when [`StorageBackend::supports_rollback`]
///   is true; otherwise it only closes the transaction
/// - Reads see uncommitted writes of the open transaction
///
/// # Secondary fields
///
/// The `*_indexed` methods maintain derived scalar values per row. The
/// default implementations keep them in ordered side tables built from
/// `put`/`delete`/`scan_prefix`, so every backend supports them; engines
/// with native columns override them.
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For transient views and tests
/// - `KvBackend` - Persistent ordered key-value storage
/// - `SqliteBackend` - Persistent relational storage
pub trait StorageBackend: Send {
    /// Short engine name, recorded with the store.
    fn name(&self) -> &'static str;

    /// Creates the given tables if they do not exist.
    ///
    /// Existing tables gain any secondary fields they lack.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is not a valid identifier or the engine
    /// fails.
    fn create_tables(&mut self, specs: &[TableSpec]) -> StorageResult<()>;

    /// Reads the payload stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn get(&self, table: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn put(&mut self, table: &str, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Deletes `key`. Returns true if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn delete(&mut self, table: &str, key: &str) -> StorageResult<bool>;

    /// Returns every row of a table.
    ///
    /// Ordered-key engines return rows in key order; others in storage
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn scan(&self, table: &str) -> StorageResult<Rows>;

    /// Returns every key of a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn keys(&self, table: &str) -> StorageResult<Vec<String>> {
        Ok(self.scan(table)?.into_iter().map(|(k, _)| k).collect())
    }

    /// Returns the rows whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn scan_prefix(&self, table: &str, prefix: &str) -> StorageResult<Rows> {
        Ok(self
            .scan(table)?
            .into_iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect())
    }

    /// Returns the number of rows in a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn count(&self, table: &str) -> StorageResult<usize> {
        Ok(self.keys(table)?.len())
    }

    /// Removes every row of a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn clear(&mut self, table: &str) -> StorageResult<()> {
        for key in self.keys(table)? {
            self.delete(table, &key)?;
        }
        Ok(())
    }

    /// Opens a write transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionState` if one is already open.
    fn begin(&mut self) -> StorageResult<()>;

    /// Makes the open transaction durable.
    ///
    /// # Errors
    ///
    /// Returns `TransactionState` if none is open, or an engine error.
    fn commit(&mut self) -> StorageResult<()>;

    /// Discards the open transaction where the engine can.
    ///
    /// # Errors
    ///
    /// Returns `TransactionState` if none is open, or an engine error.
    fn rollback(&mut self) -> StorageResult<()>;

    /// Returns true if `rollback` restores the state seen at `begin`.
    fn supports_rollback(&self) -> bool;

    /// Returns true while a transaction is open.
    fn in_transaction(&self) -> bool;

    /// Flushes buffered state to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    /// Returns true if secondary fields are engine-native columns.
    fn native_secondary(&self) -> bool {
        false
    }

    /// Records the secondary values of one row, replacing older values of
    /// the same fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn set_indexed(&mut self, table: &str, key: &str, values: &[(&str, &str)]) -> StorageResult<()> {
        secondary::set(self, table, key, values)
    }

    /// Forgets the secondary values of one row for the given fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn clear_indexed(&mut self, table: &str, key: &str, fields: &[&str]) -> StorageResult<()> {
        secondary::clear(self, table, key, fields)
    }

    /// Returns the keys whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn lookup_indexed(&self, table: &str, field: &str, value: &str) -> StorageResult<Vec<String>> {
        secondary::lookup(self, table, field, value)
    }

    /// Returns every `(value, key)` pair of a secondary field.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn scan_indexed(&self, table: &str, field: &str) -> StorageResult<Vec<(String, String)>> {
        secondary::scan(self, table, field)
    }

    /// Drops every value of a secondary field.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn reset_indexed(&mut self, table: &str, field: &str) -> StorageResult<()> {
        secondary::reset(self, table, field)
    }
}
