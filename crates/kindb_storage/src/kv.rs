//! Ordered key-value backend on `redb`.

use crate::backend::{Rows, StorageBackend, TableSpec};
use crate::error::{StorageError, StorageResult};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableError, WriteTransaction};
use std::path::{Path, PathBuf};

type Def<'a> = TableDefinition<'a, &'static str, &'static [u8]>;

macro_rules! engine_fault {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(err: $ty) -> Self {
                    StorageError::engine("redb", err.to_string())
                }
            }
        )*
    };
}

engine_fault!(
    redb::Error,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError,
);

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        match err {
            redb::DatabaseError::DatabaseAlreadyOpen => {
                StorageError::Locked("database file already open".to_string())
            }
            other => StorageError::engine("redb", other.to_string()),
        }
    }
}

impl From<TableError> for StorageError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::TableDoesNotExist(name) => StorageError::UnknownTable(name),
            other => StorageError::engine("redb", other.to_string()),
        }
    }
}

/// A persistent ordered key-value backend.
///
/// Each table is a `redb` table of `&str -> &[u8]`; secondary fields live
/// in ordered side tables and are answered with key-range scans. A write
/// transaction is held open between `begin` and `commit`; writes outside a
/// transaction commit immediately.
pub struct KvBackend {
    path: PathBuf,
    db: Database,
    txn: Option<WriteTransaction>,
}

impl KvBackend {
    /// Opens or creates the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another handle has the file open, or an engine
    /// error if the file cannot be opened or needs a repair the engine
    /// cannot perform.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let db = Database::create(path)?;
        tracing::debug!(path = %path.display(), "opened kv backend");
        Ok(Self {
            path: path.to_path_buf(),
            db,
            txn: None,
        })
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_write<T>(
        &mut self,
        f: impl FnOnce(&WriteTransaction) -> StorageResult<T>,
    ) -> StorageResult<T> {
        if let Some(txn) = self.txn.as_ref() {
            return f(txn);
        }
        let txn = self.db.begin_write()?;
        let out = f(&txn)?;
        txn.commit()?;
        Ok(out)
    }

    fn with_read<T: Default>(
        &self,
        table: &str,
        f: impl FnOnce(&dyn ReadRows) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let def: Def<'_> = TableDefinition::new(table);
        if let Some(txn) = self.txn.as_ref() {
            let t = txn.open_table(def)?;
            return f(&t);
        }
        let txn = self.db.begin_read()?;
        match txn.open_table(def) {
            Ok(t) => f(&t),
            Err(TableError::TableDoesNotExist(_)) => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Row access shared by read-only and writable tables.
trait ReadRows {
    fn get_row(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;
    fn rows(&self, prefix: Option<&str>) -> StorageResult<Rows>;
    fn row_count(&self) -> StorageResult<usize>;
}

impl<T> ReadRows for T
where
    T: ReadableTable<&'static str, &'static [u8]> + ReadableTableMetadata,
{
    fn get_row(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.get(key)?.map(|v| v.value().to_vec()))
    }

    fn rows(&self, prefix: Option<&str>) -> StorageResult<Rows> {
        let mut out = Vec::new();
        let iter = match prefix {
            Some(p) => self.range(p..)?,
            None => self.iter()?,
        };
        for item in iter {
            let (k, v) = item?;
            let key = k.value();
            if let Some(p) = prefix {
                if !key.starts_with(p) {
                    break;
                }
            }
            out.push((key.to_string(), v.value().to_vec()));
        }
        Ok(out)
    }

    fn row_count(&self) -> StorageResult<usize> {
        let len = self.len()?;
        usize::try_from(len).map_err(|_| StorageError::Corrupted(format!("table length {len}")))
    }
}

impl StorageBackend for KvBackend {
    fn name(&self) -> &'static str {
        "kv"
    }

    fn create_tables(&mut self, specs: &[TableSpec]) -> StorageResult<()> {
        self.with_write(|txn| {
            for spec in specs {
                let def: Def<'_> = TableDefinition::new(&spec.name);
                txn.open_table(def)?;
            }
            Ok(())
        })
    }

    fn get(&self, table: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.with_read(table, |t| t.get_row(key))
    }

    fn put(&mut self, table: &str, key: &str, value: &[u8]) -> StorageResult<()> {
        self.with_write(|txn| {
            let def: Def<'_> = TableDefinition::new(table);
            let mut t = txn.open_table(def)?;
            t.insert(key, value)?;
            Ok(())
        })
    }

    fn delete(&mut self, table: &str, key: &str) -> StorageResult<bool> {
        self.with_write(|txn| {
            let def: Def<'_> = TableDefinition::new(table);
            let mut t = txn.open_table(def)?;
            let removed = t.remove(key)?.is_some();
            Ok(removed)
        })
    }

    fn scan(&self, table: &str) -> StorageResult<Rows> {
        self.with_read(table, |t| t.rows(None))
    }

    fn scan_prefix(&self, table: &str, prefix: &str) -> StorageResult<Rows> {
        self.with_read(table, |t| t.rows(Some(prefix)))
    }

    fn count(&self, table: &str) -> StorageResult<usize> {
        self.with_read(table, |t| t.row_count())
    }

    fn clear(&mut self, table: &str) -> StorageResult<()> {
        self.with_write(|txn| {
            txn.delete_table(Def::new(table))?;
            txn.open_table(Def::new(table))?;
            Ok(())
        })
    }

    fn begin(&mut self) -> StorageResult<()> {
        if self.txn.is_some() {
            return Err(StorageError::transaction_state("transaction already open"));
        }
        self.txn = Some(self.db.begin_write()?);
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| StorageError::transaction_state("no transaction to commit"))?;
        txn.commit()?;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| StorageError::transaction_state("no transaction to roll back"))?;
        txn.abort()?;
        Ok(())
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }
}

impl std::fmt::Debug for KvBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvBackend")
            .field("path", &self.path)
            .field("in_transaction", &self.txn.is_some())
            .finish_non_exhaustive()
    }
}
