//! Relational backend on SQLite.

use crate::backend::{PayloadKind, Rows, StorageBackend, TableSpec};
use crate::error::{StorageError, StorageResult};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase
                ) =>
            {
                StorageError::Corrupted(err.to_string())
            }
            _ => StorageError::engine("sqlite", err.to_string()),
        }
    }
}

/// A persistent relational backend.
///
/// Every table has the shape
///
/// ```sql
/// CREATE TABLE person (
///     handle     TEXT PRIMARY KEY NOT NULL,
///     blob_data  BLOB,          -- or json_data TEXT
///     surname    TEXT,          -- one column per secondary field
///     ...
/// );
/// ```
///
/// with an SQL index per secondary column. Secondary values are plain
/// columns updated in the same statement stream as the payload.
pub struct SqliteBackend {
    conn: Connection,
    tables: HashMap<String, TableSpec>,
    in_txn: bool,
}

impl SqliteBackend {
    /// Opens or creates the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened sqlite backend");
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = OFF; PRAGMA journal_mode = WAL;")?;
        Ok(Self {
            conn,
            tables: HashMap::new(),
            in_txn: false,
        })
    }

    fn spec(&self, table: &str) -> StorageResult<&TableSpec> {
        self.tables
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))
    }

    fn existing_columns(&self, table: &str) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    fn ensure_field(&self, table: &str, field: &str) -> StorageResult<()> {
        let spec = self.spec(table)?;
        if spec.indexed.iter().any(|f| f == field) {
            Ok(())
        } else {
            Err(StorageError::InvalidName(format!("{table}.{field} is not a secondary field")))
        }
    }
}

fn check_identifier(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

const fn payload_column(kind: PayloadKind) -> &'static str {
    match kind {
        PayloadKind::Blob => "blob_data",
        PayloadKind::Text => "json_data",
    }
}

fn read_payload(row: &Row<'_>, idx: usize, kind: PayloadKind) -> rusqlite::Result<Vec<u8>> {
    match kind {
        PayloadKind::Blob => row.get::<_, Vec<u8>>(idx),
        PayloadKind::Text => row.get::<_, String>(idx).map(String::into_bytes),
    }
}

impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn create_tables(&mut self, specs: &[TableSpec]) -> StorageResult<()> {
        for spec in specs {
            check_identifier(&spec.name)?;
            for field in &spec.indexed {
                check_identifier(field)?;
            }
            let payload = payload_column(spec.payload);
            let payload_type = match spec.payload {
                PayloadKind::Blob => "BLOB",
                PayloadKind::Text => "TEXT",
            };
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (handle TEXT PRIMARY KEY NOT NULL, {payload} {payload_type});",
                spec.name
            ))?;
            let columns = self.existing_columns(&spec.name)?;
            for field in &spec.indexed {
                if !columns.contains(field) {
                    self.conn
                        .execute_batch(&format!("ALTER TABLE \"{}\" ADD COLUMN \"{field}\" TEXT;", spec.name))?;
                }
                self.conn.execute_batch(&format!(
                    "CREATE INDEX IF NOT EXISTS \"{0}_{1}\" ON \"{0}\"(\"{1}\");",
                    spec.name, field
                ))?;
            }
            self.tables.insert(spec.name.clone(), spec.clone());
        }
        Ok(())
    }

    fn get(&self, table: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let kind = self.spec(table)?.payload;
        let sql = format!(
            "SELECT {} FROM \"{table}\" WHERE handle = ?1",
            payload_column(kind)
        );
        let value = self
            .conn
            .query_row(&sql, params![key], |row| read_payload(row, 0, kind))
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, table: &str, key: &str, value: &[u8]) -> StorageResult<()> {
        let kind = self.spec(table)?.payload;
        let column = payload_column(kind);
        let sql = format!(
            "INSERT INTO \"{table}\" (handle, {column}) VALUES (?1, ?2) \
             ON CONFLICT(handle) DO UPDATE SET {column} = excluded.{column}"
        );
        match kind {
            PayloadKind::Blob => {
                self.conn.execute(&sql, params![key, value])?;
            }
            PayloadKind::Text => {
                let text = std::str::from_utf8(value).map_err(|_| {
                    StorageError::Corrupted(format!("non-UTF-8 payload for text table {table}"))
                })?;
                self.conn.execute(&sql, params![key, text])?;
            }
        }
        Ok(())
    }

    fn delete(&mut self, table: &str, key: &str) -> StorageResult<bool> {
        self.spec(table)?;
        let n = self
            .conn
            .execute(&format!("DELETE FROM \"{table}\" WHERE handle = ?1"), params![key])?;
        Ok(n > 0)
    }

    fn scan(&self, table: &str) -> StorageResult<Rows> {
        let kind = self.spec(table)?.payload;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT handle, {} FROM \"{table}\" ORDER BY rowid",
            payload_column(kind)
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, read_payload(row, 1, kind)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn keys(&self, table: &str) -> StorageResult<Vec<String>> {
        self.spec(table)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT handle FROM \"{table}\" ORDER BY rowid"))?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn scan_prefix(&self, table: &str, prefix: &str) -> StorageResult<Rows> {
        let kind = self.spec(table)?.payload;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT handle, {} FROM \"{table}\" WHERE substr(handle, 1, length(?1)) = ?1 ORDER BY handle",
            payload_column(kind)
        ))?;
        let rows = stmt
            .query_map(params![prefix], |row| {
                Ok((row.get::<_, String>(0)?, read_payload(row, 1, kind)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count(&self, table: &str) -> StorageResult<usize> {
        self.spec(table)?;
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
        usize::try_from(n).map_err(|_| StorageError::Corrupted(format!("negative count {n}")))
    }

    fn clear(&mut self, table: &str) -> StorageResult<()> {
        self.spec(table)?;
        self.conn.execute(&format!("DELETE FROM \"{table}\""), [])?;
        Ok(())
    }

    fn begin(&mut self) -> StorageResult<()> {
        if self.in_txn {
            return Err(StorageError::transaction_state("transaction already open"));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_txn = true;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        if !self.in_txn {
            return Err(StorageError::transaction_state("no transaction to commit"));
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_txn = false;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        if !self.in_txn {
            return Err(StorageError::transaction_state("no transaction to roll back"));
        }
        self.in_txn = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    fn in_transaction(&self) -> bool {
        self.in_txn
    }

    fn flush(&mut self) -> StorageResult<()> {
        if !self.in_txn {
            self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        }
        Ok(())
    }

    fn native_secondary(&self) -> bool {
        true
    }

    fn set_indexed(&mut self, table: &str, key: &str, values: &[(&str, &str)]) -> StorageResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        for (field, _) in values {
            self.ensure_field(table, field)?;
        }
        let assignments = values
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("\"{field}\" = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE \"{table}\" SET {assignments} WHERE handle = ?{}",
            values.len() + 1
        );
        let args = values.iter().map(|(_, v)| *v).chain(std::iter::once(key));
        self.conn.execute(&sql, params_from_iter(args))?;
        Ok(())
    }

    fn clear_indexed(&mut self, table: &str, key: &str, fields: &[&str]) -> StorageResult<()> {
        for field in fields {
            self.ensure_field(table, field)?;
            self.conn.execute(
                &format!("UPDATE \"{table}\" SET \"{field}\" = NULL WHERE handle = ?1"),
                params![key],
            )?;
        }
        Ok(())
    }

    fn lookup_indexed(&self, table: &str, field: &str, value: &str) -> StorageResult<Vec<String>> {
        self.ensure_field(table, field)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT handle FROM \"{table}\" WHERE \"{field}\" = ?1 ORDER BY handle"))?;
        let keys = stmt
            .query_map(params![value], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn scan_indexed(&self, table: &str, field: &str) -> StorageResult<Vec<(String, String)>> {
        self.ensure_field(table, field)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT \"{field}\", handle FROM \"{table}\" WHERE \"{field}\" IS NOT NULL ORDER BY \"{field}\", handle"
        ))?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    fn reset_indexed(&mut self, table: &str, field: &str) -> StorageResult<()> {
        self.ensure_field(table, field)?;
        self.conn
            .execute(&format!("UPDATE \"{table}\" SET \"{field}\" = NULL"), [])?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("tables", &self.tables.len())
            .field("in_transaction", &self.in_txn)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        let mut b = SqliteBackend::open_in_memory().unwrap();
        b.create_tables(&[
            TableSpec::blob("person").with_indexed(["surname", "given_name"]),
            TableSpec::new("note", PayloadKind::Text),
        ])
        .unwrap();
        b
    }

    #[test]
    fn sqlite_put_get_blob_and_text() {
        let mut b = backend();
        b.put("person", "h1", &[0, 159, 146, 150]).unwrap();
        b.put("note", "n1", br#"{"text":"x"}"#).unwrap();
        assert_eq!(b.get("person", "h1").unwrap(), Some(vec![0, 159, 146, 150]));
        assert_eq!(b.get("note", "n1").unwrap(), Some(br#"{"text":"x"}"#.to_vec()));
    }

    #[test]
    fn sqlite_text_table_rejects_binary() {
        let mut b = backend();
        let err = b.put("note", "n1", &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
    }

    #[test]
    fn sqlite_upsert_keeps_secondary_columns() {
        let mut b = backend();
        b.put("person", "h1", b"v1").unwrap();
        b.set_indexed("person", "h1", &[("surname", "Garner")]).unwrap();
        b.put("person", "h1", b"v2").unwrap();
        assert_eq!(
            b.lookup_indexed("person", "surname", "Garner").unwrap(),
            vec!["h1".to_string()]
        );
        assert_eq!(b.get("person", "h1").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn sqlite_rollback_discards_writes() {
        let mut b = backend();
        b.begin().unwrap();
        b.put("person", "h1", b"v").unwrap();
        assert_eq!(b.count("person").unwrap(), 1);
        b.rollback().unwrap();
        assert_eq!(b.count("person").unwrap(), 0);
    }

    #[test]
    fn sqlite_unknown_table_and_field() {
        let mut b = backend();
        assert!(matches!(b.get("media", "x"), Err(StorageError::UnknownTable(_))));
        b.put("person", "h1", b"v").unwrap();
        assert!(matches!(
            b.set_indexed("person", "h1", &[("title", "x")]),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn sqlite_rejects_bad_identifiers() {
        let mut b = SqliteBackend::open_in_memory().unwrap();
        let err = b.create_tables(&[TableSpec::blob("person; drop")]).unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }

    #[test]
    fn sqlite_schema_gains_new_columns() {
        let mut b = backend();
        b.create_tables(&[TableSpec::blob("person").with_indexed(["surname", "given_name", "order_key"])])
            .unwrap();
        b.put("person", "h1", b"v").unwrap();
        b.set_indexed("person", "h1", &[("order_key", "garner anna")]).unwrap();
        assert_eq!(b.scan_indexed("person", "order_key").unwrap().len(), 1);
    }

    #[test]
    fn sqlite_prefix_scan() {
        let mut b = SqliteBackend::open_in_memory().unwrap();
        b.create_tables(&[TableSpec::blob("reference")]).unwrap();
        for key in ["a\u{1f}1", "a\u{1f}2", "ab\u{1f}1"] {
            b.put("reference", key, b"").unwrap();
        }
        assert_eq!(b.scan_prefix("reference", "a\u{1f}").unwrap().len(), 2);
    }
}
