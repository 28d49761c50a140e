//! # kindb Storage
//!
//! The storage backend contract and its engines.
//!
//! Backends are **opaque table stores**: named tables map string keys to
//! payload bytes that the backend never interprets. The store above owns
//! all record semantics, derived indices and undo history.
//!
//! ## Design Principles
//!
//! - Minimal primitives: get, put, delete, scan, begin, commit, rollback
//! - Secondary-index maintenance is explicit and driven by the caller
//! - Engine failures surface as a single [`StorageError`] type
//! - Payload bytes round-trip unchanged on every backend
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - Ephemeral map of maps, no native rollback
//! - `KvBackend` - Ordered key-value engine on `redb` (feature `kv`)
//! - `SqliteBackend` - Relational engine on SQLite (feature `sqlite`)
//!
//! ## Example
//!
//! ```rust
//! use kindb_storage::{InMemoryBackend, StorageBackend, TableSpec};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.create_tables(&[TableSpec::blob("person")]).unwrap();
//! backend.put("person", "a1", b"payload").unwrap();
//! assert_eq!(backend.get("person", "a1").unwrap(), Some(b"payload".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
#[cfg(feature = "kv")]
mod kv;
mod memory;
mod secondary;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use backend::{PayloadKind, Rows, StorageBackend, TableSpec};
pub use error::{StorageError, StorageResult};
#[cfg(feature = "kv")]
pub use kv::KvBackend;
pub use memory::InMemoryBackend;
pub use secondary::{index_key, split_index_key, INDEX_SEPARATOR};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
