//! Behaviour every backend must share.

use kindb_storage::{InMemoryBackend, KvBackend, SqliteBackend, StorageBackend, TableSpec};
use proptest::prelude::*;
use tempfile::TempDir;

fn specs() -> Vec<TableSpec> {
    vec![
        TableSpec::blob("person").with_indexed(["external_id", "surname"]),
        TableSpec::blob("reference").with_indexed(["ref_handle"]),
        TableSpec::blob("metadata"),
    ]
}

fn backends(dir: &TempDir) -> Vec<Box<dyn StorageBackend>> {
    let mut out: Vec<Box<dyn StorageBackend>> = vec![
        Box::new(InMemoryBackend::new()),
        Box::new(KvBackend::open(&dir.path().join("store.redb")).unwrap()),
        Box::new(SqliteBackend::open(&dir.path().join("store.db")).unwrap()),
    ];
    for backend in &mut out {
        backend.create_tables(&specs()).unwrap();
    }
    out
}

#[test]
fn payloads_are_byte_identical_on_every_backend() {
    let dir = TempDir::new().unwrap();
    let payload: Vec<u8> = (0u8..=255).collect();
    for mut backend in backends(&dir) {
        backend.put("person", "h1", &payload).unwrap();
        assert_eq!(
            backend.get("person", "h1").unwrap().as_deref(),
            Some(&payload[..]),
            "backend {}",
            backend.name()
        );
    }
}

#[test]
fn secondary_lookup_follows_updates() {
    let dir = TempDir::new().unwrap();
    for mut backend in backends(&dir) {
        backend.put("person", "h1", b"a").unwrap();
        backend.put("person", "h2", b"b").unwrap();
        backend.set_indexed("person", "h1", &[("surname", "Garner")]).unwrap();
        backend.set_indexed("person", "h2", &[("surname", "Garner")]).unwrap();
        backend.set_indexed("person", "h2", &[("surname", "Zieliński")]).unwrap();

        assert_eq!(
            backend.lookup_indexed("person", "surname", "Garner").unwrap(),
            vec!["h1".to_string()],
            "backend {}",
            backend.name()
        );
        let mut scanned = backend.scan_indexed("person", "surname").unwrap();
        scanned.sort();
        assert_eq!(
            scanned,
            vec![
                ("Garner".to_string(), "h1".to_string()),
                ("Zieliński".to_string(), "h2".to_string()),
            ]
        );
    }
}

#[test]
fn native_rollback_is_reported_honestly() {
    let dir = TempDir::new().unwrap();
    for mut backend in backends(&dir) {
        backend.begin().unwrap();
        backend.put("person", "h9", b"x").unwrap();
        backend.rollback().unwrap();
        let survived = backend.get("person", "h9").unwrap().is_some();
        assert_eq!(survived, !backend.supports_rollback(), "backend {}", backend.name());
    }
}

#[test]
fn prefix_scans_agree() {
    let dir = TempDir::new().unwrap();
    for mut backend in backends(&dir) {
        for key in ["p1\u{1f}f1", "p1\u{1f}f2", "p10\u{1f}f1", "p2\u{1f}f1"] {
            backend.put("reference", key, b"").unwrap();
        }
        let mut keys: Vec<_> = backend
            .scan_prefix("reference", "p1\u{1f}")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["p1\u{1f}f1", "p1\u{1f}f2"], "backend {}", backend.name());
    }
}

#[test]
fn clear_empties_a_table() {
    let dir = TempDir::new().unwrap();
    for mut backend in backends(&dir) {
        backend.put("metadata", "version", b"3").unwrap();
        backend.put("metadata", "locale", b"C").unwrap();
        backend.clear("metadata").unwrap();
        assert_eq!(backend.count("metadata").unwrap(), 0, "backend {}", backend.name());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn memory_and_sqlite_agree_on_counts(keys in proptest::collection::btree_set("[a-f0-9]{4,12}", 0..20)) {
        let mut memory = InMemoryBackend::new();
        let mut sqlite = SqliteBackend::open_in_memory().unwrap();
        sqlite.create_tables(&specs()).unwrap();
        for key in &keys {
            memory.put("person", key, key.as_bytes()).unwrap();
            sqlite.put("person", key, key.as_bytes()).unwrap();
        }
        prop_assert_eq!(memory.count("person").unwrap(), keys.len());
        prop_assert_eq!(sqlite.count("person").unwrap(), keys.len());
    }
}
