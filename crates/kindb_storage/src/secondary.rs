//! Secondary fields kept in ordered side tables.
//!
//! For a table `t` and field `f` two side tables exist:
//!
//! ```text
//! t__f          "<value>\x1f<key>" -> ""        (ordered by value)
//! t__f__by_key  "<key>"            -> "<value>" (reverse map)
//! ```
//!
//! Ordered engines answer lookups with a prefix range over `t__f`.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// Separates the value and the row key in an index key.
pub const INDEX_SEPARATOR: char = '\u{1f}';

/// Builds the ordered index key for `value` and row `key`.
#[must_use]
pub fn index_key(value: &str, key: &str) -> String {
    let mut out = String::with_capacity(value.len() + key.len() + 1);
    out.push_str(value);
    out.push(INDEX_SEPARATOR);
    out.push_str(key);
    out
}

/// Splits an index key into `(value, key)`.
///
/// Row keys never contain the separator, so the split is made at its last
/// occurrence.
#[must_use]
pub fn split_index_key(composite: &str) -> Option<(&str, &str)> {
    composite.rsplit_once(INDEX_SEPARATOR)
}

fn index_table(table: &str, field: &str) -> String {
    format!("{table}__{field}")
}

fn reverse_table(table: &str, field: &str) -> String {
    format!("{table}__{field}__by_key")
}

pub(crate) fn set<B: StorageBackend + ?Sized>(
    backend: &mut B,
    table: &str,
    key: &str,
    values: &[(&str, &str)],
) -> StorageResult<()> {
    for (field, value) in values {
        let reverse = reverse_table(table, field);
        let index = index_table(table, field);
        if let Some(old) = backend.get(&reverse, key)? {
            let old = String::from_utf8(old)
                .map_err(|_| StorageError::Corrupted(format!("index {index} holds non-text value")))?;
            if old == *value {
                continue;
            }
            backend.delete(&index, &index_key(&old, key))?;
        }
        backend.put(&index, &index_key(value, key), &[])?;
        backend.put(&reverse, key, value.as_bytes())?;
    }
    Ok(())
}

pub(crate) fn clear<B: StorageBackend + ?Sized>(
    backend: &mut B,
    table: &str,
    key: &str,
    fields: &[&str],
) -> StorageResult<()> {
    for field in fields {
        let reverse = reverse_table(table, field);
        if let Some(old) = backend.get(&reverse, key)? {
            let old = String::from_utf8_lossy(&old).into_owned();
            backend.delete(&index_table(table, field), &index_key(&old, key))?;
            backend.delete(&reverse, key)?;
        }
    }
    Ok(())
}

pub(crate) fn lookup<B: StorageBackend + ?Sized>(
    backend: &B,
    table: &str,
    field: &str,
    value: &str,
) -> StorageResult<Vec<String>> {
    let prefix = index_key(value, "");
    Ok(backend
        .scan_prefix(&index_table(table, field), &prefix)?
        .into_iter()
        .filter_map(|(composite, _)| {
            split_index_key(&composite)
                .filter(|(v, _)| *v == value)
                .map(|(_, k)| k.to_string())
        })
        .collect())
}

pub(crate) fn scan<B: StorageBackend + ?Sized>(
    backend: &B,
    table: &str,
    field: &str,
) -> StorageResult<Vec<(String, String)>> {
    Ok(backend
        .keys(&index_table(table, field))?
        .into_iter()
        .filter_map(|composite| {
            split_index_key(&composite).map(|(v, k)| (v.to_string(), k.to_string()))
        })
        .collect())
}

pub(crate) fn reset<B: StorageBackend + ?Sized>(
    backend: &mut B,
    table: &str,
    field: &str,
) -> StorageResult<()> {
    backend.clear(&index_table(table, field))?;
    backend.clear(&reverse_table(table, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    #[test]
    fn index_key_splits_at_last_separator() {
        let composite = index_key("Garner\u{1f}von", "h1");
        assert_eq!(split_index_key(&composite), Some(("Garner\u{1f}von", "h1")));
    }

    #[test]
    fn set_replaces_previous_value() {
        let mut backend = InMemoryBackend::new();
        backend.set_indexed("person", "h1", &[("surname", "Garner")]).unwrap();
        backend.set_indexed("person", "h1", &[("surname", "Zieliński")]).unwrap();

        assert!(backend.lookup_indexed("person", "surname", "Garner").unwrap().is_empty());
        assert_eq!(
            backend.lookup_indexed("person", "surname", "Zieliński").unwrap(),
            vec!["h1".to_string()]
        );
        assert_eq!(backend.scan_indexed("person", "surname").unwrap().len(), 1);
    }

    #[test]
    fn lookup_does_not_match_longer_values() {
        let mut backend = InMemoryBackend::new();
        backend.set_indexed("person", "h1", &[("surname", "Garner")]).unwrap();
        backend.set_indexed("person", "h2", &[("surname", "Garn")]).unwrap();

        assert_eq!(
            backend.lookup_indexed("person", "surname", "Garn").unwrap(),
            vec!["h2".to_string()]
        );
    }

    #[test]
    fn clear_and_reset() {
        let mut backend = InMemoryBackend::new();
        backend
            .set_indexed("person", "h1", &[("surname", "Garner"), ("given_name", "Anna")])
            .unwrap();
        backend.set_indexed("person", "h2", &[("surname", "Garner")]).unwrap();

        backend.clear_indexed("person", "h1", &["surname"]).unwrap();
        assert_eq!(
            backend.lookup_indexed("person", "surname", "Garner").unwrap(),
            vec!["h2".to_string()]
        );
        assert_eq!(
            backend.lookup_indexed("person", "given_name", "Anna").unwrap(),
            vec!["h1".to_string()]
        );

        backend.reset_indexed("person", "surname").unwrap();
        assert!(backend.scan_indexed("person", "surname").unwrap().is_empty());
    }
}
