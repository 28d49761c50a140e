//! The metadata table.
//!
//! Everything that is not a record lives here under a string key: schema
//! version, ID patterns and counters, vocabularies, researcher, bookmarks
//! and the persisted gender statistics. Values use the store's payload
//! format.

use kindb_codec::Serializer;
use kindb_storage::StorageBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreResult;
use crate::model::RecordKind;
use crate::vocab::Vocabulary;

/// Physical table name.
pub const TABLE: &str = "metadata";

pub(crate) const VERSION: &str = "version";
pub(crate) const RESEARCHER: &str = "researcher";
pub(crate) const DEFAULT_PERSON: &str = "default-person-handle";
pub(crate) const MEDIA_PATH: &str = "mediapath";
pub(crate) const GENDER_STATS: &str = "gender-stats";
pub(crate) const LOCALE: &str = "locale";

pub(crate) fn prefix_key(kind: RecordKind) -> String {
    format!("prefix:{}", kind.table())
}

pub(crate) fn counter_key(kind: RecordKind) -> String {
    format!("counter:{}", kind.table())
}

pub(crate) fn vocab_key(vocab: Vocabulary) -> String {
    format!("vocab:{}", vocab.key())
}

pub(crate) fn bookmarks_key(kind: RecordKind) -> String {
    format!("bookmarks:{}", kind.table())
}

/// Reads and decodes one metadata value.
pub(crate) fn read<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    serializer: Serializer,
    key: &str,
) -> CoreResult<Option<T>> {
    match backend.get(TABLE, key)? {
        Some(bytes) => Ok(Some(serializer.decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Encodes and writes one metadata value.
pub(crate) fn write<T: Serialize + ?Sized>(
    backend: &mut dyn StorageBackend,
    serializer: Serializer,
    key: &str,
    value: &T,
) -> CoreResult<()> {
    let bytes = serializer.encode(value)?;
    backend.put(TABLE, key, &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindb_storage::InMemoryBackend;

    #[test]
    fn values_round_trip_through_the_table() {
        let mut backend = InMemoryBackend::new();
        for serializer in [Serializer::Blob, Serializer::Json] {
            write(&mut backend, serializer, VERSION, &3u32).unwrap();
            let back: Option<u32> = read(&backend, serializer, VERSION).unwrap();
            assert_eq!(back, Some(3));
        }
        backend.delete(TABLE, VERSION).unwrap();
        let gone: Option<u32> = read(&backend, Serializer::Blob, VERSION).unwrap();
        assert_eq!(gone, None);
    }

    #[test]
    fn keys_are_namespaced_by_kind() {
        assert_eq!(prefix_key(RecordKind::Person), "prefix:person");
        assert_eq!(counter_key(RecordKind::Media), "counter:media");
        assert_eq!(bookmarks_key(RecordKind::Family), "bookmarks:family");
        assert_eq!(vocab_key(Vocabulary::NoteTypes), "vocab:note_types");
    }
}
