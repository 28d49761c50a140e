//! Sequential iteration over one record table.

use kindb_codec::Serializer;
use kindb_storage::StorageBackend;
use std::fmt;

use crate::error::CoreResult;
use crate::model::{Record, RecordKind};

/// A closeable cursor over the records of one kind.
///
/// The key list is taken when the cursor opens; records are read and
/// decoded one at a time as the cursor advances.
pub struct Cursor<'s> {
    backend: &'s dyn StorageBackend,
    serializer: Serializer,
    kind: RecordKind,
    keys: std::vec::IntoIter<String>,
    closed: bool,
}

impl<'s> Cursor<'s> {
    pub(crate) fn open(
        backend: &'s dyn StorageBackend,
        serializer: Serializer,
        kind: RecordKind,
    ) -> CoreResult<Self> {
        let keys = backend.keys(kind.table())?;
        Ok(Self {
            backend,
            serializer,
            kind,
            keys: keys.into_iter(),
            closed: false,
        })
    }

    /// Kind this cursor walks.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Keys not yet visited.
    #[must_use]
    pub fn remaining(&self) -> usize {
        if self.closed {
            0
        } else {
            self.keys.len()
        }
    }

    /// Stops the cursor. Later calls to `next` return `None`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// True once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for Cursor<'_> {
    type Item = CoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        for key in self.keys.by_ref() {
            match self.backend.get(self.kind.table(), &key) {
                Ok(Some(bytes)) => {
                    return Some(
                        Record::decode(self.kind, self.serializer, &bytes).map_err(Into::into),
                    )
                }
                Ok(None) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        self.closed = true;
        None
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("kind", &self.kind)
            .field("remaining", &self.remaining())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Note, PrimaryRecord};
    use kindb_storage::InMemoryBackend;

    fn backend_with_notes(n: usize) -> InMemoryBackend {
        let mut backend = InMemoryBackend::new();
        for i in 0..n {
            let mut note = Note::new(format!("note {i}"));
            note.set_handle(format!("n{i}").into());
            let bytes = note.into_record().encode(Serializer::Blob).unwrap();
            backend.put("note", &format!("n{i}"), &bytes).unwrap();
        }
        backend
    }

    #[test]
    fn cursor_visits_every_record() {
        let backend = backend_with_notes(3);
        let cursor = Cursor::open(&backend, Serializer::Blob, RecordKind::Note).unwrap();
        assert_eq!(cursor.remaining(), 3);
        let records: Vec<_> = cursor.collect::<CoreResult<_>>().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.kind() == RecordKind::Note));
    }

    #[test]
    fn closed_cursor_yields_nothing() {
        let backend = backend_with_notes(2);
        let mut cursor = Cursor::open(&backend, Serializer::Blob, RecordKind::Note).unwrap();
        assert!(cursor.next().is_some());
        cursor.close();
        assert!(cursor.is_closed());
        assert_eq!(cursor.remaining(), 0);
        assert!(cursor.next().is_none());
    }
}
