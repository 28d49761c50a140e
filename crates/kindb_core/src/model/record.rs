//! Uniform access to the ten record types.

use kindb_codec::{CodecResult, Serializer, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use super::records::{Citation, Event, Family, Media, Note, Person, Place, Repository, Source, Tag};
use super::walk::{HandleRef, Walk};
use super::{Handle, RecordKind};
use crate::vocab::Vocabulary;

/// Behaviour shared by every primary record type.
///
/// The store works on [`Record`] internally; this trait gives the typed
/// per-kind API (`add_person`, `get_event`, ...) a way back and forth.
pub trait PrimaryRecord:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind of this record type.
    const KIND: RecordKind;

    /// The record's handle; empty until the record is added.
    fn handle(&self) -> &Handle;

    /// Replaces the handle.
    fn set_handle(&mut self, handle: Handle);

    /// The external ID, empty if unset. Always empty for tags.
    fn external_id(&self) -> &str;

    /// Replaces the external ID. Ignored for tags.
    fn set_external_id(&mut self, id: String);

    /// Last change time, seconds since the Unix epoch.
    fn change(&self) -> i64;

    /// Replaces the change time.
    fn set_change(&mut self, change: i64);

    /// Every distinct handle this record references, recursively through
    /// its sub-objects, in order of first appearance.
    fn referenced_handles(&self) -> Vec<HandleRef>;

    /// Removes every reference to `handles` of `kind`, recursively.
    fn remove_handle_references(&mut self, kind: RecordKind, handles: &[Handle]);

    /// Custom type labels used anywhere in the record.
    fn custom_types(&self) -> Vec<(Vocabulary, String)>;

    /// Wraps the record.
    fn into_record(self) -> Record;

    /// Unwraps a record of this kind.
    fn from_record(record: Record) -> Option<Self>;

    /// Borrows a record of this kind.
    fn from_record_ref(record: &Record) -> Option<&Self>;
}

fn distinct(mut refs: Vec<HandleRef>) -> Vec<HandleRef> {
    let mut seen = HashSet::with_capacity(refs.len());
    refs.retain(|r| seen.insert(r.clone()));
    refs
}

macro_rules! primary_record {
    ($ty:ident, $kind:ident, $($id:ident)?) => {
        impl PrimaryRecord for $ty {
            const KIND: RecordKind = RecordKind::$kind;

            fn handle(&self) -> &Handle {
                &self.handle
            }

            fn set_handle(&mut self, handle: Handle) {
                self.handle = handle;
            }

            primary_record!(@id $($id)?);

            fn change(&self) -> i64 {
                self.change
            }

            fn set_change(&mut self, change: i64) {
                self.change = change;
            }

            fn referenced_handles(&self) -> Vec<HandleRef> {
                let mut out = Vec::new();
                self.refs(&mut out);
                distinct(out)
            }

            fn remove_handle_references(&mut self, kind: RecordKind, handles: &[Handle]) {
                self.prune(kind, handles);
            }

            fn custom_types(&self) -> Vec<(Vocabulary, String)> {
                let mut out = Vec::new();
                self.labels(&mut out);
                out
            }

            fn into_record(self) -> Record {
                Record::$kind(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$kind(r) => Some(r),
                    _ => None,
                }
            }

            fn from_record_ref(record: &Record) -> Option<&Self> {
                match record {
                    Record::$kind(r) => Some(r),
                    _ => None,
                }
            }
        }
    };
    (@id external_id) => {
        fn external_id(&self) -> &str {
            &self.external_id
        }

        fn set_external_id(&mut self, id: String) {
            self.external_id = id;
        }
    };
    (@id) => {
        fn external_id(&self) -> &str {
            ""
        }

        fn set_external_id(&mut self, _id: String) {}
    };
}

primary_record!(Person, Person, external_id);
primary_record!(Family, Family, external_id);
primary_record!(Event, Event, external_id);
primary_record!(Place, Place, external_id);
primary_record!(Source, Source, external_id);
primary_record!(Citation, Citation, external_id);
primary_record!(Repository, Repository, external_id);
primary_record!(Media, Media, external_id);
primary_record!(Note, Note, external_id);
primary_record!(Tag, Tag,);

/// A record of any kind.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Record {
    Person(Person),
    Family(Family),
    Event(Event),
    Place(Place),
    Source(Source),
    Citation(Citation),
    Repository(Repository),
    Media(Media),
    Note(Note),
    Tag(Tag),
}

macro_rules! each {
    ($value:expr, $r:ident => $body:expr) => {
        match $value {
            Record::Person($r) => $body,
            Record::Family($r) => $body,
            Record::Event($r) => $body,
            Record::Place($r) => $body,
            Record::Source($r) => $body,
            Record::Citation($r) => $body,
            Record::Repository($r) => $body,
            Record::Media($r) => $body,
            Record::Note($r) => $body,
            Record::Tag($r) => $body,
        }
    };
}

impl Record {
    /// Kind of the wrapped record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        each!(self, r => kind_of(r))
    }

    /// Handle of the wrapped record.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        each!(self, r => r.handle())
    }

    /// Replaces the handle.
    pub fn set_handle(&mut self, handle: Handle) {
        each!(self, r => r.set_handle(handle));
    }

    /// External ID, empty for tags.
    #[must_use]
    pub fn external_id(&self) -> &str {
        each!(self, r => r.external_id())
    }

    /// Replaces the external ID.
    pub fn set_external_id(&mut self, id: String) {
        each!(self, r => r.set_external_id(id));
    }

    /// Last change time.
    #[must_use]
    pub fn change(&self) -> i64 {
        each!(self, r => r.change())
    }

    /// Replaces the change time.
    pub fn set_change(&mut self, change: i64) {
        each!(self, r => r.set_change(change));
    }

    /// See [`PrimaryRecord::referenced_handles`].
    #[must_use]
    pub fn referenced_handles(&self) -> Vec<HandleRef> {
        each!(self, r => r.referenced_handles())
    }

    /// See [`PrimaryRecord::remove_handle_references`].
    pub fn remove_handle_references(&mut self, kind: RecordKind, handles: &[Handle]) {
        each!(self, r => r.remove_handle_references(kind, handles));
    }

    /// See [`PrimaryRecord::custom_types`].
    #[must_use]
    pub fn custom_types(&self) -> Vec<(Vocabulary, String)> {
        each!(self, r => r.custom_types())
    }

    /// Encodes the wrapped record (not the enum) as a payload.
    ///
    /// # Errors
    ///
    /// Returns a codec error if serialization fails.
    pub fn encode(&self, serializer: Serializer) -> CodecResult<Vec<u8>> {
        each!(self, r => serializer.encode(r))
    }

    /// Decodes a payload of the given kind.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the payload does not decode as `kind`.
    pub fn decode(kind: RecordKind, serializer: Serializer, bytes: &[u8]) -> CodecResult<Self> {
        Ok(match kind {
            RecordKind::Person => Self::Person(serializer.decode(bytes)?),
            RecordKind::Family => Self::Family(serializer.decode(bytes)?),
            RecordKind::Event => Self::Event(serializer.decode(bytes)?),
            RecordKind::Place => Self::Place(serializer.decode(bytes)?),
            RecordKind::Source => Self::Source(serializer.decode(bytes)?),
            RecordKind::Citation => Self::Citation(serializer.decode(bytes)?),
            RecordKind::Repository => Self::Repository(serializer.decode(bytes)?),
            RecordKind::Media => Self::Media(serializer.decode(bytes)?),
            RecordKind::Note => Self::Note(serializer.decode(bytes)?),
            RecordKind::Tag => Self::Tag(serializer.decode(bytes)?),
        })
    }

    /// Dynamic view of the record's fields, for paths and predicates.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the record cannot be represented.
    pub fn to_value(&self) -> CodecResult<Value> {
        each!(self, r => Value::from_serialize(r))
    }

    /// Borrows the wrapped record as a concrete type.
    #[must_use]
    pub fn as_type<P: PrimaryRecord>(&self) -> Option<&P> {
        P::from_record_ref(self)
    }

    /// Unwraps into a concrete type.
    #[must_use]
    pub fn into_type<P: PrimaryRecord>(self) -> Option<P> {
        P::from_record(self)
    }
}

fn kind_of<P: PrimaryRecord>(_: &P) -> RecordKind {
    P::KIND
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChildRef, EventRef, Gender, MediaRef, PlaceRef};

    #[test]
    fn family_enumerates_parents_children_and_events() {
        let family = Family {
            handle: Handle::from("f1"),
            father_handle: Some(Handle::from("p1")),
            mother_handle: Some(Handle::from("p2")),
            child_ref_list: vec![ChildRef::birth(Handle::from("p3"))],
            event_ref_list: vec![EventRef::primary(Handle::from("e1"))],
            tag_list: vec![Handle::from("t1")],
            ..Family::default()
        };
        assert_eq!(
            family.referenced_handles(),
            vec![
                (RecordKind::Person, Handle::from("p1")),
                (RecordKind::Person, Handle::from("p2")),
                (RecordKind::Person, Handle::from("p3")),
                (RecordKind::Event, Handle::from("e1")),
                (RecordKind::Tag, Handle::from("t1")),
            ]
        );
    }

    #[test]
    fn duplicates_are_reported_once() {
        let mut person = Person::new("Anna", "Lind", Gender::Female);
        person.note_list = vec![Handle::from("n1"), Handle::from("n1")];
        person.primary_name.note_list = vec![Handle::from("n1")];
        assert_eq!(
            person.referenced_handles(),
            vec![(RecordKind::Note, Handle::from("n1"))]
        );
    }

    #[test]
    fn removing_references_keeps_birth_index_aligned() {
        let mut person = Person::new("Karl", "Berg", Gender::Male);
        person.event_ref_list = vec![
            EventRef::primary(Handle::from("e0")),
            EventRef::primary(Handle::from("e1")),
        ];
        person.birth_ref_index = Some(1);
        person.death_ref_index = Some(0);
        person.remove_handle_references(RecordKind::Event, &[Handle::from("e0")]);
        assert_eq!(person.event_ref_list.len(), 1);
        assert_eq!(person.birth_ref_index, Some(0));
        assert_eq!(person.death_ref_index, None);
    }

    #[test]
    fn place_and_media_refs() {
        let place = Place {
            placeref_list: vec![PlaceRef::new(Handle::from("pl0"))],
            media_list: vec![MediaRef {
                handle: Handle::from("m1"),
                ..MediaRef::default()
            }],
            ..Place::default()
        };
        let refs = place.referenced_handles();
        assert!(refs.contains(&(RecordKind::Place, Handle::from("pl0"))));
        assert!(refs.contains(&(RecordKind::Media, Handle::from("m1"))));
    }

    #[test]
    fn tags_have_no_external_id() {
        let mut tag = Tag::new("ToDo");
        tag.set_external_id("X1".into());
        assert_eq!(tag.external_id(), "");
        assert_eq!(tag.into_record().kind(), RecordKind::Tag);
    }

    #[test]
    fn records_decode_by_kind() {
        for serializer in [Serializer::Blob, Serializer::Json] {
            let note = Note::new("Emigrated 1887").into_record();
            let bytes = note.encode(serializer).unwrap();
            let back = Record::decode(RecordKind::Note, serializer, &bytes).unwrap();
            assert_eq!(back, note);
        }
    }

    #[test]
    fn value_view_exposes_nested_fields() {
        let person = Person::new("Eva", "Nilsson", Gender::Female).into_record();
        let value = person.to_value().unwrap();
        assert_eq!(
            value.path("primary_name.first_name").and_then(Value::as_text),
            Some("Eva")
        );
        assert_eq!(
            value.path("primary_name.surname_list.0.surname").and_then(Value::as_text),
            Some("Nilsson")
        );
    }
}
