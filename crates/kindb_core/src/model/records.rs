//! The ten primary record types.

use serde::{Deserialize, Serialize};

use super::objects::{
    attribute_labels, Address, Attribute, ChildRef, Date, EventRef, Gender, MediaRef, Name,
    PersonRef, PlaceName, PlaceRef, RepoRef, TypeLabel, Url,
};
use super::walk::{prune_list, prune_opt, push_label, push_list, push_opt, HandleRef, Walk};
use super::{Handle, RecordKind};
use crate::vocab::Vocabulary;

/// An individual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    pub handle: Handle,
    pub external_id: String,
    /// Last change, seconds since the Unix epoch.
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub gender: Gender,
    pub primary_name: Name,
    pub alternate_names: Vec<Name>,
    pub event_ref_list: Vec<EventRef>,
    /// Index into `event_ref_list` of the birth event.
    pub birth_ref_index: Option<usize>,
    /// Index into `event_ref_list` of the death event.
    pub death_ref_index: Option<usize>,
    /// Families in which this person is a parent.
    pub family_list: Vec<Handle>,
    /// Families in which this person is a child.
    pub parent_family_list: Vec<Handle>,
    pub media_list: Vec<MediaRef>,
    pub address_list: Vec<Address>,
    pub attribute_list: Vec<Attribute>,
    pub urls: Vec<Url>,
    pub person_ref_list: Vec<PersonRef>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
}

impl Person {
    /// A person with one name.
    pub fn new(first_name: impl Into<String>, surname: impl Into<String>, gender: Gender) -> Self {
        Self {
            primary_name: Name::new(first_name, surname),
            gender,
            ..Self::default()
        }
    }
}

impl Walk for Person {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        self.primary_name.refs(out);
        self.alternate_names.refs(out);
        self.event_ref_list.refs(out);
        push_list(out, RecordKind::Family, &self.family_list);
        push_list(out, RecordKind::Family, &self.parent_family_list);
        self.media_list.refs(out);
        self.address_list.refs(out);
        self.attribute_list.refs(out);
        self.person_ref_list.refs(out);
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        if kind == RecordKind::Event {
            let birth = self.birth_ref_index.and_then(|i| self.event_ref_list.get(i)).map(|r| r.handle.clone());
            let death = self.death_ref_index.and_then(|i| self.event_ref_list.get(i)).map(|r| r.handle.clone());
            self.event_ref_list.prune(kind, handles);
            let find = |h: Option<Handle>| {
                h.and_then(|h| self.event_ref_list.iter().position(|r| r.handle == h))
            };
            self.birth_ref_index = find(birth);
            self.death_ref_index = find(death);
        } else {
            self.event_ref_list.prune(kind, handles);
        }
        self.primary_name.prune(kind, handles);
        self.alternate_names.prune(kind, handles);
        prune_list(&mut self.family_list, RecordKind::Family, kind, handles);
        prune_list(&mut self.parent_family_list, RecordKind::Family, kind, handles);
        self.media_list.prune(kind, handles);
        self.address_list.prune(kind, handles);
        self.attribute_list.prune(kind, handles);
        self.person_ref_list.prune(kind, handles);
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        self.primary_name.labels(out);
        self.alternate_names.labels(out);
        self.event_ref_list.labels(out);
        self.media_list.labels(out);
        self.urls.labels(out);
        attribute_labels(&self.attribute_list, Vocabulary::IndividualAttributes, out);
    }
}

/// A couple and their children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Family {
    pub handle: Handle,
    pub external_id: String,
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub father_handle: Option<Handle>,
    pub mother_handle: Option<Handle>,
    pub child_ref_list: Vec<ChildRef>,
    pub family_rel: TypeLabel,
    pub event_ref_list: Vec<EventRef>,
    pub media_list: Vec<MediaRef>,
    pub attribute_list: Vec<Attribute>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
}

impl Family {
    /// True when the family has no parents and no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.father_handle.is_none() && self.mother_handle.is_none() && self.child_ref_list.is_empty()
    }
}

impl Walk for Family {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_opt(out, RecordKind::Person, self.father_handle.as_ref());
        push_opt(out, RecordKind::Person, self.mother_handle.as_ref());
        self.child_ref_list.refs(out);
        self.event_ref_list.refs(out);
        self.media_list.refs(out);
        self.attribute_list.refs(out);
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_opt(&mut self.father_handle, RecordKind::Person, kind, handles);
        prune_opt(&mut self.mother_handle, RecordKind::Person, kind, handles);
        self.child_ref_list.prune(kind, handles);
        self.event_ref_list.prune(kind, handles);
        self.media_list.prune(kind, handles);
        self.attribute_list.prune(kind, handles);
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::FamilyRelTypes, &self.family_rel);
        self.child_ref_list.labels(out);
        self.event_ref_list.labels(out);
        self.media_list.labels(out);
        attribute_labels(&self.attribute_list, Vocabulary::FamilyAttributes, out);
    }
}

/// Something that happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub handle: Handle,
    pub external_id: String,
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub event_type: TypeLabel,
    pub date: Date,
    pub description: String,
    pub place: Option<Handle>,
    pub media_list: Vec<MediaRef>,
    pub attribute_list: Vec<Attribute>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
}

impl Walk for Event {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_opt(out, RecordKind::Place, self.place.as_ref());
        self.media_list.refs(out);
        self.attribute_list.refs(out);
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_opt(&mut self.place, RecordKind::Place, kind, handles);
        self.media_list.prune(kind, handles);
        self.attribute_list.prune(kind, handles);
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::EventNames, &self.event_type);
        self.media_list.labels(out);
        attribute_labels(&self.attribute_list, Vocabulary::EventAttributes, out);
    }
}

/// A location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Place {
    pub handle: Handle,
    pub external_id: String,
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub title: String,
    pub name: PlaceName,
    pub alt_names: Vec<PlaceName>,
    pub place_type: TypeLabel,
    pub code: String,
    pub lat: String,
    pub long: String,
    /// Enclosing places; the first one is the primary enclosure.
    pub placeref_list: Vec<PlaceRef>,
    pub urls: Vec<Url>,
    pub media_list: Vec<MediaRef>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
}

impl Place {
    /// Handle of the primary enclosing place.
    #[must_use]
    pub fn enclosed_by(&self) -> Option<&Handle> {
        self.placeref_list.first().map(|r| &r.handle)
    }
}

impl Walk for Place {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        self.placeref_list.refs(out);
        self.media_list.refs(out);
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        self.placeref_list.prune(kind, handles);
        self.media_list.prune(kind, handles);
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::PlaceTypes, &self.place_type);
        self.urls.labels(out);
        self.media_list.labels(out);
    }
}

/// A source of information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    pub handle: Handle,
    pub external_id: String,
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub title: String,
    pub author: String,
    pub pubinfo: String,
    pub abbrev: String,
    pub attribute_list: Vec<Attribute>,
    pub reporef_list: Vec<RepoRef>,
    pub media_list: Vec<MediaRef>,
    pub note_list: Vec<Handle>,
}

impl Walk for Source {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        self.attribute_list.refs(out);
        self.reporef_list.refs(out);
        self.media_list.refs(out);
        push_list(out, RecordKind::Note, &self.note_list);
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        self.attribute_list.prune(kind, handles);
        self.reporef_list.prune(kind, handles);
        self.media_list.prune(kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        self.reporef_list.labels(out);
        self.media_list.labels(out);
        attribute_labels(&self.attribute_list, Vocabulary::SourceAttributes, out);
    }
}

/// A reference to a particular part of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Citation {
    pub handle: Handle,
    pub external_id: String,
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub source_handle: Option<Handle>,
    pub page: String,
    pub date: Date,
    /// 0 (very low) to 4 (very high).
    pub confidence: u8,
    pub attribute_list: Vec<Attribute>,
    pub media_list: Vec<MediaRef>,
    pub note_list: Vec<Handle>,
}

impl Walk for Citation {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_opt(out, RecordKind::Source, self.source_handle.as_ref());
        self.attribute_list.refs(out);
        self.media_list.refs(out);
        push_list(out, RecordKind::Note, &self.note_list);
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_opt(&mut self.source_handle, RecordKind::Source, kind, handles);
        self.attribute_list.prune(kind, handles);
        self.media_list.prune(kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        self.media_list.labels(out);
        attribute_labels(&self.attribute_list, Vocabulary::SourceAttributes, out);
    }
}

/// An archive, library or other holder of sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub handle: Handle,
    pub external_id: String,
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub name: String,
    pub repo_type: TypeLabel,
    pub address_list: Vec<Address>,
    pub urls: Vec<Url>,
    pub note_list: Vec<Handle>,
}

impl Walk for Repository {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        self.address_list.refs(out);
        push_list(out, RecordKind::Note, &self.note_list);
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        self.address_list.prune(kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::RepositoryTypes, &self.repo_type);
        self.urls.labels(out);
    }
}

/// An image, document or other file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    pub handle: Handle,
    pub external_id: String,
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub path: String,
    pub mime: String,
    pub desc: String,
    pub checksum: String,
    pub date: Date,
    pub attribute_list: Vec<Attribute>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
}

impl Walk for Media {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        self.attribute_list.refs(out);
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        self.attribute_list.prune(kind, handles);
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        attribute_labels(&self.attribute_list, Vocabulary::MediaAttributes, out);
    }
}

/// Free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Note {
    pub handle: Handle,
    pub external_id: String,
    pub change: i64,
    pub private: bool,
    pub tag_list: Vec<Handle>,
    pub text: String,
    /// Preformatted text keeps its whitespace.
    pub preformatted: bool,
    pub note_type: TypeLabel,
}

impl Note {
    /// A note with text and the `General` type.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            note_type: TypeLabel::standard("General"),
            ..Self::default()
        }
    }
}

impl Walk for Note {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Tag, &self.tag_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_list(&mut self.tag_list, RecordKind::Tag, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::NoteTypes, &self.note_type);
    }
}

/// A label applied to other records. Tags have no external ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub handle: Handle,
    pub change: i64,
    pub name: String,
    /// `#rrggbb`.
    pub color: String,
    pub priority: i32,
}

impl Tag {
    /// A tag with a name and black colour.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: String::from("#000000"),
            ..Self::default()
        }
    }
}

impl Walk for Tag {
    fn refs(&self, _out: &mut Vec<HandleRef>) {}

    fn prune(&mut self, _kind: RecordKind, _handles: &[Handle]) {}
}
