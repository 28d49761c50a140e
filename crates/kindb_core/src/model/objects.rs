//! Embedded sub-objects shared by the primary records.
//!
//! Only the parts that matter to the store are modelled in detail:
//! handles to other records, type labels that feed the vocabularies, and
//! the name fields used for sorting and statistics. Everything else is
//! carried as opaque payload.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::walk::{prune_list, push_label, push_list, HandleRef, Walk};
use super::{Handle, RecordKind};
use crate::vocab::Vocabulary;

/// A type value: one of the built-in labels or a user-defined one.
///
/// Custom labels are collected into the store's vocabularies so that
/// editors can offer them again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeLabel {
    /// A built-in label such as `Birth`.
    Standard(String),
    /// A user-defined label.
    Custom(String),
}

impl TypeLabel {
    /// Creates a built-in label.
    pub fn standard(label: impl Into<String>) -> Self {
        Self::Standard(label.into())
    }

    /// Creates a user-defined label.
    pub fn custom(label: impl Into<String>) -> Self {
        Self::Custom(label.into())
    }

    /// Label text regardless of origin.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Standard(s) | Self::Custom(s) => s,
        }
    }

    /// Returns the text of a non-empty custom label.
    #[must_use]
    pub fn custom_label(&self) -> Option<&str> {
        match self {
            Self::Custom(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

impl Default for TypeLabel {
    fn default() -> Self {
        Self::Standard(String::from("Unknown"))
    }
}

impl fmt::Display for TypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded gender of a person.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Female.
    Female,
    /// Male.
    Male,
    /// Not known.
    #[default]
    Unknown,
}

/// A calendar date as entered, with the parsed parts that are known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Date {
    /// Text as entered.
    pub text: String,
    /// Year, if known.
    pub year: Option<i32>,
    /// Month (1-12), if known.
    pub month: Option<u8>,
    /// Day of month, if known.
    pub day: Option<u8>,
}

impl Date {
    /// A date with only a year.
    #[must_use]
    pub fn year(year: i32) -> Self {
        Self {
            text: year.to_string(),
            year: Some(year),
            ..Self::default()
        }
    }
}

/// One surname of a name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Surname {
    pub surname: String,
    pub prefix: String,
    /// Exactly one surname of a name should be primary.
    pub primary: bool,
    pub origin_type: TypeLabel,
    pub connector: String,
}

impl Surname {
    /// A primary surname with no prefix.
    pub fn primary(surname: impl Into<String>) -> Self {
        Self {
            surname: surname.into(),
            primary: true,
            ..Self::default()
        }
    }
}

/// A personal name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Name {
    pub first_name: String,
    pub surname_list: Vec<Surname>,
    pub suffix: String,
    pub title: String,
    pub call: String,
    pub nick: String,
    pub name_type: TypeLabel,
    /// Explicit grouping surname, overriding the name-group table.
    pub group_as: String,
    pub date: Date,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl Name {
    /// A name with a given name and one primary surname.
    pub fn new(first_name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            surname_list: vec![Surname::primary(surname)],
            ..Self::default()
        }
    }

    /// The primary surname, or the first one if none is flagged.
    #[must_use]
    pub fn primary_surname(&self) -> Option<&Surname> {
        self.surname_list
            .iter()
            .find(|s| s.primary)
            .or_else(|| self.surname_list.first())
    }

    /// Text of the primary surname, empty if there is none.
    #[must_use]
    pub fn surname(&self) -> &str {
        self.primary_surname().map_or("", |s| s.surname.as_str())
    }
}

impl Walk for Name {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::NameTypes, &self.name_type);
        for s in &self.surname_list {
            push_label(out, Vocabulary::OriginTypes, &s.origin_type);
        }
    }
}

/// A typed key/value fact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attribute {
    pub attr_type: TypeLabel,
    pub value: String,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(attr_type: TypeLabel, value: impl Into<String>) -> Self {
        Self {
            attr_type,
            value: value.into(),
            ..Self::default()
        }
    }
}

impl Walk for Attribute {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
    }
}

/// Appends the custom attribute types of `list` to `vocab`.
pub(crate) fn attribute_labels(
    list: &[Attribute],
    vocab: Vocabulary,
    out: &mut Vec<(Vocabulary, String)>,
) {
    for a in list {
        push_label(out, vocab, &a.attr_type);
    }
}

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub locality: String,
    pub city: String,
    pub county: String,
    pub state: String,
    pub country: String,
    pub postal: String,
    pub phone: String,
    pub date: Date,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl Walk for Address {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
    }
}

/// A web address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Url {
    pub path: String,
    pub desc: String,
    pub url_type: TypeLabel,
    pub private: bool,
}

impl Walk for Url {
    fn refs(&self, _out: &mut Vec<HandleRef>) {}

    fn prune(&mut self, _kind: RecordKind, _handles: &[Handle]) {}

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::UrlTypes, &self.url_type);
    }
}

/// A link from a person or family to an event, with the role played.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRef {
    pub handle: Handle,
    pub role: TypeLabel,
    pub attribute_list: Vec<Attribute>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl EventRef {
    /// A reference with the `Primary` role.
    #[must_use]
    pub fn primary(handle: Handle) -> Self {
        Self {
            handle,
            role: TypeLabel::standard("Primary"),
            ..Self::default()
        }
    }
}

impl Walk for EventRef {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Event, std::slice::from_ref(&self.handle));
        self.attribute_list.refs(out);
        push_list(out, RecordKind::Note, &self.note_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        self.attribute_list.prune(kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::EventRoleNames, &self.role);
        attribute_labels(&self.attribute_list, Vocabulary::EventAttributes, out);
    }

    fn target(&self) -> Option<(RecordKind, &Handle)> {
        Some((RecordKind::Event, &self.handle))
    }
}

/// A child of a family, with the relationship to each parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildRef {
    pub handle: Handle,
    pub frel: TypeLabel,
    pub mrel: TypeLabel,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl ChildRef {
    /// A birth child.
    #[must_use]
    pub fn birth(handle: Handle) -> Self {
        Self {
            handle,
            frel: TypeLabel::standard("Birth"),
            mrel: TypeLabel::standard("Birth"),
            ..Self::default()
        }
    }
}

impl Walk for ChildRef {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Person, std::slice::from_ref(&self.handle));
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::ChildRefTypes, &self.frel);
        push_label(out, Vocabulary::ChildRefTypes, &self.mrel);
    }

    fn target(&self) -> Option<(RecordKind, &Handle)> {
        Some((RecordKind::Person, &self.handle))
    }
}

/// An association between two people (godfather, witness, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonRef {
    pub handle: Handle,
    pub rel: String,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl Walk for PersonRef {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Person, std::slice::from_ref(&self.handle));
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
    }

    fn target(&self) -> Option<(RecordKind, &Handle)> {
        Some((RecordKind::Person, &self.handle))
    }
}

/// A use of a media object, optionally cropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaRef {
    pub handle: Handle,
    /// Crop rectangle in percent: left, top, right, bottom.
    pub rect: Option<[u8; 4]>,
    pub attribute_list: Vec<Attribute>,
    pub citation_list: Vec<Handle>,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl Walk for MediaRef {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Media, std::slice::from_ref(&self.handle));
        self.attribute_list.refs(out);
        push_list(out, RecordKind::Citation, &self.citation_list);
        push_list(out, RecordKind::Note, &self.note_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        self.attribute_list.prune(kind, handles);
        prune_list(&mut self.citation_list, RecordKind::Citation, kind, handles);
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        attribute_labels(&self.attribute_list, Vocabulary::MediaAttributes, out);
    }

    fn target(&self) -> Option<(RecordKind, &Handle)> {
        Some((RecordKind::Media, &self.handle))
    }
}

/// Where a source is held, and under which call number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoRef {
    pub handle: Handle,
    pub call_number: String,
    pub media_type: TypeLabel,
    pub note_list: Vec<Handle>,
    pub private: bool,
}

impl Walk for RepoRef {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Repository, std::slice::from_ref(&self.handle));
        push_list(out, RecordKind::Note, &self.note_list);
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        prune_list(&mut self.note_list, RecordKind::Note, kind, handles);
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        push_label(out, Vocabulary::SourceMediaTypes, &self.media_type);
    }

    fn target(&self) -> Option<(RecordKind, &Handle)> {
        Some((RecordKind::Repository, &self.handle))
    }
}

/// Enclosure of one place by another, optionally dated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceRef {
    pub handle: Handle,
    pub date: Date,
}

impl PlaceRef {
    /// An undated enclosure.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            date: Date::default(),
        }
    }
}

impl Walk for PlaceRef {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        push_list(out, RecordKind::Place, std::slice::from_ref(&self.handle));
    }

    fn prune(&mut self, _kind: RecordKind, _handles: &[Handle]) {}

    fn target(&self) -> Option<(RecordKind, &Handle)> {
        Some((RecordKind::Place, &self.handle))
    }
}

/// A name of a place, optionally in a language and dated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceName {
    pub value: String,
    pub lang: String,
    pub date: Date,
}

/// Researcher / owner details stored in the metadata table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Researcher {
    pub name: String,
    pub address: Address,
    pub email: String,
}
