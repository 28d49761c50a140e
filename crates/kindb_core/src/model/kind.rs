//! The ten primary record kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Kind of a primary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    /// An individual.
    Person,
    /// A couple and their children.
    Family,
    /// Something that happened at a time and place.
    Event,
    /// A location, possibly enclosed by others.
    Place,
    /// A source of information.
    Source,
    /// A reference to a specific part of a source.
    Citation,
    /// Where sources are held.
    Repository,
    /// An image or other file.
    Media,
    /// Free text.
    Note,
    /// A label applied to other records.
    Tag,
}

impl RecordKind {
    /// Every kind, in canonical order.
    pub const ALL: [RecordKind; 10] = [
        RecordKind::Person,
        RecordKind::Family,
        RecordKind::Event,
        RecordKind::Place,
        RecordKind::Source,
        RecordKind::Citation,
        RecordKind::Repository,
        RecordKind::Media,
        RecordKind::Note,
        RecordKind::Tag,
    ];

    /// Display name, e.g. `Person`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Family => "Family",
            Self::Event => "Event",
            Self::Place => "Place",
            Self::Source => "Source",
            Self::Citation => "Citation",
            Self::Repository => "Repository",
            Self::Media => "Media",
            Self::Note => "Note",
            Self::Tag => "Tag",
        }
    }

    /// Physical table name, also used as the signal prefix.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Family => "family",
            Self::Event => "event",
            Self::Place => "place",
            Self::Source => "source",
            Self::Citation => "citation",
            Self::Repository => "repository",
            Self::Media => "media",
            Self::Note => "note",
            Self::Tag => "tag",
        }
    }

    /// Position in [`RecordKind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecordKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = match wanted.as_str() {
            "people" => "person",
            "families" => "family",
            "repositories" => "repository",
            other => other.strip_suffix('s').unwrap_or(other),
        };
        RecordKind::ALL
            .into_iter()
            .find(|k| k.table() == wanted)
            .ok_or_else(|| CoreError::invalid_operation(format!("unknown record kind '{s}'")))
    }
}
