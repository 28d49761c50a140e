//! Custom-type vocabularies.
//!
//! Each commit collects the user-defined type labels a record uses. The
//! sets only grow while the store is open and are persisted to metadata
//! when a transaction commits.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A named set of custom type labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Vocabulary {
    /// Person attribute types.
    IndividualAttributes,
    /// Family attribute types.
    FamilyAttributes,
    /// Event and event-reference attribute types.
    EventAttributes,
    /// Media and media-reference attribute types.
    MediaAttributes,
    /// Source and citation attribute types.
    SourceAttributes,
    /// Roles in event references.
    EventRoleNames,
    /// Name types.
    NameTypes,
    /// Surname origin types.
    OriginTypes,
    /// URL types.
    UrlTypes,
    /// Child-to-parent relationship types.
    ChildRefTypes,
    /// Family relationship types.
    FamilyRelTypes,
    /// Media types in repository references.
    SourceMediaTypes,
    /// Repository types.
    RepositoryTypes,
    /// Note types.
    NoteTypes,
    /// Place types.
    PlaceTypes,
    /// Event types.
    EventNames,
}

impl Vocabulary {
    /// Every vocabulary.
    pub const ALL: [Vocabulary; 16] = [
        Vocabulary::IndividualAttributes,
        Vocabulary::FamilyAttributes,
        Vocabulary::EventAttributes,
        Vocabulary::MediaAttributes,
        Vocabulary::SourceAttributes,
        Vocabulary::EventRoleNames,
        Vocabulary::NameTypes,
        Vocabulary::OriginTypes,
        Vocabulary::UrlTypes,
        Vocabulary::ChildRefTypes,
        Vocabulary::FamilyRelTypes,
        Vocabulary::SourceMediaTypes,
        Vocabulary::RepositoryTypes,
        Vocabulary::NoteTypes,
        Vocabulary::PlaceTypes,
        Vocabulary::EventNames,
    ];

    /// Key suffix used in the metadata table.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::IndividualAttributes => "individual_attributes",
            Self::FamilyAttributes => "family_attributes",
            Self::EventAttributes => "event_attributes",
            Self::MediaAttributes => "media_attributes",
            Self::SourceAttributes => "source_attributes",
            Self::EventRoleNames => "event_role_names",
            Self::NameTypes => "name_types",
            Self::OriginTypes => "origin_types",
            Self::UrlTypes => "url_types",
            Self::ChildRefTypes => "child_ref_types",
            Self::FamilyRelTypes => "family_rel_types",
            Self::SourceMediaTypes => "source_media_types",
            Self::RepositoryTypes => "repository_types",
            Self::NoteTypes => "note_types",
            Self::PlaceTypes => "place_types",
            Self::EventNames => "event_names",
        }
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// All vocabularies of one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularySet {
    sets: BTreeMap<Vocabulary, BTreeSet<String>>,
    dirty: bool,
}

impl VocabularySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds labels seen in a record. Returns true if anything was new.
    pub fn extend(&mut self, labels: impl IntoIterator<Item = (Vocabulary, String)>) -> bool {
        let mut added = false;
        for (vocab, label) in labels {
            added |= self.sets.entry(vocab).or_default().insert(label);
        }
        self.dirty |= added;
        added
    }

    /// Replaces one vocabulary, as loaded from metadata.
    pub fn load(&mut self, vocab: Vocabulary, labels: impl IntoIterator<Item = String>) {
        self.sets.insert(vocab, labels.into_iter().collect());
    }

    /// Labels of one vocabulary, sorted.
    #[must_use]
    pub fn get(&self, vocab: Vocabulary) -> Vec<String> {
        self.sets
            .get(&vocab)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// True if labels were added since the last [`Self::mark_clean`].
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the current contents as persisted.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_reports_new_labels_only() {
        let mut set = VocabularySet::new();
        assert!(set.extend([(Vocabulary::EventNames, "Graduation".to_string())]));
        assert!(!set.extend([(Vocabulary::EventNames, "Graduation".to_string())]));
        assert!(set.is_dirty());
        set.mark_clean();
        assert!(!set.is_dirty());
        assert_eq!(set.get(Vocabulary::EventNames), vec!["Graduation"]);
        assert!(set.get(Vocabulary::NoteTypes).is_empty());
    }

    #[test]
    fn keys_are_distinct() {
        let keys: BTreeSet<_> = Vocabulary::ALL.iter().map(|v| v.key()).collect();
        assert_eq!(keys.len(), Vocabulary::ALL.len());
    }
}
