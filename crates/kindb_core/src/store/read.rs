//! Reads, sorted listings, metadata accessors and bookmarks.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::Store;
use crate::collation::Collator;
use crate::cursor::Cursor;
use crate::dispatch::{NAME_GROUP_TABLE, REFERENCE_TABLE, REF_HANDLE};
use crate::error::{CoreError, CoreResult};
use crate::ids::default_prefix;
use crate::index::reference::ReferenceEdge;
use crate::metadata;
use crate::model::{Gender, Handle, HandleRef, Record, RecordKind, Researcher, Tag};
use crate::selection::QuerySet;
use crate::signals::Signal;
use crate::stats::GenderStats;
use crate::vocab::Vocabulary;

/// Counts and settings of an open store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    /// Directory, for persistent stores.
    pub path: Option<String>,
    /// Engine name.
    pub backend: String,
    /// Payload format name.
    pub serializer: String,
    /// Schema version.
    pub schema_version: u32,
    /// Whether writes are refused.
    pub read_only: bool,
    /// Collation locale.
    pub locale: String,
    /// Records per kind, keyed by table name.
    pub counts: BTreeMap<String, usize>,
    /// Distinct surnames.
    pub surnames: usize,
    /// Undoable transactions.
    pub undo_depth: usize,
}

/// Secondary values of every row of a kind, keyed by handle.
type FieldMap = HashMap<String, String>;

impl Store {
    /// Fetches a record by handle.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` if no record of `kind` has `handle`.
    pub fn get(&self, kind: RecordKind, handle: &Handle) -> CoreResult<Record> {
        self.ensure_open()?;
        match self.backend.get(kind.table(), handle.as_str())? {
            Some(bytes) => Ok(Record::decode(kind, self.serializer, &bytes)?),
            None => Err(CoreError::handle_not_found(kind, handle)),
        }
    }

    /// Fetches a record by external ID. A miss is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    pub fn get_by_id(&self, kind: RecordKind, external_id: &str) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        if default_prefix(kind).is_none() || external_id.is_empty() {
            return Ok(None);
        }
        let owners = self
            .backend
            .lookup_indexed(kind.table(), "external_id", external_id)?;
        for key in owners {
            if let Some(bytes) = self.backend.get(kind.table(), &key)? {
                return Ok(Some(Record::decode(kind, self.serializer, &bytes)?));
            }
        }
        Ok(None)
    }

    /// True if a record of `kind` has `handle`.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn has(&self, kind: RecordKind, handle: &Handle) -> CoreResult<bool> {
        self.ensure_open()?;
        Ok(self.backend.get(kind.table(), handle.as_str())?.is_some())
    }

    /// Number of records of `kind`.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn count(&self, kind: RecordKind) -> CoreResult<usize> {
        self.ensure_open()?;
        Ok(self.backend.count(kind.table())?)
    }

    /// Opens a cursor over the records of `kind`.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn cursor(&self, kind: RecordKind) -> CoreResult<Cursor<'_>> {
        self.ensure_open()?;
        Cursor::open(&*self.backend, self.serializer, kind)
    }

    /// Iterates the records of `kind` in storage order.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn iter(&self, kind: RecordKind) -> CoreResult<Cursor<'_>> {
        self.cursor(kind)
    }

    /// Starts a query over the records of `kind`.
    #[must_use]
    pub fn query(&self, kind: RecordKind) -> QuerySet<'_> {
        QuerySet::new(self, kind)
    }

    /// Lists the handles of `kind`.
    ///
    /// Unsorted handles come in storage order. Sorted handles follow the
    /// kind's sort key under `locale`, or the store's collation when
    /// `locale` is `None`; ties are broken by handle.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn handles(
        &self,
        kind: RecordKind,
        sorted: bool,
        locale: Option<&str>,
    ) -> CoreResult<Vec<Handle>> {
        self.ensure_open()?;
        let keys = self.backend.keys(kind.table())?;
        if !sorted {
            return Ok(keys.into_iter().map(Handle::from).collect());
        }
        let collator = locale.map_or_else(|| self.collator.clone(), Collator::for_locale);
        let sort_key = self.sort_key_fn(kind)?;
        let mut keyed: Vec<(Vec<String>, String)> =
            keys.into_iter().map(|key| (sort_key(&key), key)).collect();
        keyed.sort_by(|a, b| collator.compare_fields(&a.0, &b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(keyed.into_iter().map(|(_, key)| Handle::from(key)).collect())
    }

    fn field_map(&self, kind: RecordKind, field: &str) -> CoreResult<FieldMap> {
        Ok(self
            .backend
            .scan_indexed(kind.table(), field)?
            .into_iter()
            .map(|(value, key)| (key, value))
            .collect())
    }

    /// Builds the sort key lookup for a kind from its secondary fields.
    fn sort_key_fn(&self, kind: RecordKind) -> CoreResult<Box<dyn Fn(&str) -> Vec<String>>> {
        let lookup = |map: &FieldMap, key: &str| map.get(key).cloned().unwrap_or_default();
        Ok(match kind {
            RecordKind::Person => {
                let surnames = self.field_map(kind, "surname")?;
                let given = self.field_map(kind, "given_name")?;
                Box::new(move |key| vec![lookup(&surnames, key), lookup(&given, key)])
            }
            RecordKind::Family => {
                let surnames = self.field_map(RecordKind::Person, "surname")?;
                let given = self.field_map(RecordKind::Person, "given_name")?;
                let fathers = self.field_map(kind, "father_handle")?;
                let mothers = self.field_map(kind, "mother_handle")?;
                Box::new(move |key| {
                    let parent = fathers.get(key).or_else(|| mothers.get(key));
                    match parent {
                        Some(p) => vec![lookup(&surnames, p), lookup(&given, p)],
                        None => vec![String::new(), String::new()],
                    }
                })
            }
            RecordKind::Citation => {
                let titles = self.field_map(RecordKind::Source, "title")?;
                let sources = self.field_map(kind, "source_handle")?;
                let pages = self.field_map(kind, "page")?;
                Box::new(move |key| {
                    let title = sources.get(key).map(|s| lookup(&titles, s)).unwrap_or_default();
                    vec![title, lookup(&pages, key)]
                })
            }
            RecordKind::Source | RecordKind::Place => {
                let titles = self.field_map(kind, "title")?;
                Box::new(move |key| vec![lookup(&titles, key)])
            }
            RecordKind::Media => {
                let descs = self.field_map(kind, "desc")?;
                let paths = self.field_map(kind, "path")?;
                Box::new(move |key| {
                    let desc = lookup(&descs, key);
                    if desc.is_empty() {
                        vec![lookup(&paths, key)]
                    } else {
                        vec![desc]
                    }
                })
            }
            RecordKind::Tag => {
                let names = self.field_map(kind, "name")?;
                Box::new(move |key| vec![lookup(&names, key)])
            }
            RecordKind::Event | RecordKind::Repository | RecordKind::Note => {
                let ids = self.field_map(kind, "external_id")?;
                Box::new(move |key| vec![lookup(&ids, key)])
            }
        })
    }

    /// Lazily yields `(owner kind, owner handle)` for every edge pointing
    /// at `handle`, optionally only from owners of the given kinds.
    ///
    /// # Errors
    ///
    /// Storage errors, up front or per item.
    pub fn find_backlink_handles(
        &self,
        handle: &Handle,
        kinds: Option<&[RecordKind]>,
    ) -> CoreResult<impl Iterator<Item = CoreResult<HandleRef>> + '_> {
        self.ensure_open()?;
        let keys = self
            .backend
            .lookup_indexed(REFERENCE_TABLE, REF_HANDLE, handle.as_str())?;
        let only: Option<Vec<RecordKind>> = kinds.map(<[RecordKind]>::to_vec);
        let backend = &*self.backend;
        let serializer = self.serializer;
        Ok(keys.into_iter().filter_map(move |key| {
            let edge: ReferenceEdge = match backend.get(REFERENCE_TABLE, &key) {
                Ok(Some(bytes)) => match serializer.decode(&bytes) {
                    Ok(edge) => edge,
                    Err(e) => return Some(Err(e.into())),
                },
                Ok(None) => return None,
                Err(e) => return Some(Err(e.into())),
            };
            match &only {
                Some(kinds) if !kinds.contains(&edge.owner_kind) => None,
                _ => Some(Ok((edge.owner_kind, edge.owner))),
            }
        }))
    }

    /// Finds a tag by exact name.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    pub fn get_tag_from_name(&self, name: &str) -> CoreResult<Option<Tag>> {
        self.ensure_open()?;
        let table = RecordKind::Tag.table();
        for key in self.backend.lookup_indexed(table, "name", name)? {
            if let Some(bytes) = self.backend.get(table, &key)? {
                return Ok(Some(self.serializer.decode(&bytes)?));
            }
        }
        Ok(None)
    }

    /// Places whose first enclosing reference is `handle`.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn find_place_child_handles(&self, handle: &Handle) -> CoreResult<Vec<Handle>> {
        self.ensure_open()?;
        Ok(self
            .backend
            .lookup_indexed(RecordKind::Place.table(), "enclosed_by", handle.as_str())?
            .into_iter()
            .map(Handle::from)
            .collect())
    }

    /// Given-name gender counts.
    #[must_use]
    pub fn gender_stats(&self) -> &GenderStats {
        &self.stats
    }

    /// Guesses a gender for a given name from the stored statistics.
    #[must_use]
    pub fn guess_gender(&self, first_name: &str) -> Gender {
        self.stats.guess_gender(first_name)
    }

    /// Distinct primary surnames in collation order.
    #[must_use]
    pub fn surname_list(&self) -> &[String] {
        self.surnames.as_slice()
    }

    /// Custom labels seen in a vocabulary, sorted.
    #[must_use]
    pub fn custom_types(&self, vocab: Vocabulary) -> Vec<String> {
        self.vocab.get(vocab)
    }

    /// The researcher recorded for this store.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    pub fn researcher(&self) -> CoreResult<Researcher> {
        self.ensure_open()?;
        Ok(metadata::read(&*self.backend, self.serializer, metadata::RESEARCHER)?.unwrap_or_default())
    }

    /// Records the researcher.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` on a read-only store, or a storage error.
    pub fn set_researcher(&mut self, researcher: &Researcher) -> CoreResult<()> {
        self.ensure_writable()?;
        self.write_meta(metadata::RESEARCHER, researcher)
    }

    /// Handle of the home person, if set.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    pub fn default_person_handle(&self) -> CoreResult<Option<Handle>> {
        self.ensure_open()?;
        metadata::read(&*self.backend, self.serializer, metadata::DEFAULT_PERSON)
    }

    /// Sets or clears the home person.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` on a read-only store, or a storage error.
    pub fn set_default_person_handle(&mut self, handle: Option<&Handle>) -> CoreResult<()> {
        self.ensure_writable()?;
        match handle {
            Some(handle) => self.write_meta(metadata::DEFAULT_PERSON, handle),
            None => self.remove_meta(metadata::DEFAULT_PERSON),
        }
    }

    /// Base directory for relative media paths.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    pub fn media_path(&self) -> CoreResult<Option<String>> {
        self.ensure_open()?;
        metadata::read(&*self.backend, self.serializer, metadata::MEDIA_PATH)
    }

    /// Sets the media base directory.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` on a read-only store, or a storage error.
    pub fn set_media_path(&mut self, path: &str) -> CoreResult<()> {
        self.ensure_writable()?;
        self.write_meta(metadata::MEDIA_PATH, path)
    }

    /// Counts per kind plus schema and engine details.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn summary(&self) -> CoreResult<StoreSummary> {
        self.ensure_open()?;
        let mut counts = BTreeMap::new();
        for kind in RecordKind::ALL {
            counts.insert(kind.table().to_string(), self.backend.count(kind.table())?);
        }
        Ok(StoreSummary {
            path: self.path().map(|p| p.display().to_string()),
            backend: self.backend.name().to_string(),
            serializer: self.serializer.name().to_string(),
            schema_version: self.schema_version,
            read_only: self.config.read_only,
            locale: self.collator.locale().to_string(),
            counts,
            surnames: self.surnames.as_slice().len(),
            undo_depth: self.history.undo_descriptions().len(),
        })
    }

    /// Groups a surname under another name, or ungroups it when `group`
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` on a read-only store, or a storage error.
    pub fn set_name_group_mapping(&mut self, name: &str, group: &str) -> CoreResult<()> {
        self.ensure_writable()?;
        let value = if group.is_empty() {
            None
        } else {
            Some(self.serializer.encode(group)?)
        };
        self.write_direct(NAME_GROUP_TABLE, name, value)?;
        self.signals.emit(&Signal::PersonGroupnameRebuild {
            name: name.to_string(),
            group: group.to_string(),
        });
        Ok(())
    }

    /// The group of a surname, if one was set.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    pub fn name_group_mapping(&self, name: &str) -> CoreResult<Option<String>> {
        self.ensure_open()?;
        match self.backend.get(NAME_GROUP_TABLE, name)? {
            Some(bytes) => Ok(Some(self.serializer.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every grouped surname, in collation order.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn name_group_keys(&self) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        let mut keys = self.backend.keys(NAME_GROUP_TABLE)?;
        keys.sort_by(|a, b| self.collator.compare(a, b));
        Ok(keys)
    }

    /// True if `name` has a group.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn has_name_group_key(&self, name: &str) -> CoreResult<bool> {
        self.ensure_open()?;
        Ok(self.backend.get(NAME_GROUP_TABLE, name)?.is_some())
    }

    /// Bookmarked handles of a kind, in order.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    pub fn bookmarks(&self, kind: RecordKind) -> CoreResult<Vec<Handle>> {
        self.ensure_open()?;
        Ok(metadata::read(&*self.backend, self.serializer, &metadata::bookmarks_key(kind))?
            .unwrap_or_default())
    }

    /// Replaces the bookmarks of a kind. Not part of any transaction.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` on a read-only store, or a storage error.
    pub fn set_bookmarks(&mut self, kind: RecordKind, handles: &[Handle]) -> CoreResult<()> {
        self.ensure_writable()?;
        self.write_meta(&metadata::bookmarks_key(kind), handles)?;
        self.signals.emit(&Signal::BookmarksChanged(kind));
        Ok(())
    }

    /// Appends a bookmark unless it is already present.
    ///
    /// # Errors
    ///
    /// As for [`Store::set_bookmarks`].
    pub fn add_bookmark(&mut self, kind: RecordKind, handle: &Handle) -> CoreResult<bool> {
        let mut marks = self.bookmarks(kind)?;
        if marks.contains(handle) {
            return Ok(false);
        }
        marks.push(handle.clone());
        self.set_bookmarks(kind, &marks)?;
        Ok(true)
    }

    /// Removes a bookmark. Returns false if it was not present.
    ///
    /// # Errors
    ///
    /// As for [`Store::set_bookmarks`].
    pub fn remove_bookmark(&mut self, kind: RecordKind, handle: &Handle) -> CoreResult<bool> {
        let mut marks = self.bookmarks(kind)?;
        let before = marks.len();
        marks.retain(|h| h != handle);
        if marks.len() == before {
            return Ok(false);
        }
        self.set_bookmarks(kind, &marks)?;
        Ok(true)
    }
}
