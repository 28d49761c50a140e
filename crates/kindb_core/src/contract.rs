//! The read and write contracts.
//!
//! [`ReadableStore`] and [`WritableStore`] are the whole surface external
//! collaborators program against. Each has a handful of required,
//! kind-generic methods; the typed per-kind methods (`get_person`,
//! `add_family`, `iter_events`, ...) are provided on top of them.

use crate::error::{CoreError, CoreResult};
use crate::model::{
    Citation, Event, Family, Handle, HandleRef, Media, Note, Person, Place, PrimaryRecord, Record,
    RecordKind, Repository, Source, Tag,
};
use crate::store::Store;
use crate::transaction::Transaction;

/// Boxed record iterator returned by the contracts.
pub type Records<'a, P> = Box<dyn Iterator<Item = CoreResult<P>> + 'a>;

fn typed<P: PrimaryRecord>(record: Record) -> CoreResult<P> {
    let found = record.kind();
    record.into_type::<P>().ok_or_else(|| {
        CoreError::invalid_format(format!("expected a {} record, found a {found}", P::KIND))
    })
}

macro_rules! read_methods {
    ($($ty:ident: $get:ident, $handles:ident, $iter:ident, $count:ident, $has:ident;)*) => {$(
        #[doc = concat!("Fetches a ", stringify!($ty), " by handle.")]
        ///
        /// # Errors
        ///
        /// Returns `HandleNotFound` if there is no such record.
        fn $get(&self, handle: &Handle) -> CoreResult<$ty> {
            typed(self.get_record(<$ty>::KIND, handle)?)
        }

        #[doc = concat!("Lists ", stringify!($ty), " handles, optionally collated.")]
        ///
        /// # Errors
        ///
        /// Storage errors only.
        fn $handles(&self, sorted: bool, locale: Option<&str>) -> CoreResult<Vec<Handle>> {
            self.record_handles(<$ty>::KIND, sorted, locale)
        }

        #[doc = concat!("Iterates every ", stringify!($ty), " lazily.")]
        ///
        /// # Errors
        ///
        /// Storage errors, up front or per item.
        fn $iter(&self) -> CoreResult<Records<'_, $ty>> {
            Ok(Box::new(self.iter_records(<$ty>::KIND)?.map(|r| r.and_then(typed))))
        }

        #[doc = concat!("Number of ", stringify!($ty), " records.")]
        ///
        /// # Errors
        ///
        /// Storage errors only.
        fn $count(&self) -> CoreResult<usize> {
            self.count_records(<$ty>::KIND)
        }

        #[doc = concat!("True if a ", stringify!($ty), " has this handle.")]
        ///
        /// # Errors
        ///
        /// Storage errors only.
        fn $has(&self, handle: &Handle) -> CoreResult<bool> {
            self.has_record(<$ty>::KIND, handle)
        }
    )*};
}

macro_rules! by_id_methods {
    ($($ty:ident: $by_id:ident;)*) => {$(
        #[doc = concat!("Fetches a ", stringify!($ty), " by external ID; `None` if absent.")]
        ///
        /// # Errors
        ///
        /// Storage and codec errors only.
        fn $by_id(&self, external_id: &str) -> CoreResult<Option<$ty>> {
            self.get_record_by_id(<$ty>::KIND, external_id)?
                .map(typed)
                .transpose()
        }
    )*};
}

macro_rules! write_methods {
    ($($ty:ident: $add:ident, $commit:ident, $remove:ident;)*) => {$(
        #[doc = concat!("Adds a ", stringify!($ty), ", assigning its handle and, with `assign_id`, its external ID.")]
        ///
        /// On success `record` carries the assigned values.
        ///
        /// # Errors
        ///
        /// `ReadOnly`, `InvalidOperation` for a stale transaction, storage errors.
        fn $add(&mut self, record: &mut $ty, txn: &Transaction, assign_id: bool) -> CoreResult<Handle> {
            let mut any = record.clone().into_record();
            let handle = self.add_record(&mut any, txn, assign_id)?;
            *record = typed(any)?;
            Ok(handle)
        }

        #[doc = concat!("Stores a changed ", stringify!($ty), ". `change` defaults to now.")]
        ///
        /// # Errors
        ///
        /// `ReadOnly`, `InvalidOperation` for a stale transaction or a
        /// record without handle, storage errors.
        fn $commit(&mut self, record: &mut $ty, txn: &Transaction, change: Option<i64>) -> CoreResult<()> {
            let mut any = record.clone().into_record();
            self.commit_record(&mut any, txn, change)?;
            *record = typed(any)?;
            Ok(())
        }

        #[doc = concat!("Removes a ", stringify!($ty), " and the edges it owns.")]
        ///
        /// # Errors
        ///
        /// `HandleNotFound` if absent, `ReadOnly`, storage errors.
        fn $remove(&mut self, handle: &Handle, txn: &Transaction) -> CoreResult<()> {
            self.remove_record(<$ty>::KIND, handle, txn)
        }
    )*};
}

/// Read access to a store.
pub trait ReadableStore {
    /// Fetches a record of any kind by handle.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` if there is no such record.
    fn get_record(&self, kind: RecordKind, handle: &Handle) -> CoreResult<Record>;

    /// Fetches a record by external ID; `None` if absent.
    ///
    /// # Errors
    ///
    /// Storage and codec errors only.
    fn get_record_by_id(&self, kind: RecordKind, external_id: &str) -> CoreResult<Option<Record>>;

    /// Lists the handles of a kind, optionally collated.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    fn record_handles(
        &self,
        kind: RecordKind,
        sorted: bool,
        locale: Option<&str>,
    ) -> CoreResult<Vec<Handle>>;

    /// Iterates the records of a kind lazily.
    ///
    /// # Errors
    ///
    /// Storage errors, up front or per item.
    fn iter_records(&self, kind: RecordKind) -> CoreResult<Records<'_, Record>>;

    /// Number of records of a kind.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    fn count_records(&self, kind: RecordKind) -> CoreResult<usize>;

    /// True if a record of `kind` has `handle`.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    fn has_record(&self, kind: RecordKind, handle: &Handle) -> CoreResult<bool>;

    /// Every `(owner kind, owner handle)` referencing `handle`.
    ///
    /// # Errors
    ///
    /// Storage errors, up front or per item.
    fn find_backlinks(
        &self,
        handle: &Handle,
        kinds: Option<&[RecordKind]>,
    ) -> CoreResult<Box<dyn Iterator<Item = CoreResult<HandleRef>> + '_>>;

    read_methods! {
        Person: get_person, person_handles, iter_people, count_people, has_person;
        Family: get_family, family_handles, iter_families, count_families, has_family;
        Event: get_event, event_handles, iter_events, count_events, has_event;
        Place: get_place, place_handles, iter_places, count_places, has_place;
        Source: get_source, source_handles, iter_sources, count_sources, has_source;
        Citation: get_citation, citation_handles, iter_citations, count_citations, has_citation;
        Repository: get_repository, repository_handles, iter_repositories, count_repositories, has_repository;
        Media: get_media, media_handles, iter_media, count_media, has_media;
        Note: get_note, note_handles, iter_notes, count_notes, has_note;
        Tag: get_tag, tag_handles, iter_tags, count_tags, has_tag;
    }

    by_id_methods! {
        Person: get_person_by_id;
        Family: get_family_by_id;
        Event: get_event_by_id;
        Place: get_place_by_id;
        Source: get_source_by_id;
        Citation: get_citation_by_id;
        Repository: get_repository_by_id;
        Media: get_media_by_id;
        Note: get_note_by_id;
    }
}

/// Write access to a store.
///
/// Every write names the open [`Transaction`].
pub trait WritableStore: ReadableStore {
    /// Adds a record of any kind.
    ///
    /// # Errors
    ///
    /// `ReadOnly`, `InvalidOperation` for a stale transaction, storage errors.
    fn add_record(&mut self, record: &mut Record, txn: &Transaction, assign_id: bool) -> CoreResult<Handle>;

    /// Stores a changed record of any kind.
    ///
    /// # Errors
    ///
    /// `ReadOnly`, `InvalidOperation`, storage errors.
    fn commit_record(&mut self, record: &mut Record, txn: &Transaction, change: Option<i64>) -> CoreResult<()>;

    /// Removes a record of any kind.
    ///
    /// # Errors
    ///
    /// `HandleNotFound` if absent, `ReadOnly`, storage errors.
    fn remove_record(&mut self, kind: RecordKind, handle: &Handle, txn: &Transaction) -> CoreResult<()>;

    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// `TransactionConflict` if one is already open (it is aborted).
    fn begin_transaction(&mut self, description: &str, batch: bool) -> CoreResult<Transaction>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for a stale token, storage errors.
    fn commit_transaction(&mut self, txn: Transaction) -> CoreResult<()>;

    /// Aborts the open transaction.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for a stale token, storage errors.
    fn abort_transaction(&mut self, txn: Transaction) -> CoreResult<()>;

    write_methods! {
        Person: add_person, commit_person, remove_person;
        Family: add_family, commit_family, remove_family;
        Event: add_event, commit_event, remove_event;
        Place: add_place, commit_place, remove_place;
        Source: add_source, commit_source, remove_source;
        Citation: add_citation, commit_citation, remove_citation;
        Repository: add_repository, commit_repository, remove_repository;
        Media: add_media, commit_media, remove_media;
        Note: add_note, commit_note, remove_note;
        Tag: add_tag, commit_tag, remove_tag;
    }
}

impl ReadableStore for Store {
    fn get_record(&self, kind: RecordKind, handle: &Handle) -> CoreResult<Record> {
        self.get(kind, handle)
    }

    fn get_record_by_id(&self, kind: RecordKind, external_id: &str) -> CoreResult<Option<Record>> {
        self.get_by_id(kind, external_id)
    }

    fn record_handles(
        &self,
        kind: RecordKind,
        sorted: bool,
        locale: Option<&str>,
    ) -> CoreResult<Vec<Handle>> {
        self.handles(kind, sorted, locale)
    }

    fn iter_records(&self, kind: RecordKind) -> CoreResult<Records<'_, Record>> {
        Ok(Box::new(self.cursor(kind)?))
    }

    fn count_records(&self, kind: RecordKind) -> CoreResult<usize> {
        self.count(kind)
    }

    fn has_record(&self, kind: RecordKind, handle: &Handle) -> CoreResult<bool> {
        self.has(kind, handle)
    }

    fn find_backlinks(
        &self,
        handle: &Handle,
        kinds: Option<&[RecordKind]>,
    ) -> CoreResult<Box<dyn Iterator<Item = CoreResult<HandleRef>> + '_>> {
        Ok(Box::new(self.find_backlink_handles(handle, kinds)?))
    }
}

impl WritableStore for Store {
    fn add_record(&mut self, record: &mut Record, txn: &Transaction, assign_id: bool) -> CoreResult<Handle> {
        self.insert_record(record, txn, assign_id)
    }

    fn commit_record(&mut self, record: &mut Record, txn: &Transaction, change: Option<i64>) -> CoreResult<()> {
        self.store_record(record, txn, change)
    }

    fn remove_record(&mut self, kind: RecordKind, handle: &Handle, txn: &Transaction) -> CoreResult<()> {
        self.delete_record(kind, handle, txn)
    }

    fn begin_transaction(&mut self, description: &str, batch: bool) -> CoreResult<Transaction> {
        Store::begin_transaction(self, description, batch)
    }

    fn commit_transaction(&mut self, txn: Transaction) -> CoreResult<()> {
        Store::commit_transaction(self, txn)
    }

    fn abort_transaction(&mut self, txn: Transaction) -> CoreResult<()> {
        Store::abort_transaction(self, txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::Gender;

    fn roster(store: &dyn ReadableStore) -> CoreResult<Vec<String>> {
        store
            .iter_people()?
            .map(|p| p.map(|p| p.primary_name.first_name))
            .collect()
    }

    #[test]
    fn contracts_are_usable_as_trait_objects() {
        let mut store = Store::open_in_memory(Config::default()).unwrap();
        {
            let writer: &mut dyn WritableStore = &mut store;
            let txn = writer.begin_transaction("add", false).unwrap();
            let mut person = Person::new("Anna", "Alm", Gender::Female);
            let handle = writer.add_person(&mut person, &txn, true).unwrap();
            assert_eq!(person.handle, handle);
            assert_eq!(person.external_id, "I0001");
            assert!(person.change > 0);
            writer.commit_transaction(txn).unwrap();
        }
        assert_eq!(roster(&store).unwrap(), vec!["Anna".to_string()]);
        assert_eq!(store.count_people().unwrap(), 1);
        assert!(store.get_tag(&Handle::from("x")).is_err());
    }

    #[test]
    fn typed_access_rejects_the_wrong_kind() {
        let mut store = Store::open_in_memory(Config::default()).unwrap();
        let handle = store
            .with_transaction("add", false, |s, txn| s.add_note(&mut Note::new("n"), txn, true))
            .unwrap();
        assert!(store.has_note(&handle).unwrap());
        assert!(!store.has_person(&handle).unwrap());
        assert!(matches!(store.get_person(&handle), Err(CoreError::HandleNotFound { .. })));
    }
}
