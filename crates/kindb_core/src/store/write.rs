//! Add, commit and remove.

use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

use super::Store;
use crate::dispatch::descriptor;
use crate::error::{CoreError, CoreResult};
use crate::ids::default_prefix;
use crate::index::reference::{delete_edge, edges_of, put_edge, ReferenceEdge};
use crate::index::secondary::{clear_fields, write_fields, FieldSet};
use crate::model::{Handle, Person, Record, RecordKind};
use crate::transaction::{LogEntry, Transaction};

const EXTERNAL_ID: &str = "external_id";

impl Store {
    /// Adds a record, assigning its handle if it has none.
    ///
    /// With `assign_id`, an empty external ID is filled from the kind's
    /// counter. A given ID is normalized to the kind's pattern; if another
    /// record already uses it, a fresh one is allocated instead.
    pub(crate) fn insert_record(
        &mut self,
        record: &mut Record,
        txn: &Transaction,
        assign_id: bool,
    ) -> CoreResult<Handle> {
        self.ensure_writable()?;
        self.check_txn(txn)?;
        let kind = record.kind();
        if record.handle().is_empty() {
            record.set_handle(Handle::new());
        }
        if default_prefix(kind).is_some() {
            if record.external_id().is_empty() {
                if assign_id {
                    let id = self.find_next_external_id(kind)?;
                    record.set_external_id(id);
                }
            } else {
                let id = self.normalize_external_id(kind, record.external_id());
                let taken = self
                    .backend
                    .lookup_indexed(kind.table(), EXTERNAL_ID, &id)?
                    .into_iter()
                    .any(|owner| owner != record.handle().as_str());
                if taken {
                    let fresh = self.find_next_external_id(kind)?;
                    debug!(%kind, requested = %id, assigned = %fresh, "external ID in use; allocated a fresh one");
                    record.set_external_id(fresh);
                } else {
                    record.set_external_id(id);
                }
            }
        }
        self.store_record(record, txn, None)?;
        Ok(record.handle().clone())
    }

    /// Stores a record and brings every derived structure up to date.
    ///
    /// `change` defaults to now.
    pub(crate) fn store_record(
        &mut self,
        record: &mut Record,
        txn: &Transaction,
        change: Option<i64>,
    ) -> CoreResult<()> {
        self.ensure_writable()?;
        let batch = self.check_txn(txn)?;
        if record.handle().is_empty() {
            return Err(CoreError::invalid_operation(format!(
                "cannot commit a {} without a handle; add it first",
                record.kind()
            )));
        }
        record.set_change(change.unwrap_or_else(|| Utc::now().timestamp()));

        let kind = record.kind();
        let desc = descriptor(kind);
        let handle = record.handle().clone();
        let key = handle.as_str();

        let old = self.backend.get(desc.table, key)?;
        let new = record.encode(self.serializer)?;
        self.backend.put(desc.table, key, &new)?;
        let fields = if batch { FieldSet::Lookup } else { FieldSet::All };
        write_fields(&mut *self.backend, desc, key, record, fields)?;

        if kind == RecordKind::Person {
            let previous: Option<Person> = old
                .as_deref()
                .map(|bytes| self.serializer.decode(bytes))
                .transpose()?;
            self.adjust_person(previous.as_ref(), record.as_type::<Person>(), !batch)?;
        }
        self.vocab.extend(record.custom_types());
        self.update_reference_map(record, !batch)?;

        self.log(LogEntry::Record {
            kind,
            handle,
            old,
            new: Some(new),
        });
        Ok(())
    }

    /// Replaces the stored edges of `record` with its current references.
    ///
    /// Every old edge is deleted and every current one reinserted; only
    /// the difference is logged. Backlink fields are written when `index`
    /// is set and otherwise left for the post-batch rebuild.
    fn update_reference_map(&mut self, record: &Record, index: bool) -> CoreResult<()> {
        let owner = record.handle();
        let stored = edges_of(&*self.backend, self.serializer, owner)?;
        let mut previous: HashMap<String, Vec<u8>> = HashMap::with_capacity(stored.len());
        for (key, bytes, _) in stored {
            delete_edge(&mut *self.backend, &key)?;
            previous.insert(key, bytes);
        }

        let mut changes = Vec::new();
        for (target_kind, target) in record.referenced_handles() {
            let edge = ReferenceEdge {
                owner_kind: record.kind(),
                owner: owner.clone(),
                target_kind,
                target,
            };
            let key = edge.key();
            let bytes = self.serializer.encode(&edge)?;
            put_edge(&mut *self.backend, &key, &bytes, edge.target.as_str(), index)?;
            let old = previous.remove(&key);
            if old.as_deref() != Some(&bytes[..]) {
                changes.push(LogEntry::Reference {
                    key,
                    target: edge.target.to_string(),
                    old,
                    new: Some(bytes),
                });
            }
        }
        for (key, bytes) in previous {
            let edge: ReferenceEdge = self.serializer.decode(&bytes)?;
            changes.push(LogEntry::Reference {
                key,
                target: edge.target.to_string(),
                old: Some(bytes),
                new: None,
            });
        }
        for entry in changes {
            self.log(entry);
        }
        Ok(())
    }

    /// Removes a record and the edges it owns.
    ///
    /// Edges pointing at the record are left alone; clearing those is the
    /// caller's job.
    pub(crate) fn delete_record(
        &mut self,
        kind: RecordKind,
        handle: &Handle,
        txn: &Transaction,
    ) -> CoreResult<()> {
        self.ensure_writable()?;
        let batch = self.check_txn(txn)?;
        let desc = descriptor(kind);
        let key = handle.as_str();
        let Some(old) = self.backend.get(desc.table, key)? else {
            return Err(CoreError::handle_not_found(kind, handle));
        };

        for (edge_key, bytes, edge) in edges_of(&*self.backend, self.serializer, handle)? {
            delete_edge(&mut *self.backend, &edge_key)?;
            self.log(LogEntry::Reference {
                key: edge_key,
                target: edge.target.to_string(),
                old: Some(bytes),
                new: None,
            });
        }
        clear_fields(&mut *self.backend, desc, key, FieldSet::All)?;
        self.backend.delete(desc.table, key)?;

        if kind == RecordKind::Person {
            let previous: Person = self.serializer.decode(&old)?;
            self.adjust_person(Some(&previous), None, !batch)?;
        }
        self.log(LogEntry::Record {
            kind,
            handle: handle.clone(),
            old: Some(old),
            new: None,
        });
        Ok(())
    }

    /// Allocates the next unused external ID of a kind.
    ///
    /// Scans forward from the kind's counter past every ID already in
    /// use. Always empty for tags.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` or a storage error.
    pub fn find_next_external_id(&mut self, kind: RecordKind) -> CoreResult<String> {
        self.ensure_open()?;
        if default_prefix(kind).is_none() {
            return Ok(String::new());
        }
        let index = kind.index();
        loop {
            let candidate = self.patterns[index].format(self.counters[index]);
            self.counters[index] += 1;
            if self
                .backend
                .lookup_indexed(kind.table(), EXTERNAL_ID, &candidate)?
                .is_empty()
            {
                return Ok(candidate);
            }
        }
    }

    /// Reformats an ID carrying the kind's prefix into its pattern, e.g.
    /// `I12` becomes `I0012`. Other IDs are returned unchanged.
    #[must_use]
    pub fn normalize_external_id(&self, kind: RecordKind, id: &str) -> String {
        if default_prefix(kind).is_none() {
            return id.to_string();
        }
        self.patterns[kind.index()].normalize(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::contract::{ReadableStore, WritableStore};
    use crate::model::{Event, Family, Gender, Note, Tag};

    fn memory() -> Store {
        Store::open_in_memory(Config::default()).unwrap()
    }

    #[test]
    fn ids_skip_values_already_taken() {
        let mut store = memory();
        store
            .with_transaction("import", false, |s, txn| {
                let mut odd = Person::new("Nils", "Dahl", Gender::Male);
                odd.external_id = "I0002".into();
                s.add_person(&mut odd, txn, true)?;
                let mut first = Person::new("Anna", "Dahl", Gender::Female);
                s.add_person(&mut first, txn, true)?;
                assert_eq!(first.external_id, "I0001");
                let mut next = Person::new("Eva", "Dahl", Gender::Female);
                s.add_person(&mut next, txn, true)?;
                assert_eq!(next.external_id, "I0003");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn colliding_import_id_gets_a_fresh_one() {
        let mut store = memory();
        store
            .with_transaction("import", false, |s, txn| {
                let mut a = Person::new("Anna", "Dahl", Gender::Female);
                a.external_id = "I7".into();
                s.add_person(&mut a, txn, true)?;
                assert_eq!(a.external_id, "I0007");
                let mut b = Person::new("Nils", "Dahl", Gender::Male);
                b.external_id = "I0007".into();
                s.add_person(&mut b, txn, true)?;
                assert_eq!(b.external_id, "I0001");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn assign_id_false_leaves_id_empty() {
        let mut store = memory();
        let handle = store
            .with_transaction("add", false, |s, txn| s.add_event(&mut Event::default(), txn, false))
            .unwrap();
        assert_eq!(store.get_event(&handle).unwrap().external_id, "");
        assert_eq!(store.find_next_external_id(RecordKind::Tag).unwrap(), "");
    }

    #[test]
    fn commit_without_handle_is_refused() {
        let mut store = memory();
        let result = store.with_transaction("commit", false, |s, txn| {
            s.commit_note(&mut Note::new("orphan"), txn, None)
        });
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn commit_sets_change_time() {
        let mut store = memory();
        let handle = store
            .with_transaction("add", false, |s, txn| {
                let mut tag = Tag::new("ToDo");
                let h = s.add_tag(&mut tag, txn, true)?;
                s.commit_tag(&mut tag, txn, Some(1_234))?;
                Ok(h)
            })
            .unwrap();
        assert_eq!(store.get_tag(&handle).unwrap().change, 1_234);
    }

    #[test]
    fn removing_an_absent_handle_is_an_error() {
        let mut store = memory();
        let result = store.with_transaction("remove", false, |s, txn| {
            s.remove_family(&Handle::from("missing"), txn)
        });
        assert!(matches!(result, Err(CoreError::HandleNotFound { .. })));
    }

    #[test]
    fn edges_follow_record_changes() {
        let mut store = memory();
        let (p1, p2, family) = store
            .with_transaction("setup", false, |s, txn| {
                let p1 = s.add_person(&mut Person::new("A", "X", Gender::Male), txn, true)?;
                let p2 = s.add_person(&mut Person::new("B", "X", Gender::Male), txn, true)?;
                let mut family = Family {
                    father_handle: Some(p1.clone()),
                    ..Family::default()
                };
                s.add_family(&mut family, txn, true)?;
                Ok((p1, p2, family))
            })
            .unwrap();

        store
            .with_transaction("swap father", false, |s, txn| {
                let mut family = family.clone();
                family.father_handle = Some(p2.clone());
                s.commit_family(&mut family, txn, None)
            })
            .unwrap();

        let owners = |store: &Store, h: &Handle| -> Vec<Handle> {
            store
                .find_backlink_handles(h, None)
                .unwrap()
                .map(|r| r.unwrap().1)
                .collect()
        };
        assert!(owners(&store, &p1).is_empty());
        assert_eq!(owners(&store, &p2), vec![family.handle.clone()]);
    }
}
