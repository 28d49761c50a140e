//! Cross-crate integration test helpers.
//!
//! [`StoreImage`] captures everything observable about a store so two
//! points in time can be compared, e.g. before a transaction and after
//! undoing it. [`apply_ops`] drives a store through generated edits.

use kindb_core::{
    GenderStats, Handle, ReadableStore, RecordKind, Serializer, Store, WritableStore,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::generators::PersonOp;

/// Observable state of a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreImage {
    /// Every record as JSON, keyed by kind and handle. The change time
    /// is left out.
    pub records: BTreeMap<(RecordKind, String), serde_json::Value>,
    /// Every (target, owner kind, owner) backlink.
    pub backlinks: BTreeSet<(String, RecordKind, String)>,
    /// The surname list.
    pub surnames: Vec<String>,
    /// Gender statistics.
    pub stats: GenderStats,
}

impl StoreImage {
    /// Captures the current state of `store`.
    pub fn capture(store: &Store) -> Self {
        let mut records = BTreeMap::new();
        let mut backlinks = BTreeSet::new();
        for kind in RecordKind::ALL {
            for record in store.iter(kind).expect("Failed to open cursor") {
                let record = record.expect("Failed to read record");
                let bytes = record.encode(Serializer::Json).expect("Failed to encode record");
                let mut json: serde_json::Value =
                    serde_json::from_slice(&bytes).expect("Record is not valid JSON");
                if let Some(map) = json.as_object_mut() {
                    map.remove("change");
                }
                let handle = record.handle().clone();
                for owner in store
                    .find_backlink_handles(&handle, None)
                    .expect("Failed to query backlinks")
                {
                    let (owner_kind, owner) = owner.expect("Failed to read backlink");
                    backlinks.insert((handle.to_string(), owner_kind, owner.to_string()));
                }
                records.insert((kind, handle.to_string()), json);
            }
        }
        Self {
            records,
            backlinks,
            surnames: store.surname_list().to_vec(),
            stats: store.gender_stats().clone(),
        }
    }

    /// Number of records of `kind`.
    pub fn count(&self, kind: RecordKind) -> usize {
        self.records.keys().filter(|(k, _)| *k == kind).count()
    }
}

/// Applies each edit in its own interactive transaction.
///
/// Returns the handles of the persons alive at the end, in insertion
/// order.
pub fn apply_ops(store: &mut Store, ops: &[PersonOp]) -> Vec<Handle> {
    let mut alive: Vec<Handle> = Vec::new();
    for op in ops {
        match op {
            PersonOp::Add(person) => {
                let mut person = person.clone();
                let handle = store
                    .with_transaction("Add person", false, |s, txn| s.add_person(&mut person, txn, true))
                    .expect("Failed to add person");
                alive.push(handle);
            }
            PersonOp::Rename { index, given_name } => {
                let Some(handle) = pick(&alive, *index) else {
                    continue;
                };
                store
                    .with_transaction("Rename person", false, |s, txn| {
                        let mut person = s.get_person(&handle)?;
                        person.primary_name.first_name = given_name.clone();
                        s.commit_person(&mut person, txn, None)
                    })
                    .expect("Failed to rename person");
            }
            PersonOp::Regender { index, gender } => {
                let Some(handle) = pick(&alive, *index) else {
                    continue;
                };
                store
                    .with_transaction("Change gender", false, |s, txn| {
                        let mut person = s.get_person(&handle)?;
                        person.gender = *gender;
                        s.commit_person(&mut person, txn, None)
                    })
                    .expect("Failed to change gender");
            }
            PersonOp::Remove { index } => {
                let Some(handle) = pick(&alive, *index) else {
                    continue;
                };
                store
                    .with_transaction("Remove person", false, |s, txn| s.remove_person(&handle, txn))
                    .expect("Failed to remove person");
                alive.retain(|h| h != &handle);
            }
        }
    }
    alive
}

fn pick(alive: &[Handle], index: usize) -> Option<Handle> {
    if alive.is_empty() {
        None
    } else {
        Some(alive[index % alive.len()].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{household, TestStore};
    use kindb_core::{Gender, Person};

    #[test]
    fn image_sees_records_and_backlinks() {
        let mut store = TestStore::memory();
        let h = household(&mut store, "Berg");
        let image = StoreImage::capture(&store);
        assert_eq!(image.count(RecordKind::Person), 3);
        assert_eq!(image.count(RecordKind::Family), 1);
        assert!(image
            .backlinks
            .contains(&(h.father.to_string(), RecordKind::Family, h.family.to_string())));
        assert_eq!(image.surnames, vec!["Berg".to_string()]);
    }

    #[test]
    fn ops_track_alive_persons() {
        let mut store = TestStore::memory();
        let ops = vec![
            PersonOp::Add(Person::new("Anna", "Berg", Gender::Female)),
            PersonOp::Add(Person::new("Karl", "Berg", Gender::Male)),
            PersonOp::Remove { index: 0 },
            PersonOp::Rename {
                index: 5,
                given_name: "Kalle".into(),
            },
        ];
        let alive = apply_ops(&mut store, &ops);
        assert_eq!(alive.len(), 1);
        assert_eq!(store.get_person(&alive[0]).unwrap().primary_name.first_name, "Kalle");
    }
}
