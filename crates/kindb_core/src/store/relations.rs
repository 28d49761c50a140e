//! Family relationship helpers.
//!
//! These keep both sides of a parent or child link in step: the family's
//! parent and child fields, and the person's family lists. A family left
//! with no father, no mother and no children is removed.

use tracing::debug;

use super::Store;
use crate::contract::{ReadableStore, WritableStore};
use crate::error::{CoreError, CoreResult};
use crate::model::{ChildRef, Family, Handle, Person, PrimaryRecord, RecordKind};
use crate::transaction::Transaction;

impl Store {
    /// Links `child` into `family` as a birth child and commits both.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if either record has no handle yet, or any
    /// commit error.
    pub fn add_child_to_family(
        &mut self,
        family: &mut Family,
        child: &mut Person,
        txn: &Transaction,
    ) -> CoreResult<()> {
        if family.handle.is_empty() || child.handle.is_empty() {
            return Err(CoreError::invalid_operation(
                "family and child must be added before they are linked",
            ));
        }
        if !family.child_ref_list.iter().any(|c| c.handle == child.handle) {
            family.child_ref_list.push(ChildRef::birth(child.handle.clone()));
        }
        if !child.parent_family_list.contains(&family.handle) {
            child.parent_family_list.push(family.handle.clone());
        }
        self.commit_family(family, txn, None)?;
        self.commit_person(child, txn, None)
    }

    /// Unlinks a child from a family.
    ///
    /// # Errors
    ///
    /// `ReferentialInconsistency` if the person is not a child of the
    /// family on both sides; `HandleNotFound` if either is missing.
    pub fn remove_child_from_family(
        &mut self,
        person: &Handle,
        family: &Handle,
        txn: &Transaction,
    ) -> CoreResult<()> {
        let mut child = self.get_person(person)?;
        let mut fam = self.get_family(family)?;
        let listed = child.parent_family_list.contains(family);
        let has_child = fam.child_ref_list.iter().any(|c| &c.handle == person);
        if !listed || !has_child {
            return Err(CoreError::referential_inconsistency(format!(
                "person {person} is not a child of family {family}"
            )));
        }
        child.parent_family_list.retain(|h| h != family);
        fam.child_ref_list.retain(|c| &c.handle != person);
        self.commit_person(&mut child, txn, None)?;
        self.settle_family(fam, txn)
    }

    /// Removes a person as father or mother of a family.
    ///
    /// # Errors
    ///
    /// `ReferentialInconsistency` if the person is neither parent;
    /// `HandleNotFound` if either is missing.
    pub fn remove_parent_from_family(
        &mut self,
        person: &Handle,
        family: &Handle,
        txn: &Transaction,
    ) -> CoreResult<()> {
        let mut parent = self.get_person(person)?;
        let mut fam = self.get_family(family)?;
        if fam.father_handle.as_ref() == Some(person) {
            fam.father_handle = None;
        } else if fam.mother_handle.as_ref() == Some(person) {
            fam.mother_handle = None;
        } else {
            return Err(CoreError::referential_inconsistency(format!(
                "person {person} is neither father nor mother of family {family}"
            )));
        }
        parent.family_list.retain(|h| h != family);
        self.commit_person(&mut parent, txn, None)?;
        self.settle_family(fam, txn)
    }

    /// Commits a family, or removes it if nobody is left in it.
    fn settle_family(&mut self, mut family: Family, txn: &Transaction) -> CoreResult<()> {
        if family.is_empty() {
            debug!(family = %family.handle, "removing empty family");
            self.remove_family_relationships(&family.handle, txn)
        } else {
            self.commit_family(&mut family, txn, None)
        }
    }

    /// Drops every reference to a family and then the family itself.
    ///
    /// # Errors
    ///
    /// `HandleNotFound` if the family is missing, or any commit error.
    pub fn remove_family_relationships(&mut self, family: &Handle, txn: &Transaction) -> CoreResult<()> {
        if !self.has_family(family)? {
            return Err(CoreError::handle_not_found(RecordKind::Family, family));
        }
        self.detach_references(RecordKind::Family, family, txn)?;
        self.remove_family(family, txn)
    }

    /// Deletes a person after unlinking them from every family and every
    /// other record that references them.
    ///
    /// Families left empty are removed. The home person setting is
    /// cleared if it named this person.
    ///
    /// # Errors
    ///
    /// `HandleNotFound` if the person is missing, or any commit error.
    pub fn delete_person_from_database(&mut self, person: &Handle, txn: &Transaction) -> CoreResult<()> {
        let record = self.get_person(person)?;
        let mut families: Vec<Handle> = record.family_list.clone();
        for handle in &record.parent_family_list {
            if !families.contains(handle) {
                families.push(handle.clone());
            }
        }
        for handle in families {
            if !self.has_family(&handle)? {
                continue;
            }
            let mut family = self.get_family(&handle)?;
            family.remove_handle_references(RecordKind::Person, std::slice::from_ref(person));
            self.settle_family(family, txn)?;
        }
        self.detach_references(RecordKind::Person, person, txn)?;
        if self.default_person_handle()?.as_ref() == Some(person) {
            self.set_default_person_handle(None)?;
        }
        self.remove_person(person, txn)
    }

    /// Removes references to `handle` from every record pointing at it.
    fn detach_references(&mut self, kind: RecordKind, handle: &Handle, txn: &Transaction) -> CoreResult<()> {
        let owners = self
            .find_backlink_handles(handle, None)?
            .collect::<CoreResult<Vec<_>>>()?;
        for (owner_kind, owner) in owners {
            if &owner == handle {
                continue;
            }
            let mut record = self.get(owner_kind, &owner)?;
            record.remove_handle_references(kind, std::slice::from_ref(handle));
            self.store_record(&mut record, txn, None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{Gender, PersonRef};

    struct Household {
        store: Store,
        father: Handle,
        child: Handle,
        family: Handle,
    }

    fn household() -> Household {
        let mut store = Store::open_in_memory(Config::default()).unwrap();
        let (father, child, family) = store
            .with_transaction("household", false, |s, txn| {
                let mut father = Person::new("Karl", "Berg", Gender::Male);
                let mut child = Person::new("Liv", "Berg", Gender::Female);
                s.add_person(&mut father, txn, true)?;
                s.add_person(&mut child, txn, true)?;
                let mut family = Family {
                    father_handle: Some(father.handle.clone()),
                    ..Family::default()
                };
                s.add_family(&mut family, txn, true)?;
                father.family_list.push(family.handle.clone());
                s.commit_person(&mut father, txn, None)?;
                s.add_child_to_family(&mut family, &mut child, txn)?;
                Ok((father.handle, child.handle, family.handle))
            })
            .unwrap();
        Household {
            store,
            father,
            child,
            family,
        }
    }

    #[test]
    fn child_links_are_symmetric() {
        let h = household();
        let family = h.store.get_family(&h.family).unwrap();
        assert_eq!(family.child_ref_list.len(), 1);
        let child = h.store.get_person(&h.child).unwrap();
        assert_eq!(child.parent_family_list, vec![h.family.clone()]);
    }

    #[test]
    fn removing_a_missing_child_link_is_inconsistent() {
        let mut h = household();
        let result = h.store.with_transaction("bad", false, |s, txn| {
            s.remove_child_from_family(&h.father, &h.family, txn)
        });
        assert!(matches!(result, Err(CoreError::ReferentialInconsistency { .. })));
    }

    #[test]
    fn removing_a_non_parent_is_inconsistent() {
        let mut h = household();
        let result = h.store.with_transaction("bad", false, |s, txn| {
            s.remove_parent_from_family(&h.child, &h.family, txn)
        });
        assert!(matches!(result, Err(CoreError::ReferentialInconsistency { .. })));
        assert!(h.store.get_family(&h.family).unwrap().father_handle.is_some());
    }

    #[test]
    fn emptied_family_is_removed() {
        let mut h = household();
        h.store
            .with_transaction("split", false, |s, txn| {
                s.remove_child_from_family(&h.child, &h.family, txn)?;
                s.remove_parent_from_family(&h.father, &h.family, txn)
            })
            .unwrap();
        assert!(!h.store.has_family(&h.family).unwrap());
        assert!(h.store.get_person(&h.father).unwrap().family_list.is_empty());
        assert!(h.store.get_person(&h.child).unwrap().parent_family_list.is_empty());
    }

    #[test]
    fn deleting_a_person_cleans_every_reference() {
        let mut h = household();
        let friend = h
            .store
            .with_transaction("friend", false, |s, txn| {
                let mut friend = Person::new("Ola", "Dahl", Gender::Male);
                friend.person_ref_list.push(PersonRef {
                    handle: h.father.clone(),
                    ..PersonRef::default()
                });
                s.add_person(&mut friend, txn, true)
            })
            .unwrap();
        h.store.set_default_person_handle(Some(&h.father)).unwrap();

        h.store
            .with_transaction("delete", false, |s, txn| s.delete_person_from_database(&h.father, txn))
            .unwrap();

        assert!(!h.store.has_person(&h.father).unwrap());
        let family = h.store.get_family(&h.family).unwrap();
        assert!(family.father_handle.is_none());
        assert_eq!(family.child_ref_list.len(), 1);
        assert!(h.store.get_person(&friend).unwrap().person_ref_list.is_empty());
        assert!(h.store.default_person_handle().unwrap().is_none());
        assert_eq!(h.store.find_backlink_handles(&h.father, None).unwrap().count(), 0);
        assert!(h.store.get_family(&h.family).unwrap().handle() == &h.family);
    }
}
