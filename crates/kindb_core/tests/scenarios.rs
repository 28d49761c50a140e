//! End-to-end behaviour of the store over every engine.

use kindb_core::prelude::*;
use kindb_core::{Predicate, RecordKind, Signal};
use kindb_testkit::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

fn owners(store: &Store, handle: &Handle) -> Vec<(RecordKind, Handle)> {
    store
        .find_backlink_handles(handle, None)
        .unwrap()
        .collect::<CoreResult<Vec<_>>>()
        .unwrap()
}

#[test]
fn family_backlinks_appear_and_vanish() {
    with_each_engine(|store| {
        let p1 = store
            .with_transaction("Add P1", false, |s, txn| {
                let mut p1 = Person::new("Anna", "Garner", Gender::Female);
                let handle = s.add_person(&mut p1, txn, true)?;
                assert_eq!(p1.external_id, "I0001");
                Ok(handle)
            })
            .unwrap();
        let f1 = store
            .with_transaction("Add F1", false, |s, txn| {
                let mut family = Family {
                    father_handle: Some(p1.clone()),
                    ..Family::default()
                };
                s.add_family(&mut family, txn, true)
            })
            .unwrap();

        assert_eq!(owners(store, &p1), vec![(RecordKind::Family, f1.clone())], "{}", store.engine());

        store
            .with_transaction("Remove F1", false, |s, txn| s.remove_family(&f1, txn))
            .unwrap();
        assert!(owners(store, &p1).is_empty(), "{}", store.engine());
    });
}

#[test]
fn aborted_transaction_leaves_nothing_behind() {
    with_each_engine(|store| {
        populate_people(store, 2);
        let before = store.count_people().unwrap();
        let history = store.undo_history();

        let txn = store.begin_transaction("Add P2", false).unwrap();
        let mut p2 = Person::new("Nils", "Dahl", Gender::Male);
        let handle = store.add_person(&mut p2, &txn, true).unwrap();
        store.abort_transaction(txn).unwrap();

        assert_eq!(store.count_people().unwrap(), before, "{}", store.engine());
        assert!(store.get_person(&handle).unwrap_err().is_not_found());
        assert!(!store.surname_list().contains(&"Dahl".to_string()));
        assert_eq!(store.gender_stats().name_stats("Nils").male, 0);
        assert_eq!(store.undo_history(), history);
    });
}

#[test]
fn direct_writes_outlive_an_aborted_transaction() {
    with_each_engine(|store| {
        let txn = store.begin_transaction("Edit", false).unwrap();
        let mut person = Person::new("Anna", "Berg", Gender::Female);
        let handle = store.add_person(&mut person, &txn, true).unwrap();
        store.add_bookmark(RecordKind::Person, &Handle::from("bm1")).unwrap();
        store.set_name_group_mapping("Berg", "Bergh").unwrap();
        store.set_media_path("/photos").unwrap();
        store.set_default_person_handle(Some(&handle)).unwrap();
        store.set_default_person_handle(None).unwrap();
        store.abort_transaction(txn).unwrap();

        let engine = store.engine();
        assert!(!store.has_person(&handle).unwrap(), "{engine}");
        assert_eq!(store.bookmarks(RecordKind::Person).unwrap(), vec![Handle::from("bm1")], "{engine}");
        assert_eq!(store.name_group_mapping("Berg").unwrap().as_deref(), Some("Bergh"), "{engine}");
        assert_eq!(store.media_path().unwrap().as_deref(), Some("/photos"), "{engine}");
        assert_eq!(store.default_person_handle().unwrap(), None, "{engine}");
    });
}

#[test]
fn second_begin_conflicts_and_aborts_the_first() {
    with_each_engine(|store| {
        let first = store.begin_transaction("first", false).unwrap();
        let mut person = Person::new("Eva", "Lind", Gender::Female);
        let handle = store.add_person(&mut person, &first, true).unwrap();

        let err = store.begin_transaction("second", false).unwrap_err();
        assert!(matches!(err, CoreError::TransactionConflict { ref active } if active == "first"));
        assert!(!store.in_transaction());
        assert!(!store.has_person(&handle).unwrap(), "{}", store.engine());
        assert!(store.commit_transaction(first).is_err());

        let again = store.begin_transaction("third", false).unwrap();
        store.commit_transaction(again).unwrap();
    });
}

#[test]
fn undo_and_redo_are_mirror_images() {
    with_each_engine(|store| {
        household(store, "Berg");
        let before = StoreImage::capture(store);

        let h = household(store, "Öst");
        store
            .with_transaction("Edit", false, |s, txn| {
                let mut child = s.get_person(&h.child)?;
                child.primary_name.first_name = "Maja".into();
                s.commit_person(&mut child, txn, None)?;
                s.add_note(&mut Note::new("moved north"), txn, true)?;
                Ok(())
            })
            .unwrap();
        let after = StoreImage::capture(store);
        assert_ne!(before, after);

        assert!(store.undo().unwrap());
        assert!(store.undo().unwrap());
        assert_eq!(StoreImage::capture(store), before, "{}", store.engine());

        assert!(store.redo().unwrap());
        assert!(store.redo().unwrap());
        assert!(!store.redo().unwrap());
        assert_eq!(StoreImage::capture(store), after, "{}", store.engine());
        assert!(store.check_integrity(&mut |_| {}).unwrap().is_clean());
    });
}

#[test]
fn new_commit_discards_redo() {
    let mut store = TestStore::memory();
    household(&mut store, "Berg");
    assert!(store.undo().unwrap());
    assert!(store.redo_available());
    populate_people(&mut store, 1);
    assert!(!store.redo_available());
    assert_eq!(store.undo_history(), vec!["Add people".to_string()]);
}

#[test]
fn batch_commits_are_final_and_reattach_indices() {
    with_each_engine(|store| {
        household(store, "Berg");
        let handles = store
            .with_transaction("Import", true, |s, txn| {
                let mut zoller = Person::new("Kim", "Zoller", Gender::Unknown);
                let mut aberg = Person::new("Ola", "Åberg", Gender::Male);
                let z = s.add_person(&mut zoller, txn, true)?;
                let a = s.add_person(&mut aberg, txn, true)?;
                let mut family = Family {
                    father_handle: Some(a.clone()),
                    ..Family::default()
                };
                s.add_family(&mut family, txn, true)?;
                Ok((z, a))
            })
            .unwrap();

        assert!(!store.undo_available(), "{}", store.engine());
        assert!(store.undo().is_ok_and(|applied| !applied));
        assert_eq!(
            store.surname_list(),
            ["Åberg".to_string(), "Berg".to_string(), "Zoller".to_string()]
        );
        let sorted = store.person_handles(true, Some("sv_SE")).unwrap();
        assert_eq!(sorted.len(), 5);
        assert_eq!(sorted[3], handles.0);
        assert_eq!(sorted[4], handles.1);
        assert_eq!(owners(store, &handles.1).len(), 1);
        assert!(store.check_integrity(&mut |_| {}).unwrap().is_clean());
    });
}

#[test]
fn batch_abort_rolls_back_on_native_engines() {
    for engine in Engine::PERSISTENT {
        let mut store = TestStore::new(engine);
        populate_people(&mut store, 3);
        let before = StoreImage::capture(&store);
        let result: CoreResult<()> = store.with_transaction("Import", true, |s, txn| {
            s.add_person(&mut Person::new("Nils", "Dahl", Gender::Male), txn, true)?;
            Err(CoreError::invalid_operation("import failed"))
        });
        assert!(result.is_err());
        assert_eq!(StoreImage::capture(&store), before, "{engine}");
    }
}

#[test]
fn edges_match_records_after_mixed_edits() {
    with_each_engine(|store| {
        let h = household(store, "Berg");
        store
            .with_transaction("Edits", false, |s, txn| {
                let mut note = Note::new("baptised");
                let note = s.add_note(&mut note, txn, true)?;
                let mut event = Event {
                    note_list: vec![note.clone()],
                    ..Event::default()
                };
                s.add_event(&mut event, txn, true)?;
                s.remove_child_from_family(&h.child, &h.family, txn)?;
                s.delete_person_from_database(&h.mother, txn)
            })
            .unwrap();
        let report = store.check_integrity(&mut |_| {}).unwrap();
        assert!(report.is_clean(), "{}: {report:?}", store.engine());
        assert!(owners(store, &h.child).is_empty());
        assert_eq!(owners(store, &h.father), vec![(RecordKind::Family, h.family.clone())]);
    });
}

#[test]
fn external_ids_follow_the_pattern() {
    let mut store = TestStore::kv();
    store.set_id_pattern(RecordKind::Family, "FAM%03d").unwrap();
    let (family, person) = store
        .with_transaction("Add", false, |s, txn| {
            let mut family = Family::default();
            s.add_family(&mut family, txn, true)?;
            let mut person = Person::new("Anna", "Berg", Gender::Female);
            person.external_id = "I12".into();
            s.add_person(&mut person, txn, true)?;
            Ok((family.external_id, person.external_id))
        })
        .unwrap();
    assert_eq!(family, "FAM001");
    assert_eq!(person, "I0012");
    assert!(store.get_person_by_id("I0012").unwrap().is_some());
    assert!(store.get_person_by_id("I0013").unwrap().is_none());
}

#[test]
fn query_operators_filter_and_order() {
    let mut store = TestStore::memory();
    store
        .with_transaction("People", false, |s, txn| {
            for (given, surname, gender) in [
                ("Anna", "Berg", Gender::Female),
                ("Alex", "Dahl", Gender::Unknown),
                ("Karl", "Berg", Gender::Male),
                ("Åsa", "Lind", Gender::Female),
            ] {
                s.add_person(&mut Person::new(given, surname, gender), txn, true)?;
            }
            Ok(())
        })
        .unwrap();

    let mut women = store.query(RecordKind::Person);
    women
        .where_(Predicate::eq("gender", "Female"))
        .unwrap()
        .order("primary_name.first_name", true)
        .unwrap();
    let names = women
        .map(|r| r.into_type::<Person>().map(|p| p.primary_name.first_name))
        .unwrap();
    assert_eq!(names, vec![Some("Åsa".to_string()), Some("Anna".to_string())]);
    assert!(women.order("external_id", false).is_err());

    let mut a_names = store.query(RecordKind::Person);
    a_names
        .where_(Predicate::like("primary_name.first_name", "A%"))
        .unwrap()
        .where_(Predicate::eq("gender", "Female").negate())
        .unwrap();
    assert_eq!(a_names.count().unwrap(), 1);

    let mut by_id = store.query(RecordKind::Person);
    by_id
        .where_(Predicate::is_in("external_id", ["I0001", "I0003"]))
        .unwrap()
        .order("external_id", false)
        .unwrap()
        .limit(1, 5)
        .unwrap();
    let rows = by_id.select(&["external_id"]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].as_text(), Some("I0003"));

    let mut range = store.query(RecordKind::Person);
    range
        .where_(Predicate::between("external_id", "I0002", "I0003"))
        .unwrap();
    assert_eq!(range.count().unwrap(), 2);
}

#[test]
fn read_only_store_refuses_writes() {
    for engine in Engine::PERSISTENT {
        let mut store = TestStore::new(engine);
        let h = household(&mut store, "Berg");
        store.reopen(Config::default().read_only(true));

        assert!(store.is_read_only());
        assert_eq!(store.count_people().unwrap(), 3, "{engine}");
        assert_eq!(owners(&store, &h.father), vec![(RecordKind::Family, h.family.clone())]);
        assert!(matches!(store.begin_transaction("write", false), Err(CoreError::ReadOnly)));
        assert!(matches!(store.set_media_path("/media"), Err(CoreError::ReadOnly)));
        assert!(matches!(store.rebuild_gender_stats(), Err(CoreError::ReadOnly)));
    }
}

#[test]
fn persistent_store_keeps_derived_state() {
    for engine in Engine::PERSISTENT {
        let mut store = TestStore::new(engine);
        household(&mut store, "Berg");
        let before = StoreImage::capture(&store);
        store.reopen(Config::default());
        assert_eq!(StoreImage::capture(&store), before, "{engine}");
        assert!(!store.undo_available());
    }
}

#[test]
fn commit_notifications_reach_listeners() {
    let mut store = TestStore::sqlite();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = store.signals().connect(move |signal: &Signal| sink.lock().push(signal.name()));

    household(&mut store, "Berg");
    store.undo().unwrap();

    let seen = seen.lock();
    assert_eq!(seen.first().map(String::as_str), Some("person-add"));
    assert!(seen.contains(&"family-add".to_string()));
    assert!(seen.contains(&"transaction-committed".to_string()));
    assert!(seen.contains(&"family-delete".to_string()));
    assert_eq!(seen.last().map(String::as_str), Some("undo-applied"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn gender_stats_match_a_full_recount(ops in person_ops_strategy(16)) {
        let mut store = TestStore::memory();
        let alive = apply_ops(&mut store, &ops);

        let mut expected = kindb_core::GenderStats::new();
        for handle in &alive {
            expected.count_person(&store.get_person(handle).unwrap());
        }
        prop_assert_eq!(store.gender_stats(), &expected);

        store.rebuild_gender_stats().unwrap();
        prop_assert_eq!(store.gender_stats(), &expected);
    }

    #[test]
    fn undoing_everything_empties_the_store(ops in person_ops_strategy(12)) {
        let mut store = TestStore::memory();
        let empty = StoreImage::capture(&store);
        apply_ops(&mut store, &ops);
        let end = StoreImage::capture(&store);

        while store.undo().unwrap() {}
        prop_assert_eq!(&StoreImage::capture(&store), &empty);

        while store.redo().unwrap() {}
        prop_assert_eq!(&StoreImage::capture(&store), &end);
    }
}
