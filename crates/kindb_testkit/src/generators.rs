//! Property-based test generators using proptest.
//!
//! Provides strategies for persons and for sequences of person edits.

use kindb_core::{Gender, Person};
use proptest::prelude::*;

const GIVEN_NAMES: &[&str] = &[
    "Anna", "Karl", "Liv", "Nils", "Eva", "Ola", "Maria", "Johan", "Kim", "Alex", "Märta", "Åke",
    "Björn", "Ingrid",
];

const SURNAMES: &[&str] = &[
    "Berg", "Dahl", "Garner", "Zoller", "Åberg", "Öst", "Lind", "van Dyke",
];

/// Strategy for given names, including a blank one and some with a
/// second word or a `?`.
pub fn given_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => prop::sample::select(GIVEN_NAMES).prop_map(String::from),
        1 => (prop::sample::select(GIVEN_NAMES), prop::sample::select(GIVEN_NAMES))
            .prop_map(|(a, b)| format!("{a} {b}")),
        1 => prop::sample::select(GIVEN_NAMES).prop_map(|n| format!("{n}?")),
        1 => Just(String::new()),
    ]
}

/// Strategy for surnames, including non-ASCII ones.
pub fn surname_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(SURNAMES).prop_map(String::from)
}

/// Strategy for genders.
pub fn gender_strategy() -> impl Strategy<Value = Gender> {
    prop_oneof![Just(Gender::Female), Just(Gender::Male), Just(Gender::Unknown)]
}

/// Strategy for new, unsaved persons.
pub fn person_strategy() -> impl Strategy<Value = Person> {
    (given_name_strategy(), surname_strategy(), gender_strategy())
        .prop_map(|(given, surname, gender)| Person::new(given, surname, gender))
}

/// One edit applied to the persons of a store.
///
/// Indices pick among the persons alive at that point, modulo their
/// number; edits on an empty store are skipped.
#[derive(Debug, Clone)]
pub enum PersonOp {
    /// Add a new person.
    Add(Person),
    /// Change the given name of a person.
    Rename {
        /// Which person.
        index: usize,
        /// The new given name.
        given_name: String,
    },
    /// Change the gender of a person.
    Regender {
        /// Which person.
        index: usize,
        /// The new gender.
        gender: Gender,
    },
    /// Remove a person.
    Remove {
        /// Which person.
        index: usize,
    },
}

/// Strategy for a single edit.
pub fn person_op_strategy() -> impl Strategy<Value = PersonOp> {
    prop_oneof![
        4 => person_strategy().prop_map(PersonOp::Add),
        2 => (any::<usize>(), given_name_strategy())
            .prop_map(|(index, given_name)| PersonOp::Rename { index, given_name }),
        1 => (any::<usize>(), gender_strategy())
            .prop_map(|(index, gender)| PersonOp::Regender { index, gender }),
        2 => any::<usize>().prop_map(|index| PersonOp::Remove { index }),
    ]
}

/// Strategy for a sequence of edits.
pub fn person_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<PersonOp>> {
    prop::collection::vec(person_op_strategy(), 1..=max_len)
}
