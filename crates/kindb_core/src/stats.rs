//! Given-name vs. gender statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{Gender, Person};

/// Counts of one given name by gender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCounts {
    /// Persons recorded as male.
    pub male: u32,
    /// Persons recorded as female.
    pub female: u32,
    /// Persons with unknown gender.
    pub unknown: u32,
}

impl NameCounts {
    /// Sum of all three counters.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.male + self.female + self.unknown
    }
}

/// Given-name statistics, maintained on every person write.
///
/// The key is the first space-separated word of the given name with any
/// `?` removed. Persons whose key is empty are not counted. The table is
/// derived data and can always be rebuilt from a scan of all persons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderStats {
    stats: BTreeMap<String, NameCounts>,
}

impl GenderStats {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics key for a given name.
    #[must_use]
    pub fn key_of(first_name: &str) -> String {
        first_name
            .split(' ')
            .next()
            .unwrap_or("")
            .replace('?', "")
    }

    /// Counts for a given name; zero if unseen.
    #[must_use]
    pub fn name_stats(&self, first_name: &str) -> NameCounts {
        self.stats
            .get(&Self::key_of(first_name))
            .copied()
            .unwrap_or_default()
    }

    /// Adds a person to the table.
    pub fn count_person(&mut self, person: &Person) {
        self.adjust(person, true);
    }

    /// Removes a person from the table.
    pub fn uncount_person(&mut self, person: &Person) {
        self.adjust(person, false);
    }

    fn adjust(&mut self, person: &Person, add: bool) {
        let key = Self::key_of(&person.primary_name.first_name);
        if key.is_empty() {
            return;
        }
        let counts = self.stats.entry(key.clone()).or_default();
        let slot = match person.gender {
            Gender::Male => &mut counts.male,
            Gender::Female => &mut counts.female,
            Gender::Unknown => &mut counts.unknown,
        };
        *slot = if add {
            slot.saturating_add(1)
        } else {
            slot.saturating_sub(1)
        };
        if counts.total() == 0 {
            self.stats.remove(&key);
        }
    }

    /// Guesses a gender from the given name.
    #[must_use]
    pub fn guess_gender(&self, first_name: &str) -> Gender {
        let key = Self::key_of(first_name);
        let Some(c) = self.stats.get(&key) else {
            return Gender::Unknown;
        };
        if c.unknown == 0 {
            if c.male > 0 && c.female == 0 {
                return Gender::Male;
            }
            if c.female > 0 && c.male == 0 {
                return Gender::Female;
            }
        }
        if c.male > 2 * c.female {
            Gender::Male
        } else if c.female > 2 * c.male {
            Gender::Female
        } else {
            Gender::Unknown
        }
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// True if nothing is counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Iterates keys and counts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NameCounts)> {
        self.stats.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.stats.clear();
    }
}
