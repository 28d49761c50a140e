//! The collated surname list.

use crate::collation::Collator;

/// Distinct primary surnames, kept in collation order.
#[derive(Debug, Clone, Default)]
pub struct SurnameList {
    names: Vec<String>,
}

impl SurnameList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds from every surname in use.
    pub fn rebuild<I, S>(&mut self, surnames: I, collator: &Collator)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = surnames
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        self.names.sort_by(|a, b| collator.compare(a, b));
        self.names.dedup();
    }

    /// Inserts a surname in order. Empty and known names are ignored.
    pub fn insert(&mut self, surname: &str, collator: &Collator) -> bool {
        if surname.is_empty() {
            return false;
        }
        match self.names.binary_search_by(|n| collator.compare(n, surname)) {
            Ok(_) => false,
            Err(pos) => {
                self.names.insert(pos, surname.to_string());
                true
            }
        }
    }

    /// Removes a surname. The caller checks that no person still uses it.
    pub fn remove(&mut self, surname: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|n| n != surname);
        self.names.len() != before
    }

    /// True if the surname is listed.
    #[must_use]
    pub fn contains(&self, surname: &str) -> bool {
        self.names.iter().any(|n| n == surname)
    }

    /// The surnames in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}
