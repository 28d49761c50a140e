//! Record handles.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, immutable primary key of a record.
///
/// Handles are assigned once, when a record is first added, and never
/// change. They are 32 lowercase hex digits generated from a random UUID.
/// The empty handle means "not assigned yet".
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Generates a fresh random handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps an existing handle string.
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no handle was assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Handle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Handle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_handles_are_unique_hex() {
        let handles: HashSet<_> = (0..100).map(|_| Handle::new()).collect();
        assert_eq!(handles.len(), 100);
        for h in &handles {
            assert_eq!(h.as_str().len(), 32);
            assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn default_handle_is_empty() {
        assert!(Handle::default().is_empty());
        assert!(!Handle::new().is_empty());
    }

    #[test]
    fn display_is_raw_string() {
        let h = Handle::from("abc");
        assert_eq!(h.to_string(), "abc");
        assert_eq!(format!("{h:?}"), "Handle(abc)");
    }
}
