//! External ID patterns.
//!
//! A pattern is a printf-style template with one integer conversion, such
//! as `I%04d` or `F%d`. Patterns are validated once when they are set.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::model::RecordKind;

fn conversion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<pre>[^%]*)%(?P<zero>0)?(?P<width>[0-9]*)[diu](?P<post>[^%]*)$")
            .unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

/// Default prefix letter for a kind, or `None` for kinds without IDs.
#[must_use]
pub const fn default_prefix(kind: RecordKind) -> Option<&'static str> {
    match kind {
        RecordKind::Person => Some("I"),
        RecordKind::Family => Some("F"),
        RecordKind::Event => Some("E"),
        RecordKind::Place => Some("P"),
        RecordKind::Source => Some("S"),
        RecordKind::Citation => Some("C"),
        RecordKind::Repository => Some("R"),
        RecordKind::Media => Some("O"),
        RecordKind::Note => Some("N"),
        RecordKind::Tag => None,
    }
}

/// A validated external ID pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPattern {
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl IdPattern {
    /// Validates `template`, falling back to `<default>%04d`.
    ///
    /// A template without any conversion gets `%d` appended. An empty or
    /// malformed template is replaced by the default.
    #[must_use]
    pub fn parse(template: &str, default: &str) -> Self {
        if template.is_empty() {
            return Self::fallback(default);
        }
        if !template.contains('%') {
            return Self {
                prefix: template.to_string(),
                suffix: String::new(),
                width: 0,
                zero_pad: false,
            };
        }
        match conversion_re().captures(template) {
            Some(caps) => Self {
                prefix: caps["pre"].to_string(),
                suffix: caps["post"].to_string(),
                width: caps["width"].parse().unwrap_or(0),
                zero_pad: caps.name("zero").is_some(),
            },
            None => Self::fallback(default),
        }
    }

    /// The default pattern for a kind, `<letter>%04d`.
    #[must_use]
    pub fn for_kind(kind: RecordKind) -> Self {
        Self::fallback(default_prefix(kind).unwrap_or(""))
    }

    fn fallback(default: &str) -> Self {
        Self {
            prefix: default.to_string(),
            suffix: String::new(),
            width: 4,
            zero_pad: true,
        }
    }

    /// Formats `n` with the pattern.
    #[must_use]
    pub fn format(&self, n: u64) -> String {
        let digits = if self.zero_pad {
            format!("{n:0width$}", width = self.width)
        } else {
            format!("{n:width$}", width = self.width)
        };
        format!("{}{}{}", self.prefix, digits, self.suffix)
    }

    /// Recognises an ID produced by this pattern and returns its number.
    #[must_use]
    pub fn number_of(&self, id: &str) -> Option<u64> {
        let tail = id.strip_prefix(&self.prefix)?.strip_suffix(&self.suffix)?;
        let tail = tail.trim_start();
        if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        tail.parse().ok()
    }

    /// Rewrites an imported ID into this pattern's format.
    ///
    /// IDs that carry the prefix followed by digits are reformatted, so
    /// `I12` becomes `I0012` under `I%04d`. IDs whose number does not fit
    /// the width, and IDs that do not match at all, are returned unchanged.
    #[must_use]
    pub fn normalize(&self, id: &str) -> String {
        let Some(tail) = id.strip_prefix(&self.prefix) else {
            return id.to_string();
        };
        if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
            return id.to_string();
        }
        match tail.parse::<u64>() {
            Ok(n) if self.width == 0 || n.to_string().len() <= self.width => self.format(n),
            _ => id.to_string(),
        }
    }

    /// The pattern in printf form.
    #[must_use]
    pub fn template(&self) -> String {
        let width = if self.width > 0 {
            self.width.to_string()
        } else {
            String::new()
        };
        let zero = if self.zero_pad { "0" } else { "" };
        format!("{}%{}{}d{}", self.prefix, zero, width, self.suffix)
    }
}

impl fmt::Display for IdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_templates_are_kept() {
        assert_eq!(IdPattern::parse("I%04d", "I").format(1), "I0001");
        assert_eq!(IdPattern::parse("F%d", "F").format(42), "F42");
        assert_eq!(IdPattern::parse("X%05i-a", "X").format(7), "X00007-a");
        assert_eq!(IdPattern::parse("P%u", "P").template(), "P%d");
    }

    #[test]
    fn missing_conversion_gets_plain_number() {
        let p = IdPattern::parse("Person", "I");
        assert_eq!(p.format(3), "Person3");
        assert_eq!(p.template(), "Person%d");
    }

    #[test]
    fn invalid_templates_fall_back() {
        assert_eq!(IdPattern::parse("", "E").format(5), "E0005");
        assert_eq!(IdPattern::parse("E%s", "E").format(5), "E0005");
        assert_eq!(IdPattern::parse("E%d%d", "E").format(5), "E0005");
    }

    #[test]
    fn number_of_matches_own_ids() {
        let p = IdPattern::parse("I%04d", "I");
        assert_eq!(p.number_of("I0012"), Some(12));
        assert_eq!(p.number_of("F0012"), None);
        assert_eq!(p.number_of("I00x2"), None);
    }

    #[test]
    fn normalize_imported_ids() {
        let p = IdPattern::parse("I%04d", "I");
        assert_eq!(p.normalize("I12"), "I0012");
        assert_eq!(p.normalize("I123456"), "I123456");
        assert_eq!(p.normalize("P12"), "P12");
        assert_eq!(p.normalize("Ixyz"), "Ixyz");
    }

    #[test]
    fn defaults_per_kind() {
        assert_eq!(IdPattern::for_kind(RecordKind::Media).format(1), "O0001");
        assert_eq!(default_prefix(RecordKind::Tag), None);
    }

    proptest! {
        #[test]
        fn formatted_ids_parse_back(n in 0u64..1_000_000, width in 0usize..8) {
            let p = IdPattern::parse(&format!("N%0{width}d"), "N");
            let id = p.format(n);
            prop_assert!(id.starts_with('N'));
            prop_assert_eq!(p.number_of(&id), Some(n));
        }
    }
}
