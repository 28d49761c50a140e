//! Locale-aware string collation for sorted listings.
//!
//! The collator is deliberately small: it folds case and accents through
//! Unicode compatibility decomposition and applies the few per-language
//! tailorings that change where letters sort (Swedish `å ä ö` after `z`,
//! Danish/Norwegian `æ ø å` after `z`). The `C` and `POSIX` locales
//! compare raw code points.

use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tailoring {
    None,
    Swedish,
    DanoNorwegian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Binary,
    Folded(Tailoring),
}

/// Compares strings according to a locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collator {
    locale: String,
    mode: Mode,
}

impl Collator {
    /// Builds a collator for a locale name such as `en_US.UTF-8` or `sv`.
    #[must_use]
    pub fn for_locale(locale: &str) -> Self {
        let lang = locale
            .split(['_', '-', '.', '@'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        let mode = match lang.as_str() {
            "c" | "posix" => Mode::Binary,
            "sv" | "fi" => Mode::Folded(Tailoring::Swedish),
            "da" | "nb" | "nn" | "no" => Mode::Folded(Tailoring::DanoNorwegian),
            _ => Mode::Folded(Tailoring::None),
        };
        Self {
            locale: locale.to_string(),
            mode,
        }
    }

    /// The locale this collator was built for.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Primary sort key of `s`. Equal keys compare as equal ignoring case
    /// and accents.
    #[must_use]
    pub fn key(&self, s: &str) -> String {
        match self.mode {
            Mode::Binary => s.to_string(),
            Mode::Folded(tailoring) => fold(s, tailoring),
        }
    }

    /// Compares two strings: by key, then by raw text.
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self.mode {
            Mode::Binary => a.cmp(b),
            Mode::Folded(_) => self.key(a).cmp(&self.key(b)).then_with(|| a.cmp(b)),
        }
    }

    /// Compares multi-field keys field by field.
    #[must_use]
    pub fn compare_fields(&self, a: &[String], b: &[String]) -> Ordering {
        for (x, y) in a.iter().zip(b) {
            match self.compare(x, y) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        a.len().cmp(&b.len())
    }
}

impl Default for Collator {
    fn default() -> Self {
        Self::for_locale("en_US")
    }
}

fn tailored(c: char, tailoring: Tailoring) -> Option<char> {
    // Code points just past 'z' keep the tailored letters in alphabet order.
    match (tailoring, c) {
        (Tailoring::Swedish, 'å') => Some('\u{7b}'),
        (Tailoring::Swedish, 'ä' | 'æ') => Some('\u{7c}'),
        (Tailoring::Swedish, 'ö' | 'ø') => Some('\u{7d}'),
        (Tailoring::DanoNorwegian, 'æ' | 'ä') => Some('\u{7b}'),
        (Tailoring::DanoNorwegian, 'ø' | 'ö') => Some('\u{7c}'),
        (Tailoring::DanoNorwegian, 'å') => Some('\u{7d}'),
        _ => None,
    }
}

fn expand(c: char, out: &mut String) {
    match c {
        'ß' => out.push_str("ss"),
        'æ' => out.push_str("ae"),
        'œ' => out.push_str("oe"),
        'ø' => out.push('o'),
        'ł' => out.push('l'),
        'đ' | 'ð' => out.push('d'),
        'þ' => out.push_str("th"),
        'ı' => out.push('i'),
        _ => out.push(c),
    }
}

fn fold(s: &str, tailoring: Tailoring) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        if let Some(t) = tailored(c, tailoring) {
            out.push(t);
            continue;
        }
        for d in std::iter::once(c).nfkd() {
            if !is_combining_mark(d) {
                expand(d, &mut out);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(locale: &str, words: &[&str]) -> Vec<String> {
        let c = Collator::for_locale(locale);
        let mut v: Vec<String> = words.iter().map(|s| (*s).to_string()).collect();
        v.sort_by(|a, b| c.compare(a, b));
        v
    }

    #[test]
    fn accents_and_case_fold_in_english() {
        assert_eq!(
            sorted("en_US", &["Zola", "émile", "Eve", "adam"]),
            vec!["adam", "émile", "Eve", "Zola"]
        );
    }

    #[test]
    fn c_locale_is_binary() {
        assert_eq!(sorted("C", &["b", "B", "a"]), vec!["B", "a", "b"]);
    }

    #[test]
    fn swedish_letters_sort_after_z() {
        assert_eq!(
            sorted("sv_SE.UTF-8", &["Öberg", "Zetterlund", "Åberg", "Ahl", "Ängström"]),
            vec!["Ahl", "Zetterlund", "Åberg", "Ängström", "Öberg"]
        );
    }

    #[test]
    fn danish_order_differs_from_swedish() {
        assert_eq!(
            sorted("da_DK", &["Ågård", "Ærø", "Øster"]),
            vec!["Ærø", "Øster", "Ågård"]
        );
    }

    #[test]
    fn special_letters_expand() {
        let c = Collator::for_locale("de_DE");
        assert_eq!(c.key("Straße"), "strasse");
        assert_eq!(c.key("Łukasz"), "lukasz");
    }

    #[test]
    fn multi_field_compare() {
        let c = Collator::default();
        let a = vec!["Smith".to_string(), "Anna".to_string()];
        let b = vec!["smith".to_string(), "Bert".to_string()];
        assert_eq!(c.compare_fields(&a, &b), Ordering::Less);
    }
}
