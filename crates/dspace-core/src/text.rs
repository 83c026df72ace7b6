//! Text normalization used by every comparison in the matching core.

use std::collections::HashSet;

/// Canonical comparison form of free text.
///
/// Lower-cases, drops everything that is not a letter, digit, underscore or whitespace
/// (Unicode-aware, so Cyrillic survives), collapses whitespace runs to one space and trims.
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if is_word_char(c) {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

/// Distinct words of an already normalized string.
pub fn word_set(normalized: &str) -> HashSet<&str> {
    normalized.split(' ').filter(|w| !w.is_empty()).collect()
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("Hello!!"), normalize("hello"));
        assert_eq!(normalize("  Сколько   СТОИТ vr?!  "), "сколько стоит vr");
        assert_eq!(normalize("a ! b"), "a b");
        assert_eq!(normalize("don't"), "dont");
    }

    #[test]
    fn test_normalize_empty_and_symbol_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("?!… 🎮"), "");
    }

    #[test]
    fn test_normalize_keeps_digits_and_underscore() {
        assert_eq!(normalize("VR-зона №2, от 300 ₽"), "vrзона 2 от 300");
        assert_eq!(normalize("snake_case\tword\n"), "snake_case word");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for s in [
            "Привет, Мир!",
            "  multiple   spaces\t\tand\nnewlines ",
            "ÀÉÎ õü — mixed; punctuation...",
            "İstanbul ǅ",
            "",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_word_set_is_distinct() {
        let words = word_set("vr vr игры");
        assert_eq!(words.len(), 2);
        assert!(words.contains("игры"));
        assert!(word_set("").is_empty());
    }
}
