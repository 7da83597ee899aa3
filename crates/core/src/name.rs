//! Patient name normalisation.
//!
//! Free-text names typed (or dictated) during a consultation are canonicalised so that records
//! referring to the same person collapse onto one identity key:
//!
//! 1. the characters `. ; ' " [ ] { }` are removed, nothing else is stripped;
//! 2. the remainder is split on whitespace runs and empty tokens are dropped;
//! 3. each token is title-cased (first character upper, the rest lower);
//! 4. tokens are rejoined with single spaces.
//!
//! Removal happens before splitting, so `"ana;paula"` becomes `"Anapaula"`, not `"Ana Paula"`.
//!
//! Casing uses one-to-one character mappings only. A character whose case mapping expands to
//! several characters (for example `ß` → `SS`) is kept as-is, which keeps
//! `normalize(normalize(x)) == normalize(x)` true for every input.

use crate::constants::STRIPPED_NAME_CHARS;

/// Canonicalises a free-text patient name for display and identity comparison.
pub fn normalize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !STRIPPED_NAME_CHARS.contains(c))
        .collect();

    cleaned
        .split_whitespace()
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the lookup key for a raw name: its normalised form, lower-cased.
pub fn identity_key(raw: &str) -> String {
    normalize(raw).to_lowercase()
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(token.len());
            out.push(simple_upper(first));
            out.extend(chars.map(simple_lower));
            out
        }
        None => String::new(),
    }
}

fn simple_upper(c: char) -> char {
    let mut it = c.to_uppercase();
    match (it.next(), it.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

fn simple_lower(c: char) -> char {
    let mut it = c.to_lowercase();
    match (it.next(), it.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace_and_title_cases() {
        assert_eq!(normalize("  maria  SILVA santos."), "Maria Silva Santos");
    }

    #[test]
    fn test_normalize_strips_semicolon_without_inserting_space() {
        assert_eq!(normalize("ana;paula"), "Anapaula");
    }

    #[test]
    fn test_normalize_strips_only_listed_punctuation() {
        assert_eq!(normalize("[joão] {pedro} \"zé\""), "João Pedro Zé");
        assert_eq!(normalize("maria-clara"), "Maria-clara");
        assert_eq!(normalize("o'neil"), "Oneil");
    }

    #[test]
    fn test_normalize_handles_latin1_letters() {
        assert_eq!(normalize("ÉRICA ÂNGELA"), "Érica Ângela");
        assert_eq!(normalize("çamile"), "Çamile");
    }

    #[test]
    fn test_normalize_blank_and_punctuation_only_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t "), "");
        assert_eq!(normalize(". ; ."), "");
    }

    #[test]
    fn test_normalize_keeps_multi_char_case_mappings_stable() {
        let once = normalize("ßtraße");
        assert_eq!(once, "ßtraße");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "  maria  SILVA santos.",
            "ana;paula",
            "JOÃO d'ávila",
            "x",
            "ǆemal ǅuro",
            "İstanbul",
            "ﬁona",
            "  \u{a0}lúcia\u{2003}MENDES ",
            "{[.]}",
        ];

        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "normalize should be idempotent for {s:?}");
        }
    }

    #[test]
    fn test_identity_key_is_case_insensitive() {
        assert_eq!(identity_key("Maria Silva"), identity_key("maria   silva"));
        assert_eq!(identity_key("MARIA SILVA."), "maria silva");
    }
}
