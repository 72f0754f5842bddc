//! Text and tag-name normalization.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

/// Every character outside `[A-Za-z\s]`.
#[allow(clippy::expect_used)]
static NON_ALPHA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z\s]").expect("non-alpha regex is valid") // Static pattern, safe to panic
});

/// Normalizes raw document text for term scoring.
///
/// Deletes every character outside `[A-Za-z\s]` (nothing is inserted in its
/// place, so `state-of-the-art` becomes `stateoftheart`) and lower-cases the
/// rest. The result may be empty.
#[must_use]
#[instrument(level = "trace", skip(raw), fields(len = raw.len()))]
pub fn normalize_text(raw: &str) -> String {
    NON_ALPHA.replace_all(raw, "").to_lowercase()
}

/// Splits normalized text into tokens.
///
/// Tokens are maximal non-whitespace runs, so they are never empty.
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split_whitespace()
}

/// Normalizes a tag name: trims, lower-cases and collapses inner whitespace.
///
/// Returns `None` for names that are empty after trimming.
#[must_use]
pub fn normalize_tag_name(name: &str) -> Option<String> {
    let collapsed = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Normalizes a list of tag names, dropping empties and case-insensitive
/// duplicates while keeping first-seen order.
#[must_use]
#[instrument(skip(names), fields(count = names.len()))]
pub fn normalize_tag_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter_map(|name| normalize_tag_name(name))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_lowercases_and_strips_punctuation() {
        assert_eq!(
            normalize_text("Deep Learning improves Deep Learning models."),
            "deep learning improves deep learning models"
        );
    }

    #[test]
    fn test_normalize_text_deletes_rather_than_separates() {
        assert_eq!(normalize_text("state-of-the-art"), "stateoftheart");
        assert_eq!(normalize_text("GPT-4o"), "gpto");
    }

    #[test]
    fn test_normalize_text_drops_digits_and_non_ascii_letters() {
        assert_eq!(normalize_text("café 2024 naïve"), "caf  nave");
    }

    #[test]
    fn test_normalize_text_keeps_whitespace() {
        assert_eq!(normalize_text("a\nb\tc"), "a\nb\tc");
    }

    #[test]
    fn test_normalize_text_non_alphabetic_only_yields_blank() {
        let normalized = normalize_text("1234 !!! 5.6 -- ()");
        assert!(normalized.trim().is_empty());
        assert_eq!(tokens(&normalized).count(), 0);
    }

    #[test]
    fn test_tokens_never_empty() {
        let all: Vec<&str> = tokens("  deep   learning \n models ").collect();
        assert_eq!(all, vec!["deep", "learning", "models"]);
    }

    #[test]
    fn test_normalize_tag_name_trims_and_lowercases() {
        assert_eq!(
            normalize_tag_name("  Machine   Learning \n"),
            Some("machine learning".to_string())
        );
        assert_eq!(normalize_tag_name("   "), None);
        assert_eq!(normalize_tag_name(""), None);
    }

    #[test]
    fn test_normalize_tag_names_dedupes_case_insensitively_in_order() {
        let names = vec![
            "Transformers".to_string(),
            "machine learning".to_string(),
            "TRANSFORMERS".to_string(),
            " ".to_string(),
            "Machine Learning".to_string(),
        ];

        assert_eq!(
            normalize_tag_names(names),
            vec!["transformers", "machine learning"]
        );
    }

    #[test]
    fn test_normalize_tag_names_is_idempotent() {
        let once = normalize_tag_names(vec!["  Graph  Neural Nets ".to_string()]);
        let twice = normalize_tag_names(once.clone());
        assert_eq!(once, twice);
    }
}
