//! Variant discovery: stem matching, the iterative widening loop, and query composition.

pub(crate) mod compose;
pub(crate) mod discover;

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use compose::{DEFAULT_PROXIMITY, compose};
pub use discover::{Discoverer, Discovery, DiscoveryEvent};

const TIAB: &str = "[tiab]";

/// Append the title/abstract qualifier unless the term already carries one.
pub fn normalize_term(term: &str) -> String {
    let term = term.trim();
    if term.to_lowercase().contains(TIAB) {
        term.to_string()
    } else {
        format!("{term}{TIAB}")
    }
}

/// Lowercase root of a search term and the word pattern derived from it.
#[derive(Debug, Clone)]
pub struct Stem {
    text: String,
    pattern: Option<Regex>,
}

impl Stem {
    /// Strips at most one trailing `[tiab]` and then at most one trailing `*`.
    pub fn from_term(term: &str) -> Self {
        let lower = term.trim().to_lowercase();
        let without_field = lower.strip_suffix(TIAB).unwrap_or(&lower);
        let text = without_field
            .strip_suffix('*')
            .unwrap_or(without_field)
            .to_string();

        let pattern = if text.is_empty() {
            None
        } else {
            let source = format!(r"\b{}\w*\b", regex::escape(&text));
            Regex::new(&source).ok()
        };

        Self { text, pattern }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Every word form in `text` (already lowercased) that starts with the stem.
    pub fn find_variants<'t>(&self, text: &'t str) -> impl Iterator<Item = &'t str> {
        self.pattern
            .iter()
            .flat_map(move |re| re.find_iter(text).map(|m| m.as_str()))
    }
}

/// Occurrence count per lowercase word form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantCount(HashMap<String, u64>);

impl VariantCount {
    pub fn increment(&mut self, word: &str) {
        *self.0.entry(word.to_string()).or_insert(0) += 1;
    }

    #[cfg(test)]
    pub fn get(&self, word: &str) -> u64 {
        self.0.get(word).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries by descending count; equal counts in alphabetical order.
    pub fn most_common(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> =
            self.0.iter().map(|(w, c)| (w.as_str(), *c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Words only, most frequent first.
    pub fn ranked_words(&self) -> Vec<String> {
        self.most_common()
            .into_iter()
            .map(|(w, _)| w.to_string())
            .collect()
    }
}

impl<const N: usize> From<[(&str, u64); N]> for VariantCount {
    fn from(entries: [(&str, u64); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(w, c)| (w.to_string(), c))
                .collect(),
        )
    }
}

/// `base NOT (v1[tiab] OR v2[tiab] ...)`, or `base` when nothing is excluded.
pub fn exclusion_query(base: &str, excluded: &BTreeSet<String>) -> String {
    if excluded.is_empty() {
        return base.to_string();
    }
    let clauses = excluded
        .iter()
        .map(|v| format!("{v}{TIAB}"))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("{base} NOT ({clauses})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_appends_tiab() {
        assert_eq!(normalize_term("gene"), "gene[tiab]");
        assert_eq!(normalize_term("  gene* "), "gene*[tiab]");
    }

    #[test]
    fn normalize_keeps_existing_tiab_any_case() {
        assert_eq!(normalize_term("gene[tiab]"), "gene[tiab]");
        assert_eq!(normalize_term("Gene[TIAB]"), "Gene[TIAB]");
    }

    #[test]
    fn stem_strips_qualifier_and_wildcard() {
        assert_eq!(Stem::from_term("Gene*[tiab]").as_str(), "gene");
        assert_eq!(Stem::from_term("gene[tiab]").as_str(), "gene");
        assert_eq!(Stem::from_term("gene*").as_str(), "gene");
        assert_eq!(Stem::from_term("gene").as_str(), "gene");
    }

    #[test]
    fn stem_strips_at_most_one_of_each() {
        assert_eq!(Stem::from_term("gene**[tiab]").as_str(), "gene*");
        assert_eq!(Stem::from_term("gene[tiab][tiab]").as_str(), "gene[tiab]");
        // qualifier before wildcard is not stripped
        assert_eq!(Stem::from_term("gene[tiab]*").as_str(), "gene[tiab]");
    }

    #[test]
    fn stem_does_not_strip_characters_of_qualifier() {
        assert_eq!(Stem::from_term("bait[tiab]").as_str(), "bait");
        assert_eq!(Stem::from_term("tibia").as_str(), "tibia");
    }

    #[test]
    fn finds_prefixed_word_forms() {
        let stem = Stem::from_term("gene*[tiab]");
        let words: Vec<&str> = stem
            .find_variants("genes and genetic gene, but not oncogene or genè")
            .collect();
        assert_eq!(words, vec!["genes", "genetic", "gene"]);
    }

    #[test]
    fn variants_borrow_from_text_not_stem() {
        let text = String::from("geneé and genomics");
        let words: Vec<&str> = {
            let stem = Stem::from_term("gene");
            stem.find_variants(&text).collect()
        };
        assert_eq!(words, vec!["geneé"]);
    }

    #[test]
    fn escapes_regex_metacharacters() {
        let stem = Stem::from_term("il-6");
        let words: Vec<&str> = stem.find_variants("il-6 levels vs il66 and il-6r").collect();
        assert_eq!(words, vec!["il-6", "il-6r"]);
    }

    #[test]
    fn empty_stem_matches_nothing() {
        let stem = Stem::from_term("[tiab]");
        assert_eq!(stem.as_str(), "");
        assert_eq!(stem.find_variants("anything at all").count(), 0);
    }

    #[test]
    fn most_common_orders_by_count_then_word() {
        let counts = VariantCount::from([("genes", 3), ("gene", 5), ("genetic", 3)]);
        assert_eq!(
            counts.most_common(),
            vec![("gene", 5), ("genes", 3), ("genetic", 3)]
        );
        assert_eq!(counts.ranked_words(), vec!["gene", "genes", "genetic"]);
    }

    #[test]
    fn increment_accumulates() {
        let mut counts = VariantCount::default();
        counts.increment("gene");
        counts.increment("gene");
        counts.increment("genes");
        assert_eq!(counts.get("gene"), 2);
        assert_eq!(counts.get("genes"), 1);
        assert_eq!(counts.get("genome"), 0);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn exclusion_query_without_variants_is_base() {
        assert_eq!(exclusion_query("gene[tiab]", &BTreeSet::new()), "gene[tiab]");
    }

    #[test]
    fn exclusion_query_lists_variants_sorted() {
        let excluded: BTreeSet<String> = ["genetic", "gene"].into_iter().map(String::from).collect();
        assert_eq!(
            exclusion_query("gene*[tiab]", &excluded),
            "gene*[tiab] NOT (gene[tiab] OR genetic[tiab])"
        );
    }
}
