//! TF-IDF term importance within a single document.
//!
//! The collection scored against is the document itself, so every term that
//! appears has document frequency 1 in a collection of size 1. With add-one
//! smoothing the IDF factor is `ln((1 + 1) / (1 + 1)) + 1 = 1`, and terms end
//! up ranked by their frequency in the document.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::instrument;

/// Number of documents in the scoring collection.
const COLLECTION_SIZE: usize = 1;

/// A term with its importance weight for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct TermScore {
    /// Normalized term.
    pub term: String,
    /// `tf * idf`, always non-negative.
    pub weight: f64,
    /// Occurrences in the document.
    pub count: usize,
    /// Token index of the first occurrence, used as the tie-break.
    pub first_position: usize,
}

/// Smoothed inverse document frequency: `ln((1 + n) / (1 + df)) + 1`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn smoothed_idf(collection_size: usize, document_frequency: usize) -> f64 {
    ((1 + collection_size) as f64 / (1 + document_frequency) as f64).ln() + 1.0
}

/// Scores every distinct term and returns them ranked.
///
/// Ranking is by weight, descending; equal weights keep first-occurrence
/// order. An empty token stream yields an empty ranking.
#[must_use]
#[instrument(level = "debug", skip(terms))]
#[allow(clippy::cast_precision_loss)]
pub fn score_terms<'a>(terms: impl IntoIterator<Item = &'a str>) -> Vec<TermScore> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut total = 0usize;

    for (position, term) in terms.into_iter().enumerate() {
        counts.entry(term).or_insert((0, position)).0 += 1;
        total += 1;
    }

    if total == 0 {
        return Vec::new();
    }

    let idf = smoothed_idf(COLLECTION_SIZE, 1);
    let mut scored: Vec<TermScore> = counts
        .into_iter()
        .map(|(term, (count, first_position))| TermScore {
            term: term.to_string(),
            weight: (count as f64 / total as f64) * idf,
            count,
            first_position,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.first_position.cmp(&b.first_position))
    });

    scored
}
