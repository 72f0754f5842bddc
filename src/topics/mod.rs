//! Keyword detection for document text.
//!
//! Raw text is normalized to lower-case alphabetic tokens, stopwords are
//! removed, and the remaining terms are ranked by TF-IDF within the single
//! document. [`rank_terms`] chains the three steps.

mod normalizer;
mod scorer;
mod stopwords;

pub use normalizer::{normalize_tag_name, normalize_tag_names, normalize_text, tokens};
pub use scorer::{TermScore, score_terms, smoothed_idf};
pub use stopwords::{
    BundledStopwords, DEFAULT_LANGUAGE, FileStopwords, StopwordCache, StopwordError,
    StopwordSet, StopwordSource, load_stopword_file,
};

use tracing::instrument;

/// Normalizes `raw`, drops stopwords, and ranks the remaining terms.
///
/// Returns an empty ranking when nothing survives normalization and
/// filtering.
#[must_use]
#[instrument(skip(raw, stopwords), fields(len = raw.len(), language = stopwords.language()))]
pub fn rank_terms(raw: &str, stopwords: &StopwordSet) -> Vec<TermScore> {
    let normalized = normalize_text(raw);
    score_terms(stopwords.filter(tokens(&normalized)))
}
