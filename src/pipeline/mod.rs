//! The tagging pipeline.
//!
//! [`Tagger::extract_and_tag`] runs one document through
//! extraction, normalization, stopword removal, TF-IDF scoring and tag
//! selection. Every failure is folded into the returned [`TaggingReport`];
//! nothing here returns an error or panics on bad input, so a shared worker
//! can call it in a loop.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use papertag_core::extract::TextPages;
//! use papertag_core::pipeline::{Tagger, TaggingConfig};
//! use papertag_core::tags::MemoryTagStore;
//! use papertag_core::topics::{StopwordCache, StopwordSet};
//!
//! # tokio_test_block_on(async {
//! let stopwords = Arc::new(StopwordCache::with_sets([StopwordSet::new(
//!     "en",
//!     ["the", "a", "improves"],
//! )]));
//! let config = TaggingConfig::builder().max_tags(3).build().unwrap();
//! let tagger = Tagger::new(config, stopwords);
//!
//! let pages = TextPages::from_iter(["Deep Learning improves Deep Learning models.", ""]);
//! let store = MemoryTagStore::new();
//! let report = tagger.extract_and_tag(1, &pages, &store).await;
//!
//! assert_eq!(report.tag_names, vec!["deep", "learning", "models"]);
//! assert!(report.reason.is_none());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

mod config;
mod outcome;

pub use config::{
    ConfigError, MAX_INPUT_CHARS_LIMIT, MAX_TAGS_LIMIT, TaggingConfig, TaggingConfigBuilder,
};
pub use outcome::{PipelineStage, TaggingReason, TaggingReport};

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::extract::{DocumentSource, ExtractedText, extract_text};
use crate::tags::{ConflictRetry, DocumentId, Selection, TagError, TagSelector, TagSink};
use crate::topics::{StopwordCache, TermScore, normalize_text, score_terms, tokens};

/// Ranked terms for a document, without touching tag storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// Top terms, at most `max_tags`.
    pub terms: Vec<TermScore>,
    /// Why the ranking is empty, if it is.
    pub reason: Option<TaggingReason>,
    /// Error text behind `reason`.
    pub detail: Option<String>,
    /// True when extraction hit the character budget.
    pub truncated: bool,
}

/// Outcome of [`Tagger::tag_document`]: the report plus the extracted text,
/// for callers that feed the same text to a summarizer.
#[derive(Debug, Clone)]
pub struct TaggedDocument {
    pub report: TaggingReport,
    /// `None` when the document could not be read.
    pub text: Option<ExtractedText>,
}

/// Runs documents through the tagging pipeline.
///
/// Cheap to share: the stopword cache is behind an `Arc` and the rest is
/// plain configuration.
#[derive(Debug, Clone)]
pub struct Tagger {
    config: TaggingConfig,
    stopwords: Arc<StopwordCache>,
    selector: TagSelector,
}

impl Tagger {
    /// Creates a tagger with the given settings and stopword cache.
    #[must_use]
    pub fn new(config: TaggingConfig, stopwords: Arc<StopwordCache>) -> Self {
        let selector = TagSelector::new(config.max_tags());
        Self {
            config,
            stopwords,
            selector,
        }
    }

    /// Replaces the conflict retry policy used while persisting tags.
    #[must_use]
    pub fn with_conflict_retry(mut self, retry: ConflictRetry) -> Self {
        self.selector = self.selector.with_retry(retry);
        self
    }

    /// The settings this tagger runs with.
    #[must_use]
    pub fn config(&self) -> &TaggingConfig {
        &self.config
    }

    /// The selector used to attach tags, shared with summary tag merging.
    #[must_use]
    pub fn selector(&self) -> &TagSelector {
        &self.selector
    }

    /// Extracts keywords from `source` and attaches the top terms to
    /// `document_id` through `sink`.
    pub async fn extract_and_tag(
        &self,
        document_id: DocumentId,
        source: &dyn DocumentSource,
        sink: &dyn TagSink,
    ) -> TaggingReport {
        self.tag_document(document_id, source, sink).await.report
    }

    /// Like [`extract_and_tag`](Self::extract_and_tag), also returning the
    /// extracted text.
    #[instrument(skip(self, source, sink), fields(source = %source.label()))]
    pub async fn tag_document(
        &self,
        document_id: DocumentId,
        source: &dyn DocumentSource,
        sink: &dyn TagSink,
    ) -> TaggedDocument {
        let mut run = Run::new(document_id);
        let (ranking, text) = self.rank(&mut run, source).await;

        if let Some(ranking) = ranking {
            run.advance(PipelineStage::Selecting);
            let mut selection = Selection::default();
            let result = self
                .selector
                .select_into(
                    document_id,
                    ranking.iter().map(|score| score.term.as_str()),
                    sink,
                    &mut selection,
                )
                .await;
            run.record(selection);

            match result {
                Ok(()) => run.advance(PipelineStage::Done),
                Err(err) => run.abort(reason_for_tag_error(&err), &err),
            }
        }

        let report = run.into_report();
        debug_assert!(report.stage.is_terminal(), "run ended in {}", report.stage);
        if report.is_success() {
            info!(
                document_id,
                tags = report.tags_added.len(),
                newly_associated = report.newly_associated,
                "document tagged"
            );
        }
        TaggedDocument { report, text }
    }

    /// Ranks the terms of `source` without persisting anything.
    #[instrument(skip(self, source), fields(source = %source.label()))]
    pub async fn preview(&self, source: &dyn DocumentSource) -> Preview {
        let mut run = Run::new(0);
        let (ranking, _) = self.rank(&mut run, source).await;
        let report = run.into_report();

        let mut terms = ranking.unwrap_or_default();
        terms.truncate(self.config.max_tags());
        Preview {
            terms,
            reason: report.reason,
            detail: report.detail,
            truncated: report.truncated,
        }
    }

    /// Runs the stages up to and including scoring.
    ///
    /// Returns `None` for the ranking when the run ended early; `run`
    /// already holds the reason.
    async fn rank(
        &self,
        run: &mut Run,
        source: &dyn DocumentSource,
    ) -> (Option<Vec<TermScore>>, Option<ExtractedText>) {
        run.advance(PipelineStage::Extracting);
        let extracted = match extract_text(source, self.config.max_input_chars()) {
            Ok(extracted) => extracted,
            Err(err) => {
                run.abort(TaggingReason::DocumentUnreadable, &err);
                return (None, None);
            }
        };
        run.report.truncated = extracted.truncated;

        run.advance(PipelineStage::Normalizing);
        let normalized = normalize_text(&extracted.text);
        if normalized.trim().is_empty() {
            run.finish_empty("no alphabetic text");
            return (None, Some(extracted));
        }

        run.advance(PipelineStage::Scoring);
        let stopwords = match self.stopwords.get(self.config.language()).await {
            Ok(stopwords) => stopwords,
            Err(err) => {
                run.abort(TaggingReason::StopwordCorpusUnavailable, &err);
                return (None, Some(extracted));
            }
        };
        let ranking = score_terms(stopwords.filter(tokens(&normalized)));
        if ranking.is_empty() {
            run.finish_empty("only stopwords");
            return (None, Some(extracted));
        }

        debug!(
            document_id = run.report.document_id,
            terms = ranking.len(),
            "terms scored"
        );
        (Some(ranking), Some(extracted))
    }
}

fn reason_for_tag_error(err: &TagError) -> TaggingReason {
    match err {
        TagError::Conflict { .. } => TaggingReason::TagPersistenceConflict,
        TagError::Database { .. } | TagError::InvalidName(_) => TaggingReason::TagStorageFailed,
    }
}

/// Stage bookkeeping for one run.
struct Run {
    report: TaggingReport,
}

impl Run {
    fn new(document_id: DocumentId) -> Self {
        Self {
            report: TaggingReport::new(document_id),
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert_eq!(self.report.stage.next(), Some(next));
        debug!(
            document_id = self.report.document_id,
            from = %self.report.stage,
            to = %next,
            "pipeline stage"
        );
        self.report.stage = next;
    }

    fn abort(&mut self, reason: TaggingReason, err: &dyn std::fmt::Display) {
        warn!(
            document_id = self.report.document_id,
            stage = %self.report.stage,
            reason = %reason,
            error = %err,
            tags = self.report.tags_added.len(),
            "tagging aborted"
        );
        self.report.aborted_at = Some(self.report.stage);
        self.report.stage = PipelineStage::Aborted;
        self.report.reason = Some(reason);
        self.report.detail = Some(err.to_string());
    }

    /// Ends the run as `Done` with zero tags.
    fn finish_empty(&mut self, why: &str) {
        info!(
            document_id = self.report.document_id,
            stage = %self.report.stage,
            why,
            "no extractable text"
        );
        self.report.stage = PipelineStage::Done;
        self.report.reason = Some(TaggingReason::NoExtractableText);
        self.report.detail = Some(why.to_string());
    }

    fn record(&mut self, selection: Selection) {
        self.report.tags_added = selection.tag_ids;
        self.report.tag_names = selection.names;
        self.report.newly_associated = selection.newly_associated;
    }

    fn into_report(self) -> TaggingReport {
        self.report
    }
}
