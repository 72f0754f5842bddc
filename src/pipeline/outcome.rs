//! Pipeline stages, reason codes, and the per-run report.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tags::{DocumentId, TagId};

/// Stage of a tagging run.
///
/// Runs move strictly forward through
/// `Idle → Extracting → Normalizing → Scoring → Selecting → Done`;
/// `Aborted` is terminal and reachable from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Extracting,
    Normalizing,
    Scoring,
    Selecting,
    Done,
    Aborted,
}

impl PipelineStage {
    /// Returns the string label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Normalizing => "normalizing",
            Self::Scoring => "scoring",
            Self::Selecting => "selecting",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Returns true for `Done` and `Aborted`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// The stage that follows this one on the success path.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Extracting),
            Self::Extracting => Some(Self::Normalizing),
            Self::Normalizing => Some(Self::Scoring),
            Self::Scoring => Some(Self::Selecting),
            Self::Selecting => Some(Self::Done),
            Self::Done | Self::Aborted => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run produced fewer tags than it could have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaggingReason {
    /// The document container could not be opened or iterated.
    DocumentUnreadable,
    /// Nothing survived extraction, normalization and stopword removal.
    NoExtractableText,
    /// Stopwords for the configured language could not be loaded.
    StopwordCorpusUnavailable,
    /// Tag writes kept colliding with concurrent writers.
    TagPersistenceConflict,
    /// Tag storage failed for a reason other than contention.
    TagStorageFailed,
}

impl TaggingReason {
    /// Returns the stable reason code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentUnreadable => "document_unreadable",
            Self::NoExtractableText => "no_extractable_text",
            Self::StopwordCorpusUnavailable => "stopword_corpus_unavailable",
            Self::TagPersistenceConflict => "tag_persistence_conflict",
            Self::TagStorageFailed => "tag_storage_failed",
        }
    }

    /// Returns true when rerunning the same document later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StopwordCorpusUnavailable | Self::TagPersistenceConflict | Self::TagStorageFailed
        )
    }

    /// Returns true when the run was aborted rather than finished.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        !matches!(self, Self::NoExtractableText)
    }
}

impl fmt::Display for TaggingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaggingReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document_unreadable" => Ok(Self::DocumentUnreadable),
            "no_extractable_text" => Ok(Self::NoExtractableText),
            "stopword_corpus_unavailable" => Ok(Self::StopwordCorpusUnavailable),
            "tag_persistence_conflict" => Ok(Self::TagPersistenceConflict),
            "tag_storage_failed" => Ok(Self::TagStorageFailed),
            _ => Err(format!("invalid tagging reason: {s}")),
        }
    }
}

/// Structured result of one tagging run. Never an error: failures are
/// carried in `reason`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggingReport {
    /// Document the run applied to.
    pub document_id: DocumentId,
    /// Tags attached by this run, in rank order (at most `max_tags`).
    pub tags_added: Vec<TagId>,
    /// Normalized names parallel to `tags_added`.
    pub tag_names: Vec<String>,
    /// How many of those links were new.
    pub newly_associated: usize,
    /// Final stage: `Done` or `Aborted`.
    pub stage: PipelineStage,
    /// Stage that was running when the run aborted.
    pub aborted_at: Option<PipelineStage>,
    /// Reason code for zero or partial tags.
    pub reason: Option<TaggingReason>,
    /// Error text behind `reason`, for logs.
    pub detail: Option<String>,
    /// True when the extracted text was cut at the character budget.
    pub truncated: bool,
}

impl TaggingReport {
    pub(crate) fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            tags_added: Vec::new(),
            tag_names: Vec::new(),
            newly_associated: 0,
            stage: PipelineStage::Idle,
            aborted_at: None,
            reason: None,
            detail: None,
            truncated: false,
        }
    }

    /// Returns true when the run reached `Done` with no reason code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Done && self.reason.is_none()
    }

    /// Returns true when the run ended in `Aborted`.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.stage == PipelineStage::Aborted
    }
}
