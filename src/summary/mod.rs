//! AI-written paper summaries.
//!
//! A [`Summarizer`] turns extracted paper text into a short formal report
//! plus a handful of suggested keyword tags. Summaries are best-effort: the
//! worker runs them after tagging and a failure never undoes tags.

mod gemini;

pub use gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_SUMMARY_TIMEOUT, GeminiSummarizer};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Report text used when the service answers without one.
pub const MISSING_REPORT: &str = "AI failed to generate a report.";

/// Message recorded when a paper has no text to summarize.
pub const NO_TEXT_MESSAGE: &str = "Could not extract text from the PDF";

/// Output of one summarize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Plain paragraphs, one per line.
    pub report: String,
    /// Tag suggestions as returned by the service (not yet normalized).
    pub suggested_tags: Vec<String>,
}

/// Errors raised while summarizing.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Input text was blank.
    #[error("Could not extract text from the PDF")]
    EmptyInput,

    /// No API key configured.
    #[error("no summary API key configured\n  Suggestion: Set gemini_api_key in the config file or PAPERTAG_GEMINI_API_KEY")]
    MissingApiKey,

    /// The HTTP client could not be built.
    #[error("failed to build summary HTTP client: {0}")]
    Client(String),

    /// The request did not complete.
    #[error("summary request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("summary service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// No answer within the timeout.
    #[error("summary request timed out after {0:?}")]
    Timeout(Duration),

    /// The answer did not have the expected shape.
    #[error("unexpected summary response: {0}")]
    Malformed(String),
}

impl SummaryError {
    /// Returns true when a later attempt might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::EmptyInput | Self::MissingApiKey | Self::Client(_) | Self::Malformed(_) => false,
        }
    }
}

/// Produces a report and suggested tags for a paper's text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Summarizes `text`.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError`] when the text is blank or the service fails.
    async fn summarize(&self, text: &str) -> Result<Summary, SummaryError>;
}

impl std::fmt::Debug for dyn Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Summarizer({})", self.name())
    }
}
