//! Papertag Core Library
//!
//! Automatic keyword tagging for research papers shared as PDFs. A paper's
//! text is extracted, normalized, filtered against a stopword list and
//! ranked by TF-IDF; the top terms become tags in a shared vocabulary.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`extract`] - Page text extraction from PDFs
//! - [`topics`] - Normalization, stopwords and term scoring
//! - [`tags`] - Tag vocabulary, get-or-create and top-K selection
//! - [`pipeline`] - The per-document tagging run
//! - [`paper`] - Registry of uploaded papers
//! - [`jobs`] - Persistent tagging job queue
//! - [`worker`] - Concurrent queue draining
//! - [`summary`] - Optional AI-written reports

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod db;
pub mod extract;
pub mod jobs;
pub mod paper;
pub mod pipeline;
pub mod summary;
pub mod tags;
pub mod topics;
pub mod worker;

// Re-export commonly used types
pub use db::{Database, DbError, DbErrorKind};
pub use extract::{DocumentSource, ExtractError, ExtractedText, PdfDocument};
pub use jobs::{JobStatus, QueueError, TagJob, TagJobQueue};
pub use paper::{Paper, PaperError, Papers, SummaryStatus};
pub use pipeline::{
    PipelineStage, Preview, TaggedDocument, Tagger, TaggingConfig, TaggingReason, TaggingReport,
};
pub use summary::{GeminiSummarizer, Summarizer, Summary, SummaryError};
pub use tags::{DocumentId, SqliteTagStore, Tag, TagError, TagId, TagSelector, TagSink};
pub use topics::{BundledStopwords, FileStopwords, StopwordCache, StopwordError, TermScore};
pub use worker::{BatchStats, DEFAULT_CONCURRENCY, TaggingWorker, WorkerError};
