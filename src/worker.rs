//! Background worker that drains the tagging job queue.
//!
//! Each claimed job runs in its own Tokio task under a semaphore permit.
//! A job's outcome is written back to the queue; one document failing never
//! stops the batch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use papertag_core::jobs::TagJobQueue;
//! use papertag_core::paper::Papers;
//! use papertag_core::pipeline::{Tagger, TaggingConfig};
//! use papertag_core::tags::SqliteTagStore;
//! use papertag_core::topics::{BundledStopwords, StopwordCache};
//! use papertag_core::worker::TaggingWorker;
//! use papertag_core::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new_in_memory().await?;
//! let stopwords = Arc::new(StopwordCache::new(Box::new(BundledStopwords)));
//! let tagger = Tagger::new(TaggingConfig::default(), stopwords);
//! let worker = TaggingWorker::new(4, tagger)?;
//! let stats = worker
//!     .process_queue(
//!         &TagJobQueue::new(db.clone()),
//!         &Papers::new(db.clone()),
//!         &SqliteTagStore::new(db),
//!     )
//!     .await?;
//! println!("tagged {} papers", stats.completed);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::extract::{ExtractedText, PdfDocument};
use crate::jobs::{QueueError, TagJob, TagJobQueue};
use crate::paper::{Paper, Papers, SummaryStatus};
use crate::pipeline::{TaggingReason, TaggingReport, Tagger};
use crate::summary::{NO_TEXT_MESSAGE, Summarizer, SummaryError};
use crate::tags::SqliteTagStore;
use crate::topics::normalize_tag_names;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 32;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Error type for worker operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Queue operation failed.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Counters shared by the tasks of one batch.
#[derive(Debug, Default)]
struct WorkerStats {
    completed: AtomicUsize,
    empty: AtomicUsize,
    failed: AtomicUsize,
    tags_added: AtomicUsize,
    summarized: AtomicUsize,
    summary_failed: AtomicUsize,
}

impl WorkerStats {
    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::SeqCst);
    }

    fn snapshot(&self) -> BatchStats {
        BatchStats {
            completed: self.completed.load(Ordering::SeqCst),
            empty: self.empty.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            tags_added: self.tags_added.load(Ordering::SeqCst),
            summarized: self.summarized.load(Ordering::SeqCst),
            summary_failed: self.summary_failed.load(Ordering::SeqCst),
        }
    }
}

/// Totals from one [`TaggingWorker::process_queue`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Jobs that attached at least one tag.
    pub completed: usize,
    /// Jobs that finished with no extractable text.
    pub empty: usize,
    /// Jobs that aborted.
    pub failed: usize,
    /// Tags attached across all jobs.
    pub tags_added: usize,
    /// Papers whose summary became ready.
    pub summarized: usize,
    /// Summary attempts that failed.
    pub summary_failed: usize,
}

impl BatchStats {
    /// Jobs processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.empty + self.failed
    }
}

/// Drains the tagging job queue with bounded concurrency.
#[derive(Debug)]
pub struct TaggingWorker {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    tagger: Arc<Tagger>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl TaggingWorker {
    /// Creates a worker running at most `concurrency` jobs at once.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConcurrency`] if the value is outside
    /// 1-32.
    #[instrument(level = "debug", skip(tagger))]
    pub fn new(concurrency: usize, tagger: Tagger) -> Result<Self, WorkerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(WorkerError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_tags = tagger.config().max_tags(),
            language = tagger.config().language(),
            "creating tagging worker"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            tagger: Arc::new(tagger),
            summarizer: None,
        })
    }

    /// Runs `summarizer` after each tagging job.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Processes every pending job, returning when the queue is empty and
    /// all spawned jobs have finished.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Queue`] if claiming a job fails, or
    /// [`WorkerError::SemaphoreClosed`]. Individual job failures are recorded
    /// in the queue and counted, never returned.
    #[instrument(skip(self, queue, papers, tags), fields(concurrency = self.concurrency))]
    pub async fn process_queue(
        &self,
        queue: &TagJobQueue,
        papers: &Papers,
        tags: &SqliteTagStore,
    ) -> Result<BatchStats, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let mut handles = Vec::new();

        info!("starting tagging queue");

        loop {
            // Claim only once a slot is free so waiting jobs stay pending for
            // other workers.
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::SemaphoreClosed)?;

            let Some(job) = queue.dequeue().await? else {
                break;
            };
            debug!(job_id = job.id, paper_id = job.paper_id, attempt = job.attempts, "claimed job");

            let job_ctx = JobContext {
                queue: queue.clone(),
                papers: papers.clone(),
                tags: tags.clone(),
                tagger: Arc::clone(&self.tagger),
                summarizer: self.summarizer.clone(),
                stats: Arc::clone(&stats),
            };

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                job_ctx.run(job).await;
            }));
        }

        debug!(task_count = handles.len(), "waiting for tagging jobs");

        for handle in handles {
            // A panicking job must not take the batch down with it.
            if let Err(e) = handle.await {
                warn!(error = %e, "tagging task panicked");
            }
        }

        let totals = stats.snapshot();
        info!(
            completed = totals.completed,
            empty = totals.empty,
            failed = totals.failed,
            tags_added = totals.tags_added,
            summarized = totals.summarized,
            "tagging queue drained"
        );
        Ok(totals)
    }
}

/// Everything one spawned job needs.
struct JobContext {
    queue: TagJobQueue,
    papers: Papers,
    tags: SqliteTagStore,
    tagger: Arc<Tagger>,
    summarizer: Option<Arc<dyn Summarizer>>,
    stats: Arc<WorkerStats>,
}

impl JobContext {
    #[instrument(skip(self, job), fields(job_id = job.id, paper_id = job.paper_id))]
    async fn run(&self, job: TagJob) {
        let paper = match self.papers.get(job.paper_id).await {
            Ok(paper) => paper,
            Err(err) => {
                warn!(error = %err, "paper lookup failed");
                self.fail(&job, 0, &err.to_string()).await;
                return;
            }
        };

        let source = PdfDocument::open(&paper.path());
        let tagged = self.tagger.tag_document(paper.id, &source, &self.tags).await;
        self.record(&job, &tagged.report).await;

        match (&self.summarizer, paper.summary_status()) {
            (_, SummaryStatus::Ready) => {}
            (Some(summarizer), _) => {
                self.summarize(&paper, summarizer.as_ref(), tagged.text.as_ref(), &tagged.report)
                    .await;
            }
            (None, SummaryStatus::Pending) => {
                self.set_summary(&paper, SummaryStatus::Disabled, None).await;
            }
            (None, _) => {}
        }
    }

    /// Writes the tagging outcome back to the queue.
    async fn record(&self, job: &TagJob, report: &TaggingReport) {
        let tags_added = report.tags_added.len();
        WorkerStats::bump(&self.stats.tags_added, tags_added);
        #[allow(clippy::cast_possible_wrap)]
        let tags_added_i64 = tags_added as i64;

        match report.reason {
            None => {
                WorkerStats::bump(&self.stats.completed, 1);
                if let Err(e) = self.queue.mark_completed(job.id, tags_added_i64, None).await {
                    warn!(job_id = job.id, error = %e, "failed to mark job completed");
                }
            }
            Some(TaggingReason::NoExtractableText) => {
                WorkerStats::bump(&self.stats.empty, 1);
                let code = TaggingReason::NoExtractableText.as_str();
                if let Err(e) = self.queue.mark_completed(job.id, 0, Some(code)).await {
                    warn!(job_id = job.id, error = %e, "failed to mark job completed");
                }
            }
            Some(reason) => {
                if reason.is_retryable() {
                    info!(job_id = job.id, reason = %reason, "job failed, `papertag retry` may succeed");
                } else {
                    warn!(job_id = job.id, reason = %reason, "job failed, the document needs attention");
                }
                self.fail(job, tags_added_i64, reason.as_str()).await;
            }
        }
    }

    async fn fail(&self, job: &TagJob, tags_added: i64, reason: &str) {
        WorkerStats::bump(&self.stats.failed, 1);
        if let Err(e) = self.queue.mark_failed(job.id, tags_added, reason).await {
            warn!(job_id = job.id, error = %e, "failed to mark job failed");
        }
    }

    /// Produces the paper's summary and merges suggested tags.
    ///
    /// A failed summary leaves the paper pending with the error recorded;
    /// a paper with no text is marked failed.
    async fn summarize(
        &self,
        paper: &Paper,
        summarizer: &dyn Summarizer,
        text: Option<&ExtractedText>,
        report: &TaggingReport,
    ) {
        let Some(text) = text else {
            let detail = report.detail.as_deref().unwrap_or("document unreadable");
            self.summary_failed(paper, SummaryStatus::Pending, detail).await;
            return;
        };
        if text.is_blank() {
            self.summary_failed(paper, SummaryStatus::Failed, NO_TEXT_MESSAGE)
                .await;
            return;
        }

        let summary = match summarizer.summarize(&text.text).await {
            Ok(summary) => summary,
            Err(SummaryError::EmptyInput) => {
                self.summary_failed(paper, SummaryStatus::Failed, NO_TEXT_MESSAGE)
                    .await;
                return;
            }
            Err(err) => {
                WorkerStats::bump(&self.stats.summary_failed, 1);
                if err.is_transient() {
                    warn!(paper_id = paper.id, error = %err, "summary service unavailable, a later run will ask again");
                } else {
                    warn!(
                        paper_id = paper.id,
                        error = %err,
                        summarizer = summarizer.name(),
                        "summary request rejected, check the summarizer settings"
                    );
                }
                self.set_summary(paper, SummaryStatus::Pending, Some(&err.to_string()))
                    .await;
                return;
            }
        };

        if let Err(e) = self.papers.store_summary(paper.id, &summary.report).await {
            warn!(paper_id = paper.id, error = %e, "failed to store summary");
            WorkerStats::bump(&self.stats.summary_failed, 1);
            return;
        }
        WorkerStats::bump(&self.stats.summarized, 1);

        let suggested = normalize_tag_names(summary.suggested_tags);
        match self
            .tagger
            .selector()
            .select(paper.id, suggested.iter().map(String::as_str), &self.tags)
            .await
        {
            Ok(selection) => {
                WorkerStats::bump(&self.stats.tags_added, selection.newly_associated);
                debug!(
                    paper_id = paper.id,
                    suggested = suggested.len(),
                    added = selection.newly_associated,
                    summarizer = summarizer.name(),
                    "merged suggested tags"
                );
            }
            Err(e) => warn!(paper_id = paper.id, error = %e, "failed to merge suggested tags"),
        }
    }

    async fn summary_failed(&self, paper: &Paper, status: SummaryStatus, message: &str) {
        WorkerStats::bump(&self.stats.summary_failed, 1);
        warn!(paper_id = paper.id, status = %status, error = message, "summary not produced");
        self.set_summary(paper, status, Some(message)).await;
    }

    async fn set_summary(&self, paper: &Paper, status: SummaryStatus, message: Option<&str>) {
        if let Err(e) = self
            .papers
            .set_summary_status(paper.id, status, message)
            .await
        {
            warn!(paper_id = paper.id, error = %e, "failed to update summary status");
        }
    }
}
