//! Integration tests for draining the tagging queue.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use papertag_core::jobs::{JobStatus, TagJobQueue};
use papertag_core::paper::{Papers, SummaryStatus};
use papertag_core::pipeline::{Tagger, TaggingConfig, TaggingReason};
use papertag_core::summary::{Summarizer, Summary, SummaryError};
use papertag_core::tags::SqliteTagStore;
use papertag_core::worker::TaggingWorker;
use papertag_core::Database;
use tempfile::TempDir;

use support::{small_stopwords, write_pdf};

struct Fixture {
    dir: TempDir,
    papers: Papers,
    queue: TagJobQueue,
    tags: SqliteTagStore,
}

impl Fixture {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("papertag.db")).await.unwrap();
        Self {
            dir,
            papers: Papers::new(db.clone()),
            queue: TagJobQueue::new(db.clone()),
            tags: SqliteTagStore::new(db),
        }
    }

    /// Registers a paper backed by a generated PDF and queues it.
    async fn add(&self, name: &str, pages: &[&str]) -> (i64, i64) {
        let path = write_pdf(self.dir.path(), name, pages);
        let paper_id = self
            .papers
            .register(name, &path.to_string_lossy())
            .await
            .unwrap();
        let job_id = self.queue.enqueue(paper_id).await.unwrap();
        (paper_id, job_id)
    }

    async fn drain(&self, worker: &TaggingWorker) -> papertag_core::BatchStats {
        worker
            .process_queue(&self.queue, &self.papers, &self.tags)
            .await
            .unwrap()
    }

    async fn tag_names(&self, paper_id: i64) -> Vec<String> {
        self.tags
            .tags_for(paper_id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect()
    }
}

fn worker(concurrency: usize) -> TaggingWorker {
    let config = TaggingConfig::builder().max_tags(3).build().unwrap();
    TaggingWorker::new(concurrency, Tagger::new(config, small_stopwords())).unwrap()
}

/// Returns a fixed summary and counts calls.
struct Canned {
    calls: AtomicUsize,
    result: fn() -> Result<Summary, SummaryError>,
}

impl Canned {
    fn new(result: fn() -> Result<Summary, SummaryError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result,
        })
    }
}

#[async_trait]
impl Summarizer for Canned {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn summarize(&self, _text: &str) -> Result<Summary, SummaryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.result)()
    }
}

#[tokio::test]
async fn test_worker_tags_every_queued_paper() {
    let fx = Fixture::new().await;
    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(
            fx.add(
                &format!("p{i}.pdf"),
                &["Sparse attention sparse kernels sparse attention memory"],
            )
            .await,
        );
    }

    let stats = fx.drain(&worker(3)).await;

    assert_eq!(stats.completed, 6);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.tags_added, 18);
    for (paper_id, job_id) in ids {
        assert_eq!(
            fx.tag_names(paper_id).await,
            vec!["attention", "kernels", "sparse"]
        );
        let job = fx.queue.get(job_id).await.unwrap().unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.tags_added, 3);
        assert_eq!(job.attempts, 1);
    }
    assert_eq!(fx.queue.count_by_status(JobStatus::Pending).await.unwrap(), 0);
}

#[tokio::test]
async fn test_worker_records_empty_and_unreadable_papers() {
    let fx = Fixture::new().await;
    let (_, empty_job) = fx.add("scan.pdf", &[""]).await;

    let broken_path = fx.dir.path().join("broken.pdf");
    std::fs::write(&broken_path, b"not a pdf").unwrap();
    let broken_id = fx
        .papers
        .register("broken", &broken_path.to_string_lossy())
        .await
        .unwrap();
    let broken_job = fx.queue.enqueue(broken_id).await.unwrap();

    let stats = fx.drain(&worker(2)).await;

    assert_eq!(stats.empty, 1);
    assert_eq!(stats.failed, 1);

    let empty = fx.queue.get(empty_job).await.unwrap().unwrap();
    assert_eq!(empty.status(), JobStatus::Completed);
    assert_eq!(empty.reason(), Some(TaggingReason::NoExtractableText));

    let broken = fx.queue.get(broken_job).await.unwrap().unwrap();
    assert_eq!(broken.status(), JobStatus::Failed);
    assert_eq!(broken.reason(), Some(TaggingReason::DocumentUnreadable));
}

#[tokio::test]
async fn test_failed_job_succeeds_after_retry() {
    let fx = Fixture::new().await;
    let path = fx.dir.path().join("late.pdf");
    let paper_id = fx
        .papers
        .register("late", &path.to_string_lossy())
        .await
        .unwrap();
    let job_id = fx.queue.enqueue(paper_id).await.unwrap();
    let worker = worker(1);

    fx.drain(&worker).await;
    assert_eq!(
        fx.queue.get(job_id).await.unwrap().unwrap().status(),
        JobStatus::Failed
    );

    write_pdf(fx.dir.path(), "late.pdf", &["compiler passes compiler"]);
    assert_eq!(fx.queue.requeue_failed().await.unwrap(), 1);
    let stats = fx.drain(&worker).await;

    assert_eq!(stats.completed, 1);
    let job = fx.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.attempts, 2);
    assert_eq!(fx.tag_names(paper_id).await, vec!["compiler", "passes"]);
}

#[tokio::test]
async fn test_without_summarizer_summary_is_disabled() {
    let fx = Fixture::new().await;
    let (paper_id, _) = fx.add("a.pdf", &["quantum error correction"]).await;

    fx.drain(&worker(1)).await;

    let paper = fx.papers.get(paper_id).await.unwrap();
    assert_eq!(paper.summary_status(), SummaryStatus::Disabled);
    assert!(paper.article_content.is_none());
}

#[tokio::test]
async fn test_summary_is_stored_and_suggested_tags_merged() {
    let fx = Fixture::new().await;
    let (paper_id, _) = fx.add("a.pdf", &["quantum error correction quantum"]).await;
    let summarizer = Canned::new(|| {
        Ok(Summary {
            report: "Introduction.\nFindings.\nConclusion.".to_string(),
            suggested_tags: vec![" Quantum ".to_string(), "Surface Codes".to_string()],
        })
    });

    let stats = fx
        .drain(&worker(1).with_summarizer(summarizer.clone()))
        .await;

    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(stats.summarized, 1);
    let paper = fx.papers.get(paper_id).await.unwrap();
    assert_eq!(paper.summary_status(), SummaryStatus::Ready);
    assert_eq!(
        paper.article_content.as_deref(),
        Some("Introduction.\nFindings.\nConclusion.")
    );
    assert_eq!(
        fx.tag_names(paper_id).await,
        vec!["correction", "error", "quantum", "surface codes"]
    );
    assert_eq!(fx.tags.count_named("QUANTUM").await.unwrap(), 1);
}

#[tokio::test]
async fn test_summary_failure_leaves_tags_and_pending_status() {
    let fx = Fixture::new().await;
    let (paper_id, job_id) = fx.add("a.pdf", &["lattice crypto lattice"]).await;
    let summarizer = Canned::new(|| {
        Err(SummaryError::Status {
            status: 503,
            message: "overloaded".to_string(),
        })
    });

    let stats = fx.drain(&worker(1).with_summarizer(summarizer)).await;

    assert_eq!(stats.completed, 1);
    assert_eq!(stats.summary_failed, 1);
    assert_eq!(
        fx.queue.get(job_id).await.unwrap().unwrap().status(),
        JobStatus::Completed
    );
    assert_eq!(fx.tag_names(paper_id).await, vec!["crypto", "lattice"]);

    let paper = fx.papers.get(paper_id).await.unwrap();
    assert_eq!(paper.summary_status(), SummaryStatus::Pending);
    assert!(paper.summary_error.unwrap().contains("503"));
}

#[tokio::test]
async fn test_rejected_summary_is_retried_on_later_run() {
    let fx = Fixture::new().await;
    let (paper_id, _) = fx.add("a.pdf", &["tensor sketch tensor"]).await;
    let summarizer = Canned::new(|| Err(SummaryError::Malformed("missing report".to_string())));

    let stats = fx.drain(&worker(1).with_summarizer(summarizer)).await;

    assert_eq!(stats.completed, 1);
    assert_eq!(stats.summary_failed, 1);
    let paper = fx.papers.get(paper_id).await.unwrap();
    assert_eq!(paper.summary_status(), SummaryStatus::Pending);
    assert!(paper.summary_error.unwrap().contains("missing report"));
    assert_eq!(fx.papers.awaiting_summary().await.unwrap(), vec![paper_id]);
}

#[tokio::test]
async fn test_paper_without_text_is_never_sent_to_summarizer() {
    let fx = Fixture::new().await;
    let (paper_id, _) = fx.add("scan.pdf", &["", ""]).await;
    let summarizer = Canned::new(|| unreachable!("blank text must not be summarized"));

    fx.drain(&worker(1).with_summarizer(summarizer.clone()))
        .await;

    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    let paper = fx.papers.get(paper_id).await.unwrap();
    assert_eq!(paper.summary_status(), SummaryStatus::Failed);
    assert_eq!(
        paper.summary_error.as_deref(),
        Some(papertag_core::summary::NO_TEXT_MESSAGE)
    );
}

#[tokio::test]
async fn test_disabled_summary_is_produced_on_later_run() {
    let fx = Fixture::new().await;
    let (paper_id, _) = fx.add("a.pdf", &["protein folding protein"]).await;
    fx.drain(&worker(1)).await;
    assert_eq!(
        fx.papers.awaiting_summary().await.unwrap(),
        vec![paper_id]
    );

    let summarizer = Canned::new(|| {
        Ok(Summary {
            report: "Report.".to_string(),
            suggested_tags: Vec::new(),
        })
    });
    let worker = worker(1).with_summarizer(summarizer.clone());
    fx.queue.enqueue(paper_id).await.unwrap();
    fx.drain(&worker).await;

    assert_eq!(
        fx.papers.get(paper_id).await.unwrap().summary_status(),
        SummaryStatus::Ready
    );
    assert!(fx.papers.awaiting_summary().await.unwrap().is_empty());
    assert_eq!(fx.tag_names(paper_id).await, vec!["folding", "protein"]);

    // A ready summary is not requested again.
    fx.queue.enqueue(paper_id).await.unwrap();
    fx.drain(&worker).await;
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
}
