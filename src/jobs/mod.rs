//! Persisted queue of tagging jobs.
//!
//! Each job asks for one paper to be run through the tagging pipeline. Jobs
//! move `pending → in_progress → completed/failed`; failed jobs (retryable
//! reasons such as a missing stopword corpus) can be requeued in bulk. A
//! paper has at most one pending or in-progress job at a time.
//!
//! # Example
//!
//! ```ignore
//! let queue = TagJobQueue::new(db.clone());
//! let job_id = queue.enqueue(paper_id).await?;
//!
//! if let Some(job) = queue.dequeue().await? {
//!     // ... run the tagger ...
//!     queue.mark_completed(job.id, 3, None).await?;
//! }
//! ```

mod error;
mod item;

pub use error::QueueError;
pub use item::{JobStatus, TagJob};

use std::time::Duration;

use sqlx::Row;
use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for job queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Returns `Ok(())` if at least one row was affected; otherwise [`QueueError::JobNotFound`].
fn check_affected(id: i64, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(QueueError::JobNotFound(id))
    } else {
        Ok(())
    }
}

/// `SQLite`-backed tagging job queue.
#[derive(Debug, Clone)]
pub struct TagJobQueue {
    db: Database,
}

impl TagJobQueue {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Adds a pending job for `paper_id`.
    ///
    /// If the paper already has a pending or in-progress job, that job's id
    /// is returned instead of adding a second one. The partial unique index
    /// `idx_tag_jobs_active_paper` makes this hold for concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::UnknownPaper`] if the paper does not exist, or
    /// [`QueueError::Database`] if the insert fails.
    #[instrument(skip(self))]
    pub async fn enqueue(&self, paper_id: i64) -> Result<i64> {
        loop {
            let inserted = sqlx::query(
                r"INSERT INTO tag_jobs (paper_id, status)
                  VALUES (?, ?)
                  ON CONFLICT DO NOTHING
                  RETURNING id",
            )
            .bind(paper_id)
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(self.db.pool())
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                    QueueError::UnknownPaper(paper_id)
                }
                _ => QueueError::from(err),
            })?;

            if let Some(row) = inserted {
                return Ok(row.get("id"));
            }

            if let Some(id) = self.active_job(paper_id).await? {
                debug!(job_id = id, "paper already has an active job");
                return Ok(id);
            }
            // The active job finished between the two statements.
            debug!("active job finished during enqueue, inserting again");
        }
    }

    async fn active_job(&self, paper_id: i64) -> Result<Option<i64>> {
        let active: Option<(i64,)> = sqlx::query_as(
            r"SELECT id FROM tag_jobs
              WHERE paper_id = ? AND status IN (?, ?)",
        )
        .bind(paper_id)
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::InProgress.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(active.map(|(id,)| id))
    }

    /// Claims the oldest pending job.
    ///
    /// The claim is a single `UPDATE ... RETURNING`, so two workers never get
    /// the same job. Returns `None` when nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn dequeue(&self) -> Result<Option<TagJob>> {
        let job = sqlx::query_as::<_, TagJob>(
            r"UPDATE tag_jobs
              SET status = ?, attempts = attempts + 1, updated_at = datetime('now')
              WHERE id = (
                  SELECT id FROM tag_jobs
                  WHERE status = ?
                  ORDER BY created_at ASC, id ASC
                  LIMIT 1
              )
              RETURNING *",
        )
        .bind(JobStatus::InProgress.as_str())
        .bind(JobStatus::Pending.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(job)
    }

    /// Marks a job completed, recording how many tags it attached and the
    /// reason code when it attached none.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::JobNotFound`] if no job exists with the given ID.
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_completed(&self, id: i64, tags_added: i64, reason: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE tag_jobs
              SET status = ?, tags_added = ?, last_reason = ?, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(JobStatus::Completed.as_str())
        .bind(tags_added)
        .bind(reason)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_affected(id, result.rows_affected())
    }

    /// Marks a job failed with a reason code or error text.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::JobNotFound`] if no job exists with the given ID.
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self), fields(reason = %reason))]
    pub async fn mark_failed(&self, id: i64, tags_added: i64, reason: &str) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE tag_jobs
              SET status = ?, tags_added = ?, last_reason = ?, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(JobStatus::Failed.as_str())
        .bind(tags_added)
        .bind(reason)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_affected(id, result.rows_affected())
    }

    /// Returns failed jobs to pending. Returns how many were requeued.
    ///
    /// Only the newest failed job of each paper is requeued, and papers that
    /// already have a pending or in-progress job are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn requeue_failed(&self) -> Result<u64> {
        let result = sqlx::query(
            r"UPDATE tag_jobs
              SET status = ?1, updated_at = datetime('now')
              WHERE id IN (
                  SELECT MAX(id) FROM tag_jobs WHERE status = ?2 GROUP BY paper_id
              )
              AND paper_id NOT IN (
                  SELECT paper_id FROM tag_jobs WHERE status IN (?1, ?3)
              )",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::Failed.as_str())
        .bind(JobStatus::InProgress.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Resets `in_progress` jobs untouched for at least `older_than` back to
    /// pending, recovering work claimed by a worker that died. Returns how
    /// many were reset.
    ///
    /// Jobs claimed more recently are left alone so a second process can
    /// start while another is still draining the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self), fields(older_than_secs = older_than.as_secs()))]
    pub async fn reset_stale_in_progress(&self, older_than: Duration) -> Result<u64> {
        let result = sqlx::query(
            r"UPDATE tag_jobs
              SET status = ?, updated_at = datetime('now')
              WHERE status = ? AND updated_at <= datetime('now', ?)",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::InProgress.as_str())
        .bind(format!("-{} seconds", older_than.as_secs()))
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Gets a job by ID.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<TagJob>> {
        let job = sqlx::query_as::<_, TagJob>(r"SELECT * FROM tag_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(job)
    }

    /// Counts jobs by status.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let result = sqlx::query(r"SELECT COUNT(*) as count FROM tag_jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(self.db.pool())
            .await?;

        Ok(result.get("count"))
    }

    /// Lists jobs with the given status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_by_status(&self, status: JobStatus) -> Result<Vec<TagJob>> {
        let jobs = sqlx::query_as::<_, TagJob>(
            r"SELECT * FROM tag_jobs
              WHERE status = ?
              ORDER BY created_at ASC, id ASC",
        )
        .bind(status.as_str())
        .fetch_all(self.db.pool())
        .await?;

        Ok(jobs)
    }
}
