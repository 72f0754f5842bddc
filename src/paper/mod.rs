//! Registry of uploaded papers.
//!
//! Holds only what tagging and summarizing touch: title, file location,
//! the AI-written report and its status.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row};
use thiserror::Error;
use tracing::instrument;

use crate::db::{Database, DbErrorKind};
use crate::tags::DocumentId;

/// Errors raised by the paper registry.
#[derive(Debug, Clone, Error)]
pub enum PaperError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification of the failure.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// No paper has this id.
    #[error("paper not found: id {0}\n  Suggestion: List papers with `papertag papers --tag NAME`")]
    NotFound(DocumentId),

    /// The title is blank after trimming.
    #[error("paper title must not be empty")]
    EmptyTitle,
}

impl From<sqlx::Error> for PaperError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

/// Result type for paper registry operations.
pub type Result<T> = std::result::Result<T, PaperError>;

/// Where a paper's AI summary stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    /// Not produced yet, or the last attempt failed transiently.
    Pending,
    /// `article_content` holds the report.
    Ready,
    /// Cannot be produced for this paper (no text).
    Failed,
    /// Summaries are turned off for this deployment.
    Disabled,
}

impl SummaryStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SummaryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            "disabled" => Ok(Self::Disabled),
            _ => Err(format!("invalid summary status: {s}")),
        }
    }
}

/// One row of `papers`.
#[derive(Debug, Clone, FromRow)]
pub struct Paper {
    /// Row id, also the document id tags attach to.
    pub id: DocumentId,
    /// Display title, never blank.
    pub title: String,
    /// Location of the uploaded PDF.
    pub file_path: String,
    /// AI-written report, once ready.
    pub article_content: Option<String>,
    /// Raw summary status; use [`Paper::summary_status`].
    #[sqlx(rename = "summary_status")]
    pub summary_status_str: String,
    /// Last summary failure, if any.
    pub summary_error: Option<String>,
    /// When the paper was registered (`SQLite` `datetime('now')`).
    pub created_at: String,
    /// When the row last changed.
    pub updated_at: String,
}

impl Paper {
    /// Parsed summary status; unknown values read as `Pending`.
    #[must_use]
    pub fn summary_status(&self) -> SummaryStatus {
        self.summary_status_str
            .parse()
            .unwrap_or(SummaryStatus::Pending)
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.file_path)
    }
}

/// Paper registry over the `papers` table.
#[derive(Debug, Clone)]
pub struct Papers {
    db: Database,
}

impl Papers {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers an uploaded paper and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`PaperError::EmptyTitle`] for a blank title, or
    /// [`PaperError::Database`] if the insert fails.
    #[instrument(skip(self))]
    pub async fn register(&self, title: &str, file_path: &str) -> Result<DocumentId> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PaperError::EmptyTitle);
        }

        let row = sqlx::query(
            r"INSERT INTO papers (title, file_path, summary_status)
              VALUES (?, ?, ?)
              RETURNING id",
        )
        .bind(title)
        .bind(file_path)
        .bind(SummaryStatus::Pending.as_str())
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.get("id"))
    }

    /// Fetches a paper by id.
    ///
    /// # Errors
    ///
    /// Returns [`PaperError::NotFound`] if there is no such paper.
    #[instrument(skip(self))]
    pub async fn get(&self, id: DocumentId) -> Result<Paper> {
        sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(PaperError::NotFound(id))
    }

    /// Papers with the given ids, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`PaperError::Database`] if a query fails.
    pub async fn get_many(&self, ids: &[DocumentId]) -> Result<Vec<Paper>> {
        let mut papers = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(*id).await {
                Ok(paper) => papers.push(paper),
                Err(PaperError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        papers.sort_by_key(|p| p.id);
        Ok(papers)
    }

    /// Ids of papers whose summary is still to be produced (`pending` or
    /// `disabled`), in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`PaperError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn awaiting_summary(&self) -> Result<Vec<DocumentId>> {
        let ids: Vec<(DocumentId,)> = sqlx::query_as(
            "SELECT id FROM papers WHERE summary_status IN (?, ?) ORDER BY id",
        )
        .bind(SummaryStatus::Pending.as_str())
        .bind(SummaryStatus::Disabled.as_str())
        .fetch_all(self.db.pool())
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Stores a finished report and marks the summary ready.
    ///
    /// # Errors
    ///
    /// Returns [`PaperError::NotFound`] if there is no such paper.
    #[instrument(skip(self, report), fields(len = report.len()))]
    pub async fn store_summary(&self, id: DocumentId, report: &str) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE papers
              SET article_content = ?, summary_status = ?, summary_error = NULL,
                  updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(report)
        .bind(SummaryStatus::Ready.as_str())
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_found(id, result.rows_affected())
    }

    /// Sets the summary status and error text.
    ///
    /// # Errors
    ///
    /// Returns [`PaperError::NotFound`] if there is no such paper.
    #[instrument(skip(self))]
    pub async fn set_summary_status(
        &self,
        id: DocumentId,
        status: SummaryStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE papers
              SET summary_status = ?, summary_error = ?, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_found(id, result.rows_affected())
    }
}

fn check_found(id: DocumentId, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(PaperError::NotFound(id))
    } else {
        Ok(())
    }
}
