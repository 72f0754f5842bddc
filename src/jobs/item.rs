//! Tag job rows and status definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::pipeline::TaggingReason;

/// Status of a tagging job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker.
    Pending,
    /// Claimed by a worker.
    InProgress,
    /// The pipeline ran to a terminal result that should not be retried.
    Completed,
    /// The pipeline aborted with a retryable reason.
    Failed,
}

impl JobStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::InProgress, Self::Completed, Self::Failed];
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid job status: {s}")),
        }
    }
}

/// One row of `tag_jobs`.
#[derive(Debug, Clone, FromRow)]
pub struct TagJob {
    pub id: i64,
    /// Paper to tag.
    pub paper_id: i64,
    /// Stored as text, parsed via `status()`.
    #[sqlx(rename = "status")]
    pub status_str: String,
    /// Times the job has been claimed.
    pub attempts: i64,
    /// Tags attached by the last run.
    pub tags_added: i64,
    /// Reason code (or error text) from the last run.
    pub last_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TagJob {
    /// Returns the parsed status enum.
    ///
    /// Falls back to `Pending` if the status string is invalid.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status_str.parse().unwrap_or(JobStatus::Pending)
    }

    /// Parses `last_reason` as a reason code, if it is one.
    #[must_use]
    pub fn reason(&self) -> Option<TaggingReason> {
        self.last_reason.as_deref().and_then(|r| r.parse().ok())
    }
}

impl fmt::Display for TagJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TagJob {{ id: {}, paper: {}, status: {} }}",
            self.id,
            self.paper_id,
            self.status()
        )
    }
}
