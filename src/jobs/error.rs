//! Error types for the tagging job queue.

use thiserror::Error;

use crate::db::DbErrorKind;

/// Errors that can occur during job queue operations.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification of the failure.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// No job with this id.
    #[error("tag job not found: id {0}\n  Suggestion: The job may have been removed or the ID is incorrect")]
    JobNotFound(i64),

    /// Enqueue referenced a paper that does not exist.
    #[error("paper {0} does not exist\n  Suggestion: Register the paper with `papertag add` first")]
    UnknownPaper(i64),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl QueueError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<DbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::JobNotFound(_) | Self::UnknownPaper(_) => None,
        }
    }

    /// Returns true when this error is a database busy/locked condition.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        self.database_kind() == Some(DbErrorKind::BusyOrLocked)
    }
}
