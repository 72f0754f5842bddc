//! Error types for tag storage.

use thiserror::Error;

use crate::db::DbErrorKind;

/// Errors that can occur while writing tags.
#[derive(Debug, Clone, Error)]
pub enum TagError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification used to decide on retries.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// The tag name is blank after normalization.
    #[error("invalid tag name {0:?}: empty after normalization")]
    InvalidName(String),

    /// Concurrent writers kept colliding on the same name.
    #[error("tag '{name}' still conflicting after {attempts} attempts")]
    Conflict {
        /// Normalized tag name.
        name: String,
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl From<sqlx::Error> for TagError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl TagError {
    /// Returns true for transient write contention worth retrying.
    #[must_use]
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, Self::Database { kind, .. } if kind.is_contention())
    }
}
