//! Error types for document text extraction.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that prevent a document from being read at all.
///
/// Per-page failures are not errors; those pages simply yield no text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The document container could not be parsed.
    #[error("document unreadable: {document}: {reason}")]
    Unreadable {
        /// Label of the document that failed.
        document: String,
        /// Parser message.
        reason: String,
    },

    /// The document file could not be read from disk.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// Creates an `Unreadable` error.
    #[must_use]
    pub fn unreadable(document: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreadable {
            document: document.into(),
            reason: reason.to_string(),
        }
    }
}
