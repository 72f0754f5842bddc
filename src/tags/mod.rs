//! Global tag vocabulary and document–tag associations.
//!
//! Callers never touch tag rows directly. They go through a [`TagSink`],
//! which exposes exactly two operations: get-or-create a tag by normalized
//! name, and associate a tag with a document. Both are idempotent.
//!
//! - [`SqliteTagStore`] - persistent store backed by a `UNIQUE` name column
//! - [`MemoryTagStore`] - in-process store for tests and dry runs
//! - [`TagSelector`] - applies a ranked term list to a document, capped at K

mod error;
mod memory;
mod selector;
mod sqlite;

pub use error::TagError;
pub use memory::MemoryTagStore;
pub use selector::{ConflictRetry, DEFAULT_MAX_TAGS, Selection, TagSelector};
pub use sqlite::SqliteTagStore;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier of a document owned by the storage collaborator.
pub type DocumentId = i64;

/// Identifier of a tag in the global vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub i64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tag row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag id.
    pub id: TagId,
    /// Normalized name.
    pub name: String,
}

/// Capability for writing tags: get-or-create by name, then associate.
#[async_trait]
pub trait TagSink: Send + Sync {
    /// Returns the tag named `name`, creating it if absent.
    ///
    /// The name is normalized (trimmed, lower-cased) by the sink, so names
    /// differing only by case or surrounding whitespace resolve to one tag.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::InvalidName`] for blank names and
    /// [`TagError::Database`] for storage failures.
    async fn get_or_create_tag(&self, name: &str) -> Result<TagId, TagError>;

    /// Links `tag_id` to `document_id`. Returns true if the link is new.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Database`] for storage failures.
    async fn associate(&self, document_id: DocumentId, tag_id: TagId) -> Result<bool, TagError>;
}
