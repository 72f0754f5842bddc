//! In-process tag vocabulary.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use super::{DocumentId, Tag, TagError, TagId, TagSink};
use crate::topics::normalize_tag_name;

/// Tag store held in memory.
///
/// `DashMap::entry` holds the shard lock while inserting, so two callers
/// racing on the same new name still get one id.
#[derive(Debug)]
pub struct MemoryTagStore {
    by_name: DashMap<String, TagId>,
    links: DashSet<(DocumentId, TagId)>,
    next_id: AtomicI64,
}

impl Default for MemoryTagStore {
    fn default() -> Self {
        Self {
            by_name: DashMap::new(),
            links: DashSet::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryTagStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct tags.
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.by_name.len()
    }

    /// Tags linked to a document, ordered by name.
    #[must_use]
    pub fn tags_for(&self, document_id: DocumentId) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .by_name
            .iter()
            .filter(|entry| self.links.contains(&(document_id, *entry.value())))
            .map(|entry| Tag {
                id: *entry.value(),
                name: entry.key().clone(),
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    /// Number of links recorded for a document.
    #[must_use]
    pub fn association_count(&self, document_id: DocumentId) -> usize {
        self.links
            .iter()
            .filter(|link| link.key().0 == document_id)
            .count()
    }
}

#[async_trait]
impl TagSink for MemoryTagStore {
    async fn get_or_create_tag(&self, name: &str) -> Result<TagId, TagError> {
        let normalized =
            normalize_tag_name(name).ok_or_else(|| TagError::InvalidName(name.to_string()))?;
        let id = *self
            .by_name
            .entry(normalized)
            .or_insert_with(|| TagId(self.next_id.fetch_add(1, Ordering::SeqCst)));
        Ok(id)
    }

    async fn associate(&self, document_id: DocumentId, tag_id: TagId) -> Result<bool, TagError> {
        Ok(self.links.insert((document_id, tag_id)))
    }
}
