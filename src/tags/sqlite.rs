//! `SQLite`-backed tag vocabulary.

use async_trait::async_trait;
use sqlx::Row;
use tracing::{debug, instrument};

use super::{DocumentId, Tag, TagError, TagId, TagSink};
use crate::db::Database;
use crate::topics::normalize_tag_name;

/// Result type for tag store operations.
pub type Result<T> = std::result::Result<T, TagError>;

/// Tag store over the `tags` and `paper_tags` tables.
///
/// Name uniqueness is enforced by the schema; get-or-create is a single
/// upsert statement, so concurrent callers converge on one row.
#[derive(Debug, Clone)]
pub struct SqliteTagStore {
    db: Database,
}

impl SqliteTagStore {
    /// Creates a store over the given database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Looks up a tag by name (normalized before lookup).
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find(&self, name: &str) -> Result<Option<Tag>> {
        let Some(name) = normalize_tag_name(name) else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT id, name FROM tags WHERE name = ?")
            .bind(&name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(|row| tag_from_row(&row)))
    }

    /// Tags attached to a document, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn tags_for(&self, document_id: DocumentId) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r"SELECT t.id, t.name
              FROM tags t
              JOIN paper_tags pt ON pt.tag_id = t.id
              WHERE pt.paper_id = ?
              ORDER BY t.name",
        )
        .bind(document_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    /// Every tag in the vocabulary, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn all(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    /// Documents carrying the named tag, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn documents_with(&self, name: &str) -> Result<Vec<DocumentId>> {
        let Some(name) = normalize_tag_name(name) else {
            return Ok(Vec::new());
        };
        let ids: Vec<(i64,)> = sqlx::query_as(
            r"SELECT pt.paper_id
              FROM paper_tags pt
              JOIN tags t ON t.id = pt.tag_id
              WHERE t.name = ?
              ORDER BY pt.paper_id",
        )
        .bind(&name)
        .fetch_all(self.db.pool())
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Number of tags whose name equals `name` after normalization (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Database`] if the query fails.
    pub async fn count_named(&self, name: &str) -> Result<i64> {
        let name = normalize_tag_name(name).unwrap_or_default();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE name = ?")
            .bind(&name)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Number of associations recorded for a document.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Database`] if the query fails.
    pub async fn association_count(&self, document_id: DocumentId) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM paper_tags WHERE paper_id = ?")
                .bind(document_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }
}

fn tag_from_row(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: TagId(row.get("id")),
        name: row.get("name"),
    }
}

#[async_trait]
impl TagSink for SqliteTagStore {
    #[instrument(skip(self))]
    async fn get_or_create_tag(&self, name: &str) -> Result<TagId> {
        let normalized =
            normalize_tag_name(name).ok_or_else(|| TagError::InvalidName(name.to_string()))?;

        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            r"INSERT INTO tags (name) VALUES (?)
              ON CONFLICT(name) DO UPDATE SET name = excluded.name
              RETURNING id",
        )
        .bind(&normalized)
        .fetch_one(self.db.pool())
        .await?;

        let id = TagId(row.get("id"));
        debug!(tag = %normalized, id = %id, "resolved tag");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn associate(&self, document_id: DocumentId, tag_id: TagId) -> Result<bool> {
        let result = sqlx::query(
            r"INSERT INTO paper_tags (paper_id, tag_id) VALUES (?, ?)
              ON CONFLICT(paper_id, tag_id) DO NOTHING",
        )
        .bind(document_id)
        .bind(tag_id.0)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
