//! Applies ranked terms to a document as tags.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::{DocumentId, TagError, TagId, TagSink};
use crate::topics::normalize_tag_name;

/// Default cap on tags attached per run.
pub const DEFAULT_MAX_TAGS: usize = 10;

/// Default attempts for a conflicting tag write (including the first).
const DEFAULT_CONFLICT_ATTEMPTS: u32 = 3;

/// Default base delay before the first conflict retry.
const DEFAULT_CONFLICT_BASE_DELAY: Duration = Duration::from_millis(20);

/// Maximum jitter added to conflict retry delays.
const MAX_CONFLICT_JITTER: Duration = Duration::from_millis(20);

/// Bounded retry for tag writes that lose a race with another writer.
#[derive(Debug, Clone)]
pub struct ConflictRetry {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CONFLICT_ATTEMPTS,
            base_delay: DEFAULT_CONFLICT_BASE_DELAY,
        }
    }
}

impl ConflictRetry {
    /// Creates a retry policy; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Attempts allowed, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retrying after `attempt` failed (1-indexed): the base
    /// delay doubled per attempt, plus jitter.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let jitter_ms = rand::thread_rng().gen_range(0..=MAX_CONFLICT_JITTER.as_millis() as u64);
        backoff + Duration::from_millis(jitter_ms)
    }

    /// Runs `op`, retrying while it fails with a retryable conflict.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Conflict`] once attempts are exhausted, or the
    /// first non-conflict error unchanged.
    pub async fn run<T, F, Fut>(&self, name: &str, mut op: F) -> Result<T, TagError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TagError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable_conflict() => {
                    if attempt >= self.max_attempts {
                        warn!(tag = name, attempts = attempt, error = %err, "tag write kept conflicting");
                        return Err(TagError::Conflict {
                            name: name.to_string(),
                            attempts: attempt,
                        });
                    }
                    let delay = self.delay_for(attempt);
                    debug!(tag = name, attempt, delay_ms = delay.as_millis(), "retrying conflicting tag write");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Tags attached by one selection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Tag ids in rank order.
    pub tag_ids: Vec<TagId>,
    /// Normalized names, parallel to `tag_ids`.
    pub names: Vec<String>,
    /// How many of the links did not exist before.
    pub newly_associated: usize,
}

impl Selection {
    /// Number of tags attached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tag_ids.len()
    }

    /// Returns true when nothing was attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tag_ids.is_empty()
    }
}

/// Takes the top K names and attaches them to a document.
#[derive(Debug, Clone)]
pub struct TagSelector {
    max_tags: usize,
    retry: ConflictRetry,
}

impl Default for TagSelector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TAGS)
    }
}

impl TagSelector {
    /// Creates a selector attaching at most `max_tags` tags per pass.
    #[must_use]
    pub fn new(max_tags: usize) -> Self {
        Self {
            max_tags,
            retry: ConflictRetry::default(),
        }
    }

    /// Replaces the conflict retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: ConflictRetry) -> Self {
        self.retry = retry;
        self
    }

    /// The tag cap.
    #[must_use]
    pub fn max_tags(&self) -> usize {
        self.max_tags
    }

    /// Attaches the first `max_tags` distinct names to `document_id`.
    ///
    /// # Errors
    ///
    /// Returns the first [`TagError`] that survives retrying.
    pub async fn select<'a>(
        &self,
        document_id: DocumentId,
        names: impl IntoIterator<Item = &'a str>,
        sink: &dyn TagSink,
    ) -> Result<Selection, TagError> {
        let mut selection = Selection::default();
        self.select_into(document_id, names, sink, &mut selection)
            .await?;
        Ok(selection)
    }

    /// Like [`select`](Self::select), but records progress in `selection` so
    /// the caller still sees what was attached before a failure.
    ///
    /// Names are normalized and deduplicated before the cap is applied;
    /// blank names are skipped. A tag is only created once its name has
    /// made the cut.
    ///
    /// # Errors
    ///
    /// Returns the first [`TagError`] that survives retrying.
    #[instrument(skip(self, names, sink, selection), fields(max_tags = self.max_tags))]
    pub async fn select_into<'a>(
        &self,
        document_id: DocumentId,
        names: impl IntoIterator<Item = &'a str>,
        sink: &dyn TagSink,
        selection: &mut Selection,
    ) -> Result<(), TagError> {
        let mut seen: HashSet<String> = selection.names.iter().cloned().collect();
        let chosen: Vec<String> = names
            .into_iter()
            .filter_map(normalize_tag_name)
            .filter(|name| seen.insert(name.clone()))
            .take(self.max_tags.saturating_sub(selection.len()))
            .collect();

        for name in chosen {
            let tag_id = self
                .retry
                .run(&name, || sink.get_or_create_tag(&name))
                .await?;
            let created_link = self
                .retry
                .run(&name, || sink.associate(document_id, tag_id))
                .await?;

            if created_link {
                selection.newly_associated += 1;
            }
            selection.tag_ids.push(tag_id);
            selection.names.push(name);
        }

        debug!(
            document_id,
            tags = selection.len(),
            newly_associated = selection.newly_associated,
            "tags selected"
        );
        Ok(())
    }
}
