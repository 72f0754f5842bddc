//! Stopword sets, their sources, and the process-wide cache.
//!
//! A [`StopwordSource`] knows how to produce the word list for a language.
//! [`StopwordCache`] loads each language at most once per process and hands
//! out shared, immutable [`StopwordSet`]s. If a load fails, the source gets
//! one chance to initialize itself (e.g. materialize a corpus on disk) before
//! the load is retried; a second failure is reported as
//! [`StopwordError::Unavailable`] and the language stays unloaded so a later
//! call may try again.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use stop_words::LANGUAGE;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Language used when none is configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Errors raised while loading stopwords.
#[derive(Debug, Error)]
pub enum StopwordError {
    /// No stopword list exists for the language.
    #[error("no stopword list for language '{0}'")]
    UnsupportedLanguage(String),

    /// A stopword file could not be read or written.
    #[error("IO error on stopword file {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Loading failed again after initialization.
    #[error("stopword corpus unavailable for '{language}': {reason}")]
    Unavailable {
        /// Requested language.
        language: String,
        /// Last failure.
        reason: String,
    },
}

/// An immutable set of stopwords for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopwordSet {
    language: String,
    words: HashSet<String>,
}

impl StopwordSet {
    /// Builds a set; words are trimmed and lower-cased, blanks are dropped.
    #[must_use]
    pub fn new<I, S>(language: &str, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            language: language.to_string(),
            words,
        }
    }

    /// Language tag this set belongs to.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Returns true when `term` is a stopword. Terms are expected lower-case.
    #[must_use]
    pub fn contains(&self, term: &str) -> bool {
        self.words.contains(term)
    }

    /// Number of stopwords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true for an empty set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Drops stopwords from a token stream.
    pub fn filter<'a>(
        &'a self,
        tokens: impl Iterator<Item = &'a str>,
    ) -> impl Iterator<Item = &'a str> {
        tokens.filter(move |token| !self.contains(token))
    }
}

/// Produces the stopword list for a language.
pub trait StopwordSource: Send + Sync + fmt::Debug {
    /// Loads the word list for `language`.
    ///
    /// # Errors
    ///
    /// Returns [`StopwordError`] if the list is missing or unreadable.
    fn load(&self, language: &str) -> Result<Vec<String>, StopwordError>;

    /// One-time setup run after a failed [`load`](Self::load).
    ///
    /// # Errors
    ///
    /// Returns [`StopwordError`] if setup itself fails.
    fn initialize(&self, _language: &str) -> Result<(), StopwordError> {
        Ok(())
    }
}

/// Stopword lists compiled into the binary by the `stop-words` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledStopwords;

impl BundledStopwords {
    fn language(code: &str) -> Option<LANGUAGE> {
        match code {
            "en" | "english" => Some(LANGUAGE::English),
            "fr" | "french" => Some(LANGUAGE::French),
            "de" | "german" => Some(LANGUAGE::German),
            "es" | "spanish" => Some(LANGUAGE::Spanish),
            "it" | "italian" => Some(LANGUAGE::Italian),
            "pt" | "portuguese" => Some(LANGUAGE::Portuguese),
            "nl" | "dutch" => Some(LANGUAGE::Dutch),
            _ => None,
        }
    }

    /// Returns true when a bundled list exists for `code`.
    #[must_use]
    pub fn supports(code: &str) -> bool {
        Self::language(code).is_some()
    }
}

impl StopwordSource for BundledStopwords {
    fn load(&self, language: &str) -> Result<Vec<String>, StopwordError> {
        let lang = Self::language(language)
            .ok_or_else(|| StopwordError::UnsupportedLanguage(language.to_string()))?;
        Ok(stop_words::get(lang)
            .into_iter()
            .map(|word| word.to_string())
            .collect())
    }
}

/// Stopword lists stored as `<dir>/<language>.txt`, one word per line.
///
/// When a seed source is attached, a missing file is written from the seed
/// during [`StopwordSource::initialize`].
#[derive(Debug)]
pub struct FileStopwords {
    dir: PathBuf,
    seed: Option<Box<dyn StopwordSource>>,
}

impl FileStopwords {
    /// Reads lists from `dir` with no fallback.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seed: None,
        }
    }

    /// Reads lists from `dir`, materializing missing ones from `seed`.
    #[must_use]
    pub fn with_seed(dir: impl Into<PathBuf>, seed: Box<dyn StopwordSource>) -> Self {
        Self {
            dir: dir.into(),
            seed: Some(seed),
        }
    }

    fn path_for(&self, language: &str) -> PathBuf {
        self.dir.join(format!("{language}.txt"))
    }
}

impl StopwordSource for FileStopwords {
    fn load(&self, language: &str) -> Result<Vec<String>, StopwordError> {
        load_stopword_file(&self.path_for(language))
    }

    fn initialize(&self, language: &str) -> Result<(), StopwordError> {
        let Some(seed) = &self.seed else {
            return Ok(());
        };
        let words = seed.load(language)?;
        let path = self.path_for(language);
        std::fs::create_dir_all(&self.dir).map_err(|source| StopwordError::Io {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, words.join("\n")).map_err(|source| StopwordError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), words = words.len(), "wrote stopword list");
        Ok(())
    }
}

/// Loads a stopword list from a file (one word per line).
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// Returns error if the file cannot be read.
#[instrument]
pub fn load_stopword_file(path: &Path) -> Result<Vec<String>, StopwordError> {
    let content = std::fs::read_to_string(path).map_err(|source| StopwordError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

/// Source that has nothing to offer; used when all sets are injected up front.
#[derive(Debug)]
struct NoSource;

impl StopwordSource for NoSource {
    fn load(&self, language: &str) -> Result<Vec<String>, StopwordError> {
        Err(StopwordError::UnsupportedLanguage(language.to_string()))
    }
}

/// Process-wide stopword cache.
///
/// Each language is loaded at most once; concurrent first use waits on a
/// single loader. Designed to be shared behind an `Arc`.
#[derive(Debug)]
pub struct StopwordCache {
    source: Box<dyn StopwordSource>,
    /// Cells are cloned out of the map before awaiting so no shard lock is
    /// held across the load.
    sets: DashMap<String, Arc<OnceCell<Arc<StopwordSet>>>>,
}

impl StopwordCache {
    /// Creates an empty cache backed by `source`.
    #[must_use]
    pub fn new(source: Box<dyn StopwordSource>) -> Self {
        Self {
            source,
            sets: DashMap::new(),
        }
    }

    /// Creates a cache holding exactly the given sets.
    #[must_use]
    pub fn with_sets(sets: impl IntoIterator<Item = StopwordSet>) -> Self {
        let cache = Self::new(Box::new(NoSource));
        for set in sets {
            let language = set.language().to_string();
            cache
                .sets
                .insert(language, Arc::new(OnceCell::new_with(Some(Arc::new(set)))));
        }
        cache
    }

    fn cell(&self, language: &str) -> Arc<OnceCell<Arc<StopwordSet>>> {
        Arc::clone(
            self.sets
                .entry(language.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        )
    }

    /// Returns the stopword set for `language`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StopwordError::Unavailable`] if loading fails both before
    /// and after initialization.
    #[instrument(skip(self))]
    pub async fn get(&self, language: &str) -> Result<Arc<StopwordSet>, StopwordError> {
        let language = language.trim().to_ascii_lowercase();
        let cell = self.cell(&language);
        cell.get_or_try_init(|| async {
            let words = load_with_initialization(self.source.as_ref(), &language)?;
            let set = StopwordSet::new(&language, words);
            debug!(language = %language, words = set.len(), "stopwords loaded");
            Ok::<_, StopwordError>(Arc::new(set))
        })
        .await
        .map(Arc::clone)
    }

    /// Loads the given languages ahead of first use. Returns how many were
    /// not loaded before.
    ///
    /// # Errors
    ///
    /// Returns the first language that cannot be loaded.
    pub async fn preload(&self, languages: &[&str]) -> Result<usize, StopwordError> {
        let mut loaded = 0;
        for language in languages {
            if self.is_loaded(language) {
                continue;
            }
            self.get(language).await?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Returns true once `language` has been loaded.
    #[must_use]
    pub fn is_loaded(&self, language: &str) -> bool {
        self.sets
            .get(language.trim().to_ascii_lowercase().as_str())
            .is_some_and(|cell| cell.initialized())
    }
}

fn load_with_initialization(
    source: &dyn StopwordSource,
    language: &str,
) -> Result<Vec<String>, StopwordError> {
    let first = match source.load(language) {
        Ok(words) => return Ok(words),
        Err(err) => err,
    };
    warn!(language, error = %first, "stopword load failed, initializing source");

    let unavailable = |reason: String| StopwordError::Unavailable {
        language: language.to_string(),
        reason,
    };
    source
        .initialize(language)
        .map_err(|err| unavailable(err.to_string()))?;
    source
        .load(language)
        .map_err(|err| unavailable(err.to_string()))
}
