//! Validated settings for one tagging run.

use serde::Serialize;
use thiserror::Error;

use crate::extract::DEFAULT_MAX_INPUT_CHARS;
use crate::tags::DEFAULT_MAX_TAGS;
use crate::topics::DEFAULT_LANGUAGE;

/// Largest tag cap accepted.
pub const MAX_TAGS_LIMIT: usize = 100;

/// Largest character budget accepted.
pub const MAX_INPUT_CHARS_LIMIT: usize = 1_000_000;

/// Invalid tagging settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Tag cap outside `1..=MAX_TAGS_LIMIT`.
    #[error("max_tags must be between 1 and 100, got {0}")]
    MaxTags(usize),

    /// Character budget outside `1..=MAX_INPUT_CHARS_LIMIT`.
    #[error("max_input_chars must be between 1 and 1000000, got {0}")]
    MaxInputChars(usize),

    /// Language tag is blank or not purely alphabetic.
    #[error("invalid language tag {0:?}\n  Suggestion: Use a short code such as \"en\"")]
    Language(String),
}

/// Settings for [`Tagger`](super::Tagger), validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggingConfig {
    max_tags: usize,
    language: String,
    max_input_chars: usize,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            max_tags: DEFAULT_MAX_TAGS,
            language: DEFAULT_LANGUAGE.to_string(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

impl TaggingConfig {
    /// Starts from the defaults (10 tags, `en`, 12000 chars).
    #[must_use]
    pub fn builder() -> TaggingConfigBuilder {
        TaggingConfigBuilder::default()
    }

    /// Maximum tags attached per run.
    #[must_use]
    pub fn max_tags(&self) -> usize {
        self.max_tags
    }

    /// Stopword language, lower-case.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Character budget for extracted text.
    #[must_use]
    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }
}

/// Builder for [`TaggingConfig`].
#[derive(Debug, Clone)]
pub struct TaggingConfigBuilder {
    max_tags: usize,
    language: String,
    max_input_chars: usize,
}

impl Default for TaggingConfigBuilder {
    fn default() -> Self {
        let defaults = TaggingConfig::default();
        Self {
            max_tags: defaults.max_tags,
            language: defaults.language,
            max_input_chars: defaults.max_input_chars,
        }
    }
}

impl TaggingConfigBuilder {
    #[must_use]
    pub fn max_tags(mut self, max_tags: usize) -> Self {
        self.max_tags = max_tags;
        self
    }

    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Validates and builds the config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for out-of-range values.
    pub fn build(self) -> Result<TaggingConfig, ConfigError> {
        if !(1..=MAX_TAGS_LIMIT).contains(&self.max_tags) {
            return Err(ConfigError::MaxTags(self.max_tags));
        }
        if !(1..=MAX_INPUT_CHARS_LIMIT).contains(&self.max_input_chars) {
            return Err(ConfigError::MaxInputChars(self.max_input_chars));
        }

        let language = self.language.trim().to_ascii_lowercase();
        if language.is_empty()
            || language.len() > 16
            || !language.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::Language(self.language));
        }

        Ok(TaggingConfig {
            max_tags: self.max_tags,
            language,
            max_input_chars: self.max_input_chars,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = TaggingConfig::builder().build().unwrap();
        assert_eq!(config.max_tags(), 10);
        assert_eq!(config.language(), "en");
        assert_eq!(config.max_input_chars(), 12_000);
        assert_eq!(config, TaggingConfig::default());
    }

    #[test]
    fn test_builder_rejects_zero_tags() {
        let err = TaggingConfig::builder().max_tags(0).build().unwrap_err();
        assert_eq!(err, ConfigError::MaxTags(0));
        assert!(err.to_string().contains("max_tags"));
    }

    #[test]
    fn test_builder_rejects_oversized_budget() {
        let err = TaggingConfig::builder()
            .max_input_chars(MAX_INPUT_CHARS_LIMIT + 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MaxInputChars(_)));
    }

    #[test]
    fn test_builder_normalizes_language() {
        let config = TaggingConfig::builder().language(" EN ").build().unwrap();
        assert_eq!(config.language(), "en");
    }

    #[test]
    fn test_builder_rejects_bad_language() {
        for bad in ["", "  ", "en-US", "e1", "../en"] {
            let err = TaggingConfig::builder().language(bad).build().unwrap_err();
            assert!(matches!(err, ConfigError::Language(_)), "{bad:?}");
        }
    }
}
