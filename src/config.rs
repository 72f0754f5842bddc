//! Config file loading for CLI defaults.
//!
//! The file holds `key = value` lines (strings double-quoted, `#` comments).
//! Values here are defaults; command-line flags override them.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Environment variable consulted for the summary API key.
pub const API_KEY_ENV: &str = "PAPERTAG_GEMINI_API_KEY";

/// File configuration for papertag defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// SQLite database path.
    pub database: Option<PathBuf>,
    /// Tags attached per paper (1..=100).
    pub max_tags: Option<usize>,
    /// Stopword language code.
    pub language: Option<String>,
    /// Character budget for extracted text (1..=1000000).
    pub max_input_chars: Option<usize>,
    /// Worker concurrency (1..=32).
    pub concurrency: Option<usize>,
    /// Directory of `<language>.txt` stopword files.
    pub stopwords_dir: Option<PathBuf>,
    /// Run the summarizer after tagging.
    pub summarize: Option<bool>,
    /// API key for the summary service.
    pub gemini_api_key: Option<String>,
    /// Summary request timeout in seconds (1..=600).
    pub summary_timeout_secs: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("max_tags", self.max_tags, 1, 100)?;
        validate_range("max_input_chars", self.max_input_chars, 1, 1_000_000)?;
        validate_range("concurrency", self.concurrency, 1, 32)?;
        if let Some(secs) = self.summary_timeout_secs
            && !(1..=600).contains(&secs)
        {
            bail!("Invalid config value for `summary_timeout_secs`: {secs}. Expected range: 1..=600");
        }
        if let Some(language) = &self.language
            && (language.is_empty() || !language.chars().all(|c| c.is_ascii_alphabetic()))
        {
            bail!("Invalid config value for `language`: '{language}'. Expected a code such as \"en\"");
        }
        Ok(())
    }
}

fn validate_range(field: &str, value: Option<usize>, min: usize, max: usize) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log filter this setting maps to when no flag or `RUST_LOG` is given.
    #[must_use]
    pub fn level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path consulted, if one could be resolved.
    pub path: Option<PathBuf>,
    /// Parsed file config; defaults when no file exists.
    pub config: FileConfig,
    /// True when a file was read.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/papertag/config.toml`
/// 2. `$HOME/.config/papertag/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("papertag")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("papertag")
            .join("config.toml"),
    )
}

/// Default database location next to the config file.
#[must_use]
pub fn default_database_path() -> PathBuf {
    if let Some(data_home) = env_var_non_empty_os("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join("papertag").join("papertag.db");
    }
    match env_var_non_empty_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("papertag")
            .join("papertag.db"),
        None => PathBuf::from("papertag.db"),
    }
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` if given (it must exist), else from the
/// default path if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            ..LoadedConfig::default()
        }),
    }
}

/// API key from the environment, falling back to the file value.
#[must_use]
pub fn resolve_api_key(config: &FileConfig) -> Option<String> {
    env::var(API_KEY_ENV)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .or_else(|| config.gemini_api_key.clone())
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "database" => {
                cfg.database = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "max_tags" => cfg.max_tags = Some(parse_usize(value).with_context(invalid)?),
            "language" => {
                cfg.language = Some(
                    parse_string_literal(value)
                        .with_context(invalid)?
                        .trim()
                        .to_ascii_lowercase(),
                );
            }
            "max_input_chars" => {
                cfg.max_input_chars = Some(parse_usize(value).with_context(invalid)?);
            }
            "concurrency" => cfg.concurrency = Some(parse_usize(value).with_context(invalid)?),
            "stopwords_dir" => {
                cfg.stopwords_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "summarize" => cfg.summarize = Some(parse_boolean(value).with_context(invalid)?),
            "gemini_api_key" => {
                let key = parse_string_literal(value).with_context(invalid)?;
                cfg.gemini_api_key = Some(key).filter(|k| !k.trim().is_empty());
            }
            "summary_timeout_secs" => {
                cfg.summary_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    token
        .parse::<u64>()
        .with_context(|| format!("Expected non-negative integer, got '{token}'"))
}

fn parse_usize(raw_value: &str) -> Result<usize> {
    let value = parse_integer_u64(raw_value)?;
    usize::try_from(value).with_context(|| format!("{value} does not fit in usize"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
database = "/var/lib/papertag/papers.db"
max_tags = 7
language = "FR"
max_input_chars = 8000
concurrency = 8   # workers
stopwords_dir = "/etc/papertag/stopwords"
summarize = true
gemini_api_key = "abc#123"
summary_timeout_secs = 30
verbosity = "verbose"
"#,
        )
        .expect("full config should parse");

        assert_eq!(cfg.database, Some(PathBuf::from("/var/lib/papertag/papers.db")));
        assert_eq!(cfg.max_tags, Some(7));
        assert_eq!(cfg.language.as_deref(), Some("fr"));
        assert_eq!(cfg.max_input_chars, Some(8000));
        assert_eq!(cfg.concurrency, Some(8));
        assert_eq!(cfg.stopwords_dir, Some(PathBuf::from("/etc/papertag/stopwords")));
        assert_eq!(cfg.summarize, Some(true));
        assert_eq!(cfg.gemini_api_key.as_deref(), Some("abc#123"));
        assert_eq!(cfg.summary_timeout_secs, Some(30));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str("max_tags = 5").expect("partial config should parse");
        assert_eq!(cfg.max_tags, Some(5));
        assert!(cfg.database.is_none());
        assert!(cfg.summarize.is_none());
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_values() {
        for (line, field) in [
            ("max_tags = 0", "max_tags"),
            ("max_tags = 101", "max_tags"),
            ("concurrency = 33", "concurrency"),
            ("max_input_chars = 0", "max_input_chars"),
            ("summary_timeout_secs = 0", "summary_timeout_secs"),
        ] {
            let err = parse_config_str(line).expect_err(line);
            assert!(err.to_string().contains(field), "{line}: {err}");
        }
    }

    #[test]
    fn test_parse_config_rejects_negative_integers() {
        let err = parse_config_str("concurrency = -2").expect_err("negative");
        assert!(format!("{err:#}").contains("non-negative integer"));
    }

    #[test]
    fn test_parse_config_rejects_bad_language() {
        let err = parse_config_str(r#"language = "en-US""#).expect_err("bad language");
        assert!(err.to_string().contains("language"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_strings() {
        let err = parse_config_str("database = papers.db").expect_err("unquoted");
        assert!(format!("{err:#}").contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys_with_line() {
        let err = parse_config_str("max_tags = 3\nbogus = 1").expect_err("unknown key");
        let msg = err.to_string();
        assert!(msg.contains("Unknown configuration key"));
        assert!(msg.contains("bogus"));
        assert!(msg.contains("line 2"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("summarize").expect_err("syntax");
        assert!(err.to_string().contains("expected key = value"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("summarize = yes").expect_err("invalid boolean expected");
        assert!(format!("{err:#}").contains("summarize"));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let cfg = parse_config_str(r#"gemini_api_key = "  ""#).unwrap();
        assert!(cfg.gemini_api_key.is_none());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(VerbositySetting::Default.level(), "info");
        assert_eq!(VerbositySetting::Verbose.level(), "debug");
        assert_eq!(VerbositySetting::Quiet.level(), "error");
        assert_eq!(VerbositySetting::Debug.level(), "trace");
    }

    #[test]
    fn test_load_config_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_tags = 4\n").unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.max_tags, Some(4));
    }

    #[test]
    fn test_load_config_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
