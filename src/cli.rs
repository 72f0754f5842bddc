//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use papertag_core::DEFAULT_CONCURRENCY;

/// Keyword tagging for shared research papers.
///
/// Papertag extracts the text of uploaded PDFs, ranks its terms and attaches
/// the strongest ones as tags in a shared vocabulary.
#[derive(Parser, Debug)]
#[command(name = "papertag")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/papertag/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register PDFs as papers and queue them for tagging
    Add(AddArgs),
    /// Drain the tagging queue
    Run(RunArgs),
    /// Requeue failed tagging jobs
    Retry,
    /// List tags, for one paper or the whole vocabulary
    Tags(TagsArgs),
    /// List papers carrying a tag
    Papers(PapersArgs),
    /// Print the top terms of a PDF without storing anything
    Extract(ExtractArgs),
}

#[derive(ClapArgs, Debug)]
pub struct AddArgs {
    /// PDF files to register
    #[arg(required = true, value_name = "PDF")]
    pub files: Vec<PathBuf>,

    /// Paper title (only with a single file; defaults to the file stem)
    #[arg(short, long)]
    pub title: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// Maximum concurrent tagging jobs (1-32)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// Also produce AI summaries (needs an API key)
    #[arg(short, long)]
    pub summarize: bool,

    /// Tags attached per paper (1-100)
    #[arg(short = 'k', long, value_parser = clap::value_parser!(u16).range(1..=100))]
    pub max_tags: Option<u16>,
}

#[derive(ClapArgs, Debug)]
pub struct TagsArgs {
    /// Only tags of this paper id
    #[arg(short, long)]
    pub paper: Option<i64>,
}

#[derive(ClapArgs, Debug)]
pub struct PapersArgs {
    /// Tag name (normalized before lookup)
    #[arg(short, long)]
    pub tag: String,
}

#[derive(ClapArgs, Debug)]
pub struct ExtractArgs {
    /// PDF file to analyze
    #[arg(value_name = "PDF")]
    pub file: PathBuf,

    /// Number of terms to print (1-100)
    #[arg(short = 'k', long, value_parser = clap::value_parser!(u16).range(1..=100))]
    pub max_tags: Option<u16>,

    /// Stopword language
    #[arg(short, long)]
    pub language: Option<String>,
}

/// Worker concurrency when neither flag nor config sets one.
#[must_use]
pub fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
