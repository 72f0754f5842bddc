//! CLI entry point for papertag.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use papertag_core::summary::DEFAULT_SUMMARY_TIMEOUT;
use papertag_core::topics::{BundledStopwords, FileStopwords, StopwordCache, StopwordSource};
use papertag_core::{
    Database, GeminiSummarizer, JobStatus, PdfDocument, Papers, SqliteTagStore, Summarizer,
    TagJobQueue, Tagger, TaggingConfig, TaggingWorker,
};
use tracing::{debug, info, warn};

mod cli;
mod config;

/// Jobs claimed longer ago than this are treated as abandoned by a dead run.
const STALE_CLAIM_AGE: Duration = Duration::from_secs(15 * 60);

use cli::{AddArgs, Args, Command, ExtractArgs, PapersArgs, RunArgs, TagsArgs};
use config::{FileConfig, LoadedConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = config::load_config(args.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => loaded
                .config
                .verbosity
                .map_or("info", config::VerbositySetting::level),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    log_config_source(&loaded);

    let file_config = &loaded.config;
    match &args.command {
        Command::Extract(extract) => run_extract(extract, file_config).await,
        command => {
            let db = open_database(args.database.as_deref(), file_config).await?;
            let result = match command {
                Command::Add(add) => run_add(add, &db).await,
                Command::Run(run) => run_queue(run, &db, file_config).await,
                Command::Retry => run_retry(&db).await,
                Command::Tags(tags) => run_tags(tags, &db).await,
                Command::Papers(papers) => run_papers(papers, &db).await,
                Command::Extract(_) => Ok(()),
            };
            db.close().await;
            result
        }
    }
}

fn log_config_source(loaded: &LoadedConfig) {
    match (&loaded.path, loaded.loaded_from_file) {
        (Some(path), true) => debug!(path = %path.display(), "config loaded"),
        (Some(path), false) => debug!(path = %path.display(), "no config file, using defaults"),
        (None, _) => debug!("no config path resolvable, using defaults"),
    }
}

async fn open_database(cli_path: Option<&Path>, file_config: &FileConfig) -> Result<Database> {
    let path = cli_path
        .map(Path::to_path_buf)
        .or_else(|| file_config.database.clone())
        .unwrap_or_else(config::default_database_path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory '{}'", parent.display()))?;
    }

    debug!(path = %path.display(), "opening database");
    Database::new(&path)
        .await
        .with_context(|| format!("Failed to open database '{}'", path.display()))
}

fn tagging_config(
    file_config: &FileConfig,
    max_tags: Option<u16>,
    language: Option<&str>,
) -> Result<TaggingConfig> {
    let mut builder = TaggingConfig::builder();
    if let Some(max_tags) = max_tags.map(usize::from).or(file_config.max_tags) {
        builder = builder.max_tags(max_tags);
    }
    if let Some(language) = language.or(file_config.language.as_deref()) {
        builder = builder.language(language);
    }
    if let Some(max_input_chars) = file_config.max_input_chars {
        builder = builder.max_input_chars(max_input_chars);
    }
    Ok(builder.build()?)
}

/// Builds the stopword cache and loads `language` up front so an unusable
/// language fails before any paper is touched.
async fn stopword_cache(file_config: &FileConfig, language: &str) -> Result<Arc<StopwordCache>> {
    let source: Box<dyn StopwordSource> = match &file_config.stopwords_dir {
        Some(dir) => Box::new(FileStopwords::with_seed(dir, Box::new(BundledStopwords))),
        None => {
            if !BundledStopwords::supports(language) {
                bail!(
                    "no bundled stopwords for language '{language}'\n  Suggestion: Set stopwords_dir in the config file to a directory with {language}.txt"
                );
            }
            Box::new(BundledStopwords)
        }
    };

    let cache = Arc::new(StopwordCache::new(source));
    cache
        .preload(&[language])
        .await
        .with_context(|| format!("Failed to load stopwords for '{language}'"))?;
    Ok(cache)
}

async fn run_add(add: &AddArgs, db: &Database) -> Result<()> {
    if add.title.is_some() && add.files.len() > 1 {
        bail!("--title can only be used with a single file");
    }

    let papers = Papers::new(db.clone());
    let queue = TagJobQueue::new(db.clone());

    for file in &add.files {
        let path = file
            .canonicalize()
            .with_context(|| format!("Cannot read '{}'", file.display()))?;
        let title = add.title.clone().unwrap_or_else(|| title_from_path(&path));

        let paper_id = papers.register(&title, &path.to_string_lossy()).await?;
        let job_id = queue.enqueue(paper_id).await?;
        info!(paper_id, job_id, title = %title, "paper queued for tagging");
        println!("{paper_id}\t{title}");
    }
    Ok(())
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| path.display().to_string())
}

async fn run_queue(run: &RunArgs, db: &Database, file_config: &FileConfig) -> Result<()> {
    let config = tagging_config(file_config, run.max_tags, None)?;
    let stopwords = stopword_cache(file_config, config.language()).await?;
    let max_input_chars = config.max_input_chars();
    let tagger = Tagger::new(config, stopwords);

    let concurrency = run
        .concurrency
        .map(usize::from)
        .or(file_config.concurrency)
        .unwrap_or_else(cli::default_concurrency);

    let papers = Papers::new(db.clone());
    let queue = TagJobQueue::new(db.clone());
    let reset = queue.reset_stale_in_progress(STALE_CLAIM_AGE).await?;
    if reset > 0 {
        warn!(count = reset, "requeued jobs left in progress by an earlier run");
    }

    let mut worker = TaggingWorker::new(concurrency, tagger)?;
    if run.summarize || file_config.summarize.unwrap_or(false) {
        worker = worker.with_summarizer(summarizer(file_config, max_input_chars)?);

        // Papers tagged while summaries were off get a fresh job.
        let waiting = papers.awaiting_summary().await?;
        for paper_id in &waiting {
            queue.enqueue(*paper_id).await?;
        }
        debug!(count = waiting.len(), "queued papers awaiting a summary");
    }

    let stats = worker
        .process_queue(&queue, &papers, &SqliteTagStore::new(db.clone()))
        .await?;

    println!(
        "processed {} papers: {} tagged, {} without text, {} failed, {} tags attached",
        stats.total(),
        stats.completed,
        stats.empty,
        stats.failed,
        stats.tags_added
    );
    if stats.summarized > 0 || stats.summary_failed > 0 {
        println!(
            "summaries: {} ready, {} not produced",
            stats.summarized, stats.summary_failed
        );
    }
    Ok(())
}

fn summarizer(file_config: &FileConfig, max_input_chars: usize) -> Result<Arc<dyn Summarizer>> {
    let api_key = config::resolve_api_key(file_config).with_context(|| {
        format!(
            "Summaries need an API key\n  Suggestion: Export {} or set gemini_api_key in the config file",
            config::API_KEY_ENV
        )
    })?;
    let timeout = file_config
        .summary_timeout_secs
        .map_or(DEFAULT_SUMMARY_TIMEOUT, Duration::from_secs);

    let summarizer = GeminiSummarizer::new(api_key)?
        .with_timeout(timeout)
        .with_max_input_chars(max_input_chars);
    Ok(Arc::new(summarizer))
}

async fn run_retry(db: &Database) -> Result<()> {
    let queue = TagJobQueue::new(db.clone());
    let requeued = queue.requeue_failed().await?;
    info!(count = requeued, "failed jobs requeued");
    println!("requeued {requeued} failed jobs");
    Ok(())
}

async fn run_tags(tags: &TagsArgs, db: &Database) -> Result<()> {
    let store = SqliteTagStore::new(db.clone());
    let list = match tags.paper {
        Some(paper_id) => {
            Papers::new(db.clone()).get(paper_id).await?;
            store.tags_for(paper_id).await?
        }
        None => store.all().await?,
    };

    for tag in &list {
        println!("{}", tag.name);
    }

    let queue = TagJobQueue::new(db.clone());
    let pending = queue.count_by_status(JobStatus::Pending).await?;
    if pending > 0 {
        info!(pending, "papers still waiting for tagging");
    }
    Ok(())
}

async fn run_papers(args: &PapersArgs, db: &Database) -> Result<()> {
    let store = SqliteTagStore::new(db.clone());
    let ids = store.documents_with(&args.tag).await?;
    if ids.is_empty() {
        info!(tag = %args.tag, "no papers carry this tag");
        return Ok(());
    }

    for paper in Papers::new(db.clone()).get_many(&ids).await? {
        println!("{}\t{}\t{}", paper.id, paper.title, paper.summary_status());
    }
    Ok(())
}

async fn run_extract(extract: &ExtractArgs, file_config: &FileConfig) -> Result<()> {
    let config = tagging_config(file_config, extract.max_tags, extract.language.as_deref())?;
    let stopwords = stopword_cache(file_config, config.language()).await?;
    let tagger = Tagger::new(config, stopwords);

    let source = PdfDocument::open(&extract.file);
    let preview = tagger.preview(&source).await;

    if let Some(reason) = preview.reason
        && reason.is_abort()
    {
        bail!(
            "{}: {}",
            reason,
            preview.detail.as_deref().unwrap_or("no detail")
        );
    }
    if preview.truncated {
        warn!(file = %extract.file.display(), "text truncated to the character budget");
    }
    if preview.terms.is_empty() {
        info!(file = %extract.file.display(), "no terms found");
    }

    for term in &preview.terms {
        println!("{}\t{}", term.term, term.count);
    }
    Ok(())
}
