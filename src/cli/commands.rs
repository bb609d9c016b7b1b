//! Command-line interface definition and command implementations.

use crate::cli::CliError;
use crate::config::CrawlConfig;
use crate::crawler::Crawler;
use crate::fetcher::http::HttpSource;
use crate::shutdown::SharedShutdown;
use crate::store::{self, SqliteStore};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

/// SeeClickFix crawler CLI
#[derive(Parser, Debug)]
#[command(name = "seeclickfix-crawler")]
#[command(about = "Crawl SeeClickFix issues and comments into a local SQLite store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// SQLite database path
    #[arg(long, global = true, default_value = "data/seeclickfix.db")]
    pub db: PathBuf,

    /// Outbound request budget per minute
    #[arg(long, global = true, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=600))]
    pub rate_limit: u32,

    /// Results requested per page
    #[arg(long, global = true, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub per_page: u32,

    /// Maximum number of retries for failed requests
    #[arg(long, global = true, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Re-run from scratch, ignoring cached/completed work
    #[arg(long, global = true, default_value_t = false)]
    pub force: bool,

    /// Bind a Prometheus scrape endpoint (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl issues and then their comment threads
    Crawl(CrawlArgs),
    /// Crawl only issues (no comments)
    Issues(IssuesArgs),
    /// Fetch comment threads for already-crawled issues
    Comments(CommentsArgs),
    /// Show store statistics and crawl progress
    Stats,
    /// Delete the database and start over
    Reset(ResetArgs),
}

/// Arguments for the full crawl
#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Start date (YYYY-MM-DD)
    #[arg(long, default_value = "2015-01-01")]
    pub start_date: String,

    /// End date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub end_date: Option<String>,

    /// Max issues to fetch this run
    #[arg(long = "issues")]
    pub issue_limit: Option<u64>,

    /// Max issues to fetch comments for this run
    #[arg(long = "comments")]
    pub comment_limit: Option<u64>,
}

/// Arguments for the issue-only crawl
#[derive(Args, Debug)]
pub struct IssuesArgs {
    /// Start date (YYYY-MM-DD)
    #[arg(long, default_value = "2015-01-01")]
    pub start_date: String,

    /// End date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub end_date: Option<String>,

    /// Max issues to fetch this run
    #[arg(long)]
    pub limit: Option<u64>,
}

/// Arguments for the comment-only crawl
#[derive(Args, Debug)]
pub struct CommentsArgs {
    /// Max issues to fetch comments for this run
    #[arg(long)]
    pub limit: Option<u64>,
}

/// Arguments for the reset command
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Skip confirmation
    #[arg(long)]
    pub yes: bool,
}

impl CrawlArgs {
    /// Run the full crawl: issues, then comments.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let (start, end) = parse_range(&self.start_date, self.end_date.as_deref())?;
        let config = build_config(cli)?;

        let mut lock = store::crawl_lock(&cli.db)?;
        let _guard = lock.try_write().map_err(|_| CliError::CrawlLocked)?;

        let source = HttpSource::new(&config)?;
        let store = SqliteStore::open(&cli.db)?;
        let mut crawler = Crawler::new(source, store, config).with_shutdown(shutdown);

        let stats = crawler
            .crawl_all(start, end, self.issue_limit, self.comment_limit, cli.force)
            .await?;

        info!(
            issues = stats.issues_fetched,
            filtered = stats.issues_filtered,
            comments = stats.comments_fetched,
            pages = stats.pages_fetched,
            "Crawl finished"
        );
        Ok(())
    }
}

impl IssuesArgs {
    /// Run the issue-listing job alone.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let (start, end) = parse_range(&self.start_date, self.end_date.as_deref())?;
        let config = build_config(cli)?;

        let mut lock = store::crawl_lock(&cli.db)?;
        let _guard = lock.try_write().map_err(|_| CliError::CrawlLocked)?;

        let source = HttpSource::new(&config)?;
        let store = SqliteStore::open(&cli.db)?;
        let mut crawler = Crawler::new(source, store, config).with_shutdown(shutdown);

        crawler
            .crawl_issues(start, end, self.limit, cli.force)
            .await?;

        let stats = crawler.stats();
        info!(
            issues = stats.issues_fetched,
            filtered = stats.issues_filtered,
            pages = stats.pages_fetched,
            "Issue crawl finished"
        );
        Ok(())
    }
}

impl CommentsArgs {
    /// Run the comment-fetch job alone.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = build_config(cli)?;

        let mut lock = store::crawl_lock(&cli.db)?;
        let _guard = lock.try_write().map_err(|_| CliError::CrawlLocked)?;

        let source = HttpSource::new(&config)?;
        let store = SqliteStore::open(&cli.db)?;
        let mut crawler = Crawler::new(source, store, config).with_shutdown(shutdown);

        crawler.crawl_comments(self.limit, cli.force).await?;

        info!(
            comments = crawler.stats().comments_fetched,
            "Comment crawl finished"
        );
        Ok(())
    }
}

/// Print store statistics and crawl progress.
pub fn execute_stats(cli: &Cli) -> Result<(), CliError> {
    let store = SqliteStore::open(&cli.db)?;

    println!("Store statistics ({})", cli.db.display());
    println!("  Issues:                 {}", store.issue_count()?);
    println!(
        "  Issues with comments:   {}",
        store.issues_with_comments_count()?
    );
    println!("  Comments:               {}", store.comment_count()?);

    let window_counts = store.window_counts_by_status()?;
    if window_counts.is_empty() {
        println!("  Crawl windows:          none");
    } else {
        println!("  Crawl windows:");
        for (status, count) in window_counts {
            println!("    {status:<12} {count}");
        }
    }

    Ok(())
}

impl ResetArgs {
    /// Delete the database and reinitialize the schema.
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        if !self.yes {
            return Err(CliError::InvalidArgument(
                "reset deletes all data; pass --yes to confirm".to_string(),
            ));
        }

        let mut lock = store::crawl_lock(&cli.db)?;
        let _guard = lock.try_write().map_err(|_| CliError::CrawlLocked)?;

        for path in [
            cli.db.clone(),
            sibling(&cli.db, "db-wal"),
            sibling(&cli.db, "db-shm"),
        ] {
            if path.exists() {
                std::fs::remove_file(&path).map_err(crate::store::StoreError::Io)?;
            }
        }
        info!(db = %cli.db.display(), "Database deleted");

        SqliteStore::open(&cli.db)?;
        println!("Database re-initialized at {}", cli.db.display());
        Ok(())
    }
}

fn sibling(db: &std::path::Path, extension: &str) -> PathBuf {
    db.with_extension(extension)
}

/// Build crawl configuration from global CLI flags.
fn build_config(cli: &Cli) -> Result<CrawlConfig, CliError> {
    let config = CrawlConfig {
        rate_limit_per_minute: cli.rate_limit,
        per_page: cli.per_page,
        max_retries: cli.max_retries,
        ..CrawlConfig::default()
    };
    config.validate().map_err(CliError::InvalidArgument)?;
    Ok(config)
}

/// Parse the crawl date range; the end date defaults to today.
fn parse_range(start: &str, end: Option<&str>) -> Result<(NaiveDate, NaiveDate), CliError> {
    let start = parse_date(start)?;
    let end = match end {
        Some(text) => parse_date(text)?,
        None => Utc::now().date_naive(),
    };

    if start > end {
        return Err(CliError::InvalidArgument(format!(
            "start date {start} is after end date {end}"
        )));
    }

    Ok((start, end))
}

/// Parse a YYYY-MM-DD date argument.
fn parse_date(input: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("invalid date '{input}': {e}")))
}
