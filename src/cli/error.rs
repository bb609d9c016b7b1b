//! CLI error types and conversions

use crate::crawler::CrawlError;
use crate::fetcher::FetchError;
use crate::store::StoreError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Crawl error
    #[error("crawl error: {0}")]
    Crawl(#[from] CrawlError),

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Fetch error
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The advisory crawl lock is held by another process
    #[error("another crawl is already running against this database")]
    CrawlLocked,
}
