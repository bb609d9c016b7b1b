//! Crawl orchestration and date windowing.
//!
//! # Overview
//!
//! The crawl runs as two jobs sharing one rate-limit domain:
//!
//! 1. **Issue listing**: the date range is split into calendar-month windows
//!    ([`windows::month_windows`]); each window is driven to exhaustion
//!    through the pagination engine, with every page persisted and
//!    checkpointed before the next is fetched.
//! 2. **Comment fetch**: a flat iteration over issues whose threads have not
//!    been fetched, persisting and flagging each issue as it completes.
//!
//! Both jobs resume exactly where they stopped: completed windows are never
//! re-fetched, an interrupted window restarts at its checkpointed cursor, and
//! a flagged issue is never re-queried (without `--force`).
//!
//! # Failure semantics
//!
//! Transient failures are absorbed by the HTTP layer's retries. When retries
//! exhaust, or a non-retryable error surfaces, the running job halts with the
//! checkpoint at the last completed unit and the error names the window or
//! issue that stopped it. Malformed individual records are skipped and
//! logged, never fatal to a job.

use crate::fetcher::FetchError;
use crate::store::StoreError;

pub mod orchestrator;
pub mod windows;

pub use orchestrator::Crawler;
pub use windows::{month_windows, DateWindow};

/// Crawl job errors
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The issue-listing job halted inside a window
    #[error("issue crawl halted in window {window} (page {page}): {source}")]
    IssueJobFailed {
        /// The window being crawled when the job halted
        window: String,
        /// The page whose fetch failed; also the checkpointed resume cursor
        page: u32,
        /// The terminal fetch failure
        #[source]
        source: FetchError,
    },

    /// The comment-fetch job halted at an issue
    #[error("comment fetch halted at issue {issue_id}: {source}")]
    CommentJobFailed {
        /// The issue whose comment fetch failed
        issue_id: i64,
        /// The terminal fetch failure
        #[source]
        source: FetchError,
    },

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
