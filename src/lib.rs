//! # SeeClickFix Crawler Library
//!
//! A checkpointed crawler for harvesting SeeClickFix civic-issue reports and
//! their comment threads into a local SQLite store.
//!
//! ## Features
//!
//! - **Date-Windowed Pagination**: Splits unbounded date ranges into
//!   calendar-month windows to stay under the API's per-query result cap
//! - **Checkpoint/Resume**: Every page is persisted and checkpointed in one
//!   transaction; an interrupted crawl resumes from the exact page it stopped at
//! - **Rate Limiting**: Sliding-window request budget (default 20/minute) with
//!   server `Retry-After` hints taking precedence over the computed schedule
//! - **Retry with Backoff**: Transient failures (timeouts, 5xx, 429) are
//!   retried with capped exponential backoff; other client errors fail fast
//! - **Scope Filtering**: Issues belonging to out-of-scope organizations are
//!   discarded before persistence
//!
//! ## Quick Start
//!
//! ```no_run
//! use seeclickfix_crawler::config::CrawlConfig;
//! use seeclickfix_crawler::crawler::Crawler;
//! use seeclickfix_crawler::fetcher::http::HttpSource;
//! use seeclickfix_crawler::store::SqliteStore;
//! use chrono::NaiveDate;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrawlConfig::default();
//! let source = HttpSource::new(&config)?;
//! let store = SqliteStore::open("data/seeclickfix.db".as_ref())?;
//!
//! let mut crawler = Crawler::new(source, store, config);
//! let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2015, 12, 31).unwrap();
//! crawler.crawl_issues(start, end, None, false).await?;
//! crawler.crawl_comments(None, false).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Crawl configuration and backoff schedule
//! - [`fetcher`] - Rate limiter, HTTP fetch layer, and pagination engine
//! - [`crawler`] - Date-window splitter and crawl orchestrator
//! - [`store`] - SQLite record store and crawl checkpoints
//! - [`shutdown`] - Graceful Ctrl+C coordination
//! - [`metrics`] - Optional Prometheus metrics

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Crawl configuration
pub mod config;

/// Crawl orchestration and date windowing
pub mod crawler;

/// Rate limiting, HTTP fetching, and pagination
pub mod fetcher;

/// Prometheus metrics
pub mod metrics;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// SQLite record store and checkpoints
pub mod store;

/// An issue report as persisted in the local store.
///
/// Field names and types follow the SeeClickFix v2 API; timestamps are kept
/// as the RFC3339 strings the API delivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Remote issue id (primary key)
    pub id: i64,
    /// Issue status ("open", "acknowledged", "closed", "archived")
    pub status: Option<String>,
    /// One-line summary
    pub summary: Option<String>,
    /// Full description text
    pub description: Option<String>,
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lng: Option<f64>,
    /// Street address
    pub address: Option<String>,
    /// Creation timestamp (RFC3339)
    pub created_at: Option<String>,
    /// Last update timestamp (RFC3339)
    pub updated_at: Option<String>,
    /// Close timestamp (RFC3339)
    pub closed_at: Option<String>,
    /// Acknowledgement timestamp (RFC3339)
    pub acknowledged_at: Option<String>,
    /// Request type title (e.g. "Pothole")
    pub request_type: Option<String>,
    /// Responsible organization, falling back to the request type title
    pub department: Option<String>,
    /// Public issue URL
    pub html_url: Option<String>,
    /// Comment count as reported by the listing endpoint
    pub comment_count: i64,
    /// Reporter id
    pub reporter_id: Option<i64>,
    /// Reporter display name
    pub reporter_name: Option<String>,
}

impl Issue {
    /// Validate issue data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err(format!("Issue id must be positive, got {}", self.id));
        }

        if let Some(lat) = self.lat {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(format!("Latitude out of range: {lat}"));
            }
        }

        if let Some(lng) = self.lng {
            if !(-180.0..=180.0).contains(&lng) {
                return Err(format!("Longitude out of range: {lng}"));
            }
        }

        if self.comment_count < 0 {
            return Err(format!(
                "Comment count must be non-negative, got {}",
                self.comment_count
            ));
        }

        Ok(())
    }
}

/// A comment on an issue as persisted in the local store.
///
/// The commenter `role` is delivered by the API ("Verified Official",
/// "Registered User", ...) and is stored verbatim for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment id, parsed from the API's flag URL (or a stable fallback hash)
    pub id: i64,
    /// Owning issue id
    pub issue_id: i64,
    /// Comment body
    pub body: String,
    /// Creation timestamp (RFC3339)
    pub created_at: Option<String>,
    /// Last update timestamp (RFC3339)
    pub updated_at: Option<String>,
    /// Commenter id
    pub commenter_id: Option<i64>,
    /// Commenter display name
    pub commenter_name: Option<String>,
    /// Commenter role ("Verified Official" identifies a government responder)
    pub commenter_role: Option<String>,
}

impl Comment {
    /// Validate comment data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.issue_id <= 0 {
            return Err(format!(
                "Comment issue_id must be positive, got {}",
                self.issue_id
            ));
        }

        Ok(())
    }
}

/// Counters accumulated over one crawler invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Issues persisted to the store
    pub issues_fetched: u64,
    /// Issues discarded by the out-of-scope organization filter
    pub issues_filtered: u64,
    /// Result pages consumed
    pub pages_fetched: u64,
    /// Comments persisted to the store
    pub comments_fetched: u64,
}
