//! Data fetching: rate limiting, HTTP access, and pagination.
//!
//! The seam between fetching and orchestration is the [`IssueSource`] trait.
//! The production implementation is [`http::HttpSource`]; tests drive the
//! orchestrator with scripted implementations instead of the network.
//!
//! Failures are data, not control flow: every fetch returns a [`FetchResult`]
//! whose error arm classifies the failure, and callers decide what to do with
//! it. Transient conditions (timeouts, 5xx, 429) are absorbed inside the HTTP
//! layer by retrying; only retry exhaustion and non-retryable errors escape.

use crate::crawler::windows::DateWindow;
use crate::Comment;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod http;
pub mod model;
pub mod pagination;
pub mod rate_limit;

pub use model::{IssuePage, PageInfo};

/// Classified outcome of a failed fetch.
///
/// Every variant carries the request URL; retryable variants also carry the
/// attempt number so exhaustion reports are self-describing.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Server signalled a rate limit (HTTP 429); the wait hint has already
    /// been handed to the rate limiter when this surfaces
    #[error("rate limited by server (url: {url}, retry after {retry_after:?})")]
    RateLimited {
        /// Request URL
        url: String,
        /// Server-provided wait hint
        retry_after: Duration,
    },

    /// Transient server-side failure (HTTP 5xx)
    #[error("server error {status} (url: {url}, attempt {attempt})")]
    ServerError {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// 1-indexed attempt that observed the error
        attempt: u32,
    },

    /// Connection, TLS, or timeout failure before a response arrived
    #[error("network error (url: {url}, attempt {attempt}): {detail}")]
    NetworkError {
        /// Request URL
        url: String,
        /// 1-indexed attempt that observed the error
        attempt: u32,
        /// Underlying error description
        detail: String,
    },

    /// Non-retryable client error (4xx other than 429)
    #[error("client error {status} (url: {url}): {detail}")]
    ClientError {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        detail: String,
    },

    /// Response body was not the expected JSON envelope
    #[error("malformed payload (url: {url}): {detail}")]
    MalformedPayload {
        /// Request URL
        url: String,
        /// Decode failure description
        detail: String,
    },

    /// Retry ceiling reached without a successful response
    #[error("retries exhausted after {attempts} attempts (url: {url}): {last}")]
    RetriesExhausted {
        /// Request URL
        url: String,
        /// Total attempts made
        attempts: u32,
        /// The last classified failure
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether the HTTP layer may retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. }
                | FetchError::ServerError { .. }
                | FetchError::NetworkError { .. }
        )
    }
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Anything that can supply SeeClickFix-shaped issues and comments.
///
/// Implementations might hit the HTTP API or replay scripted fixtures; the
/// orchestrator does not care which.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Fetch one page of issues for a date window.
    async fn fetch_issues_page(&self, window: &DateWindow, page: u32) -> FetchResult<IssuePage>;

    /// Fetch all comments for a single issue.
    async fn fetch_comments(&self, issue_id: i64) -> FetchResult<Vec<Comment>>;
}

#[async_trait]
impl<S: IssueSource + ?Sized> IssueSource for Arc<S> {
    async fn fetch_issues_page(&self, window: &DateWindow, page: u32) -> FetchResult<IssuePage> {
        (**self).fetch_issues_page(window, page).await
    }

    async fn fetch_comments(&self, issue_id: i64) -> FetchResult<Vec<Comment>> {
        (**self).fetch_comments(issue_id).await
    }
}
