//! HTTP implementation of [`IssueSource`] that talks to the SeeClickFix REST API.
//!
//! Every attempt goes through the shared [`RateLimiter`] first. Transient
//! failures (network errors, 5xx) retry with capped, jittered exponential
//! backoff; a 429 hands its Retry-After hint to the limiter and retries once
//! the limiter permits; any other 4xx is terminal after a single attempt.

use crate::config::{backoff_with_jitter, CrawlConfig, DEFAULT_RETRY_AFTER_SECS};
use crate::crawler::windows::DateWindow;
use crate::fetcher::rate_limit::RateLimiter;
use crate::fetcher::{model, FetchError, FetchResult, IssuePage, IssueSource};
use crate::Comment;
use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP connect timeout - time to establish the TCP connection.
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// HTTP request timeout - overall time for the entire request.
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// [`IssueSource`] backed by the SeeClickFix v2 REST API.
pub struct HttpSource {
    client: Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
    config: CrawlConfig,
}

impl HttpSource {
    /// Create a source from crawl configuration.
    ///
    /// The rate limiter is built from `config.rate_limit_per_minute`; use
    /// [`HttpSource::with_rate_limiter`] to share one limiter across sources.
    pub fn new(config: &CrawlConfig) -> FetchResult<Self> {
        let limiter = Arc::new(RateLimiter::per_minute(
            config.rate_limit_per_minute as usize,
        ));
        Self::with_rate_limiter(config, limiter)
    }

    /// Create a source sharing an existing rate limiter.
    pub fn with_rate_limiter(
        config: &CrawlConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> FetchResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::NetworkError {
                url: config.base_url.clone(),
                attempt: 0,
                detail: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter,
            config: config.clone(),
        })
    }

    /// The rate limiter every request acquires through.
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        self.rate_limiter.clone()
    }

    /// Execute a GET request with rate limiting, classification, and retry.
    ///
    /// Retries on network errors, 5xx, and 429 (Retry-After honored via the
    /// limiter). Does not retry other 4xx responses or undecodable bodies.
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> FetchResult<Value> {
        let max_retries = self.config.max_retries;
        let mut last_error: Option<FetchError> = None;

        for attempt in 1..=max_retries + 1 {
            self.rate_limiter.acquire().await;
            counter!("scf_http_requests_total").increment(1);
            if attempt > 1 {
                counter!("scf_http_retries_total").increment(1);
            }

            debug!(url, attempt, "Issuing GET request");

            let response = match self.client.get(url).query(params).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(url, attempt, error = %e, "Network error");
                    last_error = Some(FetchError::NetworkError {
                        url: url.to_string(),
                        attempt,
                        detail: e.to_string(),
                    });

                    if attempt <= max_retries {
                        tokio::time::sleep(backoff_with_jitter(attempt - 1)).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                counter!("scf_http_429_total").increment(1);
                let retry_after = parse_retry_after(response.headers())
                    .unwrap_or(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS));
                warn!(
                    url,
                    attempt,
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limited by server"
                );

                // The hint is authoritative: the next acquire() waits it out.
                self.rate_limiter.note_retry_after(retry_after);
                last_error = Some(FetchError::RateLimited {
                    url: url.to_string(),
                    retry_after,
                });

                if attempt <= max_retries {
                    continue;
                }
                break;
            }

            if status.is_server_error() {
                warn!(url, attempt, status = status.as_u16(), "Server error");
                last_error = Some(FetchError::ServerError {
                    url: url.to_string(),
                    status: status.as_u16(),
                    attempt,
                });

                if attempt <= max_retries {
                    tokio::time::sleep(backoff_with_jitter(attempt - 1)).await;
                    continue;
                }
                break;
            }

            if status.is_client_error() {
                let detail = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                let detail: String = detail.chars().take(200).collect();
                return Err(FetchError::ClientError {
                    url: url.to_string(),
                    status: status.as_u16(),
                    detail,
                });
            }

            return response
                .json::<Value>()
                .await
                .map_err(|e| FetchError::MalformedPayload {
                    url: url.to_string(),
                    detail: e.to_string(),
                });
        }

        let attempts = max_retries + 1;
        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts,
            last: Box::new(last_error.unwrap_or(FetchError::NetworkError {
                url: url.to_string(),
                attempt: attempts,
                detail: "no response".to_string(),
            })),
        })
    }
}

#[async_trait]
impl IssueSource for HttpSource {
    async fn fetch_issues_page(&self, window: &DateWindow, page: u32) -> FetchResult<IssuePage> {
        let url = format!("{}/issues", self.base_url);
        let bounds = &self.config.bounds;
        let params = [
            ("min_lat", bounds.min_lat.to_string()),
            ("min_lng", bounds.min_lng.to_string()),
            ("max_lat", bounds.max_lat.to_string()),
            ("max_lng", bounds.max_lng.to_string()),
            ("status", self.config.statuses.clone()),
            ("page", page.to_string()),
            ("per_page", self.config.per_page.to_string()),
            ("after", window.after_param()),
            ("before", window.before_param()),
        ];

        let body = self.get_json(&url, &params).await?;
        let mut decoded = model::decode_issue_page(&url, body)?;
        if decoded.info.page == 0 {
            // Defensive default when the service omits pagination metadata.
            decoded.info.page = page;
        }
        Ok(decoded)
    }

    async fn fetch_comments(&self, issue_id: i64) -> FetchResult<Vec<Comment>> {
        let url = format!("{}/issues/{}/comments", self.base_url, issue_id);
        let body = self.get_json(&url, &[]).await?;
        model::decode_comments(&url, issue_id, body)
    }
}

/// Parse a Retry-After header given in whole seconds.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
