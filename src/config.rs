//! Crawl configuration and retry/backoff schedule.
//!
//! The rate budget (20 requests/minute) and the per-query result cap (~1000)
//! are observed behavior of the live service, not protocol guarantees, so both
//! live here as configurable values rather than hard-coded at call sites.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Maximum number of retries for a failed request.
/// 5 retries with exponential backoff recovers from transient outages while
/// keeping the worst-case wait per request near two minutes.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds (first retry waits 2 seconds).
pub const INITIAL_BACKOFF_MS: u64 = 2_000;

/// Maximum backoff delay in milliseconds.
/// 60 seconds caps the doubling schedule; the service's own Retry-After hints
/// rarely exceed this.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Maximum random jitter added to each backoff delay in milliseconds.
pub const BACKOFF_JITTER_MS: u64 = 250;

/// Wait applied for a 429 response that carries no Retry-After header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Geographic bounding box used to scope issue-listing queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern edge
    pub min_lat: f64,
    /// Western edge
    pub min_lng: f64,
    /// Northern edge
    pub max_lat: f64,
    /// Eastern edge
    pub max_lng: f64,
}

impl BoundingBox {
    /// The Jersey City bounding box the service is queried with.
    ///
    /// The box overlaps neighboring municipalities; records that leak in from
    /// them are dropped by the organization filter, not by the query.
    pub fn jersey_city() -> Self {
        Self {
            min_lat: 40.651_530,
            min_lng: -74.149_293,
            max_lat: 40.776_051,
            max_lng: -74.003_896,
        }
    }
}

/// Tunable crawl parameters with defaults matching the live service.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Base URL of the SeeClickFix v2 API
    pub base_url: String,
    /// Outbound request budget per trailing 60-second window
    pub rate_limit_per_minute: u32,
    /// Results requested per page (API ceiling is 100 in practice)
    pub per_page: u32,
    /// Observed total-results ceiling per distinct query (~1000); a window
    /// whose query saturates this is logged as too wide
    pub result_cap: u32,
    /// Width of each date window in calendar months
    pub window_months: u32,
    /// Retry ceiling for transient request failures
    pub max_retries: u32,
    /// Crawl windows newest-first instead of oldest-first
    pub newest_first: bool,
    /// Status filter applied to issue-listing queries
    pub statuses: String,
    /// Geographic query scope
    pub bounds: BoundingBox,
    /// Organizations outside the crawl scope whose records are discarded
    pub excluded_orgs: Vec<String>,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://seeclickfix.com/api/v2".to_string(),
            rate_limit_per_minute: 20,
            per_page: 100,
            result_cap: 1_000,
            window_months: 1,
            max_retries: MAX_RETRIES,
            newest_first: false,
            statuses: "open,acknowledged,closed,archived".to_string(),
            bounds: BoundingBox::jersey_city(),
            excluded_orgs: vec![
                "Town of Kearny".to_string(),
                "City of Newark".to_string(),
            ],
            user_agent: "seeclickfix-crawler/0.1".to_string(),
        }
    }
}

impl CrawlConfig {
    /// Validate configuration values, failing fast on pathological settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url cannot be empty".to_string());
        }

        if self.rate_limit_per_minute == 0 {
            return Err("rate_limit_per_minute must be at least 1".to_string());
        }

        if self.per_page == 0 || self.per_page > 100 {
            return Err(format!(
                "per_page must be between 1 and 100, got {}",
                self.per_page
            ));
        }

        if self.result_cap == 0 {
            return Err("result_cap must be at least 1".to_string());
        }

        if self.window_months == 0 {
            return Err("window_months must be at least 1".to_string());
        }

        Ok(())
    }
}

/// Calculate the exponential backoff delay for a retry attempt (0-indexed).
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// Backoff delay with a small random jitter so retry bursts desynchronize.
pub fn backoff_with_jitter(retry_count: u32) -> Duration {
    let jitter_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()) % BACKOFF_JITTER_MS)
        .unwrap_or(0);
    calculate_backoff(retry_count) + Duration::from_millis(jitter_ms)
}
