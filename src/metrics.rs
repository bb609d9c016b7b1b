//! Observability metrics for the crawler.
//!
//! Uses the `metrics` facade with an optional Prometheus scrape endpoint.
//! When the exporter is not installed every emission is a no-op, so the fetch
//! and crawl layers record unconditionally.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the metrics system with a Prometheus exporter.
///
/// Idempotent; the second and later calls are no-ops. Returns an error if the
/// scrape endpoint cannot be bound.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!(addr = %addr, "Initializing metrics exporter");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "scf_http_requests_total",
        Unit::Count,
        "Total HTTP requests issued to the SeeClickFix API"
    );

    describe_counter!(
        "scf_http_429_total",
        Unit::Count,
        "Total rate-limit (429) responses received"
    );

    describe_counter!(
        "scf_http_retries_total",
        Unit::Count,
        "Total request retry attempts"
    );

    describe_counter!(
        "scf_records_stored_total",
        Unit::Count,
        "Total records persisted to the local store"
    );

    describe_counter!(
        "scf_jobs_completed_total",
        Unit::Count,
        "Crawl jobs that ran to completion"
    );

    describe_counter!(
        "scf_jobs_failed_total",
        Unit::Count,
        "Crawl jobs halted by a terminal failure"
    );

    describe_histogram!(
        "scf_job_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of crawl jobs"
    );

    info!(addr = %addr, "Metrics exporter ready");
    Ok(())
}

/// Per-job metrics handle covering one orchestrator run.
pub struct JobMetrics {
    job: &'static str,
    started: Instant,
}

impl JobMetrics {
    /// Start tracking a crawl job.
    pub fn start(job: &'static str) -> Self {
        debug!(job, "Starting job metrics");
        Self {
            job,
            started: Instant::now(),
        }
    }

    /// Record successful completion with the number of records stored.
    pub fn record_success(&self, records: u64) {
        counter!("scf_jobs_completed_total", "job" => self.job).increment(1);
        counter!("scf_records_stored_total", "job" => self.job).increment(records);
        histogram!("scf_job_duration_seconds", "job" => self.job)
            .record(self.started.elapsed().as_secs_f64());
    }

    /// Record a terminal failure.
    pub fn record_failure(&self, error: &str) {
        counter!("scf_jobs_failed_total", "job" => self.job).increment(1);
        histogram!("scf_job_duration_seconds", "job" => self.job)
            .record(self.started.elapsed().as_secs_f64());
        debug!(job = self.job, error, "Job failure recorded");
    }
}
