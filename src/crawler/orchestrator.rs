//! The crawl orchestrator: drives both jobs against the store.

use crate::config::CrawlConfig;
use crate::crawler::windows::month_windows;
use crate::crawler::CrawlError;
use crate::fetcher::pagination::IssuePager;
use crate::fetcher::IssueSource;
use crate::metrics::JobMetrics;
use crate::shutdown::{self, SharedShutdown};
use crate::store::SqliteStore;
use crate::{CrawlStats, Issue};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// Orchestrates the issue-listing and comment-fetch jobs.
///
/// Owns the window lifecycle: the checkpoint store is only ever mutated from
/// here, and always after the corresponding records are durably stored.
pub struct Crawler<S> {
    source: S,
    store: SqliteStore,
    config: CrawlConfig,
    shutdown: Option<SharedShutdown>,
    stats: CrawlStats,
}

impl<S: IssueSource> Crawler<S> {
    /// Create a crawler over a source and store.
    pub fn new(source: S, store: SqliteStore, config: CrawlConfig) -> Self {
        Self {
            source,
            store,
            config,
            shutdown: shutdown::get_global_shutdown(),
            stats: CrawlStats::default(),
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Counters accumulated so far by this crawler.
    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Consume the crawler, returning its store.
    pub fn into_store(self) -> SqliteStore {
        self.store
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// Whether an issue belongs to an organization outside the crawl scope.
    ///
    /// The bounding-box query leaks records from neighboring municipalities;
    /// those are dropped here, before persistence, and never count against an
    /// issue limit.
    fn is_out_of_scope(&self, issue: &Issue) -> bool {
        issue
            .department
            .as_deref()
            .map(|dept| self.config.excluded_orgs.iter().any(|org| org == dept))
            .unwrap_or(false)
    }

    /// Crawl all issues in `[start, end]` using date-windowed pagination with
    /// checkpoint/resume.
    ///
    /// `limit` bounds the number of issues persisted by this invocation;
    /// `force` clears the window checkpoints first for a full re-crawl.
    pub async fn crawl_issues(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        limit: Option<u64>,
        force: bool,
    ) -> Result<(), CrawlError> {
        let job = JobMetrics::start("issues");
        info!(%start, %end, ?limit, force, "Starting issue crawl");

        if force {
            self.store.reset_windows()?;
            warn!("Force mode: reset all crawl windows");
        }

        let windows = month_windows(start, end, self.config.window_months);
        self.store.ensure_windows(&windows)?;

        let mut pending = self.store.pending_windows()?;
        if self.config.newest_first {
            pending.reverse();
        }

        if pending.is_empty() {
            info!(
                issues_in_store = self.store.issue_count()?,
                "All crawl windows completed; use force to re-crawl"
            );
            job.record_success(0);
            return Ok(());
        }

        info!(
            remaining = pending.len(),
            completed = self.store.completed_window_count()?,
            "Resuming issue crawl"
        );

        let mut run_total: u64 = 0;
        for win in pending {
            if self.shutdown_requested() {
                info!("Shutdown requested - issue crawl stopping at window boundary");
                job.record_success(run_total);
                return Ok(());
            }

            info!(
                window = %win.window,
                start_page = win.next_page,
                "Crawling window"
            );
            self.store.mark_window_in_progress(win.id)?;

            let mut pager = IssuePager::new(
                &self.source,
                win.window,
                win.next_page,
                self.config.result_cap,
            );

            loop {
                let page = match pager.next_page().await {
                    Ok(Some(page)) => page,
                    Ok(None) => break,
                    Err(source) => {
                        let failed_page = pager.cursor();
                        job.record_failure(&source.to_string());
                        // The cursor for the failed page is already durable;
                        // re-running resumes exactly here.
                        return Err(CrawlError::IssueJobFailed {
                            window: win.window.to_string(),
                            page: failed_page,
                            source,
                        });
                    }
                };

                self.stats.pages_fetched += 1;
                let page_number = page.info.page;

                let mut kept = Vec::with_capacity(page.issues.len());
                for issue in page.issues {
                    if self.is_out_of_scope(&issue) {
                        self.stats.issues_filtered += 1;
                        debug!(
                            issue_id = issue.id,
                            department = issue.department.as_deref().unwrap_or(""),
                            "Dropping out-of-scope issue"
                        );
                    } else {
                        kept.push(issue);
                    }
                }

                let stored =
                    self.store
                        .persist_issue_page(win.id, win.window.start, &kept, pager.cursor())?;
                self.stats.issues_fetched += stored;
                run_total += stored;

                info!(
                    window = %win.window,
                    page = page_number,
                    stored,
                    total = run_total,
                    "Stored issue page"
                );

                if let Some(cap) = limit {
                    if run_total >= cap {
                        info!(limit = cap, "Reached issue limit - stopping");
                        job.record_success(run_total);
                        return Ok(());
                    }
                }

                if self.shutdown_requested() {
                    info!("Shutdown requested - page persisted, stopping");
                    job.record_success(run_total);
                    return Ok(());
                }
            }

            self.store.mark_window_complete(win.id)?;
            debug!(window = %win.window, "Window complete");
        }

        info!(total = run_total, "Issue crawl complete");
        job.record_success(run_total);
        Ok(())
    }

    /// Fetch comment threads for all issues that don't have them yet.
    ///
    /// A flat iteration, newest issues first; each issue is persisted and
    /// flagged before the next is fetched, so the job resumes per-issue.
    /// `limit` bounds the number of issues processed by this invocation;
    /// `force` clears every issue's fetched flag first.
    pub async fn crawl_comments(
        &mut self,
        limit: Option<u64>,
        force: bool,
    ) -> Result<(), CrawlError> {
        let job = JobMetrics::start("comments");

        if force {
            self.store.reset_comments_fetched()?;
            warn!("Force mode: will re-fetch all comment threads");
        }

        let mut pending = self.store.issues_pending_comments()?;
        if pending.is_empty() {
            info!(
                comments_in_store = self.store.comment_count()?,
                "All issues already have comments fetched; use force to re-fetch"
            );
            job.record_success(0);
            return Ok(());
        }

        if let Some(cap) = limit {
            pending.truncate(cap as usize);
        }

        let total = pending.len() as u64;
        info!(total, "Fetching comment threads");

        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template(
                "{bar:30} {pos}/{len} issues ({per_sec}, ETA {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut run_total: u64 = 0;
        for issue_id in pending {
            if self.shutdown_requested() {
                bar.abandon();
                info!(
                    processed = run_total,
                    "Shutdown requested - comment fetch stopping"
                );
                job.record_success(self.stats.comments_fetched);
                return Ok(());
            }

            let comments = match self.source.fetch_comments(issue_id).await {
                Ok(comments) => comments,
                Err(source) => {
                    bar.abandon();
                    job.record_failure(&source.to_string());
                    return Err(CrawlError::CommentJobFailed { issue_id, source });
                }
            };

            let stored = self.store.persist_comments(issue_id, &comments)?;
            self.stats.comments_fetched += stored;
            run_total += 1;
            bar.inc(1);

            debug!(issue_id, comments = stored, "Stored comment thread");
        }

        bar.finish();
        info!(
            issues_processed = run_total,
            comments = self.stats.comments_fetched,
            "Comment crawl complete"
        );
        job.record_success(self.stats.comments_fetched);
        Ok(())
    }

    /// Full crawl: issues then comments.
    pub async fn crawl_all(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        issue_limit: Option<u64>,
        comment_limit: Option<u64>,
        force: bool,
    ) -> Result<CrawlStats, CrawlError> {
        self.crawl_issues(start, end, issue_limit, force).await?;
        self.crawl_comments(comment_limit, force).await?;
        Ok(self.stats.clone())
    }
}
