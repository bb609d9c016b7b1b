//! Pull-based pagination over one date window's issue query.
//!
//! The pager is a restartable sequence: it fetches the next page only when
//! asked, and its cursor is a plain page number the checkpoint store can
//! persist. A failed fetch leaves the cursor on the failed page, so resuming
//! from the last checkpointed cursor re-fetches exactly the page that was
//! lost and nothing before it.

use crate::crawler::windows::DateWindow;
use crate::fetcher::{FetchResult, IssuePage, IssueSource};
use tracing::{debug, warn};

/// Lazy, finite sequence of issue pages for a single window query.
pub struct IssuePager<'a, S: IssueSource + ?Sized> {
    source: &'a S,
    window: DateWindow,
    cursor: u32,
    finished: bool,
    result_cap: u32,
    consumed: u32,
    cap_warned: bool,
}

impl<'a, S: IssueSource + ?Sized> IssuePager<'a, S> {
    /// Create a pager starting at `start_page` (1 for a fresh window, or the
    /// cursor saved by a previous run).
    pub fn new(source: &'a S, window: DateWindow, start_page: u32, result_cap: u32) -> Self {
        Self {
            source,
            window,
            cursor: start_page.max(1),
            finished: false,
            result_cap,
            consumed: 0,
            cap_warned: false,
        }
    }

    /// The next page to fetch. After a successful [`IssuePager::next_page`]
    /// this is the resumption cursor to checkpoint.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Whether the sequence has terminated.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next page, or `None` when the query is exhausted.
    ///
    /// On error the cursor is left on the failed page; the error carries the
    /// fetch classification for the caller to surface.
    pub async fn next_page(&mut self) -> FetchResult<Option<IssuePage>> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .source
            .fetch_issues_page(&self.window, self.cursor)
            .await?;

        if page.issues.is_empty() && page.skipped == 0 {
            debug!(
                window = %self.window,
                page = self.cursor,
                "Empty page: window exhausted"
            );
            self.finished = true;
            return Ok(None);
        }

        self.consumed += page.issues.len() as u32 + page.skipped as u32;

        match page.info.next_page {
            // Only a forward-moving next_page advances the cursor; anything
            // else ends the sequence rather than looping.
            Some(next) if next > self.cursor => self.cursor = next,
            _ => self.finished = true,
        }

        if !self.finished && self.consumed >= self.result_cap && !self.cap_warned {
            self.cap_warned = true;
            warn!(
                window = %self.window,
                consumed = self.consumed,
                result_cap = self.result_cap,
                "Window query reached the per-query result cap; results beyond \
                 the cap are not returned by the service - narrow the window"
            );
        }

        Ok(Some(page))
    }
}
