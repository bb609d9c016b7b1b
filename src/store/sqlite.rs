//! SQLite-backed record store and checkpoint store.

use crate::crawler::windows::DateWindow;
use crate::store::schema::initialize_schema;
use crate::store::StoreError;
use crate::{Comment, Issue};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

/// Checkpoint status of one crawl window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// Never started
    Pending,
    /// Started but not finished; `next_page` is the resumption cursor
    InProgress,
    /// Every page of the window's query has been persisted
    Completed,
}

impl WindowStatus {
    fn to_db_string(self) -> &'static str {
        match self {
            WindowStatus::Pending => "pending",
            WindowStatus::InProgress => "in_progress",
            WindowStatus::Completed => "completed",
        }
    }

    fn from_db_string(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(WindowStatus::Pending),
            "in_progress" => Ok(WindowStatus::InProgress),
            "completed" => Ok(WindowStatus::Completed),
            other => Err(StoreError::Corrupt(format!(
                "unknown window status: {other}"
            ))),
        }
    }
}

/// One checkpoint row: a date window plus its crawl progress.
#[derive(Debug, Clone)]
pub struct CrawlWindow {
    /// Row id
    pub id: i64,
    /// The date window this checkpoint describes
    pub window: DateWindow,
    /// Crawl status
    pub status: WindowStatus,
    /// Next page to fetch when resuming
    pub next_page: u32,
    /// Issues persisted from this window so far
    pub issues_fetched: u64,
}

/// SQLite store for issues, comments, and crawl checkpoints.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 30000;",
        )?;
        initialize_schema(&conn)?;

        debug!(path = %path.display(), "Opened store");
        Ok(Self { conn })
    }

    /// Open an in-memory store (tests and dry runs).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== Window checkpoints =====

    /// Insert checkpoint rows for any windows not already tracked.
    ///
    /// Existing rows keep their status and cursor untouched, so re-running
    /// the same date range reconstructs exactly the remaining work.
    pub fn ensure_windows(&mut self, windows: &[DateWindow]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut added = 0;
        for window in windows {
            added += tx.execute(
                "INSERT OR IGNORE INTO crawl_windows (window_start, window_end)
                 VALUES (?1, ?2)",
                params![window.start.to_string(), window.end.to_string()],
            )?;
        }
        tx.commit()?;

        if added > 0 {
            info!(added, "Added new crawl windows");
        } else {
            debug!(total = windows.len(), "All crawl windows already tracked");
        }
        Ok(added)
    }

    /// All windows not yet completed, oldest first.
    pub fn pending_windows(&self) -> Result<Vec<CrawlWindow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, window_start, window_end, status, next_page, issues_fetched
             FROM crawl_windows
             WHERE status != 'completed'
             ORDER BY window_start",
        )?;
        let rows = stmt.query_map([], row_to_window)?;

        let mut windows = Vec::new();
        for row in rows {
            windows.push(row??);
        }
        Ok(windows)
    }

    /// Count of completed windows.
    pub fn completed_window_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawl_windows WHERE status = 'completed'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Whether every page of the window's query has been persisted.
    pub fn is_window_complete(&self, window: &DateWindow) -> Result<bool, StoreError> {
        Ok(self.window_status(window)? == Some(WindowStatus::Completed))
    }

    /// Checkpoint status for a window, or `None` if it was never tracked.
    pub fn window_status(&self, window: &DateWindow) -> Result<Option<WindowStatus>, StoreError> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM crawl_windows WHERE window_start = ?1 AND window_end = ?2",
                params![window.start.to_string(), window.end.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        status.map(|s| WindowStatus::from_db_string(&s)).transpose()
    }

    /// Last saved mid-window cursor, or `None` if the window was never started.
    pub fn resume_cursor(&self, window: &DateWindow) -> Result<Option<u32>, StoreError> {
        let cursor: Option<u32> = self
            .conn
            .query_row(
                "SELECT next_page FROM crawl_windows
                 WHERE window_start = ?1 AND window_end = ?2 AND status != 'pending'",
                params![window.start.to_string(), window.end.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cursor)
    }

    /// Mark a window as being crawled.
    pub fn mark_window_in_progress(&mut self, window_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE crawl_windows SET status = 'in_progress', started_at = ?1 WHERE id = ?2",
            params![now_rfc3339(), window_id],
        )?;
        Ok(())
    }

    /// Durably record window completion. Idempotent: marking a completed
    /// window again is a no-op.
    pub fn mark_window_complete(&mut self, window_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE crawl_windows SET status = 'completed', completed_at = ?1
             WHERE id = ?2 AND status != 'completed'",
            params![now_rfc3339(), window_id],
        )?;
        Ok(())
    }

    /// Delete all window checkpoints (force re-crawl).
    pub fn reset_windows(&mut self) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM crawl_windows", [])?;
        Ok(())
    }

    /// Window counts grouped by status, for operator-facing stats.
    pub fn window_counts_by_status(&self) -> Result<Vec<(String, u64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM crawl_windows GROUP BY status ORDER BY status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    // ===== Issues =====

    /// Persist one page of issues and advance the window cursor in a single
    /// transaction.
    ///
    /// Interruption therefore loses at most the one in-flight page: either
    /// both the records and the cursor advance land, or neither does.
    pub fn persist_issue_page(
        &mut self,
        window_id: i64,
        window_start: NaiveDate,
        issues: &[Issue],
        next_page: u32,
    ) -> Result<u64, StoreError> {
        let fetched_at = now_rfc3339();
        let window_label = window_start.to_string();

        let tx = self.conn.transaction()?;
        for issue in issues {
            upsert_issue(&tx, issue, &window_label, &fetched_at)?;
        }
        tx.execute(
            "UPDATE crawl_windows
             SET next_page = ?1, issues_fetched = issues_fetched + ?2
             WHERE id = ?3",
            params![next_page, issues.len() as i64, window_id],
        )?;
        tx.commit()?;

        Ok(issues.len() as u64)
    }

    /// Total issues in the store.
    pub fn issue_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Fetch a single issue by id.
    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>, StoreError> {
        let issue = self
            .conn
            .query_row(
                "SELECT id, status, summary, description, lat, lng, address,
                        created_at, updated_at, closed_at, acknowledged_at,
                        request_type, department, html_url, comment_count,
                        reporter_id, reporter_name
                 FROM issues WHERE id = ?1",
                params![id],
                row_to_issue,
            )
            .optional()?;
        Ok(issue)
    }

    // ===== Comments =====

    /// Issues whose comment threads have not been fetched, newest first.
    pub fn issues_pending_comments(&self) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM issues WHERE comments_fetched = 0 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Persist an issue's comments and mark the issue fetched in a single
    /// transaction, the per-item equivalent of a window checkpoint.
    pub fn persist_comments(
        &mut self,
        issue_id: i64,
        comments: &[Comment],
    ) -> Result<u64, StoreError> {
        let fetched_at = now_rfc3339();

        let tx = self.conn.transaction()?;
        for comment in comments {
            tx.execute(
                "INSERT OR REPLACE INTO comments
                 (id, issue_id, body, created_at, updated_at,
                  commenter_id, commenter_name, commenter_role, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    comment.id,
                    comment.issue_id,
                    comment.body,
                    comment.created_at,
                    comment.updated_at,
                    comment.commenter_id,
                    comment.commenter_name,
                    comment.commenter_role,
                    fetched_at,
                ],
            )?;
        }
        tx.execute(
            "UPDATE issues SET comments_fetched = 1 WHERE id = ?1",
            params![issue_id],
        )?;
        tx.commit()?;

        Ok(comments.len() as u64)
    }

    /// Total comments in the store.
    pub fn comment_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Comments stored for one issue, oldest first.
    pub fn comments_for_issue(&self, issue_id: i64) -> Result<Vec<Comment>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, issue_id, body, created_at, updated_at,
                    commenter_id, commenter_name, commenter_role
             FROM comments WHERE issue_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![issue_id], row_to_comment)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    /// Count of issues whose comment threads have been fetched.
    pub fn issues_with_comments_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM issues WHERE comments_fetched = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Clear every issue's `comments_fetched` flag (force re-fetch).
    pub fn reset_comments_fetched(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute("UPDATE issues SET comments_fetched = 0", [])?;
        Ok(())
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Upsert an issue, preserving `comments_fetched` once set so a re-crawled
/// listing does not force comment threads to be fetched again.
fn upsert_issue(
    tx: &rusqlite::Transaction<'_>,
    issue: &Issue,
    window_label: &str,
    fetched_at: &str,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO issues
         (id, status, summary, description, lat, lng, address,
          created_at, updated_at, closed_at, acknowledged_at,
          request_type, department, html_url, comment_count,
          reporter_id, reporter_name, window_start, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                 ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
         ON CONFLICT(id) DO UPDATE SET
             status = excluded.status,
             summary = excluded.summary,
             description = excluded.description,
             lat = excluded.lat,
             lng = excluded.lng,
             address = excluded.address,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at,
             closed_at = excluded.closed_at,
             acknowledged_at = excluded.acknowledged_at,
             request_type = excluded.request_type,
             department = excluded.department,
             html_url = excluded.html_url,
             comment_count = excluded.comment_count,
             reporter_id = excluded.reporter_id,
             reporter_name = excluded.reporter_name,
             window_start = excluded.window_start,
             fetched_at = excluded.fetched_at",
        params![
            issue.id,
            issue.status,
            issue.summary,
            issue.description,
            issue.lat,
            issue.lng,
            issue.address,
            issue.created_at,
            issue.updated_at,
            issue.closed_at,
            issue.acknowledged_at,
            issue.request_type,
            issue.department,
            issue.html_url,
            issue.comment_count,
            issue.reporter_id,
            issue.reporter_name,
            window_label,
            fetched_at,
        ],
    )?;
    Ok(())
}

#[allow(clippy::type_complexity)]
fn row_to_window(row: &Row<'_>) -> rusqlite::Result<Result<CrawlWindow, StoreError>> {
    let start_text: String = row.get(1)?;
    let end_text: String = row.get(2)?;
    let status_text: String = row.get(3)?;

    Ok(parse_window_fields(
        row.get(0)?,
        &start_text,
        &end_text,
        &status_text,
        row.get(4)?,
        row.get::<_, i64>(5)? as u64,
    ))
}

fn parse_window_fields(
    id: i64,
    start_text: &str,
    end_text: &str,
    status_text: &str,
    next_page: u32,
    issues_fetched: u64,
) -> Result<CrawlWindow, StoreError> {
    let start: NaiveDate = start_text
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("bad window_start date: {start_text}")))?;
    let end: NaiveDate = end_text
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("bad window_end date: {end_text}")))?;

    Ok(CrawlWindow {
        id,
        window: DateWindow::new(start, end),
        status: WindowStatus::from_db_string(status_text)?,
        next_page,
        issues_fetched,
    })
}

fn row_to_issue(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        status: row.get(1)?,
        summary: row.get(2)?,
        description: row.get(3)?,
        lat: row.get(4)?,
        lng: row.get(5)?,
        address: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        closed_at: row.get(9)?,
        acknowledged_at: row.get(10)?,
        request_type: row.get(11)?,
        department: row.get(12)?,
        html_url: row.get(13)?,
        comment_count: row.get(14)?,
        reporter_id: row.get(15)?,
        reporter_name: row.get(16)?,
    })
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        issue_id: row.get(1)?,
        body: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        commenter_id: row.get(5)?,
        commenter_name: row.get(6)?,
        commenter_role: row.get(7)?,
    })
}
