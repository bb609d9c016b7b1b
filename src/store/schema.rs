//! SQLite schema for the issue store and crawl checkpoints.

use rusqlite::Connection;

/// Full schema, applied idempotently on every open.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY,
    status TEXT,
    summary TEXT,
    description TEXT,
    lat REAL,
    lng REAL,
    address TEXT,
    created_at TEXT,
    updated_at TEXT,
    closed_at TEXT,
    acknowledged_at TEXT,
    request_type TEXT,
    department TEXT,
    html_url TEXT,
    comment_count INTEGER NOT NULL DEFAULT 0,
    reporter_id INTEGER,
    reporter_name TEXT,
    comments_fetched INTEGER NOT NULL DEFAULT 0,
    window_start TEXT,
    fetched_at TEXT
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY,
    issue_id INTEGER NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    created_at TEXT,
    updated_at TEXT,
    commenter_id INTEGER,
    commenter_name TEXT,
    commenter_role TEXT,
    fetched_at TEXT,
    FOREIGN KEY (issue_id) REFERENCES issues(id)
);

CREATE TABLE IF NOT EXISTS crawl_windows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    window_start TEXT NOT NULL,
    window_end TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    next_page INTEGER NOT NULL DEFAULT 1,
    issues_fetched INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    completed_at TEXT,
    UNIQUE (window_start, window_end)
);

CREATE INDEX IF NOT EXISTS idx_comments_issue_id ON comments(issue_id);
CREATE INDEX IF NOT EXISTS idx_comments_commenter_role ON comments(commenter_role);
CREATE INDEX IF NOT EXISTS idx_issues_created_at ON issues(created_at);
CREATE INDEX IF NOT EXISTS idx_issues_department ON issues(department);
CREATE INDEX IF NOT EXISTS idx_issues_comments_fetched ON issues(comments_fetched);
CREATE INDEX IF NOT EXISTS idx_crawl_windows_status ON crawl_windows(status);
";

/// Create all tables and indices if they do not exist.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
