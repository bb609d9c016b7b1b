//! Crash/resume scenarios for the windowed issue crawl.
//!
//! The central scenario: a 3-month range with monthly windows and a forced
//! failure in month 2, page 2. Month 1 must end fully persisted and
//! checkpointed complete, month 2 checkpointed at the failed page, month 3
//! untouched; resuming must re-fetch only month 2 page 2 onward.

use crate::support::scripted::{issue, ScriptedSource};
use chrono::NaiveDate;
use seeclickfix_crawler::config::CrawlConfig;
use seeclickfix_crawler::crawler::{CrawlError, Crawler, DateWindow};
use seeclickfix_crawler::store::{SqliteStore, WindowStatus};
use std::path::Path;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn january() -> DateWindow {
    DateWindow::new(date(2024, 1, 1), date(2024, 1, 31))
}

fn february() -> DateWindow {
    DateWindow::new(date(2024, 2, 1), date(2024, 2, 29))
}

fn march() -> DateWindow {
    DateWindow::new(date(2024, 3, 1), date(2024, 3, 31))
}

/// Three months of scripted pages: one page in January, two in February,
/// one in March.
fn three_month_source() -> Arc<ScriptedSource> {
    let source = Arc::new(ScriptedSource::new());
    source.add_page("2024-01-01", 1, vec![issue(1), issue(2)], None);
    source.add_page("2024-02-01", 1, vec![issue(3), issue(4)], Some(2));
    source.add_page("2024-02-01", 2, vec![issue(5), issue(6)], None);
    source.add_page("2024-03-01", 1, vec![issue(7)], None);
    source
}

fn stored_issue_ids(store: &SqliteStore) -> Vec<i64> {
    let mut ids: Vec<i64> = (1..=7)
        .filter(|id| store.get_issue(*id).unwrap().is_some())
        .collect();
    ids.sort_unstable();
    ids
}

async fn crawl(source: &Arc<ScriptedSource>, db: &Path) -> Result<SqliteStore, CrawlError> {
    let store = SqliteStore::open(db).unwrap();
    let mut crawler = Crawler::new(source.clone(), store, CrawlConfig::default());
    let result = crawler
        .crawl_issues(date(2024, 1, 1), date(2024, 3, 31), None, false)
        .await;
    result.map(|_| crawler.into_store())
}

#[tokio::test]
async fn test_failure_in_month_two_page_two_checkpoints_exactly() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("crawl.db");

    let source = three_month_source();
    source.fail_page("2024-02-01", 2);

    let err = crawl(&source, &db).await.unwrap_err();
    match err {
        CrawlError::IssueJobFailed { window, page, .. } => {
            assert_eq!(window, "2024-02-01..2024-02-29");
            assert_eq!(page, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    let store = SqliteStore::open(&db).unwrap();
    // Month 1 fully persisted and complete.
    assert_eq!(store.window_status(&january()).unwrap(), Some(WindowStatus::Completed));
    // Month 2 checkpointed at page 1's cursor, not complete.
    assert_eq!(store.window_status(&february()).unwrap(), Some(WindowStatus::InProgress));
    assert_eq!(store.resume_cursor(&february()).unwrap(), Some(2));
    // Month 3 untouched.
    assert_eq!(store.window_status(&march()).unwrap(), Some(WindowStatus::Pending));
    assert!(!source
        .issue_calls()
        .iter()
        .any(|(start, _)| start == "2024-03-01"));

    // Only the records persisted before the failure are in the store.
    assert_eq!(stored_issue_ids(&store), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_resume_refetches_only_the_failed_page_onward() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("crawl.db");

    let source = three_month_source();
    source.fail_page("2024-02-01", 2);
    crawl(&source, &db).await.unwrap_err();

    // Service recovered; run the same command again.
    source.clear_failures();
    source.reset_call_log();
    let store = crawl(&source, &db).await.unwrap();

    // Resumption re-fetched only month 2 page 2 onward.
    assert_eq!(
        source.issue_calls(),
        vec![
            ("2024-02-01".to_string(), 2),
            ("2024-03-01".to_string(), 1),
        ]
    );

    assert_eq!(stored_issue_ids(&store), vec![1, 2, 3, 4, 5, 6, 7]);
    for window in [january(), february(), march()] {
        assert!(store.is_window_complete(&window).unwrap());
    }
}

#[tokio::test]
async fn test_interrupted_then_resumed_equals_uninterrupted_run() {
    // Interrupted path.
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("interrupted.db");
    let source = three_month_source();
    source.fail_page("2024-02-01", 2);
    crawl(&source, &db).await.unwrap_err();
    source.clear_failures();
    let resumed = crawl(&source, &db).await.unwrap();

    // Uninterrupted path against a fresh store.
    let clean_db = dir.path().join("clean.db");
    let clean_source = three_month_source();
    let clean = crawl(&clean_source, &clean_db).await.unwrap();

    assert_eq!(stored_issue_ids(&resumed), stored_issue_ids(&clean));
    assert_eq!(resumed.issue_count().unwrap(), clean.issue_count().unwrap());
}

#[tokio::test]
async fn test_rerun_after_completion_fetches_nothing() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("crawl.db");

    let source = three_month_source();
    crawl(&source, &db).await.unwrap();

    source.reset_call_log();
    let store = crawl(&source, &db).await.unwrap();

    // Re-running the same command must not re-fetch completed windows.
    assert!(source.issue_calls().is_empty());
    assert_eq!(stored_issue_ids(&store), vec![1, 2, 3, 4, 5, 6, 7]);
}

#[tokio::test]
async fn test_force_reset_recrawls_from_scratch() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("crawl.db");

    let source = three_month_source();
    crawl(&source, &db).await.unwrap();
    source.reset_call_log();

    let store = SqliteStore::open(&db).unwrap();
    let mut crawler = Crawler::new(source.clone(), store, CrawlConfig::default());
    crawler
        .crawl_issues(date(2024, 1, 1), date(2024, 3, 31), None, true)
        .await
        .unwrap();

    // Every window was crawled again from page 1.
    let calls = source.issue_calls();
    assert!(calls.contains(&("2024-01-01".to_string(), 1)));
    assert!(calls.contains(&("2024-02-01".to_string(), 1)));
    assert!(calls.contains(&("2024-03-01".to_string(), 1)));
    // Upserts keep the store duplicate-free.
    assert_eq!(crawler.into_store().issue_count().unwrap(), 7);
}
