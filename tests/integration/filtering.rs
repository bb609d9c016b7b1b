//! Out-of-scope organization filtering.

use crate::support::scripted::{issue, issue_with_department, official_comment, ScriptedSource};
use chrono::NaiveDate;
use seeclickfix_crawler::config::CrawlConfig;
use seeclickfix_crawler::crawler::Crawler;
use seeclickfix_crawler::store::SqliteStore;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_kearny_issue_is_fetched_but_never_persisted() {
    let source = Arc::new(ScriptedSource::new());
    source.add_page(
        "2024-01-01",
        1,
        vec![
            issue(1),
            issue_with_department(2, "Town of Kearny"),
            issue_with_department(3, "City of Newark"),
            issue(4),
        ],
        None,
    );

    let store = SqliteStore::open_in_memory().unwrap();
    let mut crawler = Crawler::new(source.clone(), store, CrawlConfig::default());
    crawler
        .crawl_issues(date(2024, 1, 1), date(2024, 1, 31), None, false)
        .await
        .unwrap();

    assert_eq!(crawler.stats().issues_fetched, 2);
    assert_eq!(crawler.stats().issues_filtered, 2);

    let store = crawler.into_store();
    assert_eq!(store.issue_count().unwrap(), 2);
    assert!(store.get_issue(2).unwrap().is_none());
    assert!(store.get_issue(3).unwrap().is_none());
}

#[tokio::test]
async fn test_filtered_issues_do_not_count_toward_issue_limit() {
    let source = Arc::new(ScriptedSource::new());
    source.add_page(
        "2024-01-01",
        1,
        vec![
            issue_with_department(1, "Town of Kearny"),
            issue(2),
            issue_with_department(3, "Town of Kearny"),
            issue(4),
        ],
        Some(2),
    );
    source.add_page("2024-01-01", 2, vec![issue(5)], None);

    let store = SqliteStore::open_in_memory().unwrap();
    let mut crawler = Crawler::new(source, store, CrawlConfig::default());
    // Limit of 3 persisted issues: the two Kearny records must not consume it.
    crawler
        .crawl_issues(date(2024, 1, 1), date(2024, 1, 31), Some(3), false)
        .await
        .unwrap();

    let store = crawler.into_store();
    assert_eq!(store.issue_count().unwrap(), 3);
    assert!(store.get_issue(5).unwrap().is_some());
}

#[tokio::test]
async fn test_filtered_issue_never_reaches_the_comment_job() {
    let source = Arc::new(ScriptedSource::new());
    source.add_page(
        "2024-01-01",
        1,
        vec![issue(1), issue_with_department(2, "Town of Kearny")],
        None,
    );
    source.add_comments(1, vec![official_comment(10, 1, "Filled.")]);
    source.add_comments(2, vec![official_comment(20, 2, "Should never be stored.")]);

    let store = SqliteStore::open_in_memory().unwrap();
    let mut crawler = Crawler::new(source, store, CrawlConfig::default());
    crawler
        .crawl_all(date(2024, 1, 1), date(2024, 1, 31), None, None, false)
        .await
        .unwrap();

    let store = crawler.into_store();
    assert_eq!(store.comment_count().unwrap(), 1);
    assert_eq!(store.comments_for_issue(1).unwrap().len(), 1);
    assert!(store.comments_for_issue(2).unwrap().is_empty());
}

#[tokio::test]
async fn test_excluded_orgs_are_configurable() {
    let source = Arc::new(ScriptedSource::new());
    source.add_page(
        "2024-01-01",
        1,
        vec![issue_with_department(1, "Town of Kearny"), issue(2)],
        None,
    );

    let config = CrawlConfig {
        excluded_orgs: vec![],
        ..CrawlConfig::default()
    };
    let store = SqliteStore::open_in_memory().unwrap();
    let mut crawler = Crawler::new(source, store, config);
    crawler
        .crawl_issues(date(2024, 1, 1), date(2024, 1, 31), None, false)
        .await
        .unwrap();

    // With no exclusions configured, everything the query returns is kept.
    assert_eq!(crawler.into_store().issue_count().unwrap(), 2);
}
