//! Scripted [`IssueSource`] for orchestrator tests.
//!
//! Replays canned pages keyed by (window start, page number), injects
//! terminal failures on demand, and records every listing call so tests can
//! assert exactly which pages a resumed crawl re-fetched.

use async_trait::async_trait;
use seeclickfix_crawler::crawler::DateWindow;
use seeclickfix_crawler::fetcher::{FetchError, FetchResult, IssuePage, IssueSource, PageInfo};
use seeclickfix_crawler::{Comment, Issue};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

type PageKey = (String, u32);

/// Test double replaying scripted issue pages and comment threads.
#[derive(Default)]
pub struct ScriptedSource {
    pages: Mutex<HashMap<PageKey, (Vec<Issue>, Option<u32>)>>,
    comments: Mutex<HashMap<i64, Vec<Comment>>>,
    failures: Mutex<HashSet<PageKey>>,
    issue_calls: Mutex<Vec<PageKey>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one listing page for the window starting at `start` (ISO date).
    pub fn add_page(&self, start: &str, page: u32, issues: Vec<Issue>, next_page: Option<u32>) {
        self.pages
            .lock()
            .unwrap()
            .insert((start.to_string(), page), (issues, next_page));
    }

    /// Script the comment thread for an issue.
    pub fn add_comments(&self, issue_id: i64, comments: Vec<Comment>) {
        self.comments.lock().unwrap().insert(issue_id, comments);
    }

    /// Make one listing page fail terminally (as if retries were exhausted).
    pub fn fail_page(&self, start: &str, page: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert((start.to_string(), page));
    }

    /// Remove all injected failures (the "service recovered" phase).
    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Listing calls made so far, in order.
    pub fn issue_calls(&self) -> Vec<PageKey> {
        self.issue_calls.lock().unwrap().clone()
    }

    /// Forget recorded calls (to scope assertions to one crawl phase).
    pub fn reset_call_log(&self) {
        self.issue_calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl IssueSource for ScriptedSource {
    async fn fetch_issues_page(&self, window: &DateWindow, page: u32) -> FetchResult<IssuePage> {
        let key = (window.start.to_string(), page);
        self.issue_calls.lock().unwrap().push(key.clone());

        if self.failures.lock().unwrap().contains(&key) {
            let url = format!("http://scripted/issues?page={page}");
            return Err(FetchError::RetriesExhausted {
                url: url.clone(),
                attempts: 6,
                last: Box::new(FetchError::ServerError {
                    url,
                    status: 503,
                    attempt: 6,
                }),
            });
        }

        let (issues, next_page) = self
            .pages
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or((vec![], None));

        Ok(IssuePage {
            issues,
            skipped: 0,
            info: PageInfo {
                page,
                pages: None,
                next_page,
            },
        })
    }

    async fn fetch_comments(&self, issue_id: i64) -> FetchResult<Vec<Comment>> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .get(&issue_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// An issue attributed to the in-scope organization.
pub fn issue(id: i64) -> Issue {
    issue_with_department(id, "Jersey City DPW")
}

/// An issue attributed to an arbitrary organization.
pub fn issue_with_department(id: i64, department: &str) -> Issue {
    Issue {
        id,
        status: Some("open".to_string()),
        summary: Some(format!("Scripted issue {id}")),
        description: None,
        lat: Some(40.72),
        lng: Some(-74.05),
        address: None,
        created_at: Some(format!("2024-01-01T00:{:02}:{:02}Z", id / 60, id % 60)),
        updated_at: None,
        closed_at: None,
        acknowledged_at: None,
        request_type: Some("Pothole".to_string()),
        department: Some(department.to_string()),
        html_url: None,
        comment_count: 0,
        reporter_id: None,
        reporter_name: None,
    }
}

/// A comment by a verified official.
pub fn official_comment(id: i64, issue_id: i64, body: &str) -> Comment {
    Comment {
        id,
        issue_id,
        body: body.to_string(),
        created_at: Some("2024-02-01T09:00:00Z".to_string()),
        updated_at: None,
        commenter_id: Some(12),
        commenter_name: Some("DPW Dispatch".to_string()),
        commenter_role: Some("Verified Official".to_string()),
    }
}
