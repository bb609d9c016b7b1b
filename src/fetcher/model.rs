//! Wire-format decoding for SeeClickFix v2 API responses.
//!
//! Decoding is lenient at the record level: the issue and comment arrays are
//! taken apart element by element, and a single malformed record is skipped
//! and logged instead of failing the page. Only a body that is not the
//! expected envelope at all is a terminal [`FetchError::MalformedPayload`].

use crate::fetcher::{FetchError, FetchResult};
use crate::{Comment, Issue};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One page of issue-listing results plus pagination metadata.
#[derive(Debug, Clone)]
pub struct IssuePage {
    /// Successfully decoded issues, in listing order
    pub issues: Vec<Issue>,
    /// Count of malformed records skipped while decoding this page
    pub skipped: usize,
    /// Pagination metadata for cursor advancement
    pub info: PageInfo,
}

/// Pagination metadata returned with each listing page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageInfo {
    /// The page this metadata describes
    #[serde(default)]
    pub page: u32,
    /// Total pages for the query, when the service reports it
    #[serde(default)]
    pub pages: Option<u32>,
    /// Next page to request; `None` when the query is exhausted
    #[serde(default)]
    pub next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawPerson {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: i64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    closed_at: Option<String>,
    #[serde(default)]
    acknowledged_at: Option<String>,
    /// Either an object `{"title": ..., "organization": ...}` or a bare string
    #[serde(default)]
    request_type: Option<Value>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    comment_count: Option<i64>,
    #[serde(default)]
    reporter: Option<RawPerson>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    commenter: Option<RawPerson>,
    #[serde(default)]
    flag_url: Option<String>,
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        let (rt_title, rt_org) = match &raw.request_type {
            Some(Value::Object(map)) => (
                map.get("title").and_then(Value::as_str).map(str::to_string),
                map.get("organization")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
            Some(Value::String(title)) => (Some(title.clone()), None),
            _ => (None, None),
        };

        // The responsible organization when present, otherwise the request
        // type title stands in for it (matches the listing endpoint's data).
        let department = rt_org.or_else(|| rt_title.clone());

        let html_url = raw
            .html_url
            .unwrap_or_else(|| format!("https://seeclickfix.com/issues/{}", raw.id));

        Issue {
            id: raw.id,
            status: raw.status,
            summary: raw.summary,
            description: raw.description,
            lat: raw.lat,
            lng: raw.lng,
            address: raw.address,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            closed_at: raw.closed_at,
            acknowledged_at: raw.acknowledged_at,
            request_type: rt_title,
            department,
            html_url: Some(html_url),
            comment_count: raw.comment_count.unwrap_or(0),
            reporter_id: raw.reporter.as_ref().and_then(|r| r.id),
            reporter_name: raw.reporter.and_then(|r| r.name),
        }
    }
}

/// Decode an issue-listing response body.
///
/// Skips malformed elements of the `issues` array; fails only when the
/// envelope itself is missing.
pub fn decode_issue_page(url: &str, body: Value) -> FetchResult<IssuePage> {
    let mut envelope = match body {
        Value::Object(map) => map,
        other => {
            return Err(FetchError::MalformedPayload {
                url: url.to_string(),
                detail: format!("expected JSON object, got {}", json_kind(&other)),
            })
        }
    };

    let raw_issues = match envelope.remove("issues") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(FetchError::MalformedPayload {
                url: url.to_string(),
                detail: format!("`issues` is not an array, got {}", json_kind(&other)),
            })
        }
        None => {
            return Err(FetchError::MalformedPayload {
                url: url.to_string(),
                detail: "`issues` field missing from response".to_string(),
            })
        }
    };

    let info = envelope
        .remove("metadata")
        .and_then(|mut m| m.get_mut("pagination").map(Value::take))
        .and_then(|p| serde_json::from_value::<PageInfo>(p).ok())
        .unwrap_or_default();

    let mut issues = Vec::with_capacity(raw_issues.len());
    let mut skipped = 0;
    for raw in raw_issues {
        match serde_json::from_value::<RawIssue>(raw) {
            Ok(raw) => issues.push(Issue::from(raw)),
            Err(e) => {
                skipped += 1;
                warn!(url, error = %e, "Skipping malformed issue record");
            }
        }
    }

    Ok(IssuePage {
        issues,
        skipped,
        info,
    })
}

/// Decode a comment-listing response body for one issue.
///
/// Skips malformed elements of the `comments` array.
pub fn decode_comments(url: &str, issue_id: i64, body: Value) -> FetchResult<Vec<Comment>> {
    let raw_comments = match body {
        Value::Object(mut map) => match map.remove("comments") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(FetchError::MalformedPayload {
                    url: url.to_string(),
                    detail: format!("`comments` is not an array, got {}", json_kind(&other)),
                })
            }
            None => {
                return Err(FetchError::MalformedPayload {
                    url: url.to_string(),
                    detail: "`comments` field missing from response".to_string(),
                })
            }
        },
        other => {
            return Err(FetchError::MalformedPayload {
                url: url.to_string(),
                detail: format!("expected JSON object, got {}", json_kind(&other)),
            })
        }
    };

    let mut comments = Vec::with_capacity(raw_comments.len());
    for raw in raw_comments {
        match serde_json::from_value::<RawComment>(raw) {
            Ok(raw) => comments.push(comment_from_raw(issue_id, raw)),
            Err(e) => {
                warn!(url, issue_id, error = %e, "Skipping malformed comment record");
            }
        }
    }

    Ok(comments)
}

fn comment_from_raw(issue_id: i64, raw: RawComment) -> Comment {
    let body = raw.comment.unwrap_or_default();
    let id = raw
        .flag_url
        .as_deref()
        .and_then(comment_id_from_flag_url)
        .unwrap_or_else(|| fallback_comment_id(issue_id, raw.created_at.as_deref(), &body));

    Comment {
        id,
        issue_id,
        body,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        commenter_id: raw.commenter.as_ref().and_then(|c| c.id),
        commenter_name: raw.commenter.as_ref().and_then(|c| c.name.clone()),
        commenter_role: raw.commenter.and_then(|c| c.role),
    }
}

/// Extract the comment id from a flag URL like `.../comments/12345/flag`.
fn comment_id_from_flag_url(flag_url: &str) -> Option<i64> {
    let rest = flag_url.split("/comments/").nth(1)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|id| *id > 0)
}

/// Deterministic fallback id for comments whose flag URL is missing.
///
/// FNV-1a over issue id, timestamp, and a body prefix, folded into the
/// positive 31-bit range. Stable across runs so re-crawls upsert instead of
/// duplicating.
fn fallback_comment_id(issue_id: i64, created_at: Option<&str>, body: &str) -> i64 {
    let prefix: String = body.chars().take(50).collect();
    let key = format!("{issue_id}:{}:{prefix}", created_at.unwrap_or(""));

    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }

    (hash % (1 << 31)) as i64
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
