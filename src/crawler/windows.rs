//! Date-window splitting.
//!
//! The search endpoint caps total results per distinct query (observed near
//! 1000) regardless of how many issues actually match. Splitting a date range
//! into calendar-month windows and crawling each as an independent paginated
//! query keeps every query comfortably under the cap.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive day range crawled as one paginated query.
///
/// Identity for checkpointing is the `(start, end)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day of the window (inclusive)
    pub start: NaiveDate,
    /// Last day of the window (inclusive)
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a window. `start` must not be after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "window start after end");
        Self { start, end }
    }

    /// `after` query parameter: start of the first day, UTC.
    pub fn after_param(&self) -> String {
        format!("{}T00:00:00Z", self.start.format("%Y-%m-%d"))
    }

    /// `before` query parameter: end of the last day, UTC.
    pub fn before_param(&self) -> String {
        format!("{}T23:59:59Z", self.end.format("%Y-%m-%d"))
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Split `[start, end]` into windows of `months` calendar months.
///
/// Windows cover every day in the range exactly once, in chronological order:
/// the first window runs from `start` to the end of its month span, each
/// subsequent window starts the day after its predecessor ends, and a partial
/// final window is truncated to `end`, never extended past it. Returns an
/// empty sequence when `start > end`.
pub fn month_windows(start: NaiveDate, end: NaiveDate, months: u32) -> Vec<DateWindow> {
    assert!(months >= 1, "window width must be at least one month");

    let mut windows = Vec::new();
    let mut current = start;

    while current <= end {
        let Some(first_of_month) = current.with_day(1) else {
            break;
        };
        let Some(next_boundary) = first_of_month.checked_add_months(Months::new(months)) else {
            break;
        };
        let Some(span_end) = next_boundary.pred_opt() else {
            break;
        };

        let window_end = span_end.min(end);
        windows.push(DateWindow::new(current, window_end));

        match window_end.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }

    windows
}
