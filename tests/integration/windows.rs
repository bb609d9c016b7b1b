//! Coverage properties of the date-window splitter.

use chrono::NaiveDate;
use seeclickfix_crawler::crawler::month_windows;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Every day of the range is covered by exactly one window.
#[test]
fn test_every_day_covered_exactly_once() {
    let ranges = [
        (date(2015, 1, 1), date(2015, 12, 31), 1),
        (date(2019, 11, 17), date(2021, 2, 3), 1),
        (date(2024, 1, 31), date(2024, 3, 1), 1),
        (date(2023, 12, 1), date(2024, 1, 31), 2),
        (date(2020, 2, 29), date(2020, 2, 29), 1),
    ];

    for (start, end, months) in ranges {
        let windows = month_windows(start, end, months);

        let mut day = start;
        loop {
            let covering = windows
                .iter()
                .filter(|w| w.start <= day && day <= w.end)
                .count();
            assert_eq!(
                covering, 1,
                "day {day} covered by {covering} windows in {start}..{end}"
            );
            if day == end {
                break;
            }
            day = day.succ_opt().unwrap();
        }
    }
}

#[test]
fn test_windows_are_chronological_and_contiguous() {
    let windows = month_windows(date(2018, 3, 14), date(2019, 6, 2), 1);

    assert_eq!(windows.first().unwrap().start, date(2018, 3, 14));
    assert_eq!(windows.last().unwrap().end, date(2019, 6, 2));

    for pair in windows.windows(2) {
        assert!(pair[0].end < pair[1].start);
        assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
    }
}

#[test]
fn test_final_window_never_extends_past_end_date() {
    for end_day in [1, 10, 28] {
        let end = date(2024, 5, end_day);
        let windows = month_windows(date(2024, 1, 1), end, 1);
        assert_eq!(windows.last().unwrap().end, end);
    }
}
