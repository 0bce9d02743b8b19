//! Human-relative and absolute due-date rendering for email bodies.

use chrono::{DateTime, Duration, Utc};

/// "in 3 days", "tomorrow", "in 12 hours", "overdue by 2 hours", "now".
///
/// "tomorrow" is used when the due date falls on the next UTC calendar day
/// and is at least 12 hours away; closer deadlines keep the hour count.
pub fn relative(now: DateTime<Utc>, due: DateTime<Utc>) -> String {
    let diff = due - now;
    if diff.is_zero() {
        return "now".to_string();
    }
    if diff >= Duration::hours(12) && (due.date_naive() - now.date_naive()).num_days() == 1 {
        return "tomorrow".to_string();
    }
    let span = span(if diff < Duration::zero() { -diff } else { diff });
    if diff < Duration::zero() {
        format!("overdue by {span}")
    } else {
        format!("in {span}")
    }
}

pub fn absolute(at: DateTime<Utc>) -> String {
    at.format("%a, %b %-d, %Y %H:%M UTC").to_string()
}

fn span(d: Duration) -> String {
    if d < Duration::minutes(1) {
        "less than a minute".to_string()
    } else if d < Duration::hours(1) {
        plural(d.num_minutes(), "minute")
    } else if d < Duration::days(1) {
        plural(d.num_hours(), "hour")
    } else {
        plural(d.num_days(), "day")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
