//! Urgency classification.
//!
//! `days_until_due` is the calendar-day difference in UTC
//! (`due.date() - now.date()`), i.e. the floor of the calendar-day distance.
//! A task due at 23:00 today is 0 days away; one due at 01:00 tomorrow is 1.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed whole calendar days from `now` to `due`; negative means overdue.
pub fn days_until_due(now: DateTime<Utc>, due: DateTime<Utc>) -> i64 {
    (due.date_naive() - now.date_naive()).num_days()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyTier {
    Urgent,
    Soon,
    Upcoming,
}

impl UrgencyTier {
    /// Buckets evaluated in order: `<= 1`, `<= 3`, `<= 7`.
    /// Anything further out has no tier (the selector never yields it).
    pub fn classify(days_until_due: i64) -> Option<Self> {
        if days_until_due <= 1 {
            Some(UrgencyTier::Urgent)
        } else if days_until_due <= 3 {
            Some(UrgencyTier::Soon)
        } else if days_until_due <= 7 {
            Some(UrgencyTier::Upcoming)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyTier::Urgent => "urgent",
            UrgencyTier::Soon => "soon",
            UrgencyTier::Upcoming => "upcoming",
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(-2, Some(UrgencyTier::Urgent))]
    #[case(0, Some(UrgencyTier::Urgent))]
    #[case(1, Some(UrgencyTier::Urgent))]
    #[case(2, Some(UrgencyTier::Soon))]
    #[case(3, Some(UrgencyTier::Soon))]
    #[case(4, Some(UrgencyTier::Upcoming))]
    #[case(7, Some(UrgencyTier::Upcoming))]
    #[case(8, None)]
    fn classify_buckets(#[case] days: i64, #[case] expected: Option<UrgencyTier>) {
        assert_eq!(UrgencyTier::classify(days), expected);
    }

    #[rstest]
    // same UTC day, 15 hours later
    #[case((2026, 3, 2, 8), (2026, 3, 2, 23), 0)]
    // 18 hours later, crosses midnight
    #[case((2026, 3, 2, 8), (2026, 3, 3, 2), 1)]
    // 23.5 hours later lands on the next day
    #[case((2026, 3, 2, 8), (2026, 3, 3, 7), 1)]
    #[case((2026, 3, 2, 8), (2026, 3, 9, 8), 7)]
    #[case((2026, 3, 2, 8), (2026, 3, 1, 20), -1)]
    fn days_until_due_uses_calendar_days(
        #[case] now: (i32, u32, u32, u32),
        #[case] due: (i32, u32, u32, u32),
        #[case] expected: i64,
    ) {
        let now = Utc.with_ymd_and_hms(now.0, now.1, now.2, now.3, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(due.0, due.1, due.2, due.3, 0, 0).unwrap();
        assert_eq!(days_until_due(now, due), expected);
    }
}
