//! ReminderRecord and the selection filter that consults it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{ReminderId, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    DueReminder,
}

impl ReminderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderType::DueReminder => "due_reminder",
        }
    }
}

/// "A reminder was sent for this task at this time."
///
/// Append-only: written once per dispatched task, never updated or deleted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub id: ReminderId,
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
    pub sent_at: DateTime<Utc>,
}

impl ReminderRecord {
    pub fn due_reminder(id: ReminderId, task_id: TaskId, sent_at: DateTime<Utc>) -> Self {
        Self {
            id,
            task_id,
            reminder_type: ReminderType::DueReminder,
            sent_at,
        }
    }
}

/// Filter handed to the task store by the selector.
///
/// A task matches when:
/// - it is not soft-deleted and not completed
/// - `due_after < due_date <= due_until`
/// - it has no `due_reminder` record with `sent_at >= reminded_since`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderQuery {
    pub due_after: DateTime<Utc>,
    pub due_until: DateTime<Utc>,
    pub reminded_since: DateTime<Utc>,
}

impl ReminderQuery {
    pub fn window(now: DateTime<Utc>, lookahead: Duration, suppression: Duration) -> Self {
        Self {
            due_after: now,
            due_until: now.checked_add_signed(lookahead).unwrap_or(DateTime::<Utc>::MAX_UTC),
            reminded_since: now
                .checked_sub_signed(suppression)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Row-level predicate, for stores that filter in process.
    pub fn matches<'a>(
        &self,
        task: &Task,
        reminders: impl IntoIterator<Item = &'a ReminderRecord>,
    ) -> bool {
        if task.deleted || task.status.is_completed() {
            return false;
        }
        let Some(due) = task.due_date else {
            return false;
        };
        if due <= self.due_after || due > self.due_until {
            return false;
        }
        !reminders.into_iter().any(|r| {
            r.task_id == task.id
                && r.reminder_type == ReminderType::DueReminder
                && r.sent_at >= self.reminded_since
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskStatus, TeamId};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn query() -> ReminderQuery {
        ReminderQuery::window(now(), Duration::days(7), Duration::days(1))
    }

    fn task_due(offset: Duration) -> Task {
        Task::new("write docs", TeamId::generate()).with_due_date(now() + offset)
    }

    #[test]
    fn window_bounds_are_exclusive_then_inclusive() {
        let q = query();
        assert!(!q.matches(&task_due(Duration::zero()), []));
        assert!(q.matches(&task_due(Duration::seconds(1)), []));
        assert!(q.matches(&task_due(Duration::days(7)), []));
        assert!(!q.matches(&task_due(Duration::days(7) + Duration::seconds(1)), []));
        assert!(!q.matches(&task_due(-Duration::hours(3)), []));
    }

    #[test]
    fn oversized_window_saturates_instead_of_overflowing() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let q = ReminderQuery::window(now, Duration::MAX, Duration::MAX);
        assert_eq!(q.due_until, DateTime::<Utc>::MAX_UTC);
        assert_eq!(q.reminded_since, DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn tasks_without_due_date_never_match() {
        let task = Task::new("someday", TeamId::generate());
        assert!(!query().matches(&task, []));
    }

    #[test]
    fn completed_and_deleted_tasks_never_match() {
        let completed = task_due(Duration::days(1)).with_status(TaskStatus::completed());
        let mut deleted = task_due(Duration::days(1));
        deleted.deleted = true;

        assert!(!query().matches(&completed, []));
        assert!(!query().matches(&deleted, []));
    }

    #[test]
    fn recent_reminder_suppresses_task() {
        let task = task_due(Duration::days(2));
        let recent = ReminderRecord::due_reminder(
            ReminderId::generate(),
            task.id,
            now() - Duration::hours(23),
        );
        let boundary =
            ReminderRecord::due_reminder(ReminderId::generate(), task.id, now() - Duration::days(1));
        let old = ReminderRecord::due_reminder(
            ReminderId::generate(),
            task.id,
            now() - Duration::hours(25),
        );

        assert!(!query().matches(&task, [&recent]));
        assert!(!query().matches(&task, [&boundary]));
        assert!(query().matches(&task, [&old]));
    }

    #[test]
    fn reminders_for_other_tasks_are_ignored() {
        let task = task_due(Duration::days(2));
        let other = ReminderRecord::due_reminder(ReminderId::generate(), TaskId::generate(), now());
        assert!(query().matches(&task, [&other]));
    }

    #[test]
    fn record_serializes_type_tag() {
        let record = ReminderRecord::due_reminder(ReminderId::generate(), TaskId::generate(), now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "due_reminder");
    }
}
