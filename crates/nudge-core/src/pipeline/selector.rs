//! Reminder Selector: which tasks get a due-date reminder this run.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{DataAccessError, ReminderQuery, TaskContext, UrgencyTier, days_until_due};
use crate::ports::TaskStore;

/// A selected task and its urgency tier at selection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTask {
    pub context: TaskContext,
    pub days_until_due: i64,
    pub tier: Option<UrgencyTier>,
}

#[derive(Clone)]
pub struct ReminderSelector {
    store: Arc<dyn TaskStore>,
    lookahead: Duration,
    suppression: Duration,
}

impl ReminderSelector {
    pub fn new(store: Arc<dyn TaskStore>, lookahead: Duration, suppression: Duration) -> Self {
        Self {
            store,
            lookahead,
            suppression,
        }
    }

    /// 7-day lookahead, 24-hour suppression window.
    pub fn with_defaults(store: Arc<dyn TaskStore>) -> Self {
        Self::new(store, Duration::days(7), Duration::hours(24))
    }

    pub fn query_for(&self, now: DateTime<Utc>) -> ReminderQuery {
        ReminderQuery::window(now, self.lookahead, self.suppression)
    }

    /// Open tasks due in `(now, now + lookahead]` without a reminder since
    /// `now - suppression`, in store order. Read-only; store errors propagate
    /// unchanged (the run's retry policy handles them).
    pub async fn select_due_tasks(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueTask>, DataAccessError> {
        let query = self.query_for(now);
        let contexts = self.store.query(&query).await?;

        let selected: Vec<DueTask> = contexts
            .into_iter()
            .filter_map(|context| {
                let due = context.task.due_date?;
                let days = days_until_due(now, due);
                let tier = UrgencyTier::classify(days);
                tracing::debug!(
                    task_id = %context.task.id,
                    days_until_due = days,
                    tier = tier.map(UrgencyTier::as_str).unwrap_or("none"),
                    "task selected for reminder"
                );
                Some(DueTask {
                    context,
                    days_until_due: days,
                    tier,
                })
            })
            .collect();

        tracing::info!(count = selected.len(), "selected tasks due for reminders");
        Ok(selected)
    }
}
