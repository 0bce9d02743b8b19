//! Notification Dispatcher: fan a notification out to recipients on both
//! channels, best-effort, then (for reminders) append the dedup marker.

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DispatchError, ReminderRecord, TaskContext, TeamInvitation, User};
use crate::notification::{
    Channel, LinkBuilder, Notification, NotificationMessage, TaskAssigned, TaskDueSoon,
    TeamInvitationNotice,
};
use crate::ports::{IdGenerator, Mailer, NotificationSink, TaskStore};

/// Per-call delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub recipients: usize,
    pub persisted: usize,
    pub emailed: usize,
    pub failed: usize,
}

impl DispatchSummary {
    pub fn merge(&mut self, other: &DispatchSummary) {
        self.recipients += other.recipients;
        self.persisted += other.persisted;
        self.emailed += other.emailed;
        self.failed += other.failed;
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn TaskStore>,
    sink: Arc<dyn NotificationSink>,
    mailer: Arc<dyn Mailer>,
    ids: Arc<dyn IdGenerator>,
    links: LinkBuilder,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn TaskStore>,
        sink: Arc<dyn NotificationSink>,
        mailer: Arc<dyn Mailer>,
        ids: Arc<dyn IdGenerator>,
        links: LinkBuilder,
    ) -> Self {
        Self {
            store,
            sink,
            mailer,
            ids,
            links,
        }
    }

    /// Send the due-soon reminder to the assignee and every watcher, then write
    /// one `ReminderRecord` (even when there was nobody to notify).
    ///
    /// Channel failures are logged and counted; only the record write fails
    /// the call.
    pub async fn dispatch_reminder(
        &self,
        ctx: &TaskContext,
        now: DateTime<Utc>,
    ) -> Result<DispatchSummary, DispatchError> {
        let mut summary = DispatchSummary::default();

        match TaskDueSoon::new(ctx, now) {
            Some(notification) => {
                tracing::debug!(
                    task_id = %ctx.task.id,
                    days_until_due = notification.days_until_due,
                    tier = ?notification.tier,
                    "dispatching due reminder"
                );
                for recipient in ctx.recipients() {
                    self.deliver(&notification, recipient, &ctx.task.id, now, &mut summary)
                        .await;
                }
            }
            None => tracing::warn!(task_id = %ctx.task.id, "task has no due date, nothing to send"),
        }

        let record = ReminderRecord::due_reminder(self.ids.generate_reminder_id(), ctx.task.id, now);
        self.store.record_reminder(record).await?;
        Ok(summary)
    }

    /// Tell the (new) assignee about the assignment. Nothing is sent when the
    /// task is unassigned or the assignee assigned it to themselves.
    pub async fn notify_task_assigned(
        &self,
        ctx: &TaskContext,
        assigned_by: &User,
        now: DateTime<Utc>,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let Some(assignee) = ctx.assignee.as_ref() else {
            return summary;
        };
        if assignee.id == assigned_by.id {
            tracing::debug!(task_id = %ctx.task.id, "self-assignment, no notification");
            return summary;
        }
        let notification = TaskAssigned::new(ctx, assigned_by, now);
        self.deliver(&notification, assignee, &ctx.task.id, now, &mut summary)
            .await;
        summary
    }

    pub async fn notify_team_invitation(
        &self,
        invitation: &TeamInvitation,
        now: DateTime<Utc>,
    ) -> Result<DispatchSummary, DispatchError> {
        if invitation.is_expired(now) {
            return Err(DispatchError::InvitationExpired(invitation.id));
        }
        let mut summary = DispatchSummary::default();
        let notification = TeamInvitationNotice::new(invitation);
        self.deliver(
            &notification,
            &invitation.invitee,
            &invitation.id,
            now,
            &mut summary,
        )
        .await;
        Ok(summary)
    }

    async fn deliver(
        &self,
        notification: &dyn Notification,
        recipient: &User,
        subject: &(dyn Display + Sync),
        now: DateTime<Utc>,
        summary: &mut DispatchSummary,
    ) {
        let message = NotificationMessage::render(notification, recipient, &self.links, now);
        summary.recipients += 1;

        match self.sink.store(message.recipient, message.persisted).await {
            Ok(()) => summary.persisted += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(
                    notification = %notification.kind(),
                    subject = %subject,
                    recipient_id = %recipient.id,
                    channel = %Channel::Persisted,
                    error = %e,
                    "notification delivery failed"
                );
            }
        }

        match self.mailer.send(&message.email).await {
            Ok(()) => summary.emailed += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(
                    notification = %notification.kind(),
                    subject = %subject,
                    recipient_id = %recipient.id,
                    channel = %Channel::Email,
                    error = %e,
                    "notification delivery failed"
                );
            }
        }
    }
}
