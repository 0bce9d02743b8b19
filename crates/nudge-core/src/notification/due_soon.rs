//! 期限間近リマインダー (TaskDueSoon)。
//!
//! Persisted payload and email for a task whose due date falls inside the
//! lookahead window. One instance per recipient.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{EmailMessage, LinkBuilder, Notification, NotificationKind, greeting, humanize};
use crate::domain::{
    Priority, TaskContext, TaskId, TaskStatus, TeamId, UrgencyTier, User, days_until_due,
};

/// Reminder for a task due within the lookahead window.
/// The tier is carried for labelling; content is identical across tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDueSoon {
    pub task_id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub team_id: TeamId,
    pub team_name: String,
    pub due_date: DateTime<Utc>,
    pub days_until_due: i64,
    pub tier: Option<UrgencyTier>,
    pub now: DateTime<Utc>,
}

impl TaskDueSoon {
    /// `None` when the task has no due date.
    pub fn new(ctx: &TaskContext, now: DateTime<Utc>) -> Option<Self> {
        let due_date = ctx.task.due_date?;
        let days = days_until_due(now, due_date);
        Some(Self {
            task_id: ctx.task.id,
            title: ctx.task.title.clone(),
            description: ctx.task.description.clone(),
            status: ctx.task.status.clone(),
            priority: ctx.task.priority,
            team_id: ctx.team.id,
            team_name: ctx.team.name.clone(),
            due_date,
            days_until_due: days,
            tier: UrgencyTier::classify(days),
            now,
        })
    }
}

impl Notification for TaskDueSoon {
    fn kind(&self) -> NotificationKind {
        NotificationKind::TaskDueSoon
    }

    fn render_persisted(&self) -> serde_json::Value {
        json!({
            "type": self.kind().as_str(),
            "task_id": self.task_id,
            "title": self.title,
            "team_id": self.team_id,
            "team_name": self.team_name,
            "days_until_due": self.days_until_due,
            "due_date": self.due_date.date_naive().to_string(),
        })
    }

    fn render_email(&self, recipient: &User, links: &LinkBuilder) -> EmailMessage {
        let relative = humanize::relative(self.now, self.due_date);
        let absolute = humanize::absolute(self.due_date);

        let mut body = format!(
            "{}\n\nThe task \"{}\" in {} is due {} ({}).\n\n\
             Priority: {}\nStatus: {}\nDue: {}\n",
            greeting(recipient),
            self.title,
            self.team_name,
            relative,
            absolute,
            self.priority,
            self.status,
            absolute,
        );
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            body.push_str(&format!("\n{}\n", description.trim()));
        }
        body.push_str(&format!("\nView task: {}\n", links.task_url(self.task_id)));

        EmailMessage {
            to_name: recipient.name.clone(),
            to_address: recipient.email.clone(),
            subject: format!("Task due soon: {}", self.title),
            body,
        }
    }
}
