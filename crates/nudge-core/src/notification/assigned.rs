//! TaskAssigned: 担当者変更の通知。Sent once to the new assignee.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{EmailMessage, LinkBuilder, Notification, NotificationKind, greeting, humanize};
use crate::domain::{Priority, TaskContext, TaskId, TeamId, User, UserId};

/// Sent to the new assignee when a task's assignee changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAssigned {
    pub task_id: TaskId,
    pub title: String,
    pub team_id: TeamId,
    pub team_name: String,
    pub assigned_by_id: UserId,
    pub assigned_by_name: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl TaskAssigned {
    pub fn new(ctx: &TaskContext, assigned_by: &User, now: DateTime<Utc>) -> Self {
        Self {
            task_id: ctx.task.id,
            title: ctx.task.title.clone(),
            team_id: ctx.team.id,
            team_name: ctx.team.name.clone(),
            assigned_by_id: assigned_by.id,
            assigned_by_name: assigned_by.name.clone(),
            priority: ctx.task.priority,
            due_date: ctx.task.due_date,
            now,
        }
    }
}

impl Notification for TaskAssigned {
    fn kind(&self) -> NotificationKind {
        NotificationKind::TaskAssigned
    }

    fn render_persisted(&self) -> serde_json::Value {
        json!({
            "type": self.kind().as_str(),
            "task_id": self.task_id,
            "title": self.title,
            "team_id": self.team_id,
            "team_name": self.team_name,
            "assigned_by_id": self.assigned_by_id,
            "assigned_by_name": self.assigned_by_name,
            "priority": self.priority,
            "due_date": self.due_date.map(|d| d.date_naive().to_string()),
        })
    }

    fn render_email(&self, recipient: &User, links: &LinkBuilder) -> EmailMessage {
        let due = match self.due_date {
            Some(due) => format!(
                "{} ({})",
                humanize::absolute(due),
                humanize::relative(self.now, due)
            ),
            None => "no due date".to_string(),
        };
        let body = format!(
            "{}\n\n{} assigned you the task \"{}\" in {}.\n\n\
             Priority: {}\nDue: {}\n\nView task: {}\n",
            greeting(recipient),
            self.assigned_by_name,
            self.title,
            self.team_name,
            self.priority,
            due,
            links.task_url(self.task_id),
        );

        EmailMessage {
            to_name: recipient.name.clone(),
            to_address: recipient.email.clone(),
            subject: format!("New task assigned: {}", self.title),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, Team};
    use crate::notification::LinkSigner;
    use chrono::TimeZone;

    #[test]
    fn payload_and_email() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let team = Team::new("design");
        let lead = User::new("Lead", "lead@example.com");
        let dev = User::new("Dev", "dev@example.com");
        let ctx = TaskContext {
            task: Task::new("new logo", team.id).with_assignee(dev.id),
            assignee: Some(dev.clone()),
            watchers: vec![],
            team,
        };

        let n = TaskAssigned::new(&ctx, &lead, now);
        let payload = n.render_persisted();
        assert_eq!(payload["type"], "task_assigned");
        assert_eq!(payload["assigned_by_name"], "Lead");
        assert_eq!(payload["priority"], "medium");
        assert!(payload["due_date"].is_null());

        let email = n.render_email(&dev, &LinkBuilder::new("https://app.test", LinkSigner::new("k").unwrap()));
        assert_eq!(email.subject, "New task assigned: new logo");
        assert!(email.body.contains("Lead assigned you the task \"new logo\" in design."));
        assert!(email.body.contains("Due: no due date"));
    }
}
