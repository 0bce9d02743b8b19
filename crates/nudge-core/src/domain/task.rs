//! タスクと関係者のモデル。
//!
//! Task, User, Team, and the resolved TaskContext the pipeline works on.
//! Recipients are the assignee followed by watchers, de-duplicated by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{TaskId, TeamId, UserId};

/// Task status. The set is open (owned by the task-management side);
/// only `completed` has meaning for the reminder pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskStatus(String);

impl TaskStatus {
    pub const COMPLETED: &'static str = "completed";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn todo() -> Self {
        Self::new("todo")
    }

    pub fn in_progress() -> Self {
        Self::new("in_progress")
    }

    pub fn completed() -> Self {
        Self::new(Self::COMPLETED)
    }

    pub fn is_completed(&self) -> bool {
        self.0 == Self::COMPLETED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TeamId::generate(),
            name: name.into(),
        }
    }
}

/// Task row as the task store keeps it (references only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<UserId>,
    #[serde(default)]
    pub watcher_ids: Vec<UserId>,
    pub team_id: TeamId,
    #[serde(default)]
    pub deleted: bool,
}

impl Task {
    pub fn new(title: impl Into<String>, team_id: TeamId) -> Self {
        Self {
            id: TaskId::generate(),
            title: title.into(),
            description: None,
            status: TaskStatus::todo(),
            priority: Priority::default(),
            due_date: None,
            assignee_id: None,
            watcher_ids: Vec::new(),
            team_id,
            deleted: false,
        }
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_assignee(mut self, user: UserId) -> Self {
        self.assignee_id = Some(user);
        self
    }

    pub fn with_watchers(mut self, watchers: impl IntoIterator<Item = UserId>) -> Self {
        self.watcher_ids = watchers.into_iter().collect();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A task with its assignee, watchers and team already resolved,
/// so payload construction does not go back to the store per recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub task: Task,
    pub assignee: Option<User>,
    pub watchers: Vec<User>,
    pub team: Team,
}

impl TaskContext {
    /// Assignee first, then watchers in stored order; a user appears once.
    pub fn recipients(&self) -> Vec<&User> {
        let mut out: Vec<&User> = Vec::with_capacity(self.watchers.len() + 1);
        for user in self.assignee.iter().chain(self.watchers.iter()) {
            if !out.iter().any(|u| u.id == user.id) {
                out.push(user);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(assignee: Option<User>, watchers: Vec<User>) -> TaskContext {
        let team = Team::new("core");
        TaskContext {
            task: Task::new("ship it", team.id),
            assignee,
            watchers,
            team,
        }
    }

    #[test]
    fn recipients_put_assignee_first() {
        let alice = User::new("alice", "alice@example.com");
        let bob = User::new("bob", "bob@example.com");
        let ctx = context(Some(alice.clone()), vec![bob.clone()]);

        let ids: Vec<UserId> = ctx.recipients().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![alice.id, bob.id]);
    }

    #[test]
    fn recipients_skip_assignee_who_also_watches() {
        let alice = User::new("alice", "alice@example.com");
        let ctx = context(Some(alice.clone()), vec![alice.clone()]);
        assert_eq!(ctx.recipients().len(), 1);
    }

    #[test]
    fn recipients_empty_without_assignee_or_watchers() {
        assert!(context(None, vec![]).recipients().is_empty());
    }

    #[test]
    fn status_completed_is_terminal_marker() {
        assert!(TaskStatus::completed().is_completed());
        assert!(!TaskStatus::new("blocked").is_completed());
    }
}
