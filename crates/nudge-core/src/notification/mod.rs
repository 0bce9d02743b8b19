//! Notifications: one trait over a fixed capability set
//! (`render_persisted`, `render_email`) with three concrete variants.
//!
//! Every notification goes out on both channels:
//! - persisted record (in-app feed, keyed by recipient user id)
//! - email

pub mod assigned;
pub mod due_soon;
pub mod humanize;
pub mod invitation;
pub mod links;

pub use self::assigned::TaskAssigned;
pub use self::due_soon::TaskDueSoon;
pub use self::invitation::TeamInvitationNotice;
pub use self::links::{LinkBuilder, LinkError, LinkSigner};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{User, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskDueSoon,
    TaskAssigned,
    TeamInvitation,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::TaskDueSoon => "task_due_soon",
            NotificationKind::TaskAssigned => "task_assigned",
            NotificationKind::TeamInvitation => "team_invitation",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Persisted,
    Email,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Persisted => f.write_str("persisted"),
            Channel::Email => f.write_str("email"),
        }
    }
}

/// Record written to the in-app notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNotification {
    pub kind: NotificationKind,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
}

pub trait Notification: Send + Sync {
    fn kind(&self) -> NotificationKind;

    /// Structured payload; always carries `"type": <kind>`.
    fn render_persisted(&self) -> serde_json::Value;

    fn render_email(&self, recipient: &User, links: &LinkBuilder) -> EmailMessage;
}

/// One notification rendered for one recipient, ready for both channels.
/// Built fresh per recipient and dropped after delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub recipient: UserId,
    pub persisted: PersistedNotification,
    pub email: EmailMessage,
}

impl NotificationMessage {
    pub fn render(
        notification: &dyn Notification,
        recipient: &User,
        links: &LinkBuilder,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            recipient: recipient.id,
            persisted: PersistedNotification {
                kind: notification.kind(),
                data: notification.render_persisted(),
                created_at: now,
            },
            email: notification.render_email(recipient, links),
        }
    }
}

fn greeting(recipient: &User) -> String {
    format!("Hi {},", recipient.name)
}
