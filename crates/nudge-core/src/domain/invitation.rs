//! チーム招待 (TeamInvitation) and the roles an invitee can receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{InvitationId, Team, User};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    #[default]
    Member,
    Viewer,
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
            TeamRole::Viewer => "viewer",
        };
        f.write_str(s)
    }
}

/// Pending invitation to join a team, already resolved to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamInvitation {
    pub id: InvitationId,
    pub team: Team,
    pub inviter: User,
    pub invitee: User,
    pub role: TeamRole,
    pub expires_at: DateTime<Utc>,
}

impl TeamInvitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
