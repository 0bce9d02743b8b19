//! TeamInvitationNotice: invitee email with a signed accept link.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{EmailMessage, LinkBuilder, Notification, NotificationKind, greeting, humanize};
use crate::domain::{InvitationId, TeamId, TeamInvitation, TeamRole, User, UserId};

/// Sent to the invitee when a team invitation is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamInvitationNotice {
    pub invitation_id: InvitationId,
    pub team_id: TeamId,
    pub team_name: String,
    pub invited_by_id: UserId,
    pub invited_by_name: String,
    pub role: TeamRole,
    pub expires_at: DateTime<Utc>,
}

impl TeamInvitationNotice {
    pub fn new(invitation: &TeamInvitation) -> Self {
        Self {
            invitation_id: invitation.id,
            team_id: invitation.team.id,
            team_name: invitation.team.name.clone(),
            invited_by_id: invitation.inviter.id,
            invited_by_name: invitation.inviter.name.clone(),
            role: invitation.role,
            expires_at: invitation.expires_at,
        }
    }
}

impl Notification for TeamInvitationNotice {
    fn kind(&self) -> NotificationKind {
        NotificationKind::TeamInvitation
    }

    fn render_persisted(&self) -> serde_json::Value {
        json!({
            "type": self.kind().as_str(),
            "invitation_id": self.invitation_id,
            "team_id": self.team_id,
            "team_name": self.team_name,
            "invited_by_id": self.invited_by_id,
            "invited_by_name": self.invited_by_name,
            "role": self.role,
            "expires_at": self.expires_at.to_rfc3339(),
        })
    }

    fn render_email(&self, recipient: &User, links: &LinkBuilder) -> EmailMessage {
        let accept = links.invitation_accept_url(self.invitation_id, self.expires_at);
        let body = format!(
            "{}\n\n{} invited you to join the team \"{}\" as {}.\n\n\
             Accept the invitation: {}\n\n\
             This link expires on {}.\n",
            greeting(recipient),
            self.invited_by_name,
            self.team_name,
            self.role,
            accept,
            humanize::absolute(self.expires_at),
        );

        EmailMessage {
            to_name: recipient.name.clone(),
            to_address: recipient.email.clone(),
            subject: format!("You're invited to join {}", self.team_name),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Team;
    use crate::notification::LinkSigner;
    use chrono::{Duration, TimeZone};

    #[test]
    fn email_embeds_verifiable_accept_link() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let invitation = TeamInvitation {
            id: InvitationId::generate(),
            team: Team::new("ops"),
            inviter: User::new("Owner", "owner@example.com"),
            invitee: User::new("Newbie", "newbie@example.com"),
            role: TeamRole::Admin,
            expires_at: now + Duration::days(7),
        };
        let links = LinkBuilder::new("https://app.test", LinkSigner::new("k").unwrap());
        let n = TeamInvitationNotice::new(&invitation);

        let payload = n.render_persisted();
        assert_eq!(payload["type"], "team_invitation");
        assert_eq!(payload["role"], "admin");
        assert_eq!(payload["team_name"], "ops");

        let email = n.render_email(&invitation.invitee, &links);
        assert!(email.body.contains("Owner invited you to join the team \"ops\" as admin."));

        let url = email
            .body
            .lines()
            .find_map(|l| l.strip_prefix("Accept the invitation: "))
            .unwrap();
        assert_eq!(links.signer().verify_accept_url(url, now).unwrap(), invitation.id);
    }
}
