//! Links back into the web application, and signed invitation-accept links.
//!
//! Accept link: `{base}/invitations/{ulid}/accept?expires={unix}&signature={token}`
//! where `token = base64url(HMAC-SHA256(secret, "{ulid}:{unix}"))`.
//! Enforcing the link is the routing layer's job; `LinkSigner::verify_accept_url`
//! is provided for it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::domain::{InvitationId, TaskId};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("malformed link: {0}")]
    Malformed(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("link expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("unusable signing key: {0}")]
    Key(String),
}

/// Keyed once at construction; signing and verification clone the keyed state.
#[derive(Clone)]
pub struct LinkSigner {
    keyed: HmacSha256,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner").finish_non_exhaustive()
    }
}

impl LinkSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, LinkError> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| LinkError::Key(e.to_string()))?;
        Ok(Self { keyed })
    }

    fn mac(&self, invitation: InvitationId, expires_unix: i64) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(format!("{}:{}", invitation.as_ulid(), expires_unix).as_bytes());
        mac
    }

    pub fn sign(&self, invitation: InvitationId, expires_at: DateTime<Utc>) -> String {
        let tag = self.mac(invitation, expires_at.timestamp()).finalize().into_bytes();
        URL_SAFE_NO_PAD.encode(tag)
    }

    pub fn verify(
        &self,
        invitation: InvitationId,
        expires_unix: i64,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LinkError> {
        let tag = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| LinkError::Malformed(format!("signature: {e}")))?;
        self.mac(invitation, expires_unix)
            .verify_slice(&tag)
            .map_err(|_| LinkError::BadSignature)?;

        let expires_at = DateTime::<Utc>::from_timestamp(expires_unix, 0)
            .ok_or_else(|| LinkError::Malformed(format!("expires={expires_unix}")))?;
        if expires_at <= now {
            return Err(LinkError::Expired(expires_at));
        }
        Ok(())
    }

    /// Parse and verify a full accept URL built by [`LinkBuilder::invitation_accept_url`].
    pub fn verify_accept_url(
        &self,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<InvitationId, LinkError> {
        let (path, query) = url
            .split_once('?')
            .ok_or_else(|| LinkError::Malformed("missing query".into()))?;

        let mut segments = path.rsplit('/');
        let (Some("accept"), Some(raw_id), Some("invitations")) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(LinkError::Malformed(format!("unexpected path {path}")));
        };
        let invitation: InvitationId = raw_id
            .parse()
            .map_err(|e| LinkError::Malformed(format!("{e}")))?;

        let mut expires = None;
        let mut signature = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = Some(v),
                Some(("signature", v)) => signature = Some(v),
                _ => {}
            }
        }
        let expires: i64 = expires
            .ok_or_else(|| LinkError::Malformed("missing expires".into()))?
            .parse()
            .map_err(|_| LinkError::Malformed("expires is not a timestamp".into()))?;
        let signature = signature.ok_or_else(|| LinkError::Malformed("missing signature".into()))?;

        self.verify(invitation, expires, signature, now)?;
        Ok(invitation)
    }
}

#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base_url: String,
    signer: LinkSigner,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>, signer: LinkSigner) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
        }
    }

    pub fn signer(&self) -> &LinkSigner {
        &self.signer
    }

    pub fn task_url(&self, task: TaskId) -> String {
        format!("{}/tasks/{}", self.base_url, task.as_ulid())
    }

    pub fn invitation_accept_url(
        &self,
        invitation: InvitationId,
        expires_at: DateTime<Utc>,
    ) -> String {
        format!(
            "{}/invitations/{}/accept?expires={}&signature={}",
            self.base_url,
            invitation.as_ulid(),
            expires_at.timestamp(),
            self.signer.sign(invitation, expires_at)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn links() -> LinkBuilder {
        LinkBuilder::new("https://tasks.example.com/", LinkSigner::new("s3cret").unwrap())
    }

    #[test]
    fn task_url_trims_trailing_slash() {
        let task = TaskId::generate();
        assert_eq!(
            links().task_url(task),
            format!("https://tasks.example.com/tasks/{}", task.as_ulid())
        );
    }

    #[test]
    fn accept_url_verifies_before_expiry() {
        let invitation = InvitationId::generate();
        let url = links().invitation_accept_url(invitation, now() + Duration::days(7));

        let verified = links().signer().verify_accept_url(&url, now()).unwrap();
        assert_eq!(verified, invitation);
    }

    #[test]
    fn accept_url_rejects_after_expiry() {
        let invitation = InvitationId::generate();
        let expires = now() + Duration::days(7);
        let url = links().invitation_accept_url(invitation, expires);

        let err = links()
            .signer()
            .verify_accept_url(&url, expires + Duration::seconds(1))
            .unwrap_err();
        assert_eq!(err, LinkError::Expired(expires));
    }

    #[test]
    fn tampered_expiry_or_other_secret_fails() {
        let invitation = InvitationId::generate();
        let expires = now() + Duration::days(7);
        let url = links().invitation_accept_url(invitation, expires);

        let tampered = url.replace(
            &format!("expires={}", expires.timestamp()),
            &format!("expires={}", expires.timestamp() + 86_400),
        );
        assert_eq!(
            links().signer().verify_accept_url(&tampered, now()),
            Err(LinkError::BadSignature)
        );

        let other = LinkSigner::new("other").unwrap();
        assert_eq!(other.verify_accept_url(&url, now()), Err(LinkError::BadSignature));
    }

    #[test]
    fn signers_with_the_same_secret_agree() {
        let invitation = InvitationId::generate();
        let expires = now() + Duration::days(7);
        let a = LinkSigner::new("shared").unwrap();
        let b = LinkSigner::new(b"shared".to_vec()).unwrap();

        let token = a.sign(invitation, expires);
        assert_eq!(token, a.sign(invitation, expires));
        assert_eq!(b.verify(invitation, expires.timestamp(), &token, now()), Ok(()));
        assert!(LinkSigner::new("").is_ok());
    }

    #[test]
    fn malformed_urls_are_rejected() {
        let signer = LinkSigner::new("s3cret").unwrap();
        assert!(matches!(
            signer.verify_accept_url("https://x/invitations/abc", now()),
            Err(LinkError::Malformed(_))
        ));
        assert!(matches!(
            signer.verify_accept_url("https://x/tasks/abc/accept?expires=1&signature=a", now()),
            Err(LinkError::Malformed(_))
        ));
    }
}
