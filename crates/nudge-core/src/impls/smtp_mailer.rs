//! SmtpMailer - lettre による SMTP 送信
//!
//! STARTTLS relay + 任意の認証情報。timeout は transport 側で持つ。

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;
use crate::domain::{ConfigError, DeliveryError};
use crate::notification::EmailMessage;
use crate::ports::Mailer;

pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, ConfigError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("mail.smtp_host is not set".into()))?;
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("mail.from '{}': {e}", config.from)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| ConfigError::Invalid(format!("smtp relay {host}: {e}")))?
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }
}

pub(crate) fn build_message(from: &Mailbox, message: &EmailMessage) -> Result<Message, DeliveryError> {
    let to: Mailbox = format!("{} <{}>", message.to_name, message.to_address)
        .parse()
        .or_else(|_| message.to_address.parse())
        .map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: message.to_address.clone(),
            reason: e.to_string(),
        })?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| DeliveryError::Transport(format!("build email: {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let email = build_message(&self.from, message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| DeliveryError::Transport(format!("smtp send: {e}")))?;
        tracing::debug!(to = %message.to_address, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(address: &str) -> EmailMessage {
        EmailMessage {
            to_name: "Alice".into(),
            to_address: address.into(),
            subject: "Task due soon: x".into(),
            body: "hello".into(),
        }
    }

    #[test]
    fn builds_plain_text_message() {
        let from: Mailbox = "Nudge <no-reply@example.com>".parse().unwrap();
        let built = build_message(&from, &message("alice@example.com")).unwrap();
        let raw = String::from_utf8(built.formatted()).unwrap();
        assert!(raw.contains("Subject: Task due soon: x"));
        assert!(raw.contains("alice@example.com"));
    }

    #[test]
    fn invalid_address_is_a_delivery_error() {
        let from: Mailbox = "no-reply@example.com".parse().unwrap();
        let err = build_message(&from, &message("not an address")).unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { .. }));
    }

    #[test]
    fn from_config_requires_host() {
        let config = MailConfig::default();
        assert!(matches!(
            SmtpMailer::from_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
