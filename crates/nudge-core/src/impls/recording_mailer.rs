//! Mailers that never touch the network.
//!
//! - RecordingMailer: keeps every message (tests, `nudge demo`)
//! - LogMailer: logs the envelope (serve without SMTP configured)

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::DeliveryError;
use crate::notification::EmailMessage;
use crate::ports::Mailer;

#[derive(Default)]
struct MailboxState {
    sent: Vec<EmailMessage>,
    failing: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct RecordingMailer {
    state: Arc<Mutex<MailboxState>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.state.lock().await.sent.clone()
    }

    pub async fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.state
            .lock()
            .await
            .sent
            .iter()
            .filter(|m| m.to_address == address)
            .cloned()
            .collect()
    }

    /// Every send to `address` fails with a transport error.
    pub async fn fail_for(&self, address: impl Into<String>) {
        self.state.lock().await.failing.insert(address.into());
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let mut state = self.state.lock().await;
        if state.failing.contains(&message.to_address) {
            return Err(DeliveryError::Transport(format!(
                "mailbox unavailable: {}",
                message.to_address
            )));
        }
        state.sent.push(message.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %message.to_address,
            subject = %message.subject,
            "mail transport not configured, logging message instead"
        );
        tracing::debug!(body = %message.body, "mail body");
        Ok(())
    }
}
