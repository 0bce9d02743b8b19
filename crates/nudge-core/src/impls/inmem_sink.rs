//! InMemoryNotificationSink - 開発・テスト用のアプリ内通知フィード

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{DeliveryError, UserId};
use crate::notification::PersistedNotification;
use crate::ports::NotificationSink;

#[derive(Default)]
struct SinkState {
    stored: Vec<(UserId, PersistedNotification)>,
    failing: HashSet<UserId>,
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    state: Arc<Mutex<SinkState>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stored(&self) -> Vec<(UserId, PersistedNotification)> {
        self.state.lock().await.stored.clone()
    }

    pub async fn for_recipient(&self, user: UserId) -> Vec<PersistedNotification> {
        self.state
            .lock()
            .await
            .stored
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub async fn fail_for(&self, user: UserId) {
        self.state.lock().await.failing.insert(user);
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn store(
        &self,
        recipient: UserId,
        notification: PersistedNotification,
    ) -> Result<(), DeliveryError> {
        let mut state = self.state.lock().await;
        if state.failing.contains(&recipient) {
            return Err(DeliveryError::Sink(format!("feed rejected write for {recipient}")));
        }
        state.stored.push((recipient, notification));
        Ok(())
    }
}
