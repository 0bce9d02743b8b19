//! NotificationSink port - アプリ内通知フィードへの永続化
//!
//! key-value 形式: recipient の user id → 構造化ペイロード

use async_trait::async_trait;

use crate::domain::{DeliveryError, UserId};
use crate::notification::PersistedNotification;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn store(
        &self,
        recipient: UserId,
        notification: PersistedNotification,
    ) -> Result<(), DeliveryError>;
}
