//! Mailer port - メール送信
//!
//! timeout は実装側（SMTP transport など）の責務。

use async_trait::async_trait;

use crate::domain::DeliveryError;
use crate::notification::EmailMessage;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}
