//! ExecutionLock port - single-instance execution lock
//!
//! 同じ schedule tick の run がクラスタ内で同時に 2 つ走らないようにする。
//!
//! # 設計原則
//! - key は tick 単位（`task-reminders:2026-03-02` など）
//! - TTL 付き: holder が落ちても ttl 経過後は他の instance が取れる
//! - 同じ holder による再取得は成功（renew 扱い）

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::LockError;

#[async_trait]
pub trait ExecutionLock: Send + Sync {
    /// `Ok(true)` when `holder` owns `key` after the call.
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, LockError>;

    /// Release `key` if `holder` still owns it; otherwise a no-op.
    async fn release(&self, key: &str, holder: &str) -> Result<(), LockError>;
}
