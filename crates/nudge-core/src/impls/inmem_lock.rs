//! InMemoryRunLock - プロセス内の single-instance execution lock
//!
//! 同一プロセス内で scheduler と手動実行が重なった場合の排他に使う。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::LockError;
use crate::ports::ExecutionLock;

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    expires_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct InMemoryRunLock {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
}

impl InMemoryRunLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn holder(&self, key: &str) -> Option<String> {
        self.leases.lock().await.get(key).map(|l| l.holder.clone())
    }
}

#[async_trait]
impl ExecutionLock for InMemoryRunLock {
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, LockError> {
        let mut leases = self.leases.lock().await;
        match leases.get(key) {
            Some(existing) if existing.holder != holder && existing.expires_at > now => Ok(false),
            _ => {
                leases.insert(
                    key.to_string(),
                    Lease {
                        holder: holder.to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, holder: &str) -> Result<(), LockError> {
        let mut leases = self.leases.lock().await;
        if leases.get(key).is_some_and(|l| l.holder == holder) {
            leases.remove(key);
        }
        Ok(())
    }
}
