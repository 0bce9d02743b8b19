//! Status - run 履歴
//!
//! 直近の RunReport を固定長のリングバッファで保持する。
//! exhausted run もここに残るので、operator は `latest_failure()` で確認できる。

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::pipeline::{RunOutcome, RunReport};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct RunHistory {
    reports: Arc<Mutex<VecDeque<RunReport>>>,
    capacity: usize,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            reports: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append, evicting the oldest report at capacity.
    pub async fn push(&self, report: RunReport) {
        let mut reports = self.reports.lock().await;
        if reports.len() >= self.capacity {
            reports.pop_front();
        }
        reports.push_back(report);
    }

    /// Newest first.
    pub async fn recent(&self, limit: usize) -> Vec<RunReport> {
        self.reports
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn latest(&self) -> Option<RunReport> {
        self.reports.lock().await.back().cloned()
    }

    pub async fn latest_failure(&self) -> Option<RunReport> {
        self.reports
            .lock()
            .await
            .iter()
            .rev()
            .find(|r| r.outcome == RunOutcome::Failed)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.reports.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
