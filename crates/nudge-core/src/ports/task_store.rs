//! TaskStore port - タスクの正本（source of truth）
//!
//! タスク本体は外部のタスク管理システムが所有する。
//! このパイプラインから見た TaskStore は:
//! - 読み取り: reminder 候補の検索、単一タスクの取得
//! - 書き込み: ReminderRecord の追記のみ（Task 行は決して更新しない）
//!
//! どちらも単一行レベルでのみトランザクショナルであることを前提とする。

use async_trait::async_trait;

use crate::domain::{DataAccessError, ReminderQuery, ReminderRecord, TaskContext, TaskId};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Tasks matching the query, with assignee / watchers / team resolved.
    /// Order must be deterministic.
    async fn query(&self, query: &ReminderQuery) -> Result<Vec<TaskContext>, DataAccessError>;

    /// Append one reminder marker.
    async fn record_reminder(&self, record: ReminderRecord) -> Result<(), DataAccessError>;

    async fn get_task(&self, task_id: TaskId) -> Result<Option<TaskContext>, DataAccessError>;
}
