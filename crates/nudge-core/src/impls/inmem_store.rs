//! InMemoryTaskStore - 開発・テスト用の TaskStore
//!
//! # 実装詳細
//! - tokio::sync::Mutex で状態全体を保護（ロックを跨いで外部 await はしない）
//! - tasks は BTreeMap<TaskId, _>: ULID 順 = 作成順が「自然順」になる
//! - 障害注入: `fail_next_queries` / `fail_reminder_writes_for`

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    DataAccessError, ReminderQuery, ReminderRecord, Task, TaskContext, TaskId, Team, TeamId, User,
    UserId,
};
use crate::ports::TaskStore;

#[derive(Default)]
struct StoreState {
    tasks: BTreeMap<TaskId, Task>,
    users: HashMap<UserId, User>,
    teams: HashMap<TeamId, Team>,
    reminders: Vec<ReminderRecord>,

    /// 次の N 回の query を Unavailable で失敗させる
    failing_queries: u32,
    /// この task の ReminderRecord 書き込みを失敗させる
    failing_writes: HashSet<TaskId>,
}

impl StoreState {
    fn resolve(&self, task: &Task) -> Option<TaskContext> {
        let Some(team) = self.teams.get(&task.team_id) else {
            tracing::warn!(task_id = %task.id, team_id = %task.team_id, "task references unknown team, skipping");
            return None;
        };
        let lookup = |id: &UserId| {
            let user = self.users.get(id).cloned();
            if user.is_none() {
                tracing::warn!(task_id = %task.id, user_id = %id, "task references unknown user");
            }
            user
        };
        Some(TaskContext {
            task: task.clone(),
            assignee: task.assignee_id.as_ref().and_then(lookup),
            watchers: task.watcher_ids.iter().filter_map(lookup).collect(),
            team: team.clone(),
        })
    }
}

/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_team(&self, team: Team) {
        self.state.lock().await.teams.insert(team.id, team);
    }

    pub async fn insert_task(&self, task: Task) {
        self.state.lock().await.tasks.insert(task.id, task);
    }

    pub async fn reminders(&self) -> Vec<ReminderRecord> {
        self.state.lock().await.reminders.clone()
    }

    pub async fn reminders_for(&self, task_id: TaskId) -> Vec<ReminderRecord> {
        self.state
            .lock()
            .await
            .reminders
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    pub async fn fail_next_queries(&self, n: u32) {
        self.state.lock().await.failing_queries = n;
    }

    pub async fn fail_reminder_writes_for(&self, task_id: TaskId) {
        self.state.lock().await.failing_writes.insert(task_id);
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn query(&self, query: &ReminderQuery) -> Result<Vec<TaskContext>, DataAccessError> {
        let mut state = self.state.lock().await;
        if state.failing_queries > 0 {
            state.failing_queries -= 1;
            return Err(DataAccessError::Unavailable(
                "in-memory store is marked unavailable".to_string(),
            ));
        }
        if query.due_after >= query.due_until {
            return Err(DataAccessError::Malformed(format!(
                "empty due window ({} .. {})",
                query.due_after, query.due_until
            )));
        }

        Ok(state
            .tasks
            .values()
            .filter(|task| query.matches(task, &state.reminders))
            .filter_map(|task| state.resolve(task))
            .collect())
    }

    async fn record_reminder(&self, record: ReminderRecord) -> Result<(), DataAccessError> {
        let mut state = self.state.lock().await;
        if state.failing_writes.contains(&record.task_id) {
            return Err(DataAccessError::Unavailable(format!(
                "write rejected for {}",
                record.task_id
            )));
        }
        state.reminders.push(record);
        Ok(())
    }

    async fn get_task(&self, task_id: TaskId) -> Result<Option<TaskContext>, DataAccessError> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .get(&task_id)
            .filter(|t| !t.deleted)
            .and_then(|t| state.resolve(t)))
    }
}
