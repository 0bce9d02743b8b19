//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! - config から selector / dispatcher / retry / lock を組み立てる
//! - 外部システム（TaskStore, NotificationSink, Mailer）は必須。足りなければ
//!   build() が BuildError を返す（Fail-fast 設計）
//! - Clock / Sleeper / Lock は省略時に本番用のデフォルトを使う

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::status::RunHistory;
use super::trigger::{DailySchedule, DailyTrigger};
use crate::config::{MailConfig, NudgeConfig};
use crate::domain::{
    ConfigError, DispatchError, NudgeError, TaskId, TeamInvitation, User,
};
use crate::impls::{FileRunLock, InMemoryRunLock, LogMailer, SmtpMailer};
use crate::notification::{LinkBuilder, LinkError, LinkSigner};
use crate::pipeline::{
    DispatchSummary, NotificationDispatcher, ReminderPipeline, ReminderSelector, RetryExecutor,
    RunReport,
};
use crate::ports::{
    Clock, ExecutionLock, IdGenerator, Mailer, NotificationSink, Sleeper, SystemClock, TaskStore,
    TokioSleeper, UlidGenerator,
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These collaborators must be provided before build().")]
    MissingPorts(Vec<&'static str>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Links(#[from] LinkError),
}

/// SMTP when `mail.smtp_host` is set, otherwise a mailer that only logs.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, ConfigError> {
    match config.smtp_host {
        Some(_) => Ok(Arc::new(SmtpMailer::from_config(config)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(config)
///     .task_store(store)
///     .notification_sink(sink)
///     .mailer(mailer)
///     .build()?;
/// let report = app.run_tick().await;
/// ```
pub struct AppBuilder {
    config: NudgeConfig,
    store: Option<Arc<dyn TaskStore>>,
    sink: Option<Arc<dyn NotificationSink>>,
    mailer: Option<Arc<dyn Mailer>>,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    lock: Option<Arc<dyn ExecutionLock>>,
    history: Option<RunHistory>,
}

impl AppBuilder {
    pub fn new(config: NudgeConfig) -> Self {
        Self {
            config,
            store: None,
            sink: None,
            mailer: None,
            clock: None,
            sleeper: None,
            lock: None,
            history: None,
        }
    }

    pub fn task_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn execution_lock(mut self, lock: Arc<dyn ExecutionLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn history(mut self, history: RunHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;

        let mut missing = Vec::new();
        if self.store.is_none() {
            missing.push("task_store");
        }
        if self.sink.is_none() {
            missing.push("notification_sink");
        }
        if self.mailer.is_none() {
            missing.push("mailer");
        }
        let (Some(store), Some(sink), Some(mailer)) = (self.store, self.sink, self.mailer) else {
            return Err(BuildError::MissingPorts(missing));
        };

        let config = self.config;
        let schedule = DailySchedule::from_config(&config.schedule)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));
        let lock: Arc<dyn ExecutionLock> = match (self.lock, &config.lock.dir) {
            (Some(lock), _) => lock,
            (None, Some(dir)) => Arc::new(FileRunLock::new(dir.clone())),
            (None, None) => Arc::new(InMemoryRunLock::new()),
        };
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let links = LinkBuilder::new(
            config.links.base_url.clone(),
            LinkSigner::new(config.links.signing_secret.as_bytes())?,
        );

        let selector = ReminderSelector::new(
            Arc::clone(&store),
            config.reminders.lookahead()?,
            config.reminders.suppression()?,
        );
        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&store),
            sink,
            mailer,
            Arc::clone(&ids),
            links.clone(),
        );
        let pipeline = ReminderPipeline::new(
            selector,
            dispatcher,
            RetryExecutor::new(config.retry.policy(), sleeper),
            lock,
            Arc::clone(&clock),
            ids,
            config.lock.ttl()?,
        );

        tracing::debug!(?config, "app built");
        Ok(App {
            pipeline: Arc::new(pipeline),
            store,
            clock,
            links,
            schedule,
            history: self.history.unwrap_or_default(),
        })
    }
}

/// Wired pipeline plus the run history it reports into.
pub struct App {
    pipeline: Arc<ReminderPipeline>,
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    links: LinkBuilder,
    schedule: DailySchedule,
    history: RunHistory,
}

impl App {
    pub fn schedule(&self) -> DailySchedule {
        self.schedule
    }

    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// One tick right now (manual run); recorded in the history.
    pub async fn run_tick(&self) -> RunReport {
        let report = self.pipeline.run_tick().await;
        self.history.push(report.clone()).await;
        report
    }

    pub fn spawn_trigger(&self) -> DailyTrigger {
        DailyTrigger::spawn(
            self.schedule,
            Arc::clone(&self.pipeline),
            self.history.clone(),
        )
    }

    /// Looks the task up and notifies its current assignee.
    pub async fn notify_task_assigned(
        &self,
        task_id: TaskId,
        assigned_by: &User,
    ) -> Result<DispatchSummary, NudgeError> {
        let ctx = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(DispatchError::TaskNotFound(task_id))?;
        Ok(self
            .pipeline
            .dispatcher()
            .notify_task_assigned(&ctx, assigned_by, self.now())
            .await)
    }

    pub async fn notify_team_invitation(
        &self,
        invitation: &TeamInvitation,
    ) -> Result<DispatchSummary, NudgeError> {
        Ok(self
            .pipeline
            .dispatcher()
            .notify_team_invitation(invitation, self.now())
            .await?)
    }
}
