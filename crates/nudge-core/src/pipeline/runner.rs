//! ReminderPipeline: lock -> (select -> dispatch each) with retry -> unlock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::dispatcher::{DispatchSummary, NotificationDispatcher};
use super::retry::RetryExecutor;
use super::selector::ReminderSelector;
use super::state::PipelineRun;
use crate::domain::{DataAccessError, RunId};
use crate::ports::{Clock, ExecutionLock, IdGenerator};

/// Lock key for the run scheduled on `date`.
pub fn tick_key(date: NaiveDate) -> String {
    format!("task-reminders:{}", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    /// Stopped between tasks by a shutdown request.
    Aborted,
    /// Retry budget exhausted.
    Failed,
    /// Another holder owns the tick lock.
    SkippedLocked,
    /// The lock backend itself failed.
    SkippedLockError,
}

impl RunOutcome {
    pub fn is_skipped(self) -> bool {
        matches!(self, RunOutcome::SkippedLocked | RunOutcome::SkippedLockError)
    }
}

/// Summary of one tick, kept in the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub tick: String,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempts: u32,
    pub total_backoff: Duration,
    pub tasks_selected: usize,
    pub tasks_reminded: usize,
    pub task_failures: usize,
    pub deliveries: DispatchSummary,
    pub last_error: Option<String>,
}

impl RunReport {
    pub fn aborted(&self) -> bool {
        self.outcome == RunOutcome::Aborted
    }
}

/// Per-attempt progress; only the successful attempt's numbers are reported.
#[derive(Debug, Default)]
struct AttemptProgress {
    selected: usize,
    reminded: usize,
    failures: usize,
    deliveries: DispatchSummary,
    aborted: bool,
}

pub struct ReminderPipeline {
    selector: ReminderSelector,
    dispatcher: NotificationDispatcher,
    executor: RetryExecutor,
    lock: Arc<dyn ExecutionLock>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    lock_ttl: chrono::Duration,
}

impl ReminderPipeline {
    pub fn new(
        selector: ReminderSelector,
        dispatcher: NotificationDispatcher,
        executor: RetryExecutor,
        lock: Arc<dyn ExecutionLock>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        lock_ttl: chrono::Duration,
    ) -> Self {
        Self {
            selector,
            dispatcher,
            executor,
            lock,
            clock,
            ids,
            lock_ttl,
        }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run one tick to completion.
    pub async fn run_tick(&self) -> RunReport {
        let (_tx, rx) = watch::channel(false);
        self.run_tick_until(&rx).await
    }

    /// Run one tick; `shutdown` is checked between tasks and during retry backoff.
    pub async fn run_tick_until(&self, shutdown: &watch::Receiver<bool>) -> RunReport {
        let started_at = self.clock.now();
        let tick = tick_key(started_at.date_naive());
        let mut run = PipelineRun::new(self.ids.generate_run_id(), tick.clone());
        let holder = run.run_id.to_string();

        match self
            .lock
            .try_acquire(&tick, &holder, self.lock_ttl, started_at)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(run_id = %run.run_id, tick = %tick, "tick lock held elsewhere, skipping");
                return self.report(&run, RunOutcome::SkippedLocked, started_at, None);
            }
            Err(e) => {
                tracing::warn!(run_id = %run.run_id, tick = %tick, error = %e, "tick lock unavailable, skipping");
                run.last_error = Some(e.to_string());
                return self.report(&run, RunOutcome::SkippedLockError, started_at, None);
            }
        }

        tracing::info!(run_id = %run.run_id, tick = %tick, "reminder run started");
        let result = self
            .executor
            .execute_until(&mut run, shutdown, |attempt| self.attempt(attempt, shutdown))
            .await;

        if let Err(e) = self.lock.release(&tick, &holder).await {
            tracing::warn!(run_id = %run.run_id, tick = %tick, error = %e, "failed to release tick lock");
        }

        match result {
            Ok(None) => {
                tracing::warn!(
                    run_id = %run.run_id,
                    tick = %tick,
                    attempts = run.attempts,
                    "reminder run abandoned during backoff"
                );
                self.report(&run, RunOutcome::Aborted, started_at, None)
            }
            Ok(Some(progress)) => {
                let outcome = if progress.aborted {
                    RunOutcome::Aborted
                } else {
                    RunOutcome::Succeeded
                };
                let report = self.report(&run, outcome, started_at, Some(&progress));
                tracing::info!(
                    run_id = %report.run_id,
                    outcome = ?report.outcome,
                    attempts = report.attempts,
                    selected = report.tasks_selected,
                    reminded = report.tasks_reminded,
                    task_failures = report.task_failures,
                    delivery_failures = report.deliveries.failed,
                    "reminder run finished"
                );
                report
            }
            Err(exhausted) => {
                tracing::error!(
                    run_id = %run.run_id,
                    tick = %tick,
                    attempts = exhausted.attempts,
                    backoff_secs = exhausted.backoff.as_secs(),
                    error = %exhausted.last_error,
                    "reminder run exhausted its retries"
                );
                self.report(&run, RunOutcome::Failed, started_at, None)
            }
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<AttemptProgress, DataAccessError> {
        let now = self.clock.now();
        tracing::debug!(attempt, %now, "reminder attempt");
        let due = self.selector.select_due_tasks(now).await?;

        let mut progress = AttemptProgress {
            selected: due.len(),
            ..AttemptProgress::default()
        };
        for task in &due {
            let stop = *shutdown.borrow();
            if stop {
                tracing::warn!(
                    remaining = progress.selected - progress.reminded - progress.failures,
                    "shutdown requested, stopping between tasks"
                );
                progress.aborted = true;
                break;
            }
            match self.dispatcher.dispatch_reminder(&task.context, now).await {
                Ok(summary) => {
                    progress.reminded += 1;
                    progress.deliveries.merge(&summary);
                }
                Err(e) => {
                    progress.failures += 1;
                    tracing::error!(task_id = %task.context.task.id, error = %e, "reminder dispatch failed");
                }
            }
        }
        Ok(progress)
    }

    fn report(
        &self,
        run: &PipelineRun,
        outcome: RunOutcome,
        started_at: DateTime<Utc>,
        progress: Option<&AttemptProgress>,
    ) -> RunReport {
        let (selected, reminded, failures, deliveries) = progress
            .map(|p| (p.selected, p.reminded, p.failures, p.deliveries))
            .unwrap_or_default();
        RunReport {
            run_id: run.run_id,
            tick: run.tick.clone(),
            outcome,
            started_at,
            finished_at: self.clock.now(),
            attempts: run.attempts,
            total_backoff: run.total_backoff,
            tasks_selected: selected,
            tasks_reminded: reminded,
            task_failures: failures,
            deliveries,
            last_error: run.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, Team, User};
    use crate::impls::{InMemoryNotificationSink, InMemoryRunLock, InMemoryTaskStore, RecordingMailer};
    use crate::notification::{LinkBuilder, LinkSigner};
    use crate::pipeline::RetryPolicy;
    use crate::ports::{FixedClock, RecordingSleeper, UlidGenerator};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    struct Harness {
        store: InMemoryTaskStore,
        sink: InMemoryNotificationSink,
        mailer: RecordingMailer,
        lock: InMemoryRunLock,
        clock: FixedClock,
        sleeper: RecordingSleeper,
        pipeline: ReminderPipeline,
        team: Team,
    }

    async fn harness() -> Harness {
        let store = InMemoryTaskStore::new();
        let sink = InMemoryNotificationSink::new();
        let mailer = RecordingMailer::new();
        let lock = InMemoryRunLock::new();
        let clock = FixedClock::new(now());
        let sleeper = RecordingSleeper::new();
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));

        let team = Team::new("core");
        store.insert_team(team.clone()).await;

        let dispatcher = NotificationDispatcher::new(
            Arc::new(store.clone()),
            Arc::new(sink.clone()),
            Arc::new(mailer.clone()),
            Arc::clone(&ids),
            LinkBuilder::new("https://app.test", LinkSigner::new("k").unwrap()),
        );
        let pipeline = ReminderPipeline::new(
            ReminderSelector::with_defaults(Arc::new(store.clone())),
            dispatcher,
            RetryExecutor::new(RetryPolicy::daily_reminders(), Arc::new(sleeper.clone())),
            Arc::new(lock.clone()),
            Arc::new(clock.clone()),
            ids,
            chrono::Duration::hours(2),
        );
        Harness {
            store,
            sink,
            mailer,
            lock,
            clock,
            sleeper,
            pipeline,
            team,
        }
    }

    async fn seed_user(h: &Harness, name: &str) -> User {
        let user = User::new(name, format!("{name}@example.com"));
        h.store.insert_user(user.clone()).await;
        user
    }

    #[test]
    fn tick_key_is_per_utc_day() {
        assert_eq!(tick_key(now().date_naive()), "task-reminders:2026-03-02");
    }

    #[tokio::test]
    async fn due_in_12h_with_assignee_and_two_watchers() {
        let h = harness().await;
        let alice = seed_user(&h, "alice").await;
        let bob = seed_user(&h, "bob").await;
        let carol = seed_user(&h, "carol").await;
        h.store
            .insert_task(
                Task::new("ship it", h.team.id)
                    .with_due_date(now() + chrono::Duration::hours(12))
                    .with_assignee(alice.id)
                    .with_watchers([bob.id, carol.id]),
            )
            .await;

        let report = h.pipeline.run_tick().await;

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.tick, "task-reminders:2026-03-02");
        assert_eq!(report.tasks_selected, 1);
        assert_eq!(report.tasks_reminded, 1);
        assert_eq!(h.sink.stored().await.len(), 3);
        assert_eq!(h.mailer.sent().await.len(), 3);
        assert_eq!(h.store.reminders().await.len(), 1);
        // lock released at the end of the run
        assert_eq!(h.lock.holder("task-reminders:2026-03-02").await, None);
    }

    #[tokio::test]
    async fn no_recipients_still_writes_marker() {
        let h = harness().await;
        h.store
            .insert_task(
                Task::new("lonely", h.team.id).with_due_date(now() + chrono::Duration::days(2)),
            )
            .await;

        let report = h.pipeline.run_tick().await;

        assert_eq!(report.deliveries, DispatchSummary::default());
        assert!(h.mailer.sent().await.is_empty());
        assert_eq!(h.store.reminders().await.len(), 1);
    }

    #[tokio::test]
    async fn second_run_same_day_is_suppressed() {
        let h = harness().await;
        let alice = seed_user(&h, "alice").await;
        let task = Task::new("ship it", h.team.id)
            .with_due_date(now() + chrono::Duration::days(3))
            .with_assignee(alice.id);
        h.store.insert_task(task.clone()).await;

        h.pipeline.run_tick().await;
        h.clock.advance(chrono::Duration::hours(4));
        let second = h.pipeline.run_tick().await;

        assert_eq!(second.outcome, RunOutcome::Succeeded);
        assert_eq!(second.tasks_selected, 0);
        assert_eq!(h.store.reminders_for(task.id).await.len(), 1);
        assert_eq!(h.mailer.sent().await.len(), 1);

        // the next morning the suppression window has passed
        h.clock.advance(chrono::Duration::hours(21));
        let next_day = h.pipeline.run_tick().await;
        assert_eq!(next_day.tasks_reminded, 1);
        assert_eq!(h.store.reminders_for(task.id).await.len(), 2);
    }

    #[tokio::test]
    async fn email_failure_for_one_recipient_is_isolated() {
        let h = harness().await;
        let alice = seed_user(&h, "alice").await;
        let bob = seed_user(&h, "bob").await;
        h.mailer.fail_for(bob.email.clone()).await;
        h.store
            .insert_task(
                Task::new("ship it", h.team.id)
                    .with_due_date(now() + chrono::Duration::days(1))
                    .with_assignee(alice.id)
                    .with_watchers([bob.id]),
            )
            .await;

        let report = h.pipeline.run_tick().await;

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.deliveries.failed, 1);
        assert_eq!(h.mailer.sent_to(&alice.email).await.len(), 1);
        assert_eq!(h.sink.for_recipient(bob.id).await.len(), 1);
        assert_eq!(h.store.reminders().await.len(), 1);
    }

    #[tokio::test]
    async fn record_write_failure_skips_only_that_task() {
        let h = harness().await;
        let bad = Task::new("bad", h.team.id).with_due_date(now() + chrono::Duration::days(1));
        let good = Task::new("good", h.team.id).with_due_date(now() + chrono::Duration::days(1));
        h.store.fail_reminder_writes_for(bad.id).await;
        h.store.insert_task(bad).await;
        h.store.insert_task(good.clone()).await;

        let report = h.pipeline.run_tick().await;

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.tasks_reminded, 1);
        assert_eq!(report.task_failures, 1);
        assert_eq!(h.store.reminders_for(good.id).await.len(), 1);
    }

    #[tokio::test]
    async fn selector_failing_twice_then_succeeding() {
        let h = harness().await;
        h.store
            .insert_task(Task::new("t", h.team.id).with_due_date(now() + chrono::Duration::days(1)))
            .await;
        h.store.fail_next_queries(2).await;

        let report = h.pipeline.run_tick().await;

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.attempts, 3);
        assert_eq!(
            h.sleeper.recorded(),
            vec![Duration::from_secs(60), Duration::from_secs(300)]
        );
        assert_eq!(report.total_backoff, Duration::from_secs(360));
        assert_eq!(h.store.reminders().await.len(), 1);
    }

    #[tokio::test]
    async fn selector_failing_three_times_exhausts_the_run() {
        let h = harness().await;
        h.store.fail_next_queries(3).await;

        let report = h.pipeline.run_tick().await;

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(report.attempts, 3);
        assert_eq!(h.sleeper.total(), Duration::from_secs(360));
        assert!(
            report
                .last_error
                .as_deref()
                .is_some_and(|e| e.contains("unavailable"))
        );
        assert_eq!(h.lock.holder("task-reminders:2026-03-02").await, None);
    }

    #[tokio::test]
    async fn held_lock_skips_the_tick() {
        let h = harness().await;
        h.store
            .insert_task(Task::new("t", h.team.id).with_due_date(now() + chrono::Duration::days(1)))
            .await;
        h.lock
            .try_acquire(
                "task-reminders:2026-03-02",
                "other-instance",
                chrono::Duration::hours(2),
                now(),
            )
            .await
            .unwrap();

        let report = h.pipeline.run_tick().await;

        assert_eq!(report.outcome, RunOutcome::SkippedLocked);
        assert!(report.outcome.is_skipped());
        assert_eq!(report.attempts, 0);
        assert!(h.store.reminders().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_while_selector_fails_skips_the_backoff() {
        let h = harness().await;
        h.store
            .insert_task(Task::new("t", h.team.id).with_due_date(now() + chrono::Duration::days(1)))
            .await;
        h.store.fail_next_queries(3).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = h.pipeline.run_tick_until(&rx).await;

        assert_eq!(report.outcome, RunOutcome::Aborted);
        assert_eq!(report.attempts, 1);
        assert!(report.last_error.is_some());
        assert!(h.sleeper.recorded().is_empty());
        assert!(h.store.reminders().await.is_empty());
        assert_eq!(h.lock.holder("task-reminders:2026-03-02").await, None);
    }

    #[tokio::test]
    async fn shutdown_stops_between_tasks() {
        let h = harness().await;
        h.store
            .insert_task(Task::new("t", h.team.id).with_due_date(now() + chrono::Duration::days(1)))
            .await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = h.pipeline.run_tick_until(&rx).await;

        assert!(report.aborted());
        assert_eq!(report.tasks_selected, 1);
        assert_eq!(report.tasks_reminded, 0);
        // unwritten marker: eligible again next run
        assert!(h.store.reminders().await.is_empty());
    }
}
