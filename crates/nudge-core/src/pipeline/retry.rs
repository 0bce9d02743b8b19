//! Retry policy and the run-with-retry executor.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::state::PipelineRun;
use crate::domain::RunExhaustedError;
use crate::ports::Sleeper;

/// Run-level retry policy: attempt budget + fixed delay table.
///
/// The delay after failed attempt `n` (1-indexed) is `delays[n - 1]`, the last
/// entry repeating if the table is shorter than the budget. No delay follows
/// the final attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts,
            delays,
        }
    }

    /// 3 attempts, 60s / 300s / 3600s.
    pub fn daily_reminders() -> Self {
        Self::new(
            3,
            vec![
                Duration::from_secs(60),
                Duration::from_secs(300),
                Duration::from_secs(3600),
            ],
        )
    }

    /// Delay before the next attempt, or `None` when `attempts` used up the budget.
    pub fn next_delay(&self, attempts: u32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            return None;
        }
        let idx = (attempts.saturating_sub(1) as usize).min(self.delays.len().saturating_sub(1));
        Some(self.delays.get(idx).copied().unwrap_or_default())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::daily_reminders()
    }
}

/// Drives one `PipelineRun` through its attempts.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Calls `op` until it succeeds or the budget is spent.
    /// State transitions and backoff are recorded on `run`.
    pub async fn execute<T, E, F, Fut>(
        &self,
        run: &mut PipelineRun,
        op: F,
    ) -> Result<T, RunExhaustedError>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (_tx, rx) = watch::channel(false);
        match self.execute_until(run, &rx, op).await? {
            Some(value) => Ok(value),
            // the sender is alive and never set, so the backoff is never cut short
            None => Err(RunExhaustedError {
                attempts: run.attempts,
                backoff: run.total_backoff,
                last_error: run.last_error.clone().unwrap_or_default(),
            }),
        }
    }

    /// Like [`execute`](Self::execute), but a shutdown request cuts the
    /// backoff short: `Ok(None)` means the run was abandoned between attempts.
    pub async fn execute_until<T, E, F, Fut>(
        &self,
        run: &mut PipelineRun,
        shutdown: &watch::Receiver<bool>,
        mut op: F,
    ) -> Result<Option<T>, RunExhaustedError>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            run.start_attempt();
            let attempt = run.attempts;
            let err = match op(attempt).await {
                Ok(value) => {
                    run.mark_succeeded();
                    return Ok(Some(value));
                }
                Err(err) => err.to_string(),
            };

            run.mark_failed(err.clone());
            let Some(delay) = self.policy.next_delay(attempt) else {
                return Err(RunExhaustedError {
                    attempts: run.attempts,
                    backoff: run.total_backoff,
                    last_error: err,
                });
            };

            tracing::warn!(
                run_id = %run.run_id,
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_secs = delay.as_secs(),
                error = %err,
                "reminder run attempt failed, retrying"
            );
            run.retry_after(delay);
            if !self.backoff(delay, shutdown).await {
                tracing::warn!(run_id = %run.run_id, attempt, "shutdown requested during backoff");
                return Ok(None);
            }
        }
    }

    /// `false` when shutdown was requested before or during the wait.
    async fn backoff(&self, delay: Duration, shutdown: &watch::Receiver<bool>) -> bool {
        let stop = *shutdown.borrow();
        if stop {
            return false;
        }
        let mut rx = shutdown.clone();
        tokio::select! {
            _ = self.sleeper.sleep(delay) => true,
            _ = async {
                let closed = rx.wait_for(|stop| *stop).await.is_err();
                if closed {
                    // sender gone: nothing can ask us to stop any more
                    std::future::pending::<()>().await;
                }
            } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunId;
    use crate::pipeline::RunState;
    use crate::ports::RecordingSleeper;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[rstest]
    #[case(1, Some(60))]
    #[case(2, Some(300))]
    #[case(3, None)]
    #[case(4, None)]
    fn default_schedule(#[case] attempts: u32, #[case] expected_secs: Option<u64>) {
        let policy = RetryPolicy::daily_reminders();
        assert_eq!(policy.next_delay(attempts), expected_secs.map(Duration::from_secs));
    }

    #[test]
    fn short_table_repeats_last_delay() {
        let policy = RetryPolicy::new(5, vec![Duration::from_secs(10)]);
        assert_eq!(policy.next_delay(3), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay(5), None);
    }

    #[test]
    fn single_attempt_budget_never_retries() {
        let policy = RetryPolicy::new(1, vec![Duration::from_secs(10)]);
        assert_eq!(policy.next_delay(1), None);
    }

    fn executor(sleeper: &RecordingSleeper) -> RetryExecutor {
        RetryExecutor::new(RetryPolicy::daily_reminders(), Arc::new(sleeper.clone()))
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_60_and_300() {
        let sleeper = RecordingSleeper::new();
        let mut run = PipelineRun::new(RunId::generate(), "tick");
        let calls = AtomicU32::new(0);

        let out = executor(&sleeper)
            .execute(&mut run, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("store down (attempt {attempt})"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(run.state, RunState::Succeeded);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(60), Duration::from_secs(300)]
        );
        assert_eq!(run.total_backoff, Duration::from_secs(360));
    }

    #[tokio::test]
    async fn exhausts_after_three_failures_without_final_backoff() {
        let sleeper = RecordingSleeper::new();
        let mut run = PipelineRun::new(RunId::generate(), "tick");

        let err = executor(&sleeper)
            .execute(&mut run, |_| async { Err::<(), _>("store down") })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(err.backoff, Duration::from_secs(360));
        assert_eq!(err.last_error, "store down");
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.last_error.as_deref(), Some("store down"));
        assert_eq!(sleeper.total(), Duration::from_secs(360));
    }

    #[tokio::test]
    async fn shutdown_before_backoff_abandons_the_run() {
        let sleeper = RecordingSleeper::new();
        let mut run = PipelineRun::new(RunId::generate(), "tick");
        let (tx, rx) = watch::channel(false);
        let calls = AtomicU32::new(0);

        let out = executor(&sleeper)
            .execute_until(&mut run, &rx, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                // shutdown arrives while the first attempt is failing
                let _ = tx.send(true);
                async { Err::<(), _>("store down") }
            })
            .await
            .unwrap();

        assert_eq!(out, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.recorded().is_empty());
        assert_eq!(run.state, RunState::Pending);
        assert_eq!(run.last_error.as_deref(), Some("store down"));
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_long_backoff() {
        let mut run = PipelineRun::new(RunId::generate(), "tick");
        let (tx, rx) = watch::channel(false);
        let executor = RetryExecutor::new(
            RetryPolicy::new(3, vec![Duration::from_secs(3600)]),
            Arc::new(crate::ports::TokioSleeper),
        );

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
            tx
        });
        let out = tokio::time::timeout(
            Duration::from_secs(5),
            executor.execute_until(&mut run, &rx, |_| async { Err::<(), _>("store down") }),
        )
        .await
        .expect("backoff should be cut short")
        .unwrap();

        assert_eq!(out, None);
        assert_eq!(run.attempts, 1);
        drop(stopper.await.unwrap());
    }

    #[tokio::test]
    async fn first_try_success_does_not_sleep() {
        let sleeper = RecordingSleeper::new();
        let mut run = PipelineRun::new(RunId::generate(), "tick");

        executor(&sleeper)
            .execute(&mut run, |_| async { Ok::<_, String>(()) })
            .await
            .unwrap();

        assert_eq!(run.attempts, 1);
        assert!(sleeper.recorded().is_empty());
    }
}
