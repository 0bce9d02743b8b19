//! Daily trigger - 毎日決まった UTC 時刻に 1 tick 実行する
//!
//! - `DailyTrigger::spawn` で background task を起動
//! - `shutdown_and_join()` で停止要求を出し、実行中の run が task 境界で止まるのを待つ

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::status::RunHistory;
use crate::config::ScheduleConfig;
use crate::domain::ConfigError;
use crate::pipeline::ReminderPipeline;
use crate::ports::Clock;

/// Fire time of the daily run, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ConfigError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|at| Self { at })
            .ok_or_else(|| {
                ConfigError::Invalid(format!("{hour:02}:{minute:02} is not a time of day"))
            })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        Self::new(config.hour, config.minute)
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// First fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }

    pub fn upcoming(&self, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = now;
        for _ in 0..count {
            cursor = self.next_after(cursor);
            out.push(cursor);
        }
        out
    }
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            at: NaiveTime::MIN + Duration::hours(8),
        }
    }
}

/// Handle to the background trigger loop.
pub struct DailyTrigger {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DailyTrigger {
    pub fn spawn(
        schedule: DailySchedule,
        pipeline: Arc<ReminderPipeline>,
        history: RunHistory,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            trigger_loop(schedule, pipeline, history, shutdown_rx).await;
        });
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "trigger loop panicked");
        }
    }
}

async fn trigger_loop(
    schedule: DailySchedule,
    pipeline: Arc<ReminderPipeline>,
    history: RunHistory,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!(at = %schedule.at(), "daily trigger started");
    loop {
        let stop = *shutdown_rx.borrow();
        if stop {
            break;
        }

        let now = pipeline.clock().now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next_run = %next, wait_secs = wait.as_secs(), "waiting for next tick");

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped: nobody can stop us any more, so stop now
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let report = pipeline.run_tick_until(&shutdown_rx).await;
        history.push(report).await;
    }
    tracing::info!("daily trigger stopped");
}
