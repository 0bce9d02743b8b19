//! Pipeline run state machine.
//!
//! State transitions:
//! - Pending -> Running -> Succeeded
//! - Pending -> Running -> Failed -> Pending (retry, while budget remains)
//! - Pending -> Running -> Failed (budget exhausted, terminal until next tick)
//!
//! A run aborted by shutdown during backoff stays Pending; nothing resumes it,
//! the next tick starts a fresh run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// One execution of selector + dispatcher for a tick, across its attempts.
/// Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: RunId,
    pub tick: String,
    pub state: RunState,

    /// Attempts started so far (including the current one while Running).
    pub attempts: u32,

    /// Sum of backoff delays scheduled between attempts.
    pub total_backoff: Duration,

    pub last_error: Option<String>,
}

impl PipelineRun {
    pub fn new(run_id: RunId, tick: impl Into<String>) -> Self {
        Self {
            run_id,
            tick: tick.into(),
            state: RunState::Pending,
            attempts: 0,
            total_backoff: Duration::ZERO,
            last_error: None,
        }
    }

    pub fn start_attempt(&mut self) {
        self.state = RunState::Running;
        self.attempts += 1;
    }

    pub fn mark_succeeded(&mut self) {
        self.state = RunState::Succeeded;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = RunState::Failed;
        self.last_error = Some(error);
    }

    /// Failed -> Pending, to be attempted again after `delay`.
    /// No-op unless the run is Failed.
    pub fn retry_after(&mut self, delay: Duration) {
        if self.state == RunState::Failed {
            self.state = RunState::Pending;
            self.total_backoff += delay;
        }
    }
}
