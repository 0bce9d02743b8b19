//! Errors - エラー型と分類
//!
//! 伝播ポリシー:
//! - `DeliveryError`: 1 recipient × 1 channel の失敗。ログに残して握りつぶす
//! - `DispatchError`: 1 task の失敗。runner が task 単位で catch する
//! - `DataAccessError`: selector の失敗は run 全体を失敗させ、retry policy に渡る
//! - `RunExhaustedError`: retry を使い切った。operator に見える形で記録する

use std::time::Duration;

use thiserror::Error;

use super::{InvitationId, TaskId};

/// Task store unreachable or the query was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataAccessError {
    #[error("task store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed task store query: {0}")]
    Malformed(String),
}

/// One channel failed for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("notification sink error: {0}")]
    Sink(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("failed to write reminder record: {0}")]
    RecordWrite(#[from] DataAccessError),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("invitation {0} has already expired")]
    InvitationExpired(InvitationId),
}

/// All attempts of a pipeline run failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("run failed after {attempts} attempts ({backoff:?} backoff): {last_error}")]
pub struct RunExhaustedError {
    pub attempts: u32,
    pub backoff: Duration,
    pub last_error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("lock backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum NudgeError {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    RunExhausted(#[from] RunExhaustedError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, NudgeError>;
