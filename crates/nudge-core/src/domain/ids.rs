//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! すべての ID は ULID (Universally Unique Lexicographically Sortable Identifier) です。
//! Phantom type パターンで `TaskId` と `UserId` などを型レベルで区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: in-memory store の「自然順」をそのまま ID 順にできる
//! - **分散生成可能**: ReminderRecord を複数ワーカーが書いても衝突しない
//! - **UUID互換**: 128-bit

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-", "user-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// Serialize は中身の ULID 文字列のみ（プレフィックスなし）。
/// 永続化されたペイロードを他サブシステムがそのまま読めるようにするため。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Fresh random id (uses the system clock for the timestamp part).
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when an id string is not a valid (optionally prefixed) ULID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id '{0}'")]
pub struct ParseIdError(String);

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    /// Accepts both `task-01H...` and the bare ULID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident => $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(/// Task のマーカー型
    TaskMarker => "task-");
id_marker!(/// User のマーカー型
    UserMarker => "user-");
id_marker!(/// Team のマーカー型
    TeamMarker => "team-");
id_marker!(/// ReminderRecord のマーカー型
    ReminderMarker => "reminder-");
id_marker!(/// TeamInvitation のマーカー型
    InvitationMarker => "invitation-");
id_marker!(/// PipelineRun のマーカー型
    RunMarker => "run-");

// ========================================
// Type Alias（使いやすさのため）
// ========================================

pub type TaskId = Id<TaskMarker>;
pub type UserId = Id<UserMarker>;
pub type TeamId = Id<TeamMarker>;
pub type ReminderId = Id<ReminderMarker>;
pub type InvitationId = Id<InvitationMarker>;

/// Identifier of one pipeline run (one trigger tick, all of its attempts).
pub type RunId = Id<RunMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_type_prefix() {
        let ulid = Ulid::new();
        assert!(TaskId::from_ulid(ulid).to_string().starts_with("task-"));
        assert!(UserId::from_ulid(ulid).to_string().starts_with("user-"));
        assert!(InvitationId::from_ulid(ulid).to_string().starts_with("invitation-"));
        assert!(RunId::from_ulid(ulid).to_string().starts_with("run-"));
    }

    #[test]
    fn parse_accepts_prefixed_and_bare_forms() {
        let id = TaskId::generate();
        let bare = id.as_ulid().to_string();

        assert_eq!(id.to_string().parse::<TaskId>().unwrap(), id);
        assert_eq!(bare.parse::<TaskId>().unwrap(), id);
        assert!("task-not-a-ulid".parse::<TaskId>().is_err());
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let id = TeamId::generate();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!(id.as_ulid().to_string()));

        let back: TeamId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let first = TaskId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = TaskId::generate();
        assert!(first < second);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<TaskId>(), std::mem::size_of::<Ulid>());
    }
}
