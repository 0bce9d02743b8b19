//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。パイプラインが依存する外部システム
//! （タスク DB、アプリ内通知フィード、メール送信、分散ロック、時計）への
//! インターフェースを定義し、実装の詳細を隠蔽する。

pub mod clock;
pub mod id_generator;
pub mod mailer;
pub mod notification_sink;
pub mod run_lock;
pub mod sleeper;
pub mod task_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::mailer::Mailer;
pub use self::notification_sink::NotificationSink;
pub use self::run_lock::ExecutionLock;
pub use self::sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use self::task_store::TaskStore;
