//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: 開発・テスト用の正本
//! - **InMemoryNotificationSink**: アプリ内通知フィード（開発・テスト用）
//! - **RecordingMailer / LogMailer**: ネットワークを使わない Mailer
//! - **SmtpMailer**: lettre による SMTP 送信
//! - **InMemoryRunLock / FileRunLock**: single-instance execution lock
//!
//! 本番のタスク DB 実装は外部（Web アプリ側の ORM）にある前提。

pub mod file_lock;
pub mod inmem_lock;
pub mod inmem_sink;
pub mod inmem_store;
pub mod recording_mailer;
pub mod smtp_mailer;

// 主要な型を再エクスポート
pub use self::file_lock::FileRunLock;
pub use self::inmem_lock::InMemoryRunLock;
pub use self::inmem_sink::InMemoryNotificationSink;
pub use self::inmem_store::InMemoryTaskStore;
pub use self::recording_mailer::{LogMailer, RecordingMailer};
pub use self::smtp_mailer::SmtpMailer;
