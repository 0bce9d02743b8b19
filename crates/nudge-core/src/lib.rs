//! nudge-core
//!
//! Task reminder and notification dispatch pipeline.
//!
//! 毎日 1 回、期限の近いタスクを選び、assignee と watcher 全員に
//! アプリ内通知 + メールで知らせ、送信済みマーカー（ReminderRecord）を残す。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, reminder, urgency, invitation, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, NotificationSink, Mailer, ExecutionLock, Clock, Sleeper）
//! - **notification**: Notification trait と 3 種類の通知（due soon / assigned / invitation）
//! - **pipeline**: selector, dispatcher, retry policy, runner
//! - **app**: builder, daily trigger, run history
//! - **impls**: 実装（in-memory, SMTP, file lease）
//! - **config**: TOML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod notification;
pub mod pipeline;
pub mod ports;
