//! App - アプリケーション層
//!
//! pipeline と ports を組み合わせて、実際に動かせる形にする。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: config + adapters からのワイヤリング（Fail-fast）
//! - **DailyTrigger**: 毎日 08:00 UTC（設定可能）に tick を起動するループ
//! - **RunHistory**: 直近の RunReport

pub mod builder;
pub mod status;
pub mod trigger;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError, mailer_from_config};
pub use self::status::RunHistory;
pub use self::trigger::{DailySchedule, DailyTrigger};
