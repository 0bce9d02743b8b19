//! Pipeline - reminder run の本体
//!
//! - **selector**: 対象タスクの抽出
//! - **dispatcher**: 宛先ごとに 2 チャネルへ配送し、ReminderRecord を書く
//! - **retry / state**: run 単位の retry policy と状態遷移
//! - **runner**: lock → attempt loop → unlock

pub mod dispatcher;
pub mod retry;
pub mod runner;
pub mod selector;
pub mod state;

pub use self::dispatcher::{DispatchSummary, NotificationDispatcher};
pub use self::retry::{RetryExecutor, RetryPolicy};
pub use self::runner::{ReminderPipeline, RunOutcome, RunReport, tick_key};
pub use self::selector::{DueTask, ReminderSelector};
pub use self::state::{PipelineRun, RunState};
