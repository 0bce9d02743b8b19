//! Domain model (IDs, tasks, reminder records, urgency, errors).

pub mod errors;
pub mod ids;
pub mod invitation;
pub mod reminder;
pub mod task;
pub mod urgency;

pub use self::errors::{
    ConfigError, DataAccessError, DeliveryError, DispatchError, LockError, NudgeError,
    RunExhaustedError,
};
pub use self::ids::{Id, InvitationId, ReminderId, RunId, TaskId, TeamId, UserId};
pub use self::invitation::{TeamInvitation, TeamRole};
pub use self::reminder::{ReminderQuery, ReminderRecord, ReminderType};
pub use self::task::{Priority, Task, TaskContext, TaskStatus, Team, User};
pub use self::urgency::{UrgencyTier, days_until_due};
