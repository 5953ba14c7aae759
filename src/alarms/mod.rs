//! Task reminder alarms.
//!
//! Three layers:
//! - [`registry`]: the process-wide named-timer table. Every alarm is a
//!   spawned tokio timer that reports fires as alarm names on one channel.
//! - [`scheduler`]: maps a task's reminder configuration onto registry
//!   entries using the two derived alarm names.
//! - [`handler`]: consumes fires, resolves them against the task store and
//!   produces notifications.

pub mod handler;
pub mod registry;
pub mod scheduler;

pub use handler::{spawn_dispatch, AlarmHandler, FiredAlarm, END_OF_TASK_MESSAGE};
pub use registry::AlarmRegistry;
pub use scheduler::{end_of_task_alarm_name, ReminderScheduler, END_OF_TASK_SUFFIX};
