//! Maps a task's reminder configuration onto registry timers.
//!
//! Two alarm names are derived from a task id and nothing else:
//! the periodic reminder alarm is named exactly `<task id>`, and the
//! one-shot end-of-task alarm is named `<task id>-endOfTask`. Fired
//! alarms are dispatched purely on this naming convention, so it must
//! not change.

use crate::alarms::registry::AlarmRegistry;
use crate::error::{AutomatorError, Result};
use crate::tasks::Task;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

/// Suffix distinguishing the one-shot end-of-task alarm from the
/// periodic reminder alarm.
pub const END_OF_TASK_SUFFIX: &str = "-endOfTask";

/// Name of the one-shot end-of-task alarm for a task.
#[must_use]
pub fn end_of_task_alarm_name(task_id: &str) -> String {
    format!("{task_id}{END_OF_TASK_SUFFIX}")
}

/// Registers, re-registers and cancels the two alarms of a task.
#[derive(Clone, Debug)]
pub struct ReminderScheduler {
    registry: AlarmRegistry,
}

impl ReminderScheduler {
    #[must_use]
    pub fn new(registry: AlarmRegistry) -> Self {
        Self { registry }
    }

    /// Reject reminder periods the platform cannot schedule.
    pub fn validate_period(period_minutes: u32) -> Result<()> {
        if period_minutes < 1 {
            return Err(AutomatorError::InvalidScheduleParameter(format!(
                "reminder period must be at least one minute, got {period_minutes}"
            )));
        }
        Ok(())
    }

    /// Create (or replace) the periodic reminder alarm for a task. The
    /// first fire happens one full period from now.
    pub fn schedule_reminder(&self, task_id: &str, period_minutes: u32) -> Result<()> {
        Self::validate_period(period_minutes)?;
        let period = Duration::from_secs(u64::from(period_minutes) * 60);
        self.registry.create_periodic(task_id, period)
    }

    /// Create (or replace) the one-shot end-of-task alarm. A due instant
    /// already in the past fires immediately; that is platform behavior
    /// and deliberately not corrected here.
    pub fn schedule_end_of_task(&self, task_id: &str, due_at: DateTime<Utc>) -> Result<()> {
        self.registry
            .create_once(&end_of_task_alarm_name(task_id), due_at)
    }

    /// Cancel the periodic reminder alarm. Idempotent.
    pub fn cancel_reminder(&self, task_id: &str) -> Result<()> {
        self.registry.clear(task_id).map(|_| ())
    }

    /// Cancel the end-of-task alarm. Idempotent.
    pub fn cancel_end_of_task(&self, task_id: &str) -> Result<()> {
        self.registry
            .clear(&end_of_task_alarm_name(task_id))
            .map(|_| ())
    }

    /// Cancel both alarms of a task. Idempotent.
    pub fn clear_task_alarms(&self, task_id: &str) -> Result<()> {
        self.cancel_reminder(task_id)?;
        self.cancel_end_of_task(task_id)
    }

    /// Names of every live alarm, sorted.
    pub fn active_alarms(&self) -> Result<Vec<String>> {
        self.registry.active()
    }

    /// Bring the registry in line with a freshly saved task: clear both
    /// alarms, then re-create the ones its fields call for.
    pub fn sync_task_alarms(&self, task: &Task) -> Result<()> {
        self.clear_task_alarms(&task.id)?;

        if let Some(period_minutes) = task.reminder_every {
            self.schedule_reminder(&task.id, period_minutes)?;
        }
        if let Some(due_at) = task.due_datetime {
            self.schedule_end_of_task(&task.id, due_at)?;
        }
        Ok(())
    }

    /// Re-arm alarms for persisted tasks after a restart. Returns the
    /// number of alarms created.
    ///
    /// End-of-task alarms whose due instant has already passed are
    /// skipped: a fire missed while the process was down is not
    /// recovered. Stored tasks with an invalid reminder period are
    /// logged and skipped rather than failing the whole pass.
    pub fn rearm_all(&self, tasks: &[Task]) -> Result<usize> {
        let mut armed = 0;
        let now = Utc::now();

        for task in tasks {
            if let Some(period_minutes) = task.reminder_every {
                match self.schedule_reminder(&task.id, period_minutes) {
                    Ok(()) => armed += 1,
                    Err(e) => {
                        warn!(task_id = %task.id, "skipping stored reminder: {e}");
                    }
                }
            }
            if let Some(due_at) = task.due_datetime {
                if due_at > now {
                    self.schedule_end_of_task(&task.id, due_at)?;
                    armed += 1;
                } else {
                    debug!(task_id = %task.id, %due_at, "due time already passed; not re-arming");
                }
            }
        }
        Ok(armed)
    }
}
