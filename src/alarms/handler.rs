//! Reacts to fired alarms.
//!
//! A fired alarm arrives as a bare name string. [`FiredAlarm::from_name`]
//! classifies it exactly once, at the channel boundary; everything past
//! that point branches on the variant, never on the string.
//!
//! The handler is the last stop for an alarm fire. Nothing upstream can
//! react to a failure here, so [`AlarmHandler::handle`] never propagates
//! errors; every failure path ends in a log line.

use crate::alarms::scheduler::{ReminderScheduler, END_OF_TASK_SUFFIX};
use crate::error::{AutomatorError, Result};
use crate::notify::Notifier;
use crate::tasks::{Task, TaskStore};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Body of the end-of-task notification.
pub const END_OF_TASK_MESSAGE: &str = "Task should be completed now!";

/// A fired alarm, classified by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiredAlarm {
    /// The periodic reminder alarm, named exactly after the task id.
    Reminder { task_id: String },
    /// The one-shot end-of-task alarm, named `<task id>-endOfTask`.
    EndOfTask { task_id: String },
}

impl FiredAlarm {
    /// Classify a fired alarm name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.strip_suffix(END_OF_TASK_SUFFIX) {
            Some(task_id) => Self::EndOfTask {
                task_id: task_id.to_owned(),
            },
            None => Self::Reminder {
                task_id: name.to_owned(),
            },
        }
    }

    #[must_use]
    pub fn task_id(&self) -> &str {
        match self {
            Self::Reminder { task_id } | Self::EndOfTask { task_id } => task_id,
        }
    }
}

/// Resolves fired alarms against the task store and notifies.
#[derive(Clone, Debug)]
pub struct AlarmHandler {
    tasks: TaskStore,
    scheduler: ReminderScheduler,
    notifier: Notifier,
}

impl AlarmHandler {
    #[must_use]
    pub fn new(tasks: TaskStore, scheduler: ReminderScheduler, notifier: Notifier) -> Self {
        Self {
            tasks,
            scheduler,
            notifier,
        }
    }

    /// Handle one fired alarm. Never fails; a task deleted between
    /// scheduling and firing is an expected race and logged at info,
    /// anything else at error.
    pub async fn handle(&self, fired: FiredAlarm) {
        let outcome = match &fired {
            FiredAlarm::Reminder { task_id } => self.handle_reminder(task_id).await,
            FiredAlarm::EndOfTask { task_id } => self.handle_end_of_task(task_id).await,
        };
        match outcome {
            Ok(()) => {}
            Err(AutomatorError::TaskNotFound(task_id)) => {
                info!(%task_id, "alarm fired for a task that no longer exists; skipping");
            }
            Err(e) => {
                error!(task_id = fired.task_id(), "alarm handling failed: {e}");
            }
        }
    }

    async fn handle_reminder(&self, task_id: &str) -> Result<()> {
        let task = self.require_task(task_id).await?;
        self.notifier
            .notify(&task.title, &task.reminder_body())
            .await?;

        // Stamp only after the notification made it out.
        let stamped = self.tasks.mark_reminded(task_id, Utc::now()).await?;
        if !stamped {
            debug!(%task_id, "task vanished before its reminder stamp");
        }
        Ok(())
    }

    async fn handle_end_of_task(&self, task_id: &str) -> Result<()> {
        let task = self.require_task(task_id).await?;
        self.notifier.notify(&task.title, END_OF_TASK_MESSAGE).await?;

        // The fired one-shot is already consumed, but the periodic
        // reminder must stop too, so clear both names.
        self.scheduler.clear_task_alarms(task_id)
    }

    async fn require_task(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .find(task_id)
            .await?
            .ok_or_else(|| AutomatorError::TaskNotFound(task_id.to_owned()))
    }
}

/// Run the alarm dispatch loop on a background task: receive fired alarm
/// names, classify each once, hand it to the handler. Exits when the
/// registry side of the channel is gone.
pub fn spawn_dispatch(
    handler: AlarmHandler,
    mut fired_rx: mpsc::UnboundedReceiver<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(name) = fired_rx.recv().await {
            handler.handle(FiredAlarm::from_name(&name)).await;
        }
        debug!("alarm channel closed; dispatch loop ending");
    })
}
