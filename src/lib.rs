//! Automator: background engine for a task-automation browser extension.
//!
//! This crate is the native half of the extension. The UI shell speaks a
//! newline-delimited JSON protocol over stdin/stdout; the engine owns all
//! state and behaviour behind that protocol.
//!
//! # Architecture
//!
//! The engine is built from independent pieces connected by async channels:
//! - **Host bridge**: Versioned command/response/event envelopes over stdio
//! - **Collections**: Tasks, notes, snippets, formatters and chat threads,
//!   persisted in a single storage document
//! - **Alarms**: Named tokio timers that drive periodic task reminders and
//!   one-shot end-of-task fires
//! - **Notifications**: Desktop notifications with click-to-copy delivery
//! - **Assist**: Writing-assistant flows against an OpenAI-compatible
//!   chat-completions API, streaming and one-shot

pub mod alarms;
pub mod app_dirs;
pub mod assist;
pub mod chats;
pub mod collections;
pub mod config;
pub mod error;
pub mod formatters;
pub mod host;
pub mod llm;
pub mod notes;
pub mod notify;
pub mod snippets;
pub mod storage;
pub mod tasks;

pub use alarms::{AlarmHandler, AlarmRegistry, FiredAlarm, ReminderScheduler};
pub use config::AutomatorConfig;
pub use error::{AutomatorError, Result};
pub use host::BackgroundService;
pub use notify::Notifier;
pub use tasks::{Task, TaskStore};
