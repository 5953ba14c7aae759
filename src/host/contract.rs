//! Versioned command/response/event envelopes exchanged with the
//! extension shell.
//!
//! Everything crossing the pipe is one JSON envelope per line. Commands
//! flow shell to engine, responses and events flow engine to shell. The
//! command-name set is closed; an unknown name fails envelope parsing.

use crate::error::{AutomatorError, Result};
use serde::{Deserialize, Serialize};

/// Contract version carried in every envelope.
pub const PROTOCOL_VERSION: u32 = 1;

/// Event name for requesting the shell to render an OS notification.
pub const EVENT_NOTIFICATION_SHOW: &str = "notification.show";
/// Event name for requesting a clipboard write through the focused tab.
pub const EVENT_CLIPBOARD_WRITE: &str = "clipboard.write";
/// Event name for one streamed chat chunk.
pub const EVENT_CHAT_DELTA: &str = "chat.delta";
/// Event name marking the end of a streamed chat reply.
pub const EVENT_CHAT_COMPLETED: &str = "chat.completed";
/// Event name telling the shell the task collection changed.
pub const EVENT_TASKS_CHANGED: &str = "tasks.changed";

/// The closed command set understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "host.stop")]
    HostStop,
    #[serde(rename = "tasks.list")]
    TasksList,
    #[serde(rename = "tasks.save")]
    TasksSave,
    #[serde(rename = "tasks.delete")]
    TasksDelete,
    #[serde(rename = "notes.list")]
    NotesList,
    #[serde(rename = "notes.save")]
    NotesSave,
    #[serde(rename = "notes.delete")]
    NotesDelete,
    #[serde(rename = "snippets.list")]
    SnippetsList,
    #[serde(rename = "snippets.save")]
    SnippetsSave,
    #[serde(rename = "snippets.delete")]
    SnippetsDelete,
    #[serde(rename = "formatters.list")]
    FormattersList,
    #[serde(rename = "formatters.save")]
    FormattersSave,
    #[serde(rename = "formatters.delete")]
    FormattersDelete,
    #[serde(rename = "formatter.run")]
    FormatterRun,
    #[serde(rename = "chats.list")]
    ChatsList,
    #[serde(rename = "chats.save")]
    ChatsSave,
    #[serde(rename = "chats.delete")]
    ChatsDelete,
    #[serde(rename = "chat.send")]
    ChatSend,
    #[serde(rename = "assist.complete")]
    AssistComplete,
    #[serde(rename = "assist.translate")]
    AssistTranslate,
    #[serde(rename = "assist.grammar_fix")]
    AssistGrammarFix,
    #[serde(rename = "menu.action")]
    MenuAction,
    #[serde(rename = "notification.clicked")]
    NotificationClicked,
    #[serde(rename = "alarms.list")]
    AlarmsList,
    #[serde(rename = "config.get")]
    ConfigGet,
    #[serde(rename = "config.patch")]
    ConfigPatch,
}

impl CommandName {
    /// Render the command name in wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::HostStop => "host.stop",
            Self::TasksList => "tasks.list",
            Self::TasksSave => "tasks.save",
            Self::TasksDelete => "tasks.delete",
            Self::NotesList => "notes.list",
            Self::NotesSave => "notes.save",
            Self::NotesDelete => "notes.delete",
            Self::SnippetsList => "snippets.list",
            Self::SnippetsSave => "snippets.save",
            Self::SnippetsDelete => "snippets.delete",
            Self::FormattersList => "formatters.list",
            Self::FormattersSave => "formatters.save",
            Self::FormattersDelete => "formatters.delete",
            Self::FormatterRun => "formatter.run",
            Self::ChatsList => "chats.list",
            Self::ChatsSave => "chats.save",
            Self::ChatsDelete => "chats.delete",
            Self::ChatSend => "chat.send",
            Self::AssistComplete => "assist.complete",
            Self::AssistTranslate => "assist.translate",
            Self::AssistGrammarFix => "assist.grammar_fix",
            Self::MenuAction => "menu.action",
            Self::NotificationClicked => "notification.clicked",
            Self::AlarmsList => "alarms.list",
            Self::ConfigGet => "config.get",
            Self::ConfigPatch => "config.patch",
        }
    }

    /// Parse a wire-format command name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "host.ping" => Some(Self::HostPing),
            "host.version" => Some(Self::HostVersion),
            "host.stop" => Some(Self::HostStop),
            "tasks.list" => Some(Self::TasksList),
            "tasks.save" => Some(Self::TasksSave),
            "tasks.delete" => Some(Self::TasksDelete),
            "notes.list" => Some(Self::NotesList),
            "notes.save" => Some(Self::NotesSave),
            "notes.delete" => Some(Self::NotesDelete),
            "snippets.list" => Some(Self::SnippetsList),
            "snippets.save" => Some(Self::SnippetsSave),
            "snippets.delete" => Some(Self::SnippetsDelete),
            "formatters.list" => Some(Self::FormattersList),
            "formatters.save" => Some(Self::FormattersSave),
            "formatters.delete" => Some(Self::FormattersDelete),
            "formatter.run" => Some(Self::FormatterRun),
            "chats.list" => Some(Self::ChatsList),
            "chats.save" => Some(Self::ChatsSave),
            "chats.delete" => Some(Self::ChatsDelete),
            "chat.send" => Some(Self::ChatSend),
            "assist.complete" => Some(Self::AssistComplete),
            "assist.translate" => Some(Self::AssistTranslate),
            "assist.grammar_fix" => Some(Self::AssistGrammarFix),
            "menu.action" => Some(Self::MenuAction),
            "notification.clicked" => Some(Self::NotificationClicked),
            "alarms.list" => Some(Self::AlarmsList),
            "config.get" => Some(Self::ConfigGet),
            "config.patch" => Some(Self::ConfigPatch),
            _ => None,
        }
    }

    /// Every command name, for contract tests.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::HostPing,
            Self::HostVersion,
            Self::HostStop,
            Self::TasksList,
            Self::TasksSave,
            Self::TasksDelete,
            Self::NotesList,
            Self::NotesSave,
            Self::NotesDelete,
            Self::SnippetsList,
            Self::SnippetsSave,
            Self::SnippetsDelete,
            Self::FormattersList,
            Self::FormattersSave,
            Self::FormattersDelete,
            Self::FormatterRun,
            Self::ChatsList,
            Self::ChatsSave,
            Self::ChatsDelete,
            Self::ChatSend,
            Self::AssistComplete,
            Self::AssistTranslate,
            Self::AssistGrammarFix,
            Self::MenuAction,
            Self::NotificationClicked,
            Self::AlarmsList,
            Self::ConfigGet,
            Self::ConfigPatch,
        ]
    }
}

/// A command from the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Check the contract version and required identifiers.
    pub fn validate(&self) -> Result<()> {
        if self.v != PROTOCOL_VERSION {
            return Err(AutomatorError::Protocol(format!(
                "unsupported contract version {}; expected {PROTOCOL_VERSION}",
                self.v
            )));
        }
        if self.request_id.trim().is_empty() {
            return Err(AutomatorError::Protocol(
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// The engine's reply to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// An unsolicited engine-to-shell message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }
}
