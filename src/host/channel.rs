//! Command channel and router between the wire layer and the engine.
//!
//! Commands travel over an mpsc channel with a oneshot reply per request;
//! events go out over a broadcast channel that the wire layer forwards to
//! stdout. The [`BackgroundCommands`] trait is the seam the real engine
//! implements; every method has a benign default so tests can override
//! only what they exercise.

use crate::assist::AssistAction;
use crate::chats::ChatThread;
use crate::error::{AutomatorError, Result};
use crate::formatters::Formatter;
use crate::host::contract::{
    CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope, EVENT_TASKS_CHANGED,
    PROTOCOL_VERSION,
};
use crate::llm::ChatMessage;
use crate::notes::Note;
use crate::snippets::Snippet;
use crate::tasks::Task;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Engine operations reachable from the shell.
#[async_trait]
pub trait BackgroundCommands: Send + Sync + 'static {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(Vec::new())
    }
    async fn save_task(&self, _task: Task) -> Result<()> {
        Ok(())
    }
    async fn delete_task(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(Vec::new())
    }
    async fn save_note(&self, _note: Note) -> Result<()> {
        Ok(())
    }
    async fn delete_note(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn list_snippets(&self) -> Result<Vec<Snippet>> {
        Ok(Vec::new())
    }
    async fn save_snippet(&self, _snippet: Snippet) -> Result<()> {
        Ok(())
    }
    async fn delete_snippet(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn list_formatters(&self) -> Result<Vec<Formatter>> {
        Ok(Vec::new())
    }
    async fn save_formatter(&self, _formatter: Formatter) -> Result<()> {
        Ok(())
    }
    async fn delete_formatter(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }
    /// Run a stored formatter's prompt over the given text.
    async fn run_formatter(&self, _formatter_id: &str, _text: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn list_chats(&self) -> Result<Vec<ChatThread>> {
        Ok(Vec::new())
    }
    async fn save_chat(&self, _chat: ChatThread) -> Result<()> {
        Ok(())
    }
    async fn delete_chat(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }
    /// Send a conversation to the completion endpoint. Streaming chunks
    /// go out as `chat.delta` events; the full reply is returned.
    async fn send_chat(&self, _messages: Vec<ChatMessage>) -> Result<String> {
        Ok(String::new())
    }

    /// Run an assist flow and return the completion to the caller.
    async fn assist(&self, _action: AssistAction, _text: &str) -> Result<String> {
        Ok(String::new())
    }
    /// Background variant: outcome lands in a notification, never an error.
    async fn menu_action(&self, _action: AssistAction, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn notification_clicked(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn list_alarms(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn query_config(&self, _key: Option<&str>) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
    async fn patch_config(&self, _key: &str, _value: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<Result<ResponseEnvelope>>,
}

/// Sends commands into the router and hands out event subscriptions.
#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostCommandClient {
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate().map_err(|e| {
            AutomatorError::Protocol(format!(
                "invalid command envelope {}: {e}",
                envelope.request_id
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| AutomatorError::Channel(format!("cannot queue command: {e}")))?;

        response_rx
            .await
            .map_err(|e| AutomatorError::Channel(format!("command response dropped: {e}")))?
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }
}

/// Owns the request queue and routes each command to the handler.
pub struct HostCommandServer<H: BackgroundCommands> {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
    handler: H,
}

#[must_use]
pub fn command_channel<H: BackgroundCommands>(
    request_capacity: usize,
    event_capacity: usize,
    handler: H,
) -> (HostCommandClient, HostCommandServer<H>) {
    let (event_tx, _event_rx) = broadcast::channel(event_capacity.max(1));
    command_channel_with_events(request_capacity, event_tx, handler)
}

/// Create a command channel over an existing event broadcast sender, so
/// events emitted by the engine itself (alarm notifications, chat deltas)
/// share the path the router's own events take.
#[must_use]
pub fn command_channel_with_events<H: BackgroundCommands>(
    request_capacity: usize,
    event_tx: broadcast::Sender<EventEnvelope>,
    handler: H,
) -> (HostCommandClient, HostCommandServer<H>) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));

    (
        HostCommandClient {
            request_tx,
            event_tx: event_tx.clone(),
        },
        HostCommandServer {
            request_rx,
            event_tx,
            handler,
        },
    )
}

impl<H: BackgroundCommands> HostCommandServer<H> {
    /// Process queued commands until every client handle is dropped.
    /// Commands run to completion one at a time, in arrival order.
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let response = self.route(&request.envelope).await;
            let _ = request.response_tx.send(response);
        }
    }

    /// Route one command envelope to the handler.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let request_id = envelope.request_id.clone();
        let payload = &envelope.payload;

        match envelope.command {
            CommandName::HostPing => Ok(ResponseEnvelope::ok(
                request_id,
                serde_json::json!({"pong": true}),
            )),
            CommandName::HostVersion => Ok(ResponseEnvelope::ok(
                request_id,
                serde_json::json!({
                    "protocol_version": PROTOCOL_VERSION,
                    "engine_version": env!("CARGO_PKG_VERSION"),
                }),
            )),
            // The wire layer shuts down on host.stop after this reply
            // has gone out.
            CommandName::HostStop => Ok(ResponseEnvelope::ok(
                request_id,
                serde_json::json!({"stopping": true}),
            )),

            CommandName::TasksList => {
                let tasks = self.handler.list_tasks().await?;
                list_response(request_id, "tasks", &tasks)
            }
            CommandName::TasksSave => {
                let task: Task = parse_record(payload, "task", "tasks.save")?;
                let task_id = task.id.clone();
                self.handler.save_task(task).await?;
                self.emit_tasks_changed(&envelope.request_id, &task_id);
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"saved": true, "id": task_id}),
                ))
            }
            CommandName::TasksDelete => {
                let id = parse_string_field(payload, "id", "tasks.delete")?;
                let deleted = self.handler.delete_task(&id).await?;
                self.emit_tasks_changed(&envelope.request_id, &id);
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"deleted": deleted, "id": id}),
                ))
            }

            CommandName::NotesList => {
                let notes = self.handler.list_notes().await?;
                list_response(request_id, "notes", &notes)
            }
            CommandName::NotesSave => {
                let note: Note = parse_record(payload, "note", "notes.save")?;
                let id = note.id.clone();
                self.handler.save_note(note).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"saved": true, "id": id}),
                ))
            }
            CommandName::NotesDelete => {
                let id = parse_string_field(payload, "id", "notes.delete")?;
                let deleted = self.handler.delete_note(&id).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"deleted": deleted, "id": id}),
                ))
            }

            CommandName::SnippetsList => {
                let snippets = self.handler.list_snippets().await?;
                list_response(request_id, "snippets", &snippets)
            }
            CommandName::SnippetsSave => {
                let snippet: Snippet = parse_record(payload, "snippet", "snippets.save")?;
                let id = snippet.id.clone();
                self.handler.save_snippet(snippet).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"saved": true, "id": id}),
                ))
            }
            CommandName::SnippetsDelete => {
                let id = parse_string_field(payload, "id", "snippets.delete")?;
                let deleted = self.handler.delete_snippet(&id).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"deleted": deleted, "id": id}),
                ))
            }

            CommandName::FormattersList => {
                let formatters = self.handler.list_formatters().await?;
                list_response(request_id, "formatters", &formatters)
            }
            CommandName::FormattersSave => {
                let formatter: Formatter = parse_record(payload, "formatter", "formatters.save")?;
                let id = formatter.id.clone();
                self.handler.save_formatter(formatter).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"saved": true, "id": id}),
                ))
            }
            CommandName::FormattersDelete => {
                let id = parse_string_field(payload, "id", "formatters.delete")?;
                let deleted = self.handler.delete_formatter(&id).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"deleted": deleted, "id": id}),
                ))
            }
            CommandName::FormatterRun => {
                let formatter_id = parse_string_field(payload, "formatterId", "formatter.run")?;
                let text = parse_text_field(payload, "formatter.run")?;
                let result = self.handler.run_formatter(&formatter_id, &text).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"result": result}),
                ))
            }

            CommandName::ChatsList => {
                let chats = self.handler.list_chats().await?;
                list_response(request_id, "chats", &chats)
            }
            CommandName::ChatsSave => {
                let chat: ChatThread = parse_record(payload, "chat", "chats.save")?;
                let id = chat.id.clone();
                self.handler.save_chat(chat).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"saved": true, "id": id}),
                ))
            }
            CommandName::ChatsDelete => {
                let id = parse_string_field(payload, "id", "chats.delete")?;
                let deleted = self.handler.delete_chat(&id).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"deleted": deleted, "id": id}),
                ))
            }
            CommandName::ChatSend => {
                let messages = parse_chat_messages(payload)?;
                let reply = self.handler.send_chat(messages).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"reply": reply}),
                ))
            }

            CommandName::AssistComplete => {
                self.handle_assist(envelope, AssistAction::Complete).await
            }
            CommandName::AssistTranslate => {
                self.handle_assist(envelope, AssistAction::Translate).await
            }
            CommandName::AssistGrammarFix => {
                self.handle_assist(envelope, AssistAction::GrammarFix).await
            }
            CommandName::MenuAction => {
                let raw_action = parse_string_field(payload, "action", "menu.action")?;
                let action = AssistAction::parse(&raw_action)?;
                let text = parse_text_field(payload, "menu.action")?;
                self.handler.menu_action(action, &text).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"accepted": true, "action": action.as_str()}),
                ))
            }

            CommandName::NotificationClicked => {
                let id = parse_string_field(payload, "id", "notification.clicked")?;
                self.handler.notification_clicked(&id).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"accepted": true, "id": id}),
                ))
            }

            CommandName::AlarmsList => {
                let alarms = self.handler.list_alarms().await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"alarms": alarms}),
                ))
            }

            CommandName::ConfigGet => {
                let key = payload.get("key").and_then(serde_json::Value::as_str);
                let config = self.handler.query_config(key).await?;
                Ok(ResponseEnvelope::ok(request_id, config))
            }
            CommandName::ConfigPatch => {
                let key = parse_string_field(payload, "key", "config.patch")?;
                let Some(value) = payload.get("value") else {
                    return Err(AutomatorError::Protocol(
                        "config.patch requires payload.value".to_owned(),
                    ));
                };
                self.handler.patch_config(&key, value).await?;
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"accepted": true, "key": key}),
                ))
            }
        }
    }

    async fn handle_assist(
        &self,
        envelope: &CommandEnvelope,
        action: AssistAction,
    ) -> Result<ResponseEnvelope> {
        let text = parse_text_field(&envelope.payload, envelope.command.as_str())?;
        let result = self.handler.assist(action, &text).await?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"result": result}),
        ))
    }

    fn emit_tasks_changed(&self, request_id: &str, task_id: &str) {
        self.emit_event(
            EVENT_TASKS_CHANGED,
            serde_json::json!({"request_id": request_id, "id": task_id}),
        );
    }

    fn emit_event(&self, event: &str, payload: serde_json::Value) {
        let envelope =
            EventEnvelope::new(uuid::Uuid::new_v4().to_string(), event.to_owned(), payload);
        let _ = self.event_tx.send(envelope);
    }
}

fn list_response<T: Serialize>(
    request_id: String,
    field: &str,
    items: &[T],
) -> Result<ResponseEnvelope> {
    let value = serde_json::to_value(items)
        .map_err(|e| AutomatorError::Protocol(format!("cannot serialize {field}: {e}")))?;
    Ok(ResponseEnvelope::ok(
        request_id,
        serde_json::json!({field: value}),
    ))
}

fn parse_record<T: DeserializeOwned>(
    payload: &serde_json::Value,
    field: &str,
    command: &str,
) -> Result<T> {
    let Some(raw) = payload.get(field) else {
        return Err(AutomatorError::Protocol(format!(
            "{command} requires payload.{field}"
        )));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| AutomatorError::Protocol(format!("{command}: invalid {field}: {e}")))
}

fn parse_string_field(payload: &serde_json::Value, field: &str, command: &str) -> Result<String> {
    let Some(raw) = payload.get(field).and_then(serde_json::Value::as_str) else {
        return Err(AutomatorError::Protocol(format!(
            "{command} requires payload.{field}"
        )));
    };
    let value = raw.trim();
    if value.is_empty() {
        return Err(AutomatorError::Protocol(format!(
            "{command} requires a non-empty payload.{field}"
        )));
    }
    Ok(value.to_owned())
}

/// Selected text for the assist flows. Must be present and non-blank,
/// but is passed through otherwise untouched.
fn parse_text_field(payload: &serde_json::Value, command: &str) -> Result<String> {
    let Some(text) = payload.get("text").and_then(serde_json::Value::as_str) else {
        return Err(AutomatorError::Protocol(format!(
            "{command} requires payload.text"
        )));
    };
    if text.trim().is_empty() {
        return Err(AutomatorError::Protocol(format!(
            "{command} requires a non-empty payload.text"
        )));
    }
    Ok(text.to_owned())
}

fn parse_chat_messages(payload: &serde_json::Value) -> Result<Vec<ChatMessage>> {
    let Some(raw) = payload.get("messages") else {
        return Err(AutomatorError::Protocol(
            "chat.send requires payload.messages".to_owned(),
        ));
    };
    let messages: Vec<ChatMessage> = serde_json::from_value(raw.clone())
        .map_err(|e| AutomatorError::Protocol(format!("chat.send: invalid messages: {e}")))?;
    if messages.is_empty() {
        return Err(AutomatorError::Protocol(
            "chat.send requires at least one message".to_owned(),
        ));
    }
    Ok(messages)
}
