//! The engine behind the command channel.
//!
//! [`BackgroundService`] implements [`BackgroundCommands`] over the
//! storage-backed collections, the reminder scheduler and the completion
//! client. [`HostEventSink`] closes the loop on the outward side: it
//! satisfies the notification and clipboard seams by emitting protocol
//! events for the shell to act on.

use crate::alarms::ReminderScheduler;
use crate::assist::{AssistAction, Assistant};
use crate::chats::{ChatThread, ChatThreadStore};
use crate::config::AutomatorConfig;
use crate::error::{AutomatorError, Result};
use crate::formatters::{Formatter, FormatterStore};
use crate::host::channel::BackgroundCommands;
use crate::host::contract::{
    EventEnvelope, EVENT_CHAT_COMPLETED, EVENT_CHAT_DELTA, EVENT_CLIPBOARD_WRITE,
    EVENT_NOTIFICATION_SHOW,
};
use crate::llm::{ChatMessage, CompletionClient};
use crate::notes::{Note, NoteStore};
use crate::notify::{ClipboardSink, NotificationPayload, NotificationSink, Notifier};
use crate::snippets::{Snippet, SnippetStore};
use crate::storage::StorageArea;
use crate::tasks::{Task, TaskStore};
use crate::{collections::CollectionStore, config};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::info;

/// Emits shell-side effects as protocol events.
///
/// The engine cannot render OS notifications or touch the clipboard; the
/// shell does both on its side of the pipe when these events arrive.
#[derive(Clone)]
pub struct HostEventSink {
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostEventSink {
    #[must_use]
    pub fn new(event_tx: broadcast::Sender<EventEnvelope>) -> Self {
        Self { event_tx }
    }

    fn emit(&self, event: &str, payload: serde_json::Value) {
        let envelope =
            EventEnvelope::new(uuid::Uuid::new_v4().to_string(), event.to_owned(), payload);
        let _ = self.event_tx.send(envelope);
    }
}

#[async_trait]
impl NotificationSink for HostEventSink {
    async fn show(&self, id: &str, payload: &NotificationPayload) -> Result<()> {
        let mut body = serde_json::to_value(payload)
            .map_err(|e| AutomatorError::Notification(format!("cannot encode payload: {e}")))?;
        body["id"] = serde_json::Value::String(id.to_owned());
        self.emit(EVENT_NOTIFICATION_SHOW, body);
        Ok(())
    }
}

#[async_trait]
impl ClipboardSink for HostEventSink {
    async fn write_text(&self, text: &str) -> Result<()> {
        self.emit(EVENT_CLIPBOARD_WRITE, serde_json::json!({"text": text}));
        Ok(())
    }
}

/// The engine: stores, alarms, notifications and assist flows behind
/// the [`BackgroundCommands`] seam.
pub struct BackgroundService {
    tasks: TaskStore,
    notes: NoteStore,
    snippets: SnippetStore,
    formatters: FormatterStore,
    chats: ChatThreadStore,
    scheduler: ReminderScheduler,
    notifier: Notifier,
    client: CompletionClient,
    config: Mutex<AutomatorConfig>,
    config_path: PathBuf,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl std::fmt::Debug for BackgroundService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundService")
            .field("config_path", &self.config_path)
            .finish()
    }
}

impl BackgroundService {
    pub fn new(
        storage: Arc<dyn StorageArea>,
        scheduler: ReminderScheduler,
        notifier: Notifier,
        client: CompletionClient,
        config: AutomatorConfig,
        config_path: PathBuf,
        event_tx: broadcast::Sender<EventEnvelope>,
    ) -> Self {
        Self {
            tasks: TaskStore::new(storage.clone()),
            notes: CollectionStore::new(storage.clone()),
            snippets: CollectionStore::new(storage.clone()),
            formatters: CollectionStore::new(storage.clone()),
            chats: CollectionStore::new(storage),
            scheduler,
            notifier,
            client,
            config: Mutex::new(config),
            config_path,
            event_tx,
        }
    }

    /// Re-register alarms from the stored task list. Returns how many
    /// alarms were armed.
    pub async fn rearm_alarms(&self) -> Result<usize> {
        let tasks = self.tasks.list().await?;
        self.scheduler.rearm_all(&tasks)
    }

    fn lock_config(&self) -> Result<MutexGuard<'_, AutomatorConfig>> {
        self.config
            .lock()
            .map_err(|e| AutomatorError::Config(format!("config lock poisoned: {e}")))
    }

    /// Snapshot the live config into a ready-to-use assistant. Built per
    /// command so config patches apply to the next call.
    fn assistant(&self) -> Result<Assistant> {
        let guard = self.lock_config()?;
        Ok(Assistant::new(
            self.client.clone(),
            guard.completion.model.clone(),
            guard.completion.temperature,
            guard.assist.target_language.clone(),
        ))
    }

    fn emit_event(&self, event: &str, payload: serde_json::Value) {
        let envelope =
            EventEnvelope::new(uuid::Uuid::new_v4().to_string(), event.to_owned(), payload);
        let _ = self.event_tx.send(envelope);
    }
}

#[async_trait]
impl BackgroundCommands for BackgroundService {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.tasks.list().await
    }

    async fn save_task(&self, task: Task) -> Result<()> {
        // Validate before anything is persisted so a rejected save
        // leaves both the store and the alarm table untouched.
        if let Some(period) = task.reminder_every {
            ReminderScheduler::validate_period(period)?;
        }
        self.tasks.upsert(task.clone()).await?;
        self.scheduler.sync_task_alarms(&task)
    }

    async fn delete_task(&self, id: &str) -> Result<bool> {
        self.scheduler.clear_task_alarms(id)?;
        self.tasks.remove(id).await
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        self.notes.list().await
    }

    async fn save_note(&self, note: Note) -> Result<()> {
        self.notes.upsert(note).await
    }

    async fn delete_note(&self, id: &str) -> Result<bool> {
        self.notes.remove(id).await
    }

    async fn list_snippets(&self) -> Result<Vec<Snippet>> {
        self.snippets.list().await
    }

    async fn save_snippet(&self, snippet: Snippet) -> Result<()> {
        self.snippets.upsert(snippet).await
    }

    async fn delete_snippet(&self, id: &str) -> Result<bool> {
        self.snippets.remove(id).await
    }

    async fn list_formatters(&self) -> Result<Vec<Formatter>> {
        self.formatters.list().await
    }

    async fn save_formatter(&self, formatter: Formatter) -> Result<()> {
        self.formatters.upsert(formatter).await
    }

    async fn delete_formatter(&self, id: &str) -> Result<bool> {
        self.formatters.remove(id).await
    }

    async fn run_formatter(&self, formatter_id: &str, text: &str) -> Result<String> {
        let Some(formatter) = self.formatters.find(formatter_id).await? else {
            return Err(AutomatorError::Protocol(format!(
                "unknown formatter: {formatter_id}"
            )));
        };
        self.assistant()?.run_formatter(&formatter.prompt, text).await
    }

    async fn list_chats(&self) -> Result<Vec<ChatThread>> {
        self.chats.list().await
    }

    async fn save_chat(&self, chat: ChatThread) -> Result<()> {
        self.chats.upsert(chat).await
    }

    async fn delete_chat(&self, id: &str) -> Result<bool> {
        self.chats.remove(id).await
    }

    async fn send_chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let mut stream = self.assistant()?.chat_stream(messages).await?;
        let mut reply = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            self.emit_event(EVENT_CHAT_DELTA, serde_json::json!({"text": chunk}));
            reply.push_str(&chunk);
        }

        self.emit_event(EVENT_CHAT_COMPLETED, serde_json::json!({"text": reply}));
        Ok(reply)
    }

    async fn assist(&self, action: AssistAction, text: &str) -> Result<String> {
        self.assistant()?.run_action(action, text).await
    }

    async fn menu_action(&self, action: AssistAction, text: &str) -> Result<()> {
        let assistant = self.assistant()?;
        assistant
            .run_action_notifying(action, text, &self.notifier)
            .await;
        Ok(())
    }

    async fn notification_clicked(&self, id: &str) -> Result<()> {
        self.notifier.handle_clicked(id).await
    }

    async fn list_alarms(&self) -> Result<Vec<String>> {
        self.scheduler.active_alarms()
    }

    async fn query_config(&self, key: Option<&str>) -> Result<serde_json::Value> {
        let snapshot = {
            let guard = self.lock_config()?;
            serde_json::to_value(&*guard)
                .map_err(|e| AutomatorError::Config(format!("cannot encode config: {e}")))?
        };

        match key {
            None => Ok(snapshot),
            Some(key) => {
                let mut cursor = &snapshot;
                for segment in key.split('.') {
                    cursor = cursor.get(segment).ok_or_else(|| {
                        AutomatorError::Config(format!("unknown config key: {key}"))
                    })?;
                }
                Ok(serde_json::json!({key: cursor.clone()}))
            }
        }
    }

    async fn patch_config(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        info!(key, "config.patch requested");
        config::patch_value(&self.config_path, key, value)?;

        let reloaded = AutomatorConfig::from_file(&self.config_path)?;
        *self.lock_config()? = reloaded;

        // The HTTP client is built once at startup from these values.
        if key.starts_with("completion.base_url") || key.starts_with("completion.api_key") {
            info!(key, "patched value takes effect after the engine restarts");
        }
        Ok(())
    }
}
