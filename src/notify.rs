//! Desktop notifications and the click-to-copy flow.
//!
//! The engine never touches the OS notification center or the clipboard
//! directly; it emits requests through the [`NotificationSink`] and
//! [`ClipboardSink`] seams, and the browser shell carries them out. Tests
//! substitute capture sinks.
//!
//! The click-to-copy flow: a copyable notification shows its message with
//! a trailing hint and records the verbatim payload in [`PendingCopies`]
//! under the notification id. When the shell reports a click on that id,
//! the payload is written to the clipboard, a confirmation notification
//! is shown, and the entry is consumed so repeated clicks do nothing.

use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Hint appended to the displayed text of a copyable notification.
/// The stored copy payload never includes it.
pub const CLICK_TO_COPY_HINT: &str = "\n\n(Click to copy)";

/// Notification kind understood by the shell.
pub const NOTIFICATION_KIND: &str = "basic";

/// Title of the copy confirmation notification.
pub const COPY_CONFIRMATION_TITLE: &str = "Automator";

/// Body of the copy confirmation notification.
pub const COPY_CONFIRMATION_MESSAGE: &str = "Copied to clipboard";

const ID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 24;

/// Generate a random notification id: lowercase base-36, long enough
/// that ids never collide within a session.
#[must_use]
pub fn new_notification_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| {
            let index = rng.gen_range(0..ID_CHARSET.len());
            ID_CHARSET[index] as char
        })
        .collect()
}

/// Payload handed to the shell for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    #[serde(rename = "iconUrl")]
    pub icon_url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Where notifications are displayed.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, id: &str, payload: &NotificationPayload) -> Result<()>;
}

/// Where clipboard writes land.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<()>;
}

/// Copy payloads waiting for a notification click, keyed by
/// notification id.
///
/// Held in memory only: entries do not survive an engine restart, which
/// matches how long the notifications themselves live. [`take`] consumes
/// the entry, so a second click on the same notification is a no-op.
///
/// [`take`]: PendingCopies::take
#[derive(Debug, Default)]
pub struct PendingCopies {
    entries: Mutex<HashMap<String, String>>,
}

impl PendingCopies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, payload: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id.into(), payload.into());
        }
    }

    /// Remove and return the payload for `id`, if present.
    pub fn take(&self, id: &str) -> Option<String> {
        self.entries.lock().ok()?.remove(id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().map(|e| e.is_empty()).unwrap_or(true)
    }
}

/// Front door for every notification the engine shows.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    clipboard: Arc<dyn ClipboardSink>,
    pending: Arc<PendingCopies>,
    icon_url: String,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("icon_url", &self.icon_url)
            .finish()
    }
}

impl Notifier {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        clipboard: Arc<dyn ClipboardSink>,
        pending: Arc<PendingCopies>,
        icon_url: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            clipboard,
            pending,
            icon_url: icon_url.into(),
        }
    }

    fn payload(&self, title: &str, message: &str) -> NotificationPayload {
        NotificationPayload {
            title: title.to_owned(),
            message: message.to_owned(),
            icon_url: self.icon_url.clone(),
            kind: NOTIFICATION_KIND.to_owned(),
        }
    }

    /// Show a plain notification. Returns the generated notification id.
    pub async fn notify(&self, title: &str, message: &str) -> Result<String> {
        let id = new_notification_id();
        self.sink.show(&id, &self.payload(title, message)).await?;
        Ok(id)
    }

    /// Show a notification whose message can be copied by clicking it.
    ///
    /// The displayed text carries the copy hint; the recorded payload is
    /// the verbatim `message`.
    pub async fn notify_copyable(&self, title: &str, message: &str) -> Result<String> {
        let id = new_notification_id();
        self.pending.insert(&id, message);

        let shown = format!("{message}{CLICK_TO_COPY_HINT}");
        if let Err(e) = self.sink.show(&id, &self.payload(title, &shown)).await {
            // Nothing on screen to click; drop the stale entry.
            self.pending.take(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Handle a click reported by the shell.
    ///
    /// Clicks on notifications without a pending copy payload (plain
    /// notifications, already-consumed ids, ids from before a restart)
    /// are ignored.
    pub async fn handle_clicked(&self, id: &str) -> Result<()> {
        let Some(payload) = self.pending.take(id) else {
            tracing::debug!(notification_id = id, "click without pending copy; ignoring");
            return Ok(());
        };
        self.clipboard.write_text(&payload).await?;
        self.notify(COPY_CONFIRMATION_TITLE, COPY_CONFIRMATION_MESSAGE)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[derive(Default)]
    struct CaptureSink {
        shown: Mutex<Vec<(String, NotificationPayload)>>,
    }

    #[async_trait]
    impl NotificationSink for CaptureSink {
        async fn show(&self, id: &str, payload: &NotificationPayload) -> Result<()> {
            self.shown
                .lock()
                .unwrap()
                .push((id.to_owned(), payload.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CaptureClipboard {
        written: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClipboardSink for CaptureClipboard {
        async fn write_text(&self, text: &str) -> Result<()> {
            self.written.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    fn notifier() -> (Notifier, Arc<CaptureSink>, Arc<CaptureClipboard>) {
        let sink = Arc::new(CaptureSink::default());
        let clipboard = Arc::new(CaptureClipboard::default());
        let notifier = Notifier::new(
            sink.clone(),
            clipboard.clone(),
            Arc::new(PendingCopies::new()),
            "icons/icon-128.png",
        );
        (notifier, sink, clipboard)
    }

    #[test]
    fn notification_ids_are_long_base36() {
        let id = new_notification_id();
        assert!(id.len() >= 20, "id too short: {id}");
        assert!(id.bytes().all(|b| ID_CHARSET.contains(&b)), "bad id: {id}");
        assert_ne!(new_notification_id(), new_notification_id());
    }

    #[test]
    fn payload_serializes_with_shell_field_names() {
        let payload = NotificationPayload {
            title: "Write report".to_owned(),
            message: "Keep going! 🚀".to_owned(),
            icon_url: "icons/icon-128.png".to_owned(),
            kind: NOTIFICATION_KIND.to_owned(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["iconUrl"], "icons/icon-128.png");
        assert_eq!(json["type"], "basic");
    }

    #[tokio::test]
    async fn notify_shows_a_basic_notification() {
        let (notifier, sink, _) = notifier();
        let id = notifier.notify("Write report", "Keep going! 🚀").await.unwrap();

        let shown = sink.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, id);
        assert_eq!(shown[0].1.title, "Write report");
        assert_eq!(shown[0].1.message, "Keep going! 🚀");
        assert_eq!(shown[0].1.kind, "basic");
    }

    #[tokio::test]
    async fn copyable_notification_appends_hint_but_stores_verbatim() {
        let (notifier, sink, clipboard) = notifier();
        let id = notifier
            .notify_copyable("Translation", "Bonjour le monde")
            .await
            .unwrap();

        {
            let shown = sink.shown.lock().unwrap();
            assert_eq!(
                shown[0].1.message,
                format!("Bonjour le monde{CLICK_TO_COPY_HINT}")
            );
        }

        notifier.handle_clicked(&id).await.unwrap();

        // Verbatim payload, no hint.
        assert_eq!(
            clipboard.written.lock().unwrap().as_slice(),
            ["Bonjour le monde"]
        );
        // Confirmation notification follows the copy.
        let shown = sink.shown.lock().unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[1].1.title, COPY_CONFIRMATION_TITLE);
        assert_eq!(shown[1].1.message, COPY_CONFIRMATION_MESSAGE);
    }

    #[tokio::test]
    async fn second_click_is_a_no_op() {
        let (notifier, sink, clipboard) = notifier();
        let id = notifier.notify_copyable("Completion", "text").await.unwrap();

        notifier.handle_clicked(&id).await.unwrap();
        notifier.handle_clicked(&id).await.unwrap();

        assert_eq!(clipboard.written.lock().unwrap().len(), 1);
        // Original + one confirmation, nothing for the second click.
        assert_eq!(sink.shown.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn click_on_plain_notification_is_ignored() {
        let (notifier, _, clipboard) = notifier();
        let id = notifier.notify("Title", "plain").await.unwrap();

        notifier.handle_clicked(&id).await.unwrap();
        notifier.handle_clicked("unknown-id").await.unwrap();

        assert!(clipboard.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_show_discards_the_pending_entry() {
        struct FailingSink;

        #[async_trait]
        impl NotificationSink for FailingSink {
            async fn show(&self, _id: &str, _payload: &NotificationPayload) -> Result<()> {
                Err(crate::error::AutomatorError::Notification(
                    "shell unavailable".to_owned(),
                ))
            }
        }

        let pending = Arc::new(PendingCopies::new());
        let notifier = Notifier::new(
            Arc::new(FailingSink),
            Arc::new(CaptureClipboard::default()),
            pending.clone(),
            "icons/icon-128.png",
        );

        assert!(notifier.notify_copyable("Completion", "text").await.is_err());
        assert!(pending.is_empty());
    }
}
