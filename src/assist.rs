//! Writing-assistant flows: completion, translation, grammar fixing,
//! user-defined formatters and the popup chat.
//!
//! Each flow wraps the selected text in a flow-specific system prompt and
//! asks the completion endpoint for a single answer. The foreground
//! variants return the completion to the requesting surface; the
//! background variants (context menu, keyboard shortcut) turn the outcome
//! into a notification and never propagate an error.

use crate::error::{AutomatorError, Result};
use crate::llm::{ChatMessage, CompletionClient, CompletionRequest, CompletionStream};
use crate::notify::Notifier;
use tracing::error;

const COMPLETE_PROMPT: &str = "Continue the text the user provides. Reply with the \
continuation only, without repeating the user's text and without commentary.";

const TRANSLATE_PROMPT_PREFIX: &str = "Translate the text the user provides into";

const GRAMMAR_PROMPT: &str = "Fix the spelling and grammar of the text the user \
provides. Keep the wording and meaning unchanged wherever possible and reply with \
the corrected text only.";

/// The assist flows reachable from the context menu and shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistAction {
    Complete,
    Translate,
    GrammarFix,
}

impl AssistAction {
    /// Parse the wire name used by `menu.action`.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "complete" => Ok(Self::Complete),
            "translate" => Ok(Self::Translate),
            "grammar_fix" => Ok(Self::GrammarFix),
            other => Err(AutomatorError::Protocol(format!(
                "unknown assist action: {other}"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Translate => "translate",
            Self::GrammarFix => "grammar_fix",
        }
    }

    /// Human-readable name, used as the notification title in the
    /// background flows.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Complete => "Completion",
            Self::Translate => "Translation",
            Self::GrammarFix => "Grammar fix",
        }
    }
}

/// One-call bundle of everything a flow needs: the client plus the
/// current model, temperature and target language. Built fresh from
/// config for each command, so config patches take effect immediately.
#[derive(Debug, Clone)]
pub struct Assistant {
    client: CompletionClient,
    model: String,
    temperature: f64,
    target_language: String,
}

impl Assistant {
    #[must_use]
    pub fn new(
        client: CompletionClient,
        model: impl Into<String>,
        temperature: f64,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            target_language: target_language.into(),
        }
    }

    fn request(&self, system_prompt: &str, text: &str) -> CompletionRequest {
        CompletionRequest::new(
            &self.model,
            self.temperature,
            vec![ChatMessage::system(system_prompt), ChatMessage::user(text)],
        )
    }

    /// Continue the given text.
    pub async fn complete_text(&self, text: &str) -> Result<String> {
        self.client.complete(&self.request(COMPLETE_PROMPT, text)).await
    }

    /// Translate the given text into the configured target language.
    pub async fn translate(&self, text: &str) -> Result<String> {
        let prompt = format!(
            "{TRANSLATE_PROMPT_PREFIX} {}. Reply with the translation only.",
            self.target_language
        );
        self.client.complete(&self.request(&prompt, text)).await
    }

    /// Fix spelling and grammar in the given text.
    pub async fn fix_grammar(&self, text: &str) -> Result<String> {
        self.client.complete(&self.request(GRAMMAR_PROMPT, text)).await
    }

    /// Run a user-defined formatter prompt over the given text.
    pub async fn run_formatter(&self, prompt: &str, text: &str) -> Result<String> {
        self.client.complete(&self.request(prompt, text)).await
    }

    /// Run the named flow and return the completion.
    pub async fn run_action(&self, action: AssistAction, text: &str) -> Result<String> {
        match action {
            AssistAction::Complete => self.complete_text(text).await,
            AssistAction::Translate => self.translate(text).await,
            AssistAction::GrammarFix => self.fix_grammar(text).await,
        }
    }

    /// Background variant of [`run_action`]: the result lands in a
    /// copyable notification, a failure in a plain one. Errors stop here.
    ///
    /// [`run_action`]: Assistant::run_action
    pub async fn run_action_notifying(
        &self,
        action: AssistAction,
        text: &str,
        notifier: &Notifier,
    ) {
        let shown = match self.run_action(action, text).await {
            Ok(completion) => {
                notifier
                    .notify_copyable(action.display_name(), &completion)
                    .await
            }
            Err(e) => notifier.notify(action.display_name(), &e.to_string()).await,
        };
        if let Err(e) = shown {
            error!(action = action.as_str(), "cannot show assist notification: {e}");
        }
    }

    /// Send a chat conversation and stream the reply chunks.
    pub async fn chat_stream(&self, messages: Vec<ChatMessage>) -> Result<CompletionStream> {
        let request = CompletionRequest::new(&self.model, self.temperature, messages);
        self.client.complete_stream(&request).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::notify::{ClipboardSink, NotificationPayload, NotificationSink, PendingCopies};
    use crate::notify::CLICK_TO_COPY_HINT;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct CaptureSink {
        shown: Mutex<Vec<NotificationPayload>>,
    }

    #[async_trait]
    impl NotificationSink for CaptureSink {
        async fn show(&self, _id: &str, payload: &NotificationPayload) -> Result<()> {
            self.shown.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    struct NoClipboard;

    #[async_trait]
    impl ClipboardSink for NoClipboard {
        async fn write_text(&self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn completion_response(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    fn assistant(server: &MockServer) -> Assistant {
        Assistant::new(
            CompletionClient::new(server.uri(), None),
            "gpt-4o-mini",
            0.7,
            "French",
        )
    }

    fn capture_notifier() -> (Notifier, Arc<CaptureSink>) {
        let sink = Arc::new(CaptureSink::default());
        let notifier = Notifier::new(
            sink.clone(),
            Arc::new(NoClipboard),
            Arc::new(PendingCopies::new()),
            "icons/icon-128.png",
        );
        (notifier, sink)
    }

    #[test]
    fn action_wire_names_round_trip() {
        for action in [
            AssistAction::Complete,
            AssistAction::Translate,
            AssistAction::GrammarFix,
        ] {
            assert_eq!(AssistAction::parse(action.as_str()).unwrap(), action);
        }
        assert!(AssistAction::parse("summarize").is_err());
    }

    #[tokio::test]
    async fn translate_asks_for_the_configured_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system",
                     "content": "Translate the text the user provides into French. Reply with the translation only."},
                    {"role": "user", "content": "Hello world"}
                ]
            })))
            .respond_with(completion_response("Bonjour le monde"))
            .expect(1)
            .mount(&server)
            .await;

        let result = assistant(&server).translate("Hello world").await.unwrap();
        assert_eq!(result, "Bonjour le monde");
    }

    #[tokio::test]
    async fn formatter_prompt_becomes_the_system_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system", "content": "Rewrite as a haiku."},
                    {"role": "user", "content": "the build is green"}
                ]
            })))
            .respond_with(completion_response("green at last, it builds"))
            .mount(&server)
            .await;

        let result = assistant(&server)
            .run_formatter("Rewrite as a haiku.", "the build is green")
            .await
            .unwrap();
        assert_eq!(result, "green at last, it builds");
    }

    #[tokio::test]
    async fn background_success_shows_a_copyable_notification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion_response("and so it went."))
            .mount(&server)
            .await;
        let (notifier, sink) = capture_notifier();

        assistant(&server)
            .run_action_notifying(AssistAction::Complete, "It began,", &notifier)
            .await;

        let shown = sink.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Completion");
        assert_eq!(shown[0].message, format!("and so it went.{CLICK_TO_COPY_HINT}"));
    }

    #[tokio::test]
    async fn background_failure_shows_the_error_as_plain_notification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;
        let (notifier, sink) = capture_notifier();

        assistant(&server)
            .run_action_notifying(AssistAction::Translate, "Hello", &notifier)
            .await;

        let shown = sink.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Translation");
        assert!(
            shown[0].message.contains("upstream exploded"),
            "message was: {}",
            shown[0].message
        );
        // A failure message is not copyable.
        assert!(!shown[0].message.contains("(Click to copy)"));
    }
}
