//! HTTP client for the `/v1/chat/completions` endpoint.

use crate::error::{AutomatorError, Result};
use crate::llm::message::CompletionRequest;
use crate::llm::sse::{SseFrame, SseFrameParser};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;

/// Stream of incremental completion text chunks.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Client for an OpenAI-compatible chat-completions API.
///
/// One instance is shared across the whole engine; `reqwest::Client`
/// pools connections internally, so cloning is cheap.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                if self.api_key.is_some() {
                    &"<redacted>"
                } else {
                    &"<none>"
                },
            )
            .finish()
    }
}

impl CompletionClient {
    /// Create a client for `base_url` (scheme and host, no path).
    ///
    /// With `api_key` set, every request carries a `Bearer` authorization
    /// header; without it requests are sent unauthenticated, which suits
    /// local OpenAI-compatible servers.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn post_completions(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = self.endpoint();
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let response = request.send().await.map_err(|e| {
            AutomatorError::UpstreamCompletion(format!("request to {url} failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }
        Ok(response)
    }

    /// Request a complete (non-streaming) response and return the
    /// assistant message content.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = build_request_body(request, false);
        let response = self.post_completions(&body).await?;
        let value: serde_json::Value = response.json().await.map_err(|e| {
            AutomatorError::UpstreamCompletion(format!("invalid completion response: {e}"))
        })?;
        extract_message_text(&value).ok_or_else(|| {
            AutomatorError::UpstreamCompletion(
                "completion response contained no message content".to_owned(),
            )
        })
    }

    /// Request a streaming response; the returned stream yields assistant
    /// text deltas in order and ends after the `[DONE]` sentinel.
    pub async fn complete_stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        let body = build_request_body(request, true);
        let response = self.post_completions(&body).await?;

        let state = StreamState {
            byte_stream: Box::pin(response.bytes_stream()),
            parser: SseFrameParser::new(),
            pending: Vec::new(),
            finished: false,
        };

        Ok(Box::pin(futures_util::stream::unfold(
            state,
            |mut state| async move {
                loop {
                    if let Some(text) = state.pending.pop() {
                        return Some((Ok(text), state));
                    }
                    if state.finished {
                        return None;
                    }
                    match state.byte_stream.next().await {
                        Some(Ok(chunk)) => {
                            let frames = state.parser.push(&chunk);
                            queue_frames(&mut state, frames);
                        }
                        Some(Err(e)) => {
                            state.finished = true;
                            return Some((
                                Err(AutomatorError::UpstreamCompletion(format!(
                                    "stream read failed: {e}"
                                ))),
                                state,
                            ));
                        }
                        None => {
                            state.finished = true;
                            let tail: Vec<SseFrame> = state.parser.flush().into_iter().collect();
                            queue_frames(&mut state, tail);
                            // Back to the top to drain anything the tail added.
                        }
                    }
                }
            },
        )))
    }
}

struct StreamState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
    parser: SseFrameParser,
    /// Deltas waiting to be yielded, stored in reverse so `pop` preserves
    /// stream order.
    pending: Vec<String>,
    finished: bool,
}

fn queue_frames(state: &mut StreamState, frames: Vec<SseFrame>) {
    let mut texts = Vec::new();
    for frame in frames {
        if frame.is_done() {
            state.finished = true;
            break;
        }
        if let Some(text) = extract_delta_text(&frame.data)
            && !text.is_empty()
        {
            texts.push(text);
        }
    }
    for text in texts.into_iter().rev() {
        state.pending.push(text);
    }
}

/// Build the JSON request body for the completions endpoint.
fn build_request_body(request: &CompletionRequest, stream: bool) -> serde_json::Value {
    serde_json::json!({
        "model": request.model,
        "temperature": request.temperature,
        "messages": request.messages,
        "stream": stream,
    })
}

/// Map a non-success HTTP response to an error carrying the status text
/// and the most specific message the body offers.
fn map_http_error(status: reqwest::StatusCode, body: &str) -> AutomatorError {
    AutomatorError::UpstreamCompletion(format!("{status}: {}", extract_error_message(body)))
}

/// Pull `error.message` out of an API error body, falling back to the
/// raw body text.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
    {
        return message.to_owned();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "(empty response body)".to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn extract_message_text(value: &serde_json::Value) -> Option<String> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(ToOwned::to_owned)
}

fn extract_delta_text(data: &str) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::trace!(error = %e, "skipping unparseable stream frame");
            return None;
        }
    };
    value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(ToOwned::to_owned)
}
