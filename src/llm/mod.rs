//! Client for the OpenAI-compatible chat-completions API.

pub mod client;
pub mod message;
pub mod sse;

pub use client::{CompletionClient, CompletionStream};
pub use message::{ChatMessage, ChatRole, CompletionRequest};
