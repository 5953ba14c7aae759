//! Saved chat threads.
//!
//! A thread is the full message history of one popup conversation,
//! including the assistant replies streamed back by `chat.send`.

use crate::collections::{CollectionItem, CollectionStore};
use crate::llm::ChatMessage;
use serde::{Deserialize, Serialize};

/// Storage key the chat thread list is stored under.
pub const CHATS_KEY: &str = "chats";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl CollectionItem for ChatThread {
    const KEY: &'static str = CHATS_KEY;

    fn id(&self) -> &str {
        &self.id
    }
}

pub type ChatThreadStore = CollectionStore<ChatThread>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    #[tokio::test]
    async fn threads_round_trip_with_messages() {
        let store = ChatThreadStore::new(Arc::new(MemoryStorage::new()));
        store
            .upsert(ChatThread {
                id: "c1".to_owned(),
                title: "Planning".to_owned(),
                messages: vec![
                    ChatMessage::user("What should I do first?"),
                    ChatMessage::assistant("Start with the report."),
                ],
            })
            .await
            .unwrap();

        let thread = store.find("c1").await.unwrap().unwrap();
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.messages[1].content, "Start with the report.");
    }
}
