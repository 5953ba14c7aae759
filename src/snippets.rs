//! Reusable text snippets, pasted into pages by the popup.

use crate::collections::{CollectionItem, CollectionStore};
use serde::{Deserialize, Serialize};

/// Storage key the snippet list is stored under.
pub const SNIPPETS_KEY: &str = "snippets";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl CollectionItem for Snippet {
    const KEY: &'static str = SNIPPETS_KEY;

    fn id(&self) -> &str {
        &self.id
    }
}

pub type SnippetStore = CollectionStore<Snippet>;
