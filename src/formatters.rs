//! User-defined formatters: named prompts applied to selected text.
//!
//! A formatter is a stored system prompt. Running one sends the prompt
//! plus the user's text through the completions client and returns the
//! rewritten text (see [`crate::assist`]).

use crate::collections::{CollectionItem, CollectionStore};
use serde::{Deserialize, Serialize};

/// Storage key the formatter list is stored under.
pub const FORMATTERS_KEY: &str = "formatters";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formatter {
    pub id: String,
    /// Display name shown in the popup and context menu.
    pub name: String,
    /// System prompt applied to the selected text.
    pub prompt: String,
}

impl CollectionItem for Formatter {
    const KEY: &'static str = FORMATTERS_KEY;

    fn id(&self) -> &str {
        &self.id
    }
}

pub type FormatterStore = CollectionStore<Formatter>;
