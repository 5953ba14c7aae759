//! Notes collection.

use crate::collections::{CollectionItem, CollectionStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage key the note list is stored under.
pub const NOTES_KEY: &str = "notes";

/// A free-form user note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CollectionItem for Note {
    const KEY: &'static str = NOTES_KEY;

    fn id(&self) -> &str {
        &self.id
    }
}

pub type NoteStore = CollectionStore<Note>;
