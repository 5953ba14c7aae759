//! Typed collection stores layered over [`StorageArea`] keys.
//!
//! Each user-facing collection (notes, snippets, formatters, chat
//! threads, tasks) is a JSON array stored whole under a single key.
//! [`CollectionStore`] provides list/find/upsert/remove over such a key
//! for any item type that knows its key and its id field.

use crate::error::Result;
use crate::storage::{StorageArea, get_typed, set_typed};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// An item that lives in a stored collection.
pub trait CollectionItem: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Storage key the collection is stored under.
    const KEY: &'static str;

    /// Stable identifier of this item within the collection.
    fn id(&self) -> &str;
}

/// Typed list store over a single storage key.
///
/// Every mutation reads the whole list, modifies it in memory, and writes
/// it back. Insertion order is preserved; upserts replace in place.
pub struct CollectionStore<T: CollectionItem> {
    storage: Arc<dyn StorageArea>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: CollectionItem> Clone for CollectionStore<T> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            _marker: PhantomData,
        }
    }
}

impl<T: CollectionItem> std::fmt::Debug for CollectionStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("key", &T::KEY)
            .finish()
    }
}

impl<T: CollectionItem> CollectionStore<T> {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageArea>) -> Self {
        Self {
            storage,
            _marker: PhantomData,
        }
    }

    /// List the whole collection. A missing key reads as empty.
    pub async fn list(&self) -> Result<Vec<T>> {
        Ok(get_typed(self.storage.as_ref(), T::KEY)
            .await?
            .unwrap_or_default())
    }

    /// Replace the whole collection.
    pub async fn save_all(&self, items: &[T]) -> Result<()> {
        set_typed(self.storage.as_ref(), T::KEY, &items).await
    }

    /// Find one item by id.
    pub async fn find(&self, id: &str) -> Result<Option<T>> {
        Ok(self.list().await?.into_iter().find(|item| item.id() == id))
    }

    /// Insert `item`, or replace the existing item with the same id.
    pub async fn upsert(&self, item: T) -> Result<()> {
        let mut items = self.list().await?;
        match items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(slot) => *slot = item,
            None => items.push(item),
        }
        self.save_all(&items).await
    }

    /// Remove the item with `id`. Returns whether anything was removed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut items = self.list().await?;
        let before = items.len();
        items.retain(|item| item.id() != id);
        if items.len() == before {
            return Ok(false);
        }
        self.save_all(&items).await?;
        Ok(true)
    }
}
