//! Persistent task collection.

use crate::collections::{CollectionItem, CollectionStore};
use crate::error::Result;
use crate::storage::StorageArea;
use crate::tasks::types::Task;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Storage key the task list is stored under.
pub const TASKS_KEY: &str = "tasks";

impl CollectionItem for Task {
    const KEY: &'static str = TASKS_KEY;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Task collection with the reminder-timestamp write used by the alarm
/// handler.
#[derive(Debug, Clone)]
pub struct TaskStore {
    inner: CollectionStore<Task>,
}

impl TaskStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageArea>) -> Self {
        Self {
            inner: CollectionStore::new(storage),
        }
    }

    pub async fn list(&self) -> Result<Vec<Task>> {
        self.inner.list().await
    }

    pub async fn save_all(&self, tasks: &[Task]) -> Result<()> {
        self.inner.save_all(tasks).await
    }

    pub async fn find(&self, id: &str) -> Result<Option<Task>> {
        self.inner.find(id).await
    }

    pub async fn upsert(&self, task: Task) -> Result<()> {
        self.inner.upsert(task).await
    }

    pub async fn remove(&self, id: &str) -> Result<bool> {
        self.inner.remove(id).await
    }

    /// Record that a periodic reminder fired for task `id`.
    ///
    /// Reads the whole list, stamps the one task, writes the whole list
    /// back. The stamp never moves backwards. Returns `false` when the
    /// task has disappeared in the meantime.
    pub async fn mark_reminded(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut tasks = self.inner.list().await?;
        let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
            return Ok(false);
        };
        if task.last_reminder_at.is_none_or(|prev| prev <= at) {
            task.last_reminder_at = Some(at);
        }
        self.inner.save_all(&tasks).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;

    fn store_with_storage() -> (TaskStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (TaskStore::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn tasks_are_stored_under_the_tasks_key() {
        let (store, storage) = store_with_storage();
        store.upsert(Task::new("t1", "Write report")).await.unwrap();

        let raw = storage.get(TASKS_KEY).await.unwrap().unwrap();
        assert_eq!(raw[0]["id"], "t1");
        assert_eq!(raw[0]["title"], "Write report");
    }

    #[tokio::test]
    async fn upsert_replaces_by_id_and_preserves_order() {
        let (store, _) = store_with_storage();
        store.upsert(Task::new("t1", "Write report")).await.unwrap();
        store.upsert(Task::new("t2", "Ship release")).await.unwrap();

        let mut revised = Task::new("t1", "Write the report");
        revised.reminder_every = Some(30);
        store.upsert(revised).await.unwrap();

        let tasks = store.list().await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Write the report");
        assert_eq!(tasks[0].reminder_every, Some(30));
        assert_eq!(tasks[1].id, "t2");
    }

    #[tokio::test]
    async fn mark_reminded_stamps_only_the_target_task() {
        let (store, _) = store_with_storage();
        store.upsert(Task::new("t1", "Write report")).await.unwrap();
        store.upsert(Task::new("t2", "Ship release")).await.unwrap();

        let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        assert!(store.mark_reminded("t1", at).await.unwrap());

        let tasks = store.list().await.unwrap();
        assert_eq!(tasks[0].last_reminder_at, Some(at));
        assert_eq!(tasks[1].last_reminder_at, None);
    }

    #[tokio::test]
    async fn mark_reminded_never_moves_backwards() {
        let (store, _) = store_with_storage();
        store.upsert(Task::new("t1", "Write report")).await.unwrap();

        let later = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        store.mark_reminded("t1", later).await.unwrap();
        store.mark_reminded("t1", earlier).await.unwrap();

        let task = store.find("t1").await.unwrap().unwrap();
        assert_eq!(task.last_reminder_at, Some(later));
    }

    #[tokio::test]
    async fn mark_reminded_missing_task_returns_false() {
        let (store, _) = store_with_storage();
        assert!(!store.mark_reminded("ghost", Utc::now()).await.unwrap());
    }
}
