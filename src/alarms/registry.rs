//! Process-wide named timer table.
//!
//! Each alarm is a spawned tokio task that sleeps (once) or ticks
//! (periodically) and pushes its own name onto the shared fired channel.
//! Creating an alarm under a name that is already registered replaces the
//! old timer, so at most one timer exists per name. Alarms live only as
//! long as the process; nothing here is persisted.

use crate::error::{AutomatorError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

struct AlarmEntry {
    /// Distinguishes this timer from a later one registered under the
    /// same name, so a consumed one-shot only removes itself.
    generation: u64,
    handle: JoinHandle<()>,
}

/// Registry of live alarms, keyed by name.
///
/// Cloning shares the underlying table. Fired alarm names arrive on the
/// receiver returned by [`AlarmRegistry::new`]; once that receiver is
/// dropped, timers shut themselves down on their next fire.
#[derive(Clone)]
pub struct AlarmRegistry {
    alarms: Arc<Mutex<HashMap<String, AlarmEntry>>>,
    fired_tx: mpsc::UnboundedSender<String>,
    next_generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for AlarmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.alarms.lock().map(|a| a.len()).unwrap_or(0);
        f.debug_struct("AlarmRegistry")
            .field("active", &count)
            .finish()
    }
}

impl AlarmRegistry {
    /// Create an empty registry and the channel its fires arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let registry = Self {
            alarms: Arc::new(Mutex::new(HashMap::new())),
            fired_tx,
            next_generation: Arc::new(AtomicU64::new(0)),
        };
        (registry, fired_rx)
    }

    fn lock_alarms(&self) -> Result<MutexGuard<'_, HashMap<String, AlarmEntry>>> {
        self.alarms
            .lock()
            .map_err(|_| AutomatorError::Channel("alarm registry lock poisoned".to_owned()))
    }

    fn register(&self, name: &str, generation: u64, handle: JoinHandle<()>) -> Result<()> {
        let mut alarms = self.lock_alarms()?;
        if let Some(old) = alarms.insert(name.to_owned(), AlarmEntry { generation, handle }) {
            old.handle.abort();
        }
        Ok(())
    }

    /// Create (or replace) a periodic alarm. The first fire happens one
    /// full period from now, then every period after that.
    pub fn create_periodic(&self, name: &str, period: Duration) -> Result<()> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let fired_tx = self.fired_tx.clone();
        let alarm_name = name.to_owned();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if fired_tx.send(alarm_name.clone()).is_err() {
                    return;
                }
            }
        });

        debug!(alarm = name, period_ms = period.as_millis() as u64, "periodic alarm armed");
        self.register(name, generation, handle)
    }

    /// Create (or replace) a one-shot alarm firing at an absolute instant.
    /// An instant in the past fires immediately. The entry removes itself
    /// from the table once consumed.
    pub fn create_once(&self, name: &str, fire_at: DateTime<Utc>) -> Result<()> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let fired_tx = self.fired_tx.clone();
        let alarms = Arc::clone(&self.alarms);
        let alarm_name = name.to_owned();

        let delay = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired_tx.send(alarm_name.clone());
            if let Ok(mut alarms) = alarms.lock()
                && alarms
                    .get(&alarm_name)
                    .is_some_and(|entry| entry.generation == generation)
            {
                alarms.remove(&alarm_name);
            }
        });

        debug!(alarm = name, %fire_at, "one-shot alarm armed");
        self.register(name, generation, handle)
    }

    /// Cancel the alarm with the given name. Returns whether one existed;
    /// cancelling an unknown name is not an error.
    pub fn clear(&self, name: &str) -> Result<bool> {
        let removed = self.lock_alarms()?.remove(name);
        match removed {
            Some(entry) => {
                entry.handle.abort();
                debug!(alarm = name, "alarm cleared");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Cancel every alarm.
    pub fn clear_all(&self) -> Result<()> {
        let mut alarms = self.lock_alarms()?;
        for (_, entry) in alarms.drain() {
            entry.handle.abort();
        }
        Ok(())
    }

    /// Whether an alarm with this name is currently registered.
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.lock_alarms()?.contains_key(name))
    }

    /// Names of all registered alarms, sorted.
    pub fn active(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock_alarms()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn periodic_alarm_fires_repeatedly() {
        let (registry, mut fired_rx) = AlarmRegistry::new();
        registry
            .create_periodic("tick", Duration::from_millis(20))
            .unwrap();

        for _ in 0..3 {
            let name = timeout(WAIT, fired_rx.recv()).await.expect("fire in time");
            assert_eq!(name.as_deref(), Some("tick"));
        }
    }

    #[tokio::test]
    async fn recreating_an_alarm_replaces_the_old_timer() {
        let (registry, mut fired_rx) = AlarmRegistry::new();
        registry
            .create_periodic("job", Duration::from_secs(3600))
            .unwrap();
        registry
            .create_periodic("job", Duration::from_millis(10))
            .unwrap();

        let name = timeout(WAIT, fired_rx.recv()).await.expect("fire in time");
        assert_eq!(name.as_deref(), Some("job"));
        assert_eq!(registry.active().unwrap(), ["job"]);
    }

    #[tokio::test]
    async fn one_shot_fires_once_and_unregisters() {
        let (registry, mut fired_rx) = AlarmRegistry::new();
        registry
            .create_once("deadline", Utc::now() + chrono::Duration::milliseconds(15))
            .unwrap();
        assert!(registry.contains("deadline").unwrap());

        let name = timeout(WAIT, fired_rx.recv()).await.expect("fire in time");
        assert_eq!(name.as_deref(), Some("deadline"));

        // No second fire.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired_rx.try_recv().is_err());
        assert!(!registry.contains("deadline").unwrap());
    }

    #[tokio::test]
    async fn one_shot_in_the_past_fires_immediately() {
        let (registry, mut fired_rx) = AlarmRegistry::new();
        registry
            .create_once("overdue", Utc::now() - chrono::Duration::hours(1))
            .unwrap();

        let name = timeout(WAIT, fired_rx.recv()).await.expect("fire in time");
        assert_eq!(name.as_deref(), Some("overdue"));
    }

    #[tokio::test]
    async fn cleared_alarm_never_fires() {
        let (registry, mut fired_rx) = AlarmRegistry::new();
        registry
            .create_periodic("gone", Duration::from_millis(30))
            .unwrap();
        assert!(registry.clear("gone").unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(fired_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn clearing_an_unknown_name_is_not_an_error() {
        let (registry, _fired_rx) = AlarmRegistry::new();
        assert!(!registry.clear("never-existed").unwrap());
        assert!(!registry.clear("never-existed").unwrap());
    }

    #[tokio::test]
    async fn clear_all_empties_the_table() {
        let (registry, _fired_rx) = AlarmRegistry::new();
        registry
            .create_periodic("a", Duration::from_secs(60))
            .unwrap();
        registry
            .create_once("b", Utc::now() + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(registry.active().unwrap(), ["a", "b"]);

        registry.clear_all().unwrap();
        assert!(registry.active().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replaced_one_shot_does_not_unregister_its_successor() {
        let (registry, mut fired_rx) = AlarmRegistry::new();
        registry
            .create_once("due", Utc::now() - chrono::Duration::seconds(1))
            .unwrap();
        // Replace before the first timer's cleanup can run.
        registry
            .create_once("due", Utc::now() + chrono::Duration::hours(1))
            .unwrap();

        // The stale fire may still arrive, but the replacement entry stays.
        let _ = timeout(Duration::from_millis(200), fired_rx.recv()).await;
        assert!(registry.contains("due").unwrap());
    }
}
