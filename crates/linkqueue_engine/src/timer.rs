use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::store::Storage;
use crate::EngineError;

/// Named wall-clock alarms that survive a restart of the process.
#[async_trait]
pub trait WakeTimer: Send + Sync {
    /// Arm (or re-arm) `name` to fire at `at`.
    async fn schedule(&self, name: &str, at: DateTime<Utc>) -> Result<(), EngineError>;
    /// Disarm `name`; a no-op when it is not armed.
    async fn clear(&self, name: &str) -> Result<(), EngineError>;
    fn scheduled(&self, name: &str) -> Option<DateTime<Utc>>;
}

struct Armed {
    at: DateTime<Utc>,
    task: JoinHandle<()>,
}

/// Deadlines are written to storage and re-armed by [`DurableWakeTimer::restore`].
/// A fired alarm sends its name on the channel returned by `new`; overdue
/// deadlines fire immediately.
pub struct DurableWakeTimer {
    storage: Storage,
    armed: Mutex<HashMap<String, Armed>>,
    fired_tx: mpsc::UnboundedSender<String>,
}

impl DurableWakeTimer {
    pub fn new(storage: Storage) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let timer = Self {
            storage,
            armed: Mutex::new(HashMap::new()),
            fired_tx,
        };
        (timer, fired_rx)
    }

    /// Re-arms every persisted deadline. Returns how many were armed.
    pub async fn restore(&self) -> Result<usize, EngineError> {
        let alarms = self.storage.load_alarms().await?;
        for (name, at) in &alarms {
            engine_info!("Restoring alarm {} for {}", name, at);
            self.arm(name, *at);
        }
        Ok(alarms.len())
    }

    fn arm(&self, name: &str, at: DateTime<Utc>) {
        let wait = (at - Utc::now()).to_std().unwrap_or_default();
        let tx = self.fired_tx.clone();
        let fired = name.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            engine_debug!("Alarm {} fired", fired);
            let _ = tx.send(fired);
        });
        let mut armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = armed.insert(name.to_string(), Armed { at, task }) {
            previous.task.abort();
        }
    }

    fn disarm(&self, name: &str) {
        let mut armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = armed.remove(name) {
            previous.task.abort();
        }
    }
}

#[async_trait]
impl WakeTimer for DurableWakeTimer {
    async fn schedule(&self, name: &str, at: DateTime<Utc>) -> Result<(), EngineError> {
        let mut alarms = self.storage.load_alarms().await?;
        alarms.insert(name.to_string(), at);
        self.storage.save_alarms(&alarms).await?;
        self.arm(name, at);
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<(), EngineError> {
        self.disarm(name);
        let mut alarms = self.storage.load_alarms().await?;
        if alarms.remove(name).is_some() {
            self.storage.save_alarms(&alarms).await?;
        }
        Ok(())
    }

    fn scheduled(&self, name: &str) -> Option<DateTime<Utc>> {
        let armed = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        armed.get(name).map(|armed| armed.at)
    }
}

impl Drop for DurableWakeTimer {
    fn drop(&mut self) {
        let armed = self.armed.get_mut().unwrap_or_else(|e| e.into_inner());
        for (_, armed) in armed.drain() {
            armed.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn overdue_alarm_fires_after_restore() {
        let storage = Storage::in_memory();
        let mut alarms = std::collections::BTreeMap::new();
        alarms.insert("wake".to_string(), Utc::now() - Duration::seconds(10));
        storage.save_alarms(&alarms).await.unwrap();

        let (timer, mut fired) = DurableWakeTimer::new(storage);
        assert_eq!(timer.restore().await.unwrap(), 1);
        assert_eq!(fired.recv().await.as_deref(), Some("wake"));
    }

    #[tokio::test]
    async fn clear_disarms_and_forgets() {
        let storage = Storage::in_memory();
        let (timer, _fired) = DurableWakeTimer::new(storage.clone());
        let at = Utc::now() + Duration::minutes(5);

        timer.schedule("wake", at).await.unwrap();
        assert_eq!(timer.scheduled("wake"), Some(at));
        assert_eq!(storage.load_alarms().await.unwrap().get("wake"), Some(&at));

        timer.clear("wake").await.unwrap();
        assert_eq!(timer.scheduled("wake"), None);
        assert!(storage.load_alarms().await.unwrap().is_empty());
    }
}
