//! Durable key/value storage shared by the queue, record, settings, and
//! timer state.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_warn};
use linkqueue_core::{Queue, RecordSet, Settings};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::persist::{write_atomic, PersistError};

pub const QUEUE_KEY: &str = "persistentQueue";
pub const RECORDS_KEY: &str = "records";
pub const TOTAL_KEY: &str = "totalExtracted";
pub const SETTINGS_KEY: &str = "settings";
pub const ALARMS_KEY: &str = "alarms";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("state file is not a JSON object: {0}")]
    Malformed(String),
    #[error("stored value for `{key}` is invalid: {message}")]
    Corrupt { key: String, message: String },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("background write failed: {0}")]
    Background(String),
}

/// Whole-value get/set store. A `set` replaces every given key in one write.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        values.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

/// Single JSON object on disk. Writes go through a temp file and rename, so
/// a crash leaves either the previous or the next state.
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<Map<String, Value>>,
}

impl FileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cache = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Map::new(),
            Ok(content) => match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                other => return Err(StoreError::Malformed(other.to_string())),
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(err) => return Err(err.into()),
        };
        engine_debug!("Opened state file {:?} with {} keys", path, cache.len());
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    async fn flush(&self, next: &Map<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(next)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|err| StoreError::Background(err.to_string()))??;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.cache.lock().await.get(key).cloned())
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;
        let mut next = cache.clone();
        next.extend(entries);
        self.flush(&next).await?;
        *cache = next;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;
        let mut next = cache.clone();
        for key in keys {
            next.remove(*key);
        }
        self.flush(&next).await?;
        *cache = next;
        Ok(())
    }
}

/// Typed view over a `KeyValueStore`.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn load_queue(&self) -> Result<Option<Queue>, StoreError> {
        self.load(QUEUE_KEY).await
    }

    pub async fn save_queue(&self, queue: &Queue) -> Result<(), StoreError> {
        self.inner
            .set(vec![(QUEUE_KEY.to_string(), serde_json::to_value(queue)?)])
            .await
    }

    pub async fn remove_queue(&self) -> Result<(), StoreError> {
        self.inner.remove(&[QUEUE_KEY]).await
    }

    pub async fn load_records(&self) -> Result<RecordSet, StoreError> {
        Ok(self.load(RECORDS_KEY).await?.unwrap_or_default())
    }

    pub async fn load_total(&self) -> Result<u64, StoreError> {
        Ok(self.load(TOTAL_KEY).await?.unwrap_or(0))
    }

    /// Records and the running total change together in one write.
    pub async fn save_records_and_total(
        &self,
        records: &RecordSet,
        total: u64,
    ) -> Result<(), StoreError> {
        self.inner
            .set(vec![
                (RECORDS_KEY.to_string(), serde_json::to_value(records)?),
                (TOTAL_KEY.to_string(), Value::from(total)),
            ])
            .await
    }

    /// Unreadable settings fall back to defaults.
    pub async fn load_settings(&self) -> Settings {
        match self.load(SETTINGS_KEY).await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(err) => {
                engine_warn!("Using default settings: {}", err);
                Settings::default()
            }
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.inner
            .set(vec![(
                SETTINGS_KEY.to_string(),
                serde_json::to_value(settings)?,
            )])
            .await
    }

    pub async fn load_alarms(&self) -> Result<BTreeMap<String, DateTime<Utc>>, StoreError> {
        Ok(self.load(ALARMS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_alarms(
        &self,
        alarms: &BTreeMap<String, DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.inner
            .set(vec![(ALARMS_KEY.to_string(), serde_json::to_value(alarms)?)])
            .await
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(value) = self.inner.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| StoreError::Corrupt {
                key: key.to_string(),
                message: err.to_string(),
            })
    }
}
