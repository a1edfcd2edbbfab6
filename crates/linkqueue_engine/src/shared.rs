use std::sync::Arc;

use engine_logging::engine_info;
use linkqueue_core::{Queue, QueueError};
use tokio::sync::Mutex;

use crate::store::Storage;
use crate::EngineError;

/// The single authoritative queue. Every mutation is written through to
/// storage before the lock is released.
#[derive(Clone)]
pub struct SharedQueue {
    queue: Arc<Mutex<Queue>>,
    storage: Storage,
}

impl SharedQueue {
    pub async fn load(storage: Storage) -> Result<Self, EngineError> {
        let queue = storage.load_queue().await?.unwrap_or_default();
        if !queue.is_empty() {
            engine_info!(
                "Loaded queue with {} items (pointer {}, running {})",
                queue.len(),
                queue.current_index(),
                queue.is_running()
            );
        }
        Ok(Self {
            queue: Arc::new(Mutex::new(queue)),
            storage,
        })
    }

    pub async fn snapshot(&self) -> Queue {
        self.queue.lock().await.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Queue) -> R) -> R {
        f(&*self.queue.lock().await)
    }

    pub async fn mutate<R>(&self, f: impl FnOnce(&mut Queue) -> R) -> Result<R, EngineError> {
        let mut queue = self.queue.lock().await;
        let result = f(&mut *queue);
        self.storage.save_queue(&queue).await?;
        Ok(result)
    }

    /// Like `mutate`, but a rejected operation leaves storage untouched.
    pub async fn try_mutate<R>(
        &self,
        f: impl FnOnce(&mut Queue) -> Result<R, QueueError>,
    ) -> Result<R, EngineError> {
        let mut queue = self.queue.lock().await;
        let result = f(&mut *queue)?;
        self.storage.save_queue(&queue).await?;
        Ok(result)
    }

    /// Empties the queue and removes the stored copy.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let mut queue = self.queue.lock().await;
        queue.clear();
        self.storage.remove_queue().await?;
        Ok(())
    }
}
