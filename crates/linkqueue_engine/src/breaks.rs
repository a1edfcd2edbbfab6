use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info, engine_warn};
use linkqueue_core::QueueError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::duration_ms;
use crate::shared::SharedQueue;
use crate::timer::WakeTimer;
use crate::EngineError;

/// Name of the alarm that ends a break.
pub const BREAK_ALARM: &str = "queue_break_timer";

/// A fired alarm this far before the stored end time is stale.
const FIRE_TOLERANCE_MS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakSettings {
    #[serde(with = "duration_ms")]
    pub min: Duration,
    #[serde(with = "duration_ms")]
    pub max: Duration,
    /// How often a waiting run re-checks the break end time.
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
}

impl Default for BreakSettings {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(4 * 60),
            max: Duration::from_secs(7 * 60),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Owns the break end time stored on the queue and the alarm that clears it.
pub struct BreakScheduler {
    queue: SharedQueue,
    timer: Arc<dyn WakeTimer>,
}

impl BreakScheduler {
    pub fn new(queue: SharedQueue, timer: Arc<dyn WakeTimer>) -> Self {
        Self { queue, timer }
    }

    /// Starts a break of uniformly random length within `[min, max]`, but
    /// only while the queue is running. The check and the stored end share
    /// one queue mutation, so a stop that lands first leaves no break behind.
    pub async fn start_break(
        &self,
        min: Duration,
        max: Duration,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        let length = random_between(min, max);
        let end = Utc::now()
            + chrono::Duration::from_std(length).unwrap_or_else(|_| chrono::Duration::zero());
        let armed = self
            .queue
            .mutate(|q| {
                if q.is_running() {
                    q.set_break_end(Some(end));
                }
                q.is_running()
            })
            .await?;
        if !armed {
            engine_debug!("Queue no longer running; no break taken");
            return Ok(None);
        }
        engine_info!("Taking a break for {:?} until {}", length, end);
        self.timer.schedule(BREAK_ALARM, end).await?;
        Ok(Some(end))
    }

    /// Replaces the current break end. Times not in the future are rejected.
    pub async fn set_break_end_time(&self, at: DateTime<Utc>) -> Result<(), EngineError> {
        if at <= Utc::now() {
            return Err(QueueError::InvalidBreakTime.into());
        }
        engine_info!("Break end moved to {}", at);
        self.arm(at).await
    }

    pub async fn skip(&self) -> Result<(), EngineError> {
        self.timer.clear(BREAK_ALARM).await?;
        self.queue.mutate(|q| q.set_break_end(None)).await?;
        engine_debug!("Break cleared");
        Ok(())
    }

    pub async fn is_on_break(&self) -> bool {
        let now = Utc::now();
        self.queue.read(|q| q.is_on_break(now)).await
    }

    pub fn scheduled_end(&self) -> Option<DateTime<Utc>> {
        self.timer.scheduled(BREAK_ALARM)
    }

    /// Handles an alarm delivered by the wake timer.
    pub async fn handle_fire(&self, name: &str) -> Result<(), EngineError> {
        if name != BREAK_ALARM {
            return Ok(());
        }
        let cutoff = Utc::now() + chrono::Duration::milliseconds(FIRE_TOLERANCE_MS);
        let end = self.queue.read(|q| q.break_end_time()).await;
        if end.is_some_and(|end| end > cutoff) {
            engine_debug!("Ignoring stale break alarm; break now ends {:?}", end);
            return Ok(());
        }
        engine_info!("Break over");
        self.skip().await
    }

    /// Feeds fired alarms into `handle_fire` until the channel closes.
    pub fn listen(self: Arc<Self>, mut fired: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(name) = fired.recv().await {
                if let Err(err) = self.handle_fire(&name).await {
                    engine_warn!("Failed to handle alarm {}: {}", name, err);
                }
            }
        })
    }

    async fn arm(&self, end: DateTime<Utc>) -> Result<(), EngineError> {
        self.queue.mutate(|q| q.set_break_end(Some(end))).await?;
        self.timer.schedule(BREAK_ALARM, end).await
    }
}

/// Uniform random duration in `[min, max]`; `max` below `min` yields `min`.
pub(crate) fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let ms = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Storage;
    use crate::timer::DurableWakeTimer;
    use linkqueue_core::QueueItem;

    async fn scheduler() -> (BreakScheduler, SharedQueue) {
        let storage = Storage::in_memory();
        let queue = SharedQueue::load(storage.clone()).await.unwrap();
        let (timer, _fired) = DurableWakeTimer::new(storage);
        (BreakScheduler::new(queue.clone(), Arc::new(timer)), queue)
    }

    #[tokio::test]
    async fn halted_queue_gets_no_break() {
        let (breaks, queue) = scheduler().await;
        let items = vec![QueueItem::new("https://www.linkedin.com/search/a", false, None)];
        queue.try_mutate(|q| q.begin(Some(items))).await.unwrap();
        queue.mutate(|q| q.halt()).await.unwrap();

        let end = breaks
            .start_break(Duration::from_secs(60), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(end, None);
        assert_eq!(queue.read(|q| q.break_end_time()).await, None);
        assert_eq!(breaks.scheduled_end(), None);
    }

    #[tokio::test]
    async fn running_queue_gets_a_break_and_an_alarm() {
        let (breaks, queue) = scheduler().await;
        let items = vec![QueueItem::new("https://www.linkedin.com/search/a", false, None)];
        queue.try_mutate(|q| q.begin(Some(items))).await.unwrap();

        let end = breaks
            .start_break(Duration::from_secs(60), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(end.is_some());
        assert_eq!(queue.read(|q| q.break_end_time()).await, end);
        assert_eq!(breaks.scheduled_end(), end);
        assert!(breaks.is_on_break().await);
    }

    #[test]
    fn random_between_stays_in_range() {
        let min = Duration::from_millis(4);
        let max = Duration::from_millis(7);
        for _ in 0..50 {
            let picked = random_between(min, max);
            assert!(picked >= min && picked <= max);
        }
        assert_eq!(random_between(max, min), max);
    }
}
