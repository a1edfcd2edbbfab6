use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use linkqueue_core::{ItemOutcome, QueueItem, QueueStatus, RunPhase};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::breaks::{BreakScheduler, BreakSettings};
use crate::keep_awake::KeepAwake;
use crate::page_runner::{PacingSettings, PageRunner};
use crate::port::ExtractionPort;
use crate::records::RecordSaver;
use crate::shared::SharedQueue;
use crate::EngineError;

/// Everything the queue loop needs, shared with the spawned task.
pub struct OrchestratorParts {
    pub queue: SharedQueue,
    pub port: Arc<dyn ExtractionPort>,
    pub saver: Arc<RecordSaver>,
    pub breaks: Arc<BreakScheduler>,
    pub keep_awake: Arc<dyn KeepAwake>,
    pub pacing: PacingSettings,
    pub break_settings: BreakSettings,
}

struct ActiveLoop {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives the queue: one item at a time, a randomized break between items,
/// stop observed at the next step boundary.
pub struct QueueOrchestrator {
    parts: Arc<OrchestratorParts>,
    active: tokio::sync::Mutex<Option<ActiveLoop>>,
}

impl QueueOrchestrator {
    pub fn new(parts: OrchestratorParts) -> Self {
        Self {
            parts: Arc::new(parts),
            active: tokio::sync::Mutex::new(None),
        }
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.parts.queue
    }

    /// Starts processing, replacing the items when given. Returns the index
    /// of the first item to process.
    pub async fn start(&self, items: Option<Vec<QueueItem>>) -> Result<usize, EngineError> {
        self.start_inner(items, None).await
    }

    /// Picks up a run that was active when the process last exited.
    /// Returns whether a run was resumed.
    pub async fn resume(&self) -> Result<bool, EngineError> {
        let (was_running, break_end) = self
            .parts
            .queue
            .read(|q| (q.is_running(), q.break_end_time()))
            .await;
        if !was_running {
            return Ok(false);
        }
        engine_info!("Resuming interrupted queue run");
        self.parts.queue.mutate(|q| q.halt()).await?;
        let resume_break = break_end.filter(|end| *end > Utc::now());
        match self.start_inner(None, resume_break).await {
            Ok(_) => Ok(true),
            Err(EngineError::Queue(err)) => {
                engine_info!("Nothing to resume: {}", err);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn start_inner(
        &self,
        items: Option<Vec<QueueItem>>,
        resume_break: Option<DateTime<Utc>>,
    ) -> Result<usize, EngineError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            if !previous.task.is_finished() {
                if self.parts.queue.read(|q| q.is_running()).await {
                    *active = Some(previous);
                    return Err(linkqueue_core::QueueError::AlreadyRunning.into());
                }
                engine_debug!("Waiting for previous run to wind down");
                previous.stop.cancel();
                if let Err(err) = previous.task.await {
                    engine_error!("Previous queue loop ended abnormally: {}", err);
                }
            }
        }

        let first = self.parts.queue.try_mutate(|q| q.begin(items)).await?;
        if let Some(end) = resume_break {
            self.parts.breaks.set_break_end_time(end).await?;
        }
        if let Err(err) = self.parts.keep_awake.acquire().await {
            engine_warn!("Keep-awake unavailable: {}", err);
        }

        let stop = CancellationToken::new();
        let task = tokio::spawn(run_queue(Arc::clone(&self.parts), stop.clone()));
        *active = Some(ActiveLoop { stop, task });
        engine_info!("Queue started at item {}", first);
        Ok(first)
    }

    /// Stops the run. The in-flight remote command completes; its item goes
    /// back to pending.
    pub async fn stop(&self) -> Result<(), EngineError> {
        if let Some(run) = self.active.lock().await.as_ref() {
            run.stop.cancel();
        }
        self.parts.queue.mutate(|q| q.halt()).await?;
        self.parts.breaks.skip().await?;
        if let Err(err) = self.parts.keep_awake.release().await {
            engine_warn!("Keep-awake release failed: {}", err);
        }
        engine_info!("Queue stopped");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), EngineError> {
        self.stop().await?;
        self.parts.queue.reset().await?;
        engine_info!("Queue cleared");
        Ok(())
    }

    pub async fn reorder(
        &self,
        items: Vec<QueueItem>,
        current_index: Option<usize>,
    ) -> Result<(), EngineError> {
        self.parts
            .queue
            .try_mutate(|q| q.reorder(items, current_index))
            .await
    }

    /// Points the queue at `index` and makes that item pending again. While
    /// running, it is taken up once the in-flight item finishes.
    pub async fn jump(&self, index: usize) -> Result<(), EngineError> {
        self.parts.queue.try_mutate(|q| q.jump(index)).await?;
        engine_info!("Queue pointer moved to {}", index);
        Ok(())
    }

    pub async fn delete(&self, index: usize) -> Result<QueueItem, EngineError> {
        let removed = self.parts.queue.try_mutate(|q| q.delete(index)).await?;
        engine_info!("Removed {} from queue", removed.url);
        Ok(removed)
    }

    pub async fn skip_break(&self) -> Result<(), EngineError> {
        self.parts.breaks.skip().await
    }

    pub async fn set_break_end_time(&self, at: DateTime<Utc>) -> Result<(), EngineError> {
        self.parts.breaks.set_break_end_time(at).await
    }

    pub async fn status(&self) -> Result<QueueStatus, EngineError> {
        Ok(QueueStatus {
            queue: self.parts.queue.snapshot().await,
            scheduled_break_end: self.parts.breaks.scheduled_end(),
            total_extracted: self.parts.saver.total().await?,
            single_page_running: false,
        })
    }

    /// Waits for the current loop to finish on its own.
    pub async fn join(&self) {
        let run = self.active.lock().await.take();
        if let Some(run) = run {
            if let Err(err) = run.task.await {
                engine_error!("Queue loop ended abnormally: {}", err);
            }
        }
    }
}

async fn run_queue(parts: Arc<OrchestratorParts>, stop: CancellationToken) {
    match drive(&parts, &stop).await {
        Ok(()) => {}
        Err(EngineError::TargetClosed(reason)) => {
            engine_warn!("Remote context closed ({}); stopping the queue", reason);
        }
        Err(err) => engine_error!("Queue loop aborted: {}", err),
    }
    if stop.is_cancelled() {
        // `stop` already halted the queue; drop any break the loop armed
        // after that, unless a new run owns the queue by now.
        if !parts.queue.read(|q| q.is_running()).await {
            if let Err(err) = parts.breaks.skip().await {
                engine_warn!("Could not clear break: {}", err);
            }
        }
        return;
    }
    // Natural end: leave the running state ourselves.
    if let Err(err) = parts.queue.mutate(|q| q.halt()).await {
        engine_error!("Could not persist queue after run: {}", err);
    }
    if let Err(err) = parts.breaks.skip().await {
        engine_warn!("Could not clear break: {}", err);
    }
    if let Err(err) = parts.keep_awake.release().await {
        engine_warn!("Keep-awake release failed: {}", err);
    }
}

async fn drive(parts: &Arc<OrchestratorParts>, stop: &CancellationToken) -> Result<(), EngineError> {
    loop {
        wait_out_break(parts, stop).await;
        if stop.is_cancelled() {
            return Ok(());
        }

        let Some(item) = parts.queue.mutate(|q| q.mark_processing()).await? else {
            engine_info!("Queue pointer is past the end; finishing");
            return Ok(());
        };
        engine_info!("Processing {} ({})", item.display_name(), item.url);

        let processed = process_in_task(Arc::clone(parts), item.clone(), stop.clone()).await;
        let outcome = match &processed {
            Ok(outcome) => outcome.clone(),
            Err(_) => ItemOutcome::Interrupted,
        };
        engine_info!("Item {} finished: {:?}", item.url, outcome);
        let applied = parts
            .queue
            .mutate(|q| q.apply_outcome(item.id, outcome))
            .await?;
        if !applied {
            engine_debug!("Item {} was deleted while processing", item.url);
        }
        processed?;

        if stop.is_cancelled() {
            return Ok(());
        }
        let Some(next) = parts.queue.mutate(|q| q.advance()).await? else {
            engine_info!("Queue completed");
            return Ok(());
        };
        engine_debug!("Next item at {}", next);

        if stop.is_cancelled() {
            return Ok(());
        }
        let settings = parts.break_settings;
        if parts
            .breaks
            .start_break(settings.min, settings.max)
            .await?
            .is_none()
        {
            return Ok(());
        }
    }
}

async fn wait_out_break(parts: &OrchestratorParts, stop: &CancellationToken) {
    while parts.breaks.is_on_break().await {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(parts.break_settings.poll_interval) => {}
        }
    }
}

/// Runs one item on its own task so a panic becomes a failed item. An
/// error means the remote context is gone and the run cannot go on.
async fn process_in_task(
    parts: Arc<OrchestratorParts>,
    item: QueueItem,
    stop: CancellationToken,
) -> Result<ItemOutcome, EngineError> {
    let task = tokio::spawn(async move { process_item(&parts, &item, &stop).await });
    match task.await {
        Ok(outcome) => outcome,
        Err(err) => Ok(ItemOutcome::Failed {
            error: format!("item processing aborted: {err}"),
        }),
    }
}

async fn process_item(
    parts: &OrchestratorParts,
    item: &QueueItem,
    stop: &CancellationToken,
) -> Result<ItemOutcome, EngineError> {
    let mut target_url = item.url.clone();
    let mut source = item.source_name.clone();

    if item.is_profile_url {
        if let Some(failed) = open_or_fail(parts, &item.url, stop).await? {
            return Ok(failed);
        }
        if stop.is_cancelled() {
            return Ok(ItemOutcome::Interrupted);
        }
        match parts.port.resolve_profile_target().await {
            Ok(target) => {
                target_url = target.connections_url;
                if let Some(name) = target.profile_name.filter(|n| !n.trim().is_empty()) {
                    if let Err(err) = parts
                        .queue
                        .mutate(|q| q.set_source_name(item.id, name.clone()))
                        .await
                    {
                        engine_warn!("Could not store profile name: {}", err);
                    }
                    source = Some(name);
                }
            }
            Err(err @ EngineError::TargetClosed(_)) => return Err(err),
            Err(err) => {
                return Ok(ItemOutcome::Failed {
                    error: format!("could not find connections link: {err}"),
                })
            }
        }
    }

    if stop.is_cancelled() {
        return Ok(ItemOutcome::Interrupted);
    }
    if let Some(failed) = open_or_fail(parts, &target_url, stop).await? {
        return Ok(failed);
    }
    if stop.is_cancelled() {
        return Ok(ItemOutcome::Interrupted);
    }

    let runner = PageRunner::new(
        parts.port.as_ref(),
        parts.saver.as_ref(),
        parts.pacing,
        stop.clone(),
    );
    let outcome = runner.run(source.as_deref()).await;
    Ok(match outcome.phase {
        RunPhase::Completed => ItemOutcome::Completed {
            profiles_found: outcome.total_records,
            source_name: source,
        },
        RunPhase::Failed { reason } => ItemOutcome::Failed { error: reason },
        RunPhase::Stopped if !stop.is_cancelled() => {
            return Err(EngineError::TargetClosed(
                "remote context went away during the page run".to_string(),
            ))
        }
        RunPhase::Idle | RunPhase::Running | RunPhase::Stopped => ItemOutcome::Interrupted,
    })
}

/// Opens `url`. A failed navigation fails the item; a closed target is
/// returned as an error so the run stops.
async fn open_or_fail(
    parts: &OrchestratorParts,
    url: &str,
    stop: &CancellationToken,
) -> Result<Option<ItemOutcome>, EngineError> {
    match open(parts, url, stop).await {
        Ok(()) => Ok(None),
        Err(err @ EngineError::TargetClosed(_)) => Err(err),
        Err(err) => Ok(Some(ItemOutcome::Failed {
            error: err.to_string(),
        })),
    }
}

async fn open(parts: &OrchestratorParts, url: &str, stop: &CancellationToken) -> Result<(), EngineError> {
    parts.port.navigate(url).await?;
    tokio::select! {
        _ = stop.cancelled() => return Ok(()),
        _ = tokio::time::sleep(parts.pacing.navigation_settle) => {}
    }
    if let Err(err) = parts.port.wait_until_ready(parts.pacing.ready_budget).await {
        engine_debug!("Page not confirmed ready: {}", err);
    }
    Ok(())
}
