use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use linkqueue_core::{PageRunState, RunOutcome, RunPhase};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::breaks::random_between;
use crate::channel::duration_ms;
use crate::keep_awake::KeepAwake;
use crate::port::ExtractionPort;
use crate::records::{records_from_extraction, RecordSaver};
use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    #[serde(with = "duration_ms")]
    pub page_delay_min: Duration,
    #[serde(with = "duration_ms")]
    pub page_delay_max: Duration,
    /// Budget handed to the listener's ready check.
    #[serde(with = "duration_ms")]
    pub ready_budget: Duration,
    /// Pause after a navigation before the first command.
    #[serde(with = "duration_ms")]
    pub navigation_settle: Duration,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            page_delay_min: Duration::from_secs(2),
            page_delay_max: Duration::from_secs(5),
            ready_budget: Duration::from_secs(5),
            navigation_settle: Duration::from_secs(3),
        }
    }
}

/// Walks the result pages of the current document: extract, persist, check
/// for the last page, pace, advance.
pub struct PageRunner<'a> {
    port: &'a dyn ExtractionPort,
    saver: &'a RecordSaver,
    pacing: PacingSettings,
    stop: CancellationToken,
}

impl<'a> PageRunner<'a> {
    pub fn new(
        port: &'a dyn ExtractionPort,
        saver: &'a RecordSaver,
        pacing: PacingSettings,
        stop: CancellationToken,
    ) -> Self {
        Self {
            port,
            saver,
            pacing,
            stop,
        }
    }

    /// Runs until the last page, a failure or cancellation. A closed remote
    /// context ends the run as stopped. Records carry `source` when given,
    /// else what the page reports.
    pub async fn run(&self, source: Option<&str>) -> RunOutcome {
        let mut state = PageRunState::new();
        state.start();

        while state.is_running() {
            if self.stop.is_cancelled() {
                state.stop();
                break;
            }
            self.step(&mut state, source).await;
            if !state.is_running() {
                break;
            }
            let delay = random_between(self.pacing.page_delay_min, self.pacing.page_delay_max);
            engine_debug!("Next page in {:?}", delay);
            tokio::select! {
                _ = self.stop.cancelled() => state.stop(),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let outcome = state.outcome().unwrap_or(RunOutcome {
            phase: RunPhase::Stopped,
            total_records: state.total_records(),
            last_page: state.current_page(),
        });
        engine_info!(
            "Page run ended: {:?} with {} records",
            outcome.phase,
            outcome.total_records
        );
        outcome
    }

    async fn step(&self, state: &mut PageRunState, source: Option<&str>) {
        match self.port.page_info().await {
            Ok(info) => state.record_page_info(info.current_page, info.max_page),
            Err(err) => {
                if !stop_if_closed(state, &err) {
                    state.fail(format!("could not read page info: {err}"));
                }
                return;
            }
        }
        engine_info!(
            "Processing page {:?} of {:?}",
            state.current_page(),
            state.max_page()
        );

        if let Err(err) = self.port.wait_until_ready(self.pacing.ready_budget).await {
            engine_debug!("Page not confirmed ready: {}", err);
        }

        let found = match self.port.extract_current_page().await {
            Ok(extraction) => {
                let records = records_from_extraction(&extraction, source, Utc::now());
                if !records.is_empty() {
                    if let Err(err) = self.saver.save(records).await {
                        engine_error!("Could not persist extracted records: {}", err);
                        state.fail(format!("could not persist records: {err}"));
                        return;
                    }
                }
                Some(extraction.profiles.len())
            }
            Err(err) => {
                if stop_if_closed(state, &err) {
                    return;
                }
                engine_warn!("Extraction failed: {}", err);
                None
            }
        };
        if !state.record_extraction(found) {
            return;
        }

        match self.port.is_last_page().await {
            Ok(true) => {
                engine_info!("Reached last page");
                state.complete();
                return;
            }
            Ok(false) => {}
            Err(err) => {
                if stop_if_closed(state, &err) {
                    return;
                }
                engine_warn!("Could not check for last page: {}", err);
            }
        }

        if let Err(err) = self.port.perform_pacing_action().await {
            engine_debug!("Pacing action failed: {}", err);
        }

        if let Err(err) = self.port.advance_page().await {
            if stop_if_closed(state, &err) {
                return;
            }
            engine_info!("No next page ({}); finishing", err);
            state.complete();
        }
    }
}

/// A closed remote context ends the run as stopped rather than failed.
fn stop_if_closed(state: &mut PageRunState, err: &EngineError) -> bool {
    let EngineError::TargetClosed(reason) = err else {
        return false;
    };
    engine_warn!("Remote context closed ({}); stopping", reason);
    state.stop();
    true
}

struct ActiveRun {
    stop: CancellationToken,
    task: JoinHandle<RunOutcome>,
}

/// Page-run automation on whatever document the remote context shows,
/// independent of the queue.
pub struct SinglePageController {
    port: Arc<dyn ExtractionPort>,
    saver: Arc<RecordSaver>,
    keep_awake: Arc<dyn KeepAwake>,
    pacing: PacingSettings,
    active: std::sync::Mutex<Option<ActiveRun>>,
}

impl SinglePageController {
    pub fn new(
        port: Arc<dyn ExtractionPort>,
        saver: Arc<RecordSaver>,
        keep_awake: Arc<dyn KeepAwake>,
        pacing: PacingSettings,
    ) -> Self {
        Self {
            port,
            saver,
            keep_awake,
            pacing,
            active: std::sync::Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.as_ref().is_some_and(|run| !run.task.is_finished())
    }

    /// Spawns a run unless one is active. The check and the insert happen
    /// under one lock so concurrent starts cannot both succeed.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().is_some_and(|run| !run.task.is_finished()) {
            return Err(EngineError::SinglePageRunning);
        }

        let stop = CancellationToken::new();
        let port = Arc::clone(&self.port);
        let saver = Arc::clone(&self.saver);
        let keep_awake = Arc::clone(&self.keep_awake);
        let pacing = self.pacing;
        let token = stop.clone();
        let task = tokio::spawn(async move {
            if let Err(err) = keep_awake.acquire().await {
                engine_warn!("Keep-awake unavailable: {}", err);
            }
            let outcome = PageRunner::new(port.as_ref(), saver.as_ref(), pacing, token)
                .run(None)
                .await;
            if let Err(err) = keep_awake.release().await {
                engine_warn!("Keep-awake release failed: {}", err);
            }
            outcome
        });
        *active = Some(ActiveRun { stop, task });
        engine_info!("Single page automation started");
        Ok(())
    }

    /// Requests a stop; the run notices at its next step boundary.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let stop = {
            let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.as_ref().map(|run| run.stop.clone())
        };
        if let Some(stop) = stop {
            stop.cancel();
        }
        if let Err(err) = self.keep_awake.release().await {
            engine_warn!("Keep-awake release failed: {}", err);
        }
        engine_info!("Single page automation stop requested");
        Ok(())
    }

    /// Waits for the current run to end and returns its outcome.
    pub async fn join(&self) -> Option<RunOutcome> {
        let run = {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.take()
        }?;
        match run.task.await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                engine_error!("Single page run aborted: {}", err);
                None
            }
        }
    }
}
