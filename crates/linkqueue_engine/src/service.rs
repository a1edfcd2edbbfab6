use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info, engine_warn};
use linkqueue_core::{ExtractedRecord, QueueItem, QueueStatus, SaveSummary, Settings};
use tokio::sync::{mpsc, oneshot};

use crate::breaks::{BreakScheduler, BreakSettings};
use crate::export::{export_csv, ExportSummary};
use crate::keep_awake::KeepAwake;
use crate::orchestrator::{OrchestratorParts, QueueOrchestrator};
use crate::page_runner::{PacingSettings, SinglePageController};
use crate::port::ExtractionPort;
use crate::records::RecordSaver;
use crate::shared::SharedQueue;
use crate::store::Storage;
use crate::timer::DurableWakeTimer;
use crate::upload::{RecordUploader, UploadError};
use crate::EngineError;

/// Commands accepted by the engine service.
#[derive(Debug, Clone)]
pub enum Command {
    SaveQuickExtraction(Vec<ExtractedRecord>),
    StartSinglePage,
    StopSinglePage,
    StartQueue(Option<Vec<QueueItem>>),
    StopQueue,
    ClearQueue,
    GetQueueStatus,
    SkipBreak,
    SetBreakEndTime(DateTime<Utc>),
    ReorderQueue {
        items: Vec<QueueItem>,
        current_index: Option<usize>,
    },
    JumpToQueueItem(usize),
    DeleteQueueItem(usize),
    PushToDatabase,
    ExportCsv(PathBuf),
    GetSettings,
    UpdateSettings(Settings),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SaveQuickExtraction(_) => "saveQuickExtraction",
            Command::StartSinglePage => "startSinglePage",
            Command::StopSinglePage => "stopSinglePage",
            Command::StartQueue(_) => "startQueue",
            Command::StopQueue => "stopQueue",
            Command::ClearQueue => "clearQueue",
            Command::GetQueueStatus => "getQueueStatus",
            Command::SkipBreak => "skipBreak",
            Command::SetBreakEndTime(_) => "setBreakEndTime",
            Command::ReorderQueue { .. } => "reorderQueue",
            Command::JumpToQueueItem(_) => "jumpToQueueItem",
            Command::DeleteQueueItem(_) => "deleteQueueItem",
            Command::PushToDatabase => "pushToDatabase",
            Command::ExportCsv(_) => "exportCsv",
            Command::GetSettings => "getSettings",
            Command::UpdateSettings(_) => "updateSettings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceReply {
    Done,
    Started { first_index: usize },
    Saved(SaveSummary),
    Status(QueueStatus),
    Deleted(QueueItem),
    Pushed { count: usize },
    Exported(ExportSummary),
    Settings(Settings),
}

/// Tunables for the service's run loops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSettings {
    pub pacing: PacingSettings,
    pub breaks: BreakSettings,
}

/// Collaborators supplied by the host.
pub struct ServiceDeps {
    pub storage: Storage,
    pub port: Arc<dyn ExtractionPort>,
    pub keep_awake: Arc<dyn KeepAwake>,
    pub uploader: Option<Arc<dyn RecordUploader>>,
}

type Envelope = (Command, oneshot::Sender<Result<ServiceReply, EngineError>>);

/// Cloneable sender side of the service.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ServiceHandle {
    pub async fn send(&self, command: Command) -> Result<ServiceReply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((command, reply_tx))
            .await
            .map_err(|_| EngineError::ServiceClosed)?;
        reply_rx.await.map_err(|_| EngineError::ServiceClosed)?
    }

    pub async fn status(&self) -> Result<QueueStatus, EngineError> {
        match self.send(Command::GetQueueStatus).await? {
            ServiceReply::Status(status) => Ok(status),
            other => Err(EngineError::UnexpectedReply(format!(
                "{other:?} to a status request"
            ))),
        }
    }
}

/// The one owner of queue, record, and settings state.
pub struct QueueService {
    orchestrator: QueueOrchestrator,
    single_page: SinglePageController,
    /// Serializes queue and single-page starts; both drive the same page.
    start_lock: tokio::sync::Mutex<()>,
    saver: Arc<RecordSaver>,
    storage: Storage,
    port: Arc<dyn ExtractionPort>,
    uploader: Option<Arc<dyn RecordUploader>>,
}

impl QueueService {
    /// Loads persisted state, re-arms alarms, and resumes an interrupted run.
    pub async fn start(deps: ServiceDeps, settings: EngineSettings) -> Result<Self, EngineError> {
        let ServiceDeps {
            storage,
            port,
            keep_awake,
            uploader,
        } = deps;

        let queue = SharedQueue::load(storage.clone()).await?;
        let saver = Arc::new(RecordSaver::new(storage.clone()));
        let (timer, fired) = DurableWakeTimer::new(storage.clone());
        let timer = Arc::new(timer);
        let breaks = Arc::new(BreakScheduler::new(queue.clone(), timer.clone()));
        Arc::clone(&breaks).listen(fired);
        let restored = timer.restore().await?;
        if restored > 0 {
            engine_info!("Re-armed {} alarms", restored);
        }

        let orchestrator = QueueOrchestrator::new(OrchestratorParts {
            queue,
            port: Arc::clone(&port),
            saver: Arc::clone(&saver),
            breaks,
            keep_awake: Arc::clone(&keep_awake),
            pacing: settings.pacing,
            break_settings: settings.breaks,
        });
        orchestrator.resume().await?;

        let single_page = SinglePageController::new(
            Arc::clone(&port),
            Arc::clone(&saver),
            keep_awake,
            settings.pacing,
        );

        Ok(Self {
            orchestrator,
            single_page,
            start_lock: tokio::sync::Mutex::new(()),
            saver,
            storage,
            port,
            uploader,
        })
    }

    pub fn orchestrator(&self) -> &QueueOrchestrator {
        &self.orchestrator
    }

    pub fn single_page(&self) -> &SinglePageController {
        &self.single_page
    }

    /// Moves the service onto its own task and returns the handle. Each
    /// command is handled on a task of its own.
    pub fn spawn(self) -> ServiceHandle {
        let (tx, mut rx) = mpsc::channel::<Envelope>(64);
        let service = Arc::new(self);
        tokio::spawn(async move {
            while let Some((command, reply_tx)) = rx.recv().await {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let name = command.name();
                    let result = service.handle(command).await;
                    match &result {
                        Ok(_) => engine_debug!("Command {} done", name),
                        Err(err) => engine_warn!("Command {} failed: {}", name, err),
                    }
                    let _ = reply_tx.send(result);
                });
            }
            engine_info!("Service channel closed");
        });
        ServiceHandle { tx }
    }

    pub async fn handle(&self, command: Command) -> Result<ServiceReply, EngineError> {
        match command {
            Command::SaveQuickExtraction(records) => {
                Ok(ServiceReply::Saved(self.saver.save(records).await?))
            }
            Command::StartSinglePage => {
                let _starting = self.start_lock.lock().await;
                if self.orchestrator.queue().read(|q| q.is_running()).await {
                    return Err(EngineError::QueueRunning);
                }
                self.single_page.start().await?;
                Ok(ServiceReply::Done)
            }
            Command::StopSinglePage => {
                self.single_page.stop().await?;
                Ok(ServiceReply::Done)
            }
            Command::StartQueue(items) => {
                let _starting = self.start_lock.lock().await;
                if self.single_page.is_running() {
                    return Err(EngineError::SinglePageRunning);
                }
                let first_index = self.orchestrator.start(items).await?;
                Ok(ServiceReply::Started { first_index })
            }
            Command::StopQueue => {
                self.orchestrator.stop().await?;
                Ok(ServiceReply::Done)
            }
            Command::ClearQueue => {
                self.orchestrator.clear().await?;
                Ok(ServiceReply::Done)
            }
            Command::GetQueueStatus => {
                let mut status = self.orchestrator.status().await?;
                status.single_page_running = self.single_page.is_running();
                Ok(ServiceReply::Status(status))
            }
            Command::SkipBreak => {
                self.orchestrator.skip_break().await?;
                Ok(ServiceReply::Done)
            }
            Command::SetBreakEndTime(at) => {
                self.orchestrator.set_break_end_time(at).await?;
                Ok(ServiceReply::Done)
            }
            Command::ReorderQueue {
                items,
                current_index,
            } => {
                self.orchestrator.reorder(items, current_index).await?;
                Ok(ServiceReply::Done)
            }
            Command::JumpToQueueItem(index) => {
                self.orchestrator.jump(index).await?;
                Ok(ServiceReply::Done)
            }
            Command::DeleteQueueItem(index) => {
                Ok(ServiceReply::Deleted(self.orchestrator.delete(index).await?))
            }
            Command::PushToDatabase => {
                let uploader = self.uploader.as_ref().ok_or(UploadError::NotConfigured)?;
                let records = self.saver.all().await?;
                let count = uploader.upload(records.records()).await?;
                engine_info!("Pushed {} records", count);
                Ok(ServiceReply::Pushed { count })
            }
            Command::ExportCsv(path) => {
                let records = self.saver.all().await?;
                let summary = tokio::task::spawn_blocking(move || export_csv(&records, &path))
                    .await
                    .map_err(|err| EngineError::Export(err.to_string()))??;
                engine_info!(
                    "Exported {} records to {:?}",
                    summary.record_count,
                    summary.output_path
                );
                Ok(ServiceReply::Exported(summary))
            }
            Command::GetSettings => Ok(ServiceReply::Settings(self.storage.load_settings().await)),
            Command::UpdateSettings(settings) => {
                self.storage.save_settings(&settings).await?;
                if let Err(err) = self.port.set_notifications(settings.show_notifications).await {
                    engine_debug!("Listener did not take notification setting: {}", err);
                }
                Ok(ServiceReply::Settings(settings))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_rejects_a_mismatched_reply() {
        let (tx, mut rx) = mpsc::channel::<Envelope>(1);
        tokio::spawn(async move {
            while let Some((_, reply_tx)) = rx.recv().await {
                let _ = reply_tx.send(Ok(ServiceReply::Done));
            }
        });
        let handle = ServiceHandle { tx };

        let err = handle.status().await.unwrap_err();

        assert!(matches!(err, EngineError::UnexpectedReply(_)));
    }

    #[tokio::test]
    async fn closed_service_is_reported() {
        let (tx, rx) = mpsc::channel::<Envelope>(1);
        drop(rx);
        let handle = ServiceHandle { tx };

        assert_eq!(handle.status().await.unwrap_err(), EngineError::ServiceClosed);
    }
}
