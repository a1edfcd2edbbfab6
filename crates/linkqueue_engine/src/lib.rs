//! Async side of linkqueue: the remote command channel, storage, break
//! timing, the page and queue run loops, and the command service that owns
//! them.
mod breaks;
mod channel;
mod error;
mod export;
mod keep_awake;
mod orchestrator;
mod page_runner;
mod persist;
mod port;
mod records;
mod service;
mod shared;
mod store;
mod timer;
mod types;
mod upload;

pub use breaks::{BreakScheduler, BreakSettings, BREAK_ALARM};
pub use channel::{ChannelSettings, CommandChannel, RemoteTarget, TargetError};
pub use error::EngineError;
pub use export::{default_export_name, export_csv, render_csv, ExportError, ExportSummary, CSV_HEADER};
pub use keep_awake::{KeepAwake, NoKeepAwake};
pub use orchestrator::{OrchestratorParts, QueueOrchestrator};
pub use page_runner::{PacingSettings, PageRunner, SinglePageController};
pub use persist::{ensure_dir, write_atomic, PersistError};
pub use port::{ChannelPort, ExtractionPort};
pub use records::{records_from_extraction, RecordSaver};
pub use service::{
    Command, EngineSettings, QueueService, ServiceDeps, ServiceHandle, ServiceReply,
};
pub use shared::SharedQueue;
pub use store::{
    FileStore, KeyValueStore, MemoryStore, Storage, StoreError, ALARMS_KEY, QUEUE_KEY,
    RECORDS_KEY, SETTINGS_KEY, TOTAL_KEY,
};
pub use timer::{DurableWakeTimer, WakeTimer};
pub use types::{Action, PageExtraction, PageInfo, ProfileTarget, Reply, ScrapedProfile};
pub use upload::{upload_row, RecordUploader, RestUploader, UploadError, UploadSettings};
