use chrono::{DateTime, Utc};

use crate::{QueueItem, Settings};

/// Commands the console asks the orchestrator to perform. The console never
/// edits queue state itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartQueue { items: Option<Vec<QueueItem>> },
    StopQueue,
    ClearQueue,
    SkipBreak,
    SetBreakEndTime { at: DateTime<Utc> },
    ReorderQueue { items: Vec<QueueItem>, current_index: usize },
    JumpTo { index: usize },
    Delete { index: usize },
    ExportCsv { path: String },
    PushToDatabase,
    SaveSettings(Settings),
    RefreshStatus,
}
