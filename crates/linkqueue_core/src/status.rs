use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Queue;

/// Read-only snapshot handed to clients polling the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue: Queue,
    /// Deadline currently armed on the wake timer, if any.
    pub scheduled_break_end: Option<DateTime<Utc>>,
    pub total_extracted: u64,
    pub single_page_running: bool,
}

impl QueueStatus {
    /// Break end as clients show it: the armed alarm, else the end stored
    /// on the queue. Callers hide it once it is in the past.
    pub fn break_until(&self) -> Option<DateTime<Utc>> {
        self.scheduled_break_end.or(self.queue.break_end_time())
    }
}

/// User preferences persisted next to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub show_notifications: bool,
    pub queue_expanded: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_notifications: true,
            queue_expanded: false,
        }
    }
}
