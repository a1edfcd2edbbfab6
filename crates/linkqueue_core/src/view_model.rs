use chrono::{DateTime, Utc};

use crate::ItemStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    #[default]
    Ready,
    Working,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub kind: StatusKind,
    pub text: String,
}

impl Default for StatusLine {
    fn default() -> Self {
        Self {
            kind: StatusKind::Ready,
            text: "Ready".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub running: bool,
    pub single_page_running: bool,
    pub break_until: Option<DateTime<Utc>>,
    /// `(current index, item count)`.
    pub progress: (usize, usize),
    pub rows: Vec<ItemRowView>,
    pub total_extracted: u64,
    pub staged_lines: usize,
    pub show_notifications: bool,
    /// Full list when set, else only the current item.
    pub queue_expanded: bool,
    pub status_line: StatusLine,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRowView {
    pub index: usize,
    pub name: String,
    pub url: String,
    pub status: ItemStatus,
    pub profiles_found: usize,
    pub error: Option<String>,
    pub is_current: bool,
}
