use crate::view_model::{AppViewModel, ItemRowView, StatusKind, StatusLine};
use crate::{QueueItem, QueueStatus, Settings};

/// Console-side state: a display copy of the orchestrator snapshot plus
/// whatever the user has typed but not yet sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    site_host: String,
    staged_input: String,
    snapshot: QueueStatus,
    settings: Settings,
    status_line: StatusLine,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new("linkedin.com")
    }
}

impl AppState {
    pub fn new(site_host: impl Into<String>) -> Self {
        Self {
            site_host: site_host.into(),
            staged_input: String::new(),
            snapshot: QueueStatus::default(),
            settings: Settings::default(),
            status_line: StatusLine::default(),
            dirty: false,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn view(&self) -> AppViewModel {
        let queue = &self.snapshot.queue;
        let rows = queue
            .items()
            .iter()
            .enumerate()
            .map(|(index, item)| ItemRowView {
                index,
                name: item.display_name().to_string(),
                url: item.url.clone(),
                status: item.status,
                profiles_found: item.profiles_found,
                error: item.error.clone(),
                is_current: queue.is_running() && index == queue.current_index(),
            })
            .collect();

        AppViewModel {
            running: queue.is_running(),
            single_page_running: self.snapshot.single_page_running,
            break_until: self.snapshot.break_until(),
            progress: (queue.current_index(), queue.len()),
            rows,
            total_extracted: self.snapshot.total_extracted,
            staged_lines: self.staged_input.lines().filter(|l| !l.trim().is_empty()).count(),
            show_notifications: self.settings.show_notifications,
            queue_expanded: self.settings.queue_expanded,
            status_line: self.status_line.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn site_host(&self) -> &str {
        &self.site_host
    }

    pub(crate) fn snapshot(&self) -> &QueueStatus {
        &self.snapshot
    }

    pub(crate) fn items(&self) -> &[QueueItem] {
        self.snapshot.queue.items()
    }

    pub(crate) fn settings(&self) -> Settings {
        self.settings
    }

    pub(crate) fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
        self.dirty = true;
    }

    pub(crate) fn stage_input(&mut self, raw: &str) {
        if !self.staged_input.is_empty() && !self.staged_input.ends_with('\n') {
            self.staged_input.push('\n');
        }
        self.staged_input.push_str(raw);
        self.dirty = true;
    }

    pub(crate) fn take_staged_input(&mut self) -> String {
        self.dirty = true;
        std::mem::take(&mut self.staged_input)
    }

    pub(crate) fn staged_input(&self) -> &str {
        &self.staged_input
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: QueueStatus) {
        if self.snapshot != snapshot {
            self.snapshot = snapshot;
            self.dirty = true;
        }
    }

    /// Optimistic local reorder so the list does not jump back before the
    /// next poll.
    pub(crate) fn apply_local_order(&mut self, items: Vec<QueueItem>, current_index: usize) {
        if self.snapshot.queue.reorder(items, Some(current_index)).is_ok() {
            self.dirty = true;
        }
    }

    pub(crate) fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status_line = StatusLine {
            kind,
            text: text.into(),
        };
        self.dirty = true;
    }
}
