use serde::{Deserialize, Serialize};

/// Stable identity of a queue item; survives reorders and deletions.
pub type ItemId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Zero means "not yet assigned"; the queue assigns ids on adoption.
    #[serde(default)]
    pub id: ItemId,
    pub url: String,
    #[serde(default)]
    pub is_profile_url: bool,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub profiles_found: usize,
    #[serde(default)]
    pub error: Option<String>,
}

impl QueueItem {
    pub fn new(url: impl Into<String>, is_profile_url: bool, source_name: Option<String>) -> Self {
        Self {
            id: 0,
            url: url.into(),
            is_profile_url,
            source_name,
            status: ItemStatus::Pending,
            profiles_found: 0,
            error: None,
        }
    }

    /// Anything not yet completed still needs a visit.
    pub fn needs_work(&self) -> bool {
        self.status != ItemStatus::Completed
    }

    pub fn display_name(&self) -> &str {
        self.source_name.as_deref().unwrap_or("Unknown")
    }
}

/// Result of processing one queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed {
        profiles_found: usize,
        source_name: Option<String>,
    },
    Failed {
        error: String,
    },
    /// The run was stopped before the item finished; it goes back to pending.
    Interrupted,
}
