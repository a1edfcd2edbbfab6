use linkqueue_core::QueueError;

use crate::store::StoreError;
use crate::upload::UploadError;

/// Failure of any engine command. Every service command resolves to either a
/// reply or one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("command `{action}` timed out after {timeout_ms} ms")]
    CommandTimeout { action: String, timeout_ms: u64 },
    #[error("remote context unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("navigation failed: {0}")]
    NavigationFailed(String),
    /// The remote browsing context is gone for good; runs stop instead of
    /// failing item after item.
    #[error("remote context closed: {0}")]
    TargetClosed(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("single page automation already running")]
    SinglePageRunning,
    #[error("queue run in progress")]
    QueueRunning,
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("export failed: {0}")]
    Export(String),
    #[error("engine service is not running")]
    ServiceClosed,
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Storage(err.to_string())
    }
}
