use async_trait::async_trait;
use engine_logging::engine_debug;

use crate::EngineError;

/// Holds the host awake while a run is active. Both calls are idempotent.
#[async_trait]
pub trait KeepAwake: Send + Sync {
    async fn acquire(&self) -> Result<(), EngineError>;
    async fn release(&self) -> Result<(), EngineError>;
}

/// For hosts that need no wake lock.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeepAwake;

#[async_trait]
impl KeepAwake for NoKeepAwake {
    async fn acquire(&self) -> Result<(), EngineError> {
        engine_debug!("Keep-awake requested (no-op)");
        Ok(())
    }

    async fn release(&self) -> Result<(), EngineError> {
        engine_debug!("Keep-awake released (no-op)");
        Ok(())
    }
}
