use std::time::Duration;

use async_trait::async_trait;

use crate::channel::CommandChannel;
use crate::types::{Action, LastPageFlag, PageExtraction, PageInfo, ProfileTarget};
use crate::EngineError;

/// Page-level capabilities the run loops need from the remote context.
#[async_trait]
pub trait ExtractionPort: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;
    async fn page_info(&self) -> Result<PageInfo, EngineError>;
    async fn wait_until_ready(&self, budget: Duration) -> Result<(), EngineError>;
    async fn extract_current_page(&self) -> Result<PageExtraction, EngineError>;
    async fn is_last_page(&self) -> Result<bool, EngineError>;
    async fn perform_pacing_action(&self) -> Result<(), EngineError>;
    async fn advance_page(&self) -> Result<(), EngineError>;
    async fn resolve_profile_target(&self) -> Result<ProfileTarget, EngineError>;
    async fn set_notifications(&self, enabled: bool) -> Result<(), EngineError>;
}

/// `ExtractionPort` speaking the listener protocol over a `CommandChannel`.
pub struct ChannelPort {
    channel: CommandChannel,
}

impl ChannelPort {
    pub fn new(channel: CommandChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ExtractionPort for ChannelPort {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.channel.navigate(url).await
    }

    async fn page_info(&self) -> Result<PageInfo, EngineError> {
        self.channel
            .send(&Action::GetCurrentPageInfo)
            .await?
            .into_success()?
            .payload()
    }

    async fn wait_until_ready(&self, budget: Duration) -> Result<(), EngineError> {
        let action = Action::WaitForPageReady {
            timeout_ms: budget.as_millis() as u64,
        };
        // The listener waits up to the budget itself; leave room for the probe.
        let limit = budget + self.channel.settings().probe_timeout;
        self.channel
            .send_with_timeout(&action, limit)
            .await?
            .into_success()
            .map(|_| ())
    }

    async fn extract_current_page(&self) -> Result<PageExtraction, EngineError> {
        self.channel
            .send(&Action::ExtractCurrentPage)
            .await?
            .into_success()?
            .payload()
    }

    async fn is_last_page(&self) -> Result<bool, EngineError> {
        let flag: LastPageFlag = self
            .channel
            .send(&Action::IsLastPage)
            .await?
            .into_success()?
            .payload()?;
        Ok(flag.is_last_page)
    }

    async fn perform_pacing_action(&self) -> Result<(), EngineError> {
        self.channel
            .send(&Action::RealisticScroll)
            .await?
            .into_success()
            .map(|_| ())
    }

    async fn advance_page(&self) -> Result<(), EngineError> {
        self.channel
            .send(&Action::ClickNextButton)
            .await?
            .into_success()
            .map(|_| ())
    }

    async fn resolve_profile_target(&self) -> Result<ProfileTarget, EngineError> {
        self.channel
            .send(&Action::FindConnectionsUrl)
            .await?
            .into_success()?
            .payload()
    }

    async fn set_notifications(&self, enabled: bool) -> Result<(), EngineError> {
        self.channel
            .send(&Action::SetNotificationSettings { enabled })
            .await?
            .into_success()
            .map(|_| ())
    }
}
