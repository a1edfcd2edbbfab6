use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep, timeout};

use crate::types::{Action, Reply};
use crate::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("no listener in remote context")]
    NoListener,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote context closed")]
    Closed,
}

impl TargetError {
    /// Maps a transport failure to `fallback` unless the target is gone.
    fn into_engine(self, fallback: fn(String) -> EngineError) -> EngineError {
        match self {
            TargetError::Closed => EngineError::TargetClosed(self.to_string()),
            other => fallback(other.to_string()),
        }
    }
}

/// The remote browsing context that hosts the listener. Implementations carry
/// the transport; the channel adds probing, re-injection, and timeouts.
#[async_trait]
pub trait RemoteTarget: Send + Sync {
    /// Deliver one JSON request to the listener and return its JSON reply.
    async fn deliver(&self, request: Value) -> Result<Value, TargetError>;
    /// Install the listener into the current document.
    async fn inject_listener(&self) -> Result<(), TargetError>;
    async fn navigate(&self, url: &str) -> Result<(), TargetError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    #[serde(with = "duration_ms")]
    pub command_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub probe_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub reinject_settle: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            reinject_settle: Duration::from_secs(2),
        }
    }
}

/// Request/response channel to the listener.
///
/// Every command first pings; an unanswered ping triggers exactly one
/// re-injection followed by a settle delay and a second ping. The whole
/// exchange, including the probe, is bounded by the command timeout.
#[derive(Clone)]
pub struct CommandChannel {
    target: Arc<dyn RemoteTarget>,
    settings: ChannelSettings,
}

impl CommandChannel {
    pub fn new(target: Arc<dyn RemoteTarget>, settings: ChannelSettings) -> Self {
        Self { target, settings }
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    pub async fn send(&self, action: &Action) -> Result<Reply, EngineError> {
        self.send_with_timeout(action, self.settings.command_timeout)
            .await
    }

    pub async fn send_with_timeout(
        &self,
        action: &Action,
        limit: Duration,
    ) -> Result<Reply, EngineError> {
        match timeout(limit, self.exchange(action)).await {
            Ok(result) => result,
            Err(_) => {
                engine_warn!("Command {} timed out after {:?}", action.name(), limit);
                Err(EngineError::CommandTimeout {
                    action: action.name().to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        engine_info!("Navigating to {}", url);
        match timeout(self.settings.command_timeout, self.target.navigate(url)).await {
            Ok(result) => result.map_err(|err| err.into_engine(EngineError::NavigationFailed)),
            Err(_) => Err(EngineError::CommandTimeout {
                action: "navigate".to_string(),
                timeout_ms: self.settings.command_timeout.as_millis() as u64,
            }),
        }
    }

    async fn exchange(&self, action: &Action) -> Result<Reply, EngineError> {
        self.ensure_listener().await?;
        let request = serde_json::to_value(action)
            .map_err(|err| EngineError::ExtractionFailed(err.to_string()))?;
        engine_debug!("Sending {}", action.name());
        let reply = self
            .target
            .deliver(request)
            .await
            .map_err(|err| err.into_engine(EngineError::RemoteUnavailable))?;
        Reply::from_value(reply)
    }

    async fn ensure_listener(&self) -> Result<(), EngineError> {
        if self.probe().await {
            return Ok(());
        }
        engine_info!("Listener not answering; injecting");
        self.target
            .inject_listener()
            .await
            .map_err(|err| err.into_engine(EngineError::RemoteUnavailable))?;
        sleep(self.settings.reinject_settle).await;
        if self.probe().await {
            Ok(())
        } else {
            Err(EngineError::RemoteUnavailable(
                "listener did not answer after injection".to_string(),
            ))
        }
    }

    async fn probe(&self) -> bool {
        let Ok(ping) = serde_json::to_value(Action::Ping) else {
            return false;
        };
        match timeout(self.settings.probe_timeout, self.target.deliver(ping)).await {
            Ok(Ok(reply)) => reply.get("success").and_then(Value::as_bool) == Some(true),
            Ok(Err(err)) => {
                engine_debug!("Ping failed: {}", err);
                false
            }
            Err(_) => false,
        }
    }
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
