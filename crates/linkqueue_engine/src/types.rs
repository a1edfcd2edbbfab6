use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EngineError;

/// Request understood by the in-page listener, serialized as
/// `{"action": "<name>", ...params}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Ping,
    GetCurrentPageInfo,
    WaitForPageReady {
        #[serde(rename = "timeoutMs")]
        timeout_ms: u64,
    },
    ExtractCurrentPage,
    IsLastPage,
    RealisticScroll,
    ClickNextButton,
    FindConnectionsUrl,
    SetNotificationSettings {
        enabled: bool,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Ping => "ping",
            Action::GetCurrentPageInfo => "getCurrentPageInfo",
            Action::WaitForPageReady { .. } => "waitForPageReady",
            Action::ExtractCurrentPage => "extractCurrentPage",
            Action::IsLastPage => "isLastPage",
            Action::RealisticScroll => "realisticScroll",
            Action::ClickNextButton => "clickNextButton",
            Action::FindConnectionsUrl => "findConnectionsUrl",
            Action::SetNotificationSettings { .. } => "setNotificationSettings",
        }
    }
}

/// Response envelope: `{"success": bool, "error"?: string, ...payload}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Reply {
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        if value.is_null() {
            return Err(EngineError::ExtractionFailed("no response".to_string()));
        }
        serde_json::from_value(value)
            .map_err(|err| EngineError::ExtractionFailed(format!("malformed reply: {err}")))
    }

    /// Turns `success: false` into `ExtractionFailed` carrying the remote error.
    pub fn into_success(self) -> Result<Self, EngineError> {
        if self.success {
            Ok(self)
        } else {
            Err(EngineError::ExtractionFailed(
                self.error.unwrap_or_else(|| "remote reported failure".to_string()),
            ))
        }
    }

    /// Decodes the payload fields into `T`.
    pub fn payload<T: DeserializeOwned>(self) -> Result<T, EngineError> {
        serde_json::from_value(Value::Object(self.payload))
            .map_err(|err| EngineError::ExtractionFailed(format!("unexpected payload: {err}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub max_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mutual_connections: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageExtraction {
    #[serde(rename = "data", default)]
    pub profiles: Vec<ScrapedProfile>,
    #[serde(default)]
    pub source_connection: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileTarget {
    pub connections_url: String,
    #[serde(default)]
    pub profile_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LastPageFlag {
    #[serde(default)]
    pub is_last_page: bool,
}
