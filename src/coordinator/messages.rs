use crate::config::Config;
use crate::error::ReadBotError;
use crate::types::{ChatMessage, PageRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound message from the UI, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::VariantNames)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetPageData {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        markup: Option<String>,
    },
    ReExtractContent {
        url: String,
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        markup: Option<String>,
    },
    SendLlmMessage {
        payload: LlmPayload,
    },
    ClearUrlData {
        #[serde(default)]
        url: String,
    },
    ClearAllData,
    GetConfig,
    SaveConfig {
        config: Value,
    },
    ResetConfig,
}

impl Request {
    /// Parse a raw message, telling an unknown `type` apart from a known one
    /// with bad fields.
    pub fn from_value(value: Value) -> Result<Self, Response> {
        use strum::VariantNames;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("undefined")
            .to_string();
        if !Self::VARIANTS.contains(&kind.as_str()) {
            return Err(Response::UnknownMessage {
                error: ReadBotError::UnknownRequest(kind).to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| Response::Error {
            error: format!("Invalid {kind} message: {e}"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmPayload {
    pub messages: Vec<ChatMessage>,
    /// Falls back to the configured system prompt when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_template: Option<String>,
    #[serde(default)]
    pub extracted_page_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    pub current_url: String,
}

/// Direct reply to one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    PageDataLoaded {
        data: PageRecord,
    },
    PageDataError {
        error: String,
    },
    ContentUpdated {
        content: String,
    },
    ContentUpdateError {
        error: String,
    },
    LlmRequestReceived,
    LlmError {
        error: String,
    },
    ClearResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ConfigLoaded {
        config: Box<Config>,
    },
    ConfigSaved,
    ConfigReset,
    UnknownMessage {
        error: String,
    },
    Error {
        error: String,
    },
}

/// Pushed to every listener while a chat answer streams in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundEvent {
    LlmStreamChunk {
        chunk: String,
    },
    LlmStreamEnd {
        #[serde(rename = "fullResponse")]
        full_response: String,
    },
    LlmError {
        error: String,
    },
}
