//! Chat completion client for the OpenAI-compatible and Gemini wire
//! protocols, delivering answers either whole or as a stream of deltas.

pub mod gemini;
mod gemini_types;
pub mod image;
pub mod openai;
mod openai_types;
pub mod prompt;
pub mod sse;
pub mod streaming;

pub use prompt::render_system_prompt;
pub use streaming::{ChatEvent, ChatStream};

use crate::error::LlmError;
use crate::scrub::{failed_response, scrub_secret_patterns};
use crate::types::ChatMessage;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use sse::{DONE_SENTINEL, Frame, SseBuffer, data_payload};
use std::str::FromStr;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// Human-facing provider name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Gemini => "Gemini",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            _ => Err(LlmError::UnsupportedProvider(s.trim().to_string())),
        }
    }
}

/// Settings of the provider a call goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    /// OpenAI only; defaults to `https://api.openai.com`.
    pub base_url: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Already rendered; empty means no system instruction.
    pub system_prompt: String,
    /// `data:` URL attached to the last user turn.
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Streaming,
    Atomic,
}

pub struct LlmClient {
    client: Client,
    gemini_base_url: String,
}

impl LlmClient {
    pub fn new(client: Client) -> Self {
        Self::with_gemini_base_url(client, gemini::DEFAULT_BASE_URL)
    }

    pub fn with_gemini_base_url(client: Client, gemini_base_url: impl Into<String>) -> Self {
        Self {
            client,
            gemini_base_url: gemini_base_url.into(),
        }
    }

    /// Start a chat call. Failures, including a missing API key, arrive as
    /// the stream's `Error` event.
    pub fn chat(&self, request: ChatRequest, config: &ProviderConfig, mode: Delivery) -> ChatStream {
        let provider = config.provider;
        let Some(api_key) = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            return ChatStream::failed(LlmError::MissingApiKey {
                provider: provider.label().to_string(),
            });
        };

        let builder = match self.prepare(&request, config, api_key, mode) {
            Ok(builder) => builder,
            Err(error) => return ChatStream::failed(error),
        };
        tracing::debug!(%provider, model = %config.model, ?mode, "sending chat request");

        match mode {
            Delivery::Streaming => ChatStream::new(streamed_events(builder, provider)),
            Delivery::Atomic => ChatStream::new(futures_util::stream::once(async move {
                match atomic_text(builder, provider).await {
                    Ok(text) => ChatEvent::Done(text),
                    Err(error) => ChatEvent::Error(error),
                }
            })),
        }
    }

    fn prepare(
        &self,
        request: &ChatRequest,
        config: &ProviderConfig,
        api_key: &str,
        mode: Delivery,
    ) -> Result<RequestBuilder, LlmError> {
        let streaming = mode == Delivery::Streaming;
        match config.provider {
            ProviderKind::OpenAi => {
                let body = openai::build_request(request, &config.model, streaming)?;
                Ok(self
                    .client
                    .post(openai::chat_url(config.base_url.as_deref()))
                    .bearer_auth(api_key)
                    .json(&body))
            }
            ProviderKind::Gemini => {
                let body = gemini::build_request(request, &config.model)?;
                let mut builder = self
                    .client
                    .post(gemini::generate_url(&self.gemini_base_url, &config.model))
                    .query(&[("key", api_key)]);
                if streaming {
                    builder = builder.query(&[("alt", "sse")]);
                }
                Ok(builder.json(&body))
            }
        }
    }
}

fn transport_error(provider: ProviderKind, error: reqwest::Error) -> LlmError {
    LlmError::Transport {
        provider: provider.label().to_string(),
        message: scrub_secret_patterns(&error.without_url().to_string()).into_owned(),
    }
}

async fn send(builder: RequestBuilder, provider: ProviderKind) -> Result<reqwest::Response, LlmError> {
    let response = builder
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !response.status().is_success() {
        let (status, message) = failed_response(response).await;
        return Err(LlmError::Status {
            provider: provider.label().to_string(),
            status,
            message,
        });
    }
    Ok(response)
}

async fn atomic_text(builder: RequestBuilder, provider: ProviderKind) -> Result<String, LlmError> {
    let body = send(builder, provider)
        .await?
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let text = match provider {
        ProviderKind::OpenAi => openai::response_text(&body),
        ProviderKind::Gemini => gemini::response_text(&body),
    };
    text.ok_or_else(|| LlmError::EmptyResponse {
        provider: provider.label().to_string(),
    })
}

fn decode_frame(provider: ProviderKind, payload: &str) -> Frame {
    match provider {
        ProviderKind::OpenAi => openai::decode_frame(payload),
        ProviderKind::Gemini => gemini::decode_frame(payload),
    }
}

fn streamed_events(
    builder: RequestBuilder,
    provider: ProviderKind,
) -> impl futures_util::Stream<Item = ChatEvent> + Send + 'static {
    async_stream::stream! {
        let response = match send(builder, provider).await {
            Ok(response) => response,
            Err(error) => {
                yield ChatEvent::Error(error);
                return;
            }
        };

        let mut byte_stream = response.bytes_stream();
        let mut buffer = SseBuffer::new();
        let mut full_text = String::new();
        let mut transport_done = false;

        while !transport_done {
            match byte_stream.next().await {
                Some(Ok(chunk)) => buffer.push_chunk(&chunk),
                Some(Err(error)) => {
                    yield ChatEvent::Error(transport_error(provider, error));
                    return;
                }
                None => {
                    // Flush a final line that lacks its newline.
                    buffer.push_chunk(b"\n");
                    transport_done = true;
                }
            }

            while let Some(line) = buffer.next_line() {
                let Some(payload) = data_payload(&line) else {
                    continue;
                };
                if payload == DONE_SENTINEL {
                    yield ChatEvent::Done(full_text);
                    return;
                }
                if payload.is_empty() {
                    continue;
                }
                match decode_frame(provider, payload) {
                    Frame::Delta(text) => {
                        full_text.push_str(&text);
                        yield ChatEvent::Delta(text);
                    }
                    Frame::Skip => {}
                    Frame::Failed(message) => {
                        yield ChatEvent::Error(LlmError::Status {
                            provider: provider.label().to_string(),
                            status: 200,
                            message,
                        });
                        return;
                    }
                }
            }
        }

        yield ChatEvent::Done(full_text);
    }
}
