use super::ChatRequest;
use super::image::parse_data_url;
use super::openai_types::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ContentPart, ImageUrl, Message,
    MessageContent,
};
use super::sse::Frame;
use crate::error::LlmError;
use crate::scrub::sanitize_api_error;
use crate::types::Role;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const VISION_MODELS: [&str; 3] = ["gpt-4-vision-preview", "gpt-4o", "gpt-4o-mini"];
const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 4000;

pub fn supports_vision(model: &str) -> bool {
    VISION_MODELS.contains(&model)
}

pub(super) fn chat_url(base_url: Option<&str>) -> String {
    let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
    format!("{base}/v1/chat/completions")
}

pub(super) fn build_request(
    request: &ChatRequest,
    model: &str,
    stream: bool,
) -> Result<ChatCompletionRequest, LlmError> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if !request.system_prompt.is_empty() {
        messages.push(Message {
            role: "system",
            content: MessageContent::Text(request.system_prompt.clone()),
        });
    }

    let image = match request.image.as_deref() {
        Some(url) if supports_vision(model) => Some(url),
        Some(_) => {
            tracing::debug!(%model, "model has no vision support, image dropped");
            None
        }
        None => None,
    };

    let last = request.messages.len().saturating_sub(1);
    for (index, message) in request.messages.iter().enumerate() {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let content = match image {
            Some(url) if index == last && message.role == Role::User => {
                parse_data_url(url)?;
                MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: message.content.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: url.to_string(),
                            detail: "auto",
                        },
                    },
                ])
            }
            _ => MessageContent::Text(message.content.clone()),
        };
        messages.push(Message { role, content });
    }

    Ok(ChatCompletionRequest {
        model: model.to_string(),
        messages,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        stream,
    })
}

pub(super) fn decode_frame(payload: &str) -> Frame {
    let chunk: ChatCompletionChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(error) => {
            tracing::warn!(%error, "skipping malformed OpenAI stream event");
            return Frame::Skip;
        }
    };

    if let Some(error) = chunk.error {
        return Frame::Failed(sanitize_api_error(&error.message));
    }

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
        .map_or(Frame::Skip, Frame::Delta)
}

pub(super) fn response_text(body: &str) -> Option<String> {
    let completion: ChatCompletion = serde_json::from_str(body).ok()?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}
