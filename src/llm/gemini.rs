use super::ChatRequest;
use super::gemini_types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part,
};
use super::image::parse_data_url;
use super::sse::Frame;
use crate::error::LlmError;
use crate::scrub::sanitize_api_error;
use crate::types::Role;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model reply seeded after the system prompt, which Gemini receives as an
/// ordinary user turn.
pub const SEEDED_ACKNOWLEDGEMENT: &str = "I understand. I will analyze the provided content.";

pub fn supports_vision(model: &str) -> bool {
    model.contains("vision")
}

/// `generateContent` endpoint; the key and `alt` query pairs are added by
/// the caller.
pub(super) fn generate_url(base_url: &str, model: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/v1beta/models/{model}:generateContent")
}

pub(super) fn build_request(
    request: &ChatRequest,
    model: &str,
) -> Result<GenerateContentRequest, LlmError> {
    let mut contents = Vec::with_capacity(request.messages.len() + 2);

    if !request.system_prompt.is_empty() {
        contents.push(Content {
            role: "user",
            parts: vec![Part::Text {
                text: request.system_prompt.clone(),
            }],
        });
        contents.push(Content {
            role: "model",
            parts: vec![Part::Text {
                text: SEEDED_ACKNOWLEDGEMENT.to_string(),
            }],
        });
    }

    let image = match request.image.as_deref() {
        Some(url) if supports_vision(model) => Some(parse_data_url(url)?),
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
            Role::Assistant => "model",
        };

        let parts = match &image {
            Some(image) if index == last && message.role == Role::User => {
                let mut parts = Vec::with_capacity(2);
                if !message.content.is_empty() {
                    parts.push(Part::Text {
                        text: message.content.clone(),
                    });
                }
                parts.push(Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type.to_string(),
                        data: image.data.to_string(),
                    },
                });
                parts
            }
            _ => vec![Part::Text {
                text: message.content.clone(),
            }],
        };
        contents.push(Content { role, parts });
    }

    Ok(GenerateContentRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 8192,
        },
    })
}

pub(super) fn decode_frame(payload: &str) -> Frame {
    let response: GenerateContentResponse = match serde_json::from_str(payload) {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(%error, "skipping malformed Gemini stream event");
            return Frame::Skip;
        }
    };

    if let Some(error) = response.error.as_ref() {
        return Frame::Failed(sanitize_api_error(&error.message));
    }

    response
        .first_text()
        .filter(|text| !text.is_empty())
        .map_or(Frame::Skip, Frame::Delta)
}

pub(super) fn response_text(body: &str) -> Option<String> {
    serde_json::from_str::<GenerateContentResponse>(body)
        .ok()?
        .first_text()
}
