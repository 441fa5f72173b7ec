use crate::error::LlmError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decoded view of a `data:<mime>;base64,<payload>` image attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

/// Split a base64 data URL into MIME type and payload, checking that the
/// payload really is base64.
pub fn parse_data_url(url: &str) -> Result<ImageData<'_>, LlmError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| LlmError::InvalidImage("expected a data: URL".into()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| LlmError::InvalidImage("data URL has no payload".into()))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| LlmError::InvalidImage("data URL is not base64 encoded".into()))?;

    if !mime_type.starts_with("image/") {
        return Err(LlmError::InvalidImage(format!(
            "unsupported media type {mime_type}"
        )));
    }
    STANDARD
        .decode(data)
        .map_err(|e| LlmError::InvalidImage(format!("payload is not valid base64: {e}")))?;

    Ok(ImageData { mime_type, data })
}
