//! Page content extraction.
//!
//! Three interchangeable methods share one entry point: local readability
//! parsing through the sanitizer worker, the Jina Reader service, and a
//! user-configured download API.

pub mod download;
pub mod jina;
pub mod markdown;
pub mod readability;
pub mod sanitizer;

pub use download::DownloadApiClient;
pub use jina::JinaClient;
pub use sanitizer::{SanitizeRequest, SanitizeResponse, Sanitizer, SanitizerHost};

use crate::error::ExtractionError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ExtractionMethod {
    #[default]
    Readability,
    Jina,
    DownloadApi,
}

impl FromStr for ExtractionMethod {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "readability" => Ok(Self::Readability),
            "jina" => Ok(Self::Jina),
            "downloadApi" | "download_api" => Ok(Self::DownloadApi),
            other => Err(ExtractionError::failed(format!(
                "Unknown extraction method: {other}"
            ))),
        }
    }
}

/// Credentials and endpoints the remote methods need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub jina_api_key: Option<String>,
    pub download_api_endpoint: Option<String>,
}

pub struct ExtractionRouter {
    sanitizer: Arc<dyn Sanitizer>,
    jina: JinaClient,
    download: DownloadApiClient,
}

impl ExtractionRouter {
    pub fn new(sanitizer: Arc<dyn Sanitizer>, jina: JinaClient, download: DownloadApiClient) -> Self {
        Self {
            sanitizer,
            jina,
            download,
        }
    }

    /// Router with the lazily started sanitizer worker and the public Jina
    /// endpoints.
    pub fn with_defaults(client: Client) -> Self {
        Self::new(
            Arc::new(SanitizerHost::new()),
            JinaClient::new(client.clone()),
            DownloadApiClient::new(client),
        )
    }

    pub async fn extract(
        &self,
        url: &str,
        raw_markup: Option<&str>,
        method: ExtractionMethod,
        settings: &ExtractionSettings,
    ) -> Result<String, ExtractionError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ExtractionError::failed("URL is required"));
        }
        tracing::debug!(%url, %method, "extracting page content");

        match method {
            ExtractionMethod::Readability => {
                let Some(raw_markup) = raw_markup.filter(|m| !m.trim().is_empty()) else {
                    return Err(ExtractionError::PageNotReady);
                };
                self.sanitizer
                    .sanitize(SanitizeRequest {
                        raw_markup: raw_markup.to_string(),
                        page_url: url.to_string(),
                    })
                    .await
                    .into_result()
                    .map_err(|e| {
                        ExtractionError::failed(format!(
                            "Failed to extract content with Readability: {e}"
                        ))
                    })
            }
            ExtractionMethod::Jina => {
                let Some(api_key) = non_blank(settings.jina_api_key.as_deref()) else {
                    return Err(ExtractionError::missing("Jina AI API key is required"));
                };
                self.jina.extract(url, api_key).await
            }
            ExtractionMethod::DownloadApi => {
                let Some(endpoint) = non_blank(settings.download_api_endpoint.as_deref()) else {
                    return Err(ExtractionError::missing("Download API endpoint is required"));
                };
                self.download.extract(url, endpoint).await
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
