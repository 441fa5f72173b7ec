use crate::error::ExtractionError;
use crate::scrub::{failed_response, scrub_secret_patterns};
use reqwest::Client;
use serde_json::{Value, json};
use url::Url;

pub const JINA_READER_BASE: &str = "https://r.jina.ai/";
pub const JINA_SEARCH_BASE: &str = "https://s.jina.ai/";

/// Jina Reader client: a GET against the reader endpoint, falling back once
/// to a POST against the search endpoint.
pub struct JinaClient {
    client: Client,
    reader_base: String,
    search_base: String,
}

impl JinaClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_urls(client, JINA_READER_BASE, JINA_SEARCH_BASE)
    }

    pub fn with_base_urls(
        client: Client,
        reader_base: impl Into<String>,
        search_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            reader_base: reader_base.into(),
            search_base: search_base.into(),
        }
    }

    pub async fn extract(&self, url: &str, api_key: &str) -> Result<String, ExtractionError> {
        let primary_error = match self.fetch_reader(url, api_key).await {
            Ok(content) => return Ok(content),
            Err(error) => error,
        };
        tracing::warn!(%url, error = %primary_error, "jina reader failed, trying fallback endpoint");

        self.fetch_search(url, api_key).await.map_err(|fallback_error| {
            ExtractionError::failed(format!(
                "Failed to extract content with Jina AI: {primary_error}; fallback: {fallback_error}"
            ))
        })
    }

    async fn fetch_reader(&self, url: &str, api_key: &str) -> Result<String, String> {
        let endpoint = reader_url(&self.reader_base, url)?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| scrub_secret_patterns(&e.to_string()).into_owned())?;
        read_content(response).await
    }

    async fn fetch_search(&self, url: &str, api_key: &str) -> Result<String, String> {
        let response = self
            .client
            .post(&self.search_base)
            .header("x-api-key", api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(|e| scrub_secret_patterns(&e.to_string()).into_owned())?;
        read_content(response).await
    }
}

/// `{reader_base}{url}` with the page URL percent-encoded as a single path
/// segment.
fn reader_url(reader_base: &str, url: &str) -> Result<Url, String> {
    let mut endpoint =
        Url::parse(reader_base).map_err(|e| format!("invalid reader endpoint: {e}"))?;
    endpoint
        .path_segments_mut()
        .map_err(|()| "reader endpoint cannot take a path".to_string())?
        .pop_if_empty()
        .push(url);
    Ok(endpoint)
}

async fn read_content(response: reqwest::Response) -> Result<String, String> {
    if !response.status().is_success() {
        let (status, message) = failed_response(response).await;
        return Err(format!("HTTP {status}: {message}"));
    }
    let body: Value = response
        .json()
        .await
        .map_err(|e| format!("invalid response body: {e}"))?;
    content_field(&body)
        .map(str::to_string)
        .ok_or_else(|| "response has no content field".to_string())
}

fn content_field(body: &Value) -> Option<&str> {
    body.get("content")
        .or_else(|| body.get("data").and_then(|data| data.get("content")))
        .and_then(Value::as_str)
}
