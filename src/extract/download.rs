use crate::error::ExtractionError;
use crate::scrub::{failed_response, scrub_secret_patterns};
use reqwest::Client;

/// User-configured download service: `GET {endpoint}?url=<page url>`
/// answering with the page content as plain text.
pub struct DownloadApiClient {
    client: Client,
}

impl DownloadApiClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn extract(&self, url: &str, endpoint: &str) -> Result<String, ExtractionError> {
        let response = self
            .client
            .get(endpoint)
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| ExtractionError::Transport(scrub_secret_patterns(&e.to_string()).into_owned()))?;

        if !response.status().is_success() {
            let (status, message) = failed_response(response).await;
            return Err(ExtractionError::failed(format!(
                "Failed to extract content with Download API: {status} {message}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))
    }
}
