use crate::http_client::build_http_client_with_timeout;
use crate::scrub::scrub_secret_patterns;
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

pub type MarkupFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

/// Supplies the raw HTML of a page for local readability extraction.
///
/// `None` means the markup is not available (yet); callers report the page
/// as still loading.
pub trait MarkupSource: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> MarkupFuture<'a>;
}

/// Fetches markup over HTTP with a bounded total timeout.
pub struct HttpMarkupSource {
    client: Client,
}

impl HttpMarkupSource {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Self {
        Self {
            client: build_http_client_with_timeout(timeout_secs, user_agent),
        }
    }
}

impl MarkupSource for HttpMarkupSource {
    fn fetch<'a>(&'a self, url: &'a str) -> MarkupFuture<'a> {
        Box::pin(async move {
            let response = match self.client.get(url).send().await {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(%url, error = %scrub_secret_patterns(&error.to_string()), "markup fetch failed");
                    return None;
                }
            };

            if !response.status().is_success() {
                tracing::warn!(%url, status = %response.status(), "markup fetch returned an error status");
                return None;
            }

            let is_html = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_none_or(|ct| ct.contains("html"));
            if !is_html {
                tracing::debug!(%url, "page is not HTML, no markup to parse");
                return None;
            }

            response
                .text()
                .await
                .map_err(|error| tracing::warn!(%url, %error, "markup body unreadable"))
                .ok()
                .filter(|body| !body.trim().is_empty())
        })
    }
}

/// Fixed url → markup table, for tests and for markup supplied up front.
#[derive(Debug, Default)]
pub struct StaticMarkupSource {
    pages: HashMap<String, String>,
}

impl StaticMarkupSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, markup: impl Into<String>) -> Self {
        self.pages.insert(url.into(), markup.into());
        self
    }
}

impl MarkupSource for StaticMarkupSource {
    fn fetch<'a>(&'a self, url: &'a str) -> MarkupFuture<'a> {
        Box::pin(async move { self.pages.get(url).cloned() })
    }
}
