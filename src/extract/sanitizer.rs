//! Isolated HTML sanitizing worker.
//!
//! Parsing untrusted page markup happens on a dedicated task that owns the
//! blocking parse; callers only ever exchange plain request/response values
//! with it.

use super::readability::extract_article;
use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{OnceCell, mpsc, oneshot};

const QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizeRequest {
    pub raw_markup: String,
    pub page_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SanitizeResponse {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(content.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<String, ExtractionError> {
        match (self.success, self.content) {
            (true, Some(content)) => Ok(content),
            _ => Err(ExtractionError::failed(
                self.error
                    .unwrap_or_else(|| "Sanitizer returned no content".to_string()),
            )),
        }
    }
}

pub type SanitizeFuture<'a> = Pin<Box<dyn Future<Output = SanitizeResponse> + Send + 'a>>;

/// Turns raw page markup into article Markdown.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, request: SanitizeRequest) -> SanitizeFuture<'_>;
}

/// Parse and convert in the current thread.
pub fn sanitize_markup(request: &SanitizeRequest) -> SanitizeResponse {
    match extract_article(&request.raw_markup) {
        Ok(content) => SanitizeResponse::ok(content),
        Err(error) => {
            tracing::debug!(url = %request.page_url, %error, "sanitizer found no article");
            SanitizeResponse::failure(error.to_string())
        }
    }
}

type Job = (SanitizeRequest, oneshot::Sender<SanitizeResponse>);

/// Owns the sanitizer worker. The worker is spawned on the first request and
/// reused afterwards; it exits once the host is dropped.
#[derive(Default)]
pub struct SanitizerHost {
    worker: OnceCell<mpsc::Sender<Job>>,
}

impl SanitizerHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.worker.initialized()
    }

    async fn sender(&self) -> &mpsc::Sender<Job> {
        self.worker
            .get_or_init(|| async {
                let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
                tokio::spawn(run_worker(rx));
                tracing::debug!("sanitizer worker started");
                tx
            })
            .await
    }
}

impl Sanitizer for SanitizerHost {
    fn sanitize(&self, request: SanitizeRequest) -> SanitizeFuture<'_> {
        Box::pin(async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            if self.sender().await.send((request, reply_tx)).await.is_err() {
                return SanitizeResponse::failure("Sanitizer worker is not running");
            }
            reply_rx.await.unwrap_or_else(|_| {
                SanitizeResponse::failure("Sanitizer worker dropped the request")
            })
        })
    }
}

async fn run_worker(mut rx: mpsc::Receiver<Job>) {
    while let Some((request, reply)) = rx.recv().await {
        let response = tokio::task::spawn_blocking(move || sanitize_markup(&request))
            .await
            .unwrap_or_else(|e| SanitizeResponse::failure(format!("Sanitizer crashed: {e}")));
        // The requester may have given up; nothing to deliver to then.
        let _ = reply.send(response);
    }
    tracing::debug!("sanitizer worker stopped");
}
