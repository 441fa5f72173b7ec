//! Message dispatch between the UI and the cache, extraction and LLM
//! collaborators.
//!
//! Every inbound [`Request`] gets exactly one [`Response`]. Chat answers are
//! not part of the response: they stream to subscribers as
//! [`OutboundEvent`]s from a task spawned per request.

pub mod markup;
pub mod messages;

pub use markup::{HttpMarkupSource, MarkupSource, StaticMarkupSource};
pub use messages::{LlmPayload, OutboundEvent, Request, Response};

use crate::cache::PageCache;
use crate::config::{Config, ConfigStore};
use crate::error::{ExtractionError, LlmError};
use crate::extract::{ExtractionMethod, ExtractionRouter};
use crate::llm::{ChatEvent, ChatRequest, Delivery, LlmClient, render_system_prompt};
use crate::types::{ChatMessage, PageRecord, Role};
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct Coordinator {
    cache: Arc<PageCache>,
    router: Arc<ExtractionRouter>,
    llm: Arc<LlmClient>,
    config: Arc<dyn ConfigStore>,
    markup: Arc<dyn MarkupSource>,
    events: broadcast::Sender<OutboundEvent>,
}

impl Coordinator {
    pub fn new(
        cache: Arc<PageCache>,
        router: Arc<ExtractionRouter>,
        llm: Arc<LlmClient>,
        config: Arc<dyn ConfigStore>,
        markup: Arc<dyn MarkupSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            cache,
            router,
            llm,
            config,
            markup,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.events.subscribe()
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Parse and handle a raw JSON message.
    pub async fn handle_json(self: &Arc<Self>, value: Value) -> Response {
        match Request::from_value(value) {
            Ok(request) => self.handle(request).await,
            Err(response) => response,
        }
    }

    /// Handle one request on its own task, so a panic while handling it
    /// still produces a reply.
    pub async fn handle(self: &Arc<Self>, request: Request) -> Response {
        let this = Arc::clone(self);
        match tokio::spawn(async move { this.dispatch(request).await }).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(%error, "request handler failed");
                Response::Error {
                    error: format!("Unknown error in request handler: {error}"),
                }
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::GetPageData { url, markup } => self.get_page_data(&url, markup).await,
            Request::ReExtractContent {
                url,
                method,
                markup,
            } => self.re_extract(&url, &method, markup).await,
            Request::SendLlmMessage { payload } => {
                self.send_llm_message(payload, Delivery::Streaming).await
            }
            Request::ClearUrlData { url } => self.clear_url(&url).await,
            Request::ClearAllData => match self.cache.clear_all().await {
                Ok(()) => clear_result(Ok(())),
                Err(error) => clear_result(Err(error.to_string())),
            },
            Request::GetConfig => match self.config.load().await {
                Ok(config) => Response::ConfigLoaded {
                    config: Box::new(config),
                },
                Err(error) => Response::Error {
                    error: error.to_string(),
                },
            },
            Request::SaveConfig { config } => self.save_config(config).await,
            Request::ResetConfig => match self.config.reset().await {
                Ok(()) => Response::ConfigReset,
                Err(error) => Response::Error {
                    error: error.to_string(),
                },
            },
        }
    }

    /// Cached record for `url`; a cache failure counts as a miss.
    async fn cached(&self, url: &str) -> Option<PageRecord> {
        match self.cache.get(url).await {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%url, %error, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, url: &str, record: &PageRecord) {
        if let Err(error) = self.cache.put(url, record).await {
            tracing::warn!(%url, %error, "cache write failed");
        }
    }

    async fn get_page_data(&self, url: &str, markup: Option<String>) -> Response {
        if url.trim().is_empty() {
            return Response::PageDataError {
                error: "URL is required".into(),
            };
        }

        if let Some(data) = self.cached(url).await {
            tracing::debug!(%url, "page data served from cache");
            return Response::PageDataLoaded { data };
        }

        let config = match self.config.load().await {
            Ok(config) => config,
            Err(error) => {
                return Response::PageDataError {
                    error: error.to_string(),
                };
            }
        };

        match self
            .extract(url, config.default_extraction_method, markup, &config)
            .await
        {
            Ok(content) => {
                let data = PageRecord::new(content);
                self.store(url, &data).await;
                Response::PageDataLoaded { data }
            }
            Err(error) => Response::PageDataError {
                error: error.to_string(),
            },
        }
    }

    async fn re_extract(&self, url: &str, method: &str, markup: Option<String>) -> Response {
        let method = match method.parse::<ExtractionMethod>() {
            Ok(method) => method,
            Err(error) => {
                return Response::ContentUpdateError {
                    error: error.to_string(),
                };
            }
        };
        let config = match self.config.load().await {
            Ok(config) => config,
            Err(error) => {
                return Response::ContentUpdateError {
                    error: error.to_string(),
                };
            }
        };

        match self.extract(url, method, markup, &config).await {
            Ok(content) => {
                let mut record = self.cached(url).await.unwrap_or_default();
                record.content.clone_from(&content);
                self.store(url, &record).await;
                Response::ContentUpdated { content }
            }
            Err(error) => Response::ContentUpdateError {
                error: error.to_string(),
            },
        }
    }

    async fn extract(
        &self,
        url: &str,
        method: ExtractionMethod,
        markup: Option<String>,
        config: &Config,
    ) -> Result<String, ExtractionError> {
        let markup = match (method, markup) {
            (ExtractionMethod::Readability, None) => self.markup.fetch(url.trim()).await,
            (_, markup) => markup,
        };
        self.router
            .extract(url, markup.as_deref(), method, &config.extraction_settings())
            .await
    }

    /// Validate a chat request and start answering it in the background.
    ///
    /// The answer arrives as [`OutboundEvent`]s; with [`Delivery::Atomic`]
    /// there are no chunk events, only the final one.
    pub async fn send_llm_message(&self, payload: LlmPayload, delivery: Delivery) -> Response {
        let Some(last_user) = payload
            .messages
            .last()
            .filter(|message| message.role == Role::User)
            .map(|message| message.content.clone())
        else {
            return Response::LlmError {
                error: "The last message must come from the user".into(),
            };
        };
        if payload.current_url.trim().is_empty() {
            return Response::LlmError {
                error: "URL is required".into(),
            };
        }

        let config = match self.config.load().await {
            Ok(config) => config,
            Err(error) => {
                return Response::LlmError {
                    error: error.to_string(),
                };
            }
        };

        let template = payload
            .system_prompt_template
            .as_deref()
            .unwrap_or(&config.system_prompt);
        let request = ChatRequest {
            system_prompt: render_system_prompt(template, &payload.extracted_page_content),
            messages: payload.messages,
            image: payload.image_base64,
        };
        let stream = self
            .llm
            .chat(request, &config.provider_config(), delivery);

        let exchange = Exchange {
            cache: Arc::clone(&self.cache),
            events: self.events.clone(),
            url: payload.current_url,
            page_content: payload.extracted_page_content,
            user_message: last_user,
        };
        tokio::spawn(exchange.relay(stream));

        Response::LlmRequestReceived
    }

    async fn clear_url(&self, url: &str) -> Response {
        if url.trim().is_empty() {
            return clear_result(Err("No URL provided".into()));
        }
        match self.cache.remove(url).await {
            Ok(()) => clear_result(Ok(())),
            Err(error) => clear_result(Err(error.to_string())),
        }
    }

    async fn save_config(&self, patch: Value) -> Response {
        let saved = async {
            let current = self.config.load_stored().await?;
            let merged = current.merge_json(patch)?;
            self.config.save(&merged).await?;
            anyhow::Ok(())
        };
        match saved.await {
            Ok(()) => Response::ConfigSaved,
            Err(error) => Response::Error {
                error: format!("{error:#}"),
            },
        }
    }
}

fn clear_result(outcome: Result<(), String>) -> Response {
    match outcome {
        Ok(()) => Response::ClearResult {
            success: true,
            error: None,
        },
        Err(error) => Response::ClearResult {
            success: false,
            error: Some(error),
        },
    }
}

/// One streamed question/answer pair and where to record it.
struct Exchange {
    cache: Arc<PageCache>,
    events: broadcast::Sender<OutboundEvent>,
    url: String,
    page_content: String,
    user_message: String,
}

impl Exchange {
    async fn relay(self, mut stream: crate::llm::ChatStream) {
        while let Some(event) = stream.next().await {
            match event {
                ChatEvent::Delta(chunk) => self.emit(OutboundEvent::LlmStreamChunk { chunk }),
                ChatEvent::Done(full_response) => {
                    self.record(&full_response).await;
                    self.emit(OutboundEvent::LlmStreamEnd { full_response });
                }
                ChatEvent::Error(error) => self.fail(&error),
            }
        }
    }

    /// Append the exchange to the page's chat history, creating the record
    /// from the supplied content when the page is not cached.
    async fn record(&self, full_response: &str) {
        let turns = [
            ChatMessage::user(self.user_message.clone()),
            ChatMessage::assistant(full_response),
        ];
        if let Err(error) = self
            .cache
            .append_chat(&self.url, &self.page_content, turns)
            .await
        {
            tracing::warn!(url = %self.url, %error, "failed to persist chat history");
        }
    }

    fn fail(&self, error: &LlmError) {
        tracing::warn!(url = %self.url, %error, "chat request failed");
        self.emit(OutboundEvent::LlmError {
            error: error.to_string(),
        });
    }

    fn emit(&self, event: OutboundEvent) {
        // No subscriber is fine: the answer is still recorded.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests;
