use super::*;
use crate::cache::{DEFAULT_CAPACITY, KvStore, MemoryKvStore};
use crate::config::{FileConfigStore, MemoryConfigStore};
use crate::extract::{DownloadApiClient, JinaClient, Sanitizer, SanitizeRequest, SanitizeResponse};
use crate::extract::sanitizer::SanitizeFuture;
use crate::http_client::build_http_client;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sanitizer that counts calls and echoes a fixed article.
#[derive(Default)]
struct CountingSanitizer {
    calls: AtomicUsize,
}

impl Sanitizer for CountingSanitizer {
    fn sanitize(&self, request: SanitizeRequest) -> SanitizeFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            SanitizeResponse::ok(format!("# Article\n\n{} bytes", request.raw_markup.len()))
        })
    }
}

struct Harness {
    coordinator: Arc<Coordinator>,
    sanitizer: Arc<CountingSanitizer>,
    config: Arc<MemoryConfigStore>,
}

fn harness_with(config: Config, markup: StaticMarkupSource) -> Harness {
    let sanitizer = Arc::new(CountingSanitizer::default());
    let client = build_http_client();
    let router = ExtractionRouter::new(
        Arc::clone(&sanitizer) as Arc<dyn Sanitizer>,
        JinaClient::new(client.clone()),
        DownloadApiClient::new(client.clone()),
    );
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let config_store = Arc::new(MemoryConfigStore::new(config));
    let coordinator = Coordinator::new(
        Arc::new(PageCache::new(store, DEFAULT_CAPACITY)),
        Arc::new(router),
        Arc::new(LlmClient::new(client)),
        Arc::clone(&config_store) as Arc<dyn ConfigStore>,
        Arc::new(markup),
    );
    Harness {
        coordinator: Arc::new(coordinator),
        sanitizer,
        config: config_store,
    }
}

fn harness() -> Harness {
    harness_with(Config::default(), StaticMarkupSource::new())
}

fn openai_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.llm.providers.openai.api_key = "sk-test".into();
    config.llm.providers.openai.base_url = server.uri();
    config
}

fn chat_payload(url: &str, question: &str) -> LlmPayload {
    LlmPayload {
        messages: vec![ChatMessage::user(question)],
        system_prompt_template: Some("Page:\n{CONTENT}".into()),
        extracted_page_content: "page text".into(),
        image_base64: None,
        current_url: url.into(),
    }
}

async fn next_terminal(rx: &mut broadcast::Receiver<OutboundEvent>) -> (Vec<String>, OutboundEvent) {
    let mut chunks = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for stream event")
            .expect("event channel closed");
        match event {
            OutboundEvent::LlmStreamChunk { chunk } => chunks.push(chunk),
            terminal => return (chunks, terminal),
        }
    }
}

#[tokio::test]
async fn page_data_is_extracted_once_then_served_from_cache() {
    let h = harness();
    let request = Request::GetPageData {
        url: "https://example.com/a".into(),
        markup: Some("<p>hello</p>".into()),
    };

    let first = h.coordinator.handle(request.clone()).await;
    let second = h.coordinator.handle(request).await;

    let Response::PageDataLoaded { data } = &first else {
        panic!("expected PAGE_DATA_LOADED, got {first:?}");
    };
    assert_eq!(data.content, "# Article\n\n12 bytes");
    assert!(data.chat_history.is_empty());
    assert_eq!(first, second);
    assert_eq!(h.sanitizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_markup_reports_page_loading() {
    let h = harness();
    let response = h
        .coordinator
        .handle(Request::GetPageData {
            url: "https://example.com/a".into(),
            markup: None,
        })
        .await;
    assert_eq!(
        response,
        Response::PageDataError {
            error: "page_loading".into()
        }
    );
    assert!(h.coordinator.cache().recent_urls().await.unwrap().is_empty());
}

#[tokio::test]
async fn markup_source_supplies_missing_markup() {
    let h = harness_with(
        Config::default(),
        StaticMarkupSource::new().with_page("https://example.com/b", "<p>fetched</p>"),
    );
    let response = h
        .coordinator
        .handle(Request::GetPageData {
            url: "https://example.com/b".into(),
            markup: None,
        })
        .await;
    assert!(matches!(response, Response::PageDataLoaded { .. }));
}

#[tokio::test]
async fn extraction_errors_are_relayed_with_their_message() {
    let mut config = Config::default();
    config.default_extraction_method = ExtractionMethod::Jina;
    let h = harness_with(config, StaticMarkupSource::new());

    let response = h
        .coordinator
        .handle(Request::GetPageData {
            url: "https://example.com".into(),
            markup: None,
        })
        .await;
    assert_eq!(
        response,
        Response::PageDataError {
            error: "Jina AI API key is required".into()
        }
    );
}

#[tokio::test]
async fn re_extract_replaces_content_and_keeps_history() {
    let h = harness();
    let url = "https://example.com/a";
    let mut record = PageRecord::new("old");
    record.chat_history = vec![ChatMessage::user("q"), ChatMessage::assistant("a")];
    h.coordinator.cache().put(url, &record).await.unwrap();

    let response = h
        .coordinator
        .handle(Request::ReExtractContent {
            url: url.into(),
            method: "readability".into(),
            markup: Some("<p>new</p>".into()),
        })
        .await;

    assert_eq!(
        response,
        Response::ContentUpdated {
            content: "# Article\n\n10 bytes".into()
        }
    );
    let stored = h.coordinator.cache().get(url).await.unwrap().unwrap();
    assert_eq!(stored.content, "# Article\n\n10 bytes");
    assert_eq!(stored.chat_history, record.chat_history);
}

#[tokio::test]
async fn re_extract_rejects_unknown_method() {
    let h = harness();
    let response = h
        .coordinator
        .handle(Request::ReExtractContent {
            url: "https://example.com".into(),
            method: "ocr".into(),
            markup: None,
        })
        .await;
    assert_eq!(
        response,
        Response::ContentUpdateError {
            error: "Unknown extraction method: ocr".into()
        }
    );
}

#[tokio::test]
async fn streamed_answer_is_relayed_and_written_back() {
    let server = MockServer::start().await;
    let body = [
        json!({"choices": [{"delta": {"content": "Short "}}]}).to_string(),
        json!({"choices": [{"delta": {"content": "answer."}}]}).to_string(),
        "[DONE]".to_string(),
    ]
    .iter()
    .map(|line| format!("data: {line}\n\n"))
    .collect::<String>();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness_with(openai_config(&server), StaticMarkupSource::new());
    let mut events = h.coordinator.subscribe();
    let url = "https://example.com/chat";

    let response = h
        .coordinator
        .handle(Request::SendLlmMessage {
            payload: chat_payload(url, "Summarize"),
        })
        .await;
    assert_eq!(response, Response::LlmRequestReceived);

    let (chunks, terminal) = next_terminal(&mut events).await;
    assert_eq!(chunks, vec!["Short ", "answer."]);
    assert_eq!(
        terminal,
        OutboundEvent::LlmStreamEnd {
            full_response: "Short answer.".into()
        }
    );

    let record = h.coordinator.cache().get(url).await.unwrap().unwrap();
    assert_eq!(record.content, "page text");
    assert_eq!(
        record.chat_history,
        vec![
            ChatMessage::user("Summarize"),
            ChatMessage::assistant("Short answer.")
        ]
    );

    let sent: serde_json::Value =
        serde_json::from_slice(&server.received_requests().await.unwrap()[0].body).unwrap();
    assert_eq!(sent["messages"][0]["content"], "Page:\npage text");
}

#[tokio::test]
async fn atomic_answer_emits_only_the_final_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Whole answer."}}]
        })))
        .mount(&server)
        .await;

    let h = harness_with(openai_config(&server), StaticMarkupSource::new());
    let mut events = h.coordinator.subscribe();
    let url = "https://example.com/atomic";

    let response = h
        .coordinator
        .send_llm_message(chat_payload(url, "Summarize"), Delivery::Atomic)
        .await;
    assert_eq!(response, Response::LlmRequestReceived);

    let (chunks, terminal) = next_terminal(&mut events).await;
    assert!(chunks.is_empty());
    assert_eq!(
        terminal,
        OutboundEvent::LlmStreamEnd {
            full_response: "Whole answer.".into()
        }
    );
    let record = h.coordinator.cache().get(url).await.unwrap().unwrap();
    assert_eq!(record.chat_history.len(), 2);
}

#[tokio::test]
async fn failed_answer_emits_error_and_persists_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let h = harness_with(openai_config(&server), StaticMarkupSource::new());
    let mut events = h.coordinator.subscribe();
    let url = "https://example.com/chat";

    let response = h
        .coordinator
        .handle(Request::SendLlmMessage {
            payload: chat_payload(url, "Summarize"),
        })
        .await;
    assert_eq!(response, Response::LlmRequestReceived);

    let (chunks, terminal) = next_terminal(&mut events).await;
    assert!(chunks.is_empty());
    let OutboundEvent::LlmError { error } = terminal else {
        panic!("expected LLM_ERROR, got {terminal:?}");
    };
    assert!(error.contains("500"));
    assert!(h.coordinator.cache().get(url).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_api_key_surfaces_as_stream_error() {
    let h = harness();
    let mut events = h.coordinator.subscribe();
    let response = h
        .coordinator
        .handle(Request::SendLlmMessage {
            payload: chat_payload("https://example.com", "hi"),
        })
        .await;
    assert_eq!(response, Response::LlmRequestReceived);

    let (_, terminal) = next_terminal(&mut events).await;
    assert_eq!(
        terminal,
        OutboundEvent::LlmError {
            error: "OpenAI API key is required".into()
        }
    );
}

#[tokio::test]
async fn chat_without_trailing_user_message_is_rejected() {
    let h = harness();
    let mut payload = chat_payload("https://example.com", "hi");
    payload.messages.push(ChatMessage::assistant("already answered"));

    let response = h
        .coordinator
        .handle(Request::SendLlmMessage { payload })
        .await;
    assert!(matches!(response, Response::LlmError { .. }));
}

#[tokio::test]
async fn clear_url_data_removes_record() {
    let h = harness();
    h.coordinator
        .cache()
        .put("https://example.com/a", &PageRecord::new("x"))
        .await
        .unwrap();

    let response = h
        .coordinator
        .handle(Request::ClearUrlData {
            url: "https://example.com/a".into(),
        })
        .await;
    assert_eq!(
        response,
        Response::ClearResult {
            success: true,
            error: None
        }
    );
    assert!(h.coordinator.cache().get("https://example.com/a").await.unwrap().is_none());

    let empty = h
        .coordinator
        .handle(Request::ClearUrlData { url: String::new() })
        .await;
    assert_eq!(
        empty,
        Response::ClearResult {
            success: false,
            error: Some("No URL provided".into())
        }
    );
}

#[tokio::test]
async fn clear_all_data_empties_cache() {
    let h = harness();
    for n in 0..3 {
        h.coordinator
            .cache()
            .put(&format!("https://example.com/{n}"), &PageRecord::new("x"))
            .await
            .unwrap();
    }
    let response = h.coordinator.handle(Request::ClearAllData).await;
    assert!(matches!(response, Response::ClearResult { success: true, .. }));
    assert!(h.coordinator.cache().recent_urls().await.unwrap().is_empty());
}

#[tokio::test]
async fn config_save_merges_camel_case_patch_and_reset_restores_defaults() {
    let h = harness();
    let response = h
        .coordinator
        .handle(Request::SaveConfig {
            config: json!({"defaultExtractionMethod": "jina", "jinaApiKey": "jina_k"}),
        })
        .await;
    assert_eq!(response, Response::ConfigSaved);

    let Response::ConfigLoaded { config } = h.coordinator.handle(Request::GetConfig).await else {
        panic!("expected CONFIG_LOADED");
    };
    assert_eq!(config.default_extraction_method, ExtractionMethod::Jina);
    assert_eq!(config.jina_api_key, "jina_k");

    assert_eq!(
        h.coordinator.handle(Request::ResetConfig).await,
        Response::ConfigReset
    );
    assert_eq!(h.config.load().await.unwrap(), Config::default());
}

#[tokio::test]
async fn save_config_does_not_persist_environment_overrides() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config_store = Arc::new(FileConfigStore::with_env(
        tmp.path(),
        Arc::new(|key: &str| (key == "READBOT_API_KEY").then(|| "sk-from-env-only".to_string())),
    ));
    let client = build_http_client();
    let coordinator = Arc::new(Coordinator::new(
        Arc::new(PageCache::new(Arc::new(MemoryKvStore::new()), DEFAULT_CAPACITY)),
        Arc::new(ExtractionRouter::with_defaults(client.clone())),
        Arc::new(LlmClient::new(client)),
        Arc::clone(&config_store) as Arc<dyn ConfigStore>,
        Arc::new(StaticMarkupSource::new()),
    ));

    let response = coordinator
        .handle(Request::SaveConfig {
            config: json!({"systemPrompt": "Answer briefly.\n{CONTENT}"}),
        })
        .await;
    assert_eq!(response, Response::ConfigSaved);

    let on_disk = std::fs::read_to_string(tmp.path().join("config.toml")).unwrap();
    assert!(on_disk.contains("Answer briefly."));
    assert!(!on_disk.contains("sk-from-env-only"));

    // The override still applies to the effective configuration.
    let Response::ConfigLoaded { config } = coordinator.handle(Request::GetConfig).await else {
        panic!("expected CONFIG_LOADED");
    };
    assert_eq!(config.llm.providers.openai.api_key, "sk-from-env-only");
}

#[tokio::test]
async fn raw_messages_are_parsed_by_type() {
    let h = harness();

    let unknown = h.coordinator.handle_json(json!({"type": "TAB_CHANGED"})).await;
    assert_eq!(
        unknown,
        Response::UnknownMessage {
            error: "Unknown message type: TAB_CHANGED".into()
        }
    );

    let malformed = h.coordinator.handle_json(json!({"type": "GET_PAGE_DATA"})).await;
    assert!(matches!(malformed, Response::Error { .. }));

    let loaded = h
        .coordinator
        .handle_json(json!({"type": "GET_PAGE_DATA", "url": "https://example.com", "markup": "<p>x</p>"}))
        .await;
    assert!(matches!(loaded, Response::PageDataLoaded { .. }));
}

#[test]
fn wire_shapes_match_the_extension() {
    let response = Response::PageDataLoaded {
        data: PageRecord::new("c"),
    };
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"type": "PAGE_DATA_LOADED", "data": {"content": "c", "chatHistory": []}})
    );
    assert_eq!(
        serde_json::to_value(OutboundEvent::LlmStreamEnd {
            full_response: "x".into()
        })
        .unwrap(),
        json!({"type": "LLM_STREAM_END", "fullResponse": "x"})
    );
    assert_eq!(
        serde_json::to_value(Response::LlmRequestReceived).unwrap(),
        json!({"type": "LLM_REQUEST_RECEIVED"})
    );
    assert_eq!(
        serde_json::to_value(Response::ConfigReset).unwrap(),
        json!({"type": "CONFIG_RESET"})
    );

    let loaded = serde_json::to_value(Response::ConfigLoaded {
        config: Box::new(Config::default()),
    })
    .unwrap();
    assert_eq!(loaded["type"], "CONFIG_LOADED");
    assert_eq!(loaded["config"]["defaultExtractionMethod"], "readability");
    assert_eq!(loaded["config"]["jinaApiKey"], "");
    assert_eq!(loaded["config"]["downloadApiEndpoint"], "");
    assert_eq!(loaded["config"]["llm"]["defaultProvider"], "openai");
    assert_eq!(loaded["config"]["llm"]["providers"]["openai"]["apiKey"], "");
    assert_eq!(loaded["config"]["llm"]["providers"]["gemini"]["model"], "gemini-pro");
    assert_eq!(loaded["config"]["quickInputs"][1]["sendText"], "Extract key points from this content:\n{CONTENT}");
    assert!(loaded["config"]["systemPrompt"].is_string());

    let request: Request = serde_json::from_value(json!({
        "type": "SEND_LLM_MESSAGE",
        "payload": {
            "messages": [{"role": "user", "content": "hi"}],
            "systemPromptTemplate": "{CONTENT}",
            "extractedPageContent": "c",
            "imageBase64": null,
            "currentUrl": "https://example.com"
        }
    }))
    .unwrap();
    let Request::SendLlmMessage { payload } = request else {
        panic!("wrong variant");
    };
    assert_eq!(payload.current_url, "https://example.com");
    assert_eq!(payload.system_prompt_template.as_deref(), Some("{CONTENT}"));
}
