use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::harness::{ARTICLE_HTML, ARTICLE_URL, Workspace};
use readbot::config::Config;
use readbot::coordinator::{OutboundEvent, Request, Response, StaticMarkupSource};
use readbot::types::{ChatMessage, Role};

fn sse_body(deltas: &[&str]) -> String {
    let mut body: String = deltas
        .iter()
        .map(|delta| {
            let frame = json!({"choices": [{"delta": {"content": delta}}]});
            format!("data: {frame}\n\n")
        })
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

async fn openai_workspace(server: &MockServer) -> Workspace {
    let mut config = Config::default();
    config.llm.providers.openai.api_key = "sk-integration".into();
    config.llm.providers.openai.base_url = server.uri();
    Workspace::with_config(config, StaticMarkupSource::new().with_page(ARTICLE_URL, ARTICLE_HTML))
        .await
}

async fn await_end(events: &mut broadcast::Receiver<OutboundEvent>) -> OutboundEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no terminal event")
            .expect("event channel closed");
        if !matches!(event, OutboundEvent::LlmStreamChunk { .. }) {
            return event;
        }
    }
}

fn ask(content: &str, messages: Vec<ChatMessage>) -> Request {
    serde_json::from_value(json!({
        "type": "SEND_LLM_MESSAGE",
        "payload": {
            "messages": messages,
            "systemPromptTemplate": "Answer from this page:\n{CONTENT}",
            "extractedPageContent": content,
            "currentUrl": ARTICLE_URL
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn follow_up_questions_accumulate_chat_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-integration"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Memory ", "safety."]), "text/event-stream"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let ws = openai_workspace(&server).await;
    let Response::PageDataLoaded { data } = ws
        .coordinator
        .handle(Request::GetPageData {
            url: ARTICLE_URL.into(),
            markup: None,
        })
        .await
    else {
        panic!("page should load through the markup source");
    };

    let mut events = ws.coordinator.subscribe();
    let first = ask(&data.content, vec![ChatMessage::user("What does Rust give you?")]);
    assert_eq!(ws.coordinator.handle(first).await, Response::LlmRequestReceived);
    assert_eq!(
        await_end(&mut events).await,
        OutboundEvent::LlmStreamEnd {
            full_response: "Memory safety.".into()
        }
    );

    let Response::PageDataLoaded { data } = ws
        .coordinator
        .handle(Request::GetPageData {
            url: ARTICLE_URL.into(),
            markup: None,
        })
        .await
    else {
        panic!("page should still be cached");
    };
    assert_eq!(data.chat_history.len(), 2);

    let mut history = data.chat_history.clone();
    history.push(ChatMessage::user("Say it again?"));
    assert_eq!(
        ws.coordinator.handle(ask(&data.content, history)).await,
        Response::LlmRequestReceived
    );
    await_end(&mut events).await;

    let record = ws.coordinator.cache().get(ARTICLE_URL).await.unwrap().unwrap();
    let roles: Vec<Role> = record.chat_history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(record.chat_history[2].content, "Say it again?");
    assert_eq!(record.content, data.content);

    let requests = server.received_requests().await.unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    // system prompt plus three turns
    assert_eq!(second["messages"].as_array().unwrap().len(), 4);
    assert_eq!(second["messages"][0]["role"], "system");
    assert!(
        second["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("memory safety")
    );
}

#[tokio::test]
async fn clearing_a_page_drops_its_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let ws = openai_workspace(&server).await;
    let mut events = ws.coordinator.subscribe();
    ws.coordinator
        .handle(ask("page text", vec![ChatMessage::user("hi")]))
        .await;
    await_end(&mut events).await;
    assert!(ws.coordinator.cache().get(ARTICLE_URL).await.unwrap().is_some());

    let cleared = ws
        .coordinator
        .handle(Request::ClearUrlData {
            url: ARTICLE_URL.into(),
        })
        .await;
    assert!(matches!(cleared, Response::ClearResult { success: true, .. }));
    assert!(ws.coordinator.cache().get(ARTICLE_URL).await.unwrap().is_none());
}
