use super::AppState;
use crate::coordinator::OutboundEvent;
use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{
        IntoResponse, Json,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::Stream;
use serde_json::Value;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// GET /health
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /message: one inbound request, one response
pub(super) async fn handle_message(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let Json(value) = match body {
        Ok(body) => body,
        Err(e) => {
            let err = serde_json::json!({
                "type": "ERROR",
                "error": format!("Invalid JSON: {e}"),
            });
            return (StatusCode::BAD_REQUEST, Json(err));
        }
    };

    let response = state.coordinator.handle_json(value).await;
    match serde_json::to_value(&response) {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response");
            let err = serde_json::json!({"type": "ERROR", "error": e.to_string()});
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err))
        }
    }
}

/// GET /events: outbound chat events, one JSON object per `data:` line
pub(super) async fn handle_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = BroadcastStream::new(state.coordinator.subscribe()).filter_map(|event| {
        match event {
            Ok(event) => Some(encode_event(&event)),
            Err(lagged) => {
                tracing::warn!(error = %lagged, "event listener fell behind, events dropped");
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

fn encode_event(event: &OutboundEvent) -> Result<Event, axum::Error> {
    Event::default().json_data(event)
}
