use super::handlers::{handle_events, handle_health, handle_message};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};

use crate::config::GatewayConfig;
use crate::coordinator::Coordinator;
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Returns true when the bind address is not a loopback address.
fn is_public_bind(host: &str) -> bool {
    !matches!(
        host,
        "127.0.0.1" | "localhost" | "::1" | "[::1]" | "0:0:0:0:0:0:0:1"
    )
}

/// Bind and run the HTTP gateway until ctrl-c.
pub async fn run_gateway(
    host: &str,
    port: u16,
    coordinator: Arc<Coordinator>,
    gateway: &GatewayConfig,
) -> Result<()> {
    if is_public_bind(host) && !gateway.allow_public_bind {
        anyhow::bail!(
            "Refusing to bind to {host}: the gateway would be reachable from other machines.\n\
             Fix: use --host 127.0.0.1 (default), or set\n\
             [gateway] allow_public_bind = true in config.toml."
        );
    }

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("bind gateway socket {host}:{port}"))?;

    run_gateway_with_listener(host, listener, coordinator, &gateway.cors_origins).await
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    coordinator: Arc<Coordinator>,
    cors_origins: &[String],
) -> Result<()> {
    let actual_port = listener
        .local_addr()
        .context("get gateway listener local address")?
        .port();
    let display_addr = format!("{host}:{actual_port}");

    print_gateway_banner(&display_addr);
    tracing::info!(addr = %display_addr, "gateway listening");

    let app = build_app(AppState { coordinator }, cors_origins);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve HTTP gateway")?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn print_gateway_banner(display_addr: &str) {
    println!("Gateway listening on {display_addr}");
    println!("  POST /message");
    println!("  GET  /events -> server-sent events");
    println!("  GET  /health");
    println!("  Press Ctrl+C to stop");
}

pub fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    // The event stream is long-lived, so only `/message` gets the timeout.
    let messages = Router::new()
        .route("/message", post(handle_message))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ));

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/events", get(handle_events))
        .merge(messages)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE));

    if cors_origins.is_empty() {
        return app.layer(CorsLayer::permissive());
    }

    let origins: Vec<_> = cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
    app.layer(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]),
    )
}
