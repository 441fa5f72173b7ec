//! Axum HTTP surface for the coordinator.
//!
//! - `POST /message` carries one tagged request and returns its response
//! - `GET /events` streams outbound chat events as server-sent events
//! - `GET /health` is always public

mod handlers;
mod server;

pub use server::{build_app, run_gateway, run_gateway_with_listener};

use crate::coordinator::Coordinator;
use std::sync::Arc;

/// Maximum request body size (2 MiB). Page markup travels in the body.
pub const MAX_BODY_SIZE: usize = 65_536 * 32;
/// Request timeout for `/message` (30s). The event stream is exempt.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}
