//! Web server module for handling Tito webhooks.
//!
//! This module provides:
//! - `POST /ticket`: signed Tito deliveries, synced to the enabled integrations
//! - `GET /health`: liveness probe

pub mod handlers;
pub mod signature;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, ticket_webhook, AppState, ErrorResponse, HealthResponse, WebhookError};
pub use signature::{sign_body, verify_tito_signature, SIGNATURE_HEADER};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/ticket", post(ticket_webhook))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
