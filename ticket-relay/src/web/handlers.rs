//! Webhook endpoint handlers.
//!
//! A delivery goes through:
//! 1. Signature check over the raw body (401 on failure)
//! 2. JSON parse (400 on failure)
//! 3. Sequential fan-out of each ticket to the enabled integrations
//! 4. 200 with the parsed event echoed back
//!
//! Integration failures are logged and never change the response.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::relay::Relay;
use crate::tickets::{parse_event, MalformedPayload, WebhookEvent};
use crate::web::signature::{verify_tito_signature, SIGNATURE_HEADER};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Relay,
}

impl AppState {
    pub fn new(config: Config, relay: Relay) -> Self {
        Self {
            config: Arc::new(config),
            relay,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failures visible to the webhook sender.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid Signature")]
    Unauthorized,

    #[error(transparent)]
    MalformedPayload(#[from] MalformedPayload),
}

/// Error body, shaped `{"statusCode":401,"error":"Unauthorized","message":"..."}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub error: &'static str,
    pub message: String,
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error"),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Tito Webhook
// =============================================================================

/// Tito ticket webhook endpoint.
///
/// Takes the body as raw bytes: the signature covers the exact bytes sent.
pub async fn ticket_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookEvent>, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    info!(
        body_length = body.len(),
        has_signature = signature.is_some(),
        "ticket_webhook_received"
    );

    if !verify_tito_signature(signature, &body, &state.config.signing_secret) {
        warn!(body_length = body.len(), "ticket_webhook_unauthorized");
        return Err(WebhookError::Unauthorized);
    }

    let event = parse_event(&body).map_err(|e| {
        warn!(error = %e, "ticket_webhook_malformed");
        e
    })?;

    // Relay::dispatch logs the per-request summary
    state.relay.dispatch(&event).await;

    Ok(Json(event))
}
