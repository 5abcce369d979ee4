//! Webhook endpoints: signed event intake and a status descriptor.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use tracing::warn;

use crate::api::dto::{WebhookAck, WebhookDescriptor};
use crate::app_state::AppState;
use crate::domain::EventKind;
use crate::error::{ErrorResponse, SyncError};
use crate::signature::SIGNATURE_HEADER;

/// `POST /api/webhooks/stripe`: receive a signed provider event.
///
/// # Errors
///
/// Returns 400 when the signature or payload cannot be verified and 500
/// when a handler fails and handler failures are surfaced.
#[utoipa::path(
    post,
    path = "/api/webhooks/stripe",
    tag = "Webhooks",
    summary = "Receive a provider event",
    description = "Verifies the `Stripe-Signature` header against the raw body, applies the event and records it in the audit log. Redeliveries of processed events are acknowledged without side effects.",
    request_body(content = String, description = "Raw event JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Signature or payload rejected", body = ErrorResponse),
        (status = 500, description = "Handler failed; the provider should retry", body = ErrorResponse),
    )
)]
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, SyncError> {
    let signature = match headers.get(SIGNATURE_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| {
            SyncError::InvalidSignature("header is not visible ASCII".to_string())
        })?),
        None => None,
    };

    let event = state
        .verifier
        .verify(&body, signature)
        .inspect_err(|e| warn!(error = %e, code = e.error_code(), "webhook delivery rejected"))?;

    let report = state.webhook_service.process(&event).await?;
    let ack = if report.duplicate {
        WebhookAck::duplicate()
    } else {
        WebhookAck::processed()
    };
    Ok((StatusCode::OK, Json(ack)))
}

/// `GET /api/webhooks/stripe`: endpoint status and supported events.
#[utoipa::path(
    get,
    path = "/api/webhooks/stripe",
    tag = "Webhooks",
    summary = "Webhook endpoint status",
    description = "Reports whether a signing secret is configured and lists the event types the endpoint handles.",
    responses(
        (status = 200, description = "Endpoint descriptor", body = WebhookDescriptor),
    )
)]
pub async fn describe_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(WebhookDescriptor {
            status: "ok".to_string(),
            webhook_secret_configured: state.verifier.is_configured(),
            timestamp: Utc::now().to_rfc3339(),
            supported_events: EventKind::ALL
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
        }),
    )
}

/// Webhook routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/webhooks/stripe",
        post(receive_event).get(describe_endpoint),
    )
}
