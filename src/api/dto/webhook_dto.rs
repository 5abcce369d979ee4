//! Webhook endpoint response bodies.

use serde::Serialize;
use utoipa::ToSchema;

/// Acknowledgement returned for every accepted delivery.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookAck {
    /// Always `true`; the event was verified and handled or skipped.
    pub received: bool,
    /// Present and `true` when the event id had already been processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

impl WebhookAck {
    /// Acknowledgement for a freshly processed event.
    #[must_use]
    pub const fn processed() -> Self {
        Self {
            received: true,
            duplicate: None,
        }
    }

    /// Acknowledgement for a redelivery that was not processed again.
    #[must_use]
    pub const fn duplicate() -> Self {
        Self {
            received: true,
            duplicate: Some(true),
        }
    }
}

/// Descriptor served by `GET /api/webhooks/stripe`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDescriptor {
    /// Endpoint status, `"ok"`.
    pub status: String,
    /// Whether a signing secret is configured.
    pub webhook_secret_configured: bool,
    /// Current server time (RFC 3339).
    pub timestamp: String,
    /// Event type tags the endpoint handles.
    pub supported_events: Vec<String>,
}
