//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::WebhookService;
use crate::signature::SignatureVerifier;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event dispatcher and audit writer.
    pub webhook_service: Arc<WebhookService>,
    /// Signature checker for incoming deliveries.
    pub verifier: Arc<SignatureVerifier>,
}
