//! HTTP layer: route handlers, DTOs, OpenAPI document and router
//! composition.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every mounted endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "payment-event-sync",
        description = "Signed payment-provider webhook receiver"
    ),
    paths(
        handlers::webhook::receive_event,
        handlers::webhook::describe_endpoint,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::WebhookAck,
        dto::WebhookDescriptor,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Webhooks", description = "Provider event intake"),
        (name = "System", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;

/// Builds the complete router with all HTTP endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::webhook::routes())
        .merge(handlers::system::routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_webhook_path() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/webhooks/stripe"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
