//! payment-event-sync server entry point.
//!
//! Starts the Axum HTTP server with the webhook and system endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use payment_event_sync::api;
use payment_event_sync::app_state::AppState;
use payment_event_sync::config::SyncConfig;
use payment_event_sync::persistence::{MemoryStore, PostgresStore, SyncStore};
use payment_event_sync::service::WebhookService;
use payment_event_sync::signature::SignatureVerifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Load configuration
    let config = SyncConfig::from_env().map_err(|e| anyhow::anyhow!("configuration: {e}"))?;
    tracing::info!(addr = %config.listen_addr, ?config, "starting payment-event-sync");

    if !config.webhook_secret_configured() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; every delivery will be rejected");
    }

    // Build persistence layer
    let store: Arc<dyn SyncStore> = if config.persistence_enabled {
        let store = PostgresStore::connect(&config)
            .await
            .context("connecting to PostgreSQL")?;
        tracing::info!("postgres store ready");
        Arc::new(store)
    } else {
        tracing::warn!("persistence disabled; events are kept in memory only");
        Arc::new(MemoryStore::new())
    };

    // Build application state
    let app_state = AppState {
        webhook_service: Arc::new(WebhookService::new(store, config.fail_on_handler_error)),
        verifier: Arc::new(SignatureVerifier::new(
            config.webhook_secret.clone(),
            config.webhook_tolerance_secs,
        )),
    };

    // Build router
    let app = with_docs(Router::new().merge(api::build_router()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Installs the global subscriber; `LOG_FORMAT=json` selects JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(feature = "swagger-ui")]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api::ApiDoc::openapi()))
}

#[cfg(not(feature = "swagger-ui"))]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl+c, shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    }
}
