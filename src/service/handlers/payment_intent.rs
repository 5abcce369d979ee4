//! `payment_intent.succeeded` and `payment_intent.payment_failed`.

use tracing::info;

use super::HandlerOutcome;
use crate::domain::WebhookEvent;
use crate::domain::objects::PaymentIntent;
use crate::error::SyncError;
use crate::persistence::SyncStore;
use crate::persistence::models::PaymentRecord;

/// Reason recorded when the provider gives none.
pub const DEFAULT_FAILURE_REASON: &str = "Payment failed";

/// Records a successful payment intent.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_succeeded(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let intent: PaymentIntent = event.object()?;
    record(store, &intent, "succeeded", None).await
}

/// Records a failed payment intent with the provider's error message.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_failed(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let intent: PaymentIntent = event.object()?;
    let reason = intent
        .last_payment_error
        .as_ref()
        .and_then(|e| e.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
    record(store, &intent, "failed", Some(reason)).await
}

async fn record(
    store: &dyn SyncStore,
    intent: &PaymentIntent,
    status: &str,
    failure_reason: Option<String>,
) -> Result<HandlerOutcome, SyncError> {
    let payment = PaymentRecord {
        stripe_payment_intent_id: intent.id.clone(),
        amount: intent.amount,
        currency: intent.currency.clone().unwrap_or_else(|| "usd".to_string()),
        status: status.to_string(),
        failure_reason,
        metadata: serde_json::to_value(&intent.metadata)
            .map_err(|e| SyncError::Internal(e.to_string()))?,
    };
    let outcome = store.record_payment(&payment).await?;
    info!(
        payment_intent_id = %intent.id,
        status,
        ?outcome,
        reason = payment.failure_reason.as_deref().unwrap_or(""),
        "payment intent recorded"
    );
    Ok(HandlerOutcome::Applied)
}
