//! Subscription lifecycle and subscription invoices.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::HandlerOutcome;
use crate::domain::WebhookEvent;
use crate::domain::objects::{Invoice, Metadata, Subscription, epoch_to_utc};
use crate::error::SyncError;
use crate::persistence::SyncStore;
use crate::persistence::models::{PaymentHistoryRecord, SubscriptionRecord};

/// Mirrors `customer.subscription.updated` and `.deleted`.
///
/// The provider status is stored verbatim.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_subscription_changed(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let subscription: Subscription = event.object()?;

    let record = SubscriptionRecord {
        stripe_subscription_id: subscription.id.clone(),
        artist_id: artist_from_metadata(&subscription.metadata),
        stripe_customer_id: subscription.customer.clone(),
        status: subscription.status.clone(),
        current_period_end: subscription.current_period_end.and_then(epoch_to_utc),
        canceled_at: subscription.canceled_at.and_then(epoch_to_utc),
    };
    let outcome = store.upsert_subscription(&record).await?;
    info!(
        subscription_id = %subscription.id,
        status = %subscription.status,
        ?outcome,
        "subscription mirrored"
    );
    Ok(HandlerOutcome::Applied)
}

/// Appends a payment-history row for subscription invoices.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_invoice_paid(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let invoice: Invoice = event.object()?;
    let Some(subscription_id) = invoice.subscription.clone() else {
        return Ok(HandlerOutcome::Skipped(
            "invoice is not linked to a subscription".to_string(),
        ));
    };

    let entry = PaymentHistoryRecord {
        stripe_invoice_id: invoice.id.clone(),
        stripe_subscription_id: subscription_id,
        amount: invoice.amount_paid,
        currency: invoice.currency.clone().unwrap_or_else(|| "usd".to_string()),
        paid_at: epoch_to_utc(event.created).unwrap_or_else(Utc::now),
    };
    if !store.append_payment_history(&entry).await? {
        return Ok(HandlerOutcome::Skipped(
            "invoice already recorded".to_string(),
        ));
    }
    info!(
        invoice_id = %invoice.id,
        subscription_id = %entry.stripe_subscription_id,
        amount = entry.amount,
        "subscription invoice recorded"
    );
    Ok(HandlerOutcome::Applied)
}

/// Reads the artist id stamped on a provider object, if it is a valid id.
pub(crate) fn artist_from_metadata(metadata: &Metadata) -> Option<Uuid> {
    let raw = ["artist_id", "user_id", "userId"]
        .iter()
        .find_map(|key| metadata.get(*key))?;
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(value = %raw, error = %e, "ignoring unparsable artist id in metadata");
            None
        }
    }
}
