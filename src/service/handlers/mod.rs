//! Per-event-type handlers.
//!
//! Each handler decodes the object it expects from the event and performs
//! its writes through a [`SyncStore`]. Handlers share no state and may run
//! in any order.

pub mod billing;
pub mod checkout;
pub mod connect;
pub mod notify;
pub mod payment_intent;

use crate::domain::{EventKind, WebhookEvent};
use crate::error::SyncError;
use crate::persistence::SyncStore;

/// What a handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The event changed stored state.
    Applied,
    /// The event was understood but deliberately not acted on.
    Skipped(String),
}

/// Routes an event to the handler for its kind.
///
/// # Errors
///
/// Propagates the handler's error.
pub async fn dispatch(
    store: &dyn SyncStore,
    kind: EventKind,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    match kind {
        EventKind::CheckoutSessionCompleted => {
            checkout::handle_checkout_completed(store, event).await
        }
        EventKind::PaymentIntentSucceeded => payment_intent::handle_succeeded(store, event).await,
        EventKind::PaymentIntentFailed => payment_intent::handle_failed(store, event).await,
        EventKind::SubscriptionUpdated | EventKind::SubscriptionDeleted => {
            billing::handle_subscription_changed(store, event).await
        }
        EventKind::InvoicePaymentSucceeded => billing::handle_invoice_paid(store, event).await,
        EventKind::TransferCreated => connect::handle_transfer_created(store, event).await,
        EventKind::AccountUpdated => connect::handle_account_updated(store, event).await,
        EventKind::PayoutPaid => connect::handle_payout_paid(store, event).await,
        EventKind::PayoutFailed => connect::handle_payout_failed(store, event).await,
        EventKind::CapabilityUpdated => connect::handle_capability_updated(store, event).await,
        EventKind::AccountDeauthorized => {
            connect::handle_account_deauthorized(store, event).await
        }
    }
}
