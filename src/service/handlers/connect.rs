//! Connected-account events: royalty transfers, account capability
//! changes, payouts and deauthorization.

use tracing::{info, warn};

use super::HandlerOutcome;
use super::billing::artist_from_metadata;
use super::notify::{format_amount, notify_account_owner};
use crate::domain::objects::{Account, Capability, Payout, Transfer};
use crate::domain::{VerificationStatus, WebhookEvent};
use crate::error::SyncError;
use crate::persistence::SyncStore;
use crate::persistence::models::{
    AccountRecord, NotificationKind, PayoutRecord, TransferRecord, TransferStatus,
};

/// Metadata `type` that marks a transfer as a royalty payout.
pub const ROYALTY_PAYOUT_TYPE: &str = "royalty_payout";

/// Records royalty transfers; other transfers are ignored.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_transfer_created(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let transfer: Transfer = event.object()?;
    if transfer.metadata.get("type").map(String::as_str) != Some(ROYALTY_PAYOUT_TYPE) {
        return Ok(HandlerOutcome::Skipped(
            "transfer is not a royalty payout".to_string(),
        ));
    }

    let record = TransferRecord {
        stripe_transfer_id: transfer.id.clone(),
        artist_id: artist_from_metadata(&transfer.metadata),
        destination_account: transfer.destination.clone(),
        amount: transfer.amount,
        currency: transfer.currency.clone().unwrap_or_else(|| "usd".to_string()),
        status: TransferStatus::Completed,
    };
    if !store.append_transfer(&record).await? {
        return Ok(HandlerOutcome::Skipped(
            "transfer already recorded".to_string(),
        ));
    }
    info!(
        transfer_id = %transfer.id,
        destination = transfer.destination.as_deref().unwrap_or(""),
        amount = transfer.amount,
        "royalty transfer recorded"
    );
    Ok(HandlerOutcome::Applied)
}

/// Recomputes and stores the verification status of a connected account.
///
/// The "ready" notification is sent once per transition into both charges
/// and payouts enabled; the store hands the notification out atomically.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_account_updated(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let account: Account = event.object()?;

    let record = AccountRecord {
        stripe_account_id: account.id.clone(),
        charges_enabled: account.charges_enabled,
        payouts_enabled: account.payouts_enabled,
        details_submitted: account.details_submitted,
        verification_status: VerificationStatus::from_flags(
            account.charges_enabled,
            account.payouts_enabled,
            account.details_submitted,
        ),
    };
    store.upsert_account(&record).await?;
    info!(
        account_id = %account.id,
        status = %record.verification_status,
        charges_enabled = record.charges_enabled,
        payouts_enabled = record.payouts_enabled,
        "account status updated"
    );

    if record.is_ready() && store.claim_ready_notification(&account.id).await? {
        notify_account_owner(
            store,
            &account.id,
            "Account Ready!",
            "Your payment account is verified. You can now receive payments and payouts."
                .to_string(),
            NotificationKind::Success,
        )
        .await;
    }
    Ok(HandlerOutcome::Applied)
}

/// Records a payout as completed.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_payout_paid(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    payout(store, event, TransferStatus::Completed).await
}

/// Records a payout as failed.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_payout_failed(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    payout(store, event, TransferStatus::Failed).await
}

async fn payout(
    store: &dyn SyncStore,
    event: &WebhookEvent,
    status: TransferStatus,
) -> Result<HandlerOutcome, SyncError> {
    let payout: Payout = event.object()?;
    let account_id = event.account_id();
    let currency = payout.currency.clone().unwrap_or_else(|| "usd".to_string());
    let failure_reason = match status {
        TransferStatus::Failed => Some(
            payout
                .failure_message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
        ),
        TransferStatus::Pending | TransferStatus::Completed => None,
    };

    let record = PayoutRecord {
        stripe_payout_id: payout.id.clone(),
        account_id: account_id.clone(),
        amount: payout.amount,
        currency: currency.clone(),
        status,
        failure_reason: failure_reason.clone(),
    };
    let outcome = store.upsert_payout(&record).await?;
    info!(payout_id = %payout.id, status = status.as_str(), ?outcome, "payout recorded");

    let Some(account_id) = account_id else {
        warn!(payout_id = %payout.id, "payout event without account; notification skipped");
        return Ok(HandlerOutcome::Applied);
    };
    let amount = format_amount(payout.amount, &currency);
    let (title, message, kind) = match failure_reason {
        None => (
            "Payout Sent",
            format!("Your payout of {amount} is on its way to your bank account."),
            NotificationKind::Success,
        ),
        Some(reason) => (
            "Payout Failed",
            format!("Your payout of {amount} failed: {reason}"),
            NotificationKind::Error,
        ),
    };
    notify_account_owner(store, &account_id, title, message, kind).await;
    Ok(HandlerOutcome::Applied)
}

/// Tells the account owner that one capability changed state.
///
/// # Errors
///
/// Returns [`SyncError::MalformedEvent`] if the object is not a capability.
pub async fn handle_capability_updated(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let capability: Capability = event.object()?;
    let Some(account_id) = capability.account.clone().or_else(|| event.account_id()) else {
        return Ok(HandlerOutcome::Skipped(
            "capability event without account".to_string(),
        ));
    };

    let (state, kind) = if capability.is_active() {
        ("active", NotificationKind::Success)
    } else {
        ("inactive", NotificationKind::Warning)
    };
    let name = capability.id.replace('_', " ");
    let notified = notify_account_owner(
        store,
        &account_id,
        "Capability Updated",
        format!("Your {name} capability is now {state}."),
        kind,
    )
    .await;

    Ok(if notified {
        HandlerOutcome::Applied
    } else {
        HandlerOutcome::Skipped("no profile linked to account".to_string())
    })
}

/// Disconnects the profile that owned a deauthorized account.
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] on store failures.
pub async fn handle_account_deauthorized(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let Some(account_id) = event.account_id() else {
        return Ok(HandlerOutcome::Skipped(
            "deauthorization without account".to_string(),
        ));
    };

    let changed = store.disconnect_account(&account_id).await?;
    info!(%account_id, profiles = changed, "connected account disconnected");
    Ok(if changed == 0 {
        HandlerOutcome::Skipped("no profile linked to account".to_string())
    } else {
        HandlerOutcome::Applied
    })
}
