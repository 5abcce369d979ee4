//! `checkout.session.completed`: track uploads, playlist campaigns and
//! subscription checkouts.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::HandlerOutcome;
use super::notify::{format_amount, notify_user};
use crate::domain::objects::{CheckoutSession, epoch_to_utc};
use crate::domain::{CampaignOrder, CheckoutPurpose, Plan, WebhookEvent};
use crate::error::SyncError;
use crate::persistence::SyncStore;
use crate::persistence::models::{
    CampaignActivation, NotificationKind, SubscriptionRecord, UpsertOutcome,
};

/// Applies a completed checkout session.
///
/// # Errors
///
/// Returns [`SyncError::InvalidMetadata`] / [`SyncError::UnknownPlan`] for
/// unusable metadata and [`SyncError::Persistence`] on store failures.
pub async fn handle_checkout_completed(
    store: &dyn SyncStore,
    event: &WebhookEvent,
) -> Result<HandlerOutcome, SyncError> {
    let session: CheckoutSession = event.object()?;
    let purpose = CheckoutPurpose::from_session(&session)?;

    match purpose {
        CheckoutPurpose::TrackUpload { track_id, user_id } => {
            track_upload(store, &session, track_id, user_id).await
        }
        CheckoutPurpose::PlaylistCampaign(order) => {
            playlist_campaign(store, event, &session, &order).await
        }
        CheckoutPurpose::Subscription { user_id } => subscription(store, &session, user_id).await,
        CheckoutPurpose::Unknown(tag) => {
            info!(session_id = %session.id, checkout_type = %tag, "unhandled checkout type");
            Ok(HandlerOutcome::Skipped(format!("unhandled checkout type `{tag}`")))
        }
    }
}

async fn track_upload(
    store: &dyn SyncStore,
    session: &CheckoutSession,
    track_id: Uuid,
    user_id: Uuid,
) -> Result<HandlerOutcome, SyncError> {
    if !session.is_paid() {
        return Ok(HandlerOutcome::Skipped(
            "track upload session is not paid".to_string(),
        ));
    }

    let changed = store
        .mark_track_paid(track_id, user_id, &session.id, session.payment_intent.as_deref())
        .await?;
    if changed == 0 {
        warn!(%track_id, %user_id, session_id = %session.id, "no track matched paid upload session");
        return Ok(HandlerOutcome::Skipped("no matching track".to_string()));
    }

    info!(%track_id, %user_id, session_id = %session.id, "track upload paid");
    notify_user(
        store,
        user_id,
        "Upload Payment Received",
        "Your track payment was received and the track is queued for distribution.".to_string(),
        NotificationKind::Success,
    )
    .await;
    Ok(HandlerOutcome::Applied)
}

async fn playlist_campaign(
    store: &dyn SyncStore,
    event: &WebhookEvent,
    session: &CheckoutSession,
    order: &CampaignOrder,
) -> Result<HandlerOutcome, SyncError> {
    let plan =
        Plan::lookup(&order.plan_id).ok_or_else(|| SyncError::UnknownPlan(order.plan_id.clone()))?;

    if session.is_unpaid() {
        let changed = store
            .mark_campaign_payment_failed(&session.id, order.user_id)
            .await?;
        info!(
            session_id = %session.id,
            user_id = %order.user_id,
            rows = changed,
            "campaign checkout ended unpaid"
        );
        return Ok(if changed == 0 {
            HandlerOutcome::Skipped("no campaign placeholder to mark as failed".to_string())
        } else {
            HandlerOutcome::Applied
        });
    }

    if !session.is_paid() {
        return Ok(HandlerOutcome::Skipped(format!(
            "campaign payment status `{}`",
            session.payment_status.as_deref().unwrap_or("none")
        )));
    }

    let activation = CampaignActivation {
        stripe_session_id: session.id.clone(),
        user_id: order.user_id,
        release_id: order.release_id,
        plan_type: plan.id.to_string(),
        plan_name: plan.name.to_string(),
        plan_price_cents: plan.price_cents,
        stripe_payment_intent_id: session.payment_intent.clone(),
        paid_at: epoch_to_utc(event.created).unwrap_or_else(Utc::now),
        campaign_metadata: json!({
            "plan_name": plan.name,
            "plan_description": plan.description,
            "amount_total": session.amount_total,
            "currency": session.currency,
            "legacy_checkout": order.legacy,
        }),
    };

    let outcome = store.upsert_campaign(&activation).await?;
    info!(
        session_id = %session.id,
        user_id = %order.user_id,
        plan = plan.id,
        ?outcome,
        "campaign activation applied"
    );

    match outcome {
        UpsertOutcome::Inserted | UpsertOutcome::Updated => {
            let paid = session
                .amount_total
                .map(|amount| {
                    format!(
                        " ({})",
                        format_amount(amount, session.currency.as_deref().unwrap_or("usd"))
                    )
                })
                .unwrap_or_default();
            notify_user(
                store,
                order.user_id,
                "Campaign Activated!",
                format!(
                    "Your {} playlist campaign is now active{paid}. We'll start pitching shortly.",
                    plan.name
                ),
                NotificationKind::Success,
            )
            .await;
            Ok(HandlerOutcome::Applied)
        }
        UpsertOutcome::Unchanged => Ok(HandlerOutcome::Skipped(
            "campaign already active or owned by another user".to_string(),
        )),
    }
}

async fn subscription(
    store: &dyn SyncStore,
    session: &CheckoutSession,
    user_id: Uuid,
) -> Result<HandlerOutcome, SyncError> {
    let subscription_id = session.subscription.clone().ok_or_else(|| {
        SyncError::InvalidMetadata("subscription checkout has no subscription id".to_string())
    })?;

    let record = SubscriptionRecord {
        stripe_subscription_id: subscription_id,
        artist_id: Some(user_id),
        stripe_customer_id: None,
        status: "active".to_string(),
        current_period_end: None,
        canceled_at: None,
    };
    store.upsert_subscription(&record).await?;
    info!(
        %user_id,
        subscription_id = %record.stripe_subscription_id,
        "subscription started from checkout"
    );
    Ok(HandlerOutcome::Applied)
}
