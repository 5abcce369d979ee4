//! Webhook service: idempotent claim, dispatch and the audit log.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use super::handlers::{self, HandlerOutcome};
use crate::domain::{EventKind, WebhookEvent};
use crate::error::SyncError;
use crate::persistence::SyncStore;
use crate::persistence::models::{AuditEvent, AuditStatus};

/// Result of processing one verified delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    /// Provider event id.
    pub event_id: String,
    /// Audit status recorded for the event.
    pub status: AuditStatus,
    /// `true` when the event had already been processed and was skipped.
    pub duplicate: bool,
    /// Reason the handler chose not to act, if it skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Orchestrates one verified event: audit claim → handler → audit.
///
/// Stateless apart from the store handle; every delivery is processed
/// independently.
#[derive(Debug, Clone)]
pub struct WebhookService {
    store: Arc<dyn SyncStore>,
    fail_on_handler_error: bool,
}

impl WebhookService {
    /// Creates a new `WebhookService`.
    ///
    /// With `fail_on_handler_error` set, a handler failure is returned as
    /// [`SyncError::HandlerFailed`] so the provider redelivers the event.
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>, fail_on_handler_error: bool) -> Self {
        Self {
            store,
            fail_on_handler_error,
        }
    }

    /// Processes a verified event.
    ///
    /// The audit row is claimed as `processing` before the handler runs, so
    /// concurrent deliveries of one event id dispatch at most once. A
    /// delivery that loses the claim is acknowledged as a duplicate. A
    /// claim is granted again only when the previous attempt `failed` or a
    /// `processing` claim has been abandoned for
    /// [`CLAIM_STALE_AFTER_SECS`](crate::persistence::CLAIM_STALE_AFTER_SECS).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Persistence`] when the claim cannot be written,
    /// and [`SyncError::HandlerFailed`] when the handler failed and the
    /// service is configured to surface handler failures.
    pub async fn process(&self, event: &WebhookEvent) -> Result<ProcessReport, SyncError> {
        let claim = AuditEvent {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            account_id: event.account_id(),
            status: AuditStatus::Processing,
            error: None,
            attempts: 1,
            processed_at: Utc::now(),
            payload: event.data.object.clone(),
        };
        if !self.store.claim_event(&claim).await? {
            let status = match self.store.find_audit(&event.id).await {
                Ok(Some(previous)) => previous.status,
                Ok(None) => AuditStatus::Processing,
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "audit lookup failed");
                    AuditStatus::Processing
                }
            };
            info!(
                event_id = %event.id,
                event_type = %event.event_type,
                status = status.as_str(),
                "duplicate delivery acknowledged without reprocessing"
            );
            return Ok(ProcessReport {
                event_id: event.id.clone(),
                status,
                duplicate: true,
                skipped: None,
            });
        }

        let (status, failure, skipped) = match event.kind() {
            None => {
                info!(event_id = %event.id, event_type = %event.event_type, "unhandled event type");
                (AuditStatus::Ignored, None, None)
            }
            Some(kind) => self.run_handler(kind, event).await,
        };

        let audit = AuditEvent {
            status,
            error: failure.clone(),
            processed_at: Utc::now(),
            ..claim
        };
        if let Err(e) = self.store.record_audit(&audit).await {
            error!(event_id = %event.id, error = %e, "failed to record webhook audit event");
        }

        if let Some(reason) = failure
            && self.fail_on_handler_error
        {
            return Err(SyncError::HandlerFailed {
                event_id: event.id.clone(),
                event_type: event.event_type.clone(),
                reason,
            });
        }

        Ok(ProcessReport {
            event_id: event.id.clone(),
            status,
            duplicate: false,
            skipped,
        })
    }

    /// Runs the handler and classifies its result as
    /// `(audit status, failure message, skip reason)`.
    async fn run_handler(
        &self,
        kind: EventKind,
        event: &WebhookEvent,
    ) -> (AuditStatus, Option<String>, Option<String>) {
        match handlers::dispatch(self.store.as_ref(), kind, event).await {
            Ok(HandlerOutcome::Applied) => {
                info!(event_id = %event.id, event_type = %kind, "event applied");
                (AuditStatus::Processed, None, None)
            }
            Ok(HandlerOutcome::Skipped(reason)) => {
                info!(event_id = %event.id, event_type = %kind, %reason, "event skipped");
                (AuditStatus::Processed, None, Some(reason))
            }
            Err(e) if e.is_data_shape() => {
                warn!(event_id = %event.id, event_type = %kind, error = %e, "event data unusable; skipped");
                (AuditStatus::Processed, None, Some(e.to_string()))
            }
            Err(e) => {
                error!(event_id = %event.id, event_type = %kind, error = %e, "event handler failed");
                (AuditStatus::Failed, Some(e.to_string()), None)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    use crate::persistence::MemoryStore;
    use crate::persistence::models::{
        CampaignStatus, NotificationKind, PaymentStatus, TransferStatus,
    };
    use crate::test_support::{USER, account_updated, campaign_checkout, event};

    fn user() -> Uuid {
        let Ok(id) = Uuid::parse_str(USER) else {
            panic!("fixture user id");
        };
        id
    }

    fn setup(fail_on_handler_error: bool) -> (Arc<MemoryStore>, WebhookService) {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn SyncStore> = Arc::<MemoryStore>::clone(&store);
        (store, WebhookService::new(dyn_store, fail_on_handler_error))
    }

    #[tokio::test]
    async fn unsupported_kind_only_writes_audit() {
        let (store, service) = setup(true);
        let evt = event("evt_unk", "charge.refunded", None, json!({ "id": "ch_1" }));

        let Ok(report) = service.process(&evt).await else {
            panic!("unsupported kinds are not errors");
        };
        assert_eq!(report.status, AuditStatus::Ignored);
        assert_eq!(store.data_writes(), 0);
        let audit = store.audit_events().await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].event_type, "charge.refunded");
    }

    #[tokio::test]
    async fn paid_campaign_updates_existing_placeholder() {
        let (store, service) = setup(true);
        store
            .insert_campaign_placeholder("cs_1", user(), "pro", 29_999)
            .await;

        let result = service.process(&campaign_checkout("evt_1", "cs_1", "paid")).await;
        assert!(result.is_ok());

        let campaigns = store.campaigns().await;
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].status, CampaignStatus::Active);
        assert_eq!(campaigns[0].payment_status, PaymentStatus::Paid);
        assert_eq!(campaigns[0].stripe_payment_intent_id.as_deref(), Some("pi_campaign"));
    }

    #[tokio::test]
    async fn paid_campaign_without_placeholder_inserts_one_row() {
        let (store, service) = setup(true);

        let result = service.process(&campaign_checkout("evt_1", "cs_new", "paid")).await;
        assert!(result.is_ok());

        let campaigns = store.campaigns().await;
        assert_eq!(campaigns.len(), 1);
        let row = &campaigns[0];
        assert_eq!(row.status, CampaignStatus::Active);
        assert_eq!(row.user_id, user());
        assert_eq!(row.release_id, None);
        assert!((row.plan_price() - 299.99).abs() < f64::EPSILON);

        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Campaign Activated!");
        assert_eq!(notifications[0].kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn plan_prices_follow_catalog() {
        for (plan, price) in [("indie", 99.99), ("superstar", 499.99)] {
            let (store, service) = setup(true);
            let evt = event(
                "evt_plan",
                "checkout.session.completed",
                None,
                json!({
                    "id": format!("cs_{plan}"),
                    "payment_status": "paid",
                    "metadata": { "type": "playlist_campaign", "userId": USER, "planId": plan }
                }),
            );
            assert!(service.process(&evt).await.is_ok());
            let campaigns = store.campaigns().await;
            assert_eq!(campaigns.len(), 1);
            assert!((campaigns[0].plan_price() - price).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn unpaid_campaign_marks_failure_and_never_inserts() {
        let (store, service) = setup(true);
        store
            .insert_campaign_placeholder("cs_1", user(), "pro", 29_999)
            .await;

        assert!(service.process(&campaign_checkout("evt_1", "cs_1", "unpaid")).await.is_ok());
        let campaigns = store.campaigns().await;
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].status, CampaignStatus::PaymentFailed);
        assert_eq!(campaigns[0].payment_status, PaymentStatus::Unpaid);

        let (empty_store, empty_service) = setup(true);
        let report = empty_service
            .process(&campaign_checkout("evt_2", "cs_none", "unpaid"))
            .await;
        assert!(report.is_ok());
        assert!(empty_store.campaigns().await.is_empty());
        assert!(empty_store.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn campaign_missing_ids_writes_nothing() {
        for metadata in [
            json!({ "type": "playlist_campaign", "planId": "pro" }),
            json!({ "type": "playlist_campaign", "userId": USER }),
            json!({ "type": "playlist_campaign", "userId": USER, "planId": "platinum" }),
        ] {
            let (store, service) = setup(true);
            let evt = event(
                "evt_bad",
                "checkout.session.completed",
                None,
                json!({ "id": "cs_bad", "payment_status": "paid", "metadata": metadata }),
            );
            let Ok(report) = service.process(&evt).await else {
                panic!("data-shape problems must not surface as errors");
            };
            assert!(report.skipped.is_some());
            assert_eq!(store.data_writes(), 0);
            assert_eq!(store.audit_events().await.len(), 1);
        }
    }

    #[tokio::test]
    async fn redelivery_is_acknowledged_once() {
        let (store, service) = setup(true);
        let evt = campaign_checkout("evt_dup", "cs_1", "paid");

        let Ok(first) = service.process(&evt).await else {
            panic!("first delivery");
        };
        let Ok(second) = service.process(&evt).await else {
            panic!("second delivery");
        };
        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(store.audit_events().await.len(), 1);
        assert_eq!(store.campaigns().await.len(), 1);
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn account_ready_notifies_only_on_transition() {
        let (store, service) = setup(true);
        store.insert_profile(user(), "acct_1").await;

        assert!(service.process(&account_updated("evt_a", "acct_1", false, false)).await.is_ok());
        assert!(service.process(&account_updated("evt_b", "acct_1", true, true)).await.is_ok());
        assert!(service.process(&account_updated("evt_c", "acct_1", true, true)).await.is_ok());

        let ready: Vec<_> = store
            .notifications()
            .await
            .into_iter()
            .filter(|n| n.title == "Account Ready!")
            .collect();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].user_id, user());
    }

    #[tokio::test]
    async fn handler_failure_is_audited_and_retried() {
        let (store, service) = setup(true);
        let evt = campaign_checkout("evt_retry", "cs_1", "paid");

        store.set_fail_writes(true);
        let result = service.process(&evt).await;
        assert!(matches!(result, Err(SyncError::HandlerFailed { .. })));
        let audit = store.audit_events().await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, AuditStatus::Failed);

        store.set_fail_writes(false);
        let Ok(report) = service.process(&evt).await else {
            panic!("retry should succeed");
        };
        assert!(!report.duplicate);
        let audit = store.audit_events().await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, AuditStatus::Processed);
        assert_eq!(audit[0].attempts, 2);
        assert_eq!(store.campaigns().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redelivery_dispatches_once() {
        for _ in 0..50 {
            let (store, service) = setup(true);
            let evt = event(
                "evt_race",
                "transfer.created",
                None,
                json!({
                    "id": "tr_race",
                    "amount": 4200,
                    "destination": "acct_1",
                    "metadata": { "type": "royalty_payout", "artist_id": USER }
                }),
            );

            let mut tasks = Vec::new();
            for _ in 0..2 {
                let service = service.clone();
                let evt = evt.clone();
                tasks.push(tokio::spawn(async move { service.process(&evt).await }));
            }
            let mut fresh = 0;
            for task in tasks {
                let Ok(Ok(report)) = task.await else {
                    panic!("concurrent delivery failed");
                };
                if !report.duplicate {
                    fresh += 1;
                }
            }

            assert_eq!(fresh, 1);
            assert_eq!(store.transfers().await.len(), 1);
            let audit = store.audit_events().await;
            assert_eq!(audit.len(), 1);
            assert_eq!(audit[0].status, AuditStatus::Processed);
            assert_eq!(audit[0].attempts, 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ready_updates_notify_once() {
        for _ in 0..50 {
            let (store, service) = setup(true);
            store.insert_profile(user(), "acct_1").await;

            let mut tasks = Vec::new();
            for id in ["evt_ready_1", "evt_ready_2"] {
                let service = service.clone();
                let evt = account_updated(id, "acct_1", true, true);
                tasks.push(tokio::spawn(async move { service.process(&evt).await }));
            }
            for task in tasks {
                let Ok(Ok(report)) = task.await else {
                    panic!("account update failed");
                };
                assert!(!report.duplicate);
            }

            let ready = store
                .notifications()
                .await
                .into_iter()
                .filter(|n| n.title == "Account Ready!")
                .count();
            assert_eq!(ready, 1);
        }
    }

    #[tokio::test]
    async fn account_ready_notifies_again_after_losing_capabilities() {
        let (store, service) = setup(true);
        store.insert_profile(user(), "acct_1").await;

        for (id, ready) in [("evt_a", true), ("evt_b", false), ("evt_c", true)] {
            assert!(service.process(&account_updated(id, "acct_1", ready, ready)).await.is_ok());
        }

        let ready = store
            .notifications()
            .await
            .into_iter()
            .filter(|n| n.title == "Account Ready!")
            .count();
        assert_eq!(ready, 2);
    }

    #[tokio::test]
    async fn transfer_seen_under_new_event_id_is_not_duplicated() {
        let (store, service) = setup(true);
        let object = json!({
            "id": "tr_1",
            "amount": 4200,
            "destination": "acct_1",
            "metadata": { "type": "royalty_payout" }
        });

        assert!(service.process(&event("evt_1", "transfer.created", None, object.clone())).await.is_ok());
        let Ok(report) = service.process(&event("evt_2", "transfer.created", None, object)).await else {
            panic!("second transfer event");
        };
        assert!(!report.duplicate);
        assert_eq!(report.skipped.as_deref(), Some("transfer already recorded"));
        assert_eq!(store.transfers().await.len(), 1);
    }

    #[tokio::test]
    async fn handler_failure_can_be_swallowed() {
        let (store, service) = setup(false);
        store.set_fail_writes(true);
        let Ok(report) = service.process(&campaign_checkout("evt_1", "cs_1", "paid")).await else {
            panic!("failures are swallowed when configured");
        };
        assert_eq!(report.status, AuditStatus::Failed);
    }

    #[tokio::test]
    async fn track_upload_marks_track_paid() {
        let (store, service) = setup(true);
        let track = Uuid::new_v4();
        store.insert_track(track, user()).await;
        let evt = event(
            "evt_track",
            "checkout.session.completed",
            None,
            json!({
                "id": "cs_track",
                "payment_status": "paid",
                "payment_intent": "pi_track",
                "metadata": { "type": "track_upload", "track_id": track.to_string(), "user_id": USER }
            }),
        );
        assert!(service.process(&evt).await.is_ok());
        let Some(row) = store.track(track).await else {
            panic!("track missing");
        };
        assert_eq!(row.payment_status, PaymentStatus::Paid);
        assert_eq!(row.stripe_session_id.as_deref(), Some("cs_track"));
    }

    #[tokio::test]
    async fn subscription_checkout_creates_subscription() {
        let (store, service) = setup(true);
        let evt = event(
            "evt_sub_checkout",
            "checkout.session.completed",
            None,
            json!({
                "id": "cs_sub",
                "mode": "subscription",
                "payment_status": "paid",
                "subscription": "sub_1",
                "metadata": { "user_id": USER }
            }),
        );
        assert!(service.process(&evt).await.is_ok());
        let Some(sub) = store.subscription("sub_1").await else {
            panic!("subscription missing");
        };
        assert_eq!(sub.status, "active");
        assert_eq!(sub.artist_id, Some(user()));
    }

    #[tokio::test]
    async fn failed_payment_intent_records_reason() {
        let (store, service) = setup(true);
        let with_reason = event(
            "evt_pi_1",
            "payment_intent.payment_failed",
            None,
            json!({
                "id": "pi_1",
                "amount": 999,
                "currency": "usd",
                "last_payment_error": { "message": "Your card was declined." }
            }),
        );
        let without_reason = event(
            "evt_pi_2",
            "payment_intent.payment_failed",
            None,
            json!({ "id": "pi_2", "amount": 999 }),
        );
        assert!(service.process(&with_reason).await.is_ok());
        assert!(service.process(&without_reason).await.is_ok());

        let Some(first) = store.payment("pi_1").await else {
            panic!("payment pi_1 missing");
        };
        assert_eq!(first.status, "failed");
        assert_eq!(first.failure_reason.as_deref(), Some("Your card was declined."));
        let Some(second) = store.payment("pi_2").await else {
            panic!("payment pi_2 missing");
        };
        assert_eq!(second.failure_reason.as_deref(), Some("Payment failed"));
    }

    #[tokio::test]
    async fn succeeded_payment_intent_is_recorded() {
        let (store, service) = setup(true);
        let evt = event(
            "evt_pi_ok",
            "payment_intent.succeeded",
            None,
            json!({ "id": "pi_ok", "amount": 2500, "currency": "eur" }),
        );
        assert!(service.process(&evt).await.is_ok());
        let Some(payment) = store.payment("pi_ok").await else {
            panic!("payment missing");
        };
        assert_eq!(payment.status, "succeeded");
        assert_eq!(payment.currency, "eur");
        assert_eq!(payment.failure_reason, None);
    }

    #[tokio::test]
    async fn subscription_status_is_copied_verbatim() {
        let (store, service) = setup(true);
        let evt = event(
            "evt_sub",
            "customer.subscription.deleted",
            None,
            json!({
                "id": "sub_9",
                "status": "incomplete_expired",
                "current_period_end": 1_700_086_400,
                "canceled_at": 1_700_000_000,
                "metadata": { "artist_id": USER }
            }),
        );
        assert!(service.process(&evt).await.is_ok());
        let Some(sub) = store.subscription("sub_9").await else {
            panic!("subscription missing");
        };
        assert_eq!(sub.status, "incomplete_expired");
        assert_eq!(sub.current_period_end.map(|t| t.timestamp()), Some(1_700_086_400));
        assert_eq!(sub.canceled_at.map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(sub.artist_id, Some(user()));
    }

    #[tokio::test]
    async fn invoice_without_subscription_is_skipped() {
        let (store, service) = setup(true);
        let one_off = event(
            "evt_inv_1",
            "invoice.payment_succeeded",
            None,
            json!({ "id": "in_1", "amount_paid": 1000 }),
        );
        let Ok(report) = service.process(&one_off).await else {
            panic!("invoice processing");
        };
        assert!(report.skipped.is_some());
        assert!(store.payment_history().await.is_empty());

        let linked = event(
            "evt_inv_2",
            "invoice.payment_succeeded",
            None,
            json!({ "id": "in_2", "subscription": "sub_1", "amount_paid": 1000, "currency": "usd" }),
        );
        assert!(service.process(&linked).await.is_ok());
        let history = store.payment_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].stripe_subscription_id, "sub_1");
    }

    #[tokio::test]
    async fn only_royalty_transfers_are_recorded() {
        let (store, service) = setup(true);
        let other = event(
            "evt_tr_1",
            "transfer.created",
            None,
            json!({ "id": "tr_1", "amount": 500, "destination": "acct_1", "metadata": {} }),
        );
        let royalty = event(
            "evt_tr_2",
            "transfer.created",
            None,
            json!({
                "id": "tr_2",
                "amount": 4200,
                "currency": "usd",
                "destination": "acct_1",
                "metadata": { "type": "royalty_payout", "artist_id": USER }
            }),
        );
        assert!(service.process(&other).await.is_ok());
        assert!(service.process(&royalty).await.is_ok());

        let transfers = store.transfers().await;
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].stripe_transfer_id, "tr_2");
        assert_eq!(transfers[0].status, TransferStatus::Completed);
        assert_eq!(transfers[0].artist_id, Some(user()));
    }

    #[tokio::test]
    async fn payout_failure_updates_status_and_notifies() {
        let (store, service) = setup(true);
        store.insert_profile(user(), "acct_1").await;
        let paid = event(
            "evt_po_1",
            "payout.paid",
            Some("acct_1"),
            json!({ "id": "po_1", "amount": 1250, "currency": "usd" }),
        );
        let failed = event(
            "evt_po_2",
            "payout.failed",
            Some("acct_1"),
            json!({ "id": "po_1", "amount": 1250, "currency": "usd", "failure_message": "Account closed" }),
        );
        assert!(service.process(&paid).await.is_ok());
        assert!(service.process(&failed).await.is_ok());

        let Some(payout) = store.payout("po_1").await else {
            panic!("payout missing");
        };
        assert_eq!(payout.status, TransferStatus::Failed);
        assert_eq!(payout.failure_reason.as_deref(), Some("Account closed"));

        let messages: Vec<_> = store
            .notifications()
            .await
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "Your payout of 12.50 USD is on its way to your bank account.".to_string(),
                "Your payout of 12.50 USD failed: Account closed".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn capability_update_notifies_owner() {
        let (store, service) = setup(true);
        store.insert_profile(user(), "acct_1").await;
        let evt = event(
            "evt_cap",
            "capability.updated",
            Some("acct_1"),
            json!({ "id": "card_payments", "account": "acct_1", "status": "inactive" }),
        );
        assert!(service.process(&evt).await.is_ok());
        let notifications = store.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, "Your card payments capability is now inactive.");
        assert_eq!(notifications[0].kind, NotificationKind::Warning);
    }

    #[tokio::test]
    async fn deauthorization_disconnects_profile() {
        let (store, service) = setup(true);
        store.insert_profile(user(), "acct_1").await;
        let evt = event(
            "evt_deauth",
            "account.application.deauthorized",
            Some("acct_1"),
            json!({ "id": "ca_1", "object": "application" }),
        );
        assert!(service.process(&evt).await.is_ok());
        let Some(profile) = store.profile(user()).await else {
            panic!("profile missing");
        };
        assert_eq!(profile.stripe_account_id, None);
        assert!(!profile.charges_enabled);
        assert!(!profile.payouts_enabled);

        let audit = store.audit_events().await;
        assert_eq!(audit[0].account_id.as_deref(), Some("acct_1"));
    }
}
