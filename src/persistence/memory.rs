//! In-process store.
//!
//! Mirrors the PostgreSQL semantics of every [`SyncStore`] operation,
//! including the conflict guards, so handler behavior is identical across
//! both backends. Also exposes inspection and seeding helpers for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    AccountRecord, AuditEvent, AuditStatus, CampaignActivation, CampaignRow, CampaignStatus, NewNotification,
    PaymentHistoryRecord, PaymentRecord, PaymentStatus, PayoutRecord, SubscriptionRecord,
    TransferRecord, UpsertOutcome,
};
use super::{CLAIM_STALE_AFTER_SECS, SyncStore};
use crate::error::SyncError;

/// Connected-account fields of an application profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileRow {
    /// Connected account id.
    pub stripe_account_id: Option<String>,
    /// Provider-side account status.
    pub stripe_account_status: Option<String>,
    /// Mirrored charges flag.
    pub charges_enabled: bool,
    /// Mirrored payouts flag.
    pub payouts_enabled: bool,
}

/// Payment fields of an uploaded track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRow {
    /// Uploading user.
    pub user_id: Uuid,
    /// Payment state.
    pub payment_status: PaymentStatus,
    /// Checkout session that paid for the upload.
    pub stripe_session_id: Option<String>,
    /// Payment intent of that session.
    pub stripe_payment_intent_id: Option<String>,
    /// Payment time.
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<Uuid, ProfileRow>,
    tracks: HashMap<Uuid, TrackRow>,
    campaigns: Vec<CampaignRow>,
    payments: HashMap<String, PaymentRecord>,
    subscriptions: HashMap<String, SubscriptionRecord>,
    payment_history: Vec<PaymentHistoryRecord>,
    transfers: Vec<TransferRecord>,
    payouts: HashMap<String, PayoutRecord>,
    accounts: HashMap<String, AccountRecord>,
    ready_notified: HashSet<String>,
    notifications: Vec<NewNotification>,
    audit: HashMap<String, AuditEvent>,
}

/// Store kept entirely in memory behind a [`tokio::sync::RwLock`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    data_writes: AtomicU64,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent non-audit write fail, to simulate an outage.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes outside the audit log.
    #[must_use]
    pub fn data_writes(&self) -> u64 {
        self.data_writes.load(Ordering::SeqCst)
    }

    fn begin_write(&self) -> Result<(), SyncError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn count_write(&self) {
        self.data_writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Seeds a profile linked to a connected account.
    pub async fn insert_profile(&self, user_id: Uuid, account_id: &str) {
        self.tables.write().await.profiles.insert(
            user_id,
            ProfileRow {
                stripe_account_id: Some(account_id.to_string()),
                stripe_account_status: Some("active".to_string()),
                charges_enabled: true,
                payouts_enabled: true,
            },
        );
    }

    /// Seeds an unpaid track.
    pub async fn insert_track(&self, track_id: Uuid, user_id: Uuid) {
        self.tables.write().await.tracks.insert(
            track_id,
            TrackRow {
                user_id,
                payment_status: PaymentStatus::Pending,
                stripe_session_id: None,
                stripe_payment_intent_id: None,
                paid_at: None,
            },
        );
    }

    /// Seeds a `pending_payment` campaign placeholder, as the application
    /// does when it creates a checkout session.
    pub async fn insert_campaign_placeholder(
        &self,
        session_id: &str,
        user_id: Uuid,
        plan_type: &str,
        plan_price_cents: i64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.write().await.campaigns.push(CampaignRow {
            id,
            user_id,
            release_id: None,
            plan_type: plan_type.to_string(),
            plan_name: None,
            plan_price_cents,
            status: CampaignStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            stripe_session_id: Some(session_id.to_string()),
            stripe_payment_intent_id: None,
            paid_at: None,
            campaign_metadata: serde_json::json!({}),
        });
        id
    }

    /// All campaigns.
    pub async fn campaigns(&self) -> Vec<CampaignRow> {
        self.tables.read().await.campaigns.clone()
    }

    /// A single track.
    pub async fn track(&self, track_id: Uuid) -> Option<TrackRow> {
        self.tables.read().await.tracks.get(&track_id).cloned()
    }

    /// A single profile.
    pub async fn profile(&self, user_id: Uuid) -> Option<ProfileRow> {
        self.tables.read().await.profiles.get(&user_id).cloned()
    }

    /// A single payment record.
    pub async fn payment(&self, payment_intent_id: &str) -> Option<PaymentRecord> {
        self.tables
            .read()
            .await
            .payments
            .get(payment_intent_id)
            .cloned()
    }

    /// A single subscription.
    pub async fn subscription(&self, subscription_id: &str) -> Option<SubscriptionRecord> {
        self.tables
            .read()
            .await
            .subscriptions
            .get(subscription_id)
            .cloned()
    }

    /// All payment history rows.
    pub async fn payment_history(&self) -> Vec<PaymentHistoryRecord> {
        self.tables.read().await.payment_history.clone()
    }

    /// All transfers.
    pub async fn transfers(&self) -> Vec<TransferRecord> {
        self.tables.read().await.transfers.clone()
    }

    /// A single payout.
    pub async fn payout(&self, payout_id: &str) -> Option<PayoutRecord> {
        self.tables.read().await.payouts.get(payout_id).cloned()
    }

    /// All notifications in insertion order.
    pub async fn notifications(&self) -> Vec<NewNotification> {
        self.tables.read().await.notifications.clone()
    }

    /// All audit rows.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.tables.read().await.audit.values().cloned().collect()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn upsert_campaign(
        &self,
        activation: &CampaignActivation,
    ) -> Result<UpsertOutcome, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let existing = tables
            .campaigns
            .iter_mut()
            .find(|c| c.stripe_session_id.as_deref() == Some(&activation.stripe_session_id));

        let outcome = match existing {
            Some(row) if row.user_id != activation.user_id || row.status == CampaignStatus::Active => {
                UpsertOutcome::Unchanged
            }
            Some(row) => {
                row.status = CampaignStatus::Active;
                row.payment_status = PaymentStatus::Paid;
                if activation.stripe_payment_intent_id.is_some() {
                    row.stripe_payment_intent_id = activation.stripe_payment_intent_id.clone();
                }
                row.paid_at = Some(activation.paid_at);
                merge_json(&mut row.campaign_metadata, &activation.campaign_metadata);
                UpsertOutcome::Updated
            }
            None => {
                tables.campaigns.push(CampaignRow {
                    id: Uuid::new_v4(),
                    user_id: activation.user_id,
                    release_id: activation.release_id,
                    plan_type: activation.plan_type.clone(),
                    plan_name: Some(activation.plan_name.clone()),
                    plan_price_cents: activation.plan_price_cents,
                    status: CampaignStatus::Active,
                    payment_status: PaymentStatus::Paid,
                    stripe_session_id: Some(activation.stripe_session_id.clone()),
                    stripe_payment_intent_id: activation.stripe_payment_intent_id.clone(),
                    paid_at: Some(activation.paid_at),
                    campaign_metadata: activation.campaign_metadata.clone(),
                });
                UpsertOutcome::Inserted
            }
        };
        if outcome != UpsertOutcome::Unchanged {
            self.count_write();
        }
        Ok(outcome)
    }

    async fn mark_campaign_payment_failed(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> Result<u64, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for row in tables.campaigns.iter_mut().filter(|c| {
            c.stripe_session_id.as_deref() == Some(session_id)
                && c.user_id == user_id
                && c.status != CampaignStatus::Active
        }) {
            row.status = CampaignStatus::PaymentFailed;
            row.payment_status = PaymentStatus::Unpaid;
            changed += 1;
        }
        if changed > 0 {
            self.count_write();
        }
        Ok(changed)
    }

    async fn mark_track_paid(
        &self,
        track_id: Uuid,
        user_id: Uuid,
        session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> Result<u64, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let Some(track) = tables
            .tracks
            .get_mut(&track_id)
            .filter(|t| t.user_id == user_id)
        else {
            return Ok(0);
        };
        track.payment_status = PaymentStatus::Paid;
        track.stripe_session_id = Some(session_id.to_string());
        track.stripe_payment_intent_id = payment_intent_id.map(str::to_string);
        track.paid_at = Some(Utc::now());
        self.count_write();
        Ok(1)
    }

    async fn record_payment(&self, payment: &PaymentRecord) -> Result<UpsertOutcome, SyncError> {
        self.begin_write()?;
        let previous = self
            .tables
            .write()
            .await
            .payments
            .insert(payment.stripe_payment_intent_id.clone(), payment.clone());
        self.count_write();
        Ok(replaced(previous.is_some()))
    }

    async fn upsert_subscription(
        &self,
        subscription: &SubscriptionRecord,
    ) -> Result<UpsertOutcome, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let key = subscription.stripe_subscription_id.clone();
        let outcome = match tables.subscriptions.get_mut(&key) {
            Some(row) => {
                row.artist_id = subscription.artist_id.or(row.artist_id);
                if subscription.stripe_customer_id.is_some() {
                    row.stripe_customer_id = subscription.stripe_customer_id.clone();
                }
                row.status = subscription.status.clone();
                row.current_period_end = subscription.current_period_end.or(row.current_period_end);
                row.canceled_at = subscription.canceled_at;
                UpsertOutcome::Updated
            }
            None => {
                tables.subscriptions.insert(key, subscription.clone());
                UpsertOutcome::Inserted
            }
        };
        self.count_write();
        Ok(outcome)
    }

    async fn append_payment_history(
        &self,
        entry: &PaymentHistoryRecord,
    ) -> Result<bool, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        if tables
            .payment_history
            .iter()
            .any(|h| h.stripe_invoice_id == entry.stripe_invoice_id)
        {
            return Ok(false);
        }
        tables.payment_history.push(entry.clone());
        self.count_write();
        Ok(true)
    }

    async fn append_transfer(&self, transfer: &TransferRecord) -> Result<bool, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        if tables
            .transfers
            .iter()
            .any(|t| t.stripe_transfer_id == transfer.stripe_transfer_id)
        {
            return Ok(false);
        }
        tables.transfers.push(transfer.clone());
        self.count_write();
        Ok(true)
    }

    async fn upsert_payout(&self, payout: &PayoutRecord) -> Result<UpsertOutcome, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let outcome = match tables.payouts.get_mut(&payout.stripe_payout_id) {
            Some(row) => {
                if payout.account_id.is_some() {
                    row.account_id = payout.account_id.clone();
                }
                row.status = payout.status;
                row.failure_reason = payout.failure_reason.clone();
                UpsertOutcome::Updated
            }
            None => {
                tables
                    .payouts
                    .insert(payout.stripe_payout_id.clone(), payout.clone());
                UpsertOutcome::Inserted
            }
        };
        self.count_write();
        Ok(outcome)
    }

    async fn upsert_account(&self, account: &AccountRecord) -> Result<UpsertOutcome, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        if !account.is_ready() {
            tables.ready_notified.remove(&account.stripe_account_id);
        }
        let previous = tables
            .accounts
            .insert(account.stripe_account_id.clone(), account.clone());
        self.count_write();
        Ok(replaced(previous.is_some()))
    }

    async fn claim_ready_notification(&self, account_id: &str) -> Result<bool, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let ready = tables
            .accounts
            .get(account_id)
            .is_some_and(AccountRecord::is_ready);
        let claimed = ready && tables.ready_notified.insert(account_id.to_string());
        if claimed {
            self.count_write();
        }
        Ok(claimed)
    }

    async fn disconnect_account(&self, account_id: &str) -> Result<u64, SyncError> {
        self.begin_write()?;
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for profile in tables
            .profiles
            .values_mut()
            .filter(|p| p.stripe_account_id.as_deref() == Some(account_id))
        {
            *profile = ProfileRow::default();
            changed += 1;
        }
        if changed > 0 {
            self.count_write();
        }
        Ok(changed)
    }

    async fn find_profile_by_account(&self, account_id: &str) -> Result<Option<Uuid>, SyncError> {
        Ok(self
            .tables
            .read()
            .await
            .profiles
            .iter()
            .find(|(_, p)| p.stripe_account_id.as_deref() == Some(account_id))
            .map(|(id, _)| *id))
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<(), SyncError> {
        self.begin_write()?;
        self.tables
            .write()
            .await
            .notifications
            .push(notification.clone());
        self.count_write();
        Ok(())
    }

    async fn find_audit(&self, event_id: &str) -> Result<Option<AuditEvent>, SyncError> {
        Ok(self.tables.read().await.audit.get(event_id).cloned())
    }

    async fn claim_event(&self, claim: &AuditEvent) -> Result<bool, SyncError> {
        let mut tables = self.tables.write().await;
        let stale_before = claim.processed_at - Duration::seconds(CLAIM_STALE_AFTER_SECS);
        match tables.audit.get_mut(&claim.event_id) {
            None => {
                tables.audit.insert(
                    claim.event_id.clone(),
                    AuditEvent {
                        status: AuditStatus::Processing,
                        error: None,
                        attempts: 1,
                        ..claim.clone()
                    },
                );
                Ok(true)
            }
            Some(row)
                if row.status == AuditStatus::Failed
                    || (row.status == AuditStatus::Processing && row.processed_at < stale_before) =>
            {
                let attempts = row.attempts + 1;
                let account_id = claim.account_id.clone().or_else(|| row.account_id.take());
                *row = AuditEvent {
                    status: AuditStatus::Processing,
                    error: None,
                    attempts,
                    account_id,
                    ..claim.clone()
                };
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    async fn record_audit(&self, audit: &AuditEvent) -> Result<(), SyncError> {
        let mut tables = self.tables.write().await;
        match tables.audit.get_mut(&audit.event_id) {
            Some(row) => {
                let attempts = row.attempts;
                let account_id = audit.account_id.clone().or_else(|| row.account_id.take());
                *row = AuditEvent {
                    attempts,
                    account_id,
                    ..audit.clone()
                };
            }
            None => {
                tables.audit.insert(
                    audit.event_id.clone(),
                    AuditEvent {
                        attempts: 1,
                        ..audit.clone()
                    },
                );
            }
        }
        Ok(())
    }
}

fn replaced(existed: bool) -> UpsertOutcome {
    if existed {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    }
}

/// Shallow object merge, matching PostgreSQL's `jsonb || jsonb`.
fn merge_json(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}
