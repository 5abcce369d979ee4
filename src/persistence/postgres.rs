//! PostgreSQL implementation of the store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{
    AccountRecord, AuditEvent, AuditStatus, CampaignActivation, CampaignStatus, NewNotification,
    PaymentHistoryRecord, PaymentRecord, PaymentStatus, PayoutRecord, SubscriptionRecord,
    TransferRecord, UpsertOutcome,
};
use super::{CLAIM_STALE_AFTER_SECS, SyncStore};
use crate::config::SyncConfig;
use crate::error::SyncError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

type AuditRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    i32,
    DateTime<Utc>,
    serde_json::Value,
);

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from configuration and applies the
    /// embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError::Persistence`] if the database is unreachable
    /// or a migration fails.
    pub async fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SyncError::Persistence(format!("migration failed: {e}")))?;

        Ok(Self::new(pool))
    }
}

/// Maps `RETURNING (xmax = 0)` of an insert-on-conflict to an outcome.
fn upsert_outcome(inserted: Option<bool>) -> UpsertOutcome {
    match inserted {
        Some(true) => UpsertOutcome::Inserted,
        Some(false) => UpsertOutcome::Updated,
        None => UpsertOutcome::Unchanged,
    }
}

#[async_trait]
impl SyncStore for PostgresStore {
    async fn upsert_campaign(
        &self,
        activation: &CampaignActivation,
    ) -> Result<UpsertOutcome, SyncError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO playlist_campaigns \
                (id, user_id, release_id, plan_type, plan_name, plan_price, status, payment_status, \
                 stripe_session_id, stripe_payment_intent_id, paid_at, campaign_metadata) \
             VALUES ($1, $2, $3, $4, $5, $6::bigint / 100.0, $11, $12, $7, $8, $9, $10) \
             ON CONFLICT (stripe_session_id) DO UPDATE SET \
                status = EXCLUDED.status, \
                payment_status = EXCLUDED.payment_status, \
                stripe_payment_intent_id = COALESCE(EXCLUDED.stripe_payment_intent_id, \
                                                    playlist_campaigns.stripe_payment_intent_id), \
                paid_at = EXCLUDED.paid_at, \
                campaign_metadata = playlist_campaigns.campaign_metadata || EXCLUDED.campaign_metadata, \
                updated_at = NOW() \
             WHERE playlist_campaigns.user_id = EXCLUDED.user_id \
               AND playlist_campaigns.status <> EXCLUDED.status \
             RETURNING (xmax = 0)",
        )
        .bind(Uuid::new_v4())
        .bind(activation.user_id)
        .bind(activation.release_id)
        .bind(&activation.plan_type)
        .bind(&activation.plan_name)
        .bind(activation.plan_price_cents)
        .bind(&activation.stripe_session_id)
        .bind(activation.stripe_payment_intent_id.as_deref())
        .bind(activation.paid_at)
        .bind(&activation.campaign_metadata)
        .bind(CampaignStatus::Active.as_str())
        .bind(PaymentStatus::Paid.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(upsert_outcome(inserted))
    }

    async fn mark_campaign_payment_failed(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> Result<u64, SyncError> {
        let result = sqlx::query(
            "UPDATE playlist_campaigns \
             SET status = $3, payment_status = $4, updated_at = NOW() \
             WHERE stripe_session_id = $1 AND user_id = $2 AND status <> $5",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(CampaignStatus::PaymentFailed.as_str())
        .bind(PaymentStatus::Unpaid.as_str())
        .bind(CampaignStatus::Active.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_track_paid(
        &self,
        track_id: Uuid,
        user_id: Uuid,
        session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> Result<u64, SyncError> {
        let result = sqlx::query(
            "UPDATE tracks \
             SET payment_status = $5, stripe_session_id = $3, \
                 stripe_payment_intent_id = $4, paid_at = NOW() \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(track_id)
        .bind(user_id)
        .bind(session_id)
        .bind(payment_intent_id)
        .bind(PaymentStatus::Paid.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn record_payment(&self, payment: &PaymentRecord) -> Result<UpsertOutcome, SyncError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO payments \
                (stripe_payment_intent_id, amount, currency, status, failure_reason, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (stripe_payment_intent_id) DO UPDATE SET \
                amount = EXCLUDED.amount, \
                currency = EXCLUDED.currency, \
                status = EXCLUDED.status, \
                failure_reason = EXCLUDED.failure_reason, \
                metadata = EXCLUDED.metadata, \
                updated_at = NOW() \
             RETURNING (xmax = 0)",
        )
        .bind(&payment.stripe_payment_intent_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.status)
        .bind(payment.failure_reason.as_deref())
        .bind(&payment.metadata)
        .fetch_optional(&self.pool)
        .await?;

        Ok(upsert_outcome(inserted))
    }

    async fn upsert_subscription(
        &self,
        subscription: &SubscriptionRecord,
    ) -> Result<UpsertOutcome, SyncError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO subscriptions \
                (stripe_subscription_id, artist_id, stripe_customer_id, status, \
                 current_period_end, canceled_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (stripe_subscription_id) DO UPDATE SET \
                artist_id = COALESCE(EXCLUDED.artist_id, subscriptions.artist_id), \
                stripe_customer_id = COALESCE(EXCLUDED.stripe_customer_id, subscriptions.stripe_customer_id), \
                status = EXCLUDED.status, \
                current_period_end = COALESCE(EXCLUDED.current_period_end, subscriptions.current_period_end), \
                canceled_at = EXCLUDED.canceled_at, \
                updated_at = NOW() \
             RETURNING (xmax = 0)",
        )
        .bind(&subscription.stripe_subscription_id)
        .bind(subscription.artist_id)
        .bind(subscription.stripe_customer_id.as_deref())
        .bind(&subscription.status)
        .bind(subscription.current_period_end)
        .bind(subscription.canceled_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(upsert_outcome(inserted))
    }

    async fn append_payment_history(
        &self,
        entry: &PaymentHistoryRecord,
    ) -> Result<bool, SyncError> {
        let result = sqlx::query(
            "INSERT INTO payment_history \
                (stripe_invoice_id, stripe_subscription_id, amount, currency, paid_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (stripe_invoice_id) DO NOTHING",
        )
        .bind(&entry.stripe_invoice_id)
        .bind(&entry.stripe_subscription_id)
        .bind(entry.amount)
        .bind(&entry.currency)
        .bind(entry.paid_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn append_transfer(&self, transfer: &TransferRecord) -> Result<bool, SyncError> {
        let result = sqlx::query(
            "INSERT INTO royalty_transfers \
                (stripe_transfer_id, artist_id, destination_account, amount, currency, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (stripe_transfer_id) DO NOTHING",
        )
        .bind(&transfer.stripe_transfer_id)
        .bind(transfer.artist_id)
        .bind(transfer.destination_account.as_deref())
        .bind(transfer.amount)
        .bind(&transfer.currency)
        .bind(transfer.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn upsert_payout(&self, payout: &PayoutRecord) -> Result<UpsertOutcome, SyncError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO payouts \
                (stripe_payout_id, account_id, amount, currency, status, failure_reason) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (stripe_payout_id) DO UPDATE SET \
                account_id = COALESCE(EXCLUDED.account_id, payouts.account_id), \
                status = EXCLUDED.status, \
                failure_reason = EXCLUDED.failure_reason, \
                updated_at = NOW() \
             RETURNING (xmax = 0)",
        )
        .bind(&payout.stripe_payout_id)
        .bind(payout.account_id.as_deref())
        .bind(payout.amount)
        .bind(&payout.currency)
        .bind(payout.status.as_str())
        .bind(payout.failure_reason.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(upsert_outcome(inserted))
    }

    async fn upsert_account(&self, account: &AccountRecord) -> Result<UpsertOutcome, SyncError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO stripe_accounts \
                (stripe_account_id, charges_enabled, payouts_enabled, details_submitted, \
                 verification_status) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (stripe_account_id) DO UPDATE SET \
                charges_enabled = EXCLUDED.charges_enabled, \
                payouts_enabled = EXCLUDED.payouts_enabled, \
                details_submitted = EXCLUDED.details_submitted, \
                verification_status = EXCLUDED.verification_status, \
                ready_notified = stripe_accounts.ready_notified \
                    AND EXCLUDED.charges_enabled AND EXCLUDED.payouts_enabled, \
                updated_at = NOW() \
             RETURNING (xmax = 0)",
        )
        .bind(&account.stripe_account_id)
        .bind(account.charges_enabled)
        .bind(account.payouts_enabled)
        .bind(account.details_submitted)
        .bind(account.verification_status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(upsert_outcome(inserted))
    }

    async fn claim_ready_notification(&self, account_id: &str) -> Result<bool, SyncError> {
        let result = sqlx::query(
            "UPDATE stripe_accounts SET ready_notified = TRUE \
             WHERE stripe_account_id = $1 \
               AND charges_enabled AND payouts_enabled AND NOT ready_notified",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn disconnect_account(&self, account_id: &str) -> Result<u64, SyncError> {
        let result = sqlx::query(
            "UPDATE profiles \
             SET stripe_account_id = NULL, stripe_account_status = NULL, \
                 charges_enabled = FALSE, payouts_enabled = FALSE \
             WHERE stripe_account_id = $1",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_profile_by_account(&self, account_id: &str) -> Result<Option<Uuid>, SyncError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM profiles WHERE stripe_account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, title, message, type, read) \
             VALUES ($1, $2, $3, $4, $5, FALSE)",
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_audit(&self, event_id: &str) -> Result<Option<AuditEvent>, SyncError> {
        let row = sqlx::query_as::<_, AuditRow>(
            "SELECT event_id, event_type, account_id, status, error, attempts, processed_at, payload \
             FROM webhook_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(
            |(event_id, event_type, account_id, status, error, attempts, processed_at, payload)|
             -> Result<AuditEvent, SyncError> {
                let status = AuditStatus::parse(&status).ok_or_else(|| {
                    SyncError::Persistence(format!("unknown audit status `{status}`"))
                })?;
                Ok(AuditEvent {
                    event_id,
                    event_type,
                    account_id,
                    status,
                    error,
                    attempts,
                    processed_at,
                    payload,
                })
            },
        )
        .transpose()
    }

    async fn claim_event(&self, claim: &AuditEvent) -> Result<bool, SyncError> {
        let result = sqlx::query(
            "INSERT INTO webhook_events \
                (event_id, event_type, account_id, status, error, attempts, processed_at, payload) \
             VALUES ($1, $2, $3, $4, NULL, 1, $5, $6) \
             ON CONFLICT (event_id) DO UPDATE SET \
                account_id = COALESCE(EXCLUDED.account_id, webhook_events.account_id), \
                status = EXCLUDED.status, \
                error = NULL, \
                attempts = webhook_events.attempts + 1, \
                processed_at = EXCLUDED.processed_at, \
                payload = EXCLUDED.payload \
             WHERE webhook_events.status = $7 \
                OR (webhook_events.status = EXCLUDED.status \
                    AND webhook_events.processed_at < EXCLUDED.processed_at - make_interval(secs => $8))",
        )
        .bind(&claim.event_id)
        .bind(&claim.event_type)
        .bind(claim.account_id.as_deref())
        .bind(AuditStatus::Processing.as_str())
        .bind(claim.processed_at)
        .bind(&claim.payload)
        .bind(AuditStatus::Failed.as_str())
        .bind(CLAIM_STALE_AFTER_SECS as f64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_audit(&self, audit: &AuditEvent) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO webhook_events \
                (event_id, event_type, account_id, status, error, attempts, processed_at, payload) \
             VALUES ($1, $2, $3, $4, $5, 1, $6, $7) \
             ON CONFLICT (event_id) DO UPDATE SET \
                account_id = COALESCE(EXCLUDED.account_id, webhook_events.account_id), \
                status = EXCLUDED.status, \
                error = EXCLUDED.error, \
                processed_at = EXCLUDED.processed_at, \
                payload = EXCLUDED.payload",
        )
        .bind(&audit.event_id)
        .bind(&audit.event_type)
        .bind(audit.account_id.as_deref())
        .bind(audit.status.as_str())
        .bind(audit.error.as_deref())
        .bind(audit.processed_at)
        .bind(&audit.payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
