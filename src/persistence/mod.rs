//! Persistence layer: the store behind the webhook handlers.
//!
//! [`SyncStore`] lists every read and write the handlers perform, one
//! method per logical operation. [`postgres::PostgresStore`] is the
//! production implementation; [`memory::MemoryStore`] keeps everything in
//! process and backs the test suite and `PERSISTENCE_ENABLED=false` runs.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SyncError;
use models::{
    AccountRecord, AuditEvent, CampaignActivation, NewNotification, PaymentHistoryRecord,
    PaymentRecord, PayoutRecord, SubscriptionRecord, TransferRecord, UpsertOutcome,
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Age after which a `processing` claim is treated as abandoned, for
/// example by a request that timed out mid-handler.
pub const CLAIM_STALE_AFTER_SECS: i64 = 300;

/// Storage operations used by the event handlers.
///
/// Every write keyed on a provider id is an atomic insert-on-conflict, so
/// concurrent redelivery of one event cannot create duplicate rows.
#[async_trait]
pub trait SyncStore: Send + Sync + std::fmt::Debug {
    /// Activates the campaign for a checkout session, inserting it if no
    /// placeholder exists. An existing row is only updated when it belongs
    /// to the same user and is not already active.
    async fn upsert_campaign(
        &self,
        activation: &CampaignActivation,
    ) -> Result<UpsertOutcome, SyncError>;

    /// Marks the campaign of `(session_id, user_id)` as `payment_failed`.
    /// Never inserts. Returns the number of rows changed.
    async fn mark_campaign_payment_failed(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> Result<u64, SyncError>;

    /// Marks an uploaded track as paid. Returns the number of rows changed.
    async fn mark_track_paid(
        &self,
        track_id: Uuid,
        user_id: Uuid,
        session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> Result<u64, SyncError>;

    /// Records the outcome of a payment intent, keyed on its id.
    async fn record_payment(&self, payment: &PaymentRecord) -> Result<UpsertOutcome, SyncError>;

    /// Mirrors a subscription, keyed on its id.
    async fn upsert_subscription(
        &self,
        subscription: &SubscriptionRecord,
    ) -> Result<UpsertOutcome, SyncError>;

    /// Appends a paid subscription invoice, once per invoice id.
    /// Returns `false` if the invoice was already recorded.
    async fn append_payment_history(
        &self,
        entry: &PaymentHistoryRecord,
    ) -> Result<bool, SyncError>;

    /// Appends a royalty transfer, once per transfer id.
    /// Returns `false` if the transfer was already recorded.
    async fn append_transfer(&self, transfer: &TransferRecord) -> Result<bool, SyncError>;

    /// Records a payout status, keyed on the payout id.
    async fn upsert_payout(&self, payout: &PayoutRecord) -> Result<UpsertOutcome, SyncError>;

    /// Overwrites the stored capability flags of a connected account.
    /// An account that is no longer ready becomes eligible for a new
    /// ready notification.
    async fn upsert_account(&self, account: &AccountRecord) -> Result<UpsertOutcome, SyncError>;

    /// Atomically marks a ready account as notified. Returns `true` for
    /// exactly one caller per transition into ready.
    async fn claim_ready_notification(&self, account_id: &str) -> Result<bool, SyncError>;

    /// Clears the connected-account fields of the owning profile.
    /// Returns the number of profiles changed.
    async fn disconnect_account(&self, account_id: &str) -> Result<u64, SyncError>;

    /// Resolves the user owning a connected account.
    async fn find_profile_by_account(&self, account_id: &str) -> Result<Option<Uuid>, SyncError>;

    /// Inserts an unread notification.
    async fn insert_notification(&self, notification: &NewNotification) -> Result<(), SyncError>;

    /// Loads the audit row of an event.
    async fn find_audit(&self, event_id: &str) -> Result<Option<AuditEvent>, SyncError>;

    /// Claims an event for processing by writing a `processing` audit row.
    ///
    /// Returns `true` when no row existed, when the previous attempt
    /// `failed`, or when a `processing` claim is older than
    /// [`CLAIM_STALE_AFTER_SECS`]; a reclaimed row has its attempt count
    /// incremented. Returns `false` for every other caller.
    async fn claim_event(&self, claim: &AuditEvent) -> Result<bool, SyncError>;

    /// Stores the final status of a claimed event, keeping its attempt
    /// count.
    async fn record_audit(&self, audit: &AuditEvent) -> Result<(), SyncError>;
}
