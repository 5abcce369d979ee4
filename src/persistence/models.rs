//! Row types written and read by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::VerificationStatus;

/// Result of an insert-on-conflict write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed; one was inserted.
    Inserted,
    /// An existing row was updated.
    Updated,
    /// A row exists but the guard rejected the update.
    Unchanged,
}

/// Lifecycle of a playlist campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Placeholder created before checkout completed.
    PendingPayment,
    /// Paid and running.
    Active,
    /// Checkout finished without payment.
    PaymentFailed,
}

impl CampaignStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Active => "active",
            Self::PaymentFailed => "payment_failed",
        }
    }
}

/// Payment state recorded on a campaign or track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting checkout.
    Pending,
    /// Funds captured.
    Paid,
    /// Checkout ended unpaid.
    Unpaid,
}

impl PaymentStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
        }
    }
}

/// Values written when a paid checkout activates a campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignActivation {
    /// Checkout session id; the natural key.
    pub stripe_session_id: String,
    /// Purchasing user.
    pub user_id: Uuid,
    /// Target release, `None` for all releases.
    pub release_id: Option<Uuid>,
    /// Plan catalog key.
    pub plan_type: String,
    /// Plan display name.
    pub plan_name: String,
    /// Plan price in cents.
    pub plan_price_cents: i64,
    /// Payment intent captured by the session.
    pub stripe_payment_intent_id: Option<String>,
    /// Time the payment was confirmed.
    pub paid_at: DateTime<Utc>,
    /// Extra campaign details merged into the stored bag.
    pub campaign_metadata: serde_json::Value,
}

/// A stored playlist campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignRow {
    /// Row id.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Target release, `None` for all releases.
    pub release_id: Option<Uuid>,
    /// Plan catalog key.
    pub plan_type: String,
    /// Plan display name.
    pub plan_name: Option<String>,
    /// Plan price in cents.
    pub plan_price_cents: i64,
    /// Lifecycle status.
    pub status: CampaignStatus,
    /// Payment state.
    pub payment_status: PaymentStatus,
    /// Checkout session id.
    pub stripe_session_id: Option<String>,
    /// Payment intent id.
    pub stripe_payment_intent_id: Option<String>,
    /// Payment confirmation time.
    pub paid_at: Option<DateTime<Utc>>,
    /// Free-form campaign details.
    pub campaign_metadata: serde_json::Value,
}

impl CampaignRow {
    /// Plan price in major currency units.
    #[must_use]
    pub fn plan_price(&self) -> f64 {
        self.plan_price_cents as f64 / 100.0
    }
}

/// A payment intent outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecord {
    /// Payment intent id; the natural key.
    pub stripe_payment_intent_id: String,
    /// Amount in minor units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// `succeeded` or `failed`.
    pub status: String,
    /// Reason for a failed attempt.
    pub failure_reason: Option<String>,
    /// Intent metadata.
    pub metadata: serde_json::Value,
}

/// Mirror of a provider subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionRecord {
    /// Subscription id; the natural key.
    pub stripe_subscription_id: String,
    /// Subscribing artist, when known.
    pub artist_id: Option<Uuid>,
    /// Provider customer id.
    pub stripe_customer_id: Option<String>,
    /// Provider status, stored verbatim.
    pub status: String,
    /// End of the current billing period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Cancellation time.
    pub canceled_at: Option<DateTime<Utc>>,
}

/// A paid subscription invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentHistoryRecord {
    /// Invoice id.
    pub stripe_invoice_id: String,
    /// Subscription the invoice belongs to.
    pub stripe_subscription_id: String,
    /// Amount paid in minor units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Payment time, taken from the event's creation time.
    pub paid_at: DateTime<Utc>,
}

/// Status of a money movement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Initiated, not settled.
    Pending,
    /// Settled.
    Completed,
    /// Rejected by the bank or provider.
    Failed,
}

impl TransferStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A royalty transfer to a connected account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRecord {
    /// Transfer id.
    pub stripe_transfer_id: String,
    /// Artist receiving the royalties, when tagged.
    pub artist_id: Option<Uuid>,
    /// Destination connected account.
    pub destination_account: Option<String>,
    /// Amount in minor units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Settlement state.
    pub status: TransferStatus,
}

/// A payout from a connected account to its bank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutRecord {
    /// Payout id; the natural key.
    pub stripe_payout_id: String,
    /// Connected account that paid out.
    pub account_id: Option<String>,
    /// Amount in minor units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Settlement state.
    pub status: TransferStatus,
    /// Failure message for failed payouts.
    pub failure_reason: Option<String>,
}

/// Capability flags of a connected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRecord {
    /// Connected account id; the natural key.
    pub stripe_account_id: String,
    /// Can accept charges.
    pub charges_enabled: bool,
    /// Can receive payouts.
    pub payouts_enabled: bool,
    /// Onboarding details submitted.
    pub details_submitted: bool,
    /// Status derived from the three flags.
    pub verification_status: VerificationStatus,
}

impl AccountRecord {
    /// Returns `true` when both money-moving capabilities are on.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.charges_enabled && self.payouts_enabled
    }
}

/// Notification category, shown as an icon in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Neutral information.
    Info,
    /// Something completed.
    Success,
    /// Needs attention.
    Warning,
    /// Something failed.
    Error,
}

impl NotificationKind {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A user-facing notification to insert (always unread).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNotification {
    /// Recipient.
    pub user_id: Uuid,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Category.
    pub kind: NotificationKind,
}

/// Processing result recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Claimed by a delivery that is still running its handler.
    Processing,
    /// A handler ran (including branches that chose to skip).
    Processed,
    /// The event kind is not handled.
    Ignored,
    /// The handler failed; a redelivery will run it again.
    Failed,
}

impl AuditStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }

    /// Parses the database representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "ignored" => Some(Self::Ignored),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One row of the `webhook_events` audit log, unique per event id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// Provider event id.
    pub event_id: String,
    /// Provider event type tag.
    pub event_type: String,
    /// Connected account the event concerns.
    pub account_id: Option<String>,
    /// Processing result.
    pub status: AuditStatus,
    /// Handler error message for failed events.
    pub error: Option<String>,
    /// Number of deliveries recorded for this event id.
    pub attempts: i32,
    /// Last processing time.
    pub processed_at: DateTime<Utc>,
    /// Raw `data.object` payload.
    pub payload: serde_json::Value,
}
