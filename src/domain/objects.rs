//! Provider object shapes decoded from `data.object`.
//!
//! Fields are optional wherever the provider may omit them; handlers
//! decide which absences are fatal to their branch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Free-form key/value bag echoed back by the provider.
pub type Metadata = HashMap<String, String>;

/// Converts provider epoch seconds into a UTC timestamp.
#[must_use]
pub fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// A completed checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session id (`cs_...`).
    pub id: String,
    /// `payment`, `subscription` or `setup`.
    #[serde(default)]
    pub mode: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Associated payment intent id.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Subscription created by the session, in subscription mode.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Total in minor currency units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Three-letter currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Checkout metadata describing the purchase.
    #[serde(default)]
    pub metadata: Metadata,
}

impl CheckoutSession {
    /// Returns `true` when the provider reports the session as paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid") | Some("no_payment_required")
        )
    }

    /// Returns `true` when the provider reports the session as unpaid.
    #[must_use]
    pub fn is_unpaid(&self) -> bool {
        self.payment_status.as_deref() == Some("unpaid")
    }
}

/// A payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Intent id (`pi_...`).
    pub id: String,
    /// Amount in minor currency units.
    #[serde(default)]
    pub amount: i64,
    /// Three-letter currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Provider status string.
    #[serde(default)]
    pub status: Option<String>,
    /// Error from the last failed attempt.
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
    /// Intent metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Nested error object of a failed payment attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentError {
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
}

/// A customer subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription id (`sub_...`).
    pub id: String,
    /// Provider status string, stored verbatim.
    pub status: String,
    /// Customer id.
    #[serde(default)]
    pub customer: Option<String>,
    /// End of the current period, epoch seconds.
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Cancellation time, epoch seconds.
    #[serde(default)]
    pub canceled_at: Option<i64>,
    /// Subscription metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// An invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice id (`in_...`).
    pub id: String,
    /// Linked subscription, if the invoice belongs to one.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Customer id.
    #[serde(default)]
    pub customer: Option<String>,
    /// Amount paid in minor currency units.
    #[serde(default)]
    pub amount_paid: i64,
    /// Three-letter currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Invoice metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A transfer to a connected account.
#[derive(Debug, Clone, Deserialize)]
pub struct Transfer {
    /// Transfer id (`tr_...`).
    pub id: String,
    /// Amount in minor currency units.
    #[serde(default)]
    pub amount: i64,
    /// Three-letter currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Destination connected account.
    #[serde(default)]
    pub destination: Option<String>,
    /// Transfer metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A connected account.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    /// Account id (`acct_...`).
    pub id: String,
    /// Whether the account can accept charges.
    #[serde(default)]
    pub charges_enabled: bool,
    /// Whether the account can receive payouts.
    #[serde(default)]
    pub payouts_enabled: bool,
    /// Whether onboarding details were submitted.
    #[serde(default)]
    pub details_submitted: bool,
}

/// A payout from a connected account to its bank.
#[derive(Debug, Clone, Deserialize)]
pub struct Payout {
    /// Payout id (`po_...`).
    pub id: String,
    /// Amount in minor currency units.
    #[serde(default)]
    pub amount: i64,
    /// Three-letter currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Failure message for failed payouts.
    #[serde(default)]
    pub failure_message: Option<String>,
}

/// A single account capability.
#[derive(Debug, Clone, Deserialize)]
pub struct Capability {
    /// Capability name (e.g. `card_payments`).
    pub id: String,
    /// Owning account.
    #[serde(default)]
    pub account: Option<String>,
    /// `active`, `inactive`, `pending` or `unrequested`.
    #[serde(default)]
    pub status: Option<String>,
}

impl Capability {
    /// Returns `true` when the capability is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checkout_session_tolerates_missing_fields() {
        let Ok(session) = serde_json::from_value::<CheckoutSession>(json!({ "id": "cs_1" })) else {
            panic!("minimal session should decode");
        };
        assert!(session.metadata.is_empty());
        assert!(!session.is_paid());
        assert!(!session.is_unpaid());
    }

    #[test]
    fn payment_status_helpers() {
        let Ok(session) = serde_json::from_value::<CheckoutSession>(json!({
            "id": "cs_1",
            "payment_status": "no_payment_required"
        })) else {
            panic!("decode");
        };
        assert!(session.is_paid());
    }

    #[test]
    fn epoch_conversion() {
        let Some(ts) = epoch_to_utc(1_700_000_000) else {
            panic!("valid epoch");
        };
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn capability_active_flag() {
        let Ok(cap) = serde_json::from_value::<Capability>(json!({
            "id": "transfers",
            "account": "acct_1",
            "status": "inactive"
        })) else {
            panic!("decode");
        };
        assert!(!cap.is_active());
    }
}
