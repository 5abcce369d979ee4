//! Verified webhook event envelope and the supported event kinds.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A webhook event as delivered by the payment provider.
///
/// Only the envelope is typed; the embedded `data.object` stays a
/// [`serde_json::Value`] until a handler decodes the shape it expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Provider event id (`evt_...`).
    pub id: String,
    /// Event type tag (e.g. `"checkout.session.completed"`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Creation time in Unix epoch seconds.
    #[serde(default)]
    pub created: i64,
    /// Connected account the event originated from, if any.
    #[serde(default)]
    pub account: Option<String>,
    /// Event payload.
    pub data: EventData,
}

/// The `data` member of a [`WebhookEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The provider object the event describes.
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Parses a raw (already verified) request body.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MalformedEvent`] if the body is not a valid
    /// event envelope.
    pub fn from_slice(body: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(body).map_err(|e| SyncError::MalformedEvent(e.to_string()))
    }

    /// Returns the recognized kind, or `None` for unsupported types.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.event_type)
    }

    /// Decodes `data.object` into the provider object type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MalformedEvent`] if the object does not have
    /// the expected shape.
    pub fn object<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        T::deserialize(&self.data.object).map_err(|e| {
            SyncError::MalformedEvent(format!("{} object: {e}", self.event_type))
        })
    }

    /// Resolves the connected account this event concerns.
    ///
    /// Prefers the envelope-level `account`. Falls back to the object's
    /// `account` field, the `destination` of a transfer, or the object id
    /// itself for `account.*` events.
    #[must_use]
    pub fn account_id(&self) -> Option<String> {
        if let Some(account) = self.account.as_deref().filter(|a| !a.is_empty()) {
            return Some(account.to_string());
        }
        let object = &self.data.object;
        let field = |name: &str| {
            object
                .get(name)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        match self.kind() {
            Some(EventKind::AccountUpdated) => field("id"),
            Some(EventKind::TransferCreated) => field("destination"),
            _ => field("account"),
        }
    }
}

/// The twelve event kinds the synchronizer acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `checkout.session.completed`
    CheckoutSessionCompleted,
    /// `payment_intent.succeeded`
    PaymentIntentSucceeded,
    /// `payment_intent.payment_failed`
    PaymentIntentFailed,
    /// `customer.subscription.updated`
    SubscriptionUpdated,
    /// `customer.subscription.deleted`
    SubscriptionDeleted,
    /// `invoice.payment_succeeded`
    InvoicePaymentSucceeded,
    /// `transfer.created`
    TransferCreated,
    /// `account.updated`
    AccountUpdated,
    /// `payout.paid`
    PayoutPaid,
    /// `payout.failed`
    PayoutFailed,
    /// `capability.updated`
    CapabilityUpdated,
    /// `account.application.deauthorized`
    AccountDeauthorized,
}

impl EventKind {
    /// Every supported kind, in the order the descriptor lists them.
    pub const ALL: [Self; 12] = [
        Self::CheckoutSessionCompleted,
        Self::PaymentIntentSucceeded,
        Self::PaymentIntentFailed,
        Self::SubscriptionUpdated,
        Self::SubscriptionDeleted,
        Self::InvoicePaymentSucceeded,
        Self::TransferCreated,
        Self::AccountUpdated,
        Self::PayoutPaid,
        Self::PayoutFailed,
        Self::CapabilityUpdated,
        Self::AccountDeauthorized,
    ];

    /// Returns the provider's wire tag for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::PaymentIntentFailed => "payment_intent.payment_failed",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::TransferCreated => "transfer.created",
            Self::AccountUpdated => "account.updated",
            Self::PayoutPaid => "payout.paid",
            Self::PayoutFailed => "payout.failed",
            Self::CapabilityUpdated => "capability.updated",
            Self::AccountDeauthorized => "account.application.deauthorized",
        }
    }

    /// Parses a wire tag. Unsupported tags yield `None`.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
