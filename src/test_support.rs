//! Shared fixtures for unit tests.

use serde_json::{Value, json};

use crate::domain::{EventData, WebhookEvent};

pub(crate) const USER: &str = "8c1d7f3e-3f7a-4a43-9a55-0a4ad6f1c001";
pub(crate) const CREATED: i64 = 1_700_000_000;

pub(crate) fn event(id: &str, event_type: &str, account: Option<&str>, object: Value) -> WebhookEvent {
    WebhookEvent {
        id: id.to_string(),
        event_type: event_type.to_string(),
        created: CREATED,
        account: account.map(str::to_string),
        data: EventData { object },
    }
}

pub(crate) fn campaign_checkout(id: &str, session_id: &str, payment_status: &str) -> WebhookEvent {
    event(
        id,
        "checkout.session.completed",
        None,
        json!({
            "id": session_id,
            "object": "checkout.session",
            "mode": "payment",
            "payment_status": payment_status,
            "payment_intent": "pi_campaign",
            "amount_total": 29_999,
            "currency": "usd",
            "metadata": {
                "type": "playlist_campaign",
                "userId": USER,
                "planId": "pro"
            }
        }),
    )
}

pub(crate) fn account_updated(id: &str, account_id: &str, charges: bool, payouts: bool) -> WebhookEvent {
    event(
        id,
        "account.updated",
        Some(account_id),
        json!({
            "id": account_id,
            "object": "account",
            "charges_enabled": charges,
            "payouts_enabled": payouts,
            "details_submitted": true
        }),
    )
}
