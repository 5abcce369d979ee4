//! Best-effort user notifications shared by several handlers.
//!
//! A failed notification never fails the handler that triggered it.

use uuid::Uuid;

use crate::persistence::SyncStore;
use crate::persistence::models::{NewNotification, NotificationKind};

/// Inserts a notification for `user_id`, logging instead of failing.
pub async fn notify_user(
    store: &dyn SyncStore,
    user_id: Uuid,
    title: &str,
    message: String,
    kind: NotificationKind,
) {
    let notification = NewNotification {
        user_id,
        title: title.to_string(),
        message,
        kind,
    };
    match store.insert_notification(&notification).await {
        Ok(()) => tracing::debug!(%user_id, title, "notification created"),
        Err(e) => tracing::error!(%user_id, title, error = %e, "failed to create notification"),
    }
}

/// Resolves the owner of a connected account and notifies them.
///
/// Returns `true` if an owner was found.
pub async fn notify_account_owner(
    store: &dyn SyncStore,
    account_id: &str,
    title: &str,
    message: String,
    kind: NotificationKind,
) -> bool {
    match store.find_profile_by_account(account_id).await {
        Ok(Some(user_id)) => {
            notify_user(store, user_id, title, message, kind).await;
            true
        }
        Ok(None) => {
            tracing::warn!(account_id, title, "no profile linked to account; notification skipped");
            false
        }
        Err(e) => {
            tracing::error!(account_id, error = %e, "profile lookup failed; notification skipped");
            false
        }
    }
}

/// Formats a minor-unit amount as `12.50 USD`.
#[must_use]
pub fn format_amount(minor: i64, currency: &str) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!(
        "{sign}{}.{:02} {}",
        abs / 100,
        abs % 100,
        currency.to_uppercase()
    )
}
