//! Checkout metadata decoded into a tagged union at the boundary.
//!
//! The provider echoes back whatever metadata the checkout was created
//! with. Instead of branching on raw strings inside handlers, the bag is
//! validated once into a [`CheckoutPurpose`].

use uuid::Uuid;

use super::objects::{CheckoutSession, Metadata};
use crate::error::SyncError;

/// What a completed checkout session paid for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutPurpose {
    /// Paid distribution upload of a single track.
    TrackUpload {
        /// Track being paid for.
        track_id: Uuid,
        /// Uploading user.
        user_id: Uuid,
    },
    /// Playlist-promotion campaign purchase.
    PlaylistCampaign(CampaignOrder),
    /// Artist subscription started through checkout.
    Subscription {
        /// Subscribing artist.
        user_id: Uuid,
    },
    /// Any other `type` tag; kept for logging only.
    Unknown(String),
}

/// Campaign order details shared by the current and legacy metadata shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignOrder {
    /// Purchasing user.
    pub user_id: Uuid,
    /// Plan catalog key.
    pub plan_id: String,
    /// Release the campaign targets; `None` applies to all releases.
    pub release_id: Option<Uuid>,
    /// Whether the order used the older `playlist_pitching` shape.
    pub legacy: bool,
}

impl CheckoutPurpose {
    /// Decodes the purpose of a checkout session.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidMetadata`] when a recognized `type` is
    /// missing a required key or carries an unparsable id.
    pub fn from_session(session: &CheckoutSession) -> Result<Self, SyncError> {
        let meta = &session.metadata;
        match lookup(meta, &["type"]) {
            Some("track_upload") => Ok(Self::TrackUpload {
                track_id: required_uuid(meta, &["track_id", "trackId"])?,
                user_id: required_uuid(meta, &["user_id", "userId"])?,
            }),
            Some("playlist_campaign") => Ok(Self::PlaylistCampaign(CampaignOrder {
                user_id: required_uuid(meta, &["userId", "user_id"])?,
                plan_id: required(meta, &["planId", "plan_id"])?.to_string(),
                release_id: optional_release(meta, &["releaseId", "release_id"])?,
                legacy: false,
            })),
            Some("playlist_pitching") => Ok(Self::PlaylistCampaign(CampaignOrder {
                user_id: required_uuid(meta, &["user_id", "userId"])?,
                plan_id: required(meta, &["plan_id", "planId", "plan"])?.to_string(),
                release_id: optional_release(meta, &["release_id", "releaseId"])?,
                legacy: true,
            })),
            _ if session.mode.as_deref() == Some("subscription") => Ok(Self::Subscription {
                user_id: required_uuid(meta, &["user_id", "userId", "artist_id"])?,
            }),
            Some(other) => Ok(Self::Unknown(other.to_string())),
            None => Ok(Self::Unknown(String::new())),
        }
    }
}

fn lookup<'a>(meta: &'a Metadata, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| meta.get(*key))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(meta: &'a Metadata, keys: &[&str]) -> Result<&'a str, SyncError> {
    lookup(meta, keys).ok_or_else(|| {
        SyncError::InvalidMetadata(format!("missing required key `{}`", keys.join("`/`")))
    })
}

fn required_uuid(meta: &Metadata, keys: &[&str]) -> Result<Uuid, SyncError> {
    let raw = required(meta, keys)?;
    Uuid::parse_str(raw)
        .map_err(|e| SyncError::InvalidMetadata(format!("`{raw}` is not a valid id: {e}")))
}

/// `"all"` and absent both mean the campaign is not tied to one release.
fn optional_release(meta: &Metadata, keys: &[&str]) -> Result<Option<Uuid>, SyncError> {
    match lookup(meta, keys) {
        None | Some("all") | Some("null") => Ok(None),
        Some(raw) => Uuid::parse_str(raw).map(Some).map_err(|e| {
            SyncError::InvalidMetadata(format!("`{raw}` is not a valid release id: {e}"))
        }),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const USER: &str = "8c1d7f3e-3f7a-4a43-9a55-0a4ad6f1c001";
    const RELEASE: &str = "0b8e1fd6-2f4c-4d0e-bf39-8d9a0c5e7002";

    fn session(mode: &str, pairs: &[(&str, &str)]) -> CheckoutSession {
        CheckoutSession {
            id: "cs_test".to_string(),
            mode: Some(mode.to_string()),
            payment_status: Some("paid".to_string()),
            payment_intent: None,
            subscription: None,
            amount_total: None,
            currency: None,
            metadata: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn campaign_with_camel_case_keys() {
        let s = session(
            "payment",
            &[
                ("type", "playlist_campaign"),
                ("userId", USER),
                ("planId", "pro"),
                ("releaseId", RELEASE),
            ],
        );
        let Ok(CheckoutPurpose::PlaylistCampaign(order)) = CheckoutPurpose::from_session(&s) else {
            panic!("expected campaign");
        };
        assert_eq!(order.plan_id, "pro");
        assert_eq!(order.user_id.to_string(), USER);
        assert_eq!(order.release_id.map(|r| r.to_string()).as_deref(), Some(RELEASE));
        assert!(!order.legacy);
    }

    #[test]
    fn legacy_pitching_shape_is_a_campaign() {
        let s = session(
            "payment",
            &[
                ("type", "playlist_pitching"),
                ("user_id", USER),
                ("plan_id", "indie"),
                ("release_id", "all"),
            ],
        );
        let Ok(CheckoutPurpose::PlaylistCampaign(order)) = CheckoutPurpose::from_session(&s) else {
            panic!("expected campaign");
        };
        assert!(order.legacy);
        assert_eq!(order.release_id, None);
    }

    #[test]
    fn campaign_without_plan_is_invalid() {
        let s = session("payment", &[("type", "playlist_campaign"), ("userId", USER)]);
        let result = CheckoutPurpose::from_session(&s);
        assert!(matches!(result, Err(SyncError::InvalidMetadata(_))));
    }

    #[test]
    fn campaign_without_user_is_invalid() {
        let s = session("payment", &[("type", "playlist_campaign"), ("planId", "pro")]);
        let result = CheckoutPurpose::from_session(&s);
        assert!(matches!(result, Err(SyncError::InvalidMetadata(_))));
    }

    #[test]
    fn subscription_mode_without_type() {
        let s = session("subscription", &[("user_id", USER)]);
        let result = CheckoutPurpose::from_session(&s);
        assert!(matches!(result, Ok(CheckoutPurpose::Subscription { .. })));
    }

    #[test]
    fn unrecognized_type_is_unknown() {
        let s = session("payment", &[("type", "merch_order")]);
        let result = CheckoutPurpose::from_session(&s);
        assert!(matches!(result, Ok(CheckoutPurpose::Unknown(t)) if t == "merch_order"));
    }

    #[test]
    fn bad_track_id_is_invalid() {
        let s = session(
            "payment",
            &[("type", "track_upload"), ("track_id", "42"), ("user_id", USER)],
        );
        let result = CheckoutPurpose::from_session(&s);
        assert!(matches!(result, Err(SyncError::InvalidMetadata(_))));
    }
}
