//! Connected-account verification status derived from capability flags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Onboarding state of a connected account.
///
/// Never stored independently of the flags it is computed from; every
/// `account.updated` event recomputes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Onboarding details not yet submitted.
    PendingSubmission,
    /// Details submitted, capabilities not yet granted.
    PendingReview,
    /// Charges and payouts both enabled.
    Verified,
}

impl VerificationStatus {
    /// Derives the status from the three provider flags.
    #[must_use]
    pub const fn from_flags(
        charges_enabled: bool,
        payouts_enabled: bool,
        details_submitted: bool,
    ) -> Self {
        if charges_enabled && payouts_enabled {
            Self::Verified
        } else if details_submitted {
            Self::PendingReview
        } else {
            Self::PendingSubmission
        }
    }

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingSubmission => "pending_submission",
            Self::PendingReview => "pending_review",
            Self::Verified => "verified",
        }
    }

    /// Parses the database representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending_submission" => Some(Self::PendingSubmission),
            "pending_review" => Some(Self::PendingReview),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_status() {
        use VerificationStatus::*;
        assert_eq!(VerificationStatus::from_flags(false, false, false), PendingSubmission);
        assert_eq!(VerificationStatus::from_flags(false, false, true), PendingReview);
        assert_eq!(VerificationStatus::from_flags(true, false, true), PendingReview);
        assert_eq!(VerificationStatus::from_flags(true, true, false), Verified);
        assert_eq!(VerificationStatus::from_flags(true, true, true), Verified);
    }

    #[test]
    fn parse_matches_as_str() {
        for status in [
            VerificationStatus::PendingSubmission,
            VerificationStatus::PendingReview,
            VerificationStatus::Verified,
        ] {
            assert_eq!(VerificationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VerificationStatus::parse("restricted"), None);
    }
}
