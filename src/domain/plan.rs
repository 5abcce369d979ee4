//! Playlist campaign plan catalog.

/// A playlist-promotion tier.
///
/// Prices are held in cents to keep arithmetic exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Catalog key as sent in checkout metadata.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Price in cents.
    pub price_cents: i64,
    /// Marketing description stored alongside the campaign.
    pub description: &'static str,
}

/// The fixed catalog.
pub const PLANS: [Plan; 3] = [
    Plan {
        id: "indie",
        name: "Indie",
        price_cents: 9_999,
        description: "Pitch to 25+ curated playlists with a 30-day campaign report",
    },
    Plan {
        id: "pro",
        name: "Pro",
        price_cents: 29_999,
        description: "Pitch to 75+ playlists, editorial review and weekly analytics",
    },
    Plan {
        id: "superstar",
        name: "Superstar",
        price_cents: 49_999,
        description: "Pitch to 150+ playlists with priority placement and a dedicated curator",
    },
];

impl Plan {
    /// Finds a plan by catalog key.
    #[must_use]
    pub fn lookup(id: &str) -> Option<&'static Self> {
        PLANS.iter().find(|plan| plan.id == id)
    }

    /// Price in major currency units.
    #[must_use]
    pub fn price(&self) -> f64 {
        self.price_cents as f64 / 100.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn catalog_prices() {
        let expected = [("indie", 99.99), ("pro", 299.99), ("superstar", 499.99)];
        for (id, price) in expected {
            let Some(plan) = Plan::lookup(id) else {
                panic!("plan {id} missing");
            };
            assert!((plan.price() - price).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn unknown_plan_is_none() {
        assert!(Plan::lookup("platinum").is_none());
        assert!(Plan::lookup("INDIE").is_none());
    }
}
