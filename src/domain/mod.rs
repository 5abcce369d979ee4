//! Domain layer: webhook envelope, provider objects, and the rules for
//! interpreting them.
//!
//! Nothing in here touches storage. Handlers in [`crate::service`]
//! combine these types with a [`crate::persistence::SyncStore`].

pub mod checkout_purpose;
pub mod event;
pub mod objects;
pub mod plan;
pub mod verification;

pub use checkout_purpose::{CampaignOrder, CheckoutPurpose};
pub use event::{EventData, EventKind, WebhookEvent};
pub use plan::Plan;
pub use verification::VerificationStatus;
