//! # payment-event-sync
//!
//! Receives signed payment-provider webhooks and mirrors each event into
//! the application's PostgreSQL tables: campaign activations, track upload
//! payments, subscriptions, connected-account status, royalty transfers
//! and payouts. Every delivery is recorded in an audit log keyed on the
//! provider event id, which also makes redeliveries idempotent.
//!
//! ## Architecture
//!
//! ```text
//! Provider (HTTPS POST + Stripe-Signature)
//!     │
//!     ├── Webhook Handler (api/)
//!     ├── SignatureVerifier (signature)
//!     │
//!     ├── WebhookService (service/)
//!     │     ├── idempotency check + audit log
//!     │     └── per-kind handlers (service/handlers/)
//!     │
//!     └── SyncStore (persistence/)
//!           ├── PostgresStore
//!           └── MemoryStore
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod signature;

#[cfg(test)]
mod test_support;
