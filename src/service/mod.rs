//! Service layer: event dispatch, per-kind handlers and auditing.
//!
//! [`WebhookService`] receives verified events from the HTTP layer and
//! routes them to [`handlers`], recording every delivery in the audit log.

pub mod handlers;
pub mod webhook_service;

pub use handlers::HandlerOutcome;
pub use webhook_service::{ProcessReport, WebhookService};
