//! Multi-tenant notification delivery for ERP integrations.
//!
//! Business events posted by a tenant's ERP are normalized into
//! [`notifications::Notification`] records, stored in `pending` state and
//! delivered through an external messaging gateway. Failed deliveries stay
//! `failed` until a caller explicitly retries them, up to a bounded number of
//! attempts.

pub mod config;
pub mod error;
pub mod notifications;
pub mod telemetry;
