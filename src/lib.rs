//! Recovery Desk
//!
//! Settlement and payment-reconciliation engine for a debt-collection back
//! office: agreements with installment schedules synced to a payment
//! gateway, webhook reconciliation, and commission computation.

pub mod application;
pub mod auth;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod secrets;
