//! HTTP surface: webhook endpoint, agreement and installment endpoints,
//! health.

pub mod error_response;
pub mod handlers;
pub mod router;
pub mod state;
