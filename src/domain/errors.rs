//! Domain errors for the settlement back office.
//!
//! `BackOfficeError` is what services return to direct callers. Gateway
//! failures have their own enum because most workflows absorb them instead
//! of propagating.

use thiserror::Error;

/// Result alias used by services and the ledger store
pub type BackOfficeResult<T> = Result<T, BackOfficeError>;

/// Result alias used by payment gateway adapters
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum BackOfficeError {
    /// Missing or invalid input, rejected before any persistence
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Operation not permitted from the record's current status
    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BackOfficeError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        BackOfficeError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        BackOfficeError::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            BackOfficeError::Validation { .. } => "VALIDATION_ERROR",
            BackOfficeError::NotFound { .. } => "NOT_FOUND",
            BackOfficeError::StateConflict(_) => "STATE_CONFLICT",
            BackOfficeError::Gateway(_) => "GATEWAY_ERROR",
            BackOfficeError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<sqlx::Error> for BackOfficeError {
    fn from(e: sqlx::Error) -> Self {
        BackOfficeError::Storage(e.to_string())
    }
}

impl From<crate::persistence::DatabaseError> for BackOfficeError {
    fn from(e: crate::persistence::DatabaseError) -> Self {
        BackOfficeError::Storage(e.to_string())
    }
}

/// Failures talking to the external payment gateway
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("gateway call timed out after {0} ms")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("gateway rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected gateway response: {0}")]
    Parse(String),

    #[error("gateway not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout(0)
        } else if e.is_decode() {
            GatewayError::Parse(e.to_string())
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}
