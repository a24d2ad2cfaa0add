use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::errors::BackOfficeError;

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

pub fn status_for(error: &BackOfficeError) -> StatusCode {
    match error {
        BackOfficeError::Validation { .. } => StatusCode::BAD_REQUEST,
        BackOfficeError::NotFound { .. } => StatusCode::NOT_FOUND,
        BackOfficeError::StateConflict(_) => StatusCode::CONFLICT,
        BackOfficeError::Gateway(_) | BackOfficeError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for BackOfficeError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::GatewayError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&BackOfficeError::validation("amount", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&BackOfficeError::not_found("Agreement", "a-1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&BackOfficeError::StateConflict("paid".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&BackOfficeError::Gateway(GatewayError::Timeout(15000))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
