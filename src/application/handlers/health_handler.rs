use axum::{extract::State, Json};
use serde::Serialize;

use crate::application::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub gateway: String,
    pub version: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        gateway: state.gateway_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
