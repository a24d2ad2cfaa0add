use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::application::state::AppState;
use crate::domain::services::payment_reconciler::{GatewayEvent, ReconciliationOutcome};

/// Acknowledgement sent back to the gateway
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

/// Gateway payment webhook.
///
/// Always answers 200 so the gateway does not retry-storm; malformed bodies
/// and internal failures are logged and acknowledged.
pub async fn receive_gateway_event(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let event: GatewayEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Ignoring malformed gateway webhook body: {}", e);
            return ack("ignored");
        }
    };

    let outcome = match state.reconciler.handle_gateway_event(&event).await {
        ReconciliationOutcome::Updated { .. } => "updated",
        ReconciliationOutcome::NoOp(_) => "noop",
        ReconciliationOutcome::Dropped(_) => "dropped",
    };
    ack(outcome)
}

fn ack(outcome: &'static str) -> (StatusCode, Json<WebhookAck>) {
    (
        StatusCode::OK,
        Json(WebhookAck {
            received: true,
            outcome,
        }),
    )
}
