use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Header the gateway sets on webhook deliveries
pub const WEBHOOK_TOKEN_HEADER: &str = "asaas-access-token";

/// Expected webhook token, kept only as its SHA-256 digest
#[derive(Clone)]
pub struct WebhookAuth {
    digest: Arc<[u8; 32]>,
}

impl WebhookAuth {
    pub fn new(token: &str) -> Self {
        Self {
            digest: Arc::new(sha256(token)),
        }
    }

    /// Digests have a fixed length, so the comparison never short-circuits
    /// on the length of the presented token
    pub fn accepts(&self, presented: &str) -> bool {
        let presented = sha256(presented);
        presented
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

fn sha256(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Middleware rejecting webhook deliveries without the shared token
pub async fn require_webhook_token(
    State(auth): State<WebhookAuth>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(token) if auth.accepts(token) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Webhook delivery with invalid access token");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Webhook delivery without {} header", WEBHOOK_TOKEN_HEADER);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
