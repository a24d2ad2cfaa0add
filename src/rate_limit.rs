use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Shared limiter for the webhook route
pub type WebhookRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Limiter allowing `requests_per_minute` deliveries. Zero is treated as one.
pub fn create_rate_limiter(requests_per_minute: u32) -> WebhookRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Deliveries over the quota are acknowledged and dropped
pub async fn rate_limit_middleware(
    State(limiter): State<WebhookRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!("Webhook rate limit exceeded, delivery acknowledged and dropped");
            Json(json!({ "received": true, "outcome": "throttled" })).into_response()
        }
    }
}
