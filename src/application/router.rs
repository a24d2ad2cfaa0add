use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::application::handlers::{
    agreement_handler, health_handler, installment_handler, webhook_handler,
};
use crate::application::state::AppState;
use crate::auth::{require_webhook_token, WebhookAuth};
use crate::rate_limit::{rate_limit_middleware, WebhookRateLimiter};

const MAX_BODY_BYTES: usize = 256 * 1024;

/// Full HTTP surface. The webhook route is rate limited and, when a token is
/// configured, requires the gateway's access token header.
pub fn build_router(
    state: AppState,
    webhook_auth: Option<WebhookAuth>,
    webhook_limiter: WebhookRateLimiter,
) -> Router {
    let mut webhook = Router::new().route(
        "/webhooks/gateway",
        post(webhook_handler::receive_gateway_event),
    );
    if let Some(auth) = webhook_auth {
        webhook = webhook.route_layer(middleware::from_fn_with_state(auth, require_webhook_token));
    }
    let webhook = webhook.route_layer(middleware::from_fn_with_state(
        webhook_limiter,
        rate_limit_middleware,
    ));

    Router::new()
        .route("/health", get(health_handler::health_check))
        .route("/agreements", post(agreement_handler::create_agreement))
        .route(
            "/agreements/:agreement_id/break",
            post(agreement_handler::break_agreement),
        )
        .route(
            "/agreements/:agreement_id/resync",
            post(agreement_handler::resync_agreement),
        )
        .route(
            "/debts/:debt_id/charge",
            post(agreement_handler::issue_debt_charge),
        )
        .route(
            "/installments/:installment_id/payments",
            post(installment_handler::register_payment),
        )
        .route(
            "/installments/:installment_id/reschedule",
            post(installment_handler::reschedule_installment),
        )
        .route(
            "/installments/:installment_id/pix",
            get(installment_handler::installment_pix_code),
        )
        .merge(webhook)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
