//! HTTP surface end to end: agreement creation over JSON, webhook
//! acknowledgement semantics, token guard and error mapping.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use recovery_desk::application::router::build_router;
use recovery_desk::application::state::AppState;
use recovery_desk::auth::{WebhookAuth, WEBHOOK_TOKEN_HEADER};
use recovery_desk::domain::entities::creditor::{CommissionConfig, Creditor};
use recovery_desk::domain::entities::debt::{Debt, DebtStatus};
use recovery_desk::domain::entities::debtor::Debtor;
use recovery_desk::domain::entities::installment::InstallmentStatus;
use recovery_desk::domain::repositories::ledger_store::LedgerStore;
use recovery_desk::domain::services::gateway_guard::{GuardedGateway, DEFAULT_GATEWAY_TIMEOUT};
use recovery_desk::infrastructure::mock_gateway::MockPaymentGateway;
use recovery_desk::persistence::init_database;
use recovery_desk::persistence::ledger_repository::SqliteLedgerStore;
use recovery_desk::rate_limit::create_rate_limiter;

const TOKEN: &str = "whk_9f8e7d6c5b4a3210";

async fn app(rate_limit: u32) -> (Router, Arc<SqliteLedgerStore>) {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let store = Arc::new(SqliteLedgerStore::new(pool));
    store
        .insert_creditor(
            &Creditor::new("cred-1".to_string(), "Banco Alfa".to_string())
                .with_commission(CommissionConfig::percentage(dec!(10))),
        )
        .await
        .unwrap();
    store
        .insert_debtor(&Debtor::new(
            "debtor-1".to_string(),
            "Ana Lima".to_string(),
            "11.222.333/0001-81",
        ))
        .await
        .unwrap();
    let mut debt = Debt::new(
        "debt-1".to_string(),
        "debtor-1".to_string(),
        "cred-1".to_string(),
        dec!(1000.00),
        chrono::NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
    )
    .unwrap();
    debt.status = DebtStatus::Overdue;
    store.insert_debt(&debt).await.unwrap();

    let gateway = GuardedGateway::new(Arc::new(MockPaymentGateway::new()), DEFAULT_GATEWAY_TIMEOUT);
    let router = build_router(
        AppState::new(store.clone(), gateway),
        Some(WebhookAuth::new(TOKEN)),
        create_rate_limiter(rate_limit),
    );
    (router, store)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook(body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/gateway")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(WEBHOOK_TOKEN_HEADER, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_agreement(router: &Router) -> Value {
    let response = router
        .clone()
        .oneshot(post_json(
            "/agreements",
            json!({
                "debt_id": "debt-1",
                "agreed_amount": "800.00",
                "installment_count": 4,
                "first_due_date": "2025-02-01",
                "payment_method": "BOLETO",
                "created_by": "operator-3"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn test_health() {
    let (router, _) = app(100).await;
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["gateway"], "mock");
}

#[tokio::test]
async fn test_create_agreement_reports_sync() {
    let (router, _) = app(100).await;
    let body = create_agreement(&router).await;
    assert_eq!(body["installments"].as_array().unwrap().len(), 4);
    let report = body["sync_report"].as_array().unwrap();
    assert!(report.iter().all(|r| r["charge_id"].is_string() && r["error"].is_null()));
}

#[tokio::test]
async fn test_validation_maps_to_400() {
    let (router, _) = app(100).await;
    let response = router
        .oneshot(post_json(
            "/agreements",
            json!({
                "debt_id": "debt-1",
                "agreed_amount": "800.00",
                "installment_count": 0,
                "first_due_date": "2025-02-01",
                "payment_method": "PIX",
                "created_by": "operator-3"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_agreement_maps_to_404() {
    let (router, _) = app(100).await;
    let response = router
        .oneshot(post_json("/agreements/missing/break", json!({ "reason": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_repaying_maps_to_409() {
    let (router, _) = app(100).await;
    let created = create_agreement(&router).await;
    let installment_id = created["installments"][0]["id"].as_str().unwrap().to_string();
    let uri = format!("/installments/{}/payments", installment_id);

    let first = router
        .clone()
        .oneshot(post_json(&uri, json!({ "amount": "200.00", "paid_date": "2025-02-01" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body = json_body(first).await;
    assert_eq!(body["agreement_settled"], false);
    let commission: Decimal = body["commission_amount"].as_str().unwrap().parse().unwrap();
    assert_eq!(commission, dec!(20));

    let second = router
        .oneshot(post_json(&uri, json!({ "amount": "200.00" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(second).await["code"], "STATE_CONFLICT");
}

#[tokio::test]
async fn test_webhook_requires_token() {
    let (router, _) = app(100).await;
    let body = r#"{"event":"PAYMENT_CONFIRMED"}"#;

    let missing = router.clone().oneshot(webhook(body, None)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = router
        .clone()
        .oneshot(webhook(body, Some("not-the-token")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = router.oneshot(webhook(body, Some(TOKEN))).await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_always_acknowledges() {
    let (router, store) = app(100).await;
    let created = create_agreement(&router).await;
    let installment_id = created["installments"][2]["id"].as_str().unwrap().to_string();

    let malformed = router
        .clone()
        .oneshot(webhook("{not json", Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::OK);
    assert_eq!(json_body(malformed).await["outcome"], "ignored");

    let unknown = json!({
        "event": "PAYMENT_CONFIRMED",
        "payment": { "id": "pay_unknown", "value": 10.0 }
    });
    let response = router
        .clone()
        .oneshot(webhook(&unknown.to_string(), Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["outcome"], "noop");

    let event = json!({
        "event": "PAYMENT_RECEIVED",
        "payment": {
            "id": "pay_late",
            "value": 200.0,
            "dueDate": "2025-04-01",
            "paymentDate": "2025-04-03",
            "externalReference": format!("INSTALLMENT:{}", installment_id)
        }
    })
    .to_string();
    for expected in ["updated", "noop"] {
        let response = router
            .clone()
            .oneshot(webhook(&event, Some(TOKEN)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["outcome"], expected);
    }

    let stored = store.get_installment(&installment_id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstallmentStatus::Paid);
    assert_eq!(store.list_commissions("cred-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_over_limit_is_acknowledged() {
    let (router, _) = app(1).await;
    let body = r#"{"event":"PAYMENT_CREATED"}"#;
    let first = router.clone().oneshot(webhook(body, Some(TOKEN))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(json_body(first).await["outcome"], "noop");

    let second = router.oneshot(webhook(body, Some(TOKEN))).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let body = json_body(second).await;
    assert_eq!(body["received"], true);
    assert_eq!(body["outcome"], "throttled");
}
