use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::state::AppState;
use crate::domain::entities::installment::Installment;
use crate::domain::errors::BackOfficeError;
use crate::domain::repositories::ledger_store::PaymentRecord;
use crate::domain::services::commission_engine::CommissionOutcome;

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: Decimal,
    /// Defaults to today
    pub paid_date: Option<NaiveDate>,
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub installment_id: String,
    pub agreement_settled: bool,
    pub debt_paid: bool,
    pub commission_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub due_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct PixResponse {
    pub installment_id: String,
    pub pix_payload: String,
}

/// Payment received outside the gateway (cash, transfer)
pub async fn register_payment(
    State(state): State<AppState>,
    Path(installment_id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, BackOfficeError> {
    let payment = PaymentRecord {
        amount: request.amount,
        paid_date: request.paid_date.unwrap_or_else(|| Utc::now().date_naive()),
        method: request.method,
    };
    let outcome = state
        .agreements
        .register_payment(&installment_id, payment)
        .await?;

    let commission_amount = match outcome.commission {
        CommissionOutcome::Recorded(commission) => Some(commission.commission_amount),
        CommissionOutcome::NotConfigured | CommissionOutcome::AlreadyRecorded => None,
    };
    Ok(Json(PaymentResponse {
        installment_id,
        agreement_settled: outcome.settlement.agreement_settled,
        debt_paid: outcome.settlement.debt_paid,
        commission_amount,
    }))
}

pub async fn reschedule_installment(
    State(state): State<AppState>,
    Path(installment_id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Installment>, BackOfficeError> {
    let installment = state
        .agreements
        .reschedule_installment(&installment_id, request.due_date)
        .await?;
    Ok(Json(installment))
}

pub async fn installment_pix_code(
    State(state): State<AppState>,
    Path(installment_id): Path<String>,
) -> Result<Json<PixResponse>, BackOfficeError> {
    let pix_payload = state
        .agreements
        .installment_pix_code(&installment_id)
        .await?;
    Ok(Json(PixResponse {
        installment_id,
        pix_payload,
    }))
}
