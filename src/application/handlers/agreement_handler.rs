use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::application::state::AppState;
use crate::domain::errors::BackOfficeError;
use crate::domain::repositories::payment_gateway::BillingMethod;
use crate::domain::services::agreement_service::{
    AgreementCreation, BreakReport, InstallmentSyncReport, NewAgreement,
};

#[derive(Debug, Deserialize)]
pub struct BreakRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DebtChargeRequest {
    pub billing_method: BillingMethod,
}

#[derive(Debug, Serialize)]
pub struct DebtChargeResponse {
    pub charge_id: String,
    pub invoice_url: String,
    pub boleto_url: Option<String>,
}

/// Create an agreement. Responds 201 even when some installments could not
/// be synced; the `sync_report` lists which.
pub async fn create_agreement(
    State(state): State<AppState>,
    Json(request): Json<NewAgreement>,
) -> Result<(StatusCode, Json<AgreementCreation>), BackOfficeError> {
    let created = state.agreements.create_agreement(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn break_agreement(
    State(state): State<AppState>,
    Path(agreement_id): Path<String>,
    Json(request): Json<BreakRequest>,
) -> Result<Json<BreakReport>, BackOfficeError> {
    let report = state
        .agreements
        .break_agreement(&agreement_id, &request.reason)
        .await?;
    Ok(Json(report))
}

pub async fn resync_agreement(
    State(state): State<AppState>,
    Path(agreement_id): Path<String>,
) -> Result<Json<Vec<InstallmentSyncReport>>, BackOfficeError> {
    let reports = state
        .agreements
        .resync_agreement_charges(&agreement_id)
        .await?;
    Ok(Json(reports))
}

pub async fn issue_debt_charge(
    State(state): State<AppState>,
    Path(debt_id): Path<String>,
    Json(request): Json<DebtChargeRequest>,
) -> Result<(StatusCode, Json<DebtChargeResponse>), BackOfficeError> {
    let receipt = state
        .agreements
        .issue_debt_charge(&debt_id, request.billing_method)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DebtChargeResponse {
            charge_id: receipt.charge_id,
            invoice_url: receipt.invoice_url,
            boleto_url: receipt.boleto_url,
        }),
    ))
}
