//! Agreement Service
//!
//! Creates settlement agreements with their installment schedule, keeps each
//! installment in sync with the payment gateway, and runs the break,
//! direct-payment and reschedule flows.
//!
//! Local state is always committed first. Gateway work runs afterwards as
//! independent steps per installment; a failed step leaves the installment
//! with `sync_status = failed` and the gateway error text, and can be
//! retried with `resync_agreement_charges`. Gateway failures never fail the
//! enclosing operation.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::entities::agreement::{Agreement, AgreementStatus};
use crate::domain::entities::debt::{Debt, DebtStatus};
use crate::domain::entities::debtor::Debtor;
use crate::domain::entities::installment::{Installment, InstallmentStatus};
use crate::domain::errors::{BackOfficeError, BackOfficeResult, GatewayError};
use crate::domain::repositories::ledger_store::{ChargeBinding, LedgerStore, PaymentRecord};
use crate::domain::repositories::payment_gateway::{
    BillingMethod, ChargeReceipt, ChargeRequest, CustomerData,
};
use crate::domain::services::commission_engine::CommissionEngine;
use crate::domain::services::gateway_guard::GuardedGateway;
use crate::domain::services::settlement::{CascadeOutcome, SettlementCascade};
use crate::domain::value_objects::external_reference::ExternalReference;
use crate::domain::value_objects::money::{discount_percentage, installment_amount, round2};
use crate::domain::value_objects::schedule::monthly_due_dates;

/// Input for a new agreement. Debtor, creditor and original amount default
/// from the debt when `debt_id` is given.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAgreement {
    pub debt_id: Option<String>,
    pub debtor_id: Option<String>,
    pub creditor_id: Option<String>,
    pub original_amount: Option<Decimal>,
    pub agreed_amount: Decimal,
    #[serde(default)]
    pub down_payment: Decimal,
    pub installment_count: u32,
    pub first_due_date: NaiveDate,
    pub payment_method: BillingMethod,
    pub created_by: String,
    pub notes: Option<String>,
}

/// Gateway outcome for one installment
#[derive(Debug, Clone, Serialize)]
pub struct InstallmentSyncReport {
    pub installment_id: String,
    pub sequence: u32,
    pub charge_id: Option<String>,
    pub invoice_url: Option<String>,
    pub error: Option<String>,
}

impl InstallmentSyncReport {
    pub fn is_synced(&self) -> bool {
        self.charge_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgreementCreation {
    pub agreement: Agreement,
    pub installments: Vec<Installment>,
    pub sync_report: Vec<InstallmentSyncReport>,
}

impl AgreementCreation {
    pub fn unsynced(&self) -> impl Iterator<Item = &InstallmentSyncReport> {
        self.sync_report.iter().filter(|r| !r.is_synced())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargeCancelFailure {
    pub installment_id: String,
    pub charge_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakReport {
    pub agreement: Agreement,
    pub cancelled_installments: Vec<String>,
    pub cancel_failures: Vec<ChargeCancelFailure>,
    pub debt_reverted: bool,
}

#[derive(Clone)]
pub struct AgreementService {
    store: Arc<dyn LedgerStore>,
    gateway: GuardedGateway,
    cascade: SettlementCascade,
}

impl AgreementService {
    pub fn new(store: Arc<dyn LedgerStore>, gateway: GuardedGateway) -> Self {
        let commissions = CommissionEngine::new(store.clone());
        let cascade = SettlementCascade::new(store.clone(), commissions);
        Self {
            store,
            gateway,
            cascade,
        }
    }

    pub async fn create_agreement(&self, input: NewAgreement) -> BackOfficeResult<AgreementCreation> {
        validate_terms(&input)?;

        let debt = match &input.debt_id {
            Some(debt_id) => {
                let debt = self
                    .store
                    .get_debt(debt_id)
                    .await?
                    .ok_or_else(|| BackOfficeError::not_found("Debt", debt_id.as_str()))?;
                if debt.status.is_closed() || debt.status == DebtStatus::Negotiating {
                    return Err(BackOfficeError::StateConflict(format!(
                        "debt {} is {} and cannot be negotiated",
                        debt.id, debt.status
                    )));
                }
                Some(debt)
            }
            None => None,
        };

        let debtor_id = input
            .debtor_id
            .clone()
            .or_else(|| debt.as_ref().map(|d| d.debtor_id.clone()))
            .ok_or_else(|| BackOfficeError::validation("debtor_id", "required without a debt"))?;
        let creditor_id = input
            .creditor_id
            .clone()
            .or_else(|| debt.as_ref().map(|d| d.creditor_id.clone()))
            .ok_or_else(|| {
                BackOfficeError::validation("creditor_id", "required without a debt")
            })?;
        let original_amount = input
            .original_amount
            .or_else(|| debt.as_ref().map(|d| d.original_amount))
            .ok_or_else(|| {
                BackOfficeError::validation("original_amount", "required without a debt")
            })?;
        if original_amount <= Decimal::ZERO {
            return Err(BackOfficeError::validation(
                "original_amount",
                "must be greater than zero",
            ));
        }

        let debtor = self
            .store
            .get_debtor(&debtor_id)
            .await?
            .ok_or_else(|| BackOfficeError::not_found("Debtor", debtor_id.as_str()))?;
        if self.store.get_creditor(&creditor_id).await?.is_none() {
            return Err(BackOfficeError::not_found("Creditor", creditor_id.as_str()));
        }

        let now = Utc::now();
        let agreed_amount = round2(input.agreed_amount);
        let down_payment = round2(input.down_payment);
        let discount_value = original_amount - agreed_amount;
        let agreement = Agreement {
            id: Uuid::new_v4().to_string(),
            debt_id: debt.as_ref().map(|d| d.id.clone()),
            debtor_id,
            creditor_id,
            original_amount,
            discount_value,
            discount_percentage: discount_percentage(original_amount, discount_value),
            agreed_amount,
            down_payment,
            installment_count: input.installment_count,
            first_due_date: input.first_due_date,
            payment_method: input.payment_method,
            status: AgreementStatus::Active,
            notes: input.notes.clone(),
            created_by: input.created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        let amount = installment_amount(agreement.financed_amount(), agreement.installment_count);
        let due_dates = monthly_due_dates(agreement.first_due_date, agreement.installment_count)
            .ok_or_else(|| {
                BackOfficeError::validation("first_due_date", "schedule runs past the calendar")
            })?;
        let installments: Vec<Installment> = due_dates
            .into_iter()
            .enumerate()
            .map(|(i, due_date)| {
                Installment::new(
                    Uuid::new_v4().to_string(),
                    agreement.id.clone(),
                    i as u32 + 1,
                    amount,
                    due_date,
                )
            })
            .collect();

        self.store.create_agreement(&agreement, &installments).await?;
        info!(
            agreement_id = %agreement.id,
            agreed_amount = %agreement.agreed_amount,
            installments = installments.len(),
            installment_amount = %amount,
            "Agreement created"
        );

        let mut debtor = debtor;
        let mut sync_report = Vec::with_capacity(installments.len());
        for installment in &installments {
            sync_report.push(self.sync_installment(&agreement, &mut debtor, installment).await);
        }

        if let Some(debt) = &debt {
            self.release_debt(debt).await?;
        }

        let failed = sync_report.iter().filter(|r| !r.is_synced()).count();
        if failed > 0 {
            warn!(
                agreement_id = %agreement.id,
                failed,
                "Agreement created with installments missing a gateway charge"
            );
        }

        let installments = self.store.list_installments(&agreement.id).await?;
        Ok(AgreementCreation {
            agreement,
            installments,
            sync_report,
        })
    }

    /// Retry the gateway step for every open installment without a charge
    pub async fn resync_agreement_charges(
        &self,
        agreement_id: &str,
    ) -> BackOfficeResult<Vec<InstallmentSyncReport>> {
        let agreement = self.load_agreement(agreement_id).await?;
        if !agreement.is_active() {
            return Err(BackOfficeError::StateConflict(format!(
                "agreement {} is {}, nothing to resync",
                agreement.id, agreement.status
            )));
        }
        let mut debtor = self
            .store
            .get_debtor(&agreement.debtor_id)
            .await?
            .ok_or_else(|| BackOfficeError::not_found("Debtor", agreement.debtor_id.as_str()))?;

        let mut reports = Vec::new();
        for installment in self.store.list_installments(&agreement.id).await? {
            let open = matches!(
                installment.status,
                InstallmentStatus::Pending | InstallmentStatus::Overdue
            );
            if open && installment.external_charge_id.is_none() {
                reports.push(self.sync_installment(&agreement, &mut debtor, &installment).await);
            }
        }
        info!(agreement_id, retried = reports.len(), "Agreement charges resynced");
        Ok(reports)
    }

    pub async fn break_agreement(&self, agreement_id: &str, reason: &str) -> BackOfficeResult<BreakReport> {
        if reason.trim().is_empty() {
            return Err(BackOfficeError::validation("reason", "must not be empty"));
        }

        let broken = self.store.break_agreement(agreement_id, reason.trim()).await?;
        info!(
            agreement_id,
            cancelled = broken.cancelled.len(),
            debt_reverted = broken.debt_reverted,
            "Agreement broken"
        );

        let mut cancel_failures = Vec::new();
        for installment in &broken.cancelled {
            let Some(charge_id) = &installment.external_charge_id else {
                continue;
            };
            if let Err(e) = self.gateway.cancel_charge(charge_id).await {
                warn!(
                    installment_id = %installment.id,
                    charge_id = %charge_id,
                    "Failed to cancel gateway charge: {}",
                    e
                );
                cancel_failures.push(ChargeCancelFailure {
                    installment_id: installment.id.clone(),
                    charge_id: charge_id.clone(),
                    error: e.to_string(),
                });
            }
        }

        Ok(BreakReport {
            cancelled_installments: broken.cancelled.iter().map(|i| i.id.clone()).collect(),
            agreement: broken.agreement,
            cancel_failures,
            debt_reverted: broken.debt_reverted,
        })
    }

    /// Record a payment received outside the gateway
    pub async fn register_payment(
        &self,
        installment_id: &str,
        payment: PaymentRecord,
    ) -> BackOfficeResult<CascadeOutcome> {
        if payment.amount <= Decimal::ZERO {
            return Err(BackOfficeError::validation("amount", "must be greater than zero"));
        }
        let installment = self.load_installment(installment_id).await?;
        installment.ensure_payable()?;

        if !self.store.mark_installment_paid(installment_id, &payment).await? {
            return Err(BackOfficeError::StateConflict(format!(
                "installment {} was paid concurrently",
                installment_id
            )));
        }
        info!(installment_id, amount = %payment.amount, "Installment paid directly");

        self.cascade.on_installment_paid(&installment, &payment).await
    }

    pub async fn reschedule_installment(
        &self,
        installment_id: &str,
        due_date: NaiveDate,
    ) -> BackOfficeResult<Installment> {
        let installment = self.load_installment(installment_id).await?;
        installment.ensure_reschedulable()?;

        let agreement = self.load_agreement(&installment.agreement_id).await?;
        if !agreement.is_active() {
            return Err(BackOfficeError::StateConflict(format!(
                "agreement {} is {}",
                agreement.id, agreement.status
            )));
        }

        if !self.store.reschedule_installment(installment_id, due_date).await? {
            return Err(BackOfficeError::StateConflict(format!(
                "installment {} changed status concurrently",
                installment_id
            )));
        }
        info!(installment_id, %due_date, "Installment rescheduled");
        self.load_installment(installment_id).await
    }

    /// Issue a gateway charge for a debt that has no agreement yet
    pub async fn issue_debt_charge(
        &self,
        debt_id: &str,
        billing_method: BillingMethod,
    ) -> BackOfficeResult<ChargeReceipt> {
        let debt = self
            .store
            .get_debt(debt_id)
            .await?
            .ok_or_else(|| BackOfficeError::not_found("Debt", debt_id))?;
        if debt.status.is_closed() || debt.status == DebtStatus::Negotiating {
            return Err(BackOfficeError::StateConflict(format!(
                "debt {} is {} and cannot be charged directly",
                debt.id, debt.status
            )));
        }
        if let Some(existing) = &debt.external_charge_id {
            return Err(BackOfficeError::StateConflict(format!(
                "debt {} already has charge {}",
                debt.id, existing
            )));
        }

        let mut debtor = self
            .store
            .get_debtor(&debt.debtor_id)
            .await?
            .ok_or_else(|| BackOfficeError::not_found("Debtor", debt.debtor_id.as_str()))?;
        let customer_id = self.ensure_customer(&mut debtor).await?;

        let today = Utc::now().date_naive();
        let receipt = self
            .gateway
            .create_charge(&ChargeRequest {
                customer_id,
                amount: debt.original_amount,
                due_date: debt.due_date.max(today),
                description: format!("Debt {}", debt.id),
                external_reference: ExternalReference::debt(&debt.id).to_string(),
                billing_method,
            })
            .await?;

        self.store
            .bind_debt_charge(
                &debt.id,
                &ChargeBinding {
                    charge_id: receipt.charge_id.clone(),
                    charge_url: Some(receipt.invoice_url.clone()),
                    pix_payload: None,
                },
            )
            .await?;
        info!(debt_id, charge_id = %receipt.charge_id, "Debt charge issued");
        Ok(receipt)
    }

    /// Stored PIX payload, fetched from the gateway on first use
    pub async fn installment_pix_code(&self, installment_id: &str) -> BackOfficeResult<String> {
        let installment = self.load_installment(installment_id).await?;
        if let Some(payload) = installment.pix_payload {
            return Ok(payload);
        }
        let charge_id = installment.external_charge_id.ok_or_else(|| {
            BackOfficeError::StateConflict(format!(
                "installment {} has no gateway charge",
                installment_id
            ))
        })?;
        let payload = self.gateway.fetch_pix_code(&charge_id).await?;
        self.store
            .set_installment_pix_payload(installment_id, &payload)
            .await?;
        Ok(payload)
    }

    async fn load_agreement(&self, id: &str) -> BackOfficeResult<Agreement> {
        self.store
            .get_agreement(id)
            .await?
            .ok_or_else(|| BackOfficeError::not_found("Agreement", id))
    }

    async fn load_installment(&self, id: &str) -> BackOfficeResult<Installment> {
        self.store
            .get_installment(id)
            .await?
            .ok_or_else(|| BackOfficeError::not_found("Installment", id))
    }

    /// Gateway customer for the debtor, created and remembered on first use
    async fn ensure_customer(&self, debtor: &mut Debtor) -> BackOfficeResult<String> {
        if let Some(id) = &debtor.gateway_customer_id {
            return Ok(id.clone());
        }
        let customer_id = self
            .gateway
            .find_or_create_customer(&CustomerData {
                document: debtor.document.clone(),
                name: debtor.name.clone(),
                email: debtor.email.clone(),
                phone: debtor.phone.clone(),
            })
            .await?;
        self.store
            .set_debtor_customer_id(&debtor.id, &customer_id)
            .await?;
        debtor.gateway_customer_id = Some(customer_id.clone());
        Ok(customer_id)
    }

    /// One gateway step. Never fails: errors end up in the report and on
    /// the installment's sync marker.
    async fn sync_installment(
        &self,
        agreement: &Agreement,
        debtor: &mut Debtor,
        installment: &Installment,
    ) -> InstallmentSyncReport {
        let mut report = InstallmentSyncReport {
            installment_id: installment.id.clone(),
            sequence: installment.sequence,
            charge_id: None,
            invoice_url: None,
            error: None,
        };

        match self.charge_installment(agreement, debtor, installment).await {
            Ok(binding) => {
                report.charge_id = Some(binding.charge_id);
                report.invoice_url = binding.charge_url;
            }
            Err(e) => {
                warn!(
                    agreement_id = %agreement.id,
                    installment_id = %installment.id,
                    sequence = installment.sequence,
                    "Installment not synced with gateway: {}",
                    e
                );
                let note = e.to_string();
                if let Err(store_err) = self.store.record_sync_failure(&installment.id, &note).await {
                    error!(
                        installment_id = %installment.id,
                        "Failed to record sync failure: {}",
                        store_err
                    );
                }
                report.error = Some(note);
            }
        }
        report
    }

    async fn charge_installment(
        &self,
        agreement: &Agreement,
        debtor: &mut Debtor,
        installment: &Installment,
    ) -> BackOfficeResult<ChargeBinding> {
        let customer_id = self.ensure_customer(debtor).await?;
        let receipt = self
            .gateway
            .create_charge(&ChargeRequest {
                customer_id,
                amount: installment.amount,
                due_date: installment.due_date,
                description: format!(
                    "Installment {}/{} of agreement {}",
                    installment.sequence, agreement.installment_count, agreement.id
                ),
                external_reference: ExternalReference::installment(&installment.id).to_string(),
                billing_method: agreement.payment_method,
            })
            .await?;

        let mut pix_payload = receipt.pix_payload.clone();
        if pix_payload.is_none() && agreement.payment_method.supports_pix() {
            match self.gateway.fetch_pix_code(&receipt.charge_id).await {
                Ok(payload) => pix_payload = Some(payload),
                Err(e) => warn!(
                    installment_id = %installment.id,
                    charge_id = %receipt.charge_id,
                    "PIX code not available yet: {}",
                    e
                ),
            }
        }

        let binding = ChargeBinding {
            charge_id: receipt.charge_id,
            charge_url: Some(receipt.invoice_url),
            pix_payload,
        };
        self.store
            .bind_installment_charge(&installment.id, &binding)
            .await?;
        Ok(binding)
    }

    /// After an agreement replaces a debt: drop the debt's own charge
    /// (best-effort) and move the debt to negotiating
    async fn release_debt(&self, debt: &Debt) -> BackOfficeResult<()> {
        if let Some(charge_id) = &debt.external_charge_id {
            match self.gateway.cancel_charge(charge_id).await {
                Ok(()) => info!(debt_id = %debt.id, charge_id = %charge_id, "Debt charge cancelled"),
                Err(e) => log_cancel_failure(&debt.id, charge_id, &e),
            }
        }
        self.store
            .set_debt_status(&debt.id, DebtStatus::Negotiating)
            .await?;
        Ok(())
    }
}

fn log_cancel_failure(debt_id: &str, charge_id: &str, e: &GatewayError) {
    warn!(debt_id, charge_id, "Failed to cancel debt charge: {}", e);
}

/// Thirty years of monthly installments
pub const MAX_INSTALLMENTS: u32 = 360;

fn validate_terms(input: &NewAgreement) -> BackOfficeResult<()> {
    if input.agreed_amount <= Decimal::ZERO {
        return Err(BackOfficeError::validation(
            "agreed_amount",
            "must be greater than zero",
        ));
    }
    if input.installment_count < 1 {
        return Err(BackOfficeError::validation(
            "installment_count",
            "must be at least 1",
        ));
    }
    if input.installment_count > MAX_INSTALLMENTS {
        return Err(BackOfficeError::validation(
            "installment_count",
            format!("must be at most {}", MAX_INSTALLMENTS),
        ));
    }
    if input.down_payment < Decimal::ZERO {
        return Err(BackOfficeError::validation(
            "down_payment",
            "must not be negative",
        ));
    }
    if input.down_payment >= input.agreed_amount {
        return Err(BackOfficeError::validation(
            "down_payment",
            "must be less than the agreed amount",
        ));
    }
    if input.created_by.trim().is_empty() {
        return Err(BackOfficeError::validation("created_by", "required"));
    }
    Ok(())
}
