//! What happens after an installment becomes paid: settle the
//! agreement when nothing is left unpaid, mark its debt paid, record the
//! commission. Shared by the direct payment path and the reconciler.

use std::sync::Arc;
use tracing::info;

use crate::domain::entities::commission::RecoveredItem;
use crate::domain::entities::installment::Installment;
use crate::domain::errors::{BackOfficeError, BackOfficeResult};
use crate::domain::repositories::ledger_store::{LedgerStore, PaymentRecord, Settlement};
use crate::domain::services::commission_engine::{
    CommissionEngine, CommissionOutcome, RecoveryEvent,
};

#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub settlement: Settlement,
    pub commission: CommissionOutcome,
}

#[derive(Clone)]
pub struct SettlementCascade {
    store: Arc<dyn LedgerStore>,
    commissions: CommissionEngine,
}

impl SettlementCascade {
    pub fn new(store: Arc<dyn LedgerStore>, commissions: CommissionEngine) -> Self {
        Self { store, commissions }
    }

    /// Safe to re-run for an installment that is already paid: the settle
    /// step is conditional and the commission insert is unique per item
    pub async fn on_installment_paid(
        &self,
        installment: &Installment,
        payment: &PaymentRecord,
    ) -> BackOfficeResult<CascadeOutcome> {
        let settlement = self
            .store
            .settle_agreement_if_complete(&installment.agreement_id)
            .await?;

        if settlement.agreement_settled {
            info!(
                agreement_id = %installment.agreement_id,
                debt_paid = settlement.debt_paid,
                "Agreement settled"
            );
        }

        let agreement = self
            .store
            .get_agreement(&installment.agreement_id)
            .await?
            .ok_or_else(|| {
                BackOfficeError::not_found("Agreement", installment.agreement_id.as_str())
            })?;

        let commission = self
            .commissions
            .compute_and_record(&RecoveryEvent {
                creditor_id: agreement.creditor_id.clone(),
                debtor_id: agreement.debtor_id.clone(),
                agreement_id: Some(agreement.id.clone()),
                recovered: RecoveredItem::Installment(installment.id.clone()),
                base_amount: payment.amount,
                paid_date: payment.paid_date,
            })
            .await?;

        Ok(CascadeOutcome {
            settlement,
            commission,
        })
    }
}
