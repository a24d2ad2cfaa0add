//! Ledger Store Port
//!
//! Durable storage of debts, agreements, installments and commissions. The
//! store is the single source of truth: services never cache agreement or
//! installment state between calls.
//!
//! Multi-row mutations (`create_agreement`, `break_agreement`,
//! `settle_agreement_if_complete`) are atomic. Status changes driven by
//! payments are conditional updates that report whether this call performed
//! the transition, which is what makes webhook replay safe.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::entities::agreement::Agreement;
use crate::domain::entities::commission::Commission;
use crate::domain::entities::creditor::Creditor;
use crate::domain::entities::debt::{Debt, DebtStatus};
use crate::domain::entities::debtor::Debtor;
use crate::domain::entities::installment::{Installment, InstallmentRef, InstallmentStatus};
use crate::domain::errors::BackOfficeResult;

/// Gateway charge data to bind on an installment or debt
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeBinding {
    pub charge_id: String,
    pub charge_url: Option<String>,
    pub pix_payload: Option<String>,
}

/// Payment data applied when an installment becomes paid
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub amount: Decimal,
    pub paid_date: NaiveDate,
    pub method: Option<String>,
}

/// Result of breaking an agreement locally
#[derive(Debug, Clone)]
pub struct BrokenAgreement {
    pub agreement: Agreement,
    /// Installments moved from pending to cancelled
    pub cancelled: Vec<Installment>,
    pub debt_reverted: bool,
}

/// Result of the settle compare-and-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub agreement_settled: bool,
    pub debt_paid: bool,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Collaborator records, created outside the settlement workflows
    async fn insert_creditor(&self, creditor: &Creditor) -> BackOfficeResult<()>;
    async fn insert_debtor(&self, debtor: &Debtor) -> BackOfficeResult<()>;
    async fn insert_debt(&self, debt: &Debt) -> BackOfficeResult<()>;

    async fn get_creditor(&self, id: &str) -> BackOfficeResult<Option<Creditor>>;
    async fn get_debtor(&self, id: &str) -> BackOfficeResult<Option<Debtor>>;
    async fn get_debt(&self, id: &str) -> BackOfficeResult<Option<Debt>>;
    async fn get_agreement(&self, id: &str) -> BackOfficeResult<Option<Agreement>>;
    async fn get_installment(&self, id: &str) -> BackOfficeResult<Option<Installment>>;

    /// Installments of an agreement ordered by sequence
    async fn list_installments(&self, agreement_id: &str) -> BackOfficeResult<Vec<Installment>>;

    /// Persist an agreement and all of its installments in one transaction
    async fn create_agreement(
        &self,
        agreement: &Agreement,
        installments: &[Installment],
    ) -> BackOfficeResult<()>;

    async fn set_debtor_customer_id(&self, debtor_id: &str, customer_id: &str)
        -> BackOfficeResult<()>;

    /// Bind a gateway charge and mark the installment synced.
    /// Binding a different charge over an existing one is a `StateConflict`;
    /// binding the same charge again is a no-op.
    async fn bind_installment_charge(
        &self,
        installment_id: &str,
        binding: &ChargeBinding,
    ) -> BackOfficeResult<()>;

    async fn set_installment_pix_payload(
        &self,
        installment_id: &str,
        payload: &str,
    ) -> BackOfficeResult<()>;

    /// Mark the gateway step as failed with the gateway error text
    async fn record_sync_failure(&self, installment_id: &str, note: &str) -> BackOfficeResult<()>;

    /// Same rules as `bind_installment_charge`, for a pre-agreement debt
    async fn bind_debt_charge(&self, debt_id: &str, binding: &ChargeBinding)
        -> BackOfficeResult<()>;

    async fn find_installment_by_charge(
        &self,
        charge_id: &str,
    ) -> BackOfficeResult<Option<Installment>>;

    /// Resolve an id carried by an `INSTALLMENT:<id>` reference
    async fn resolve_installment_ref(&self, id: &str) -> BackOfficeResult<Option<InstallmentRef>>;

    async fn find_debt_by_charge(&self, charge_id: &str) -> BackOfficeResult<Option<Debt>>;

    /// Pending/overdue -> paid. Returns `true` only when this call changed
    /// the row.
    async fn mark_installment_paid(
        &self,
        installment_id: &str,
        payment: &PaymentRecord,
    ) -> BackOfficeResult<bool>;

    /// Move an installment to `to` if its current status is one of `from`
    async fn transition_installment(
        &self,
        installment_id: &str,
        from: &[InstallmentStatus],
        to: InstallmentStatus,
    ) -> BackOfficeResult<bool>;

    /// New due date, status back to pending. Only from pending/overdue.
    async fn reschedule_installment(
        &self,
        installment_id: &str,
        due_date: NaiveDate,
    ) -> BackOfficeResult<bool>;

    /// Settle the agreement if it is active and every installment is paid,
    /// then mark its debt paid. Single conditional update, safe to race.
    async fn settle_agreement_if_complete(&self, agreement_id: &str)
        -> BackOfficeResult<Settlement>;

    /// Change debt status. A paid debt only moves to cancelled (refund).
    /// Returns whether the row changed.
    async fn set_debt_status(&self, debt_id: &str, status: DebtStatus) -> BackOfficeResult<bool>;

    /// Break an active agreement: status, notes, pending installments and
    /// debt in one transaction. `StateConflict` if not active.
    async fn break_agreement(&self, agreement_id: &str, reason: &str)
        -> BackOfficeResult<BrokenAgreement>;

    /// Insert-only. Returns `false` when a commission already exists for the
    /// same recovered item.
    async fn insert_commission(&self, commission: &Commission) -> BackOfficeResult<bool>;

    async fn list_commissions(&self, creditor_id: &str) -> BackOfficeResult<Vec<Commission>>;

    /// Sum of paid installment amounts for a creditor with paid date in
    /// `[from, to)`
    async fn recovered_total(
        &self,
        creditor_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BackOfficeResult<Decimal>;
}
