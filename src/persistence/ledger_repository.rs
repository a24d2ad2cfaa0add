//! SQLite Ledger Repository
//!
//! `LedgerStore` implementation over the sqlx pool.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, error, info};

use super::models::*;
use super::DbPool;
use crate::domain::entities::agreement::{append_note, Agreement, AgreementStatus};
use crate::domain::entities::commission::{Commission, RecoveredItem};
use crate::domain::entities::creditor::Creditor;
use crate::domain::entities::debt::{Debt, DebtStatus};
use crate::domain::entities::debtor::Debtor;
use crate::domain::entities::installment::{
    Generation, Installment, InstallmentRef, InstallmentStatus,
};
use crate::domain::errors::{BackOfficeError, BackOfficeResult};
use crate::domain::repositories::ledger_store::{
    BrokenAgreement, ChargeBinding, LedgerStore, PaymentRecord, Settlement,
};

const DEBT_COLUMNS: &str = "id, debtor_id, creditor_id, original_amount, due_date, status, \
     external_charge_id, external_charge_url, notes";

const AGREEMENT_COLUMNS: &str = "id, debt_id, debtor_id, creditor_id, original_amount, \
     discount_value, discount_percentage, agreed_amount, down_payment, installment_count, \
     first_due_date, payment_method, status, notes, created_by, created_at, updated_at";

const INSTALLMENT_COLUMNS: &str = "id, agreement_id, sequence, amount, due_date, status, \
     paid_amount, paid_date, payment_method, external_charge_id, external_charge_url, \
     pix_payload, sync_status, sync_note, generation";

const COMMISSION_COLUMNS: &str = "id, creditor_id, debtor_id, agreement_id, installment_id, \
     debt_id, commission_type, base_amount, percentage, commission_amount, status, created_at";

fn query_error(context: &str, e: sqlx::Error) -> BackOfficeError {
    error!("{}: {}", context, e);
    BackOfficeError::Storage(format!("{}: {}", context, e))
}

fn status_list(statuses: &[InstallmentStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ledger store backed by SQLite
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: DbPool,
}

impl SqliteLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn fetch_installment(&self, sql: &str, key: &str) -> BackOfficeResult<Option<Installment>> {
        let record = sqlx::query_as::<_, InstallmentRecord>(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to load installment", e))?;
        record.map(Installment::try_from).transpose()
    }

    async fn fetch_debt(&self, sql: &str, key: &str) -> BackOfficeResult<Option<Debt>> {
        let record = sqlx::query_as::<_, DebtRecord>(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to load debt", e))?;
        record.map(Debt::try_from).transpose()
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn insert_creditor(&self, creditor: &Creditor) -> BackOfficeResult<()> {
        let config = creditor.commission.as_ref();
        sqlx::query(
            r#"
            INSERT INTO creditors (
                id, name, commission_type, commission_percentage,
                commission_fixed_amount, commission_goal_amount
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&creditor.id)
        .bind(&creditor.name)
        .bind(config.map(|c| c.commission_type.as_str()))
        .bind(config.and_then(|c| c.percentage).map(|d| d.to_string()))
        .bind(config.and_then(|c| c.fixed_amount).map(|d| d.to_string()))
        .bind(config.and_then(|c| c.goal_amount).map(|d| d.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to insert creditor", e))?;
        Ok(())
    }

    async fn insert_debtor(&self, debtor: &Debtor) -> BackOfficeResult<()> {
        sqlx::query(
            r#"
            INSERT INTO debtors (id, name, document, email, phone, gateway_customer_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&debtor.id)
        .bind(&debtor.name)
        .bind(&debtor.document)
        .bind(&debtor.email)
        .bind(&debtor.phone)
        .bind(&debtor.gateway_customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to insert debtor", e))?;
        Ok(())
    }

    async fn insert_debt(&self, debt: &Debt) -> BackOfficeResult<()> {
        sqlx::query(
            r#"
            INSERT INTO debts (
                id, debtor_id, creditor_id, original_amount, due_date, status,
                external_charge_id, external_charge_url, notes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&debt.id)
        .bind(&debt.debtor_id)
        .bind(&debt.creditor_id)
        .bind(debt.original_amount.to_string())
        .bind(debt.due_date)
        .bind(debt.status.as_str())
        .bind(&debt.external_charge_id)
        .bind(&debt.external_charge_url)
        .bind(&debt.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to insert debt", e))?;
        Ok(())
    }

    async fn get_creditor(&self, id: &str) -> BackOfficeResult<Option<Creditor>> {
        let record = sqlx::query_as::<_, CreditorRecord>(
            r#"
            SELECT id, name, commission_type, commission_percentage,
                   commission_fixed_amount, commission_goal_amount
            FROM creditors WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to load creditor", e))?;
        record.map(Creditor::try_from).transpose()
    }

    async fn get_debtor(&self, id: &str) -> BackOfficeResult<Option<Debtor>> {
        let record = sqlx::query_as::<_, DebtorRecord>(
            "SELECT id, name, document, email, phone, gateway_customer_id FROM debtors WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to load debtor", e))?;
        Ok(record.map(Debtor::from))
    }

    async fn get_debt(&self, id: &str) -> BackOfficeResult<Option<Debt>> {
        let sql = format!("SELECT {} FROM debts WHERE id = ?1", DEBT_COLUMNS);
        self.fetch_debt(&sql, id).await
    }

    async fn get_agreement(&self, id: &str) -> BackOfficeResult<Option<Agreement>> {
        let sql = format!("SELECT {} FROM agreements WHERE id = ?1", AGREEMENT_COLUMNS);
        let record = sqlx::query_as::<_, AgreementRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to load agreement", e))?;
        record.map(Agreement::try_from).transpose()
    }

    async fn get_installment(&self, id: &str) -> BackOfficeResult<Option<Installment>> {
        let sql = format!("SELECT {} FROM installments WHERE id = ?1", INSTALLMENT_COLUMNS);
        self.fetch_installment(&sql, id).await
    }

    async fn list_installments(&self, agreement_id: &str) -> BackOfficeResult<Vec<Installment>> {
        let sql = format!(
            "SELECT {} FROM installments WHERE agreement_id = ?1 ORDER BY sequence",
            INSTALLMENT_COLUMNS
        );
        let records = sqlx::query_as::<_, InstallmentRecord>(&sql)
            .bind(agreement_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("Failed to list installments", e))?;
        records.into_iter().map(Installment::try_from).collect()
    }

    async fn create_agreement(
        &self,
        agreement: &Agreement,
        installments: &[Installment],
    ) -> BackOfficeResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin transaction", e))?;

        if let Some(debt_id) = &agreement.debt_id {
            let active: Option<(String,)> = sqlx::query_as(
                "SELECT id FROM agreements WHERE debt_id = ?1 AND status = 'active' LIMIT 1",
            )
            .bind(debt_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to check active agreements", e))?;
            if let Some((existing,)) = active {
                return Err(BackOfficeError::StateConflict(format!(
                    "debt {} already has active agreement {}",
                    debt_id, existing
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO agreements (
                id, debt_id, debtor_id, creditor_id, original_amount, discount_value,
                discount_percentage, agreed_amount, down_payment, installment_count,
                first_due_date, payment_method, status, notes, created_by,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&agreement.id)
        .bind(&agreement.debt_id)
        .bind(&agreement.debtor_id)
        .bind(&agreement.creditor_id)
        .bind(agreement.original_amount.to_string())
        .bind(agreement.discount_value.to_string())
        .bind(agreement.discount_percentage.to_string())
        .bind(agreement.agreed_amount.to_string())
        .bind(agreement.down_payment.to_string())
        .bind(agreement.installment_count as i64)
        .bind(agreement.first_due_date)
        .bind(agreement.payment_method.as_str())
        .bind(agreement.status.as_str())
        .bind(&agreement.notes)
        .bind(&agreement.created_by)
        .bind(agreement.created_at)
        .bind(agreement.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to insert agreement", e))?;

        for installment in installments {
            sqlx::query(
                r#"
                INSERT INTO installments (
                    id, agreement_id, sequence, amount, due_date, status,
                    sync_status, generation
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&installment.id)
            .bind(&installment.agreement_id)
            .bind(installment.sequence as i64)
            .bind(installment.amount.to_string())
            .bind(installment.due_date)
            .bind(installment.status.as_str())
            .bind(installment.sync_status.as_str())
            .bind(installment.generation.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to insert installment", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit agreement", e))?;

        info!(
            agreement_id = %agreement.id,
            installments = installments.len(),
            "Agreement persisted"
        );
        Ok(())
    }

    async fn set_debtor_customer_id(
        &self,
        debtor_id: &str,
        customer_id: &str,
    ) -> BackOfficeResult<()> {
        let rows = sqlx::query("UPDATE debtors SET gateway_customer_id = ?1 WHERE id = ?2")
            .bind(customer_id)
            .bind(debtor_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to update debtor", e))?
            .rows_affected();
        if rows == 0 {
            return Err(BackOfficeError::not_found("Debtor", debtor_id));
        }
        Ok(())
    }

    async fn bind_installment_charge(
        &self,
        installment_id: &str,
        binding: &ChargeBinding,
    ) -> BackOfficeResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE installments
            SET external_charge_id = ?1,
                external_charge_url = ?2,
                pix_payload = COALESCE(?3, pix_payload),
                sync_status = 'synced',
                sync_note = NULL
            WHERE id = ?4 AND external_charge_id IS NULL
            "#,
        )
        .bind(&binding.charge_id)
        .bind(&binding.charge_url)
        .bind(&binding.pix_payload)
        .bind(installment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to bind installment charge", e))?
        .rows_affected();

        if rows == 1 {
            debug!(installment_id, charge_id = %binding.charge_id, "Charge bound");
            return Ok(());
        }

        match self.get_installment(installment_id).await? {
            None => Err(BackOfficeError::not_found("Installment", installment_id)),
            Some(existing) if existing.external_charge_id.as_deref() == Some(binding.charge_id.as_str()) => {
                Ok(())
            }
            Some(existing) => Err(BackOfficeError::StateConflict(format!(
                "installment {} already bound to charge {}",
                installment_id,
                existing.external_charge_id.unwrap_or_default()
            ))),
        }
    }

    async fn set_installment_pix_payload(
        &self,
        installment_id: &str,
        payload: &str,
    ) -> BackOfficeResult<()> {
        sqlx::query("UPDATE installments SET pix_payload = ?1 WHERE id = ?2")
            .bind(payload)
            .bind(installment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to store PIX payload", e))?;
        Ok(())
    }

    async fn record_sync_failure(&self, installment_id: &str, note: &str) -> BackOfficeResult<()> {
        sqlx::query(
            r#"
            UPDATE installments
            SET sync_status = 'failed', sync_note = ?1
            WHERE id = ?2 AND external_charge_id IS NULL
            "#,
        )
        .bind(note)
        .bind(installment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to record sync failure", e))?;
        Ok(())
    }

    async fn bind_debt_charge(
        &self,
        debt_id: &str,
        binding: &ChargeBinding,
    ) -> BackOfficeResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE debts
            SET external_charge_id = ?1, external_charge_url = ?2, updated_at = ?3
            WHERE id = ?4 AND external_charge_id IS NULL
            "#,
        )
        .bind(&binding.charge_id)
        .bind(&binding.charge_url)
        .bind(Utc::now())
        .bind(debt_id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to bind debt charge", e))?
        .rows_affected();

        if rows == 1 {
            return Ok(());
        }

        match self.get_debt(debt_id).await? {
            None => Err(BackOfficeError::not_found("Debt", debt_id)),
            Some(existing) if existing.external_charge_id.as_deref() == Some(binding.charge_id.as_str()) => {
                Ok(())
            }
            Some(existing) => Err(BackOfficeError::StateConflict(format!(
                "debt {} already bound to charge {}",
                debt_id,
                existing.external_charge_id.unwrap_or_default()
            ))),
        }
    }

    async fn find_installment_by_charge(
        &self,
        charge_id: &str,
    ) -> BackOfficeResult<Option<Installment>> {
        let sql = format!(
            "SELECT {} FROM installments WHERE external_charge_id = ?1",
            INSTALLMENT_COLUMNS
        );
        self.fetch_installment(&sql, charge_id).await
    }

    async fn resolve_installment_ref(&self, id: &str) -> BackOfficeResult<Option<InstallmentRef>> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT id, generation FROM installments WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to resolve installment reference", e))?;

        match row {
            Some((id, generation)) => {
                let generation = Generation::from_str(&generation).map_err(BackOfficeError::Storage)?;
                Ok(Some(InstallmentRef::new(generation, id)))
            }
            None => Ok(None),
        }
    }

    async fn find_debt_by_charge(&self, charge_id: &str) -> BackOfficeResult<Option<Debt>> {
        let sql = format!(
            "SELECT {} FROM debts WHERE external_charge_id = ?1",
            DEBT_COLUMNS
        );
        self.fetch_debt(&sql, charge_id).await
    }

    async fn mark_installment_paid(
        &self,
        installment_id: &str,
        payment: &PaymentRecord,
    ) -> BackOfficeResult<bool> {
        let rows = sqlx::query(
            r#"
            UPDATE installments
            SET status = 'paid',
                paid_amount = ?1,
                paid_date = ?2,
                payment_method = COALESCE(?3, payment_method)
            WHERE id = ?4 AND status IN ('pending', 'overdue')
            "#,
        )
        .bind(payment.amount.to_string())
        .bind(payment.paid_date)
        .bind(&payment.method)
        .bind(installment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to mark installment paid", e))?
        .rows_affected();

        Ok(rows == 1)
    }

    async fn transition_installment(
        &self,
        installment_id: &str,
        from: &[InstallmentStatus],
        to: InstallmentStatus,
    ) -> BackOfficeResult<bool> {
        if from.is_empty() {
            return Ok(false);
        }
        let sql = format!(
            "UPDATE installments SET status = ?1 WHERE id = ?2 AND status IN ({})",
            status_list(from)
        );
        let rows = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(installment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to update installment status", e))?
            .rows_affected();
        Ok(rows == 1)
    }

    async fn reschedule_installment(
        &self,
        installment_id: &str,
        due_date: NaiveDate,
    ) -> BackOfficeResult<bool> {
        let rows = sqlx::query(
            r#"
            UPDATE installments
            SET due_date = ?1, status = 'pending'
            WHERE id = ?2 AND status IN ('pending', 'overdue')
            "#,
        )
        .bind(due_date)
        .bind(installment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to reschedule installment", e))?
        .rows_affected();
        Ok(rows == 1)
    }

    async fn settle_agreement_if_complete(
        &self,
        agreement_id: &str,
    ) -> BackOfficeResult<Settlement> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin transaction", e))?;

        let settled = sqlx::query(
            r#"
            UPDATE agreements
            SET status = 'settled', updated_at = ?2
            WHERE id = ?1
              AND status = 'active'
              AND EXISTS (SELECT 1 FROM installments WHERE agreement_id = ?1)
              AND NOT EXISTS (
                  SELECT 1 FROM installments WHERE agreement_id = ?1 AND status != 'paid'
              )
            "#,
        )
        .bind(agreement_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to settle agreement", e))?
        .rows_affected()
            == 1;

        let mut debt_paid = false;
        if settled {
            debt_paid = sqlx::query(
                r#"
                UPDATE debts
                SET status = 'paid', updated_at = ?2
                WHERE id = (SELECT debt_id FROM agreements WHERE id = ?1)
                  AND status != 'paid'
                "#,
            )
            .bind(agreement_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to mark debt paid", e))?
            .rows_affected()
                == 1;
        }

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit settlement", e))?;

        Ok(Settlement {
            agreement_settled: settled,
            debt_paid,
        })
    }

    async fn set_debt_status(&self, debt_id: &str, status: DebtStatus) -> BackOfficeResult<bool> {
        let rows = sqlx::query(
            r#"
            UPDATE debts
            SET status = ?1, updated_at = ?2
            WHERE id = ?3
              AND status != ?1
              AND (status != 'paid' OR ?1 = 'cancelled')
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(debt_id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to update debt status", e))?
        .rows_affected();
        Ok(rows == 1)
    }

    async fn break_agreement(
        &self,
        agreement_id: &str,
        reason: &str,
    ) -> BackOfficeResult<BrokenAgreement> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin transaction", e))?;

        let sql = format!("SELECT {} FROM agreements WHERE id = ?1", AGREEMENT_COLUMNS);
        let record = sqlx::query_as::<_, AgreementRecord>(&sql)
            .bind(agreement_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to load agreement", e))?
            .ok_or_else(|| BackOfficeError::not_found("Agreement", agreement_id))?;
        let mut agreement = Agreement::try_from(record)?;

        if !agreement.is_active() {
            return Err(BackOfficeError::StateConflict(format!(
                "agreement {} is {} and cannot be broken",
                agreement_id, agreement.status
            )));
        }

        let notes = append_note(agreement.notes.as_deref(), &format!("Broken: {}", reason));
        sqlx::query(
            r#"
            UPDATE agreements
            SET status = 'broken', notes = ?1, updated_at = ?2
            WHERE id = ?3 AND status = 'active'
            "#,
        )
        .bind(&notes)
        .bind(now)
        .bind(agreement_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to break agreement", e))?;

        let sql = format!(
            "SELECT {} FROM installments WHERE agreement_id = ?1 AND status = 'pending' ORDER BY sequence",
            INSTALLMENT_COLUMNS
        );
        let pending = sqlx::query_as::<_, InstallmentRecord>(&sql)
            .bind(agreement_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to load pending installments", e))?;

        sqlx::query(
            "UPDATE installments SET status = 'cancelled' WHERE agreement_id = ?1 AND status = 'pending'",
        )
        .bind(agreement_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to cancel installments", e))?;

        let mut debt_reverted = false;
        if let Some(debt_id) = &agreement.debt_id {
            debt_reverted = sqlx::query(
                "UPDATE debts SET status = 'overdue', updated_at = ?1 WHERE id = ?2 AND status != 'paid'",
            )
            .bind(now)
            .bind(debt_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to revert debt", e))?
            .rows_affected()
                == 1;
        }

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit agreement break", e))?;

        let mut cancelled = pending
            .into_iter()
            .map(Installment::try_from)
            .collect::<BackOfficeResult<Vec<_>>>()?;
        for installment in &mut cancelled {
            installment.status = InstallmentStatus::Cancelled;
        }

        agreement.status = AgreementStatus::Broken;
        agreement.notes = Some(notes);
        agreement.updated_at = now;

        Ok(BrokenAgreement {
            agreement,
            cancelled,
            debt_reverted,
        })
    }

    async fn insert_commission(&self, commission: &Commission) -> BackOfficeResult<bool> {
        let (installment_id, debt_id) = match &commission.recovered {
            RecoveredItem::Installment(id) => (Some(id.as_str()), None),
            RecoveredItem::Debt(id) => (None, Some(id.as_str())),
        };
        let rows = sqlx::query(
            r#"
            INSERT OR IGNORE INTO commissions (
                id, creditor_id, debtor_id, agreement_id, installment_id, debt_id,
                commission_type, base_amount, percentage, commission_amount, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&commission.id)
        .bind(&commission.creditor_id)
        .bind(&commission.debtor_id)
        .bind(&commission.agreement_id)
        .bind(installment_id)
        .bind(debt_id)
        .bind(commission.commission_type.as_str())
        .bind(commission.base_amount.to_string())
        .bind(commission.percentage.map(|p| p.to_string()))
        .bind(commission.commission_amount.to_string())
        .bind(commission.status.as_str())
        .bind(commission.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to insert commission", e))?
        .rows_affected();
        Ok(rows == 1)
    }

    async fn list_commissions(&self, creditor_id: &str) -> BackOfficeResult<Vec<Commission>> {
        let sql = format!(
            "SELECT {} FROM commissions WHERE creditor_id = ?1 ORDER BY created_at",
            COMMISSION_COLUMNS
        );
        let records = sqlx::query_as::<_, CommissionRecord>(&sql)
            .bind(creditor_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("Failed to list commissions", e))?;
        records.into_iter().map(Commission::try_from).collect()
    }

    async fn recovered_total(
        &self,
        creditor_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BackOfficeResult<Decimal> {
        // Summed in Rust: SQLite would coerce the TEXT amounts to REAL
        let amounts: Vec<(Option<String>,)> = sqlx::query_as(
            r#"
            SELECT i.paid_amount
            FROM installments i
            JOIN agreements a ON a.id = i.agreement_id
            WHERE a.creditor_id = ?1
              AND i.status = 'paid'
              AND i.paid_date >= ?2
              AND i.paid_date < ?3
            "#,
        )
        .bind(creditor_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to aggregate recovered total", e))?;

        let mut total = Decimal::ZERO;
        for (amount,) in amounts {
            if let Some(raw) = amount {
                total += Decimal::from_str(&raw).map_err(|e| {
                    BackOfficeError::Storage(format!("Invalid decimal in paid_amount: {}", e))
                })?;
            }
        }
        Ok(total)
    }
}
