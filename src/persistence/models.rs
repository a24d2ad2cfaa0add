//! Database Models
//!
//! Row types for the ledger tables and their conversion into domain
//! entities. Amounts are stored as decimal TEXT to keep cents exact.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;

use crate::domain::entities::agreement::Agreement;
use crate::domain::entities::commission::{Commission, RecoveredItem};
use crate::domain::entities::creditor::{CommissionConfig, Creditor};
use crate::domain::entities::debt::Debt;
use crate::domain::entities::debtor::Debtor;
use crate::domain::entities::installment::Installment;
use crate::domain::errors::BackOfficeError;

fn decimal(column: &str, raw: &str) -> Result<Decimal, BackOfficeError> {
    Decimal::from_str(raw)
        .map_err(|e| BackOfficeError::Storage(format!("Invalid decimal in {}: {}", column, e)))
}

fn optional_decimal(column: &str, raw: Option<&str>) -> Result<Option<Decimal>, BackOfficeError> {
    raw.map(|r| decimal(column, r)).transpose()
}

fn parsed<T: FromStr<Err = String>>(raw: &str) -> Result<T, BackOfficeError> {
    raw.parse::<T>().map_err(BackOfficeError::Storage)
}

#[derive(Debug, Clone, FromRow)]
pub struct CreditorRecord {
    pub id: String,
    pub name: String,
    pub commission_type: Option<String>,
    pub commission_percentage: Option<String>,
    pub commission_fixed_amount: Option<String>,
    pub commission_goal_amount: Option<String>,
}

impl TryFrom<CreditorRecord> for Creditor {
    type Error = BackOfficeError;

    fn try_from(r: CreditorRecord) -> Result<Self, Self::Error> {
        let commission = match r.commission_type.as_deref() {
            Some(kind) => Some(CommissionConfig {
                commission_type: parsed(kind)?,
                percentage: optional_decimal(
                    "commission_percentage",
                    r.commission_percentage.as_deref(),
                )?,
                fixed_amount: optional_decimal(
                    "commission_fixed_amount",
                    r.commission_fixed_amount.as_deref(),
                )?,
                goal_amount: optional_decimal(
                    "commission_goal_amount",
                    r.commission_goal_amount.as_deref(),
                )?,
            }),
            None => None,
        };
        Ok(Creditor {
            id: r.id,
            name: r.name,
            commission,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DebtorRecord {
    pub id: String,
    pub name: String,
    pub document: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gateway_customer_id: Option<String>,
}

impl From<DebtorRecord> for Debtor {
    fn from(r: DebtorRecord) -> Self {
        Debtor {
            id: r.id,
            name: r.name,
            document: r.document,
            email: r.email,
            phone: r.phone,
            gateway_customer_id: r.gateway_customer_id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DebtRecord {
    pub id: String,
    pub debtor_id: String,
    pub creditor_id: String,
    pub original_amount: String,
    pub due_date: NaiveDate,
    pub status: String,
    pub external_charge_id: Option<String>,
    pub external_charge_url: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<DebtRecord> for Debt {
    type Error = BackOfficeError;

    fn try_from(r: DebtRecord) -> Result<Self, Self::Error> {
        Ok(Debt {
            original_amount: decimal("original_amount", &r.original_amount)?,
            status: parsed(&r.status)?,
            id: r.id,
            debtor_id: r.debtor_id,
            creditor_id: r.creditor_id,
            due_date: r.due_date,
            external_charge_id: r.external_charge_id,
            external_charge_url: r.external_charge_url,
            notes: r.notes,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AgreementRecord {
    pub id: String,
    pub debt_id: Option<String>,
    pub debtor_id: String,
    pub creditor_id: String,
    pub original_amount: String,
    pub discount_value: String,
    pub discount_percentage: String,
    pub agreed_amount: String,
    pub down_payment: String,
    pub installment_count: i64,
    pub first_due_date: NaiveDate,
    pub payment_method: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AgreementRecord> for Agreement {
    type Error = BackOfficeError;

    fn try_from(r: AgreementRecord) -> Result<Self, Self::Error> {
        Ok(Agreement {
            original_amount: decimal("original_amount", &r.original_amount)?,
            discount_value: decimal("discount_value", &r.discount_value)?,
            discount_percentage: decimal("discount_percentage", &r.discount_percentage)?,
            agreed_amount: decimal("agreed_amount", &r.agreed_amount)?,
            down_payment: decimal("down_payment", &r.down_payment)?,
            installment_count: u32::try_from(r.installment_count).map_err(|_| {
                BackOfficeError::Storage(format!(
                    "Invalid installment_count: {}",
                    r.installment_count
                ))
            })?,
            payment_method: parsed(&r.payment_method)?,
            status: parsed(&r.status)?,
            id: r.id,
            debt_id: r.debt_id,
            debtor_id: r.debtor_id,
            creditor_id: r.creditor_id,
            first_due_date: r.first_due_date,
            notes: r.notes,
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InstallmentRecord {
    pub id: String,
    pub agreement_id: String,
    pub sequence: i64,
    pub amount: String,
    pub due_date: NaiveDate,
    pub status: String,
    pub paid_amount: Option<String>,
    pub paid_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub external_charge_id: Option<String>,
    pub external_charge_url: Option<String>,
    pub pix_payload: Option<String>,
    pub sync_status: String,
    pub sync_note: Option<String>,
    pub generation: String,
}

impl TryFrom<InstallmentRecord> for Installment {
    type Error = BackOfficeError;

    fn try_from(r: InstallmentRecord) -> Result<Self, Self::Error> {
        Ok(Installment {
            sequence: u32::try_from(r.sequence).map_err(|_| {
                BackOfficeError::Storage(format!("Invalid installment sequence: {}", r.sequence))
            })?,
            amount: decimal("amount", &r.amount)?,
            status: parsed(&r.status)?,
            paid_amount: optional_decimal("paid_amount", r.paid_amount.as_deref())?,
            sync_status: parsed(&r.sync_status)?,
            generation: parsed(&r.generation)?,
            id: r.id,
            agreement_id: r.agreement_id,
            due_date: r.due_date,
            paid_date: r.paid_date,
            payment_method: r.payment_method,
            external_charge_id: r.external_charge_id,
            external_charge_url: r.external_charge_url,
            pix_payload: r.pix_payload,
            sync_note: r.sync_note,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CommissionRecord {
    pub id: String,
    pub creditor_id: String,
    pub debtor_id: String,
    pub agreement_id: Option<String>,
    pub installment_id: Option<String>,
    pub debt_id: Option<String>,
    pub commission_type: String,
    pub base_amount: String,
    pub percentage: Option<String>,
    pub commission_amount: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CommissionRecord> for Commission {
    type Error = BackOfficeError;

    fn try_from(r: CommissionRecord) -> Result<Self, Self::Error> {
        let recovered = match (r.installment_id, r.debt_id) {
            (Some(id), _) => RecoveredItem::Installment(id),
            (None, Some(id)) => RecoveredItem::Debt(id),
            (None, None) => {
                return Err(BackOfficeError::Storage(format!(
                    "Commission {} has neither installment nor debt",
                    r.id
                )))
            }
        };
        Ok(Commission {
            commission_type: parsed(&r.commission_type)?,
            base_amount: decimal("base_amount", &r.base_amount)?,
            percentage: optional_decimal("percentage", r.percentage.as_deref())?,
            commission_amount: decimal("commission_amount", &r.commission_amount)?,
            status: parsed(&r.status)?,
            id: r.id,
            creditor_id: r.creditor_id,
            debtor_id: r.debtor_id,
            agreement_id: r.agreement_id,
            recovered,
            created_at: r.created_at,
        })
    }
}
