use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{BackOfficeError, BackOfficeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Overdue => "overdue",
            InstallmentStatus::Cancelled => "cancelled",
        }
    }

    /// Allowed transitions. `paid` is terminal; overdue installments can
    /// still be paid late or moved back to pending by a reschedule.
    pub fn can_transition_to(&self, next: InstallmentStatus) -> bool {
        use InstallmentStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Overdue)
                | (Pending, Cancelled)
                | (Overdue, Paid)
                | (Overdue, Pending)
                | (Overdue, Cancelled)
        )
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstallmentStatus::Pending),
            "paid" => Ok(InstallmentStatus::Paid),
            "overdue" => Ok(InstallmentStatus::Overdue),
            "cancelled" => Ok(InstallmentStatus::Cancelled),
            other => Err(format!("Unknown installment status: {}", other)),
        }
    }
}

/// Progress of the gateway side of an installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(format!("Unknown sync status: {}", other)),
        }
    }
}

/// Schema generation a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    Legacy,
    Current,
}

impl Generation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Generation::Legacy => "legacy",
            Generation::Current => "current",
        }
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Generation::Legacy),
            "current" => Ok(Generation::Current),
            other => Err(format!("Unknown installment generation: {}", other)),
        }
    }
}

/// Installment id tagged with the schema generation that produced it.
/// Legacy rows are folded into the installments table at migration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallmentRef {
    Legacy(String),
    Current(String),
}

impl InstallmentRef {
    pub fn new(generation: Generation, id: String) -> Self {
        match generation {
            Generation::Legacy => InstallmentRef::Legacy(id),
            Generation::Current => InstallmentRef::Current(id),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            InstallmentRef::Legacy(id) | InstallmentRef::Current(id) => id,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, InstallmentRef::Legacy(_))
    }
}

/// One scheduled partial payment of an agreement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub id: String,
    pub agreement_id: String,
    /// 1-based, contiguous within the agreement
    pub sequence: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub paid_amount: Option<Decimal>,
    pub paid_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    /// Bound at most once
    pub external_charge_id: Option<String>,
    pub external_charge_url: Option<String>,
    pub pix_payload: Option<String>,
    pub sync_status: SyncStatus,
    pub sync_note: Option<String>,
    pub generation: Generation,
}

impl Installment {
    pub fn new(
        id: String,
        agreement_id: String,
        sequence: u32,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        Installment {
            id,
            agreement_id,
            sequence,
            amount,
            due_date,
            status: InstallmentStatus::Pending,
            paid_amount: None,
            paid_date: None,
            payment_method: None,
            external_charge_id: None,
            external_charge_url: None,
            pix_payload: None,
            sync_status: SyncStatus::Pending,
            sync_note: None,
            generation: Generation::Current,
        }
    }

    pub fn reference(&self) -> InstallmentRef {
        InstallmentRef::new(self.generation, self.id.clone())
    }

    /// Fails with `StateConflict` unless the installment can still be paid
    pub fn ensure_payable(&self) -> BackOfficeResult<()> {
        if self.status.can_transition_to(InstallmentStatus::Paid) {
            Ok(())
        } else {
            Err(BackOfficeError::StateConflict(format!(
                "installment {} is {} and cannot be paid",
                self.id, self.status
            )))
        }
    }

    pub fn ensure_reschedulable(&self) -> BackOfficeResult<()> {
        match self.status {
            InstallmentStatus::Pending | InstallmentStatus::Overdue => Ok(()),
            status => Err(BackOfficeError::StateConflict(format!(
                "installment {} is {} and cannot be rescheduled",
                self.id, status
            ))),
        }
    }
}
