use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::creditor::CommissionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Paid => "paid",
        }
    }
}

impl FromStr for CommissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommissionStatus::Pending),
            "paid" => Ok(CommissionStatus::Paid),
            other => Err(format!("Unknown commission status: {}", other)),
        }
    }
}

/// What was recovered: an agreement installment or a debt paid directly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RecoveredItem {
    Installment(String),
    Debt(String),
}

/// Amount owed to the agency for one recovered item. Insert-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: String,
    pub creditor_id: String,
    pub debtor_id: String,
    pub agreement_id: Option<String>,
    pub recovered: RecoveredItem,
    pub commission_type: CommissionType,
    pub base_amount: Decimal,
    pub percentage: Option<Decimal>,
    pub commission_amount: Decimal,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}
