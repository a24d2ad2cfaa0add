use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::repositories::payment_gateway::BillingMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    Active,
    Settled,
    Broken,
}

impl AgreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementStatus::Active => "active",
            AgreementStatus::Settled => "settled",
            AgreementStatus::Broken => "broken",
        }
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgreementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AgreementStatus::Active),
            "settled" => Ok(AgreementStatus::Settled),
            "broken" => Ok(AgreementStatus::Broken),
            other => Err(format!("Unknown agreement status: {}", other)),
        }
    }
}

/// Negotiated restructuring of a debt into a new amount and schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agreement {
    pub id: String,
    pub debt_id: Option<String>,
    pub debtor_id: String,
    pub creditor_id: String,
    pub original_amount: Decimal,
    /// `original_amount - agreed_amount`
    pub discount_value: Decimal,
    pub discount_percentage: Decimal,
    pub agreed_amount: Decimal,
    pub down_payment: Decimal,
    pub installment_count: u32,
    pub first_due_date: NaiveDate,
    pub payment_method: BillingMethod,
    pub status: AgreementStatus,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agreement {
    /// Amount spread over the installments
    pub fn financed_amount(&self) -> Decimal {
        self.agreed_amount - self.down_payment
    }

    pub fn is_active(&self) -> bool {
        self.status == AgreementStatus::Active
    }
}

/// Append a line to free-form notes
pub fn append_note(existing: Option<&str>, line: &str) -> String {
    match existing {
        Some(notes) if !notes.trim().is_empty() => format!("{}\n{}", notes, line),
        _ => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_note() {
        assert_eq!(append_note(None, "broken: no payment"), "broken: no payment");
        assert_eq!(append_note(Some(""), "x"), "x");
        assert_eq!(append_note(Some("first"), "second"), "first\nsecond");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("settled".parse::<AgreementStatus>(), Ok(AgreementStatus::Settled));
        assert!("closed".parse::<AgreementStatus>().is_err());
    }
}
