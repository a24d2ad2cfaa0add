use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Pending,
    Overdue,
    Negotiating,
    Paid,
    Cancelled,
}

impl DebtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Pending => "pending",
            DebtStatus::Overdue => "overdue",
            DebtStatus::Negotiating => "negotiating",
            DebtStatus::Paid => "paid",
            DebtStatus::Cancelled => "cancelled",
        }
    }

    /// A paid or cancelled debt cannot be renegotiated
    pub fn is_closed(&self) -> bool {
        matches!(self, DebtStatus::Paid | DebtStatus::Cancelled)
    }
}

impl fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebtStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DebtStatus::Pending),
            "overdue" => Ok(DebtStatus::Overdue),
            "negotiating" => Ok(DebtStatus::Negotiating),
            "paid" => Ok(DebtStatus::Paid),
            "cancelled" => Ok(DebtStatus::Cancelled),
            other => Err(format!("Unknown debt status: {}", other)),
        }
    }
}

/// The original uncollected obligation. Created outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debt {
    pub id: String,
    pub debtor_id: String,
    pub creditor_id: String,
    pub original_amount: Decimal,
    pub due_date: NaiveDate,
    pub status: DebtStatus,
    /// Gateway charge issued for the debt itself, before any agreement
    pub external_charge_id: Option<String>,
    pub external_charge_url: Option<String>,
    pub notes: Option<String>,
}

impl Debt {
    pub fn new(
        id: String,
        debtor_id: String,
        creditor_id: String,
        original_amount: Decimal,
        due_date: NaiveDate,
    ) -> Result<Self, String> {
        if original_amount <= Decimal::ZERO {
            return Err("Debt amount must be positive".to_string());
        }
        Ok(Debt {
            id,
            debtor_id,
            creditor_id,
            original_amount,
            due_date,
            status: DebtStatus::Pending,
            external_charge_id: None,
            external_charge_url: None,
            notes: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_debt_new_starts_pending() {
        let debt = Debt::new(
            "d1".to_string(),
            "debtor".to_string(),
            "creditor".to_string(),
            dec!(1000.00),
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(debt.status, DebtStatus::Pending);
        assert!(debt.external_charge_id.is_none());
    }

    #[test]
    fn test_debt_rejects_non_positive_amount() {
        let debt = Debt::new(
            "d1".to_string(),
            "debtor".to_string(),
            "creditor".to_string(),
            Decimal::ZERO,
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
        );
        assert!(debt.is_err());
    }

    #[test]
    fn test_status_round_trip_and_closed() {
        assert_eq!("negotiating".parse::<DebtStatus>(), Ok(DebtStatus::Negotiating));
        assert!("archived".parse::<DebtStatus>().is_err());
        assert!(DebtStatus::Paid.is_closed());
        assert!(!DebtStatus::Overdue.is_closed());
    }
}
