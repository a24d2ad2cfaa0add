use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    Percentage,
    Fixed,
    GoalBased,
}

impl CommissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionType::Percentage => "percentage",
            CommissionType::Fixed => "fixed",
            CommissionType::GoalBased => "goal_based",
        }
    }
}

impl fmt::Display for CommissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(CommissionType::Percentage),
            "fixed" => Ok(CommissionType::Fixed),
            "goal_based" => Ok(CommissionType::GoalBased),
            other => Err(format!("Unknown commission type: {}", other)),
        }
    }
}

/// How a creditor pays the agency for recovered amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionConfig {
    pub commission_type: CommissionType,
    pub percentage: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
    /// Monthly recovered total that unlocks a goal-based commission
    pub goal_amount: Option<Decimal>,
}

impl CommissionConfig {
    pub fn percentage(pct: Decimal) -> Self {
        CommissionConfig {
            commission_type: CommissionType::Percentage,
            percentage: Some(pct),
            fixed_amount: None,
            goal_amount: None,
        }
    }

    pub fn fixed(amount: Decimal) -> Self {
        CommissionConfig {
            commission_type: CommissionType::Fixed,
            percentage: None,
            fixed_amount: Some(amount),
            goal_amount: None,
        }
    }

    pub fn goal_based(fixed_amount: Decimal, goal_amount: Decimal) -> Self {
        CommissionConfig {
            commission_type: CommissionType::GoalBased,
            percentage: None,
            fixed_amount: Some(fixed_amount),
            goal_amount: Some(goal_amount),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creditor {
    pub id: String,
    pub name: String,
    pub commission: Option<CommissionConfig>,
}

impl Creditor {
    pub fn new(id: String, name: String) -> Self {
        Creditor {
            id,
            name,
            commission: None,
        }
    }

    pub fn with_commission(mut self, config: CommissionConfig) -> Self {
        self.commission = Some(config);
        self
    }
}
