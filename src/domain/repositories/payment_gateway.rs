//! Payment Gateway Port
//!
//! The `PaymentGateway` trait is the capability set the settlement engine
//! consumes from an external payment processor: customer lookup/creation,
//! charge creation and cancellation, and PIX code retrieval.
//!
//! Implementations live in `infrastructure`. Callers wrap every call in a
//! local timeout and treat any error as non-fatal for local state.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::GatewayResult;

/// How the debtor is asked to pay a charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMethod {
    Boleto,
    Pix,
    CreditCard,
    /// Debtor chooses on the invoice page
    Undefined,
}

impl BillingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMethod::Boleto => "BOLETO",
            BillingMethod::Pix => "PIX",
            BillingMethod::CreditCard => "CREDIT_CARD",
            BillingMethod::Undefined => "UNDEFINED",
        }
    }

    /// Charges payable by PIX expose a copy-and-paste payload
    pub fn supports_pix(&self) -> bool {
        matches!(self, BillingMethod::Pix | BillingMethod::Undefined)
    }
}

impl fmt::Display for BillingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BOLETO" => Ok(BillingMethod::Boleto),
            "PIX" => Ok(BillingMethod::Pix),
            "CREDIT_CARD" => Ok(BillingMethod::CreditCard),
            "UNDEFINED" => Ok(BillingMethod::Undefined),
            other => Err(format!("Unknown billing method: {}", other)),
        }
    }
}

/// Debtor identity as the gateway needs it
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerData {
    pub document: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub customer_id: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub description: String,
    /// `INSTALLMENT:<id>` or `DEBT:<id>`
    pub external_reference: String,
    pub billing_method: BillingMethod,
}

/// What the gateway hands back for a newly created charge
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeReceipt {
    pub charge_id: String,
    pub invoice_url: String,
    pub boleto_url: Option<String>,
    pub pix_payload: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Gateway name for logging
    fn name(&self) -> &str;

    /// Search a customer by document, create it when absent
    async fn find_or_create_customer(&self, customer: &CustomerData) -> GatewayResult<String>;

    async fn create_charge(&self, request: &ChargeRequest) -> GatewayResult<ChargeReceipt>;

    /// Best-effort; callers tolerate errors
    async fn cancel_charge(&self, charge_id: &str) -> GatewayResult<()>;

    async fn fetch_pix_code(&self, charge_id: &str) -> GatewayResult<String>;
}
