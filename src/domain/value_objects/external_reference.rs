//! External reference attached to every gateway charge.
//!
//! Charges for installments carry `INSTALLMENT:<id>`, charges issued directly
//! for a pre-agreement debt carry `DEBT:<id>`. The prefix is what tells the
//! reconciler which table to look in.

use std::fmt;

const INSTALLMENT_PREFIX: &str = "INSTALLMENT:";
const DEBT_PREFIX: &str = "DEBT:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalReference {
    Installment(String),
    Debt(String),
}

impl ExternalReference {
    pub fn installment(id: &str) -> Self {
        ExternalReference::Installment(id.to_string())
    }

    pub fn debt(id: &str) -> Self {
        ExternalReference::Debt(id.to_string())
    }

    /// Parse a reference string. Unknown prefixes and empty ids yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(id) = raw.strip_prefix(INSTALLMENT_PREFIX) {
            if !id.is_empty() {
                return Some(ExternalReference::Installment(id.to_string()));
            }
        } else if let Some(id) = raw.strip_prefix(DEBT_PREFIX) {
            if !id.is_empty() {
                return Some(ExternalReference::Debt(id.to_string()));
            }
        }
        None
    }
}

impl fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalReference::Installment(id) => write!(f, "{}{}", INSTALLMENT_PREFIX, id),
            ExternalReference::Debt(id) => write!(f, "{}{}", DEBT_PREFIX, id),
        }
    }
}
