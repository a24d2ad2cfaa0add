use serde::{Deserialize, Serialize};

/// Person or company owing the debt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debtor {
    pub id: String,
    pub name: String,
    /// CPF or CNPJ, digits only
    pub document: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Customer id at the payment gateway, once known
    pub gateway_customer_id: Option<String>,
}

impl Debtor {
    pub fn new(id: String, name: String, document: &str) -> Self {
        Debtor {
            id,
            name,
            document: normalize_document(document),
            email: None,
            phone: None,
            gateway_customer_id: None,
        }
    }
}

/// Strip punctuation from a CPF/CNPJ ("123.456.789-09" -> "12345678909")
pub fn normalize_document(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
