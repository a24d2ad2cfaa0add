use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::repositories::payment_gateway::{
    BillingMethod, ChargeReceipt, ChargeRequest, CustomerData, PaymentGateway,
};

/// Asaas API endpoints
const ASAAS_API_BASE: &str = "https://api.asaas.com/v3";
const ASAAS_SANDBOX_BASE: &str = "https://api-sandbox.asaas.com/v3";

/// Asaas connection configuration
#[derive(Clone)]
pub struct AsaasConfig {
    pub api_base: String,
    pub api_key: Zeroizing<String>,
    pub timeout: Duration,
}

impl AsaasConfig {
    pub fn new(api_key: Zeroizing<String>, sandbox: bool, timeout: Duration) -> Self {
        Self {
            api_base: if sandbox {
                ASAAS_SANDBOX_BASE.to_string()
            } else {
                ASAAS_API_BASE.to_string()
            },
            api_key,
            timeout,
        }
    }

    pub fn with_base_url(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for AsaasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsaasConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasCustomerRequest {
    pub name: String,
    pub cpf_cnpj: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AsaasCustomer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct AsaasList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasPaymentRequest {
    pub customer: String,
    pub billing_type: BillingMethod,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub due_date: NaiveDate,
    pub description: String,
    pub external_reference: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasPayment {
    pub id: String,
    pub invoice_url: Option<String>,
    pub bank_slip_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AsaasPixQrCode {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorBody {
    errors: Vec<AsaasErrorItem>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorItem {
    code: Option<String>,
    description: String,
}

/// Turn an Asaas error body into a readable message; falls back to the raw
/// body when it is not the documented `{"errors": [...]}` shape.
fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<AsaasErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed
            .errors
            .iter()
            .map(|e| match &e.code {
                Some(code) => format!("{}: {}", code, e.description),
                None => e.description.clone(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.trim().to_string(),
    }
}

/// Asaas client for the payment gateway port
pub struct AsaasClient {
    client: Client,
    config: AsaasConfig,
}

impl AsaasClient {
    pub fn new(config: AsaasConfig) -> GatewayResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GatewayError::NotConfigured(
                "Asaas API key is empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("recovery-desk")
            .build()
            .map_err(|e| GatewayError::NotConfigured(format!("HTTP client: {}", e)))?;

        info!("Asaas client ready ({})", config.api_base);
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    fn timeout_ms(&self) -> u64 {
        self.config.timeout.as_millis() as u64
    }

    fn map_send_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout_ms())
        } else {
            GatewayError::from(e)
        }
    }

    async fn check(response: Response) -> GatewayResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("Asaas API error ({}): {}", status, body);
        Err(GatewayError::Api {
            status: status.as_u16(),
            message: describe_error_body(&body),
        })
    }

    async fn search_customer(&self, document: &str) -> GatewayResult<Option<String>> {
        let response = self
            .client
            .get(self.url("/customers"))
            .header("access_token", self.config.api_key.as_str())
            .query(&[("cpfCnpj", document)])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let list: AsaasList<AsaasCustomer> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(list.data.into_iter().next().map(|c| c.id))
    }

    async fn create_customer(&self, customer: &CustomerData) -> GatewayResult<String> {
        let body = AsaasCustomerRequest {
            name: customer.name.clone(),
            cpf_cnpj: customer.document.clone(),
            email: customer.email.clone(),
            mobile_phone: customer.phone.clone(),
        };
        let response = self
            .client
            .post(self.url("/customers"))
            .header("access_token", self.config.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let created: AsaasCustomer = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        info!(customer_id = %created.id, "Asaas customer created");
        Ok(created.id)
    }
}

#[async_trait]
impl PaymentGateway for AsaasClient {
    fn name(&self) -> &str {
        "asaas"
    }

    async fn find_or_create_customer(&self, customer: &CustomerData) -> GatewayResult<String> {
        if let Some(id) = self.search_customer(&customer.document).await? {
            debug!(customer_id = %id, "Asaas customer found by document");
            return Ok(id);
        }
        self.create_customer(customer).await
    }

    async fn create_charge(&self, request: &ChargeRequest) -> GatewayResult<ChargeReceipt> {
        let body = AsaasPaymentRequest {
            customer: request.customer_id.clone(),
            billing_type: request.billing_method,
            value: request.amount,
            due_date: request.due_date,
            description: request.description.clone(),
            external_reference: request.external_reference.clone(),
        };
        let response = self
            .client
            .post(self.url("/payments"))
            .header("access_token", self.config.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let payment: AsaasPayment = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let invoice_url = payment.invoice_url.ok_or_else(|| {
            GatewayError::Parse(format!("payment {} has no invoiceUrl", payment.id))
        })?;

        info!(
            charge_id = %payment.id,
            external_reference = %request.external_reference,
            "Asaas charge created"
        );
        Ok(ChargeReceipt {
            charge_id: payment.id,
            invoice_url,
            boleto_url: payment.bank_slip_url,
            pix_payload: None,
        })
    }

    async fn cancel_charge(&self, charge_id: &str) -> GatewayResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/payments/{}", charge_id)))
            .header("access_token", self.config.api_key.as_str())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::check(response).await?;
        info!(charge_id, "Asaas charge cancelled");
        Ok(())
    }

    async fn fetch_pix_code(&self, charge_id: &str) -> GatewayResult<String> {
        let response = self
            .client
            .get(self.url(&format!("/payments/{}/pixQrCode", charge_id)))
            .header("access_token", self.config.api_key.as_str())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let qr: AsaasPixQrCode = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        Ok(qr.payload)
    }
}
