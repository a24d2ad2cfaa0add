//! Gateway installed when no API key is available.
//!
//! Every call fails with `GatewayError::NotConfigured`, so installments are
//! persisted with a `failed` sync marker and no charge bound. Once a key is
//! configured they can be picked up by a resync.

use async_trait::async_trait;

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::repositories::payment_gateway::{
    ChargeReceipt, ChargeRequest, CustomerData, PaymentGateway,
};

pub struct UnconfiguredGateway {
    reason: String,
}

impl UnconfiguredGateway {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn refuse<T>(&self) -> GatewayResult<T> {
        Err(GatewayError::NotConfigured(self.reason.clone()))
    }
}

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn find_or_create_customer(&self, _customer: &CustomerData) -> GatewayResult<String> {
        self.refuse()
    }

    async fn create_charge(&self, _request: &ChargeRequest) -> GatewayResult<ChargeReceipt> {
        self.refuse()
    }

    async fn cancel_charge(&self, _charge_id: &str) -> GatewayResult<()> {
        self.refuse()
    }

    async fn fetch_pix_code(&self, _charge_id: &str) -> GatewayResult<String> {
        self.refuse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_call_is_refused() {
        let gateway = UnconfiguredGateway::new("GATEWAY_API_KEY not set");
        assert_eq!(gateway.name(), "unconfigured");

        let customer = CustomerData {
            document: "12345678909".to_string(),
            name: "Maria".to_string(),
            email: None,
            phone: None,
        };
        assert_eq!(
            gateway.find_or_create_customer(&customer).await,
            Err(GatewayError::NotConfigured("GATEWAY_API_KEY not set".to_string()))
        );
        assert!(matches!(
            gateway.cancel_charge("pay_1").await,
            Err(GatewayError::NotConfigured(_))
        ));
        assert!(matches!(
            gateway.fetch_pix_code("pay_1").await,
            Err(GatewayError::NotConfigured(_))
        ));
    }
}
