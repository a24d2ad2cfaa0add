//! Local deadline around every payment gateway call.
//!
//! An elapsed deadline surfaces as `GatewayError::Timeout` so callers treat
//! it like any other gateway failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::repositories::payment_gateway::{
    ChargeReceipt, ChargeRequest, CustomerData, PaymentGateway,
};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct GuardedGateway {
    inner: Arc<dyn PaymentGateway>,
    deadline: Duration,
}

impl GuardedGateway {
    pub fn new(inner: Arc<dyn PaymentGateway>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    async fn guarded<T, F>(&self, operation: &str, call: F) -> GatewayResult<T>
    where
        F: Future<Output = GatewayResult<T>>,
    {
        match timeout(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => {
                let ms = self.deadline.as_millis() as u64;
                warn!(gateway = self.inner.name(), operation, "Gateway call timed out after {} ms", ms);
                Err(GatewayError::Timeout(ms))
            }
        }
    }

    pub async fn find_or_create_customer(&self, customer: &CustomerData) -> GatewayResult<String> {
        self.guarded("find_or_create_customer", self.inner.find_or_create_customer(customer))
            .await
    }

    pub async fn create_charge(&self, request: &ChargeRequest) -> GatewayResult<ChargeReceipt> {
        self.guarded("create_charge", self.inner.create_charge(request))
            .await
    }

    pub async fn cancel_charge(&self, charge_id: &str) -> GatewayResult<()> {
        self.guarded("cancel_charge", self.inner.cancel_charge(charge_id))
            .await
    }

    pub async fn fetch_pix_code(&self, charge_id: &str) -> GatewayResult<String> {
        self.guarded("fetch_pix_code", self.inner.fetch_pix_code(charge_id))
            .await
    }
}
