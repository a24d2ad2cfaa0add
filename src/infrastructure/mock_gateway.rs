//! In-process payment gateway for tests and local runs.
//!
//! Records every call and can be scripted to fail specific charge creations,
//! cancellations or customer lookups, or to stall long enough to trip the
//! caller's timeout.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::{GatewayError, GatewayResult};
use crate::domain::repositories::payment_gateway::{
    ChargeReceipt, ChargeRequest, CustomerData, PaymentGateway,
};

#[derive(Default)]
struct MockState {
    next_id: u64,
    customers: HashMap<String, String>,
    customer_lookups: usize,
    charge_attempts: usize,
    charges: Vec<(String, ChargeRequest)>,
    cancelled: Vec<String>,
    pix_fetches: usize,
    // Scripted behaviour
    failing_charge_attempts: HashSet<usize>,
    fail_customers: bool,
    fail_cancellations: bool,
    fail_pix: bool,
    inline_pix: bool,
    delay: Option<Duration>,
}

#[derive(Default)]
pub struct MockPaymentGateway {
    state: Mutex<MockState>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the given charge creation attempts (1-based, counted across calls)
    pub fn fail_charge_attempts(self, attempts: &[usize]) -> Self {
        self.state().failing_charge_attempts = attempts.iter().copied().collect();
        self
    }

    pub fn fail_customers(self) -> Self {
        self.state().fail_customers = true;
        self
    }

    pub fn fail_cancellations(self) -> Self {
        self.state().fail_cancellations = true;
        self
    }

    pub fn fail_pix(self) -> Self {
        self.state().fail_pix = true;
        self
    }

    /// Return the PIX payload directly in the create-charge response
    pub fn with_inline_pix(self) -> Self {
        self.state().inline_pix = true;
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state().delay = Some(delay);
        self
    }

    /// Clear scripted failures, keep recorded calls
    pub fn recover(&self) {
        let mut state = self.state();
        state.failing_charge_attempts.clear();
        state.fail_customers = false;
        state.fail_cancellations = false;
        state.fail_pix = false;
        state.delay = None;
    }

    pub fn created_charges(&self) -> Vec<(String, ChargeRequest)> {
        self.state().charges.clone()
    }

    pub fn cancelled_charges(&self) -> Vec<String> {
        self.state().cancelled.clone()
    }

    pub fn customer_lookups(&self) -> usize {
        self.state().customer_lookups
    }

    pub fn pix_fetches(&self) -> usize {
        self.state().pix_fetches
    }

    async fn pause(&self) {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn rejected(message: &str) -> GatewayError {
        GatewayError::Api {
            status: 400,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn find_or_create_customer(&self, customer: &CustomerData) -> GatewayResult<String> {
        self.pause().await;
        let mut state = self.state();
        state.customer_lookups += 1;
        if state.fail_customers {
            return Err(Self::rejected("invalid_cpfCnpj: customer rejected"));
        }
        if let Some(id) = state.customers.get(&customer.document) {
            return Ok(id.clone());
        }
        state.next_id += 1;
        let id = format!("cus_{:06}", state.next_id);
        state.customers.insert(customer.document.clone(), id.clone());
        Ok(id)
    }

    async fn create_charge(&self, request: &ChargeRequest) -> GatewayResult<ChargeReceipt> {
        self.pause().await;
        let mut state = self.state();
        state.charge_attempts += 1;
        if state.failing_charge_attempts.contains(&state.charge_attempts) {
            debug!(attempt = state.charge_attempts, "Mock gateway failing charge");
            return Err(Self::rejected("invalid_value: charge rejected"));
        }
        state.next_id += 1;
        let charge_id = format!("pay_{:06}", state.next_id);
        state.charges.push((charge_id.clone(), request.clone()));
        Ok(ChargeReceipt {
            invoice_url: format!("https://mock.gateway/i/{}", charge_id),
            boleto_url: Some(format!("https://mock.gateway/b/{}", charge_id)),
            pix_payload: state
                .inline_pix
                .then(|| format!("00020101021226-{}", charge_id)),
            charge_id,
        })
    }

    async fn cancel_charge(&self, charge_id: &str) -> GatewayResult<()> {
        self.pause().await;
        let mut state = self.state();
        if state.fail_cancellations {
            return Err(GatewayError::Network("connection reset".to_string()));
        }
        state.cancelled.push(charge_id.to_string());
        Ok(())
    }

    async fn fetch_pix_code(&self, charge_id: &str) -> GatewayResult<String> {
        self.pause().await;
        let mut state = self.state();
        state.pix_fetches += 1;
        if state.fail_pix {
            return Err(Self::rejected("pix unavailable"));
        }
        Ok(format!("00020101021226-{}", charge_id))
    }
}
