use std::sync::Arc;

use crate::domain::repositories::ledger_store::LedgerStore;
use crate::domain::services::agreement_service::AgreementService;
use crate::domain::services::gateway_guard::GuardedGateway;
use crate::domain::services::payment_reconciler::PaymentReconciler;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub agreements: AgreementService,
    pub reconciler: PaymentReconciler,
    pub gateway_name: String,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, gateway: GuardedGateway) -> Self {
        Self {
            gateway_name: gateway.name().to_string(),
            agreements: AgreementService::new(store.clone(), gateway),
            reconciler: PaymentReconciler::new(store),
        }
    }
}
