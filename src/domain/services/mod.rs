pub mod agreement_service;
pub mod commission_engine;
pub mod gateway_guard;
pub mod payment_reconciler;
pub mod settlement;
