pub mod agreement_handler;
pub mod health_handler;
pub mod installment_handler;
pub mod webhook_handler;
