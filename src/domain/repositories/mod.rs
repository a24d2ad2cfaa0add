pub mod ledger_store;
pub mod payment_gateway;
