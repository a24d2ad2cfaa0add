pub mod agreement;
pub mod commission;
pub mod creditor;
pub mod debt;
pub mod debtor;
pub mod installment;
