//! Commission Engine
//!
//! Computes the agency's commission for a recovered amount from the
//! creditor's configuration and records it once.
//!
//! - percentage: `base × pct / 100`
//! - fixed: the configured amount regardless of base
//! - goal_based: the fixed amount once the creditor's recovered total for the
//!   calendar month of the payment reaches the goal, otherwise zero (the row
//!   is still written)
//!
//! No configuration means no commission row.

use chrono::{Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::entities::commission::{Commission, CommissionStatus, RecoveredItem};
use crate::domain::entities::creditor::{CommissionConfig, CommissionType};
use crate::domain::errors::{BackOfficeError, BackOfficeResult};
use crate::domain::repositories::ledger_store::LedgerStore;
use crate::domain::value_objects::money::{percentage_of, round2};

/// A recovered amount to compute commission for
#[derive(Debug, Clone)]
pub struct RecoveryEvent {
    pub creditor_id: String,
    pub debtor_id: String,
    pub agreement_id: Option<String>,
    pub recovered: RecoveredItem,
    pub base_amount: Decimal,
    pub paid_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub enum CommissionOutcome {
    Recorded(Commission),
    /// Creditor has no commission configuration
    NotConfigured,
    /// A commission already exists for this recovered item
    AlreadyRecorded,
}

/// Computed amount and the percentage applied, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionQuote {
    pub amount: Decimal,
    pub percentage: Option<Decimal>,
}

/// Pure commission computation. `period_total` is only consulted for
/// goal-based configurations.
pub fn quote(
    config: &CommissionConfig,
    base_amount: Decimal,
    period_total: Option<Decimal>,
) -> CommissionQuote {
    match config.commission_type {
        CommissionType::Percentage => {
            let pct = config.percentage.unwrap_or(Decimal::ZERO);
            CommissionQuote {
                amount: percentage_of(base_amount, pct),
                percentage: Some(pct),
            }
        }
        CommissionType::Fixed => CommissionQuote {
            amount: round2(config.fixed_amount.unwrap_or(Decimal::ZERO)),
            percentage: None,
        },
        CommissionType::GoalBased => {
            let reached = match (config.goal_amount, period_total) {
                (Some(goal), Some(total)) => total >= goal,
                _ => false,
            };
            let amount = match config.fixed_amount {
                Some(fixed) if reached => round2(fixed),
                _ => Decimal::ZERO,
            };
            CommissionQuote {
                amount,
                percentage: None,
            }
        }
    }
}

/// First day of the month containing `date` and of the following month
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
    (start, end)
}

#[derive(Clone)]
pub struct CommissionEngine {
    store: Arc<dyn LedgerStore>,
}

impl CommissionEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn compute_and_record(
        &self,
        event: &RecoveryEvent,
    ) -> BackOfficeResult<CommissionOutcome> {
        let creditor = self
            .store
            .get_creditor(&event.creditor_id)
            .await?
            .ok_or_else(|| BackOfficeError::not_found("Creditor", event.creditor_id.as_str()))?;

        let config = match creditor.commission {
            Some(config) => config,
            None => {
                debug!(creditor_id = %creditor.id, "No commission configured, skipping");
                return Ok(CommissionOutcome::NotConfigured);
            }
        };

        let period_total = if config.commission_type == CommissionType::GoalBased {
            let (from, to) = month_bounds(event.paid_date);
            Some(
                self.store
                    .recovered_total(&event.creditor_id, from, to)
                    .await?,
            )
        } else {
            None
        };

        let quoted = quote(&config, event.base_amount, period_total);
        let commission = Commission {
            id: Uuid::new_v4().to_string(),
            creditor_id: event.creditor_id.clone(),
            debtor_id: event.debtor_id.clone(),
            agreement_id: event.agreement_id.clone(),
            recovered: event.recovered.clone(),
            commission_type: config.commission_type,
            base_amount: event.base_amount,
            percentage: quoted.percentage,
            commission_amount: quoted.amount,
            status: CommissionStatus::Pending,
            created_at: Utc::now(),
        };

        if !self.store.insert_commission(&commission).await? {
            debug!(recovered = ?event.recovered, "Commission already recorded");
            return Ok(CommissionOutcome::AlreadyRecorded);
        }

        info!(
            commission_id = %commission.id,
            creditor_id = %commission.creditor_id,
            amount = %commission.commission_amount,
            kind = commission.commission_type.as_str(),
            "Commission recorded"
        );
        Ok(CommissionOutcome::Recorded(commission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::agreement::{Agreement, AgreementStatus};
    use crate::domain::entities::creditor::Creditor;
    use crate::domain::entities::debtor::Debtor;
    use crate::domain::entities::installment::Installment;
    use crate::domain::repositories::ledger_store::PaymentRecord;
    use crate::domain::repositories::payment_gateway::BillingMethod;
    use crate::persistence::init_database;
    use crate::persistence::ledger_repository::SqliteLedgerStore;
    use rust_decimal_macros::dec;

    async fn ledger(commission: Option<CommissionConfig>) -> Arc<SqliteLedgerStore> {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let store = Arc::new(SqliteLedgerStore::new(pool));
        let mut creditor = Creditor::new("cred-1".to_string(), "Banco Alfa".to_string());
        creditor.commission = commission;
        store.insert_creditor(&creditor).await.unwrap();
        store
            .insert_debtor(&Debtor::new(
                "debtor-1".to_string(),
                "Paulo Lima".to_string(),
                "529.982.247-25",
            ))
            .await
            .unwrap();

        let now = Utc::now();
        let agreement = Agreement {
            id: "agr-1".to_string(),
            debt_id: None,
            debtor_id: "debtor-1".to_string(),
            creditor_id: "cred-1".to_string(),
            original_amount: dec!(1500.00),
            discount_value: dec!(300.00),
            discount_percentage: dec!(20.00),
            agreed_amount: dec!(1200.00),
            down_payment: Decimal::ZERO,
            installment_count: 2,
            first_due_date: date(2025, 2, 1),
            payment_method: BillingMethod::Pix,
            status: AgreementStatus::Active,
            notes: None,
            created_by: "operator-2".to_string(),
            created_at: now,
            updated_at: now,
        };
        let installments = vec![
            Installment::new("inst-1".to_string(), "agr-1".to_string(), 1, dec!(600.00), date(2025, 2, 1)),
            Installment::new("inst-2".to_string(), "agr-1".to_string(), 2, dec!(600.00), date(2025, 3, 1)),
        ];
        store.create_agreement(&agreement, &installments).await.unwrap();
        store
    }

    async fn pay(store: &SqliteLedgerStore, installment_id: &str, amount: Decimal) -> RecoveryEvent {
        let paid_date = date(2025, 2, 10);
        store
            .mark_installment_paid(
                installment_id,
                &PaymentRecord {
                    amount,
                    paid_date,
                    method: None,
                },
            )
            .await
            .unwrap();
        RecoveryEvent {
            creditor_id: "cred-1".to_string(),
            debtor_id: "debtor-1".to_string(),
            agreement_id: Some("agr-1".to_string()),
            recovered: RecoveredItem::Installment(installment_id.to_string()),
            base_amount: amount,
            paid_date,
        }
    }

    #[tokio::test]
    async fn test_no_config_records_nothing() {
        let store = ledger(None).await;
        let engine = CommissionEngine::new(store.clone());
        let event = pay(&store, "inst-1", dec!(600.00)).await;

        let outcome = engine.compute_and_record(&event).await.unwrap();
        assert!(matches!(outcome, CommissionOutcome::NotConfigured));
        assert!(store.list_commissions("cred-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_goal_based_records_zero_until_goal_reached() {
        let store = ledger(Some(CommissionConfig::goal_based(dec!(500.00), dec!(1000.00)))).await;
        let engine = CommissionEngine::new(store.clone());

        // 600 recovered this month, below the goal
        let first = pay(&store, "inst-1", dec!(600.00)).await;
        match engine.compute_and_record(&first).await.unwrap() {
            CommissionOutcome::Recorded(c) => {
                assert_eq!(c.commission_amount, Decimal::ZERO);
                assert_eq!(c.commission_type, CommissionType::GoalBased);
            }
            other => panic!("expected a recorded commission, got {:?}", other),
        }

        // The just-paid installment counts toward the month: 1200 >= 1000
        let second = pay(&store, "inst-2", dec!(600.00)).await;
        match engine.compute_and_record(&second).await.unwrap() {
            CommissionOutcome::Recorded(c) => assert_eq!(c.commission_amount, dec!(500.00)),
            other => panic!("expected a recorded commission, got {:?}", other),
        }

        let amounts: Vec<Decimal> = store
            .list_commissions("cred-1")
            .await
            .unwrap()
            .iter()
            .map(|c| c.commission_amount)
            .collect();
        assert_eq!(amounts.len(), 2);
        assert!(amounts.contains(&Decimal::ZERO));
        assert!(amounts.contains(&dec!(500.00)));
    }

    #[tokio::test]
    async fn test_second_record_for_same_installment_is_ignored() {
        let store = ledger(Some(CommissionConfig::fixed(dec!(40.00)))).await;
        let engine = CommissionEngine::new(store.clone());
        let event = pay(&store, "inst-1", dec!(600.00)).await;

        assert!(matches!(
            engine.compute_and_record(&event).await.unwrap(),
            CommissionOutcome::Recorded(_)
        ));
        assert!(matches!(
            engine.compute_and_record(&event).await.unwrap(),
            CommissionOutcome::AlreadyRecorded
        ));
        assert_eq!(store.list_commissions("cred-1").await.unwrap().len(), 1);
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_percentage_quote() {
        let q = quote(&CommissionConfig::percentage(dec!(10)), dec!(200.00), None);
        assert_eq!(q.amount, dec!(20.00));
        assert_eq!(q.percentage, Some(dec!(10)));
    }

    #[test]
    fn test_fixed_quote_ignores_base() {
        let config = CommissionConfig::fixed(dec!(35.00));
        assert_eq!(quote(&config, dec!(10), None).amount, dec!(35.00));
        assert_eq!(quote(&config, dec!(10000), None).amount, dec!(35.00));
    }

    #[test]
    fn test_goal_based_quote() {
        let config = CommissionConfig::goal_based(dec!(500), dec!(10000));
        assert_eq!(quote(&config, dec!(200), Some(dec!(9999.99))).amount, Decimal::ZERO);
        assert_eq!(quote(&config, dec!(200), Some(dec!(10000))).amount, dec!(500));
    }

    #[test]
    fn test_goal_based_without_goal_is_zero() {
        let config = CommissionConfig {
            commission_type: CommissionType::GoalBased,
            percentage: None,
            fixed_amount: Some(dec!(500)),
            goal_amount: None,
        };
        assert_eq!(quote(&config, dec!(200), Some(dec!(1_000_000))).amount, Decimal::ZERO);
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(date(2025, 2, 17)), (date(2025, 2, 1), date(2025, 3, 1)));
        assert_eq!(month_bounds(date(2025, 12, 31)), (date(2025, 12, 1), date(2026, 1, 1)));
    }
}
