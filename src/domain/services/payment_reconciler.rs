//! Payment Reconciler
//!
//! Applies gateway payment events to local installments and debts.
//!
//! Lookup order for an event:
//! 1. installment whose bound charge id equals the event's payment id
//! 2. installment named by an `INSTALLMENT:<id>` external reference,
//!    resolved through the single id space shared by both installment
//!    generations
//! 3. debt whose own bound charge id matches (or a `DEBT:<id>` reference)
//!
//! `handle_gateway_event` never fails. Unmatched or unmapped events are
//! no-ops, internal failures are logged and the event is dropped. A paid
//! event for an installment that is already paid still re-runs the
//! settlement cascade, so a redelivery finishes what a failed one left.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::entities::commission::RecoveredItem;
use crate::domain::entities::debt::{Debt, DebtStatus};
use crate::domain::entities::installment::{Installment, InstallmentRef, InstallmentStatus};
use crate::domain::errors::{BackOfficeError, BackOfficeResult};
use crate::domain::repositories::ledger_store::{ChargeBinding, LedgerStore, PaymentRecord};
use crate::domain::services::commission_engine::{
    CommissionEngine, CommissionOutcome, RecoveryEvent,
};
use crate::domain::services::settlement::SettlementCascade;
use crate::domain::value_objects::external_reference::ExternalReference;

/// Webhook body as delivered by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub event: String,
    #[serde(default)]
    pub payment: Option<EventPayment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayment {
    pub id: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub billing_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTransition {
    Paid,
    Overdue,
    Cancelled,
}

impl PaymentTransition {
    pub fn from_event(event: &str) -> Option<Self> {
        match event {
            "PAYMENT_CONFIRMED" | "PAYMENT_RECEIVED" => Some(PaymentTransition::Paid),
            "PAYMENT_OVERDUE" => Some(PaymentTransition::Overdue),
            "PAYMENT_DELETED" | "PAYMENT_REFUNDED" => Some(PaymentTransition::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciledTarget {
    Installment(InstallmentRef),
    Debt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Acknowledged without changing anything
    NoOp(String),
    Updated {
        target: ReconciledTarget,
        transition: PaymentTransition,
    },
    /// Internal failure, logged and acknowledged
    Dropped(String),
}

impl ReconciliationOutcome {
    pub fn is_update(&self) -> bool {
        matches!(self, ReconciliationOutcome::Updated { .. })
    }
}

enum Matched {
    Installment(Installment),
    Debt(Debt),
}

#[derive(Clone)]
pub struct PaymentReconciler {
    store: Arc<dyn LedgerStore>,
    commissions: CommissionEngine,
    cascade: SettlementCascade,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        let commissions = CommissionEngine::new(store.clone());
        let cascade = SettlementCascade::new(store.clone(), commissions.clone());
        Self {
            store,
            commissions,
            cascade,
        }
    }

    pub async fn handle_gateway_event(&self, event: &GatewayEvent) -> ReconciliationOutcome {
        let Some(transition) = PaymentTransition::from_event(&event.event) else {
            debug!(event = %event.event, "Unmapped gateway event acknowledged");
            return ReconciliationOutcome::NoOp(format!("unmapped event {}", event.event));
        };
        let Some(payment) = &event.payment else {
            debug!(event = %event.event, "Gateway event without payment acknowledged");
            return ReconciliationOutcome::NoOp("event has no payment".to_string());
        };

        match self.reconcile(transition, payment).await {
            Ok(outcome) => {
                match &outcome {
                    ReconciliationOutcome::Updated { target, transition } => info!(
                        event = %event.event,
                        payment_id = %payment.id,
                        target = ?target,
                        transition = ?transition,
                        "Gateway event reconciled"
                    ),
                    ReconciliationOutcome::NoOp(reason) => debug!(
                        event = %event.event,
                        payment_id = %payment.id,
                        reason = %reason,
                        "Gateway event had no effect"
                    ),
                    ReconciliationOutcome::Dropped(_) => {}
                }
                outcome
            }
            Err(e) => {
                error!(
                    event = %event.event,
                    payment_id = %payment.id,
                    "Dropping gateway event: {}",
                    e
                );
                ReconciliationOutcome::Dropped(e.to_string())
            }
        }
    }

    async fn reconcile(
        &self,
        transition: PaymentTransition,
        payment: &EventPayment,
    ) -> BackOfficeResult<ReconciliationOutcome> {
        match self.lookup(payment).await? {
            Some(Matched::Installment(installment)) => {
                self.apply_to_installment(installment, transition, payment)
                    .await
            }
            Some(Matched::Debt(debt)) => self.apply_to_debt(debt, transition, payment).await,
            None => Ok(ReconciliationOutcome::NoOp(format!(
                "no installment or debt matches payment {}",
                payment.id
            ))),
        }
    }

    async fn lookup(&self, payment: &EventPayment) -> BackOfficeResult<Option<Matched>> {
        if !payment.id.is_empty() {
            if let Some(installment) = self.store.find_installment_by_charge(&payment.id).await? {
                return Ok(Some(Matched::Installment(installment)));
            }
        }

        let reference = payment
            .external_reference
            .as_deref()
            .and_then(ExternalReference::parse);

        if let Some(ExternalReference::Installment(id)) = &reference {
            if let Some(found) = self.store.resolve_installment_ref(id).await? {
                let installment = self
                    .store
                    .get_installment(found.id())
                    .await?
                    .ok_or_else(|| BackOfficeError::not_found("Installment", found.id()))?;
                let installment = self.adopt_charge(installment, &payment.id).await;
                return Ok(Some(Matched::Installment(installment)));
            }
        }

        if !payment.id.is_empty() {
            if let Some(debt) = self.store.find_debt_by_charge(&payment.id).await? {
                return Ok(Some(Matched::Debt(debt)));
            }
        }
        if let Some(ExternalReference::Debt(id)) = &reference {
            if let Some(debt) = self.store.get_debt(id).await? {
                return Ok(Some(Matched::Debt(debt)));
            }
        }
        Ok(None)
    }

    /// Bind the event's charge to an installment found by reference, when it
    /// has none yet
    async fn adopt_charge(&self, mut installment: Installment, charge_id: &str) -> Installment {
        if installment.external_charge_id.is_some() || charge_id.is_empty() {
            return installment;
        }
        let binding = ChargeBinding {
            charge_id: charge_id.to_string(),
            charge_url: None,
            pix_payload: None,
        };
        match self
            .store
            .bind_installment_charge(&installment.id, &binding)
            .await
        {
            Ok(()) => {
                info!(installment_id = %installment.id, charge_id, "Charge bound from gateway event");
                installment.external_charge_id = Some(binding.charge_id);
            }
            Err(e) => warn!(
                installment_id = %installment.id,
                charge_id,
                "Could not bind charge from gateway event: {}",
                e
            ),
        }
        installment
    }

    async fn apply_to_installment(
        &self,
        installment: Installment,
        transition: PaymentTransition,
        payment: &EventPayment,
    ) -> BackOfficeResult<ReconciliationOutcome> {
        let target = ReconciledTarget::Installment(installment.reference());

        let changed = match transition {
            PaymentTransition::Paid => {
                let record = payment_record(payment, installment.amount);
                let newly_paid = self
                    .store
                    .mark_installment_paid(&installment.id, &record)
                    .await?;
                if newly_paid {
                    self.cascade.on_installment_paid(&installment, &record).await?;
                } else {
                    self.resume_cascade(&installment.id).await?;
                }
                newly_paid
            }
            PaymentTransition::Overdue => {
                self.store
                    .transition_installment(
                        &installment.id,
                        &[InstallmentStatus::Pending],
                        InstallmentStatus::Overdue,
                    )
                    .await?
            }
            PaymentTransition::Cancelled => {
                self.store
                    .transition_installment(
                        &installment.id,
                        &[InstallmentStatus::Pending, InstallmentStatus::Overdue],
                        InstallmentStatus::Cancelled,
                    )
                    .await?
            }
        };

        if changed {
            Ok(ReconciliationOutcome::Updated { target, transition })
        } else {
            Ok(ReconciliationOutcome::NoOp(format!(
                "installment {} is {}, {:?} not applied",
                installment.id, installment.status, transition
            )))
        }
    }

    /// Re-run the settlement cascade for an installment that is already paid.
    /// A delivery that failed after the paid update committed left the
    /// settle or commission step undone; both are idempotent.
    async fn resume_cascade(&self, installment_id: &str) -> BackOfficeResult<()> {
        let Some(stored) = self.store.get_installment(installment_id).await? else {
            return Ok(());
        };
        let (InstallmentStatus::Paid, Some(amount), Some(paid_date)) =
            (stored.status, stored.paid_amount, stored.paid_date)
        else {
            return Ok(());
        };
        let record = PaymentRecord {
            amount,
            paid_date,
            method: stored.payment_method.clone(),
        };
        let outcome = self.cascade.on_installment_paid(&stored, &record).await?;
        let recorded = matches!(outcome.commission, CommissionOutcome::Recorded(_));
        if outcome.settlement.agreement_settled || recorded {
            info!(
                installment_id,
                agreement_settled = outcome.settlement.agreement_settled,
                "Completed settlement left over from an earlier delivery"
            );
        }
        Ok(())
    }

    async fn apply_to_debt(
        &self,
        debt: Debt,
        transition: PaymentTransition,
        payment: &EventPayment,
    ) -> BackOfficeResult<ReconciliationOutcome> {
        let status = match transition {
            PaymentTransition::Paid => DebtStatus::Paid,
            PaymentTransition::Overdue => DebtStatus::Overdue,
            PaymentTransition::Cancelled => DebtStatus::Cancelled,
        };

        // The agreement owns a negotiating debt; its old charge being
        // cancelled or going overdue says nothing about the debt now.
        if debt.status == DebtStatus::Negotiating && transition != PaymentTransition::Paid {
            return Ok(ReconciliationOutcome::NoOp(format!(
                "debt {} is under negotiation",
                debt.id
            )));
        }

        if !self.store.set_debt_status(&debt.id, status).await? {
            return Ok(ReconciliationOutcome::NoOp(format!(
                "debt {} is {}, {:?} not applied",
                debt.id, debt.status, transition
            )));
        }

        if transition == PaymentTransition::Paid {
            let record = payment_record(payment, debt.original_amount);
            self.commissions
                .compute_and_record(&RecoveryEvent {
                    creditor_id: debt.creditor_id.clone(),
                    debtor_id: debt.debtor_id.clone(),
                    agreement_id: None,
                    recovered: RecoveredItem::Debt(debt.id.clone()),
                    base_amount: record.amount,
                    paid_date: record.paid_date,
                })
                .await?;
        }

        Ok(ReconciliationOutcome::Updated {
            target: ReconciledTarget::Debt(debt.id),
            transition,
        })
    }
}

/// Payment data from the event, falling back to the expected amount and
/// today's date when the gateway leaves them out
fn payment_record(payment: &EventPayment, expected: Decimal) -> PaymentRecord {
    PaymentRecord {
        amount: payment.value.unwrap_or(expected),
        paid_date: payment
            .payment_date
            .unwrap_or_else(|| Utc::now().date_naive()),
        method: payment.billing_type.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::agreement::{Agreement, AgreementStatus};
    use crate::domain::entities::creditor::{CommissionConfig, Creditor};
    use crate::domain::entities::debtor::Debtor;
    use crate::domain::repositories::payment_gateway::BillingMethod;
    use crate::persistence::ledger_repository::SqliteLedgerStore;
    use crate::persistence::{init_database, migrate_legacy_installments};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup(installments: u32) -> (PaymentReconciler, Arc<SqliteLedgerStore>, Vec<Installment>) {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let store = Arc::new(SqliteLedgerStore::new(pool));
        store
            .insert_creditor(
                &Creditor::new("cred-1".to_string(), "Banco Alfa".to_string())
                    .with_commission(CommissionConfig::percentage(dec!(10))),
            )
            .await
            .unwrap();
        store
            .insert_debtor(&Debtor::new(
                "debtor-1".to_string(),
                "Maria Souza".to_string(),
                "12345678909",
            ))
            .await
            .unwrap();
        let mut debt = Debt::new(
            "debt-1".to_string(),
            "debtor-1".to_string(),
            "cred-1".to_string(),
            dec!(1000.00),
            date(2024, 12, 1),
        )
        .unwrap();
        debt.status = DebtStatus::Negotiating;
        store.insert_debt(&debt).await.unwrap();

        let now = Utc::now();
        let agreement = Agreement {
            id: "agr-1".to_string(),
            debt_id: Some("debt-1".to_string()),
            debtor_id: "debtor-1".to_string(),
            creditor_id: "cred-1".to_string(),
            original_amount: dec!(1000.00),
            discount_value: dec!(200.00),
            discount_percentage: dec!(20.00),
            agreed_amount: dec!(800.00),
            down_payment: Decimal::ZERO,
            installment_count: installments,
            first_due_date: date(2025, 2, 1),
            payment_method: BillingMethod::Boleto,
            status: AgreementStatus::Active,
            notes: None,
            created_by: "operator-7".to_string(),
            created_at: now,
            updated_at: now,
        };
        let rows: Vec<Installment> = (1..=installments)
            .map(|seq| {
                Installment::new(
                    format!("inst-{}", seq),
                    "agr-1".to_string(),
                    seq,
                    dec!(200.00),
                    date(2025, 1 + seq, 1),
                )
            })
            .collect();
        store.create_agreement(&agreement, &rows).await.unwrap();

        (PaymentReconciler::new(store.clone()), store, rows)
    }

    fn event(name: &str, id: &str, reference: Option<&str>, value: Decimal) -> GatewayEvent {
        GatewayEvent {
            event: name.to_string(),
            payment: Some(EventPayment {
                id: id.to_string(),
                value: Some(value),
                due_date: None,
                payment_date: Some(date(2025, 2, 3)),
                external_reference: reference.map(str::to_string),
                billing_type: Some("PIX".to_string()),
            }),
        }
    }

    #[test]
    fn test_event_mapping() {
        assert_eq!(PaymentTransition::from_event("PAYMENT_RECEIVED"), Some(PaymentTransition::Paid));
        assert_eq!(PaymentTransition::from_event("PAYMENT_OVERDUE"), Some(PaymentTransition::Overdue));
        assert_eq!(PaymentTransition::from_event("PAYMENT_REFUNDED"), Some(PaymentTransition::Cancelled));
        assert_eq!(PaymentTransition::from_event("PAYMENT_CREATED"), None);
    }

    #[test]
    fn test_parse_webhook_body() {
        let body = r#"{
            "event": "PAYMENT_CONFIRMED",
            "payment": {
                "id": "pay_123",
                "value": 150.0,
                "dueDate": "2025-02-01",
                "paymentDate": "2025-02-02",
                "externalReference": "INSTALLMENT:abc",
                "billingType": "BOLETO"
            }
        }"#;
        let event: GatewayEvent = serde_json::from_str(body).unwrap();
        let payment = event.payment.unwrap();
        assert_eq!(payment.value, Some(dec!(150)));
        assert_eq!(payment.payment_date, Some(date(2025, 2, 2)));
        assert_eq!(payment.external_reference.as_deref(), Some("INSTALLMENT:abc"));

        let bare: GatewayEvent = serde_json::from_str(r#"{"event":"PAYMENT_CONFIRMED"}"#).unwrap();
        assert!(bare.payment.is_none());
    }

    #[tokio::test]
    async fn test_unmapped_and_empty_events_are_noops() {
        let (reconciler, _, _) = setup(2).await;
        let created = event("PAYMENT_CREATED", "pay_1", Some("INSTALLMENT:inst-1"), dec!(200));
        assert!(matches!(
            reconciler.handle_gateway_event(&created).await,
            ReconciliationOutcome::NoOp(_)
        ));
        let empty = GatewayEvent {
            event: "PAYMENT_CONFIRMED".to_string(),
            payment: None,
        };
        assert!(matches!(
            reconciler.handle_gateway_event(&empty).await,
            ReconciliationOutcome::NoOp(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_payment_is_noop() {
        let (reconciler, store, _) = setup(2).await;
        let outcome = reconciler
            .handle_gateway_event(&event("PAYMENT_CONFIRMED", "pay_zzz", Some("INSTALLMENT:nope"), dec!(1)))
            .await;
        assert!(matches!(outcome, ReconciliationOutcome::NoOp(_)));
        assert!(store.list_commissions("cred-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_confirmation_is_idempotent() {
        let (reconciler, store, _) = setup(2).await;
        let confirmed = event("PAYMENT_CONFIRMED", "X", Some("INSTALLMENT:inst-1"), dec!(150));

        let first = reconciler.handle_gateway_event(&confirmed).await;
        assert_eq!(
            first,
            ReconciliationOutcome::Updated {
                target: ReconciledTarget::Installment(InstallmentRef::Current("inst-1".to_string())),
                transition: PaymentTransition::Paid,
            }
        );
        let second = reconciler.handle_gateway_event(&confirmed).await;
        assert!(matches!(second, ReconciliationOutcome::NoOp(_)));

        let installment = store.get_installment("inst-1").await.unwrap().unwrap();
        assert_eq!(installment.status, InstallmentStatus::Paid);
        assert_eq!(installment.paid_amount, Some(dec!(150)));
        assert_eq!(installment.external_charge_id.as_deref(), Some("X"));

        let commissions = store.list_commissions("cred-1").await.unwrap();
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].base_amount, dec!(150));
        assert_eq!(commissions[0].commission_amount, dec!(15.00));
    }

    #[tokio::test]
    async fn test_match_by_bound_charge_id() {
        let (reconciler, store, _) = setup(2).await;
        store
            .bind_installment_charge(
                "inst-2",
                &ChargeBinding {
                    charge_id: "pay_2".to_string(),
                    charge_url: None,
                    pix_payload: None,
                },
            )
            .await
            .unwrap();

        let outcome = reconciler
            .handle_gateway_event(&event("PAYMENT_OVERDUE", "pay_2", None, dec!(200)))
            .await;
        assert!(outcome.is_update());
        let installment = store.get_installment("inst-2").await.unwrap().unwrap();
        assert_eq!(installment.status, InstallmentStatus::Overdue);
    }

    #[tokio::test]
    async fn test_last_payment_settles_and_cascades() {
        let (reconciler, store, _) = setup(2).await;
        reconciler
            .handle_gateway_event(&event("PAYMENT_RECEIVED", "p1", Some("INSTALLMENT:inst-1"), dec!(200)))
            .await;
        let agreement = store.get_agreement("agr-1").await.unwrap().unwrap();
        assert_eq!(agreement.status, AgreementStatus::Active);

        reconciler
            .handle_gateway_event(&event("PAYMENT_RECEIVED", "p2", Some("INSTALLMENT:inst-2"), dec!(200)))
            .await;
        let agreement = store.get_agreement("agr-1").await.unwrap().unwrap();
        assert_eq!(agreement.status, AgreementStatus::Settled);
        let debt = store.get_debt("debt-1").await.unwrap().unwrap();
        assert_eq!(debt.status, DebtStatus::Paid);
        assert_eq!(store.list_commissions("cred-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_does_not_touch_paid_installment() {
        let (reconciler, store, _) = setup(2).await;
        reconciler
            .handle_gateway_event(&event("PAYMENT_CONFIRMED", "p1", Some("INSTALLMENT:inst-1"), dec!(200)))
            .await;
        let outcome = reconciler
            .handle_gateway_event(&event("PAYMENT_DELETED", "p1", None, dec!(200)))
            .await;
        assert!(matches!(outcome, ReconciliationOutcome::NoOp(_)));
        let installment = store.get_installment("inst-1").await.unwrap().unwrap();
        assert_eq!(installment.status, InstallmentStatus::Paid);
    }

    #[tokio::test]
    async fn test_paid_event_after_cancellation_is_ignored() {
        let (reconciler, store, _) = setup(2).await;
        reconciler
            .handle_gateway_event(&event("PAYMENT_DELETED", "p1", Some("INSTALLMENT:inst-1"), dec!(200)))
            .await;
        let outcome = reconciler
            .handle_gateway_event(&event("PAYMENT_CONFIRMED", "p1", None, dec!(200)))
            .await;
        assert!(matches!(outcome, ReconciliationOutcome::NoOp(_)));
        assert!(store.list_commissions("cred-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_installment_reconciled_once() {
        let (reconciler, store, _) = setup(1).await;
        sqlx::query(
            "INSERT INTO legacy_installments (id, agreement_id, installment_number, value, due_date, status)
             VALUES ('old-1', 'agr-1', 2, '150.00', '2025-03-01', 'PENDING')",
        )
        .execute(store.pool())
        .await
        .unwrap();
        migrate_legacy_installments(store.pool()).await.unwrap();

        let confirmed = event("PAYMENT_CONFIRMED", "legacy-pay", Some("INSTALLMENT:old-1"), dec!(150));
        let outcome = reconciler.handle_gateway_event(&confirmed).await;
        assert_eq!(
            outcome,
            ReconciliationOutcome::Updated {
                target: ReconciledTarget::Installment(InstallmentRef::Legacy("old-1".to_string())),
                transition: PaymentTransition::Paid,
            }
        );
        assert!(matches!(
            reconciler.handle_gateway_event(&confirmed).await,
            ReconciliationOutcome::NoOp(_)
        ));
        assert_eq!(store.list_commissions("cred-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_debt_charge_paid_directly() {
        let (reconciler, store, _) = setup(1).await;
        let mut debt = Debt::new(
            "debt-2".to_string(),
            "debtor-1".to_string(),
            "cred-1".to_string(),
            dec!(300.00),
            date(2025, 1, 10),
        )
        .unwrap();
        debt.status = DebtStatus::Overdue;
        store.insert_debt(&debt).await.unwrap();
        store
            .bind_debt_charge(
                "debt-2",
                &ChargeBinding {
                    charge_id: "pay_debt2".to_string(),
                    charge_url: None,
                    pix_payload: None,
                },
            )
            .await
            .unwrap();

        let outcome = reconciler
            .handle_gateway_event(&event("PAYMENT_RECEIVED", "pay_debt2", Some("DEBT:debt-2"), dec!(300)))
            .await;
        assert_eq!(
            outcome,
            ReconciliationOutcome::Updated {
                target: ReconciledTarget::Debt("debt-2".to_string()),
                transition: PaymentTransition::Paid,
            }
        );
        let stored = store.get_debt("debt-2").await.unwrap().unwrap();
        assert_eq!(stored.status, DebtStatus::Paid);

        let commissions = store.list_commissions("cred-1").await.unwrap();
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].recovered, RecoveredItem::Debt("debt-2".to_string()));
        assert_eq!(commissions[0].commission_amount, dec!(30.00));
    }

    #[tokio::test]
    async fn test_negotiating_debt_ignores_old_charge_cancellation() {
        let (reconciler, store, _) = setup(1).await;
        let outcome = reconciler
            .handle_gateway_event(&event("PAYMENT_DELETED", "whatever", Some("DEBT:debt-1"), dec!(1000)))
            .await;
        assert!(matches!(outcome, ReconciliationOutcome::NoOp(_)));
        let debt = store.get_debt("debt-1").await.unwrap().unwrap();
        assert_eq!(debt.status, DebtStatus::Negotiating);
    }

    #[tokio::test]
    async fn test_storage_failure_is_dropped() {
        let (reconciler, store, _) = setup(1).await;
        store.pool().close().await;
        let outcome = reconciler
            .handle_gateway_event(&event("PAYMENT_CONFIRMED", "p1", Some("INSTALLMENT:inst-1"), dec!(200)))
            .await;
        assert!(matches!(outcome, ReconciliationOutcome::Dropped(_)));
    }

    #[tokio::test]
    async fn test_redelivery_finishes_interrupted_settlement() {
        let (reconciler, store, _) = setup(1).await;
        let confirmed = event("PAYMENT_CONFIRMED", "pay_1", Some("INSTALLMENT:inst-1"), dec!(200));

        sqlx::query("ALTER TABLE agreements RENAME TO agreements_offline")
            .execute(store.pool())
            .await
            .unwrap();
        let first = reconciler.handle_gateway_event(&confirmed).await;
        assert!(matches!(first, ReconciliationOutcome::Dropped(_)));
        sqlx::query("ALTER TABLE agreements_offline RENAME TO agreements")
            .execute(store.pool())
            .await
            .unwrap();

        let installment = store.get_installment("inst-1").await.unwrap().unwrap();
        assert_eq!(installment.status, InstallmentStatus::Paid);
        let agreement = store.get_agreement("agr-1").await.unwrap().unwrap();
        assert_eq!(agreement.status, AgreementStatus::Active);
        assert!(store.list_commissions("cred-1").await.unwrap().is_empty());

        let second = reconciler.handle_gateway_event(&confirmed).await;
        assert!(matches!(second, ReconciliationOutcome::NoOp(_)));

        let agreement = store.get_agreement("agr-1").await.unwrap().unwrap();
        assert_eq!(agreement.status, AgreementStatus::Settled);
        let debt = store.get_debt("debt-1").await.unwrap().unwrap();
        assert_eq!(debt.status, DebtStatus::Paid);
        let commissions = store.list_commissions("cred-1").await.unwrap();
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].commission_amount, dec!(20.00));

        // A further replay records nothing new
        reconciler.handle_gateway_event(&confirmed).await;
        assert_eq!(store.list_commissions("cred-1").await.unwrap().len(), 1);
    }
}
