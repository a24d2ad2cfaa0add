//! Settlement scenarios end to end: agreement creation, direct and webhook
//! payments, settlement cascade, break flow and commission recording,
//! running against an in-memory ledger and the mock gateway.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use std::sync::Arc;

use recovery_desk::domain::entities::agreement::AgreementStatus;
use recovery_desk::domain::entities::creditor::{CommissionConfig, Creditor};
use recovery_desk::domain::entities::debt::{Debt, DebtStatus};
use recovery_desk::domain::entities::debtor::Debtor;
use recovery_desk::domain::entities::installment::InstallmentStatus;
use recovery_desk::domain::errors::BackOfficeError;
use recovery_desk::domain::repositories::ledger_store::{LedgerStore, PaymentRecord};
use recovery_desk::domain::repositories::payment_gateway::BillingMethod;
use recovery_desk::domain::services::agreement_service::{AgreementService, NewAgreement};
use recovery_desk::domain::services::gateway_guard::{GuardedGateway, DEFAULT_GATEWAY_TIMEOUT};
use recovery_desk::domain::services::payment_reconciler::{
    EventPayment, GatewayEvent, PaymentReconciler, ReconciliationOutcome,
};
use recovery_desk::infrastructure::mock_gateway::MockPaymentGateway;
use recovery_desk::persistence::init_database;
use recovery_desk::persistence::ledger_repository::SqliteLedgerStore;

struct Desk {
    store: Arc<SqliteLedgerStore>,
    gateway: Arc<MockPaymentGateway>,
    agreements: AgreementService,
    reconciler: PaymentReconciler,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn desk(commission: Option<CommissionConfig>) -> Desk {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let store = Arc::new(SqliteLedgerStore::new(pool));

    let mut creditor = Creditor::new("cred-1".to_string(), "Banco Alfa".to_string());
    creditor.commission = commission;
    store.insert_creditor(&creditor).await.unwrap();
    store
        .insert_debtor(&Debtor::new(
            "debtor-1".to_string(),
            "João Pereira".to_string(),
            "987.654.321-00",
        ))
        .await
        .unwrap();
    let mut debt = Debt::new(
        "debt-1".to_string(),
        "debtor-1".to_string(),
        "cred-1".to_string(),
        dec!(1000.00),
        date(2024, 11, 15),
    )
    .unwrap();
    debt.status = DebtStatus::Overdue;
    store.insert_debt(&debt).await.unwrap();

    let gateway = Arc::new(MockPaymentGateway::new());
    let guarded = GuardedGateway::new(gateway.clone(), DEFAULT_GATEWAY_TIMEOUT);
    Desk {
        agreements: AgreementService::new(store.clone(), guarded),
        reconciler: PaymentReconciler::new(store.clone()),
        store,
        gateway,
    }
}

fn terms(agreed: Decimal, count: u32) -> NewAgreement {
    NewAgreement {
        debt_id: Some("debt-1".to_string()),
        debtor_id: None,
        creditor_id: None,
        original_amount: None,
        agreed_amount: agreed,
        down_payment: Decimal::ZERO,
        installment_count: count,
        first_due_date: date(2025, 2, 1),
        payment_method: BillingMethod::Undefined,
        created_by: "operator-1".to_string(),
        notes: Some("first contact".to_string()),
    }
}

fn confirmed(payment_id: &str, reference: &str, value: Decimal) -> GatewayEvent {
    GatewayEvent {
        event: "PAYMENT_CONFIRMED".to_string(),
        payment: Some(EventPayment {
            id: payment_id.to_string(),
            value: Some(value),
            due_date: None,
            payment_date: Some(date(2025, 2, 10)),
            external_reference: Some(reference.to_string()),
            billing_type: Some("PIX".to_string()),
        }),
    }
}

#[tokio::test]
async fn test_agreement_schedule_matches_terms() {
    let desk = desk(None).await;
    let created = desk
        .agreements
        .create_agreement(terms(dec!(800.00), 4))
        .await
        .unwrap();

    assert_eq!(created.installments.len(), created.agreement.installment_count as usize);
    let sequences: BTreeSet<u32> = created.installments.iter().map(|i| i.sequence).collect();
    assert_eq!(sequences, (1..=4).collect::<BTreeSet<u32>>());

    assert_eq!(created.agreement.discount_value, dec!(200.00));
    assert_eq!(created.agreement.discount_percentage, dec!(20.00));
    let expected_dates = [
        date(2025, 2, 1),
        date(2025, 3, 1),
        date(2025, 4, 1),
        date(2025, 5, 1),
    ];
    for (installment, due) in created.installments.iter().zip(expected_dates) {
        assert_eq!(installment.amount, dec!(200.00));
        assert_eq!(installment.due_date, due);
        assert_eq!(installment.status, InstallmentStatus::Pending);
    }

    assert_eq!(desk.gateway.created_charges().len(), 4);
    let debt = desk.store.get_debt("debt-1").await.unwrap().unwrap();
    assert_eq!(debt.status, DebtStatus::Negotiating);
}

#[tokio::test]
async fn test_percentage_commission_on_installment_payment() {
    let desk = desk(Some(CommissionConfig::percentage(dec!(10)))).await;
    let created = desk
        .agreements
        .create_agreement(terms(dec!(800.00), 4))
        .await
        .unwrap();

    let reference = format!("INSTALLMENT:{}", created.installments[0].id);
    let outcome = desk
        .reconciler
        .handle_gateway_event(&confirmed("pay_x", &reference, dec!(200.00)))
        .await;
    assert!(outcome.is_update());

    let commissions = desk.store.list_commissions("cred-1").await.unwrap();
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].base_amount, dec!(200.00));
    assert_eq!(commissions[0].percentage, Some(dec!(10)));
    assert_eq!(commissions[0].commission_amount, dec!(20.00));
}

#[tokio::test]
async fn test_duplicate_webhook_is_applied_once() {
    let desk = desk(Some(CommissionConfig::percentage(dec!(10)))).await;
    let created = desk
        .agreements
        .create_agreement(terms(dec!(600.00), 4))
        .await
        .unwrap();
    let target = &created.installments[1];
    let event = confirmed("X", &format!("INSTALLMENT:{}", target.id), dec!(150));

    assert!(desk.reconciler.handle_gateway_event(&event).await.is_update());
    assert!(matches!(
        desk.reconciler.handle_gateway_event(&event).await,
        ReconciliationOutcome::NoOp(_)
    ));

    let stored = desk.store.get_installment(&target.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstallmentStatus::Paid);
    assert_eq!(stored.paid_amount, Some(dec!(150)));
    assert_eq!(stored.paid_date, Some(date(2025, 2, 10)));
    assert_eq!(desk.store.list_commissions("cred-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_only_last_payment_settles_agreement() {
    let desk = desk(None).await;
    let created = desk
        .agreements
        .create_agreement(terms(dec!(900.00), 3))
        .await
        .unwrap();
    let agreement_id = created.agreement.id.clone();

    for (i, installment) in created.installments.iter().enumerate() {
        let charge_id = installment.external_charge_id.clone().unwrap();
        let event = confirmed(&charge_id, "", dec!(300.00));
        assert!(desk.reconciler.handle_gateway_event(&event).await.is_update());

        let agreement = desk.store.get_agreement(&agreement_id).await.unwrap().unwrap();
        let debt = desk.store.get_debt("debt-1").await.unwrap().unwrap();
        if i + 1 < created.installments.len() {
            assert_eq!(agreement.status, AgreementStatus::Active);
            assert_eq!(debt.status, DebtStatus::Negotiating);
        } else {
            assert_eq!(agreement.status, AgreementStatus::Settled);
            assert_eq!(debt.status, DebtStatus::Paid);
        }
    }
    // No commission configured for this creditor
    assert!(desk.store.list_commissions("cred-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_break_with_three_pending_and_two_paid() {
    let desk = desk(None).await;
    let created = desk
        .agreements
        .create_agreement(terms(dec!(1000.00), 5))
        .await
        .unwrap();

    for installment in &created.installments[..2] {
        desk.agreements
            .register_payment(
                &installment.id,
                PaymentRecord {
                    amount: dec!(200.00),
                    paid_date: date(2025, 2, 1),
                    method: Some("TRANSFER".to_string()),
                },
            )
            .await
            .unwrap();
    }

    let report = desk
        .agreements
        .break_agreement(&created.agreement.id, "stopped answering calls")
        .await
        .unwrap();
    assert_eq!(report.agreement.status, AgreementStatus::Broken);
    assert_eq!(report.cancelled_installments.len(), 3);
    assert!(report.cancel_failures.is_empty());
    assert!(report
        .agreement
        .notes
        .as_deref()
        .unwrap()
        .contains("stopped answering calls"));

    let installments = desk.store.list_installments(&created.agreement.id).await.unwrap();
    let paid = installments.iter().filter(|i| i.status == InstallmentStatus::Paid).count();
    let cancelled = installments
        .iter()
        .filter(|i| i.status == InstallmentStatus::Cancelled)
        .count();
    assert_eq!((paid, cancelled), (2, 3));

    // Cancelled charges: the debt's own charge was never bound, so only the
    // three pending installment charges
    assert_eq!(desk.gateway.cancelled_charges().len(), 3);

    let debt = desk.store.get_debt("debt-1").await.unwrap().unwrap();
    assert_eq!(debt.status, DebtStatus::Overdue);
}

#[tokio::test]
async fn test_paying_paid_installment_conflicts_without_change() {
    let desk = desk(Some(CommissionConfig::fixed(dec!(25.00)))).await;
    let created = desk
        .agreements
        .create_agreement(terms(dec!(400.00), 2))
        .await
        .unwrap();
    let first = &created.installments[0];
    let payment = PaymentRecord {
        amount: dec!(200.00),
        paid_date: date(2025, 2, 2),
        method: None,
    };

    desk.agreements
        .register_payment(&first.id, payment.clone())
        .await
        .unwrap();
    let before = desk.store.get_installment(&first.id).await.unwrap().unwrap();

    let again = desk
        .agreements
        .register_payment(
            &first.id,
            PaymentRecord {
                amount: dec!(999.00),
                paid_date: date(2025, 3, 3),
                method: None,
            },
        )
        .await;
    assert!(matches!(again, Err(BackOfficeError::StateConflict(_))));

    let after = desk.store.get_installment(&first.id).await.unwrap().unwrap();
    assert_eq!(after.paid_amount, before.paid_amount);
    assert_eq!(after.paid_date, before.paid_date);

    let commissions = desk.store.list_commissions("cred-1").await.unwrap();
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].commission_amount, dec!(25.00));
}
