//! Webhook scenarios driven through the engine against a real ledger.

use std::sync::Arc;
use std::thread;

use rust_decimal::Decimal;
use serde_json::json;
use tallymart_ledger::LedgerStore;
use tallymart_reconcile::{ReconcileOutcome, ReconciliationEngine};
use tallymart_types::{
    AccountId, AccountRole, NewTransaction, PaymentStatus, TallymartError, Transaction,
    TransactionKind,
};

struct Harness {
    ledger: Arc<LedgerStore>,
    engine: ReconciliationEngine,
    account: AccountId,
}

impl Harness {
    fn new() -> Self {
        let ledger = Arc::new(LedgerStore::new());
        let account = ledger.register_account("alice", AccountRole::Client).unwrap().id;
        let engine = ReconciliationEngine::new(Arc::clone(&ledger));
        Self {
            ledger,
            engine,
            account,
        }
    }

    fn pending(&self, price: i64) -> Transaction {
        self.ledger
            .record_transaction(
                NewTransaction::new(self.account, TransactionKind::CryptoPayment, Decimal::new(price, 0))
                    .with_status(PaymentStatus::Waiting),
            )
            .unwrap()
    }

    fn deliver(&self, body: &serde_json::Value) -> tallymart_types::Result<ReconcileOutcome> {
        self.engine.handle_webhook(body.to_string().as_bytes())
    }

    fn balance(&self) -> Decimal {
        self.ledger.account(self.account).unwrap().balance
    }
}

fn event(tx: &Transaction, status: &str, paid: serde_json::Value) -> serde_json::Value {
    json!({
        "payment_id": 4_522_625_843u64,
        "payment_status": status,
        "order_id": tx.id.to_string(),
        "price_amount": tx.price_amount.to_string(),
        "actually_paid": paid,
        "pay_currency": "btc",
        "payin_hash": "0xfeed",
    })
}

#[test]
fn finished_then_duplicate_credits_once() {
    let h = Harness::new();
    let tx = h.pending(100);

    let first = h.deliver(&event(&tx, "finished", json!(100))).unwrap();
    match first {
        ReconcileOutcome::Settled { credited, balance, ref transaction } => {
            assert_eq!(credited, Decimal::new(100, 0));
            assert_eq!(balance, Decimal::new(100, 0));
            assert!(transaction.finished_at.is_some());
            assert_eq!(transaction.payin_hash.as_deref(), Some("0xfeed"));
        }
        other => panic!("expected Settled, got {other:?}"),
    }

    let again = h.deliver(&event(&tx, "finished", json!(100))).unwrap();
    assert!(matches!(again, ReconcileOutcome::Duplicate { .. }));
    assert_eq!(h.balance(), Decimal::new(100, 0));
    h.ledger.verify_account(h.account).unwrap();
}

#[test]
fn partial_payment_records_remaining_without_credit() {
    let h = Harness::new();
    let tx = h.pending(100);

    let outcome = h.deliver(&event(&tx, "partially_paid", json!("40"))).unwrap();
    let ReconcileOutcome::Updated { transaction } = outcome else {
        panic!("expected Updated");
    };
    assert_eq!(transaction.status, PaymentStatus::PartiallyPaid);
    assert_eq!(transaction.remaining_amount, Decimal::new(60, 0));
    assert!(transaction.is_partial_payment);
    assert_eq!(transaction.amount_received, Decimal::new(40, 0));
    assert_eq!(h.balance(), Decimal::ZERO);
}

#[test]
fn partial_then_finished_credits_paid_amount() {
    let h = Harness::new();
    let tx = h.pending(100);
    h.deliver(&event(&tx, "partially_paid", json!(40))).unwrap();
    h.deliver(&event(&tx, "finished", json!(95))).unwrap();
    assert_eq!(h.balance(), Decimal::new(95, 0));
}

#[test]
fn finished_without_paid_amount_credits_price() {
    let h = Harness::new();
    let tx = h.pending(30);
    h.deliver(&event(&tx, "finished", serde_json::Value::Null)).unwrap();
    assert_eq!(h.balance(), Decimal::new(30, 0));
}

#[test]
fn refund_is_a_second_separate_credit() {
    let h = Harness::new();
    let tx = h.pending(50);
    h.deliver(&event(&tx, "finished", json!(50))).unwrap();
    let outcome = h.deliver(&event(&tx, "refunded", json!(50))).unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Settled { .. }));
    assert_eq!(h.balance(), Decimal::new(100, 0));

    let stored = h.ledger.transaction(tx.id).unwrap();
    assert_eq!(stored.status, PaymentStatus::Refunded);
    assert_eq!(stored.amount_received, Decimal::ZERO);

    // Later events against a refunded entry change nothing.
    let late = h.deliver(&event(&tx, "finished", json!(50))).unwrap();
    assert!(matches!(late, ReconcileOutcome::Duplicate { .. }));
    assert_eq!(h.balance(), Decimal::new(100, 0));
}

#[test]
fn zero_refund_changes_status_only() {
    let h = Harness::new();
    let tx = h.pending(50);
    h.deliver(&event(&tx, "refunded", json!(0))).unwrap();
    assert_eq!(h.balance(), Decimal::ZERO);
    assert_eq!(h.ledger.transaction(tx.id).unwrap().status, PaymentStatus::Refunded);
}

#[test]
fn failed_and_expired_zero_received_without_balance_effect() {
    let h = Harness::new();
    for status in ["failed", "expired"] {
        let tx = h.pending(20);
        h.deliver(&event(&tx, "confirming", json!(5))).unwrap();
        assert_eq!(h.ledger.transaction(tx.id).unwrap().amount_received, Decimal::new(5, 0));

        h.deliver(&event(&tx, status, json!(5))).unwrap();
        let stored = h.ledger.transaction(tx.id).unwrap();
        assert_eq!(stored.status.as_str(), status);
        assert_eq!(stored.amount_received, Decimal::ZERO);
    }
    assert_eq!(h.balance(), Decimal::ZERO);
}

#[test]
fn expired_payment_settles_when_funds_arrive_late() {
    let h = Harness::new();
    let tx = h.pending(20);
    h.deliver(&event(&tx, "expired", json!(0))).unwrap();
    h.deliver(&event(&tx, "finished", json!(20))).unwrap();
    assert_eq!(h.balance(), Decimal::new(20, 0));
}

#[test]
fn unknown_status_is_ignored_without_mutation() {
    let h = Harness::new();
    let tx = h.pending(20);
    let outcome = h.deliver(&event(&tx, "on_hold", json!(20))).unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Ignored {
            status: "on_hold".into()
        }
    );
    let stored = h.ledger.transaction(tx.id).unwrap();
    assert_eq!(stored, tx);
}

#[test]
fn unknown_transaction_is_not_found() {
    let h = Harness::new();
    let err = h
        .deliver(&json!({
            "payment_status": "finished",
            "order_id": "0192f0c2-8d4e-7c1a-9f00-00000000ffff",
            "actually_paid": 10
        }))
        .unwrap_err();
    assert!(matches!(err, TallymartError::TransactionNotFound(_)));
    assert_eq!(err.status_code(), 404);
}

#[test]
fn malformed_payload_is_rejected_without_mutation() {
    let h = Harness::new();
    let tx = h.pending(10);
    let err = h.engine.handle_webhook(b"{\"payment_status\": 7}").unwrap_err();
    assert!(matches!(err, TallymartError::MalformedEvent { .. }));
    assert_eq!(h.ledger.transaction(tx.id).unwrap(), tx);
}

#[test]
fn backward_pending_statuses_overwrite() {
    let h = Harness::new();
    let tx = h.pending(10);
    h.deliver(&event(&tx, "confirmed", json!(10))).unwrap();
    h.deliver(&event(&tx, "confirming", json!(10))).unwrap();
    assert_eq!(h.ledger.transaction(tx.id).unwrap().status, PaymentStatus::Confirming);
}

#[test]
fn pending_event_after_finish_is_a_duplicate() {
    let h = Harness::new();
    let tx = h.pending(10);
    h.deliver(&event(&tx, "finished", json!(10))).unwrap();
    let late = h.deliver(&event(&tx, "sending", json!(10))).unwrap();
    assert!(matches!(late, ReconcileOutcome::Duplicate { .. }));
    assert_eq!(h.ledger.transaction(tx.id).unwrap().status, PaymentStatus::Finished);
}

#[test]
fn concurrent_finished_deliveries_credit_once() {
    let h = Harness::new();
    let tx = h.pending(60);
    let body = event(&tx, "finished", json!(60)).to_string();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = h.engine.clone();
            let body = body.clone();
            thread::spawn(move || engine.handle_webhook(body.as_bytes()).unwrap())
        })
        .collect();
    let settled = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|outcome| matches!(outcome, ReconcileOutcome::Settled { .. }))
        .count();

    assert_eq!(settled, 1);
    assert_eq!(h.balance(), Decimal::new(60, 0));
}
