//! Property and concurrency tests for terminal application.
//!
//! - Idempotence: any sequence of terminal deliveries changes the balance at
//!   most once per accepted transition
//! - Conservation: balance always equals the ledger fold
//! - Serialization: racing `apply_terminal` calls on one entry apply once

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use rust_decimal::Decimal;
use tallymart_ledger::LedgerStore;
use tallymart_types::{AccountRole, NewTransaction, PaymentStatus, TransactionKind};

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn terminal_strategy() -> impl Strategy<Value = PaymentStatus> {
    prop_oneof![
        Just(PaymentStatus::Finished),
        Just(PaymentStatus::Failed),
        Just(PaymentStatus::Expired),
        Just(PaymentStatus::Refunded),
    ]
}

/// Expected balance from replaying the transition table by hand.
fn expected_balance(deliveries: &[(PaymentStatus, Decimal)]) -> Decimal {
    let mut status = PaymentStatus::Waiting;
    let mut balance = Decimal::ZERO;
    for (incoming, amount) in deliveries {
        if status.accepts_terminal(*incoming) {
            if matches!(incoming, PaymentStatus::Finished | PaymentStatus::Refunded) {
                balance += *amount;
            }
            status = *incoming;
        }
    }
    balance
}

proptest! {
    #[test]
    fn repeated_finished_credits_once(amount in amount_strategy(), repeats in 1usize..8) {
        let ledger = LedgerStore::new();
        let acct = ledger.register_account("buyer", AccountRole::Buyer).unwrap();
        let tx = ledger
            .record_transaction(
                NewTransaction::new(acct.id, TransactionKind::CryptoPayment, amount)
                    .with_status(PaymentStatus::Waiting),
            )
            .unwrap();

        for _ in 0..repeats {
            ledger.apply_terminal(tx.id, PaymentStatus::Finished, amount).unwrap();
        }
        prop_assert_eq!(ledger.account(acct.id).unwrap().balance, amount);
    }

    #[test]
    fn any_delivery_sequence_matches_table(
        deliveries in prop::collection::vec((terminal_strategy(), amount_strategy()), 1..12)
    ) {
        let ledger = LedgerStore::new();
        let acct = ledger.register_account("buyer", AccountRole::Buyer).unwrap();
        let tx = ledger
            .record_transaction(
                NewTransaction::new(acct.id, TransactionKind::CryptoPayment, Decimal::new(100, 0))
                    .with_status(PaymentStatus::Waiting),
            )
            .unwrap();

        for (status, amount) in &deliveries {
            ledger.apply_terminal(tx.id, *status, *amount).unwrap();
        }
        prop_assert_eq!(ledger.account(acct.id).unwrap().balance, expected_balance(&deliveries));
        prop_assert!(ledger.verify_account(acct.id).is_ok());
    }

    #[test]
    fn instant_debits_never_go_negative(
        ops in prop::collection::vec((any::<bool>(), amount_strategy()), 1..20)
    ) {
        let ledger = LedgerStore::new();
        let acct = ledger.register_account("client", AccountRole::Client).unwrap();
        for (credit, amount) in ops {
            let kind = if credit { TransactionKind::AdminDeposit } else { TransactionKind::AdminDeduction };
            let _ = ledger.settle_instant(NewTransaction::new(acct.id, kind, amount));
            prop_assert!(ledger.account(acct.id).unwrap().balance >= Decimal::ZERO);
        }
        prop_assert!(ledger.verify_account(acct.id).is_ok());
    }
}

#[test]
fn concurrent_finished_deliveries_apply_once() {
    let ledger = Arc::new(LedgerStore::new());
    let acct = ledger.register_account("racer", AccountRole::Buyer).unwrap();
    let tx = ledger
        .record_transaction(
            NewTransaction::new(acct.id, TransactionKind::CryptoPayment, Decimal::new(25, 0))
                .with_status(PaymentStatus::Confirming),
        )
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger
                    .apply_terminal(tx.id, PaymentStatus::Finished, Decimal::new(25, 0))
                    .unwrap()
                    .applied
            })
        })
        .collect();

    let applied = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|applied| *applied)
        .count();

    assert_eq!(applied, 1);
    assert_eq!(ledger.account(acct.id).unwrap().balance, Decimal::new(25, 0));
    ledger.verify_account(acct.id).unwrap();
}

#[test]
fn concurrent_debits_on_one_account_never_overdraw() {
    let ledger = Arc::new(LedgerStore::new());
    let acct = ledger.register_account("shared", AccountRole::Client).unwrap();
    ledger
        .settle_instant(NewTransaction::new(acct.id, TransactionKind::AdminDeposit, Decimal::new(10, 0)))
        .unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger
                    .settle_instant(NewTransaction::new(
                        acct.id,
                        TransactionKind::SystemDeduction,
                        Decimal::ONE,
                    ))
                    .is_ok()
            })
        })
        .collect();
    let succeeded = handles.into_iter().filter_map(|h| h.join().ok()).filter(|ok| *ok).count();

    assert_eq!(succeeded, 10);
    assert_eq!(ledger.account(acct.id).unwrap().balance, Decimal::ZERO);
    ledger.verify_account(acct.id).unwrap();
}
