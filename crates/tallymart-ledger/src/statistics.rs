//! Per-account aggregates derived from ledger entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_types::{AccountId, PaymentStatus, Result, TransactionKind};

use crate::{LedgerStore, TransactionFilter};

/// Totals over one account's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatistics {
    pub total_transactions: usize,
    /// Finished credits from the provider and admin deposits.
    pub total_deposited: Decimal,
    /// Finished debits (admin deductions, system charges, purchases).
    pub total_spent: Decimal,
    pub total_refunded: Decimal,
    /// Finished sale proceeds.
    pub total_earned: Decimal,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub balance: Decimal,
}

impl LedgerStore {
    pub fn statistics(&self, account_id: AccountId) -> Result<AccountStatistics> {
        let balance = self.account(account_id)?.balance;
        let mut stats = AccountStatistics {
            balance,
            ..AccountStatistics::default()
        };

        for tx in self.query(&TransactionFilter::for_account(account_id)) {
            stats.total_transactions += 1;
            match tx.status {
                PaymentStatus::Finished => {
                    stats.completed += 1;
                    match tx.kind {
                        TransactionKind::CryptoPayment | TransactionKind::AdminDeposit => {
                            stats.total_deposited += tx.balance_effect;
                        }
                        TransactionKind::SaleCredit => stats.total_earned += tx.balance_effect,
                        TransactionKind::AdminDeduction | TransactionKind::SystemDeduction => {
                            stats.total_spent -= tx.balance_effect;
                        }
                    }
                }
                PaymentStatus::Refunded => {
                    stats.failed += 1;
                    stats.total_refunded += tx.balance_effect;
                }
                PaymentStatus::Failed | PaymentStatus::Expired => stats.failed += 1,
                status if status.is_in_flight() => stats.active += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}
