//! Balance conservation check.
//!
//! Invariant, for every account at rest:
//! ```text
//! account.balance == Σ entry.balance_effect   (entries of that account)
//! ```
//!
//! Reads are not atomic across the two maps, so a check taken while a
//! terminal application is in flight may report a transient mismatch.

use rust_decimal::Decimal;
use tallymart_types::{AccountId, Result, TallymartError};
use tracing::error;

use crate::LedgerStore;

impl LedgerStore {
    /// Recompute an account's balance from its ledger entries.
    #[must_use]
    pub fn balance_from_ledger(&self, account_id: AccountId) -> Decimal {
        self.query(&crate::TransactionFilter::for_account(account_id))
            .iter()
            .map(|tx| tx.balance_effect)
            .sum()
    }

    /// Check that the materialized balance equals the ledger fold.
    ///
    /// # Errors
    /// [`TallymartError::BalanceInvariantViolation`] on mismatch.
    pub fn verify_account(&self, account_id: AccountId) -> Result<()> {
        let actual = self.account(account_id)?.balance;
        let expected = self.balance_from_ledger(account_id);
        if actual != expected {
            error!(account = %account_id, %actual, %expected, "balance invariant violated");
            return Err(TallymartError::BalanceInvariantViolation {
                reason: format!("account {account_id}: balance {actual} != ledger {expected}"),
            });
        }
        Ok(())
    }

    /// [`Self::verify_account`] over every account; stops at the first failure.
    pub fn verify_all(&self) -> Result<()> {
        self.accounts()
            .iter()
            .try_for_each(|account| self.verify_account(account.id))
    }
}
