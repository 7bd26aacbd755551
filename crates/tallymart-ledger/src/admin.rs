//! Admin balance operations: synchronous credits and debits that settle in
//! the same call through [`LedgerStore::settle_instant`].

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_types::{
    AccountId, AccountRole, AdjustDirection, NewTransaction, Result, TallymartError, Transaction,
    TransactionKind,
};
use tracing::info;

use crate::LedgerStore;

/// Result of an adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
    pub new_balance: Decimal,
    pub transaction: Transaction,
}

/// Entry point for manual balance operations.
#[derive(Clone)]
pub struct AdminDesk {
    ledger: Arc<LedgerStore>,
}

impl AdminDesk {
    #[must_use]
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Credit or debit `account_id` by `amount`.
    ///
    /// The entry is recorded as `finished` and its delta applied in the
    /// same call. A deduction larger than the balance is rejected before
    /// any entry is written.
    pub fn adjust(
        &self,
        account_id: AccountId,
        amount: Decimal,
        direction: AdjustDirection,
        note: Option<String>,
        acting_admin: AccountId,
    ) -> Result<Adjustment> {
        if amount <= Decimal::ZERO {
            return Err(TallymartError::NonPositiveAmount(amount));
        }
        let admin = self.ledger.account(acting_admin)?;
        if admin.role != AccountRole::Admin {
            return Err(TallymartError::validation(format!(
                "account {acting_admin} is not an admin"
            )));
        }
        let account = self.ledger.account(account_id)?;
        if direction == AdjustDirection::Deduction && account.balance < amount {
            return Err(TallymartError::InsufficientBalance {
                needed: amount,
                available: account.balance,
            });
        }

        let description = match direction {
            AdjustDirection::Deposit => "Admin balance deposit",
            AdjustDirection::Deduction => "Admin balance deduction",
        };
        let draft = NewTransaction {
            note,
            acting_admin: Some(acting_admin),
            ..NewTransaction::new(account_id, direction.kind(), amount).with_description(description)
        };
        let applied = self.ledger.settle_instant(draft)?;
        info!(
            account = %account_id,
            admin = %acting_admin,
            kind = %applied.transaction.kind,
            %amount,
            balance = %applied.account.balance,
            "admin adjustment settled"
        );
        Ok(Adjustment {
            new_balance: applied.account.balance,
            transaction: applied.transaction,
        })
    }

    /// Debit initiated by the system rather than an admin (service charges).
    pub fn system_charge(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Adjustment> {
        if amount <= Decimal::ZERO {
            return Err(TallymartError::NonPositiveAmount(amount));
        }
        let applied = self.ledger.settle_instant(
            NewTransaction::new(account_id, TransactionKind::SystemDeduction, amount)
                .with_description(description),
        )?;
        Ok(Adjustment {
            new_balance: applied.account.balance,
            transaction: applied.transaction,
        })
    }
}
