//! The ledger store: accounts, ledger entries and the one sanctioned path
//! that mutates a balance.
//!
//! `apply_terminal` is a compare-and-swap on the entry's status: the entry
//! stays locked from the status check until both the entry and the account
//! are written, so a second caller for the same id observes the terminal
//! status and returns without re-applying the delta.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_types::{
    Account, AccountId, AccountRole, NewTransaction, Page, PaymentStatus, ProviderPaymentHandle,
    ReportedUpdate, Result, TallymartError, Transaction, TransactionId, TransactionKind,
};
use tracing::{debug, info, warn};

/// Outcome of [`LedgerStore::apply_terminal`].
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The account after the call.
    pub account: Account,
    /// The entry after the call.
    pub transaction: Transaction,
    /// `false` when the entry was already past this transition (no-op).
    pub applied: bool,
}

/// Query filter for transaction listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    #[must_use]
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    fn matches(&self, tx: &Transaction) -> bool {
        self.account_id.is_none_or(|id| tx.account_id == id)
            && self.status.is_none_or(|s| tx.status == s)
            && self.kind.is_none_or(|k| tx.kind == k)
            && self.from.is_none_or(|from| tx.created_at >= from)
            && self.to.is_none_or(|to| tx.created_at <= to)
    }
}

/// In-process ledger store.
///
/// Sharded maps give per-id mutual exclusion without a global lock.
pub struct LedgerStore {
    accounts: DashMap<AccountId, Account>,
    usernames: DashMap<String, AccountId>,
    transactions: DashMap<TransactionId, Transaction>,
    /// Provider payment id → entry; enforces uniqueness.
    payment_index: DashMap<String, TransactionId>,
}

impl LedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            usernames: DashMap::new(),
            transactions: DashMap::new(),
            payment_index: DashMap::new(),
        }
    }

    // =================================================================
    // Accounts
    // =================================================================

    /// Create an active account with zero balance.
    pub fn register_account(&self, username: &str, role: AccountRole) -> Result<Account> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TallymartError::validation("username is required"));
        }
        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(_) => Err(TallymartError::DuplicateUsername(username.to_string())),
            Entry::Vacant(slot) => {
                let account = Account::new(username, role);
                self.accounts.insert(account.id, account.clone());
                slot.insert(account.id);
                info!(account = %account.id, username, %role, "account registered");
                Ok(account)
            }
        }
    }

    pub fn account(&self, id: AccountId) -> Result<Account> {
        self.accounts
            .get(&id)
            .map(|a| a.clone())
            .ok_or(TallymartError::AccountNotFound(id))
    }

    #[must_use]
    pub fn find_by_username(&self, username: &str) -> Option<Account> {
        let id = self.usernames.get(username.trim()).map(|e| *e.value())?;
        self.accounts.get(&id).map(|a| a.clone())
    }

    /// Soft (de)activation. Accounts are never deleted.
    pub fn set_active(&self, id: AccountId, active: bool) -> Result<Account> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(TallymartError::AccountNotFound(id))?;
        account.is_active = active;
        account.updated_at = Utc::now();
        info!(account = %id, active, "account activation changed");
        Ok(account.clone())
    }

    /// Snapshot of every account.
    #[must_use]
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.iter().map(|a| a.value().clone()).collect()
    }

    // =================================================================
    // Recording
    // =================================================================

    /// Create a ledger entry.
    ///
    /// A terminal `draft.status` is not written directly: the entry is
    /// created as `created` and then finished through [`Self::apply_terminal`],
    /// so its balance effect takes the same path as every other one.
    pub fn record_transaction(&self, draft: NewTransaction) -> Result<Transaction> {
        let terminal = draft.status.is_terminal().then_some(draft.status);
        let tx = self.insert_entry(NewTransaction {
            status: if terminal.is_some() {
                PaymentStatus::Created
            } else {
                draft.status
            },
            ..draft
        })?;
        match terminal {
            Some(status) => self
                .finish_entry(tx.id, status, tx.price_amount)
                .map(|applied| applied.transaction),
            None => Ok(tx),
        }
    }

    /// Record an entry and finish it in the same call (admin adjustments,
    /// system charges, checkout settlement).
    ///
    /// If the debit cannot be covered the entry is closed as `failed` and
    /// `InsufficientBalance` is returned; the balance is untouched.
    pub fn settle_instant(&self, draft: NewTransaction) -> Result<Applied> {
        let tx = self.insert_entry(NewTransaction {
            status: PaymentStatus::Created,
            ..draft
        })?;
        self.finish_entry(tx.id, PaymentStatus::Finished, tx.price_amount)
    }

    fn insert_entry(&self, draft: NewTransaction) -> Result<Transaction> {
        if draft.price_amount <= Decimal::ZERO {
            return Err(TallymartError::NonPositiveAmount(draft.price_amount));
        }
        if !self.accounts.contains_key(&draft.account_id) {
            return Err(TallymartError::AccountNotFound(draft.account_id));
        }
        let tx = Transaction::from_new(draft, Utc::now());
        self.transactions.insert(tx.id, tx.clone());
        debug!(tx = %tx.id, account = %tx.account_id, kind = %tx.kind, status = %tx.status, amount = %tx.price_amount, "ledger entry recorded");
        Ok(tx)
    }

    fn finish_entry(&self, id: TransactionId, status: PaymentStatus, amount: Decimal) -> Result<Applied> {
        match self.apply_terminal(id, status, amount) {
            Err(err @ TallymartError::InsufficientBalance { .. }) => {
                if let Err(close_err) = self.apply_terminal(id, PaymentStatus::Failed, Decimal::ZERO) {
                    warn!(tx = %id, error = %close_err, "could not close uncovered debit as failed");
                }
                Err(err)
            }
            other => other,
        }
    }

    /// Attach the provider's identifiers to a pending entry.
    pub fn attach_provider_handle(
        &self,
        id: TransactionId,
        handle: &ProviderPaymentHandle,
        callback_url: Option<String>,
    ) -> Result<Transaction> {
        let index_entry = self.payment_index.entry(handle.payment_id.clone());
        if let Entry::Occupied(existing) = &index_entry {
            if *existing.get() != id {
                return Err(TallymartError::DuplicatePaymentId(handle.payment_id.clone()));
            }
        }
        let mut tx = self
            .transactions
            .get_mut(&id)
            .ok_or_else(|| TallymartError::TransactionNotFound(id.to_string()))?;
        tx.provider_payment_id = Some(handle.payment_id.clone());
        tx.purchase_id.clone_from(&handle.purchase_id);
        tx.pay_address.clone_from(&handle.pay_address);
        tx.pay_amount = handle.pay_amount;
        if handle.pay_currency.is_some() {
            tx.pay_currency.clone_from(&handle.pay_currency);
        }
        tx.network.clone_from(&handle.network);
        tx.callback_url = callback_url;
        tx.updated_at = Utc::now();
        index_entry.or_insert(id);
        Ok(tx.clone())
    }

    /// Overwrite informational fields reported by the provider.
    ///
    /// A non-terminal `status` is accepted unless the entry is already
    /// `finished` or `refunded`; delivery order is not guaranteed, so
    /// "backward" moves among pending statuses are allowed.
    pub fn update_reported(&self, id: TransactionId, update: ReportedUpdate) -> Result<Transaction> {
        let mut tx = self
            .transactions
            .get_mut(&id)
            .ok_or_else(|| TallymartError::TransactionNotFound(id.to_string()))?;

        if let Some(status) = update.status {
            if status.is_terminal() {
                return Err(TallymartError::InvalidTransition {
                    id,
                    reason: format!("{status} must be applied through apply_terminal"),
                });
            }
            if matches!(tx.status, PaymentStatus::Finished | PaymentStatus::Refunded) {
                return Err(TallymartError::InvalidTransition {
                    id,
                    reason: format!("entry is already {}", tx.status),
                });
            }
            tx.status = status;
        }
        if let Some(v) = update.actually_paid {
            tx.actually_paid = v;
        }
        if let Some(v) = update.amount_received {
            tx.amount_received = v;
        }
        if let Some(v) = update.remaining_amount {
            tx.remaining_amount = v;
        }
        if let Some(v) = update.is_partial_payment {
            tx.is_partial_payment = v;
        }
        if update.payin_hash.is_some() {
            tx.payin_hash = update.payin_hash;
        }
        if update.payout_hash.is_some() {
            tx.payout_hash = update.payout_hash;
        }
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    // =================================================================
    // Terminal application
    // =================================================================

    /// Move an entry to a terminal status and apply its balance delta.
    ///
    /// - `finished`: credit kinds add `amount`, debit kinds subtract it
    /// - `refunded`: adds `amount` as a separate credit (crypto payments only)
    /// - `failed` / `expired`: no balance effect
    ///
    /// Idempotent: if the entry's current status does not accept `terminal`
    /// (see [`PaymentStatus::accepts_terminal`]) nothing changes and
    /// `applied` is `false`. A debit that would drive the balance negative
    /// fails with `InsufficientBalance` and leaves both records untouched.
    pub fn apply_terminal(
        &self,
        id: TransactionId,
        terminal: PaymentStatus,
        amount: Decimal,
    ) -> Result<Applied> {
        if !terminal.is_terminal() {
            return Err(TallymartError::NotTerminal(terminal));
        }
        if amount < Decimal::ZERO {
            return Err(TallymartError::NonPositiveAmount(amount));
        }

        // Entry first, account second.
        let mut tx = self
            .transactions
            .get_mut(&id)
            .ok_or_else(|| TallymartError::TransactionNotFound(id.to_string()))?;

        if !tx.status.accepts_terminal(terminal) {
            debug!(tx = %id, current = %tx.status, incoming = %terminal, "terminal already applied, no-op");
            let account = self.account(tx.account_id)?;
            return Ok(Applied {
                account,
                transaction: tx.clone(),
                applied: false,
            });
        }

        let delta = match terminal {
            PaymentStatus::Finished if tx.kind.is_credit() => amount,
            PaymentStatus::Finished => -amount,
            PaymentStatus::Refunded => {
                if tx.kind != TransactionKind::CryptoPayment {
                    return Err(TallymartError::InvalidTransition {
                        id,
                        reason: format!("{} entries cannot be refunded", tx.kind),
                    });
                }
                amount
            }
            _ => Decimal::ZERO,
        };

        let mut account = self
            .accounts
            .get_mut(&tx.account_id)
            .ok_or(TallymartError::AccountNotFound(tx.account_id))?;

        if account.balance + delta < Decimal::ZERO {
            return Err(TallymartError::InsufficientBalance {
                needed: -delta,
                available: account.balance,
            });
        }

        let now = Utc::now();
        account.balance += delta;
        account.updated_at = now;

        tx.status = terminal;
        tx.balance_effect += delta;
        tx.updated_at = now;
        if terminal == PaymentStatus::Finished {
            tx.finished_at = Some(now);
            if tx.kind != TransactionKind::CryptoPayment {
                tx.actually_paid = amount;
                tx.amount_received = amount;
                tx.remaining_amount = Decimal::ZERO;
                tx.is_partial_payment = false;
            }
        }

        info!(
            tx = %id,
            account = %account.id,
            kind = %tx.kind,
            status = %terminal,
            delta = %delta,
            balance = %account.balance,
            "terminal status applied"
        );

        Ok(Applied {
            account: account.clone(),
            transaction: tx.clone(),
            applied: true,
        })
    }

    // =================================================================
    // Queries
    // =================================================================

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.transactions
            .get(&id)
            .map(|t| t.clone())
            .ok_or_else(|| TallymartError::TransactionNotFound(id.to_string()))
    }

    #[must_use]
    pub fn transaction_by_payment_id(&self, payment_id: &str) -> Option<Transaction> {
        let id = self.payment_index.get(payment_id).map(|e| *e.value())?;
        self.transactions.get(&id).map(|t| t.clone())
    }

    /// Look up by internal id or provider payment id, scoped to `account_id`.
    pub fn find_for_account(&self, account_id: AccountId, reference: &str) -> Result<Transaction> {
        let found = reference
            .parse::<TransactionId>()
            .ok()
            .and_then(|id| self.transactions.get(&id).map(|t| t.clone()))
            .or_else(|| self.transaction_by_payment_id(reference));
        match found {
            Some(tx) if tx.account_id == account_id => Ok(tx),
            _ => Err(TallymartError::TransactionNotFound(reference.to_string())),
        }
    }

    /// Entries matching `filter`, newest first.
    #[must_use]
    pub fn query(&self, filter: &TransactionFilter) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| filter.matches(t.value()))
            .map(|t| t.value().clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }

    /// One page of [`Self::query`].
    #[must_use]
    pub fn list_transactions(&self, filter: &TransactionFilter, page: usize, limit: usize) -> Page<Transaction> {
        Page::from_sorted(self.query(filter), page, limit)
    }

    /// Entries still waiting on the provider.
    #[must_use]
    pub fn active_transactions(&self, account_id: AccountId) -> Vec<Transaction> {
        self.query(&TransactionFilter::for_account(account_id))
            .into_iter()
            .filter(|t| t.status.is_in_flight())
            .collect()
    }

    #[must_use]
    pub fn completed_transactions(&self, account_id: AccountId) -> Vec<Transaction> {
        self.query(&TransactionFilter {
            status: Some(PaymentStatus::Finished),
            ..TransactionFilter::for_account(account_id)
        })
    }

    /// `failed`, `expired` and `refunded` entries.
    #[must_use]
    pub fn failed_transactions(&self, account_id: AccountId) -> Vec<Transaction> {
        self.query(&TransactionFilter::for_account(account_id))
            .into_iter()
            .filter(|t| {
                matches!(
                    t.status,
                    PaymentStatus::Failed | PaymentStatus::Expired | PaymentStatus::Refunded
                )
            })
            .collect()
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}
