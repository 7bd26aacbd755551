//! Admin dashboard aggregates.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_checkout::InventoryStore;
use tallymart_ledger::LedgerStore;
use tallymart_types::{constants, Account, AccountId, AccountRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientBalance {
    pub account_id: AccountId,
    pub username: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Sum of balances over active client accounts.
    pub total_client_balance: Decimal,
    pub active_clients: usize,
    /// Richest active clients, highest balance first.
    pub top_clients: Vec<ClientBalance>,
    /// Listing counts per category, then per status.
    pub listings_by_category: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Buying accounts: `client` and `buyer` roles.
fn is_client(account: &Account) -> bool {
    account.is_active && matches!(account.role, AccountRole::Client | AccountRole::Buyer)
}

#[must_use]
pub fn dashboard_stats(ledger: &LedgerStore, inventory: &InventoryStore) -> DashboardStats {
    let mut clients: Vec<Account> = ledger.accounts().into_iter().filter(is_client).collect();
    let total_client_balance = clients.iter().map(|a| a.balance).sum();
    let active_clients = clients.len();

    clients.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.username.cmp(&b.username)));
    let top_clients = clients
        .into_iter()
        .take(constants::DASHBOARD_TOP_CLIENTS)
        .map(|a| ClientBalance {
            account_id: a.id,
            username: a.username,
            balance: a.balance,
        })
        .collect();

    DashboardStats {
        total_client_balance,
        active_clients,
        top_clients,
        listings_by_category: inventory.counts_by_category(),
    }
}
