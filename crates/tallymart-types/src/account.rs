//! Balance-holding accounts.
//!
//! `balance` is owned by the ledger: it is only ever written by
//! `tallymart-ledger` alongside the ledger entry that explains it.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// What an account is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Admin,
    Client,
    Seller,
    Buyer,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Client => write!(f, "client"),
            Self::Seller => write!(f, "seller"),
            Self::Buyer => write!(f, "buyer"),
        }
    }
}

/// A user's balance holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub role: AccountRole,
    /// Never negative.
    pub balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A fresh, active account with zero balance.
    #[must_use]
    pub fn new(username: impl Into<String>, role: AccountRole) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            username: username.into(),
            role,
            balance: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn has_sufficient_balance(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_active_and_empty() {
        let acct = Account::new("alice", AccountRole::Client);
        assert!(acct.is_active);
        assert_eq!(acct.balance, Decimal::ZERO);
        assert!(acct.has_sufficient_balance(Decimal::ZERO));
        assert!(!acct.has_sufficient_balance(Decimal::new(1, 2)));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&AccountRole::Seller).unwrap();
        assert_eq!(json, "\"seller\"");
    }
}
