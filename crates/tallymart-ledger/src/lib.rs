//! # tallymart-ledger
//!
//! **Ledger Store**: the single writer of account balances.
//!
//! ## Architecture
//!
//! Every balance change is explained by a ledger entry ([`Transaction`]):
//! 1. [`LedgerStore::record_transaction`] creates a pending entry
//! 2. [`LedgerStore::apply_terminal`] moves it to a terminal status and
//!    applies its balance delta, exactly once per accepted transition
//! 3. [`LedgerStore::statistics`] and [`LedgerStore::verify_account`] are
//!    derived reads over the entries
//!
//! Admin adjustments, system charges and checkout settlement all funnel
//! through [`LedgerStore::settle_instant`], which is `record_transaction`
//! followed by `apply_terminal(finished)`.
//!
//! ## Locking
//!
//! Entries and accounts live in sharded maps. A writer always takes the
//! entry first and the account second, and never the reverse.
//!
//! [`Transaction`]: tallymart_types::Transaction

pub mod admin;
pub mod conservation;
pub mod statistics;
pub mod store;

pub use admin::{AdminDesk, Adjustment};
pub use statistics::AccountStatistics;
pub use store::{Applied, LedgerStore, TransactionFilter};
