//! # tallymart-types
//!
//! Shared types, errors, and configuration for the **Tallymart** license
//! marketplace core.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`TransactionId`], [`ListingId`], [`PriceRefId`], [`CheckoutId`]
//! - **Accounts**: [`Account`], [`AccountRole`]
//! - **Ledger entries**: [`Transaction`], [`TransactionKind`], [`PaymentStatus`], [`ReportedStatus`]
//! - **Inventory**: [`Listing`], [`ListingStatus`], [`ListingFilter`], [`PriceRef`]
//! - **Configuration**: [`ServiceConfig`], [`GatewayConfig`], [`CheckoutConfig`]
//! - **Caller envelope**: [`ApiResponse`], [`Page`]
//! - **Errors**: [`TallymartError`] with `TM_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod config;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod listing;
pub mod transaction;

pub use account::*;
pub use config::*;
pub use envelope::*;
pub use error::*;
pub use ids::*;
pub use listing::*;
pub use transaction::*;

// Constants are accessed via `tallymart_types::constants::FOO`
// (not re-exported to avoid name collisions).
