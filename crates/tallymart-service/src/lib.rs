//! # tallymart-service
//!
//! The caller-facing surface of the Tallymart core. [`Tallymart`] wires the
//! ledger, payment gateway, reconciliation engine and checkout engine
//! together and exposes each operation as a method returning an
//! [`ApiResponse`](tallymart_types::ApiResponse) envelope.
//!
//! Also here:
//! - [`ConfigStore`]: typed runtime settings editable by admins
//! - [`dashboard_stats`]: balance and inventory aggregates
//! - [`load_config`] and [`telemetry::init`] for process start-up
//!
//! HTTP routing is left to the embedding binary.

pub mod config;
pub mod config_store;
pub mod dashboard;
pub mod service;
pub mod telemetry;

pub use config::load_config;
pub use config_store::{ConfigEntry, ConfigStore, ConfigValueType};
pub use dashboard::{dashboard_stats, ClientBalance, DashboardStats};
pub use service::{
    AccountTransactions, BalanceCheck, CreatePayment, PaymentCreated, PaymentStatusView, Tallymart,
    TransactionViews, WebhookAck,
};
