//! Error types for the Tallymart core.
//!
//! All errors use the `TM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors
//! - 2xx: Not-found errors
//! - 3xx: Balance / inventory business rules
//! - 4xx: Payment gateway and webhook errors
//! - 5xx: Ledger / persistence errors
//! - 9xx: Configuration, export and internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AccountId, ListingId, PaymentStatus, TransactionId};

/// Central error enum for all Tallymart operations.
#[derive(Debug, Error)]
pub enum TallymartError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Malformed or missing caller input.
    #[error("TM_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// An amount that must be strictly positive was not.
    #[error("TM_ERR_101: Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// A username is already registered.
    #[error("TM_ERR_102: Username already taken: {0}")]
    DuplicateUsername(String),

    /// A configuration key already exists.
    #[error("TM_ERR_103: Configuration key already exists: {0}")]
    DuplicateConfigKey(String),

    // =================================================================
    // Not-Found Errors (2xx)
    // =================================================================
    /// No account with this id.
    #[error("TM_ERR_200: Account not found: {0}")]
    AccountNotFound(AccountId),

    /// No account with this username (checkout buyer, payment creator).
    #[error("TM_ERR_201: Buyer not found: {0}")]
    BuyerNotFound(String),

    /// No ledger entry with this id or provider reference.
    #[error("TM_ERR_202: Transaction not found: {0}")]
    TransactionNotFound(String),

    /// No listing with this id.
    #[error("TM_ERR_203: Listing not found: {0}")]
    ListingNotFound(ListingId),

    /// A listing points at a price entry that does not exist.
    #[error("TM_ERR_204: Price reference not found: {0}")]
    PriceNotFound(String),

    /// No configuration entry for this key.
    #[error("TM_ERR_205: Configuration key not found: {0}")]
    ConfigKeyNotFound(String),

    // =================================================================
    // Balance / Inventory Errors (3xx)
    // =================================================================
    /// Not enough balance to perform the operation.
    #[error("TM_ERR_300: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// Fewer matching listings are available than requested.
    #[error("TM_ERR_301: Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: usize, available: usize },

    /// The account is deactivated.
    #[error("TM_ERR_302: Account inactive: {0}")]
    AccountInactive(AccountId),

    // =================================================================
    // Gateway / Webhook Errors (4xx)
    // =================================================================
    /// The payment provider could not be reached or answered non-2xx.
    #[error("TM_ERR_400: Payment gateway unavailable: {reason}")]
    GatewayUnavailable { reason: String },

    /// A webhook payload could not be normalized.
    #[error("TM_ERR_401: Malformed webhook event: {reason}")]
    MalformedEvent { reason: String },

    /// A terminal status was delivered again; acknowledged, nothing applied.
    #[error("TM_ERR_402: Duplicate event for transaction {0}")]
    DuplicateEvent(TransactionId),

    // =================================================================
    // Ledger / Persistence Errors (5xx)
    // =================================================================
    /// Concurrent writers contended for the same records.
    #[error("TM_ERR_500: Persistence conflict: {reason}")]
    PersistenceConflict { reason: String },

    /// `apply_terminal` was asked to apply a non-terminal status.
    #[error("TM_ERR_501: Status {0} is not terminal")]
    NotTerminal(PaymentStatus),

    /// A ledger entry of this kind cannot take that terminal status.
    #[error("TM_ERR_502: Invalid transition for transaction {id}: {reason}")]
    InvalidTransition { id: TransactionId, reason: String },

    /// A provider payment id is already attached to another entry.
    #[error("TM_ERR_503: Provider payment id already recorded: {0}")]
    DuplicatePaymentId(String),

    /// Materialized balance disagrees with the ledger fold.
    #[error("TM_ERR_504: Balance invariant violation: {reason}")]
    BalanceInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TM_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("TM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Writing the checkout export artifact failed.
    #[error("TM_ERR_903: Export failed: {0}")]
    Export(String),

    /// I/O error (disk, network).
    #[error("TM_ERR_904: I/O error: {0}")]
    Io(String),
}

impl TallymartError {
    /// Shorthand for a [`TallymartError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// HTTP-equivalent status code for the caller envelope.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::NonPositiveAmount(_)
            | Self::InsufficientBalance { .. }
            | Self::InsufficientInventory { .. }
            | Self::MalformedEvent { .. }
            | Self::NotTerminal(_)
            | Self::InvalidTransition { .. } => 400,
            Self::AccountInactive(_) => 403,
            Self::AccountNotFound(_)
            | Self::BuyerNotFound(_)
            | Self::TransactionNotFound(_)
            | Self::ListingNotFound(_)
            | Self::PriceNotFound(_)
            | Self::ConfigKeyNotFound(_) => 404,
            Self::DuplicateUsername(_)
            | Self::DuplicateConfigKey(_)
            | Self::DuplicatePaymentId(_)
            | Self::PersistenceConflict { .. } => 409,
            Self::DuplicateEvent(_) => 200,
            Self::GatewayUnavailable { .. } => 502,
            Self::BalanceInvariantViolation { .. }
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Export(_)
            | Self::Io(_) => 500,
        }
    }

    /// Whether a caller may retry the same request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GatewayUnavailable { .. } | Self::PersistenceConflict { .. }
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TallymartError>;

impl From<std::io::Error> for TallymartError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TallymartError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
