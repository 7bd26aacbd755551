//! # Ledger entries
//!
//! A [`Transaction`] is the immutable record of one balance-affecting (or
//! balance-pending) event. Its `status` follows the provider lifecycle:
//!
//! ```text
//!   created → waiting → confirming → confirmed → sending → finished → refunded
//!                │            │           │          │
//!                ├──── partially_paid ────┴──────────┤
//!                ▼                                    ▼
//!             failed / expired                  (terminal)
//! ```
//!
//! Terminal states (`finished`, `failed`, `expired`, `refunded`) carry their
//! balance side effect exactly once; see `tallymart-ledger`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, CheckoutId, TransactionId};

/// Lifecycle status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
}

impl PaymentStatus {
    pub const ALL: [Self; 10] = [
        Self::Created,
        Self::Waiting,
        Self::Confirming,
        Self::Confirmed,
        Self::Sending,
        Self::PartiallyPaid,
        Self::Finished,
        Self::Failed,
        Self::Refunded,
        Self::Expired,
    ];

    /// Wire name used by the provider and the caller envelope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Waiting => "waiting",
            Self::Confirming => "confirming",
            Self::Confirmed => "confirmed",
            Self::Sending => "sending",
            Self::PartiallyPaid => "partially_paid",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Expired => "expired",
        }
    }

    /// After a terminal status no further balance effect occurs, except an
    /// explicit refund following `finished`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::Expired | Self::Refunded
        )
    }

    /// Still waiting on the provider (counted as "active" in statistics).
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Waiting | Self::Confirming | Self::Confirmed | Self::Sending | Self::PartiallyPaid
        )
    }

    /// Whether an entry currently in `self` may still take `target`.
    ///
    /// - non-terminal → any terminal
    /// - `failed`/`expired` → `finished`/`refunded` (late settlement)
    /// - `finished` → `refunded`
    /// - `refunded` → nothing
    #[must_use]
    pub fn accepts_terminal(&self, target: Self) -> bool {
        if !target.is_terminal() {
            return false;
        }
        match self {
            Self::Refunded => false,
            Self::Finished => target == Self::Refunded,
            Self::Failed | Self::Expired => matches!(target, Self::Finished | Self::Refunded),
            _ => true,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A provider-reported status: either one we model, or a raw string we
/// log and otherwise ignore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedStatus {
    Known(PaymentStatus),
    Unknown(String),
}

impl ReportedStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .to_ascii_lowercase()
            .parse::<PaymentStatus>()
            .map_or_else(|_| Self::Unknown(raw.to_string()), Self::Known)
    }
}

impl fmt::Display for ReportedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(status) => write!(f, "{status}"),
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// What kind of balance event a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Deposit funded through the crypto payment provider.
    CryptoPayment,
    /// Manual credit by an admin.
    AdminDeposit,
    /// Manual debit by an admin.
    AdminDeduction,
    /// Debit initiated by the system (checkout purchase, service charge).
    SystemDeduction,
    /// Seller proceeds credited by a checkout settlement.
    SaleCredit,
}

impl TransactionKind {
    /// Credit kinds increase the balance when they finish.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::CryptoPayment | Self::AdminDeposit | Self::SaleCredit)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CryptoPayment => "crypto_payment",
            Self::AdminDeposit => "admin_deposit",
            Self::AdminDeduction => "admin_deduction",
            Self::SystemDeduction => "system_deduction",
            Self::SaleCredit => "sale_credit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an admin balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustDirection {
    Deposit,
    Deduction,
}

impl AdjustDirection {
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Deposit => TransactionKind::AdminDeposit,
            Self::Deduction => TransactionKind::AdminDeduction,
        }
    }
}

/// Fields that describe a new ledger entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub price_amount: Decimal,
    pub price_currency: String,
    pub pay_currency: Option<String>,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub note: Option<String>,
    pub acting_admin: Option<AccountId>,
    pub checkout_id: Option<CheckoutId>,
}

impl NewTransaction {
    /// A `created` entry of `kind` for `amount` in the default currency.
    #[must_use]
    pub fn new(account_id: AccountId, kind: TransactionKind, amount: Decimal) -> Self {
        Self {
            account_id,
            kind,
            price_amount: amount,
            price_currency: crate::constants::DEFAULT_PRICE_CURRENCY.to_string(),
            pay_currency: None,
            status: PaymentStatus::Created,
            description: None,
            note: None,
            acting_admin: None,
            checkout_id: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Identifiers and deposit instructions the provider assigns to a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPaymentHandle {
    pub payment_id: String,
    pub purchase_id: Option<String>,
    pub pay_address: Option<String>,
    pub pay_amount: Option<Decimal>,
    pub pay_currency: Option<String>,
    pub price_amount: Option<Decimal>,
    pub network: Option<String>,
    /// Echo of the order reference we sent (our transaction id).
    pub order_id: Option<String>,
}

/// Informational fields reconciliation overwrites on every webhook.
///
/// `status` may only carry a non-terminal status; terminal statuses go
/// through `apply_terminal`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportedUpdate {
    pub status: Option<PaymentStatus>,
    pub actually_paid: Option<Decimal>,
    pub amount_received: Option<Decimal>,
    pub remaining_amount: Option<Decimal>,
    pub is_partial_payment: Option<bool>,
    pub payin_hash: Option<String>,
    pub payout_hash: Option<String>,
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub status: PaymentStatus,

    /// Provider-assigned payment id; unique when present.
    pub provider_payment_id: Option<String>,
    pub purchase_id: Option<String>,

    /// Requested amount in `price_currency`.
    pub price_amount: Decimal,
    pub price_currency: String,
    pub pay_amount: Option<Decimal>,
    pub pay_currency: Option<String>,
    pub pay_address: Option<String>,
    pub network: Option<String>,

    /// Provider-reported fiat-equivalent paid so far.
    pub actually_paid: Decimal,
    pub amount_received: Decimal,
    pub remaining_amount: Decimal,
    pub is_partial_payment: bool,
    pub payin_hash: Option<String>,
    pub payout_hash: Option<String>,

    /// Net amount this entry has moved the account balance by.
    pub balance_effect: Decimal,

    pub description: Option<String>,
    pub note: Option<String>,
    pub acting_admin: Option<AccountId>,
    pub checkout_id: Option<CheckoutId>,
    pub callback_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Materialize a new entry with a fresh id.
    #[must_use]
    pub fn from_new(draft: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::new(),
            account_id: draft.account_id,
            kind: draft.kind,
            status: draft.status,
            provider_payment_id: None,
            purchase_id: None,
            remaining_amount: draft.price_amount,
            price_amount: draft.price_amount,
            price_currency: draft.price_currency,
            pay_amount: None,
            pay_currency: draft.pay_currency,
            pay_address: None,
            network: None,
            actually_paid: Decimal::ZERO,
            amount_received: Decimal::ZERO,
            is_partial_payment: false,
            payin_hash: None,
            payout_hash: None,
            balance_effect: Decimal::ZERO,
            description: draft.description,
            note: draft.note,
            acting_admin: draft.acting_admin,
            checkout_id: draft.checkout_id,
            callback_url: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }
}
