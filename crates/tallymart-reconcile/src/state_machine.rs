//! The reconciliation decision table.
//!
//! ```text
//!   created ─▶ waiting ─▶ confirming ─▶ confirmed ─▶ sending ─▶ FINISHED ─▶ REFUNDED
//!                 │            │             │           │
//!                 ├────────────┴─────────────┴───────────┴──▶ FAILED / EXPIRED
//!                 └──▶ partially_paid ──▶ FINISHED / EXPIRED
//! ```
//!
//! Non-terminal statuses overwrite each other in any order. Terminal
//! statuses and their balance effects go through the ledger's
//! `apply_terminal`, which is idempotent on its own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_types::{PaymentStatus, ReportedStatus, ReportedUpdate};

/// Amounts taken from the event and the stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportedAmounts {
    /// `actually_paid` from the event.
    pub actually_paid: Option<Decimal>,
    /// `price_amount` from the event.
    pub reported_price: Option<Decimal>,
    /// The entry's requested price.
    pub stored_price: Decimal,
}

impl ReportedAmounts {
    fn paid(&self) -> Decimal {
        self.actually_paid.unwrap_or(Decimal::ZERO)
    }

    /// Credit for `finished`: the paid amount, or the price when nothing
    /// (or zero) was reported.
    fn finished_credit(&self) -> Decimal {
        match self.actually_paid {
            Some(paid) if paid > Decimal::ZERO => paid,
            _ => self.reported_price.unwrap_or(self.stored_price),
        }
    }
}

/// What one event does to one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Effect {
    /// Already settled for this status; acknowledge, change nothing.
    Duplicate,
    /// Status we do not model; log and change nothing.
    Ignore { raw: String },
    /// Overwrite reported fields and the pending status.
    Progress,
    /// Overwrite reported fields, then apply the terminal status.
    Terminal { status: PaymentStatus, amount: Decimal },
}

/// Output of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub effect: Effect,
    /// Reported fields to write; empty for `Duplicate` and `Ignore`.
    pub update: ReportedUpdate,
}

impl Decision {
    fn inert(effect: Effect) -> Self {
        Self {
            effect,
            update: ReportedUpdate::default(),
        }
    }
}

/// `(current, incoming, amounts) → (fields to write, effect)`.
#[must_use]
pub fn decide(current: PaymentStatus, incoming: &ReportedStatus, amounts: &ReportedAmounts) -> Decision {
    let incoming = match incoming {
        ReportedStatus::Known(status) => *status,
        ReportedStatus::Unknown(raw) => return Decision::inert(Effect::Ignore { raw: raw.clone() }),
    };

    match current {
        PaymentStatus::Finished if incoming != PaymentStatus::Refunded => {
            return Decision::inert(Effect::Duplicate);
        }
        PaymentStatus::Refunded => return Decision::inert(Effect::Duplicate),
        _ => {}
    }

    let paid = amounts.paid();
    let remaining = (amounts.stored_price - paid).max(Decimal::ZERO);
    let mut update = ReportedUpdate {
        actually_paid: Some(paid),
        remaining_amount: Some(remaining),
        is_partial_payment: Some(remaining > Decimal::ZERO && paid > Decimal::ZERO),
        ..ReportedUpdate::default()
    };

    let effect = match incoming {
        PaymentStatus::Created | PaymentStatus::Waiting => {
            update.status = Some(incoming);
            Effect::Progress
        }
        PaymentStatus::Confirming | PaymentStatus::Confirmed | PaymentStatus::Sending => {
            update.status = Some(incoming);
            update.amount_received = Some(paid);
            Effect::Progress
        }
        PaymentStatus::PartiallyPaid => {
            update.status = Some(incoming);
            update.amount_received = Some(paid);
            update.is_partial_payment = Some(true);
            Effect::Progress
        }
        PaymentStatus::Finished => {
            update.amount_received = Some(paid);
            Effect::Terminal {
                status: incoming,
                amount: amounts.finished_credit(),
            }
        }
        PaymentStatus::Failed | PaymentStatus::Expired => {
            update.amount_received = Some(Decimal::ZERO);
            Effect::Terminal {
                status: incoming,
                amount: Decimal::ZERO,
            }
        }
        PaymentStatus::Refunded => {
            update.amount_received = Some(Decimal::ZERO);
            Effect::Terminal {
                status: incoming,
                amount: paid.max(Decimal::ZERO),
            }
        }
    };

    Decision { effect, update }
}
