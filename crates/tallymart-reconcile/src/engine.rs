//! Applies normalized provider events to ledger entries.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_gateway::{parse_webhook_event, WebhookEvent};
use tallymart_ledger::LedgerStore;
use tallymart_types::{PaymentStatus, Result, TallymartError, Transaction, TransactionId};
use tracing::{debug, info, warn};

use crate::state_machine::{decide, Effect, ReportedAmounts};

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Reported fields and pending status written; no balance effect.
    Updated { transaction: Transaction },
    /// A terminal status was applied. `credited` is zero for failed/expired.
    Settled {
        transaction: Transaction,
        credited: Decimal,
        balance: Decimal,
    },
    /// Re-delivery of an already-applied status.
    Duplicate { transaction_id: TransactionId },
    /// Unmodelled status; nothing written.
    Ignored { status: String },
}

impl ReconcileOutcome {
    /// Status string echoed back to the provider.
    #[must_use]
    pub fn reported_status(&self) -> String {
        match self {
            Self::Updated { transaction } | Self::Settled { transaction, .. } => {
                transaction.status.to_string()
            }
            Self::Duplicate { .. } => "duplicate".to_string(),
            Self::Ignored { status } => status.clone(),
        }
    }
}

/// Reconciliation engine over a shared ledger.
#[derive(Clone)]
pub struct ReconciliationEngine {
    ledger: Arc<LedgerStore>,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Parse a raw callback body and handle it.
    pub fn handle_webhook(&self, payload: &[u8]) -> Result<ReconcileOutcome> {
        let event = parse_webhook_event(payload).inspect_err(|e| {
            warn!(error = %e, "rejecting malformed webhook");
        })?;
        self.handle_event(&event)
    }

    /// Look up the entry an event refers to.
    ///
    /// The order reference is our transaction id; the provider payment id
    /// is accepted as a fallback.
    fn locate(&self, event: &WebhookEvent) -> Result<Transaction> {
        let by_ref = event
            .provider_transaction_ref
            .parse::<TransactionId>()
            .ok()
            .and_then(|id| self.ledger.transaction(id).ok());
        by_ref
            .or_else(|| {
                event
                    .payment_id
                    .as_deref()
                    .and_then(|pid| self.ledger.transaction_by_payment_id(pid))
            })
            .ok_or_else(|| {
                warn!(order = %event.provider_transaction_ref, "webhook for unknown transaction");
                TallymartError::TransactionNotFound(event.provider_transaction_ref.clone())
            })
    }

    /// Apply one normalized event.
    pub fn handle_event(&self, event: &WebhookEvent) -> Result<ReconcileOutcome> {
        let current = self.locate(event)?;
        let amounts = ReportedAmounts {
            actually_paid: event.amount_paid,
            reported_price: event.price_amount,
            stored_price: current.price_amount,
        };
        let decision = decide(current.status, &event.reported_status, &amounts);

        match decision.effect {
            Effect::Ignore { raw } => {
                warn!(tx = %current.id, status = %raw, "unknown payment status ignored");
                Ok(ReconcileOutcome::Ignored { status: raw })
            }
            Effect::Duplicate => {
                info!(tx = %current.id, current = %current.status, incoming = %event.reported_status, "duplicate delivery acknowledged");
                Ok(ReconcileOutcome::Duplicate {
                    transaction_id: current.id,
                })
            }
            Effect::Progress => {
                let mut update = decision.update;
                update.payin_hash.clone_from(&event.payin_hash);
                update.payout_hash.clone_from(&event.payout_hash);
                match self.ledger.update_reported(current.id, update) {
                    Ok(transaction) => {
                        if transaction.is_partial_payment {
                            info!(
                                tx = %transaction.id,
                                paid = %transaction.actually_paid,
                                price = %transaction.price_amount,
                                remaining = %transaction.remaining_amount,
                                "partial payment received"
                            );
                        } else {
                            debug!(tx = %transaction.id, status = %transaction.status, "payment progressed");
                        }
                        Ok(ReconcileOutcome::Updated { transaction })
                    }
                    // Settled concurrently since `locate`.
                    Err(TallymartError::InvalidTransition { id, reason }) => {
                        info!(tx = %id, %reason, "late pending event after settlement");
                        Ok(ReconcileOutcome::Duplicate { transaction_id: id })
                    }
                    Err(e) => Err(e),
                }
            }
            Effect::Terminal { status, amount } => {
                let mut update = decision.update;
                update.payin_hash.clone_from(&event.payin_hash);
                update.payout_hash.clone_from(&event.payout_hash);
                self.ledger.update_reported(current.id, update)?;

                let applied = self.ledger.apply_terminal(current.id, status, amount)?;
                if !applied.applied {
                    info!(tx = %current.id, %status, "terminal status already applied");
                    return Ok(ReconcileOutcome::Duplicate {
                        transaction_id: current.id,
                    });
                }
                let credited = if matches!(status, PaymentStatus::Finished | PaymentStatus::Refunded) {
                    amount
                } else {
                    Decimal::ZERO
                };
                info!(
                    tx = %current.id,
                    account = %applied.account.id,
                    %status,
                    %credited,
                    balance = %applied.account.balance,
                    "payment settled"
                );
                Ok(ReconcileOutcome::Settled {
                    transaction: applied.transaction,
                    credited,
                    balance: applied.account.balance,
                })
            }
        }
    }
}
