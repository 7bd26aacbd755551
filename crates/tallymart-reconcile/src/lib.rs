//! # tallymart-reconcile
//!
//! **Reconciliation Engine**: maps provider payment events onto ledger
//! entries.
//!
//! Each event is located by its order reference (our transaction id), run
//! through [`state_machine::decide`], and then either ignored, acknowledged
//! as a duplicate, written as reported progress, or settled through the
//! ledger's `apply_terminal`. Balance effects happen at most once per
//! accepted terminal transition.

pub mod engine;
pub mod state_machine;

pub use engine::{ReconcileOutcome, ReconciliationEngine};
pub use state_machine::{decide, Decision, Effect, ReportedAmounts};
