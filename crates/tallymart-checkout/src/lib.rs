//! # tallymart-checkout
//!
//! **Inventory Checkout Engine**: sells license listings by count.
//!
//! ## Flow
//!
//! 1. [`InventoryStore::claim_matching`] moves the first `quantity` matching
//!    listings `Available → Reserved` in one write section
//! 2. Unit prices come from the [`PriceCatalog`]
//! 3. The buyer is debited through the ledger (`system_deduction`)
//! 4. Listings become `Sold`; each seller gets one `sale_credit`
//! 5. A JSON report goes to the [`ExportSink`] (best effort)
//!
//! Failures before step 3 release the claim. Failures after it are
//! reported on the receipt and never unwind the sale.

pub mod catalog;
pub mod engine;
pub mod export;
pub mod inventory;

pub use catalog::PriceCatalog;
pub use engine::{CheckoutEngine, CheckoutReceipt, SellerCredit};
pub use export::{ExportArtifact, ExportDocument, ExportSink, FsExportSink};
pub use inventory::{ImportReport, InventoryStore, RejectedRow};
