//! Checkout by count: claim, price, debit, mark sold, split to sellers,
//! export.
//!
//! The claim is the atomic step. Everything that can fail before the buyer
//! debit releases the claim; nothing after the debit unwinds it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_ledger::LedgerStore;
use tallymart_types::{
    constants, AccountId, CheckoutId, Listing, ListingFilter, ListingId, NewTransaction, Result,
    TallymartError, TransactionId, TransactionKind,
};
use tracing::{error, info, warn};

use crate::export::{export_filename, ExportArtifact, ExportDocument, ExportMetadata, ExportSink};
use crate::InventoryStore;

/// One seller's share of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerCredit {
    pub seller_id: AccountId,
    pub amount: Decimal,
    /// `None` if the credit could not be applied.
    pub transaction_id: Option<TransactionId>,
}

/// Result of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub checkout_id: CheckoutId,
    pub buyer_id: AccountId,
    pub listing_ids: Vec<ListingId>,
    pub total_cost: Decimal,
    pub buyer_balance: Decimal,
    pub debit_transaction_id: TransactionId,
    pub seller_credits: Vec<SellerCredit>,
    /// Present when the export was written.
    pub export: Option<ExportArtifact>,
    /// Present when the export failed; the sale still stands.
    pub export_error: Option<String>,
}

pub struct CheckoutEngine {
    ledger: Arc<LedgerStore>,
    inventory: Arc<InventoryStore>,
    sink: Arc<dyn ExportSink>,
}

impl CheckoutEngine {
    pub fn new(ledger: Arc<LedgerStore>, inventory: Arc<InventoryStore>, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            ledger,
            inventory,
            sink,
        }
    }

    fn claim_with_retry(
        &self,
        filter: &ListingFilter,
        quantity: usize,
        checkout_id: CheckoutId,
    ) -> Result<Vec<Listing>> {
        let mut attempt = 0;
        loop {
            match self.inventory.claim_matching(filter, quantity, checkout_id) {
                Err(TallymartError::PersistenceConflict { reason })
                    if attempt < constants::MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    warn!(checkout = %checkout_id, attempt, %reason, "claim contended, retrying");
                    std::thread::yield_now();
                }
                other => return other,
            }
        }
    }

    /// Resolve unit prices for claimed listings.
    fn price_claim(&self, claimed: Vec<Listing>) -> Result<Vec<(Listing, Decimal)>> {
        claimed
            .into_iter()
            .map(|listing| {
                let price = self.inventory.catalog().price(listing.price_ref)?;
                Ok((listing, price.unit_price))
            })
            .collect()
    }

    /// Buy `quantity` available listings matching `filter` for `buyer_username`.
    pub fn checkout(
        &self,
        buyer_username: &str,
        quantity: usize,
        filter: &ListingFilter,
    ) -> Result<CheckoutReceipt> {
        if quantity == 0 || quantity > constants::MAX_CHECKOUT_QUANTITY {
            return Err(TallymartError::validation(format!(
                "quantity must be between 1 and {}",
                constants::MAX_CHECKOUT_QUANTITY
            )));
        }
        if buyer_username.trim().is_empty() {
            return Err(TallymartError::validation("username is required"));
        }
        let buyer = self
            .ledger
            .find_by_username(buyer_username)
            .ok_or_else(|| TallymartError::BuyerNotFound(buyer_username.to_string()))?;
        if !buyer.is_active {
            return Err(TallymartError::AccountInactive(buyer.id));
        }

        let checkout_id = CheckoutId::new();
        let claimed = self.claim_with_retry(filter, quantity, checkout_id)?;
        let ids: Vec<ListingId> = claimed.iter().map(|l| l.id).collect();

        let priced = match self.price_claim(claimed) {
            Ok(priced) => priced,
            Err(e) => {
                self.inventory.release(checkout_id, &ids);
                return Err(e);
            }
        };
        let total_cost: Decimal = priced.iter().map(|(_, price)| *price).sum();

        let available = match self.ledger.account(buyer.id) {
            Ok(account) => account.balance,
            Err(e) => {
                self.inventory.release(checkout_id, &ids);
                return Err(e);
            }
        };
        if available < total_cost {
            self.inventory.release(checkout_id, &ids);
            info!(checkout = %checkout_id, buyer = %buyer.id, %total_cost, %available, "checkout rejected: insufficient balance");
            return Err(TallymartError::InsufficientBalance {
                needed: total_cost,
                available,
            });
        }

        let debit = NewTransaction {
            checkout_id: Some(checkout_id),
            ..NewTransaction::new(buyer.id, TransactionKind::SystemDeduction, total_cost)
                .with_description(format!("License purchase: {quantity} item(s)"))
        };
        let debited = match self.ledger.settle_instant(debit) {
            Ok(applied) => applied,
            Err(e) => {
                self.inventory.release(checkout_id, &ids);
                return Err(e);
            }
        };

        // Committed from here on.
        let sold_at = Utc::now();
        let sold = self.inventory.finalize_sold(checkout_id, &ids, buyer.id, sold_at);
        let seller_credits = self.credit_sellers(checkout_id, &priced);
        info!(
            checkout = %checkout_id,
            buyer = %buyer.id,
            items = sold.len(),
            %total_cost,
            sellers = seller_credits.len(),
            "checkout settled"
        );

        let sold_priced: Vec<(Listing, Decimal)> = sold
            .into_iter()
            .filter_map(|listing| {
                priced
                    .iter()
                    .find(|(l, _)| l.id == listing.id)
                    .map(|(_, price)| (listing, *price))
            })
            .collect();
        let (export, export_error) = match self.export(&buyer.username, checkout_id, total_cost, filter, &sold_priced) {
            Ok(artifact) => (Some(artifact), None),
            Err(e) => {
                warn!(checkout = %checkout_id, error = %e, "export failed; sale stands");
                (None, Some(e.to_string()))
            }
        };

        Ok(CheckoutReceipt {
            checkout_id,
            buyer_id: buyer.id,
            listing_ids: ids,
            total_cost,
            buyer_balance: debited.account.balance,
            debit_transaction_id: debited.transaction.id,
            seller_credits,
            export,
            export_error,
        })
    }

    /// One `sale_credit` entry per distinct seller.
    fn credit_sellers(&self, checkout_id: CheckoutId, priced: &[(Listing, Decimal)]) -> Vec<SellerCredit> {
        let mut totals: BTreeMap<AccountId, Decimal> = BTreeMap::new();
        for (listing, price) in priced {
            *totals.entry(listing.seller_id).or_insert(Decimal::ZERO) += *price;
        }

        totals
            .into_iter()
            .map(|(seller_id, amount)| {
                let credit = NewTransaction {
                    checkout_id: Some(checkout_id),
                    ..NewTransaction::new(seller_id, TransactionKind::SaleCredit, amount)
                        .with_description("License sale proceeds")
                };
                let transaction_id = match self.ledger.settle_instant(credit) {
                    Ok(applied) => Some(applied.transaction.id),
                    Err(e) => {
                        error!(checkout = %checkout_id, seller = %seller_id, %amount, error = %e, "seller credit failed");
                        None
                    }
                };
                SellerCredit {
                    seller_id,
                    amount,
                    transaction_id,
                }
            })
            .collect()
    }

    fn export(
        &self,
        username: &str,
        checkout_id: CheckoutId,
        total_cost: Decimal,
        filter: &ListingFilter,
        sold: &[(Listing, Decimal)],
    ) -> Result<ExportArtifact> {
        let now = Utc::now();
        let document = ExportDocument::build(
            ExportMetadata {
                checkout_id,
                purchased_by: username.to_string(),
                total_cost,
                transaction_date: now,
                filters_applied: filter.describe(),
                item_count: sold.len(),
            },
            sold,
        );
        let bytes = document.to_bytes()?;
        self.sink
            .write(&export_filename(username, checkout_id, now), &bytes)
    }
}
