//! Inventory store for license listings.
//!
//! Every status change happens inside one write section. A checkout claims
//! listings by moving them `Available → Reserved` in the same section that
//! selects them, so two checkouts can never hold the same listing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tallymart_types::{
    constants, AccountId, CheckoutId, Listing, ListingFilter, ListingId, ListingStatus,
    NewListing, Page, Result, TallymartError,
};
use tracing::{debug, error, info};

use crate::PriceCatalog;

/// Per-row outcome of [`InventoryStore::import_listings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    /// 1-based position in the submitted batch.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub accepted: usize,
    pub listing_ids: Vec<ListingId>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Default)]
struct Shelf {
    listings: HashMap<ListingId, Listing>,
    license_keys: HashSet<String>,
}

/// Listings plus their price catalogue.
pub struct InventoryStore {
    shelf: RwLock<Shelf>,
    catalog: Arc<PriceCatalog>,
    claim_timeout: Duration,
}

impl InventoryStore {
    #[must_use]
    pub fn new(catalog: Arc<PriceCatalog>) -> Self {
        Self::with_claim_timeout(
            catalog,
            Duration::from_millis(constants::DEFAULT_CLAIM_TIMEOUT_MS),
        )
    }

    #[must_use]
    pub fn with_claim_timeout(catalog: Arc<PriceCatalog>, claim_timeout: Duration) -> Self {
        Self {
            shelf: RwLock::new(Shelf::default()),
            catalog,
            claim_timeout,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<PriceCatalog> {
        &self.catalog
    }

    fn write_section(&self, what: &str) -> Result<RwLockWriteGuard<'_, Shelf>> {
        self.shelf
            .try_write_for(self.claim_timeout)
            .ok_or_else(|| TallymartError::PersistenceConflict {
                reason: format!("{what}: inventory busy for {:?}", self.claim_timeout),
            })
    }

    // =================================================================
    // Creation
    // =================================================================

    fn build(&self, seller_id: AccountId, new: NewListing, now: DateTime<Utc>) -> Result<Listing> {
        new.validate()?;
        let price = self.catalog.price_for_category(&new.category)?;
        Ok(Listing {
            id: ListingId::new(),
            seller_id,
            price_ref: price.id,
            category: price.category,
            title: new.title.trim().to_string(),
            edition: new.edition.filter(|e| !e.trim().is_empty()),
            region: new.region.trim().to_string(),
            license_key: new.license_key.trim().to_string(),
            description: new.description.filter(|d| !d.trim().is_empty()),
            status: ListingStatus::Available,
            buyer_id: None,
            purchased_at: None,
            reserved_by: None,
            created_at: now,
        })
    }

    fn shelve(shelf: &mut Shelf, listing: Listing) -> Result<()> {
        if !shelf.license_keys.insert(listing.license_key.clone()) {
            return Err(TallymartError::validation("license key already listed"));
        }
        shelf.listings.insert(listing.id, listing);
        Ok(())
    }

    pub fn create_listing(&self, seller_id: AccountId, new: NewListing) -> Result<Listing> {
        let listing = self.build(seller_id, new, Utc::now())?;
        let mut shelf = self.write_section("create listing")?;
        Self::shelve(&mut shelf, listing.clone())?;
        info!(listing = %listing.id, seller = %seller_id, category = %listing.category, "listing created");
        Ok(listing)
    }

    /// Validate and add a batch. Bad rows are reported, good rows kept.
    pub fn import_listings(&self, seller_id: AccountId, rows: Vec<NewListing>) -> Result<ImportReport> {
        let now = Utc::now();
        let mut report = ImportReport::default();
        let mut shelf = self.write_section("import listings")?;

        for (index, row) in rows.into_iter().enumerate() {
            let outcome = self
                .build(seller_id, row, now)
                .and_then(|listing| {
                    let id = listing.id;
                    Self::shelve(&mut shelf, listing).map(|()| id)
                });
            match outcome {
                Ok(id) => {
                    report.accepted += 1;
                    report.listing_ids.push(id);
                }
                Err(e) => report.rejected.push(RejectedRow {
                    row: index + 1,
                    reason: e.to_string(),
                }),
            }
        }
        info!(
            seller = %seller_id,
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "listings imported"
        );
        Ok(report)
    }

    // =================================================================
    // Checkout claims
    // =================================================================

    /// Atomically reserve the first `quantity` available listings matching
    /// `filter`, in `(created_at, id)` order.
    ///
    /// Fails with `InsufficientInventory` and changes nothing when fewer
    /// match; fails with `PersistenceConflict` when the write section is not
    /// acquired within the claim timeout.
    pub fn claim_matching(
        &self,
        filter: &ListingFilter,
        quantity: usize,
        checkout_id: CheckoutId,
    ) -> Result<Vec<Listing>> {
        let mut shelf = self.write_section("claim")?;

        let mut candidates: Vec<(DateTime<Utc>, ListingId)> = shelf
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Available && filter.matches(l))
            .map(Listing::sort_key)
            .collect();
        if candidates.len() < quantity {
            return Err(TallymartError::InsufficientInventory {
                requested: quantity,
                available: candidates.len(),
            });
        }
        candidates.sort_unstable();

        let mut claimed = Vec::with_capacity(quantity);
        for (_, id) in candidates.into_iter().take(quantity) {
            if let Some(listing) = shelf.listings.get_mut(&id) {
                listing.status = ListingStatus::Reserved;
                listing.reserved_by = Some(checkout_id);
                claimed.push(listing.clone());
            }
        }
        debug!(checkout = %checkout_id, count = claimed.len(), "listings reserved");
        Ok(claimed)
    }

    /// `Reserved → Sold` for listings held by `checkout_id`.
    ///
    /// Runs after the buyer has been debited, so it waits for the write
    /// section instead of timing out.
    pub fn finalize_sold(
        &self,
        checkout_id: CheckoutId,
        ids: &[ListingId],
        buyer_id: AccountId,
        at: DateTime<Utc>,
    ) -> Vec<Listing> {
        let mut shelf = self.shelf.write();
        let mut sold = Vec::with_capacity(ids.len());
        for id in ids {
            match shelf.listings.get_mut(id) {
                Some(l) if l.status == ListingStatus::Reserved && l.reserved_by == Some(checkout_id) => {
                    l.status = ListingStatus::Sold;
                    l.buyer_id = Some(buyer_id);
                    l.purchased_at = Some(at);
                    l.reserved_by = None;
                    sold.push(l.clone());
                }
                _ => error!(checkout = %checkout_id, listing = %id, "reserved listing lost before sale"),
            }
        }
        sold
    }

    /// `Reserved → Available` for listings held by `checkout_id`.
    pub fn release(&self, checkout_id: CheckoutId, ids: &[ListingId]) -> usize {
        let mut shelf = self.shelf.write();
        let mut released = 0;
        for id in ids {
            if let Some(l) = shelf.listings.get_mut(id) {
                if l.status == ListingStatus::Reserved && l.reserved_by == Some(checkout_id) {
                    l.status = ListingStatus::Available;
                    l.reserved_by = None;
                    released += 1;
                }
            }
        }
        debug!(checkout = %checkout_id, released, "reservations released");
        released
    }

    // =================================================================
    // Seller operations
    // =================================================================

    /// Move all of a seller's `Available`/`Suspended` listings to `status`.
    /// Sold and reserved listings are untouched.
    pub fn update_seller_status(&self, seller_id: AccountId, status: ListingStatus) -> Result<usize> {
        if !matches!(status, ListingStatus::Available | ListingStatus::Suspended) {
            return Err(TallymartError::validation(format!(
                "seller listings can only be set to Available or Suspended, not {status}"
            )));
        }
        let mut shelf = self.write_section("seller status")?;
        let mut changed = 0;
        for listing in shelf.listings.values_mut().filter(|l| {
            l.seller_id == seller_id
                && matches!(l.status, ListingStatus::Available | ListingStatus::Suspended)
        }) {
            if listing.status != status {
                listing.status = status;
                changed += 1;
            }
        }
        info!(seller = %seller_id, %status, changed, "seller listing status updated");
        Ok(changed)
    }

    // =================================================================
    // Queries
    // =================================================================

    pub fn listing(&self, id: ListingId) -> Result<Listing> {
        self.shelf
            .read()
            .listings
            .get(&id)
            .cloned()
            .ok_or(TallymartError::ListingNotFound(id))
    }

    /// A seller's listings, newest first.
    #[must_use]
    pub fn listings_by_seller(
        &self,
        seller_id: AccountId,
        status: Option<ListingStatus>,
        page: usize,
        limit: usize,
    ) -> Page<Listing> {
        let mut found: Vec<Listing> = self
            .shelf
            .read()
            .listings
            .values()
            .filter(|l| l.seller_id == seller_id && status.is_none_or(|s| l.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        Page::from_sorted(found, page, limit)
    }

    /// Available listings matching `filter`, in checkout selection order.
    #[must_use]
    pub fn search_available(&self, filter: &ListingFilter, page: usize, limit: usize) -> Page<Listing> {
        let mut found: Vec<Listing> = self
            .shelf
            .read()
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Available && filter.matches(l))
            .cloned()
            .collect();
        found.sort_by_key(Listing::sort_key);
        Page::from_sorted(found, page, limit)
    }

    #[must_use]
    pub fn count_available(&self, filter: &ListingFilter) -> usize {
        self.shelf
            .read()
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Available && filter.matches(l))
            .count()
    }

    /// Listing counts grouped by category, then status.
    #[must_use]
    pub fn counts_by_category(&self) -> BTreeMap<String, BTreeMap<String, usize>> {
        let mut counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for listing in self.shelf.read().listings.values() {
            *counts
                .entry(listing.category.clone())
                .or_default()
                .entry(listing.status.to_string())
                .or_default() += 1;
        }
        counts
    }
}
