//! Price catalogue: one unit price per category key.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tallymart_types::{PriceRef, PriceRefId, Result, TallymartError};
use tracing::info;

#[derive(Default)]
struct Prices {
    by_id: HashMap<PriceRefId, PriceRef>,
    by_category: HashMap<String, PriceRefId>,
}

/// Category → unit price. Read-only from checkout's point of view.
#[derive(Default)]
pub struct PriceCatalog {
    prices: RwLock<Prices>,
}

impl PriceCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a category or change its price. The id of an existing
    /// category is kept, so listings keep pointing at it.
    pub fn upsert_price(&self, category: &str, unit_price: Decimal, show_description: bool) -> Result<PriceRef> {
        let category = category.trim();
        if category.is_empty() {
            return Err(TallymartError::validation("category is required"));
        }
        if unit_price <= Decimal::ZERO {
            return Err(TallymartError::NonPositiveAmount(unit_price));
        }

        let mut guard = self.prices.write();
        let prices = &mut *guard;
        let id = prices.by_category.get(category).copied();
        let entry = match id.and_then(|id| prices.by_id.get_mut(&id)) {
            Some(existing) => {
                existing.unit_price = unit_price;
                existing.show_description = show_description;
                existing.clone()
            }
            None => {
                let mut fresh = PriceRef::new(category, unit_price);
                fresh.show_description = show_description;
                prices.by_category.insert(category.to_string(), fresh.id);
                prices.by_id.insert(fresh.id, fresh.clone());
                fresh
            }
        };
        info!(category, price = %unit_price, "price set");
        Ok(entry)
    }

    pub fn price(&self, id: PriceRefId) -> Result<PriceRef> {
        self.prices
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| TallymartError::PriceNotFound(id.to_string()))
    }

    pub fn price_for_category(&self, category: &str) -> Result<PriceRef> {
        let prices = self.prices.read();
        prices
            .by_category
            .get(category.trim())
            .and_then(|id| prices.by_id.get(id))
            .cloned()
            .ok_or_else(|| TallymartError::PriceNotFound(category.to_string()))
    }

    /// All entries, ordered by category.
    #[must_use]
    pub fn list_prices(&self) -> Vec<PriceRef> {
        let mut all: Vec<PriceRef> = self.prices.read().by_id.values().cloned().collect();
        all.sort_by(|a, b| a.category.cmp(&b.category));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_id_and_updates_price() {
        let catalog = PriceCatalog::new();
        let first = catalog.upsert_price("office", Decimal::new(10, 0), false).unwrap();
        let second = catalog.upsert_price("office", Decimal::new(12, 0), true).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(catalog.price(first.id).unwrap().unit_price, Decimal::new(12, 0));
        assert!(catalog.price_for_category("office").unwrap().show_description);
    }

    #[test]
    fn rejects_blank_category_and_free_items() {
        let catalog = PriceCatalog::new();
        assert!(catalog.upsert_price(" ", Decimal::ONE, false).is_err());
        assert!(matches!(
            catalog.upsert_price("os", Decimal::ZERO, false),
            Err(TallymartError::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn list_is_sorted_and_lookups_miss_cleanly() {
        let catalog = PriceCatalog::new();
        catalog.upsert_price("zeta", Decimal::ONE, false).unwrap();
        catalog.upsert_price("alpha", Decimal::ONE, false).unwrap();
        let names: Vec<_> = catalog.list_prices().into_iter().map(|p| p.category).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(matches!(
            catalog.price_for_category("missing"),
            Err(TallymartError::PriceNotFound(_))
        ));
    }
}
