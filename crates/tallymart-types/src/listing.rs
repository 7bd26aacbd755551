//! License listings and their price catalogue.
//!
//! ## Listing lifecycle
//!
//! ```text
//!   ┌───────────┐  claim   ┌──────────┐  settle  ┌──────┐
//!   │ AVAILABLE ├─────────▶│ RESERVED ├─────────▶│ SOLD │
//!   └─────┬─────┘◀─────────┴──────────┘          └──────┘
//!         │        release
//!         │ seller status update
//!         ▼
//!   ┌───────────┐
//!   │ SUSPENDED │
//!   └───────────┘
//! ```
//!
//! `Available → Sold` happens exactly once per listing and only through a
//! checkout; `Reserved` is held by a single in-flight checkout.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, CheckoutId, ListingId, PriceRefId, Result, TallymartError};

/// Status of a license listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ListingStatus {
    Available,
    Reserved,
    Sold,
    Suspended,
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "Available"),
            Self::Reserved => write!(f, "Reserved"),
            Self::Sold => write!(f, "Sold"),
            Self::Suspended => write!(f, "Suspended"),
        }
    }
}

impl FromStr for ListingStatus {
    type Err = TallymartError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "reserved" => Ok(Self::Reserved),
            "sold" => Ok(Self::Sold),
            "suspended" => Ok(Self::Suspended),
            other => Err(TallymartError::validation(format!(
                "unknown listing status '{other}'"
            ))),
        }
    }
}

/// Price catalogue entry: category key → unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRef {
    pub id: PriceRefId,
    /// Category key, e.g. `"office-pro"`.
    pub category: String,
    pub unit_price: Decimal,
    /// Whether buyers see listing descriptions in this category.
    pub show_description: bool,
}

impl PriceRef {
    #[must_use]
    pub fn new(category: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            id: PriceRefId::new(),
            category: category.into(),
            unit_price,
            show_description: false,
        }
    }
}

/// A seller-owned software license offered for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub seller_id: AccountId,
    pub price_ref: PriceRefId,
    pub category: String,
    pub title: String,
    pub edition: Option<String>,
    pub region: String,
    pub license_key: String,
    pub description: Option<String>,
    pub status: ListingStatus,
    pub buyer_id: Option<AccountId>,
    pub purchased_at: Option<DateTime<Utc>>,
    /// Set while `Reserved`; identifies the checkout holding the claim.
    pub reserved_by: Option<CheckoutId>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// Stable selection key: oldest first, id breaks ties.
    #[must_use]
    pub fn sort_key(&self) -> (DateTime<Utc>, ListingId) {
        (self.created_at, self.id)
    }
}

/// Caller input for creating or importing a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub edition: Option<String>,
    pub region: String,
    pub license_key: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewListing {
    /// Required fields must be present and non-blank.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("category", &self.category),
            ("title", &self.title),
            ("region", &self.region),
            ("licenseKey", &self.license_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TallymartError::validation(format!(
                "missing or empty field(s): {}",
                missing.join(", ")
            )))
        }
    }
}

/// Selection predicate for searches and checkouts.
///
/// Text fields match case-insensitively as substrings; `category` and
/// `edition` match exactly. Empty strings are treated as "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub edition: Option<String>,
    #[serde(default)]
    pub seller_id: Option<AccountId>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl ListingFilter {
    /// Does the listing satisfy every set criterion? (Status is not checked.)
    #[must_use]
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(category) = non_empty(self.category.as_ref()) {
            if listing.category != category {
                return false;
            }
        }
        if let Some(edition) = non_empty(self.edition.as_ref()) {
            if listing.edition.as_deref() != Some(edition) {
                return false;
            }
        }
        if let Some(region) = non_empty(self.region.as_ref()) {
            if !contains_ci(&listing.region, region) {
                return false;
            }
        }
        if let Some(title) = non_empty(self.title.as_ref()) {
            if !contains_ci(&listing.title, title) {
                return false;
            }
        }
        if let Some(seller) = self.seller_id {
            if listing.seller_id != seller {
                return false;
            }
        }
        true
    }

    /// Human-readable summary for export headers, `"None"` when empty.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(v) = non_empty(self.category.as_ref()) {
            parts.push(format!("category: {v}"));
        }
        if let Some(v) = non_empty(self.region.as_ref()) {
            parts.push(format!("region: {v}"));
        }
        if let Some(v) = non_empty(self.title.as_ref()) {
            parts.push(format!("title: {v}"));
        }
        if let Some(v) = non_empty(self.edition.as_ref()) {
            parts.push(format!("edition: {v}"));
        }
        if let Some(v) = self.seller_id {
            parts.push(format!("seller: {v}"));
        }
        if parts.is_empty() {
            "None".to_string()
        } else {
            parts.join(", ")
        }
    }
}
