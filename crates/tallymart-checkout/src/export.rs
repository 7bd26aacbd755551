//! Purchase export: a JSON report of the purchased listings written to a
//! retrievable location.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tallymart_types::{AccountId, CheckoutId, Listing, ListingId, Result, TallymartError};
use tracing::debug;

/// Where an export landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub filename: String,
    /// Retrievable path, e.g. `/uploads/<filename>`.
    pub locator: String,
    pub size: u64,
    /// Hex SHA-256 of the written bytes.
    pub sha256: String,
}

/// Destination for export documents.
pub trait ExportSink: Send + Sync {
    fn write(&self, filename: &str, contents: &[u8]) -> Result<ExportArtifact>;
}

/// Writes exports into a directory on the local filesystem.
pub struct FsExportSink {
    dir: PathBuf,
    public_prefix: String,
}

impl FsExportSink {
    /// `public_prefix` is prepended to the filename to form the locator.
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_prefix: public_prefix.into(),
        }
    }
}

impl ExportSink for FsExportSink {
    fn write(&self, filename: &str, contents: &[u8]) -> Result<ExportArtifact> {
        if contents.is_empty() {
            return Err(TallymartError::Export("refusing to write an empty export".into()));
        }
        fs::create_dir_all(&self.dir)
            .map_err(|e| TallymartError::Export(format!("create {}: {e}", self.dir.display())))?;
        let path = self.dir.join(filename);
        fs::write(&path, contents)
            .map_err(|e| TallymartError::Export(format!("write {}: {e}", path.display())))?;
        let size = fs::metadata(&path)
            .map_err(|e| TallymartError::Export(format!("stat {}: {e}", path.display())))?
            .len();
        debug!(path = %path.display(), size, "export written");

        Ok(ExportArtifact {
            filename: filename.to_string(),
            locator: format!("{}/{filename}", self.public_prefix.trim_end_matches('/')),
            size,
            sha256: hex::encode(Sha256::digest(contents)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub checkout_id: CheckoutId,
    pub purchased_by: String,
    pub total_cost: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub filters_applied: String,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportItem {
    pub listing_id: ListingId,
    pub category: String,
    pub title: String,
    pub edition: Option<String>,
    pub region: String,
    pub license_key: String,
    pub description: String,
    pub price: Decimal,
    pub seller_id: AccountId,
    pub purchased_at: Option<DateTime<Utc>>,
}

/// The exported document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub title: String,
    pub metadata: ExportMetadata,
    /// Item count per category.
    pub stats: BTreeMap<String, usize>,
    /// Sorted by title, then listing id.
    pub items: Vec<ExportItem>,
}

impl ExportDocument {
    /// `priced` pairs each sold listing with its unit price.
    #[must_use]
    pub fn build(metadata: ExportMetadata, priced: &[(Listing, Decimal)]) -> Self {
        let mut stats = BTreeMap::new();
        let mut items: Vec<ExportItem> = priced
            .iter()
            .map(|(listing, price)| {
                *stats.entry(listing.category.clone()).or_insert(0) += 1;
                ExportItem {
                    listing_id: listing.id,
                    category: listing.category.clone(),
                    title: listing.title.clone(),
                    edition: listing.edition.clone(),
                    region: listing.region.clone(),
                    license_key: listing.license_key.clone(),
                    description: listing
                        .description
                        .clone()
                        .unwrap_or_else(|| "N/A".to_string()),
                    price: *price,
                    seller_id: listing.seller_id,
                    purchased_at: listing.purchased_at,
                }
            })
            .collect();
        items.sort_by(|a, b| a.title.cmp(&b.title).then(a.listing_id.cmp(&b.listing_id)));

        Self {
            title: "License Purchase Report".to_string(),
            metadata,
            stats,
            items,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// `license-purchase-<user>-<date>-<checkout>.json`, with the username
/// reduced to `[A-Za-z0-9_]`.
#[must_use]
pub fn export_filename(username: &str, checkout_id: CheckoutId, at: DateTime<Utc>) -> String {
    let sanitized: String = username
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "license-purchase-{sanitized}-{}-{}.json",
        at.format("%Y-%m-%d"),
        checkout_id.0.simple()
    )
}
