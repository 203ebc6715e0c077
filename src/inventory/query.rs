//! Inventory Query Layer
//!
//! Filtered views derived live from the full inventory snapshot. Freshness
//! is never decided here: every result carries the source state of the
//! snapshot it was cut from.

use crate::cache::{CacheKey, GetOptions, InventoryCacheRef, InventorySnapshot, SourceState};
use crate::error::Result;
use crate::inventory::InventoryRecord;
use serde::Serialize;

// =============================================================================
// Filter
// =============================================================================

/// Predicates over inventory records, combined with logical AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryFilter {
    /// Case-insensitive substring of name, SKU or vendor
    pub search: Option<String>,
    /// Exact vendor name
    pub vendor: Option<String>,
    /// Keep records with `quantityOnHand <= threshold`
    pub low_stock_threshold: Option<u64>,
}

impl InventoryFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn vendor(name: impl Into<String>) -> Self {
        Self {
            vendor: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn low_stock(threshold: u64) -> Self {
        Self {
            low_stock_threshold: Some(threshold),
            ..Default::default()
        }
    }

    /// Check if no predicate is set
    pub fn is_empty(&self) -> bool {
        self.search_term().is_none() && self.vendor.is_none() && self.low_stock_threshold.is_none()
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    /// Apply the filter, preserving record order
    pub fn apply(&self, records: &[InventoryRecord]) -> Vec<InventoryRecord> {
        let term = self.search_term();
        records
            .iter()
            .filter(|record| {
                term.as_deref().map_or(true, |t| matches_term(record, t))
                    && self
                        .vendor
                        .as_deref()
                        .map_or(true, |v| record.vendor.as_deref() == Some(v))
                    && self
                        .low_stock_threshold
                        .map_or(true, |threshold| record.quantity_on_hand <= threshold)
            })
            .cloned()
            .collect()
    }
}

/// `term` must already be lowercase
fn matches_term(record: &InventoryRecord, term: &str) -> bool {
    record.name.to_lowercase().contains(term)
        || record.sku.to_lowercase().contains(term)
        || record
            .vendor
            .as_deref()
            .is_some_and(|vendor| vendor.to_lowercase().contains(term))
}

// =============================================================================
// Query Result
// =============================================================================

/// Filtered records plus the provenance of the snapshot they came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(rename = "data")]
    pub records: Vec<InventoryRecord>,
    pub source_state: SourceState,
    pub count: usize,
    pub cache_age_seconds: u64,
}

impl QueryResult {
    /// Cut a filtered view from a snapshot
    pub fn from_snapshot(snapshot: &InventorySnapshot, filter: &InventoryFilter) -> Self {
        let records = if filter.is_empty() {
            snapshot.records.as_ref().clone()
        } else {
            filter.apply(&snapshot.records)
        };

        Self {
            count: records.len(),
            records,
            source_state: snapshot.source_state,
            cache_age_seconds: snapshot.cache_age_seconds,
        }
    }

    /// Check if the data may be outdated
    pub fn is_stale(&self) -> bool {
        !self.source_state.is_fresh()
    }
}

// =============================================================================
// Inventory Query
// =============================================================================

/// Query front-end over the inventory cache
#[derive(Clone)]
pub struct InventoryQuery {
    cache: InventoryCacheRef,
}

impl InventoryQuery {
    pub fn new(cache: InventoryCacheRef) -> Self {
        Self { cache }
    }

    /// Records whose name, SKU or vendor contains `term`
    pub async fn search(&self, term: &str, options: GetOptions) -> Result<QueryResult> {
        self.query(&InventoryFilter::search(term), options).await
    }

    /// Records of exactly this vendor
    pub async fn by_vendor(&self, vendor: &str, options: GetOptions) -> Result<QueryResult> {
        self.query(&InventoryFilter::vendor(vendor), options).await
    }

    /// Records with `quantityOnHand <= threshold`
    pub async fn low_stock(&self, threshold: u64, options: GetOptions) -> Result<QueryResult> {
        self.query(&InventoryFilter::low_stock(threshold), options).await
    }

    /// Apply `filter` to the current full snapshot
    pub async fn query(&self, filter: &InventoryFilter, options: GetOptions) -> Result<QueryResult> {
        let snapshot = self.cache.get_inventory(&CacheKey::All, options).await?;
        Ok(QueryResult::from_snapshot(&snapshot, filter))
    }
}

impl std::fmt::Debug for InventoryQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryQuery").finish_non_exhaustive()
    }
}
