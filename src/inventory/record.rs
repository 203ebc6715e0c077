//! Canonical inventory record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical unit cached and served.
///
/// Always produced by the transformer; `sku` is non-empty and the numeric
/// fields are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    /// Stable external identifier
    pub id: String,
    /// Stock keeping unit, unique within a source
    pub sku: String,
    pub name: String,
    pub quantity_on_hand: u64,
    pub unit_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_upstream: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    /// Create a record with only the required fields set
    pub fn new(sku: impl Into<String>, name: impl Into<String>, quantity_on_hand: u64) -> Self {
        let sku = sku.into();
        Self {
            id: sku.clone(),
            sku,
            name: name.into(),
            quantity_on_hand,
            unit_cost: 0.0,
            vendor: None,
            location: None,
            last_modified_upstream: None,
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost.max(0.0);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Total value of the stock on hand
    pub fn stock_value(&self) -> f64 {
        self.quantity_on_hand as f64 * self.unit_cost
    }
}
