//! Raw Upstream Shapes
//!
//! The reporting API is inconsistent about field names and value types.
//! Everything it can send is captured here and only the transformer looks
//! inside.

use serde::Deserialize;
use serde_json::Value;

/// One record as delivered by the upstream API
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawRecord {
    /// Positional report row: id, sku, name, quantityOnHand, unitCost,
    /// vendor, location, lastModified.
    /// Listed first: a keyed struct would also accept a JSON array.
    Row(Vec<Value>),
    /// Keyed object with any of the known field spellings
    Item(RawItem),
    /// Anything else; always dropped by the transformer
    Unrecognized(Value),
}

/// Keyed upstream record. Values stay untyped until transformation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawItem {
    #[serde(alias = "itemId", alias = "ItemID", alias = "item_id")]
    pub id: Option<Value>,

    #[serde(alias = "SKU", alias = "itemNumber", alias = "item_number", alias = "partNumber")]
    pub sku: Option<Value>,

    #[serde(alias = "itemName", alias = "description", alias = "Description", alias = "Name")]
    pub name: Option<Value>,

    #[serde(
        rename = "quantityOnHand",
        alias = "qty",
        alias = "quantity",
        alias = "QtyOnHand",
        alias = "on_hand"
    )]
    pub quantity_on_hand: Option<Value>,

    #[serde(rename = "unitCost", alias = "cost", alias = "Cost", alias = "unit_cost", alias = "avgCost")]
    pub unit_cost: Option<Value>,

    #[serde(alias = "Vendor", alias = "vendorName", alias = "supplier")]
    pub vendor: Option<Value>,

    #[serde(alias = "Location", alias = "warehouse", alias = "bin")]
    pub location: Option<Value>,

    #[serde(
        rename = "lastModified",
        alias = "lastModifiedUpstream",
        alias = "LastModified",
        alias = "updatedAt",
        alias = "modified"
    )]
    pub last_modified: Option<Value>,
}

/// Top-level body of an inventory report response
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UpstreamPayload {
    Wrapped {
        #[serde(alias = "items", alias = "records", alias = "rows")]
        data: Vec<RawRecord>,
    },
    Bare(Vec<RawRecord>),
}

impl UpstreamPayload {
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            UpstreamPayload::Wrapped { data } => data,
            UpstreamPayload::Bare(data) => data,
        }
    }
}
