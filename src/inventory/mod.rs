//! Inventory Domain
//!
//! Canonical records, the raw shapes the upstream sends, the transformer
//! between the two, and the query layer that serves filtered views.

pub mod query;
pub mod raw;
pub mod record;
pub mod transform;

pub use query::{InventoryFilter, InventoryQuery, QueryResult};
pub use raw::{RawItem, RawRecord, UpstreamPayload};
pub use record::InventoryRecord;
pub use transform::{transform, transform_with_report, TransformReport};
