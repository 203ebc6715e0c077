//! Record Transformer
//!
//! Normalizes raw upstream records into [`InventoryRecord`]s. Pure: no I/O,
//! no hidden state, and one bad record never fails the batch.

use crate::inventory::raw::{RawItem, RawRecord};
use crate::inventory::record::InventoryRecord;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, warn};

/// Epoch values above this are treated as milliseconds
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Outcome of transforming one upstream batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformReport {
    /// Records that passed normalization, in upstream order
    pub records: Vec<InventoryRecord>,
    /// Raw records dropped for lacking a usable SKU
    pub dropped: usize,
}

/// Transform a batch, logging how many records were dropped
pub fn transform(raw: &[RawRecord]) -> Vec<InventoryRecord> {
    let report = transform_with_report(raw);
    if report.dropped > 0 {
        warn!(
            dropped = report.dropped,
            kept = report.records.len(),
            "Dropped upstream records without a SKU"
        );
    }
    report.records
}

/// Transform a batch and report drops to the caller instead of logging
pub fn transform_with_report(raw: &[RawRecord]) -> TransformReport {
    let mut report = TransformReport {
        records: Vec::with_capacity(raw.len()),
        dropped: 0,
    };

    for record in raw {
        match normalize(record) {
            Some(normalized) => report.records.push(normalized),
            None => report.dropped += 1,
        }
    }

    debug!(
        kept = report.records.len(),
        dropped = report.dropped,
        "Transformed upstream batch"
    );
    report
}

/// Normalize a single record, `None` when it has no usable SKU
pub fn normalize(raw: &RawRecord) -> Option<InventoryRecord> {
    match raw {
        RawRecord::Item(item) => normalize_item(item),
        RawRecord::Row(cells) => normalize_item(&row_to_item(cells)),
        RawRecord::Unrecognized(_) => None,
    }
}

fn row_to_item(cells: &[Value]) -> RawItem {
    let cell = |i: usize| cells.get(i).cloned();
    RawItem {
        id: cell(0),
        sku: cell(1),
        name: cell(2),
        quantity_on_hand: cell(3),
        unit_cost: cell(4),
        vendor: cell(5),
        location: cell(6),
        last_modified: cell(7),
    }
}

fn normalize_item(item: &RawItem) -> Option<InventoryRecord> {
    let sku = item.sku.as_ref().and_then(coerce_string)?;
    let id = item
        .id
        .as_ref()
        .and_then(coerce_string)
        .unwrap_or_else(|| sku.clone());

    Some(InventoryRecord {
        id,
        name: item.name.as_ref().and_then(coerce_string).unwrap_or_default(),
        quantity_on_hand: item.quantity_on_hand.as_ref().map(coerce_quantity).unwrap_or(0),
        unit_cost: item.unit_cost.as_ref().map(coerce_cost).unwrap_or(0.0),
        vendor: item.vendor.as_ref().and_then(coerce_string),
        location: item.location.as_ref().and_then(coerce_string),
        last_modified_upstream: item.last_modified.as_ref().and_then(coerce_timestamp),
        sku,
    })
}

// =============================================================================
// Coercion Helpers
// =============================================================================

/// Trimmed, non-empty string form of a scalar
fn coerce_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Non-negative whole quantity; fractions are truncated
fn coerce_quantity(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    coerce_number(value)
        .filter(|n| *n > 0.0)
        .map(|n| n.trunc() as u64)
        .unwrap_or(0)
}

fn coerce_cost(value: &Value) -> f64 {
    coerce_number(value).filter(|n| *n > 0.0).unwrap_or(0.0)
}

/// RFC 3339 string or Unix epoch (seconds or milliseconds)
fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw.abs() >= EPOCH_MILLIS_THRESHOLD {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}
