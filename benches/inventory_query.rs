//! Benchmark for the inventory hot paths
//!
//! Transforming an upstream batch, filtering a snapshot and encoding the
//! stored envelope.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use inventory_cache::cache::{CacheEnvelope, CacheKey, CodecConfig, CompressionAlgorithm, EnvelopeCodec};
use inventory_cache::inventory::{transform, InventoryFilter, InventoryRecord, RawRecord};
use serde_json::json;

const VENDORS: [&str; 4] = ["Fastenal", "Grainger", "McMaster", "Uline"];

fn raw_batch(size: usize) -> Vec<RawRecord> {
    (0..size)
        .map(|i| {
            serde_json::from_value(json!({
                "sku": format!("SKU-{:06}", i),
                "name": format!("Part number {}", i),
                "qty": (i % 50).to_string(),
                "vendor": VENDORS[i % VENDORS.len()],
                "unitCost": 1.25 + (i % 7) as f64,
                "lastModified": 1_700_000_000 + i as i64,
            }))
            .unwrap()
        })
        .collect()
}

fn records(size: usize) -> Vec<InventoryRecord> {
    transform(&raw_batch(size))
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");

    for size in [1_000usize, 10_000] {
        let batch = raw_batch(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| transform(black_box(batch)));
        });
    }

    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let snapshot = records(10_000);
    group.throughput(Throughput::Elements(snapshot.len() as u64));

    group.bench_function("search", |b| {
        let filter = InventoryFilter::search("number 99");
        b.iter(|| filter.apply(black_box(&snapshot)));
    });

    group.bench_function("by_vendor", |b| {
        let filter = InventoryFilter::vendor("Grainger");
        b.iter(|| filter.apply(black_box(&snapshot)));
    });

    group.bench_function("low_stock", |b| {
        let filter = InventoryFilter::low_stock(3);
        b.iter(|| filter.apply(black_box(&snapshot)));
    });

    group.bench_function("combined", |b| {
        let filter = InventoryFilter {
            search: Some("part".into()),
            vendor: Some("Uline".into()),
            low_stock_threshold: Some(10),
        };
        b.iter(|| filter.apply(black_box(&snapshot)));
    });

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_codec");
    let envelope = CacheEnvelope::fresh(CacheKey::All, records(10_000), Utc::now(), 900);

    for algorithm in [CompressionAlgorithm::None, CompressionAlgorithm::Lz4, CompressionAlgorithm::Zstd] {
        let codec = EnvelopeCodec::new(CodecConfig {
            algorithm,
            ..Default::default()
        });
        let encoded = codec.encode(&envelope).unwrap();

        group.bench_function(format!("encode_{:?}", algorithm), |b| {
            b.iter(|| codec.encode(black_box(&envelope)));
        });
        group.bench_function(format!("decode_{:?}", algorithm), |b| {
            b.iter(|| codec.decode(black_box(&encoded)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transform, bench_filters, bench_codec);
criterion_main!(benches);
