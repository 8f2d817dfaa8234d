//! Aggregate + artifact build benchmark

use lcstitch::aggregate::Aggregator;
use lcstitch::artifact::ArtifactBuilder;
use lcstitch::request::AggregationKey;
use lcstitch::schema::MeasurementRecord;
use lcstitch::ArtifactConfig;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

/// Records in reverse-interleaved time order, as an unordered listing yields
fn create_records(rows: usize) -> Vec<MeasurementRecord> {
    (0..rows)
        .map(|i| {
            let slot = if i % 2 == 0 { rows - 1 - i } else { i };
            MeasurementRecord {
                time: 1325.29 + slot as f64 / 720.0,
                flux: 1500.0 + (i % 17) as f32,
                background: 12.5 + (i % 3) as f32,
                quality: if i % 97 == 0 { 128 } else { 0 },
                x: 1021,
                y: 877,
                ra: 84.291188,
                dec: -80.469119,
            }
        })
        .collect()
}

fn benchmark_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_finalize");

    for rows in [1_000, 20_000] {
        group.throughput(Throughput::Elements(rows as u64));
        let records = create_records(rows);

        group.bench_function(format!("{}_rows", rows), |b| {
            b.iter(|| {
                let mut aggregator = Aggregator::new();
                for record in &records {
                    aggregator.add(*record);
                }
                black_box(aggregator.finalize())
            });
        });
    }

    group.finish();
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("artifact_build");
    let key = AggregationKey::new("25155310", 1, 4, 1, 2.5, 30).unwrap();
    let builder = ArtifactBuilder::new(ArtifactConfig::default());
    let generated_at = Utc.with_ymd_and_hms(2018, 8, 22, 0, 0, 0).unwrap();

    for rows in [1_000, 20_000] {
        group.throughput(Throughput::Elements(rows as u64));

        let mut aggregator = Aggregator::new();
        for record in create_records(rows) {
            aggregator.add(record);
        }
        let finalized = aggregator.finalize();

        let size = builder
            .build(&key, finalized.clone(), generated_at)
            .unwrap()
            .bytes
            .len();
        println!("Rows: {}, Artifact: {} bytes", rows, size);

        group.bench_function(format!("{}_rows", rows), |b| {
            b.iter(|| {
                let artifact = builder
                    .build(&key, black_box(finalized.clone()), generated_at)
                    .unwrap();
                black_box(artifact.bytes.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_aggregate, benchmark_build);

criterion_main!(benches);
