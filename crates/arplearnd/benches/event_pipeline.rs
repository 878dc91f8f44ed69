//! Decode + debounce benchmarks
//!
//! Measures the per-record cost of the learning hot path without the
//! netlink round trip.

use arplearnd::{AddressAnnouncement, DebounceStore, EVENT_RECORD_LEN};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use tokio::time::Instant;

fn record(index: usize) -> Vec<u8> {
    let mut raw = vec![0u8; EVENT_RECORD_LEN];
    raw[..6].copy_from_slice(&[0x02, 0x00, 0x5e, 0x00, (index >> 8) as u8, index as u8]);
    raw[6..10].copy_from_slice(&[10, 0, (index >> 8) as u8, index as u8]);
    raw[12] = 1;
    raw
}

fn bench_decode(c: &mut Criterion) {
    let raw = record(42);
    c.bench_function("decode_record", |b| {
        b.iter(|| AddressAnnouncement::decode(black_box(&raw)))
    });
}

/// Bursty traffic: many records for few distinct senders
fn bench_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("debounced_burst");

    for senders in [1usize, 16, 256] {
        let records: Vec<Vec<u8>> = (0..1024).map(|i| record(i % senders)).collect();
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(senders), &records, |b, records| {
            b.iter(|| {
                let mut store = DebounceStore::new(Duration::from_secs(60), 10);
                let now = Instant::now();
                let mut acted = 0usize;
                for raw in records {
                    if let Ok(ann) = AddressAnnouncement::decode(raw) {
                        if store.should_act(ann.sender_ip, now) {
                            acted += 1;
                        }
                    }
                }
                black_box(acted)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_burst);
criterion_main!(benches);
