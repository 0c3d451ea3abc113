//! Criterion benchmarks for the frame cipher.
//!
//! Measures the cost of opening an inbound request and sealing a reply, the
//! two operations performed for every message the service handles.
//!
//! Run with:
//! ```bash
//! cargo bench --package gate-core --bench cipher_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gate_core::protocol::keystream::derive_mask;
use gate_core::{FrameCipher, SharedSecret};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_cipher() -> FrameCipher {
    FrameCipher::new(SharedSecret::from("PARKING_SECRET_KEY"))
}

fn payloads() -> Vec<(&'static str, String)> {
    vec![
        ("check", "CHECK;04A1B2C3".to_string()),
        ("add", "ADD;04A1B2C3;Jeanne Martin;C=17;S=40213".to_string()),
        ("long_name", format!("EDIT;04A1B2C3;{}", "N".repeat(200))),
    ]
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_derive_mask(c: &mut Criterion) {
    let secret = SharedSecret::from("PARKING_SECRET_KEY");
    c.bench_function("derive_mask", |b| {
        b.iter(|| derive_mask(black_box(&secret), black_box(123_456)))
    });
}

fn bench_seal_request(c: &mut Criterion) {
    let cipher = make_cipher();
    let mut group = c.benchmark_group("seal_request");
    for (name, payload) in payloads() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &payload, |b, p| {
            b.iter(|| cipher.seal_request(black_box(p), black_box(42)))
        });
    }
    group.finish();
}

fn bench_open_request(c: &mut Criterion) {
    let cipher = make_cipher();
    let mut group = c.benchmark_group("open_request");
    for (name, payload) in payloads() {
        let raw = match cipher.seal_request(&payload, 42) {
            Ok(frame) => frame.to_string(),
            Err(e) => panic!("fixture must seal: {e}"),
        };
        group.bench_with_input(BenchmarkId::from_parameter(name), &raw, |b, r| {
            b.iter(|| cipher.open_request(black_box(r.as_bytes())))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_derive_mask,
    bench_seal_request,
    bench_open_request
);
criterion_main!(benches);
