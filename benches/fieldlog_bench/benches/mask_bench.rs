//! Masking benchmarks
//!
//! Measures string masking and body masking over typical payloads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fieldlog::mask::{mask, mask_body_value, mask_margin, FieldMasker};
use serde_json::json;

fn bench_mask(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask");

    for len in [8usize, 64, 512] {
        let value = "x".repeat(len);
        group.bench_with_input(BenchmarkId::new("mask", len), &value, |b, v| {
            b.iter(|| mask(black_box(v), 2, 2, '*'))
        });
        group.bench_with_input(BenchmarkId::new("mask_margin", len), &value, |b, v| {
            b.iter(|| mask_margin(black_box(v), 2, len - 2, '*'))
        });
    }

    // Multi-byte input goes through the char path
    let unicode = "héllo wörld ünïcödé".repeat(4);
    group.bench_function("mask_unicode", |b| {
        b.iter(|| mask(black_box(&unicode), 1, 1, '*'))
    });

    group.finish();
}

fn bench_body_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("body_masking");

    let masker = FieldMasker::new(["password", "card", "token"], |_: &str, v: &str| {
        mask(v, 0, 4, '*')
    });

    let flat = json!({
        "user": "alice",
        "password": "hunter2",
        "token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9",
    })
    .to_string();

    let nested = json!({
        "order": {
            "id": 1042,
            "items": [{"sku": "A-1", "qty": 2}, {"sku": "B-7", "qty": 1}],
            "payment": {"card": "4111111111111111", "holder": "Alice Doe"},
        },
        "auth": {"token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"},
        "tags": ["priority", "gift"],
    })
    .to_string();

    group.bench_function("flat_object", |b| {
        b.iter(|| mask_body_value(black_box(&flat), Some(&masker), false))
    });

    group.bench_function("nested_object", |b| {
        b.iter(|| mask_body_value(black_box(&nested), Some(&masker), false))
    });

    group.bench_function("nested_object_string_format", |b| {
        b.iter(|| mask_body_value(black_box(&nested), Some(&masker), true))
    });

    group.bench_function("not_json", |b| {
        b.iter(|| mask_body_value(black_box("plain text body"), Some(&masker), false))
    });

    group.finish();
}

criterion_group!(benches, bench_mask, bench_body_masking);
criterion_main!(benches);
