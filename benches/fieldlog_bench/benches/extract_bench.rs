//! Field extraction benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fieldlog::mask::mask;
use fieldlog::{extract_fields, value_of, FieldSpec, MaskSet, Masker};
use serde_json::json;

fn bench_value_of(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_of");

    let body = json!({
        "a": {"b": {"c": {"d": {"e": "deep"}}}},
        "top": "shallow",
    });

    group.bench_function("top_level", |b| {
        b.iter(|| value_of(black_box(&body), "top"))
    });

    group.bench_function("five_levels", |b| {
        b.iter(|| value_of(black_box(&body), "a.b.c.d.e"))
    });

    group.bench_function("missing", |b| {
        b.iter(|| value_of(black_box(&body), "a.x.y"))
    });

    group.finish();
}

fn bench_extract_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_fields");

    let body = json!({
        "user": {"id": 7, "email": "alice@example.com", "name": "Alice"},
        "order": {"id": "ord-1042", "total": 99.5},
        "empty": "",
    });

    let spec: FieldSpec = [
        ("user_id", "user.id"),
        ("email", "user.email"),
        ("order_id", "order.id"),
        ("total", "order.total"),
        ("empty", "empty"),
        ("missing", "user.phone"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let masks: MaskSet = ["email".to_string()].into_iter().collect();
    let masker = |_: &str, v: &str| mask(v, 1, 4, '*');
    let not_object = json!(["user", "order"]);

    group.bench_function("unmasked", |b| {
        b.iter(|| extract_fields(black_box(&body), &spec, &MaskSet::new(), None))
    });

    group.bench_function("masked", |b| {
        b.iter(|| extract_fields(black_box(&body), &spec, &masks, Some(&masker as &dyn Masker)))
    });

    group.bench_function("not_object", |b| {
        b.iter(|| extract_fields(black_box(&not_object), &spec, &masks, None))
    });

    group.finish();
}

criterion_group!(benches, bench_value_of, bench_extract_fields);
criterion_main!(benches);
