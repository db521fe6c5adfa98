//! Criterion benchmarks for cldurl critical paths
//!
//! Benchmarks the operations run once per rendered image:
//! - Expression: free-text normalization
//! - Transformation: building and serializing chains
//! - Url: full delivery URL assembly
//! - Responsive: `w_auto` rewriting

use cldurl::expression::normalize;
use cldurl::responsive::{Responsive, ResponsiveImage};
use cldurl::util::Options;
use cldurl::{Client, Configuration, Transformation};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

// =============================================================================
// Test Data Generators
// =============================================================================

/// Generate an expression with n `and`-joined predicates
fn make_expression(n: usize) -> String {
    (0..n)
        .map(|i| match i % 3 {
            0 => format!("width > {}", i * 10),
            1 => format!("face_count <= {}", i),
            _ => format!("$var{} * aspect_ratio != 2", i),
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Generate transformation options with n chained links
fn make_chain_options(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| {
                json!({
                    "crop": "fill",
                    "width": 100 + i,
                    "height": 50 + i,
                    "effect": ["sepia", i],
                    "background": "#ff0000",
                    "overlay": {"public_id": format!("logos/brand{}", i)}
                })
            })
            .collect(),
    )
}

fn demo_client() -> Client {
    let mut config = Configuration::with_defaults();
    config.set("cloud_name", "demo").set("api_secret", "secret");
    Client::new(config)
}

fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}

// =============================================================================
// Expression Benchmarks
// =============================================================================

fn bench_expression(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression");

    for size in [1, 4, 16, 64].iter() {
        let text = make_expression(*size);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("normalize", size), &text, |b, text| {
            b.iter(|| normalize(black_box(text)))
        });
    }

    group.finish();
}

// =============================================================================
// Transformation Benchmarks
// =============================================================================

fn bench_transformation(c: &mut Criterion) {
    let mut group = c.benchmark_group("transformation");

    group.bench_function("build_and_serialize_link", |b| {
        b.iter(|| {
            Transformation::new()
                .crop(black_box("fill"))
                .width(100)
                .height(200)
                .gravity("face")
                .effect("sepia")
                .serialize()
        })
    });

    for size in [1, 4, 16].iter() {
        let chain = make_chain_options(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("serialize_chain", size), &chain, |b, chain| {
            b.iter(|| Transformation::from_options(black_box(chain)).serialize())
        });
    }

    let conditional = Transformation::new()
        .if_("w_lt_200")
        .crop("fill")
        .width(80)
        .else_()
        .crop("scale")
        .width(120)
        .end_if()
        .effect("sepia");
    group.bench_function("serialize_if_else_end", |b| b.iter(|| black_box(&conditional).serialize()));

    group.finish();
}

// =============================================================================
// Url Benchmarks
// =============================================================================

fn bench_url(c: &mut Criterion) {
    let mut group = c.benchmark_group("url");
    let client = demo_client();

    let plain = Options::new();
    group.bench_function("default", |b| b.iter(|| client.url(black_box("sample"), &plain)));

    let sharded = options(json!({"crop": "fill", "width": 100, "cdn_subdomain": true, "format": "webp"}));
    group.bench_function("sharded_with_format", |b| b.iter(|| client.url(black_box("folder/sample.png"), &sharded)));

    let signed = options(json!({"crop": "fill", "width": 100, "sign_url": true}));
    group.bench_function("signed", |b| b.iter(|| client.url(black_box("sample"), &signed)));

    group.finish();
}

// =============================================================================
// Responsive Benchmarks
// =============================================================================

fn bench_responsive(c: &mut Criterion) {
    let mut group = c.benchmark_group("responsive");
    let responsive = Responsive::default();
    let src = "http://res.cloudinary.com/demo/image/upload/c_scale,dpr_auto,w_auto:100/sample";

    group.bench_function("update_auto_width", |b| {
        b.iter(|| {
            let mut image = ResponsiveImage::new(black_box(src));
            responsive.update(&mut image, 321)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_expression, bench_transformation, bench_url, bench_responsive);
criterion_main!(benches);
