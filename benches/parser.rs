//! Benchmarks for answer extraction and path normalization

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tradeapi_bench::{normalize_path, parse};

fn benchmark_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    let bare = "GET /v1/instruments/SBER@MISX/quotes/latest";
    let prose = "Sure! To fetch the latest quote you should call\n\
                 Use GET /v1/instruments/SBER@MISX/quotes/latest to get the quote.\n\
                 Let me know if you need anything else.";
    let miss = "I am not sure which endpoint covers that, sorry.";

    group.bench_function("bare_answer", |b| b.iter(|| parse(black_box(bare))));
    group.bench_function("prose_answer", |b| b.iter(|| parse(black_box(prose))));
    group.bench_function("no_match", |b| b.iter(|| parse(black_box(miss))));

    group.finish();
}

fn benchmark_normalize(c: &mut Criterion) {
    c.bench_function("normalize_path", |b| {
        b.iter(|| normalize_path(black_box("//v1//instruments//SBER@MISX//bars  ")));
    });
}

criterion_group!(benches, benchmark_parse, benchmark_normalize);
criterion_main!(benches);
