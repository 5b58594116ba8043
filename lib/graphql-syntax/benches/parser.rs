use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use graphql_syntax::{parse_query, parse_schema};

const QUERIES: [&str; 3] = ["minimal", "inline_fragment", "kitchen-sink"];

fn fixture(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|error| panic!("{}: {}", path, error))
}

fn executable_documents(c: &mut Criterion) {
    let mut group = c.benchmark_group("executable");
    for name in QUERIES {
        let text = fixture(&format!("./tests/queries/{}.graphql", name));
        group.bench_function(format!("parse/{}", name), |b| {
            b.iter(|| parse_query(black_box(&text)).expect("query to parse"))
        });
        let document = parse_query(&text).expect("query to parse");
        group.bench_function(format!("print/{}", name), |b| {
            b.iter(|| black_box(&document).to_string())
        });
    }
    group.finish();
}

fn schema_documents(c: &mut Criterion) {
    let sdl = fixture("../document-compiler/fixture/schema.graphql");
    c.bench_function("schema/parse", |b| {
        b.iter(|| parse_schema(black_box(&sdl)).expect("schema to parse"))
    });
}

criterion_group!(benches, executable_documents, schema_documents);
criterion_main!(benches);
