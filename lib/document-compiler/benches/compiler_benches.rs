use std::hint::black_box;
use std::sync::Arc;

use graphql_syntax::parse_query;
use hive_compiler_config::CompilerConfig;
use hive_document_compiler::compiler::{compile_batch, DocumentSource};
use hive_document_compiler::schema::load_schema;
use hive_document_compiler::utils::cancellation::CancellationToken;

use criterion::{criterion_group, criterion_main, Criterion};

fn get_documents(count: usize) -> Vec<DocumentSource> {
    (0..count)
        .map(|i| {
            let text = format!(
                r#"
                query Feed{i}($count: Int!, $cursor: String, $size: Int) {{
                  me {{
                    id
                    ...Card{i} @arguments(size: $size)
                    friends(first: $count, after: $cursor) @connection(key: "Feed{i}_friends") {{
                      edges {{ node {{ ...Card{i} }} }}
                    }}
                  }}
                  viewer {{ name ... on User {{ status createdAt }} }}
                }}

                fragment Card{i} on User @argumentDefinitions(size: {{type: "Int", defaultValue: 48}}) {{
                  name
                  profilePicture(size: $size) {{ url width }}
                  posts {{ id title }}
                }}
                "#,
                i = i
            );
            DocumentSource::new(format!("feed{}.graphql", i), text)
        })
        .collect()
}

fn compiler_pipeline(c: &mut Criterion) {
    let schema_sdl =
        std::fs::read_to_string("./fixture/schema.graphql").expect("Unable to read input file");
    let schema = Arc::new(load_schema(&schema_sdl).expect("failed to load schema"));
    let config = CompilerConfig::default();
    let documents = get_documents(100);
    let cancellation_token = CancellationToken::new();

    c.bench_function("parse", |b| {
        b.iter(|| {
            for document in black_box(&documents) {
                black_box(parse_query(&document.text).expect("failed to parse"));
            }
        })
    });

    c.bench_function("compile_batch", |b| {
        b.iter(|| {
            let output = compile_batch(
                black_box(schema.clone()),
                black_box(&documents),
                black_box(&config),
                &cancellation_token,
            )
            .expect("compile_batch failed during benchmark");
            black_box(output);
        })
    });
}

fn all_benchmarks(c: &mut Criterion) {
    compiler_pipeline(c);
}

criterion_group!(benches, all_benchmarks);
criterion_main!(benches);
