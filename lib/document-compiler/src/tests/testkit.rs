use std::path::PathBuf;
use std::sync::{Arc, Once};

use graphql_syntax::parse_query;
use hive_compiler_config::CompilerConfig;
use lazy_static::lazy_static;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::build::{bind, collect_signatures, BindOptions, FragmentSignatures};
use crate::compiler::{compile_batch, BatchOutput, DocumentSource};
use crate::ir::{Program, SourceId};
use crate::schema::{load_schema, SchemaModel};
use crate::utils::cancellation::CancellationToken;

fn init_test_logger_internal() {
    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_bracketed_fields(true)
        .with_deferred_spans(false)
        .with_wraparound(25)
        .with_indent_lines(true)
        .with_timer(tracing_tree::time::Uptime::default())
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_targets(false);

    tracing_subscriber::registry()
        .with(tree_layer)
        .with(EnvFilter::from_default_env())
        .init();
}

lazy_static! {
    static ref TRACING_INIT: Once = Once::new();
    static ref TEST_SCHEMA: Arc<SchemaModel> = Arc::new(
        load_schema(&read_fixture("fixture/schema.graphql")).expect("test schema to load")
    );
}

pub fn init_logger() {
    TRACING_INIT.call_once(|| {
        init_test_logger_internal();
    });
}

pub fn read_fixture(path: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path);
    std::fs::read_to_string(path).expect("Unable to read fixture")
}

pub fn test_schema() -> Arc<SchemaModel> {
    TEST_SCHEMA.clone()
}

/// Parses and binds a single document, panicking on any error.
pub fn bind_program(schema: &Arc<SchemaModel>, text: &str) -> Program {
    let source = SourceId::new("test.graphql");
    let document = parse_query(text).expect("document to parse");

    let mut signatures = FragmentSignatures::default();
    let (collected, errors) = collect_signatures(&source, &document, schema);
    assert!(errors.is_empty(), "{:?}", errors);
    for signature in collected {
        signatures.insert(signature).expect("unique fragment names");
    }

    let bound = bind(&source, &document, schema, &signatures, BindOptions::default())
        .unwrap_or_else(|errors| panic!("document to bind: {:#?}", errors));

    let mut program = Program::new(schema.clone());
    for operation in bound.operations {
        program.insert_operation(Arc::new(operation));
    }
    for fragment in bound.fragments {
        program.insert_fragment(Arc::new(fragment));
    }
    program
}

/// Compiles `documents` (id, text) against the test schema.
pub fn compile_documents(documents: &[(&str, &str)], config: &CompilerConfig) -> BatchOutput {
    init_logger();
    let sources: Vec<DocumentSource> = documents
        .iter()
        .map(|(id, text)| DocumentSource::new(*id, *text))
        .collect();
    compile_batch(test_schema(), &sources, config, &CancellationToken::new())
        .expect("batch to compile")
}
