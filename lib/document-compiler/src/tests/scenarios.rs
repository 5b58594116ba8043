use std::sync::Arc;

use hive_compiler_config::{pipelines::PassId, CompilerConfig};

use crate::compiler::{compile, CompilerError, DocumentSource};
use crate::diagnostics::DiagnosticKind;
use crate::ir::{Program, Selection};
use crate::schema::load_schema;
use crate::tests::testkit::{bind_program, init_logger};
use crate::transforms::{transform, PassContext};
use crate::utils::cancellation::CancellationToken;

const USER_SCHEMA: &str = "type User { name: String, age: Int, best_friend: User } type Query { me: User }";

fn collect_storage_keys(selections: &[Selection], field: &str, out: &mut Vec<String>) {
    for selection in selections {
        if let Selection::ScalarField(scalar) = selection {
            if scalar.name == field {
                out.push(scalar.storage_key.clone());
            }
        }
        if let Some(children) = selection.selections() {
            collect_storage_keys(children, field, out);
        }
    }
}

fn storage_keys(program: &Program, operation: &str, field: &str) -> Vec<String> {
    let mut out = vec![];
    let operation = program.operation(operation).expect("operation");
    collect_storage_keys(&operation.selections, field, &mut out);
    out
}

#[test]
fn shared_fragment_reads_share_a_storage_key() {
    init_logger();
    let schema = Arc::new(load_schema(USER_SCHEMA).expect("schema to load"));
    let program = bind_program(
        &schema,
        "query Q { me { name ...F best_friend { ...F } } } fragment F on User { age }",
    );

    let inlined = transform(&program, &[PassId::InlineFragments], &PassContext::default())
        .expect("to inline");
    assert_eq!(storage_keys(&inlined, "Q", "age"), vec!["age", "age"]);
}

#[test]
fn unknown_field_is_reported_at_its_span() {
    init_logger();
    let output = compile(
        USER_SCHEMA,
        &[DocumentSource::new("q.graphql", "query Q { me { does_not_exist } }")],
        &CompilerConfig::default(),
        &CancellationToken::new(),
    )
    .expect("batch to run");

    assert!(output.artifacts.is_empty());
    assert_eq!(output.diagnostics.len(), 1);
    let diagnostics = &output.diagnostics[0].diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Binding);
    assert_eq!(
        diagnostics[0].message,
        "The type `User` has no field `does_not_exist`"
    );

    let record = diagnostics[0].to_record();
    assert_eq!(record.file.as_deref(), Some("q.graphql"));
    assert_eq!(
        (record.line_start, record.column_start, record.line_end, record.column_end),
        (Some(1), Some(16), Some(1), Some(30))
    );
}

#[test]
fn unmatched_brace_is_a_located_syntax_error() {
    init_logger();
    let output = compile(
        USER_SCHEMA,
        &[DocumentSource::new("q.graphql", "query Q { me { { } } }")],
        &CompilerConfig::default(),
        &CancellationToken::new(),
    )
    .expect("batch to run");

    let diagnostics = &output.diagnostics[0].diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Syntax);
    assert!(diagnostics[0].message.starts_with("Expected"));
    assert!(diagnostics[0].message.ends_with("found `{`"));
    let record = diagnostics[0].to_record();
    assert_eq!(
        (record.line_start, record.column_start, record.column_end),
        (Some(1), Some(16), Some(17))
    );
}

#[test]
fn undeclared_schema_type_fails_the_batch() {
    init_logger();
    let result = compile(
        "type User { name: String, best_friend: InvalidType } type Query { me: User }",
        &[DocumentSource::new("q.graphql", "query Q { me { name } }")],
        &CompilerConfig::default(),
        &CancellationToken::new(),
    );

    let Err(CompilerError::Schema(error)) = result else {
        panic!("expected the schema to fail to load");
    };
    assert!(error
        .diagnostics
        .iter()
        .any(|diagnostic| diagnostic.message.contains("InvalidType")));
    assert!(error
        .diagnostics
        .iter()
        .all(|diagnostic| diagnostic.location.is_none()));
}

#[test]
fn two_bindings_produce_two_specialized_fragments() {
    init_logger();
    let schema = Arc::new(load_schema(USER_SCHEMA).expect("schema to load"));
    let program = bind_program(
        &schema,
        r#"
        query Q {
          me {
            ...F @arguments(withAge: true)
            best_friend { ...F @arguments(withAge: false) }
          }
        }
        fragment F on User @argumentDefinitions(withAge: {type: "Boolean!"}) {
          name
          age @include(if: $withAge)
        }
        "#,
    );

    let specialized = transform(
        &program,
        &[PassId::ApplyFragmentArguments],
        &PassContext::default(),
    )
    .expect("to specialize");

    let names: Vec<&str> = specialized.fragments().map(|f| f.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    assert!(names.iter().all(|name| name.starts_with("F_")));

    let pruned = transform(
        &specialized,
        &[PassId::SkipUnreachable],
        &PassContext::default(),
    )
    .expect("to prune");
    let mut ages: Vec<usize> = pruned
        .fragments()
        .map(|fragment| {
            let mut keys = vec![];
            collect_storage_keys(&fragment.selections, "age", &mut keys);
            keys.len()
        })
        .collect();
    ages.sort();
    assert_eq!(ages, vec![0, 1]);
}
