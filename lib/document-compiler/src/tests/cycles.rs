use pretty_assertions::assert_eq;

use hive_compiler_config::{artifacts::FragmentCycleSeverity, CompilerConfig};

use crate::diagnostics::Severity;
use crate::tests::testkit::compile_documents;

const CYCLE: &str = r#"
query Cyclic { me { ...A } }
fragment A on User { best_friend { ...B } }
fragment B on User { best_friend { ...A } }
"#;

#[test]
fn two_fragment_cycle_fails_its_document() {
    let output = compile_documents(
        &[
            ("cycle.graphql", CYCLE),
            ("ok.graphql", "query Fine { me { id } }"),
        ],
        &CompilerConfig::default(),
    );

    assert_eq!(output.diagnostics.len(), 1);
    let report = &output.diagnostics[0];
    assert_eq!(report.source.as_str(), "cycle.graphql");
    let messages: Vec<&str> = report.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Found a circular reference from fragment `A`: A -> B -> A"]
    );

    assert!(output.artifact("Cyclic").is_none());
    assert!(output.artifact("A").is_none());
    assert!(output.artifact("Fine").is_some());
}

#[test]
fn long_cycle_across_documents_is_reported_once_per_owner() {
    let documents: Vec<(String, String)> = (0..50)
        .map(|i| {
            (
                format!("f{}.graphql", i),
                format!(
                    "fragment F{} on User {{ best_friend {{ ...F{} }} }}",
                    i,
                    (i + 1) % 50
                ),
            )
        })
        .collect();
    let documents: Vec<(&str, &str)> = documents
        .iter()
        .map(|(id, text)| (id.as_str(), text.as_str()))
        .collect();

    let output = compile_documents(&documents, &CompilerConfig::default());

    assert!(output.artifacts.is_empty());
    assert_eq!(output.diagnostics.len(), 50);
    for report in &output.diagnostics {
        assert_eq!(report.diagnostics.len(), 1);
        let index: usize = report.source.as_str()["f".len()..]
            .trim_end_matches(".graphql")
            .parse()
            .expect("numbered document");
        let message = &report.diagnostics[0].message;
        let prefix = format!(
            "Found a circular reference from fragment `F{0}`: F{0} -> F{1}",
            index,
            (index + 1) % 50
        );
        assert!(message.starts_with(&prefix), "{}", message);
        assert!(
            message.ends_with(&format!("F{} -> F{}", (index + 49) % 50, index)),
            "{}",
            message
        );
    }
}

#[test]
fn fragment_reaching_a_visited_cycle_reports_its_own_cycle() {
    let output = compile_documents(
        &[
            (
                "ab.graphql",
                "fragment A on User { best_friend { ...B ...C } } fragment B on User { best_friend { ...A } }",
            ),
            ("c.graphql", "fragment C on User { best_friend { ...B } }"),
            ("ok.graphql", "query Fine { me { id } }"),
        ],
        &CompilerConfig::default(),
    );

    let messages = |source: &str| -> Vec<String> {
        output
            .diagnostics
            .iter()
            .find(|report| report.source.as_str() == source)
            .map(|report| report.diagnostics.iter().map(|d| d.message.clone()).collect())
            .unwrap_or_default()
    };

    assert_eq!(
        messages("ab.graphql"),
        vec!["Found a circular reference from fragment `A`: A -> B -> A"]
    );
    assert_eq!(
        messages("c.graphql"),
        vec!["Found a circular reference from fragment `C`: C -> B -> A -> C"]
    );
    assert!(output.artifact("C").is_none());
    assert_eq!(
        output.artifacts.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Fine"]
    );
}

#[test]
fn warning_severity_defers_to_the_depth_cap() {
    let mut config = CompilerConfig::default();
    config.fragment_cycle_severity = FragmentCycleSeverity::Warning;
    config.max_fragment_depth = 10;

    let output = compile_documents(
        &[
            ("cycle.graphql", CYCLE),
            ("ok.graphql", "query Fine { me { id } }"),
        ],
        &config,
    );

    let report = output
        .diagnostics
        .iter()
        .find(|report| report.source.as_str() == "cycle.graphql")
        .expect("diagnostics of the cyclic document");

    let warning = report
        .diagnostics
        .iter()
        .find(|d| d.severity == Severity::Warning)
        .expect("a cycle warning");
    assert_eq!(
        warning.message,
        "Found a circular reference from fragment `A`: A -> B -> A"
    );
    assert!(report.diagnostics.iter().any(|d| d.is_error()
        && d.message == "Exceeded the maximum fragment depth of 10 while inlining fragment `A`"));

    assert!(output.artifact("Cyclic").is_none());
    assert!(output.artifact("Fine").is_some());
}

#[test]
fn dependents_of_a_cycle_fail_too() {
    let output = compile_documents(
        &[
            (
                "cycle.graphql",
                "fragment A on User { best_friend { ...B } } fragment B on User { best_friend { ...A } }",
            ),
            ("user.graphql", "query UsesA { me { id ...A } }"),
            ("other.graphql", "query Other { me { name } }"),
        ],
        &CompilerConfig::default(),
    );

    let dependent = output
        .diagnostics
        .iter()
        .find(|report| report.source.as_str() == "user.graphql")
        .expect("the dependent document to fail");
    assert_eq!(dependent.diagnostics.len(), 1);
    assert_eq!(
        dependent.diagnostics[0].message,
        "Fragment `A` failed to compile"
    );

    assert!(output.artifact("UsesA").is_none());
    assert_eq!(
        output.artifacts.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Other"]
    );
}
