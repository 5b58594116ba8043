use std::fs;

use graphql_syntax::parse_query;

fn load(name: &str) -> String {
    let path = format!("{}/tests/queries/{}.graphql", env!("CARGO_MANIFEST_DIR"), name);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("failed to open file {}", path))
}

#[test]
fn kitchen_sink_round_trips() {
    let document = parse_query(&load("kitchen-sink")).expect("failed to parse");
    assert_eq!(document.definitions.len(), 5);

    let printed = document.to_string();
    let reparsed = parse_query(&printed).expect("failed to reparse");
    pretty_assertions::assert_eq!(printed, reparsed.to_string());
}

#[test]
fn minimal_formats_canonically() {
    let document = parse_query(&load("minimal")).unwrap();
    insta::assert_snapshot!(document.to_string(), @r###"
    {
      a
    }
    "###);
}
