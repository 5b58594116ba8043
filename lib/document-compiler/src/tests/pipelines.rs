use hive_compiler_config::{artifacts::ArtifactLanguage, pipelines::PassId, CompilerConfig};

use crate::compiler::ArtifactKind;
use crate::printer::print_program;
use crate::tests::testkit::{bind_program, compile_documents, init_logger, test_schema};
use crate::transforms::{transform, PassContext};

const FEED: &str = r#"
query Feed($count: Int!, $cursor: String, $size: Int) {
  me {
    id
    ...UserCard @arguments(size: $size)
    friends(first: $count, after: $cursor) @connection(key: "Feed_friends") {
      edges { node { name } }
    }
  }
}

fragment UserCard on User @argumentDefinitions(size: {type: "Int", defaultValue: 48}) {
  name
  profilePicture(size: $size) { url }
}
"#;

#[test]
fn network_text_is_specialized_and_expanded() {
    let output = compile_documents(&[("feed.graphql", FEED)], &CompilerConfig::default());
    assert!(!output.has_errors(), "{:#?}", output.diagnostics);

    let feed = output.artifact("Feed").expect("request artifact");
    assert_eq!(feed.kind, ArtifactKind::Request);
    let text = feed.text.clone().expect("network text");
    let specialized = text
        .split_whitespace()
        .find(|word| word.starts_with("...UserCard_"))
        .map(|word| word.trim_start_matches("...").to_string())
        .expect("specialized spread");
    let text = text.replace(&specialized, "UserCard_<hash>");

    insta::assert_snapshot!(text, @r"
    query Feed($count: Int!, $cursor: String, $size: Int) {
      me {
        id
        ...UserCard_<hash>
        friends(after: $cursor, first: $count) {
          edges {
            node {
              name
              __typename
            }
            cursor
          }
          pageInfo {
            endCursor
            hasNextPage
            hasPreviousPage
            startCursor
          }
        }
      }
    }

    fragment UserCard_<hash> on User {
      name
      profilePicture(size: $size) {
        url
      }
    }
    ");

    let card = output.artifact("UserCard").expect("fragment artifact");
    assert_eq!(card.kind, ArtifactKind::Fragment);
    assert_eq!(card.text, None);
    assert_eq!(card.hash, feed.hash);
    assert_eq!(card.runtime["argumentDefinitions"][0]["defaultValue"], 48);
}

#[test]
fn runtime_record_is_stable_across_batches() {
    let config = CompilerConfig::default();
    let first = compile_documents(&[("feed.graphql", FEED)], &config);
    let second = compile_documents(&[("feed.graphql", FEED)], &config);

    let first = first.artifact("Feed").expect("artifact");
    let second = second.artifact("Feed").expect("artifact");
    assert_eq!(first.runtime, second.runtime);
    assert_eq!(
        first.runtime["params"]["cacheID"],
        second.runtime["params"]["cacheID"]
    );
    assert_eq!(first.runtime["params"]["text"], first.text.clone().expect("text").as_str());
}

#[test]
fn language_options_only_change_types() {
    let mut plain = CompilerConfig::default();
    plain.artifact_language = ArtifactLanguage::Plain;
    let mut flow = CompilerConfig::default();
    flow.artifact_language = ArtifactLanguage::Flow;
    flow.generate_extra_validation = true;

    let plain = compile_documents(&[("feed.graphql", FEED)], &plain);
    let flow = compile_documents(&[("feed.graphql", FEED)], &flow);
    let plain = plain.artifact("Feed").expect("artifact");
    let flow = flow.artifact("Feed").expect("artifact");

    assert_eq!(plain.types, None);
    assert_eq!(plain.validation, None);
    assert!(flow
        .types
        .as_deref()
        .expect("types")
        .contains("export type Feed$data = {|"));
    assert_eq!(plain.runtime, flow.runtime);
    assert_eq!(plain.text, flow.text);
    assert_eq!(
        flow.validation.clone().expect("validation"),
        vec![
            "me.id",
            "me.friends.edges.node.__typename",
            "me.friends.edges.cursor",
            "me.friends.pageInfo",
            "me.friends.pageInfo.hasNextPage",
            "me.friends.pageInfo.hasPreviousPage",
        ]
    );
}

#[test]
fn printing_a_bound_document_round_trips() {
    init_logger();
    let schema = test_schema();
    let source = r#"
        query Search($term: String!, $first: Int = 10) {
          search(term: $term) {
            __typename
            ... on User { name friends(first: $first) { totalCount } }
            ... on Page { likers }
          }
          node(id: "1") { id }
        }
    "#;
    let program = bind_program(&schema, source);
    let printed = print_program(&program);
    insta::assert_snapshot!(printed, @r#"
    query Search($term: String!, $first: Int = 10) {
      search(term: $term) {
        __typename
        ... on User {
          name
          friends(first: $first) {
            totalCount
          }
        }
        ... on Page {
          likers
        }
      }
      node(id: "1") {
        id
      }
    }
    "#);

    let reprinted = print_program(&bind_program(&schema, &printed));
    assert_eq!(printed, reprinted);
}

#[test]
fn equal_reads_share_storage_keys() {
    let schema = test_schema();
    let program = bind_program(
        &schema,
        r#"
        query Q {
          me {
            a: profilePicture(size: 32) { url }
            profilePicture(size: 32) { width }
            b: profilePicture(size: 32) { url }
            friends(orderBy: "name", first: 1) { totalCount }
            other: friends(first: 1, orderBy: "name") { totalCount }
          }
        }
        "#,
    );

    let operation = program.operation("Q").expect("operation");
    let me = operation.selections[0].selections().expect("me selections");
    let keys: Vec<&str> = me.iter().filter_map(|s| s.storage_key()).collect();
    assert_eq!(
        keys,
        vec![
            "a:profilePicture(size:32)",
            "profilePicture(size:32)",
            "b:profilePicture(size:32)",
            "friends(first:1,orderBy:\"name\")",
            "other:friends(first:1,orderBy:\"name\")",
        ]
    );
}

#[test]
fn flattening_is_idempotent_on_a_whole_program() {
    let schema = test_schema();
    let program = bind_program(
        &schema,
        r#"
        query Q($show: Boolean!) {
          me {
            name
            ... on User { name age best_friend { id } }
            best_friend { name }
            age @include(if: $show)
            alias: age @include(if: $show)
          }
        }
        "#,
    );

    let ctx = PassContext::default();
    let once = transform(&program, &[PassId::Flatten], &ctx).expect("flatten");
    let twice = transform(&once, &[PassId::Flatten], &ctx).expect("flatten");
    assert_eq!(print_program(&once), print_program(&twice));
    insta::assert_snapshot!(print_program(&once), @r"
    query Q($show: Boolean!) {
      me {
        name
        age
        best_friend {
          id
          name
        }
        age @include(if: $show)
        alias: age @include(if: $show)
      }
    }
    ");
}

#[test]
fn unreachable_selections_never_reach_the_network() {
    let output = compile_documents(
        &[(
            "dead.graphql",
            r#"
            query Dead {
              viewer {
                name
                ... on Page { likers @include(if: false) }
              }
              me { age @skip(if: true) id }
            }
            "#,
        )],
        &CompilerConfig::default(),
    );
    assert!(!output.has_errors(), "{:#?}", output.diagnostics);

    let text = output
        .artifact("Dead")
        .and_then(|artifact| artifact.text.clone())
        .expect("network text");
    insta::assert_snapshot!(text, @r"
    query Dead {
      viewer {
        __typename
        name
      }
      me {
        id
      }
    }
    ");
}
