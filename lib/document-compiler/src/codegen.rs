//! Runtime records consumed by a request/normalization runtime.
//!
//! Records mirror the final IR one to one and are plain serde structures, so
//! identical IR always serializes to identical JSON.

use serde::Serialize;
use tracing::instrument;
use xxhash_rust::xxh3::xxh3_64;

use crate::diagnostics::Diagnostic;
use crate::ir::{
    for_each_spread, ArgumentDefinition, Argument, ConditionValue, FragmentDefinition, IrValue,
    Location, OperationDefinition, Program, Selection, VariableDefinition,
};
use crate::printer::print_full_operation;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuntimeArtifact {
    Request(Request),
    Fragment(ReaderFragment),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename = "Request")]
pub struct Request {
    /// Reader selections of the operation.
    pub fragment: ReaderFragment,
    /// Normalization selections, fragments inlined.
    pub operation: NormalizationOperation,
    pub params: RequestParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename = "Fragment", rename_all = "camelCase")]
pub struct ReaderFragment {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub abstract_key: Option<String>,
    pub argument_definitions: Vec<ArgumentDefinitionNode>,
    pub selections: Vec<SelectionNode>,
    pub metadata: Option<FragmentMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename = "Operation", rename_all = "camelCase")]
pub struct NormalizationOperation {
    pub name: String,
    pub argument_definitions: Vec<ArgumentDefinitionNode>,
    pub selections: Vec<SelectionNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    #[serde(rename = "cacheID")]
    pub cache_id: String,
    /// Persisted query id, never assigned by the compiler.
    pub id: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub name: String,
    pub operation_kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FragmentMetadata {
    pub connection: Vec<ConnectionNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionNode {
    pub key: String,
    pub count: Option<String>,
    pub cursor: Option<String>,
    pub direction: &'static str,
    pub filters: Vec<String>,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ArgumentDefinitionNode {
    LocalArgument {
        name: String,
        #[serde(rename = "defaultValue")]
        default_value: serde_json::Value,
    },
    RootArgument {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ArgumentNode {
    Literal {
        name: String,
        value: serde_json::Value,
    },
    Variable {
        name: String,
        #[serde(rename = "variableName")]
        variable_name: String,
    },
    ListValue {
        name: String,
        items: Vec<ArgumentNode>,
    },
    ObjectValue {
        name: String,
        fields: Vec<ArgumentNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum SelectionNode {
    ScalarField(ScalarFieldNode),
    LinkedField(LinkedFieldNode),
    InlineFragment(InlineFragmentNode),
    FragmentSpread(FragmentSpreadNode),
    Condition(ConditionNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarFieldNode {
    pub alias: Option<String>,
    pub name: String,
    pub args: Option<Vec<ArgumentNode>>,
    pub storage_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedFieldNode {
    pub alias: Option<String>,
    pub name: String,
    pub args: Option<Vec<ArgumentNode>>,
    pub concrete_type: Option<String>,
    pub plural: bool,
    pub selections: Vec<SelectionNode>,
    pub storage_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragmentNode {
    #[serde(rename = "type")]
    pub type_condition: Option<String>,
    pub abstract_key: Option<String>,
    pub selections: Vec<SelectionNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FragmentSpreadNode {
    pub name: String,
    pub args: Option<Vec<ArgumentNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionNode {
    pub condition: String,
    pub passing_value: bool,
    pub selections: Vec<SelectionNode>,
}

/// Hex xxh3 digest of canonical operation text.
pub fn cache_id(text: &str) -> String {
    format!("{:016x}", xxh3_64(text.as_bytes()))
}

/// Network text of `operation` and the fragments it reaches.
///
/// Fragment arguments have no GraphQL spelling, so every reached fragment
/// must already be specialized by `apply_fragment_arguments`.
pub fn generate_text(program: &Program, operation: &OperationDefinition) -> Result<String, Diagnostic> {
    let fragments: Vec<&FragmentDefinition> = program
        .referenced_fragments(&operation.selections)
        .iter()
        .filter_map(|name| program.fragment(name).map(|fragment| fragment.as_ref()))
        .collect();

    if let Some(fragment) = fragments
        .iter()
        .find(|fragment| !fragment.variable_definitions.is_empty())
    {
        return Err(Diagnostic::internal(
            format!(
                "Fragment `{}` reached the network text with unresolved local arguments",
                fragment.name
            ),
            Some(fragment.location.clone()),
        ));
    }

    let mut argumented = None;
    let selections = std::iter::once(&operation.selections)
        .chain(fragments.iter().map(|fragment| &fragment.selections));
    for selections in selections {
        for_each_spread(selections, &mut |spread| {
            if argumented.is_none() && !spread.arguments.is_empty() {
                argumented = Some(spread.clone());
            }
        });
    }
    if let Some(spread) = argumented {
        return Err(Diagnostic::internal(
            format!(
                "Spread of fragment `{}` reached the network text with arguments",
                spread.fragment_name
            ),
            Some(spread.location),
        ));
    }

    Ok(print_full_operation(program, operation))
}

/// Reader record of a fragment, taken from the reader pipeline's output.
#[instrument(level = "trace", skip_all, fields(fragment = %fragment.name))]
pub fn generate_fragment(fragment: &FragmentDefinition) -> Result<ReaderFragment, Diagnostic> {
    Ok(ReaderFragment {
        name: fragment.name.clone(),
        type_name: fragment.type_condition.clone(),
        abstract_key: fragment.abstract_key.clone(),
        argument_definitions: fragment
            .argument_definitions()
            .iter()
            .map(generate_argument_definition)
            .collect(),
        selections: generate_selections(&fragment.selections)?,
        metadata: connection_metadata(&fragment.selections),
    })
}

/// Request record of an operation.
///
/// `reader` and `normalization` are the same operation after the reader and
/// normalization pipelines; `text` is the network pipeline's printed text.
#[instrument(level = "trace", skip_all, fields(operation = %reader.name))]
pub fn generate_request(
    reader: &OperationDefinition,
    normalization: &OperationDefinition,
    text: String,
) -> Result<Request, Diagnostic> {
    Ok(Request {
        fragment: ReaderFragment {
            name: reader.name.clone(),
            type_name: reader.type_name.clone(),
            abstract_key: None,
            argument_definitions: operation_arguments(&reader.variable_definitions),
            selections: generate_selections(&reader.selections)?,
            metadata: connection_metadata(&reader.selections),
        },
        operation: NormalizationOperation {
            name: normalization.name.clone(),
            argument_definitions: operation_arguments(&normalization.variable_definitions),
            selections: generate_selections(&normalization.selections)?,
        },
        params: RequestParameters {
            cache_id: cache_id(&text),
            id: None,
            metadata: serde_json::Map::new(),
            name: reader.name.clone(),
            operation_kind: reader.kind.as_str().to_string(),
            text,
        },
    })
}

fn operation_arguments(definitions: &[VariableDefinition]) -> Vec<ArgumentDefinitionNode> {
    let mut sorted: Vec<&VariableDefinition> = definitions.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
        .into_iter()
        .map(|definition| ArgumentDefinitionNode::LocalArgument {
            name: definition.name.clone(),
            default_value: definition
                .default_value
                .as_ref()
                .map(|value| value.to_json())
                .unwrap_or(serde_json::Value::Null),
        })
        .collect()
}

fn generate_argument_definition(definition: &ArgumentDefinition) -> ArgumentDefinitionNode {
    match definition {
        ArgumentDefinition::Local {
            name,
            default_value,
            ..
        } => ArgumentDefinitionNode::LocalArgument {
            name: name.clone(),
            default_value: default_value
                .as_ref()
                .map(|value| value.to_json())
                .unwrap_or(serde_json::Value::Null),
        },
        ArgumentDefinition::Root { name, .. } => {
            ArgumentDefinitionNode::RootArgument { name: name.clone() }
        }
    }
}

fn generate_arguments(arguments: &[Argument]) -> Option<Vec<ArgumentNode>> {
    if arguments.is_empty() {
        return None;
    }
    let mut sorted: Vec<&Argument> = arguments.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    Some(
        sorted
            .into_iter()
            .map(|argument| generate_value(&argument.name, &argument.value))
            .collect(),
    )
}

fn generate_value(name: &str, value: &IrValue) -> ArgumentNode {
    match value {
        IrValue::Constant(value) => ArgumentNode::Literal {
            name: name.to_string(),
            value: value.to_json(),
        },
        IrValue::Variable(variable) => ArgumentNode::Variable {
            name: name.to_string(),
            variable_name: variable.name.clone(),
        },
        IrValue::List(items) => ArgumentNode::ListValue {
            name: name.to_string(),
            items: items
                .iter()
                .enumerate()
                .map(|(i, item)| generate_value(&format!("{}.{}", name, i), item))
                .collect(),
        },
        IrValue::Object(fields) => ArgumentNode::ObjectValue {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(field, value)| generate_value(field, value))
                .collect(),
        },
    }
}

fn require_storage_key(key: &str, name: &str, location: &Location) -> Result<String, Diagnostic> {
    if key.is_empty() {
        return Err(Diagnostic::internal(
            format!("Field `{}` reached code generation without a storage key", name),
            Some(location.clone()),
        ));
    }
    Ok(key.to_string())
}

fn generate_selections(selections: &[Selection]) -> Result<Vec<SelectionNode>, Diagnostic> {
    let mut out = Vec::with_capacity(selections.len());

    for selection in selections {
        match selection {
            Selection::ScalarField(field) => {
                out.push(SelectionNode::ScalarField(ScalarFieldNode {
                    alias: field.alias.clone(),
                    name: field.name.clone(),
                    args: generate_arguments(&field.arguments),
                    storage_key: require_storage_key(
                        &field.storage_key,
                        &field.name,
                        &field.location,
                    )?,
                }))
            }
            Selection::LinkedField(field) => {
                out.push(SelectionNode::LinkedField(LinkedFieldNode {
                    alias: field.alias.clone(),
                    name: field.name.clone(),
                    args: generate_arguments(&field.arguments),
                    concrete_type: field.concrete_type.clone(),
                    plural: field.plural,
                    selections: generate_selections(&field.selections)?,
                    storage_key: require_storage_key(
                        &field.storage_key,
                        &field.name,
                        &field.location,
                    )?,
                }))
            }
            Selection::InlineFragment(fragment) => {
                out.push(SelectionNode::InlineFragment(InlineFragmentNode {
                    type_condition: fragment.type_condition.clone(),
                    abstract_key: fragment.abstract_key.clone(),
                    selections: generate_selections(&fragment.selections)?,
                }))
            }
            Selection::FragmentSpread(spread) => {
                out.push(SelectionNode::FragmentSpread(FragmentSpreadNode {
                    name: spread.fragment_name.clone(),
                    args: generate_arguments(&spread.arguments),
                }))
            }
            Selection::Condition(condition) => match &condition.value {
                ConditionValue::Variable(variable) => {
                    out.push(SelectionNode::Condition(ConditionNode {
                        condition: variable.name.clone(),
                        passing_value: condition.passing_value,
                        selections: generate_selections(&condition.selections)?,
                    }))
                }
                // only reachable when the pipeline does not skip unreachable selections
                ConditionValue::Constant(_) => {
                    if condition.constant_outcome() == Some(true) {
                        out.extend(generate_selections(&condition.selections)?);
                    }
                }
            },
        }
    }

    Ok(out)
}

fn connection_metadata(selections: &[Selection]) -> Option<FragmentMetadata> {
    let mut connection = vec![];
    collect_connections(selections, &mut connection);
    if connection.is_empty() {
        None
    } else {
        Some(FragmentMetadata { connection })
    }
}

fn collect_connections(selections: &[Selection], out: &mut Vec<ConnectionNode>) {
    for selection in selections {
        if let Selection::LinkedField(field) = selection {
            if let Some(metadata) = &field.connection {
                out.push(ConnectionNode {
                    key: metadata.key.clone(),
                    count: metadata.count.clone(),
                    cursor: metadata.cursor.clone(),
                    direction: metadata.direction.as_str(),
                    filters: metadata.filters.clone(),
                    path: metadata.path.clone(),
                });
            }
        }
        if let Some(children) = selection.selections() {
            collect_connections(children, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hive_compiler_config::pipelines::{PassId, PipelinesConfig};
    use serde_json::json;

    use super::{cache_id, generate_fragment, generate_request, generate_selections, generate_text};
    use crate::ir::{Location, ScalarField, Selection, SourceId};
    use crate::printer::print_full_operation;
    use crate::schema::TypeReference;
    use crate::tests::testkit::{bind_program, test_schema};
    use crate::transforms::{transform, PassContext};

    #[test]
    fn request_record_mirrors_the_pipelines() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q($size: Int = 64, $withAge: Boolean!) {
              me {
                name
                age @include(if: $withAge)
                profilePicture(size: $size) { url }
              }
              viewer { ...ActorName }
            }
            fragment ActorName on Actor { name }
            "#,
        );
        let pipelines = PipelinesConfig::default();
        let reader = transform(&program, &pipelines.reader, &PassContext::default())
            .expect("reader pipeline");
        let normalization =
            transform(&program, &pipelines.normalization, &PassContext::default())
                .expect("normalization pipeline");
        let network = transform(&program, &pipelines.network, &PassContext::default())
            .expect("network pipeline");

        let network_operation = network.operation("Q").expect("operation");
        let text = print_full_operation(&network, network_operation);
        let request = generate_request(
            reader.operation("Q").expect("operation"),
            normalization.operation("Q").expect("operation"),
            text.clone(),
        )
        .expect("codegen");

        let value = serde_json::to_value(&request).expect("to serialize");
        assert_eq!(value["kind"], "Request");
        assert_eq!(value["params"]["cacheID"], json!(cache_id(&text)));
        assert_eq!(value["params"]["operationKind"], "query");
        assert_eq!(
            value["fragment"]["argumentDefinitions"],
            json!([
                {"kind": "LocalArgument", "name": "size", "defaultValue": 64},
                {"kind": "LocalArgument", "name": "withAge", "defaultValue": null},
            ])
        );
        assert_eq!(
            value["fragment"]["selections"][0]["selections"],
            json!([
                {"kind": "ScalarField", "alias": null, "name": "name", "args": null, "storageKey": "name"},
                {
                    "kind": "Condition",
                    "condition": "withAge",
                    "passingValue": true,
                    "selections": [
                        {"kind": "ScalarField", "alias": null, "name": "age", "args": null, "storageKey": "age"}
                    ]
                },
                {
                    "kind": "LinkedField",
                    "alias": null,
                    "name": "profilePicture",
                    "args": [{"kind": "Variable", "name": "size", "variableName": "size"}],
                    "concreteType": "Photo",
                    "plural": false,
                    "selections": [
                        {"kind": "ScalarField", "alias": null, "name": "url", "args": null, "storageKey": "url"}
                    ],
                    "storageKey": "profilePicture(size:$size)"
                }
            ])
        );
        assert_eq!(
            value["fragment"]["selections"][1]["selections"],
            json!([{"kind": "FragmentSpread", "name": "ActorName", "args": null}])
        );
        assert_eq!(
            value["operation"]["selections"][1]["selections"],
            json!([
                {"kind": "ScalarField", "alias": null, "name": "__typename", "args": null, "storageKey": "__typename"},
                {"kind": "ScalarField", "alias": "__isActor", "name": "__typename", "args": null, "storageKey": "__isActor:__typename"},
                {"kind": "ScalarField", "alias": null, "name": "name", "args": null, "storageKey": "name"}
            ])
        );
    }

    #[test]
    fn fragment_record_lists_arguments_and_connections() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            fragment Friends on User @argumentDefinitions(count: {type: "Int", defaultValue: 10}) {
              friends(first: $count, after: $cursor) @connection(key: "Friends_friends") {
                edges { node { name } }
              }
            }
            "#,
        );
        let reader = transform(
            &program,
            &PipelinesConfig::default().reader,
            &PassContext::default(),
        )
        .expect("reader pipeline");

        let record = generate_fragment(reader.fragment("Friends").expect("fragment"))
            .expect("codegen");
        let value = serde_json::to_value(&record).expect("to serialize");

        assert_eq!(value["kind"], "Fragment");
        assert_eq!(value["type"], "User");
        assert_eq!(
            value["argumentDefinitions"],
            json!([
                {"kind": "LocalArgument", "name": "count", "defaultValue": 10},
                {"kind": "RootArgument", "name": "cursor"},
            ])
        );
        assert_eq!(
            value["metadata"],
            json!({"connection": [{
                "key": "Friends_friends",
                "count": "count",
                "cursor": "cursor",
                "direction": "forward",
                "filters": [],
                "path": ["friends"],
            }]})
        );
        assert_eq!(
            value["selections"][0]["storageKey"],
            "friends(after:$cursor,first:$count)"
        );
    }

    const SIZED_PICTURE: &str = r#"
        query Q { me { ...Picture @arguments(size: 64) } }
        fragment Picture on User @argumentDefinitions(size: {type: "Int", defaultValue: 32}) {
          profilePicture(size: $size) { url }
        }
    "#;

    #[test]
    fn network_text_has_no_fragment_arguments() {
        let schema = test_schema();
        let program = bind_program(&schema, SIZED_PICTURE);
        let network = transform(
            &program,
            &PipelinesConfig::default().network,
            &PassContext::default(),
        )
        .expect("network pipeline");

        let text = generate_text(&network, network.operation("Q").expect("operation"))
            .expect("network text");
        assert!(!text.contains("@argumentDefinitions"), "{}", text);
        assert!(!text.contains("@arguments"), "{}", text);
        assert!(text.contains("profilePicture(size: 64)"), "{}", text);
    }

    #[test]
    fn unspecialized_fragments_are_an_internal_error() {
        let schema = test_schema();
        let program = bind_program(&schema, SIZED_PICTURE);
        let network = transform(&program, &[PassId::StripDirectives], &PassContext::default())
            .expect("network pipeline");

        let error = generate_text(&network, network.operation("Q").expect("operation"))
            .expect_err("to fail");
        assert_eq!(error.kind, crate::diagnostics::DiagnosticKind::Internal);
        assert_eq!(
            error.message,
            "Fragment `Picture` reached the network text with unresolved local arguments"
        );
    }

    #[test]
    fn fragments_on_abstract_types_carry_an_abstract_key() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            fragment OnActor on Actor { name }
            fragment OnResult on SearchResult { __typename }
            fragment OnUser on User { id }
            "#,
        );

        let abstract_key = |name: &str| {
            let record = generate_fragment(program.fragment(name).expect("fragment"))
                .expect("codegen");
            serde_json::to_value(&record).expect("to serialize")["abstractKey"].clone()
        };
        assert_eq!(abstract_key("OnActor"), json!("__isActor"));
        assert_eq!(abstract_key("OnResult"), json!("__isSearchResult"));
        assert_eq!(abstract_key("OnUser"), json!(null));
    }

    #[test]
    fn missing_storage_key_is_an_internal_error() {
        let selection = Selection::ScalarField(Arc::new(ScalarField {
            alias: None,
            name: "name".to_string(),
            parent_type: "User".to_string(),
            field_type: TypeReference::named("String"),
            arguments: vec![],
            directives: vec![],
            storage_key: String::new(),
            location: Location::new(SourceId::new("test.graphql"), Default::default()),
        }));

        let error = generate_selections(&[selection]).expect_err("to fail");
        assert_eq!(error.kind, crate::diagnostics::DiagnosticKind::Internal);
        assert_eq!(
            error.message,
            "Field `name` reached code generation without a storage key"
        );
    }

    #[test]
    fn output_is_stable() {
        let schema = test_schema();
        let text = "query Q { me { name best_friend { id } } }";
        let first = generate_fragment_json(&bind_program(&schema, text));
        let second = generate_fragment_json(&bind_program(&schema, text));
        assert_eq!(first, second);
    }

    fn generate_fragment_json(program: &crate::ir::Program) -> String {
        let operation = program.operation("Q").expect("operation");
        let request =
            generate_request(operation, operation, "text".to_string()).expect("codegen");
        serde_json::to_string(&request).expect("to serialize")
    }
}
