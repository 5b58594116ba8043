use std::sync::Arc;

use tracing::{instrument, trace};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{
    ConnectionDirection, ConnectionMetadata, ConstantValue, IrValue, LinkedField, Location,
    Program, ScalarField, Selection, Transformed, Transformer,
};
use crate::schema::{FieldDefinition, SchemaModel};
use crate::transforms::{typename_selection, PassContext};

const PAGE_INFO_FIELDS: [&str; 4] = ["endCursor", "hasNextPage", "hasPreviousPage", "startCursor"];
const PAGINATION_ARGUMENTS: [&str; 4] = ["after", "before", "first", "last"];

/// This pass expands fields annotated with `@connection`.
///
/// For every such field:
/// 1. The field type is checked to follow the connection shape: `edges` as a
///    list of edges exposing `cursor` and `node`, and `pageInfo`.
/// 2. The selections the runtime needs to paginate are added where the user
///    did not select them: `edges { cursor node { __typename } }` and
///    `pageInfo { endCursor hasNextPage hasPreviousPage startCursor }`.
/// 3. [`ConnectionMetadata`] is attached, marking the field as expanded so a
///    second run leaves it alone.
#[instrument(level = "trace", skip_all)]
pub fn connections(program: &Program, _ctx: &PassContext) -> Result<Program, Vec<Diagnostic>> {
    let mut transform = ConnectionTransform {
        schema: &program.schema,
        path: vec![],
        expanded: 0,
        errors: vec![],
    };
    let next = transform.transform_program(program);

    if !transform.errors.is_empty() {
        return Err(transform.errors);
    }

    trace!(expanded = transform.expanded, "expanded connections");
    Ok(next.replace_or_else(|| program.clone()))
}

struct ConnectionTransform<'a> {
    schema: &'a SchemaModel,
    /// Response keys from the definition root to the current field.
    path: Vec<String>,
    expanded: usize,
    errors: Vec<Diagnostic>,
}

/// Schema fields a connection is read through.
struct ConnectionShape<'a> {
    edges: &'a FieldDefinition,
    cursor: &'a FieldDefinition,
    node: &'a FieldDefinition,
    page_info: &'a FieldDefinition,
    page_info_fields: Vec<&'a FieldDefinition>,
}

impl<'a> ConnectionTransform<'a> {
    fn error(&mut self, message: String, location: &Location) {
        self.errors.push(Diagnostic::error(
            DiagnosticKind::Transform,
            message,
            location.clone(),
        ));
    }

    fn shape(&mut self, field: &LinkedField) -> Option<ConnectionShape<'a>> {
        let schema = self.schema;
        let coordinate = format!("{}.{}", field.parent_type, field.name);
        let connection_type = field.type_name();

        let (Some(edges), Some(page_info)) = (
            schema.field(connection_type, "edges"),
            schema.field(connection_type, "pageInfo"),
        ) else {
            self.error(
                format!(
                    "Expected field `{}` to return a connection type with `edges` and `pageInfo` fields, found `{}`",
                    coordinate, connection_type
                ),
                &field.location,
            );
            return None;
        };

        if !edges.field_type.is_list() {
            self.error(
                format!(
                    "Expected `{}` to be a list of edges, found `{}`",
                    edges.coordinate(),
                    edges.field_type
                ),
                &field.location,
            );
            return None;
        }

        let edge_type = edges.field_type.inner_type();
        let (Some(cursor), Some(node)) = (
            schema.field(edge_type, "cursor"),
            schema.field(edge_type, "node"),
        ) else {
            self.error(
                format!(
                    "Expected edge type `{}` to have `cursor` and `node` fields",
                    edge_type
                ),
                &field.location,
            );
            return None;
        };

        let page_info_type = page_info.field_type.inner_type();
        let mut page_info_fields = Vec::with_capacity(PAGE_INFO_FIELDS.len());
        for name in PAGE_INFO_FIELDS {
            match schema.field(page_info_type, name) {
                Some(definition) => page_info_fields.push(definition),
                None => {
                    self.error(
                        format!(
                            "Expected page info type `{}` to have a `{}` field",
                            page_info_type, name
                        ),
                        &field.location,
                    );
                    return None;
                }
            }
        }

        Some(ConnectionShape {
            edges,
            cursor,
            node,
            page_info,
            page_info_fields,
        })
    }

    fn metadata(&mut self, field: &LinkedField) -> Option<ConnectionMetadata> {
        let coordinate = format!("{}.{}", field.parent_type, field.name);
        let directive = field.directive("connection")?;

        let key = directive
            .argument("key")
            .and_then(|argument| argument.value.as_constant())
            .and_then(ConstantValue::as_str);
        let Some(key) = key else {
            self.error(
                format!(
                    "Expected the `key` of `@connection` on `{}` to be a constant string",
                    coordinate
                ),
                &directive.location,
            );
            return None;
        };

        let forward = field.argument("first");
        let backward = field.argument("last");
        let direction = match (forward.is_some(), backward.is_some()) {
            (true, true) => ConnectionDirection::Bidirectional,
            (true, false) => ConnectionDirection::Forward,
            (false, true) => ConnectionDirection::Backward,
            (false, false) => {
                self.error(
                    format!(
                        "Expected field `{}` to be passed a `first` or `last` argument",
                        coordinate
                    ),
                    &field.location,
                );
                return None;
            }
        };

        let variable_name = |name: &str| match field.argument(name).map(|arg| &arg.value) {
            Some(IrValue::Variable(variable)) => Some(variable.name.clone()),
            _ => None,
        };
        let (count, cursor) = match direction {
            ConnectionDirection::Backward => (variable_name("last"), variable_name("before")),
            _ => (variable_name("first"), variable_name("after")),
        };

        let filters = match directive
            .argument("filters")
            .and_then(|argument| argument.value.as_constant())
        {
            Some(ConstantValue::List(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => {
                let mut filters: Vec<String> = field
                    .arguments
                    .iter()
                    .map(|argument| argument.name.clone())
                    .filter(|name| !PAGINATION_ARGUMENTS.contains(&name.as_str()))
                    .collect();
                filters.sort();
                filters
            }
        };

        Some(ConnectionMetadata {
            key: key.to_string(),
            direction,
            cursor,
            count,
            filters,
            path: self.path.clone(),
        })
    }

    fn expand(&mut self, field: &LinkedField) -> Transformed<Selection> {
        let mut selections = self
            .transform_selections(&field.selections)
            .replace_or_else(|| field.selections.clone());

        let (Some(shape), Some(metadata)) = (self.shape(field), self.metadata(field)) else {
            return Transformed::Keep;
        };

        let Some(edges_index) = find_unaliased(&selections, "edges") else {
            self.error(
                format!(
                    "Expected field `{}.{}` to select `edges`",
                    field.parent_type, field.name
                ),
                &field.location,
            );
            return Transformed::Keep;
        };

        let location = &field.location;
        let schema = self.schema;

        if let Selection::LinkedField(edges) = &selections[edges_index] {
            let edge_type = shape.edges.field_type.inner_type();
            let mut edge_selections = edges.selections.clone();
            push_missing(
                &mut edge_selections,
                scalar_selection(edge_type, shape.cursor, location),
            );

            let node_type = shape.node.field_type.inner_type();
            match find_unaliased(&edge_selections, "node") {
                Some(node_index) => {
                    if let Selection::LinkedField(node) = &edge_selections[node_index] {
                        let mut node_selections = node.selections.clone();
                        push_missing(
                            &mut node_selections,
                            typename_selection(node_type, None, location),
                        );
                        edge_selections[node_index] = with_selections(node, node_selections);
                    }
                }
                None => edge_selections.push(linked_selection(
                    schema,
                    edge_type,
                    shape.node,
                    vec![typename_selection(node_type, None, location)],
                    location,
                )),
            }

            selections[edges_index] = with_selections(edges, edge_selections);
        }

        let page_info_type = shape.page_info.field_type.inner_type();
        let page_info_fields: Vec<Selection> = shape
            .page_info_fields
            .iter()
            .map(|definition| scalar_selection(page_info_type, definition, location))
            .collect();

        match find_unaliased(&selections, "pageInfo") {
            Some(index) => {
                if let Selection::LinkedField(page_info) = &selections[index] {
                    let mut page_info_selections = page_info.selections.clone();
                    for selection in page_info_fields {
                        push_missing(&mut page_info_selections, selection);
                    }
                    selections[index] = with_selections(page_info, page_info_selections);
                }
            }
            None => selections.push(linked_selection(
                schema,
                field.type_name(),
                shape.page_info,
                page_info_fields,
                location,
            )),
        }

        self.expanded += 1;
        Transformed::Replace(Selection::LinkedField(Arc::new(LinkedField {
            selections,
            connection: Some(metadata),
            ..field.clone()
        })))
    }
}

impl Transformer for ConnectionTransform<'_> {
    const NAME: &'static str = "ConnectionTransform";

    fn transform_linked_field(&mut self, field: &LinkedField) -> Transformed<Selection> {
        self.path.push(field.response_key().to_string());
        let result = if field.connection.is_none() && field.directive("connection").is_some() {
            self.expand(field)
        } else {
            self.default_transform_linked_field(field)
        };
        self.path.pop();
        result
    }
}

fn find_unaliased(selections: &[Selection], name: &str) -> Option<usize> {
    selections.iter().position(|selection| {
        matches!(selection, Selection::LinkedField(field) if field.alias.is_none() && field.name == name)
    })
}

/// Appends `selection` unless a sibling already has its storage key.
fn push_missing(selections: &mut Vec<Selection>, selection: Selection) {
    let key = selection.storage_key();
    let exists = selections
        .iter()
        .any(|existing| key.is_some() && existing.storage_key() == key);
    if !exists {
        selections.push(selection);
    }
}

fn with_selections(field: &LinkedField, selections: Vec<Selection>) -> Selection {
    Selection::LinkedField(Arc::new(LinkedField {
        selections,
        ..field.clone()
    }))
}

fn scalar_selection(
    parent_type: &str,
    definition: &FieldDefinition,
    location: &Location,
) -> Selection {
    Selection::ScalarField(Arc::new(ScalarField {
        alias: None,
        name: definition.name.clone(),
        parent_type: parent_type.to_string(),
        field_type: definition.field_type.clone(),
        arguments: vec![],
        directives: vec![],
        storage_key: definition.name.clone(),
        location: location.clone(),
    }))
}

fn linked_selection(
    schema: &SchemaModel,
    parent_type: &str,
    definition: &FieldDefinition,
    selections: Vec<Selection>,
    location: &Location,
) -> Selection {
    let type_name = definition.field_type.inner_type();
    Selection::LinkedField(Arc::new(LinkedField {
        alias: None,
        name: definition.name.clone(),
        parent_type: parent_type.to_string(),
        field_type: definition.field_type.clone(),
        concrete_type: schema.is_object(type_name).then(|| type_name.to_string()),
        plural: definition.field_type.is_list(),
        arguments: vec![],
        directives: vec![],
        storage_key: definition.name.clone(),
        selections,
        connection: None,
        location: location.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::ir::{ConnectionDirection, Selection};
    use crate::printer::print_program;
    use crate::tests::testkit::{bind_program, test_schema};
    use crate::transforms::{connections, PassContext};

    const FRIENDS: &str = r#"
        query Friends($count: Int, $cursor: String) {
          me {
            friends(first: $count, after: $cursor, orderBy: "name") @connection(key: "Friends_friends") {
              edges { node { name } }
            }
          }
        }
    "#;

    #[test]
    fn synthesizes_pagination_selections() {
        let schema = test_schema();
        let program = bind_program(&schema, FRIENDS);
        let result = connections(&program, &PassContext::default()).expect("to expand");

        insta::assert_snapshot!(print_program(&result), @r#"
        query Friends($count: Int, $cursor: String) {
          me {
            friends(after: $cursor, first: $count, orderBy: "name") @connection(key: "Friends_friends") {
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
        "#);
    }

    #[test]
    fn attaches_metadata() {
        let schema = test_schema();
        let program = bind_program(&schema, FRIENDS);
        let result = connections(&program, &PassContext::default()).expect("to expand");
        let operation = result.operation("Friends").expect("operation");

        let Selection::LinkedField(me) = &operation.selections[0] else {
            panic!("expected `me`");
        };
        let Selection::LinkedField(friends) = &me.selections[0] else {
            panic!("expected `friends`");
        };
        let metadata = friends.connection.as_ref().expect("metadata");
        assert_eq!(metadata.key, "Friends_friends");
        assert_eq!(metadata.direction, ConnectionDirection::Forward);
        assert_eq!(metadata.count.as_deref(), Some("count"));
        assert_eq!(metadata.cursor.as_deref(), Some("cursor"));
        assert_eq!(metadata.filters, vec!["orderBy".to_string()]);
        assert_eq!(metadata.path, vec!["me".to_string(), "friends".to_string()]);
    }

    #[test]
    fn second_run_changes_nothing() {
        let schema = test_schema();
        let program = bind_program(&schema, FRIENDS);
        let ctx = PassContext::default();
        let once = connections(&program, &ctx).expect("to expand");
        let twice = connections(&once, &ctx).expect("to expand again");
        assert_eq!(print_program(&once), print_program(&twice));
    }

    #[test]
    fn rejects_malformed_connections() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query A { me { friends(first: 10) @connection(key: "A_friends") { totalCount } } }
            query B { me { best_friend @connection(key: "B_friend") { name } } }
            query C { me { friends @connection(key: "C_friends") { edges { cursor } } } }
            "#,
        );
        let errors: Vec<String> = connections(&program, &PassContext::default())
            .expect_err("to fail")
            .into_iter()
            .map(|diagnostic| diagnostic.message)
            .collect();

        insta::assert_snapshot!(errors.join("\n"), @r"
        Expected field `User.friends` to select `edges`
        Expected field `User.best_friend` to return a connection type with `edges` and `pageInfo` fields, found `User`
        Expected field `User.best_friend` to be passed a `first` or `last` argument
        Expected field `User.friends` to be passed a `first` or `last` argument
        ");
    }
}
