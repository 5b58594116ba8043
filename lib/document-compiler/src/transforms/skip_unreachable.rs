use std::sync::Arc;

use tracing::{instrument, trace};

use crate::diagnostics::Diagnostic;
use crate::ir::{
    Condition, FragmentDefinition, InlineFragment, LinkedField, OperationDefinition, Program,
    Selection, TransformedValue,
};
use crate::schema::SchemaModel;
use crate::transforms::PassContext;

/// This pass removes selections that can never be part of a response.
///
/// The process involves:
/// 1. Dropping conditions whose value is a constant that fails, and inlining
///    the ones that always pass.
/// 2. Tracking the object types possible at each point, narrowed by every
///    enclosing type condition, and dropping inline fragments and spreads
///    whose type shares none of them.
/// 3. Dropping linked fields, inline fragments and conditions left without
///    selections.
#[instrument(level = "trace", skip_all)]
pub fn skip_unreachable(
    program: &Program,
    _ctx: &PassContext,
) -> Result<Program, Vec<Diagnostic>> {
    let schema = program.schema.as_ref();
    let mut next = program.empty_like();
    let mut changed = 0;

    for operation in program.operations() {
        let possible = schema.possible_types(&operation.type_name).to_vec();
        match skip_selections(schema, &operation.selections, &possible) {
            TransformedValue::Keep => next.insert_operation(operation.clone()),
            TransformedValue::Replace(selections) => {
                changed += 1;
                next.insert_operation(Arc::new(OperationDefinition {
                    selections,
                    ..operation.as_ref().clone()
                }))
            }
        }
    }

    for fragment in program.fragments() {
        let possible = schema.possible_types(&fragment.type_condition).to_vec();
        match skip_selections(schema, &fragment.selections, &possible) {
            TransformedValue::Keep => next.insert_fragment(fragment.clone()),
            TransformedValue::Replace(selections) => {
                changed += 1;
                next.insert_fragment(Arc::new(FragmentDefinition {
                    selections,
                    ..fragment.as_ref().clone()
                }))
            }
        }
    }

    trace!(changed, "removed unreachable selections");
    Ok(next)
}

/// `possible` narrowed to the object types of `type_name`.
fn narrow(schema: &SchemaModel, possible: &[String], type_name: &str) -> Vec<String> {
    let candidates = schema.possible_types(type_name);
    possible
        .iter()
        .filter(|name| candidates.binary_search(*name).is_ok())
        .cloned()
        .collect()
}

fn skip_selections(
    schema: &SchemaModel,
    selections: &[Selection],
    possible: &[String],
) -> TransformedValue<Vec<Selection>> {
    let mut out = Vec::with_capacity(selections.len());
    let mut changed = false;

    for selection in selections {
        match selection {
            Selection::ScalarField(_) => out.push(selection.clone()),
            Selection::LinkedField(field) => {
                let field_possible = schema.possible_types(field.type_name()).to_vec();
                match skip_selections(schema, &field.selections, &field_possible) {
                    TransformedValue::Keep => out.push(selection.clone()),
                    TransformedValue::Replace(selections) => {
                        changed = true;
                        if !selections.is_empty() {
                            out.push(Selection::LinkedField(Arc::new(LinkedField {
                                selections,
                                ..field.as_ref().clone()
                            })));
                        }
                    }
                }
            }
            Selection::InlineFragment(fragment) => {
                let narrowed = match &fragment.type_condition {
                    Some(type_condition) => narrow(schema, possible, type_condition),
                    None => possible.to_vec(),
                };
                if narrowed.is_empty() {
                    changed = true;
                    continue;
                }
                match skip_selections(schema, &fragment.selections, &narrowed) {
                    TransformedValue::Keep => out.push(selection.clone()),
                    TransformedValue::Replace(selections) => {
                        changed = true;
                        if !selections.is_empty() {
                            out.push(Selection::InlineFragment(Arc::new(InlineFragment {
                                selections,
                                ..fragment.as_ref().clone()
                            })));
                        }
                    }
                }
            }
            Selection::FragmentSpread(spread) => {
                if narrow(schema, possible, &spread.type_condition).is_empty() {
                    changed = true;
                } else {
                    out.push(selection.clone());
                }
            }
            Selection::Condition(condition) => match condition.constant_outcome() {
                Some(false) => changed = true,
                Some(true) => {
                    changed = true;
                    out.extend(
                        skip_selections(schema, &condition.selections, possible)
                            .replace_or_else(|| condition.selections.clone()),
                    );
                }
                None => match skip_selections(schema, &condition.selections, possible) {
                    TransformedValue::Keep => out.push(selection.clone()),
                    TransformedValue::Replace(selections) => {
                        changed = true;
                        if !selections.is_empty() {
                            out.push(Selection::Condition(Arc::new(Condition {
                                selections,
                                ..condition.as_ref().clone()
                            })));
                        }
                    }
                },
            },
        }
    }

    if changed {
        TransformedValue::Replace(out)
    } else {
        TransformedValue::Keep
    }
}

#[cfg(test)]
mod tests {
    use crate::printer::print_program;
    use crate::tests::testkit::{bind_program, test_schema};
    use crate::transforms::{skip_unreachable, PassContext};

    #[test]
    fn removes_constant_conditions() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q($show: Boolean!) {
              me {
                name @include(if: false)
                age @skip(if: false)
                best_friend @include(if: false) { name }
                id @include(if: $show)
                status @skip(if: true) @include(if: $show)
              }
            }
            "#,
        );

        let result = skip_unreachable(&program, &PassContext::default()).expect("to run");
        insta::assert_snapshot!(print_program(&result), @r"
        query Q($show: Boolean!) {
          me {
            age
            id @include(if: $show)
          }
        }
        ");
    }

    #[test]
    fn removes_impossible_type_conditions() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q {
              me {
                ... on Node { id ... on Page { likers } }
                ... on Actor { ...PageName }
              }
            }
            fragment PageName on Page { name }
            "#,
        );

        let result = skip_unreachable(&program, &PassContext::default()).expect("to run");
        insta::assert_snapshot!(print_program(&result), @r"
        query Q {
          me {
            ... on Node {
              id
            }
          }
        }

        fragment PageName on Page {
          name
        }
        ");
    }

    #[test]
    fn empty_parents_are_removed() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q {
              me { name best_friend { ... on Node { ... on Page { likers } } } }
            }
            "#,
        );

        let result = skip_unreachable(&program, &PassContext::default()).expect("to run");
        insta::assert_snapshot!(print_program(&result), @r"
        query Q {
          me {
            name
          }
        }
        ");
    }
}
