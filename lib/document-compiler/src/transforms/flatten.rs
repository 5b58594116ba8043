use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{
    storage_key, Condition, ConditionValue, FragmentDefinition, InlineFragment, LinkedField,
    OperationDefinition, Program, Selection, TransformedValue,
};
use crate::schema::SchemaModel;
use crate::transforms::PassContext;

/// This pass merges selections that read the same data.
///
/// The process involves:
/// 1. Inlining inline fragments without directives whose type condition is
///    absent or equal to the parent type.
/// 2. Merging siblings in first-occurrence order: fields with the same storage
///    key (their children are concatenated), inline fragments with the same
///    type condition, conditions on the same value, and identical spreads.
/// 3. Recursing into the merged children.
///
/// Fields sharing a response key but not a storage key would overwrite each
/// other in the response and are reported.
#[instrument(level = "trace", skip_all)]
pub fn flatten(program: &Program, _ctx: &PassContext) -> Result<Program, Vec<Diagnostic>> {
    run(program, false)
}

/// Like [`flatten`], additionally inlining inline fragments on interfaces and
/// unions into their parent.
#[instrument(level = "trace", skip_all)]
pub fn flatten_abstract_types(
    program: &Program,
    _ctx: &PassContext,
) -> Result<Program, Vec<Diagnostic>> {
    run(program, true)
}

fn run(program: &Program, flatten_abstract_types: bool) -> Result<Program, Vec<Diagnostic>> {
    let mut flattener = Flattener {
        schema: &program.schema,
        flatten_abstract_types,
        errors: vec![],
    };
    let mut next = program.empty_like();

    for operation in program.operations() {
        match flattener.flatten_selections(&operation.selections, &operation.type_name) {
            TransformedValue::Keep => next.insert_operation(operation.clone()),
            TransformedValue::Replace(selections) => {
                next.insert_operation(Arc::new(OperationDefinition {
                    selections,
                    ..operation.as_ref().clone()
                }))
            }
        }
    }

    for fragment in program.fragments() {
        match flattener.flatten_selections(&fragment.selections, &fragment.type_condition) {
            TransformedValue::Keep => next.insert_fragment(fragment.clone()),
            TransformedValue::Replace(selections) => {
                next.insert_fragment(Arc::new(FragmentDefinition {
                    selections,
                    ..fragment.as_ref().clone()
                }))
            }
        }
    }

    if !flattener.errors.is_empty() {
        return Err(flattener.errors);
    }

    Ok(next)
}

struct Flattener<'a> {
    schema: &'a SchemaModel,
    flatten_abstract_types: bool,
    errors: Vec<Diagnostic>,
}

impl Flattener<'_> {
    fn flatten_selections(
        &mut self,
        selections: &[Selection],
        parent_type: &str,
    ) -> TransformedValue<Vec<Selection>> {
        let mut collected = Vec::with_capacity(selections.len());
        self.collect(selections, parent_type, &mut collected);

        let merged: Vec<Selection> = self
            .merge(collected)
            .into_iter()
            .map(|selection| self.flatten_children(selection, parent_type))
            .collect();

        if merged.as_slice() == selections {
            TransformedValue::Keep
        } else {
            TransformedValue::Replace(merged)
        }
    }

    fn can_inline(&self, fragment: &InlineFragment, parent_type: &str) -> bool {
        if !fragment.directives.is_empty() {
            return false;
        }
        match &fragment.type_condition {
            None => true,
            Some(type_condition) => {
                type_condition == parent_type
                    || (self.flatten_abstract_types && self.schema.is_abstract(type_condition))
            }
        }
    }

    fn collect(&self, selections: &[Selection], parent_type: &str, out: &mut Vec<Selection>) {
        for selection in selections {
            match selection {
                Selection::InlineFragment(fragment) if self.can_inline(fragment, parent_type) => {
                    self.collect(&fragment.selections, parent_type, out)
                }
                _ => out.push(selection.clone()),
            }
        }
    }

    fn merge(&mut self, collected: Vec<Selection>) -> Vec<Selection> {
        let mut merged: Vec<Selection> = Vec::with_capacity(collected.len());
        let mut by_response_key: HashMap<String, usize> = HashMap::new();
        let mut by_merge_key: HashMap<String, usize> = HashMap::new();

        for selection in collected {
            match &selection {
                Selection::ScalarField(_) | Selection::LinkedField(_) => {
                    let response_key = selection.response_key().unwrap_or_default().to_string();
                    let Some(&index) = by_response_key.get(&response_key) else {
                        by_response_key.insert(response_key, merged.len());
                        merged.push(selection);
                        continue;
                    };

                    if merged[index].storage_key() != selection.storage_key() {
                        self.conflict(&response_key, &merged[index], &selection);
                        continue;
                    }

                    if let (Selection::LinkedField(existing), Selection::LinkedField(field)) =
                        (&merged[index], &selection)
                    {
                        let selections = existing
                            .selections
                            .iter()
                            .chain(field.selections.iter())
                            .cloned()
                            .collect();
                        merged[index] = Selection::LinkedField(Arc::new(LinkedField {
                            selections,
                            ..existing.as_ref().clone()
                        }));
                    }
                }
                Selection::InlineFragment(fragment) if fragment.directives.is_empty() => {
                    let key = format!(
                        "inline:{}",
                        fragment.type_condition.as_deref().unwrap_or_default()
                    );
                    match by_merge_key.get(&key) {
                        Some(&index) => {
                            if let Selection::InlineFragment(existing) = &merged[index] {
                                let selections = existing
                                    .selections
                                    .iter()
                                    .chain(fragment.selections.iter())
                                    .cloned()
                                    .collect();
                                merged[index] =
                                    Selection::InlineFragment(Arc::new(InlineFragment {
                                        selections,
                                        ..existing.as_ref().clone()
                                    }));
                            }
                        }
                        None => {
                            by_merge_key.insert(key, merged.len());
                            merged.push(selection);
                        }
                    }
                }
                Selection::Condition(condition) => {
                    let key = condition_key(condition);
                    match by_merge_key.get(&key) {
                        Some(&index) => {
                            if let Selection::Condition(existing) = &merged[index] {
                                let selections = existing
                                    .selections
                                    .iter()
                                    .chain(condition.selections.iter())
                                    .cloned()
                                    .collect();
                                merged[index] = Selection::Condition(Arc::new(Condition {
                                    selections,
                                    ..existing.as_ref().clone()
                                }));
                            }
                        }
                        None => {
                            by_merge_key.insert(key, merged.len());
                            merged.push(selection);
                        }
                    }
                }
                Selection::FragmentSpread(_) | Selection::InlineFragment(_) => {
                    if !merged.contains(&selection) {
                        merged.push(selection);
                    }
                }
            }
        }

        merged
    }

    fn flatten_children(&mut self, selection: Selection, parent_type: &str) -> Selection {
        match &selection {
            Selection::LinkedField(field) => {
                match self.flatten_selections(&field.selections, field.type_name()) {
                    TransformedValue::Keep => selection,
                    TransformedValue::Replace(selections) => {
                        Selection::LinkedField(Arc::new(LinkedField {
                            selections,
                            ..field.as_ref().clone()
                        }))
                    }
                }
            }
            Selection::InlineFragment(fragment) => {
                let type_name = fragment.type_condition.as_deref().unwrap_or(parent_type);
                match self.flatten_selections(&fragment.selections, type_name) {
                    TransformedValue::Keep => selection,
                    TransformedValue::Replace(selections) => {
                        Selection::InlineFragment(Arc::new(InlineFragment {
                            selections,
                            ..fragment.as_ref().clone()
                        }))
                    }
                }
            }
            Selection::Condition(condition) => {
                match self.flatten_selections(&condition.selections, parent_type) {
                    TransformedValue::Keep => selection,
                    TransformedValue::Replace(selections) => {
                        Selection::Condition(Arc::new(Condition {
                            selections,
                            ..condition.as_ref().clone()
                        }))
                    }
                }
            }
            Selection::ScalarField(_) | Selection::FragmentSpread(_) => selection,
        }
    }

    fn conflict(&mut self, response_key: &str, existing: &Selection, selection: &Selection) {
        self.errors.push(
            Diagnostic::error(
                DiagnosticKind::Transform,
                format!(
                    "The response key `{}` is used for the different selections `{}` and `{}`",
                    response_key,
                    describe(existing),
                    describe(selection)
                ),
                selection.location().clone(),
            )
            .with_related(existing.location().clone()),
        );
    }
}

/// Field name and arguments, without the alias.
fn describe(selection: &Selection) -> String {
    match selection {
        Selection::ScalarField(field) => storage_key(None, &field.name, &field.arguments),
        Selection::LinkedField(field) => storage_key(None, &field.name, &field.arguments),
        other => other.kind_name().to_string(),
    }
}

fn condition_key(condition: &Condition) -> String {
    let value = match &condition.value {
        ConditionValue::Variable(variable) => format!("${}", variable.name),
        ConditionValue::Constant(value) => value.to_string(),
    };
    format!("condition:{}:{}", condition.passing_value, value)
}
