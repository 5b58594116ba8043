use std::collections::HashSet;

use graphql_syntax::Span;
use indexmap::IndexMap;

use crate::build::Builder;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{
    Argument, ConditionValue, IrValue, OperationDefinition, Program, Selection, Variable,
    VariableDefinition,
};
use crate::schema::TypeReference;

#[derive(Debug)]
enum ScopeKind {
    Operation(String),
    Fragment(String),
    Constant,
}

/// Variables visible while binding one definition.
#[derive(Debug)]
pub(crate) struct Scope {
    kind: ScopeKind,
    defined: IndexMap<String, VariableDefinition>,
    /// Fragment variables that are not local arguments, by first use.
    inferred: IndexMap<String, VariableDefinition>,
}

impl Scope {
    pub(crate) fn operation(name: &str, definitions: &[VariableDefinition]) -> Self {
        Self::new(ScopeKind::Operation(name.to_string()), definitions)
    }

    pub(crate) fn fragment(name: &str, definitions: &[VariableDefinition]) -> Self {
        Self::new(ScopeKind::Fragment(name.to_string()), definitions)
    }

    /// Scope of default values, where no variable may appear.
    pub(crate) fn constant() -> Self {
        Self::new(ScopeKind::Constant, &[])
    }

    fn new(kind: ScopeKind, definitions: &[VariableDefinition]) -> Self {
        Self {
            kind,
            defined: definitions
                .iter()
                .map(|def| (def.name.clone(), def.clone()))
                .collect(),
            inferred: IndexMap::new(),
        }
    }

    pub(crate) fn into_inferred(self) -> Vec<VariableDefinition> {
        self.inferred.into_values().collect()
    }
}

impl Builder<'_> {
    pub(super) fn build_variable(
        &mut self,
        scope: &mut Scope,
        name: &str,
        expected: &TypeReference,
        location_has_default: bool,
        span: Span,
    ) -> Option<IrValue> {
        if let Some(definition) = scope.defined.get(name) {
            let has_default = definition
                .default_value
                .as_ref()
                .is_some_and(|value| !value.is_null());
            if !is_usage_allowed(
                &definition.value_type,
                has_default || location_has_default,
                expected,
            ) {
                let message = format!(
                    "Variable `${}` of type `{}` cannot be used where `{}` is expected",
                    name, definition.value_type, expected
                );
                self.error(message, span);
                return None;
            }
            return Some(IrValue::Variable(Variable {
                name: name.to_string(),
                value_type: definition.value_type.clone(),
            }));
        }

        match &scope.kind {
            ScopeKind::Constant => {
                self.error(format!("Unexpected variable `${}` in constant value", name), span);
                None
            }
            ScopeKind::Operation(operation) => {
                let message = format!(
                    "Variable `${}` is not defined by operation `{}`",
                    name, operation
                );
                self.error(message, span);
                None
            }
            ScopeKind::Fragment(_) => {
                if let Some(existing) = scope.inferred.get_mut(name) {
                    if existing.value_type.nullable() != expected.nullable() {
                        let message = format!(
                            "Variable `${}` was used in locations expecting the conflicting types `{}` and `{}`",
                            name, existing.value_type, expected
                        );
                        self.error(message, span);
                        return None;
                    }
                    if expected.is_non_null() {
                        existing.value_type = expected.clone();
                    }
                } else {
                    let location = self.location(span);
                    scope.inferred.insert(
                        name.to_string(),
                        VariableDefinition {
                            name: name.to_string(),
                            value_type: expected.clone(),
                            default_value: None,
                            location,
                        },
                    );
                }

                Some(IrValue::Variable(Variable {
                    name: name.to_string(),
                    value_type: expected.clone(),
                }))
            }
        }
    }
}

/// A nullable variable may flow into a non-null location only when a
/// default covers the missing value.
fn is_usage_allowed(
    variable_type: &TypeReference,
    has_default: bool,
    expected: &TypeReference,
) -> bool {
    if expected.is_non_null() && !variable_type.is_non_null() {
        return has_default && is_input_subtype(variable_type, expected.nullable());
    }
    is_input_subtype(variable_type, expected)
}

fn is_input_subtype(sub: &TypeReference, sup: &TypeReference) -> bool {
    match (sub, sup) {
        (TypeReference::NonNull(sub), TypeReference::NonNull(sup)) => is_input_subtype(sub, sup),
        (TypeReference::NonNull(sub), sup) => is_input_subtype(sub, sup),
        (_, TypeReference::NonNull(_)) => false,
        (TypeReference::List(sub), TypeReference::List(sup)) => is_input_subtype(sub, sup),
        (TypeReference::List(_), _) | (_, TypeReference::List(_)) => false,
        (TypeReference::Named(sub), TypeReference::Named(sup)) => sub == sup,
    }
}

/// Warnings for operation variables that nothing reads, including the
/// fragments the operation reaches.
pub fn unused_variable_warnings(
    operation: &OperationDefinition,
    program: &Program,
) -> Vec<Diagnostic> {
    if operation.variable_definitions.is_empty() {
        return vec![];
    }

    let mut used = HashSet::new();
    collect_used_variables(&operation.selections, &mut used);
    for directive in &operation.directives {
        add_arguments(&directive.arguments, &mut used);
    }
    for name in program.referenced_fragments(&operation.selections) {
        if let Some(fragment) = program.fragment(&name) {
            used.extend(
                fragment
                    .used_global_variables
                    .iter()
                    .map(|def| def.name.clone()),
            );
        }
    }

    operation
        .variable_definitions
        .iter()
        .filter(|def| !used.contains(&def.name))
        .map(|def| {
            Diagnostic::warning(
                DiagnosticKind::Binding,
                format!(
                    "Variable `${}` is never used in operation `{}`",
                    def.name, operation.name
                ),
                def.location.clone(),
            )
        })
        .collect()
}

fn collect_used_variables(selections: &[Selection], used: &mut HashSet<String>) {
    for selection in selections {
        for directive in selection.directives() {
            add_arguments(&directive.arguments, used);
        }
        match selection {
            Selection::ScalarField(field) => add_arguments(&field.arguments, used),
            Selection::LinkedField(field) => {
                add_arguments(&field.arguments, used);
                collect_used_variables(&field.selections, used);
            }
            Selection::InlineFragment(fragment) => {
                collect_used_variables(&fragment.selections, used);
            }
            Selection::FragmentSpread(spread) => add_arguments(&spread.arguments, used),
            Selection::Condition(condition) => {
                if let ConditionValue::Variable(variable) = &condition.value {
                    used.insert(variable.name.clone());
                }
                collect_used_variables(&condition.selections, used);
            }
        }
    }
}

fn add_arguments(arguments: &[Argument], used: &mut HashSet<String>) {
    for argument in arguments {
        used.extend(
            argument
                .value
                .variables()
                .into_iter()
                .map(|variable| variable.name.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::is_usage_allowed;
    use crate::schema::TypeReference;

    #[test]
    fn usage_rules() {
        let int = TypeReference::named("Int");
        let int_nn = TypeReference::named("Int").non_null();
        assert!(is_usage_allowed(&int_nn, false, &int));
        assert!(!is_usage_allowed(&int, false, &int_nn));
        assert!(is_usage_allowed(&int, true, &int_nn));
        assert!(!is_usage_allowed(&int.clone().list(), false, &int));
        assert!(is_usage_allowed(&int_nn.clone().list(), false, &int.clone().list()));
    }
}
