use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{instrument, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{
    for_each_spread, storage_key, transform_list, Argument, Condition, ConditionValue,
    ConstantValue, Directive, FragmentDefinition, FragmentSpread, InlineFragment, IrValue,
    LinkedField, Location, OperationDefinition, Program, ScalarField, Selection, Transformed,
    TransformedValue, Transformer, VariableDefinition,
};
use crate::transforms::{PassContext, SpecializationKey};

/// This pass specializes every fragment reachable from an operation for the
/// argument values it is spread with.
///
/// The process involves:
/// 1. Checking that each operation defines the root variables read by the
///    fragments it reaches.
/// 2. Resolving the binding of every spread: its `@arguments` values rewritten
///    in the caller's scope, then the declared defaults, then `null`.
/// 3. Substituting the binding into a copy of the fragment named
///    `<Fragment>_<hash>`. Copies are memoized per fragment and binding, so
///    operations spreading a fragment the same way share one copy.
/// 4. Rebuilding the program from the operations and the fragments they reach.
#[instrument(level = "trace", skip_all, fields(operations = program.operation_count()))]
pub fn apply_fragment_arguments(
    program: &Program,
    ctx: &PassContext,
) -> Result<Program, Vec<Diagnostic>> {
    let operations: Vec<&Arc<OperationDefinition>> = program.operations().collect();
    let results: Vec<Result<Arc<OperationDefinition>, Vec<Diagnostic>>> = operations
        .par_iter()
        .map(|operation| specialize_operation(program, ctx, operation))
        .collect();

    let mut next = program.empty_like();
    let mut errors = vec![];
    for result in results {
        match result {
            Ok(operation) => next.insert_operation(operation),
            Err(mut diagnostics) => errors.append(&mut diagnostics),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut pool = program.empty_like();
    for entry in ctx.specializations().iter() {
        pool.insert_fragment(entry.value().clone());
    }

    let mut reachable = BTreeSet::new();
    for operation in next.operations() {
        reachable.extend(pool.referenced_fragments(&operation.selections));
    }
    for name in &reachable {
        if let Some(fragment) = pool.fragment(name) {
            next.insert_fragment(fragment.clone());
        }
    }

    trace!(
        fragments = next.fragment_count(),
        dropped = program.fragment_count().saturating_sub(next.fragment_count()),
        "specialized fragments"
    );

    Ok(next)
}

fn specialize_operation(
    program: &Program,
    ctx: &PassContext,
    operation: &Arc<OperationDefinition>,
) -> Result<Arc<OperationDefinition>, Vec<Diagnostic>> {
    let mut errors = check_root_variables(program, operation);

    let mut specializer = Specializer {
        program,
        ctx,
        scope: HashMap::new(),
        depth: 0,
        path: vec![],
        errors: vec![],
    };
    let selections = specializer.transform_selections(&operation.selections);
    errors.append(&mut specializer.errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(match selections {
        TransformedValue::Keep => operation.clone(),
        TransformedValue::Replace(selections) => Arc::new(OperationDefinition {
            selections,
            ..operation.as_ref().clone()
        }),
    })
}

/// Reports root variables of reachable fragments the operation does not define,
/// at the first spread leading to the fragment.
fn check_root_variables(program: &Program, operation: &OperationDefinition) -> Vec<Diagnostic> {
    let defined: HashSet<&str> = operation
        .variable_definitions
        .iter()
        .map(|definition| definition.name.as_str())
        .collect();
    let mut errors = vec![];
    let mut seen = HashSet::new();
    let mut stack: Vec<(String, Location)> = vec![];

    for_each_spread(&operation.selections, &mut |spread| {
        stack.push((spread.fragment_name.clone(), spread.location.clone()))
    });
    stack.reverse();

    while let Some((name, location)) = stack.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(fragment) = program.fragment(&name) else {
            continue;
        };

        for variable in &fragment.used_global_variables {
            if !defined.contains(variable.name.as_str()) {
                errors.push(Diagnostic::error(
                    DiagnosticKind::Transform,
                    format!(
                        "Variable `${}` used by fragment `{}` is not defined by operation `{}`",
                        variable.name, fragment.name, operation.name
                    ),
                    location.clone(),
                ));
            }
        }

        let mut nested = vec![];
        for_each_spread(&fragment.selections, &mut |spread| {
            nested.push((spread.fragment_name.clone(), spread.location.clone()))
        });
        stack.extend(nested.into_iter().rev());
    }

    errors
}

/// Canonical `name:value` list of a binding, sorted by argument name.
fn canonical_binding(binding: &[(String, IrValue)]) -> String {
    let mut entries: Vec<String> = binding
        .iter()
        .map(|(name, value)| format!("{}:{}", name, value.canonical()))
        .collect();
    entries.sort();
    entries.join(",")
}

struct Specializer<'a> {
    program: &'a Program,
    ctx: &'a PassContext,
    /// Values of the local arguments of the fragment being copied.
    scope: HashMap<String, IrValue>,
    depth: usize,
    path: Vec<SpecializationKey>,
    errors: Vec<Diagnostic>,
}

impl Specializer<'_> {
    fn substitute(&self, value: &IrValue) -> IrValue {
        value.substitute(&|variable| self.scope.get(&variable.name).cloned())
    }

    fn substitute_arguments(&self, arguments: &[Argument]) -> TransformedValue<Vec<Argument>> {
        if self.scope.is_empty() {
            return TransformedValue::Keep;
        }
        transform_list(arguments, |argument| {
            let value = self.substitute(&argument.value);
            if value == argument.value {
                Transformed::Keep
            } else {
                Transformed::Replace(Argument {
                    value,
                    ..argument.clone()
                })
            }
        })
    }

    fn substitute_directives(&self, directives: &[Directive]) -> TransformedValue<Vec<Directive>> {
        transform_list(directives, |directive| {
            match self.substitute_arguments(&directive.arguments) {
                TransformedValue::Keep => Transformed::Keep,
                TransformedValue::Replace(arguments) => Transformed::Replace(Directive {
                    arguments,
                    ..directive.clone()
                }),
            }
        })
    }

    /// Values for every local argument of `fragment` at `spread`.
    fn binding(
        &self,
        fragment: &FragmentDefinition,
        spread: &FragmentSpread,
    ) -> Vec<(String, IrValue)> {
        fragment
            .variable_definitions
            .iter()
            .map(|definition| {
                let value = match spread
                    .arguments
                    .iter()
                    .find(|argument| argument.name == definition.name)
                {
                    Some(argument) => self.substitute(&argument.value),
                    None => IrValue::Constant(
                        definition
                            .default_value
                            .clone()
                            .unwrap_or(ConstantValue::Null),
                    ),
                };
                (definition.name.clone(), value)
            })
            .collect()
    }

    /// Name of the copy of `fragment` for `binding`, creating it on first use.
    fn specialize(
        &mut self,
        fragment: &FragmentDefinition,
        binding: Vec<(String, IrValue)>,
        location: &Location,
    ) -> Option<String> {
        let canonical = canonical_binding(&binding);
        let name = if fragment.has_local_arguments() {
            format!("{}_{:016x}", fragment.name, xxh3_64(canonical.as_bytes()))
        } else {
            fragment.name.clone()
        };
        let key: SpecializationKey = (fragment.name.clone(), canonical);

        if self.path.contains(&key) || self.ctx.specializations().contains_key(&key) {
            return Some(name);
        }

        if self.depth >= self.ctx.max_fragment_depth {
            self.errors.push(Diagnostic::error(
                DiagnosticKind::Transform,
                format!(
                    "Exceeded the maximum fragment depth of {} while applying the arguments of fragment `{}`",
                    self.ctx.max_fragment_depth, fragment.name
                ),
                location.clone(),
            ));
            return None;
        }

        let mut used_global_variables = fragment.used_global_variables.clone();
        for (_, value) in &binding {
            for variable in value.variables() {
                if used_global_variables
                    .iter()
                    .all(|existing| existing.name != variable.name)
                {
                    used_global_variables.push(VariableDefinition {
                        name: variable.name.clone(),
                        value_type: variable.value_type.clone(),
                        default_value: None,
                        location: fragment.location.clone(),
                    });
                }
            }
        }

        let mut path = self.path.clone();
        path.push(key.clone());
        let mut nested = Specializer {
            program: self.program,
            ctx: self.ctx,
            scope: binding.into_iter().collect(),
            depth: self.depth + 1,
            path,
            errors: vec![],
        };
        let selections = nested
            .transform_selections(&fragment.selections)
            .replace_or_else(|| fragment.selections.clone());
        let directives = nested
            .substitute_directives(&fragment.directives)
            .replace_or_else(|| fragment.directives.clone());

        if !nested.errors.is_empty() {
            self.errors.append(&mut nested.errors);
            return None;
        }

        let specialized = FragmentDefinition {
            name: name.clone(),
            type_condition: fragment.type_condition.clone(),
            abstract_key: fragment.abstract_key.clone(),
            variable_definitions: vec![],
            used_global_variables,
            directives,
            selections,
            location: fragment.location.clone(),
        };
        self.ctx
            .specializations()
            .entry(key)
            .or_insert_with(|| Arc::new(specialized));

        Some(name)
    }
}

impl Transformer for Specializer<'_> {
    const NAME: &'static str = "ApplyFragmentArgumentsTransform";

    fn transform_scalar_field(&mut self, field: &ScalarField) -> Transformed<Selection> {
        let arguments = self.substitute_arguments(&field.arguments);
        let directives = self.substitute_directives(&field.directives);
        if arguments.is_keep() && directives.is_keep() {
            return Transformed::Keep;
        }

        let arguments = arguments.replace_or_else(|| field.arguments.clone());
        Transformed::Replace(Selection::ScalarField(Arc::new(ScalarField {
            storage_key: storage_key(field.alias.as_deref(), &field.name, &arguments),
            arguments,
            directives: directives.replace_or_else(|| field.directives.clone()),
            ..field.clone()
        })))
    }

    fn transform_linked_field(&mut self, field: &LinkedField) -> Transformed<Selection> {
        let arguments = self.substitute_arguments(&field.arguments);
        let directives = self.substitute_directives(&field.directives);
        let selections = self.transform_selections(&field.selections);
        if arguments.is_keep() && directives.is_keep() && selections.is_keep() {
            return Transformed::Keep;
        }

        let arguments = arguments.replace_or_else(|| field.arguments.clone());
        Transformed::Replace(Selection::LinkedField(Arc::new(LinkedField {
            storage_key: storage_key(field.alias.as_deref(), &field.name, &arguments),
            arguments,
            directives: directives.replace_or_else(|| field.directives.clone()),
            selections: selections.replace_or_else(|| field.selections.clone()),
            ..field.clone()
        })))
    }

    fn transform_inline_fragment(&mut self, fragment: &InlineFragment) -> Transformed<Selection> {
        let directives = self.substitute_directives(&fragment.directives);
        let selections = self.transform_selections(&fragment.selections);
        if directives.is_keep() && selections.is_keep() {
            return Transformed::Keep;
        }

        Transformed::Replace(Selection::InlineFragment(Arc::new(InlineFragment {
            directives: directives.replace_or_else(|| fragment.directives.clone()),
            selections: selections.replace_or_else(|| fragment.selections.clone()),
            ..fragment.clone()
        })))
    }

    fn transform_fragment_spread(&mut self, spread: &FragmentSpread) -> Transformed<Selection> {
        let program = self.program;
        let Some(fragment) = program.fragment(&spread.fragment_name) else {
            self.errors.push(Diagnostic::internal(
                format!("Spread of fragment `{}` missing from the program", spread.fragment_name),
                Some(spread.location.clone()),
            ));
            return Transformed::Keep;
        };

        let directives = self.substitute_directives(&spread.directives);
        let binding = self.binding(fragment, spread);
        let Some(name) = self.specialize(fragment, binding, &spread.location) else {
            return Transformed::Keep;
        };

        if name == spread.fragment_name && spread.arguments.is_empty() && directives.is_keep() {
            return Transformed::Keep;
        }

        Transformed::Replace(Selection::FragmentSpread(Arc::new(FragmentSpread {
            fragment_name: name,
            arguments: vec![],
            directives: directives.replace_or_else(|| spread.directives.clone()),
            ..spread.clone()
        })))
    }

    fn transform_condition(&mut self, condition: &Condition) -> Transformed<Selection> {
        let value = match &condition.value {
            ConditionValue::Variable(variable) => match self.scope.get(&variable.name) {
                None => None,
                Some(IrValue::Variable(next)) => Some(ConditionValue::Variable(next.clone())),
                Some(IrValue::Constant(ConstantValue::Boolean(value))) => {
                    Some(ConditionValue::Constant(*value))
                }
                Some(other) => {
                    self.errors.push(Diagnostic::error(
                        DiagnosticKind::Transform,
                        format!(
                            "Expected a boolean for the condition of `@{}`, found {}",
                            condition.directive_name(),
                            other
                        ),
                        condition.location.clone(),
                    ));
                    None
                }
            },
            ConditionValue::Constant(_) => None,
        };
        let selections = self.transform_selections(&condition.selections);
        if value.is_none() && selections.is_keep() {
            return Transformed::Keep;
        }

        Transformed::Replace(Selection::Condition(Arc::new(Condition {
            value: value.unwrap_or_else(|| condition.value.clone()),
            selections: selections.replace_or_else(|| condition.selections.clone()),
            ..condition.clone()
        })))
    }
}

#[cfg(test)]
mod tests {
    use crate::printer::print_program;
    use crate::tests::testkit::{bind_program, test_schema};
    use crate::transforms::{apply_fragment_arguments, PassContext};

    #[test]
    fn distinct_bindings_produce_distinct_copies() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q {
              me {
                ...Picture @arguments(size: 32)
                best_friend { ...Picture @arguments(size: 64) }
              }
            }
            fragment Picture on User @argumentDefinitions(size: {type: "Int"}) {
              profilePicture(size: $size) { url }
            }
            "#,
        );

        let result = apply_fragment_arguments(&program, &PassContext::default()).expect("to apply");
        assert_eq!(result.fragment_count(), 2);
        let names: Vec<&str> = result.fragments().map(|f| f.name.as_str()).collect();
        assert!(names.iter().all(|name| name.starts_with("Picture_")));
        assert_ne!(names[0], names[1]);

        let keys: Vec<String> = result
            .fragments()
            .flat_map(|fragment| fragment.selections.iter())
            .filter_map(|selection| selection.storage_key().map(str::to_string))
            .collect();
        keys.iter().for_each(|key| assert!(key.starts_with("profilePicture(size:")));
        assert!(keys.contains(&"profilePicture(size:32)".to_string()));
        assert!(keys.contains(&"profilePicture(size:64)".to_string()));
    }

    #[test]
    fn identical_bindings_share_a_copy() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query A { me { ...Picture @arguments(size: 32) } }
            query B { me { best_friend { ...Picture @arguments(size: 32) } } }
            fragment Picture on User @argumentDefinitions(size: {type: "Int", defaultValue: 16}) {
              profilePicture(size: $size) { url }
            }
            fragment Unused on User { name }
            "#,
        );

        let result = apply_fragment_arguments(&program, &PassContext::default()).expect("to apply");
        assert_eq!(result.fragment_count(), 1);
        assert!(result.fragment("Unused").is_none());
    }

    #[test]
    fn variables_flow_from_the_caller() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q($pictureSize: Int, $withAge: Boolean!) {
              me { ...Profile @arguments(size: $pictureSize, showAge: $withAge) }
            }
            fragment Profile on User
              @argumentDefinitions(size: {type: "Int"}, showAge: {type: "Boolean!", defaultValue: false}) {
              name
              age @include(if: $showAge)
              profilePicture(size: $size) { url }
            }
            "#,
        );

        let result = apply_fragment_arguments(&program, &PassContext::default()).expect("to apply");
        let printed = print_program(&result);
        let printed = printed.replace(
            result.fragments().next().map(|f| f.name.as_str()).unwrap_or_default(),
            "Profile_<hash>",
        );
        insta::assert_snapshot!(printed, @r"
        query Q($pictureSize: Int, $withAge: Boolean!) {
          me {
            ...Profile_<hash>
          }
        }

        fragment Profile_<hash> on User {
          name
          age @include(if: $withAge)
          profilePicture(size: $pictureSize) {
            url
          }
        }
        ");
    }

    #[test]
    fn undefined_root_variable_is_reported_at_the_spread() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q { me { ...Picture } }
            fragment Picture on User { profilePicture(size: $size) { url } }
            "#,
        );

        let errors = apply_fragment_arguments(&program, &PassContext::default())
            .expect_err("to fail");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Variable `$size` used by fragment `Picture` is not defined by operation `Q`"
        );
        let location = errors[0].location.as_ref().expect("located");
        assert_eq!(location.span.start.line, 2);
    }

    #[test]
    fn self_spreads_terminate() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q { me { ...Chain @arguments(n: 0) } }
            fragment Chain on User @argumentDefinitions(n: {type: "Int"}) {
              best_friend { ...Chain @arguments(n: 1) }
            }
            "#,
        );

        // n: 1 rebinds to the same copy, so the expansion terminates
        let result = apply_fragment_arguments(&program, &PassContext::new(3, Vec::<String>::new()))
            .expect("to apply");
        assert_eq!(result.fragment_count(), 2);
    }

    #[test]
    fn expansion_depth_is_capped() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q { me { ...A } }
            fragment A on User { best_friend { ...B } }
            fragment B on User { best_friend { ...C } }
            fragment C on User { name }
            "#,
        );

        let errors = apply_fragment_arguments(&program, &PassContext::new(2, Vec::<String>::new()))
            .expect_err("to fail");
        assert_eq!(
            errors[0].message,
            "Exceeded the maximum fragment depth of 2 while applying the arguments of fragment `C`"
        );
    }
}
