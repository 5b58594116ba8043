use std::collections::HashSet;
use std::sync::Arc;

use graphql_syntax::query::Directive as SyntaxDirective;

use crate::build::variables::Scope;
use crate::build::Builder;
use crate::ir::{
    Condition, ConditionValue, ConstantValue, Directive, IrValue, Location, Selection,
};

/// A `@skip`/`@include` found on a selection, turned into a [`Condition`]
/// around it once the selection is built.
#[derive(Debug)]
pub(super) struct ConditionSpec {
    value: ConditionValue,
    passing_value: bool,
    location: Location,
}

impl Builder<'_> {
    /// Binds the directives found at `location` (e.g. `FIELD`).
    ///
    /// `@skip`/`@include` are returned separately. `@arguments` on spreads and
    /// `@argumentDefinitions` on fragments are read elsewhere and left out.
    pub(super) fn build_directives(
        &mut self,
        scope: &mut Scope,
        directives: &[SyntaxDirective],
        location: &str,
    ) -> (Vec<Directive>, Vec<ConditionSpec>) {
        let schema = self.schema;
        let mut built = vec![];
        let mut conditions = vec![];
        let mut seen = HashSet::new();

        for directive in directives {
            let consumed_elsewhere = matches!(
                (directive.name.as_str(), location),
                ("arguments", "FRAGMENT_SPREAD") | ("argumentDefinitions", "FRAGMENT_DEFINITION")
            );
            if consumed_elsewhere {
                continue;
            }

            let Some(definition) = schema.directive(&directive.name) else {
                self.error(
                    format!("Unknown directive `@{}`", directive.name),
                    directive.name_span,
                );
                continue;
            };

            if !definition.allows_location(location) {
                self.error(
                    format!(
                        "Directive `@{}` may not be used on {}",
                        directive.name, location
                    ),
                    directive.name_span,
                );
                continue;
            }

            if !definition.repeatable && !seen.insert(directive.name.as_str()) {
                self.error(
                    format!(
                        "The directive `@{}` can only be used once at this location",
                        directive.name
                    ),
                    directive.name_span,
                );
                continue;
            }

            let owner = format!("directive `@{}`", directive.name);
            let arguments = self.build_arguments(
                scope,
                &directive.arguments,
                &definition.arguments,
                &owner,
                directive.name_span,
            );

            match directive.name.as_str() {
                "skip" | "include" => {
                    let value = arguments.iter().find(|arg| arg.name == "if").and_then(
                        |argument| match &argument.value {
                            IrValue::Constant(ConstantValue::Boolean(value)) => {
                                Some(ConditionValue::Constant(*value))
                            }
                            IrValue::Variable(variable) => {
                                Some(ConditionValue::Variable(variable.clone()))
                            }
                            _ => None,
                        },
                    );
                    // a missing or invalid `if` was already reported
                    if let Some(value) = value {
                        conditions.push(ConditionSpec {
                            value,
                            passing_value: directive.name == "include",
                            location: self.location(directive.span),
                        });
                    }
                }
                _ => built.push(Directive {
                    name: directive.name.clone(),
                    arguments,
                    location: self.location(directive.span),
                }),
            }
        }

        (built, conditions)
    }
}

/// Nests `selection` under its conditions; the first directive written
/// becomes the outermost condition.
pub(super) fn wrap_in_conditions(selection: Selection, conditions: Vec<ConditionSpec>) -> Selection {
    conditions
        .into_iter()
        .rev()
        .fold(selection, |inner, condition| {
            Selection::Condition(Arc::new(Condition {
                value: condition.value,
                passing_value: condition.passing_value,
                selections: vec![inner],
                location: condition.location,
            }))
        })
}
