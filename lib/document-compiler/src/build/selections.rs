use std::sync::Arc;

use graphql_syntax::query::{self as syntax, SelectionSet};

use crate::build::directives::wrap_in_conditions;
use crate::build::variables::Scope;
use crate::build::Builder;
use crate::ir::{
    storage_key, Argument, FragmentSpread, InlineFragment, LinkedField, ScalarField, Selection,
};
use crate::schema::TypeReference;

impl Builder<'_> {
    pub(super) fn build_selections(
        &mut self,
        scope: &mut Scope,
        parent_type: &str,
        selection_set: &SelectionSet,
    ) -> Vec<Selection> {
        let mut selections = Vec::with_capacity(selection_set.items.len());

        for item in &selection_set.items {
            if self.diagnostics.is_full() {
                break;
            }
            let built = match item {
                syntax::Selection::Field(field) => self.build_field(scope, parent_type, field),
                syntax::Selection::FragmentSpread(spread) => {
                    self.build_fragment_spread(scope, parent_type, spread)
                }
                syntax::Selection::InlineFragment(fragment) => {
                    self.build_inline_fragment(scope, parent_type, fragment)
                }
            };
            selections.extend(built);
        }

        selections
    }

    fn build_field(
        &mut self,
        scope: &mut Scope,
        parent_type: &str,
        field: &syntax::Field,
    ) -> Option<Selection> {
        let schema = self.schema;
        let alias = field.alias.clone().filter(|alias| *alias != field.name);

        if field.name == "__typename" {
            if !field.arguments.is_empty() {
                self.error("The field `__typename` takes no arguments", field.name_span);
            }
            if !field.selection_set.is_empty() {
                self.error(
                    "Field `__typename` of type `String!` must not have a selection since type `String!` has no subfields",
                    field.name_span,
                );
            }
            let (directives, conditions) = self.build_directives(scope, &field.directives, "FIELD");
            let storage_key = storage_key(alias.as_deref(), &field.name, &[]);
            let selection = Selection::ScalarField(Arc::new(ScalarField {
                alias,
                name: field.name.clone(),
                parent_type: parent_type.to_string(),
                field_type: TypeReference::named("String").non_null(),
                arguments: vec![],
                directives,
                storage_key,
                location: self.location(field.name_span),
            }));
            return Some(wrap_in_conditions(selection, conditions));
        }

        let Some(definition) = schema.field(parent_type, &field.name) else {
            self.error(
                format!(
                    "The type `{}` has no field `{}`",
                    parent_type, field.name
                ),
                field.name_span,
            );
            return None;
        };

        if let Some(reason) = &definition.deprecation_reason {
            self.warning(
                format!("The field `{}` is deprecated: {}", definition.coordinate(), reason),
                field.name_span,
            );
        }

        let owner = format!("field `{}`", definition.coordinate());
        let arguments = self.build_arguments(
            scope,
            &field.arguments,
            &definition.arguments,
            &owner,
            field.name_span,
        );
        let (directives, conditions) = self.build_directives(scope, &field.directives, "FIELD");

        let type_name = definition.field_type.inner_type();
        let Some(field_type_def) = schema.type_by_name(type_name) else {
            // the schema loader guarantees every field type exists
            self.error(format!("Unknown type `{}`", type_name), field.name_span);
            return None;
        };

        let storage_key = storage_key(alias.as_deref(), &field.name, &arguments);
        let location = self.location(field.name_span);

        let selection = if field_type_def.is_leaf() {
            if !field.selection_set.is_empty() {
                self.error(
                    format!(
                        "Field `{}` of type `{}` must not have a selection since type `{}` has no subfields",
                        field.name, definition.field_type, definition.field_type
                    ),
                    field.name_span,
                );
                return None;
            }
            Selection::ScalarField(Arc::new(ScalarField {
                alias,
                name: field.name.clone(),
                parent_type: parent_type.to_string(),
                field_type: definition.field_type.clone(),
                arguments,
                directives,
                storage_key,
                location,
            }))
        } else {
            if field.selection_set.is_empty() {
                self.error(
                    format!(
                        "Field `{}` of type `{}` must have a selection of subfields",
                        field.name, definition.field_type
                    ),
                    field.name_span,
                );
                return None;
            }
            let selections = self.build_selections(scope, type_name, &field.selection_set);
            Selection::LinkedField(Arc::new(LinkedField {
                alias,
                name: field.name.clone(),
                parent_type: parent_type.to_string(),
                field_type: definition.field_type.clone(),
                concrete_type: schema.is_object(type_name).then(|| type_name.to_string()),
                plural: definition.field_type.is_list(),
                arguments,
                directives,
                storage_key,
                selections,
                connection: None,
                location,
            }))
        };

        Some(wrap_in_conditions(selection, conditions))
    }

    fn build_fragment_spread(
        &mut self,
        scope: &mut Scope,
        parent_type: &str,
        spread: &syntax::FragmentSpread,
    ) -> Option<Selection> {
        let schema = self.schema;
        let signatures = self.signatures;

        let Some(signature) = signatures.get(&spread.fragment_name) else {
            self.error(
                format!("Unknown fragment `{}`", spread.fragment_name),
                spread.name_span,
            );
            return None;
        };

        if schema.type_by_name(&signature.type_condition).is_some()
            && !schema.types_overlap(parent_type, &signature.type_condition)
        {
            self.error(
                format!(
                    "Fragment `{}` cannot be spread here as objects of type `{}` can never be of type `{}`",
                    spread.fragment_name, parent_type, signature.type_condition
                ),
                spread.name_span,
            );
            return None;
        }

        let mut arguments: Vec<Argument> = vec![];
        let mut provided = vec![];
        for directive in spread.directives.iter().filter(|d| d.name == "arguments") {
            for argument in &directive.arguments {
                if provided.contains(&argument.name.as_str()) {
                    self.error(
                        format!("Duplicate argument `{}` on fragment `{}`", argument.name, spread.fragment_name),
                        argument.span,
                    );
                    continue;
                }
                provided.push(argument.name.as_str());

                let Some(definition) = signature.local_argument(&argument.name) else {
                    self.error(
                        format!(
                            "Unknown argument `{}` for fragment `{}`",
                            argument.name, spread.fragment_name
                        ),
                        argument.span,
                    );
                    continue;
                };

                if let Some(value) = self.build_value(
                    scope,
                    &argument.value,
                    &definition.value_type,
                    definition.default_value.is_some(),
                    argument.value_span,
                ) {
                    arguments.push(Argument {
                        name: argument.name.clone(),
                        value_type: definition.value_type.clone(),
                        value,
                        location: self.location(argument.span),
                    });
                }
            }
        }

        for definition in &signature.variable_definitions {
            if definition.is_required() && !provided.contains(&definition.name.as_str()) {
                self.error(
                    format!(
                        "Missing required argument `{}` of type `{}` on fragment `{}`",
                        definition.name, definition.value_type, spread.fragment_name
                    ),
                    spread.name_span,
                );
            }
        }

        let (directives, conditions) =
            self.build_directives(scope, &spread.directives, "FRAGMENT_SPREAD");

        let selection = Selection::FragmentSpread(Arc::new(FragmentSpread {
            fragment_name: spread.fragment_name.clone(),
            type_condition: signature.type_condition.clone(),
            arguments,
            directives,
            location: self.location(spread.name_span),
        }));

        Some(wrap_in_conditions(selection, conditions))
    }

    fn build_inline_fragment(
        &mut self,
        scope: &mut Scope,
        parent_type: &str,
        fragment: &syntax::InlineFragment,
    ) -> Option<Selection> {
        let schema = self.schema;
        let span = fragment.type_condition_span.unwrap_or(fragment.span);

        if let Some(type_condition) = &fragment.type_condition {
            match schema.type_by_name(type_condition) {
                None => {
                    self.error(format!("Unknown type `{}`", type_condition), span);
                    return None;
                }
                Some(type_def) if !type_def.is_composite() => {
                    self.error(
                        format!(
                            "Fragment cannot condition on non composite type `{}`",
                            type_condition
                        ),
                        span,
                    );
                    return None;
                }
                Some(_) => {}
            }

            if !schema.types_overlap(parent_type, type_condition) {
                self.error(
                    format!(
                        "Fragment cannot be spread here as objects of type `{}` can never be of type `{}`",
                        parent_type, type_condition
                    ),
                    span,
                );
                return None;
            }
        }

        let selection_type = fragment.type_condition.as_deref().unwrap_or(parent_type);
        let (directives, conditions) =
            self.build_directives(scope, &fragment.directives, "INLINE_FRAGMENT");
        let selections = self.build_selections(scope, selection_type, &fragment.selection_set);

        let abstract_key = fragment
            .type_condition
            .as_deref()
            .filter(|name| schema.is_abstract(name))
            .map(|name| format!("__is{}", name));

        let selection = Selection::InlineFragment(Arc::new(InlineFragment {
            type_condition: fragment.type_condition.clone(),
            abstract_key,
            directives,
            selections,
            location: self.location(span),
        }));

        Some(wrap_in_conditions(selection, conditions))
    }
}
