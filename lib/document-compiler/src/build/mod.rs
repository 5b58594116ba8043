//! Binding of parsed documents against a [`SchemaModel`].
//!
//! Fragment signatures are collected over the whole batch first, so a
//! document can be bound without seeing the bodies of the fragments it
//! spreads.

mod cycles;
mod directives;
mod selections;
mod signatures;
mod values;
mod variables;

use graphql_syntax::query::{self as syntax, Definition, Document};
use graphql_syntax::Span;
use tracing::{instrument, trace};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsCollector};
use crate::ir::{
    FragmentDefinition, Location, OperationDefinition, SourceId, VariableDefinition,
};
use crate::schema::{SchemaModel, TypeReference};

pub use self::cycles::{FragmentCycle, FragmentGraph};
pub use self::signatures::{collect_signatures, FragmentSignature, FragmentSignatures};
pub use self::variables::unused_variable_warnings;

use self::variables::Scope;

/// Output of a successful [`bind`].
#[derive(Debug, Clone)]
pub struct BoundDocument {
    pub source: SourceId,
    pub operations: Vec<OperationDefinition>,
    pub fragments: Vec<FragmentDefinition>,
    /// Non-fatal diagnostics, e.g. deprecated field usage.
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy)]
pub struct BindOptions {
    pub max_diagnostics: usize,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            max_diagnostics: 100,
        }
    }
}

/// Resolves every definition of `document` against `schema`.
///
/// Binding keeps going after a local error so independent problems are
/// reported together; any error fails the whole document.
#[instrument(level = "trace", skip_all, fields(source = %source))]
pub fn bind(
    source: &SourceId,
    document: &Document,
    schema: &SchemaModel,
    signatures: &FragmentSignatures,
    options: BindOptions,
) -> Result<BoundDocument, Vec<Diagnostic>> {
    let mut builder = Builder::new(schema, signatures, source.clone(), options.max_diagnostics);
    let mut operations = vec![];
    let mut fragments = vec![];

    for definition in &document.definitions {
        if builder.diagnostics.is_full() {
            break;
        }
        match definition {
            Definition::Operation(operation) => {
                if let Some(operation) = builder.build_operation(operation) {
                    operations.push(operation);
                }
            }
            Definition::Fragment(fragment) => {
                if let Some(fragment) = builder.build_fragment(fragment) {
                    fragments.push(fragment);
                }
            }
        }
    }

    let failed = builder.diagnostics.has_errors();
    let diagnostics = builder.diagnostics.into_inner();
    trace!(
        operations = operations.len(),
        fragments = fragments.len(),
        diagnostics = diagnostics.len(),
        "bound document"
    );

    if failed {
        return Err(diagnostics);
    }

    Ok(BoundDocument {
        source: source.clone(),
        operations,
        fragments,
        warnings: diagnostics,
    })
}

pub(crate) struct Builder<'a> {
    schema: &'a SchemaModel,
    signatures: &'a FragmentSignatures,
    source: SourceId,
    diagnostics: DiagnosticsCollector,
}

impl<'a> Builder<'a> {
    pub(crate) fn new(
        schema: &'a SchemaModel,
        signatures: &'a FragmentSignatures,
        source: SourceId,
        max_diagnostics: usize,
    ) -> Self {
        Self {
            schema,
            signatures,
            source,
            diagnostics: DiagnosticsCollector::new(max_diagnostics),
        }
    }

    fn location(&self, span: Span) -> Location {
        Location::new(self.source.clone(), span)
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        let diagnostic = Diagnostic::error(DiagnosticKind::Binding, message, self.location(span));
        self.diagnostics.push(diagnostic);
    }

    fn warning(&mut self, message: impl Into<String>, span: Span) {
        let diagnostic =
            Diagnostic::warning(DiagnosticKind::Binding, message, self.location(span));
        self.diagnostics.push(diagnostic);
    }

    fn build_operation(
        &mut self,
        operation: &syntax::OperationDefinition,
    ) -> Option<OperationDefinition> {
        let Some(name) = operation.name.clone() else {
            self.error(
                "Operations must be named",
                Span::new(operation.span.start, operation.span.start),
            );
            return None;
        };
        let name_span = operation.name_span.unwrap_or(operation.span);

        let schema = self.schema;
        let Some(type_name) = schema.root_type(operation.kind) else {
            self.error(
                format!(
                    "The schema does not support `{}` operations",
                    operation.kind.as_str()
                ),
                name_span,
            );
            return None;
        };

        let variable_definitions =
            self.build_variable_definitions(&operation.variable_definitions);
        let mut scope = Scope::operation(&name, &variable_definitions);

        let location_name = match operation.kind {
            syntax::OperationKind::Query => "QUERY",
            syntax::OperationKind::Mutation => "MUTATION",
            syntax::OperationKind::Subscription => "SUBSCRIPTION",
        };
        let (directives, _) =
            self.build_directives(&mut scope, &operation.directives, location_name);
        let selections = self.build_selections(&mut scope, type_name, &operation.selection_set);

        Some(OperationDefinition {
            kind: operation.kind,
            name,
            type_name: type_name.to_string(),
            variable_definitions,
            directives,
            selections,
            location: self.location(name_span),
        })
    }

    fn build_variable_definitions(
        &mut self,
        definitions: &[syntax::VariableDefinition],
    ) -> Vec<VariableDefinition> {
        let schema = self.schema;
        let mut built: Vec<VariableDefinition> = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if built.iter().any(|existing| existing.name == definition.name) {
                self.error(
                    format!("Duplicate variable `${}`", definition.name),
                    definition.span,
                );
                continue;
            }

            let value_type = TypeReference::from_syntax(&definition.var_type);
            match schema.type_by_name(value_type.inner_type()) {
                None => {
                    self.error(
                        format!(
                            "Variable `${}` has unknown type `{}`",
                            definition.name,
                            value_type.inner_type()
                        ),
                        definition.span,
                    );
                    continue;
                }
                Some(type_def) if !type_def.is_input_type() => {
                    self.error(
                        format!(
                            "Variable `${}` cannot be of non-input type `{}`",
                            definition.name, value_type
                        ),
                        definition.span,
                    );
                    continue;
                }
                Some(_) => {}
            }

            let default_value = definition.default_value.as_ref().and_then(|value| {
                self.build_constant_value(value, &value_type, definition.span)
            });

            built.push(VariableDefinition {
                name: definition.name.clone(),
                value_type,
                default_value,
                location: self.location(definition.span),
            });
        }

        built
    }

    fn build_fragment(
        &mut self,
        fragment: &syntax::FragmentDefinition,
    ) -> Option<FragmentDefinition> {
        let schema = self.schema;
        match schema.type_by_name(&fragment.type_condition) {
            None => {
                self.error(
                    format!("Unknown type `{}`", fragment.type_condition),
                    fragment.type_condition_span,
                );
                return None;
            }
            Some(type_def) if !type_def.is_composite() => {
                self.error(
                    format!(
                        "Fragment `{}` cannot condition on non composite type `{}`",
                        fragment.name, fragment.type_condition
                    ),
                    fragment.type_condition_span,
                );
                return None;
            }
            Some(_) => {}
        }

        // signatures were validated while they were collected
        let variable_definitions = self
            .signatures
            .get(&fragment.name)
            .map(|signature| signature.variable_definitions.clone())
            .unwrap_or_default();
        let mut scope = Scope::fragment(&fragment.name, &variable_definitions);
        let abstract_key = schema
            .is_abstract(&fragment.type_condition)
            .then(|| format!("__is{}", fragment.type_condition));

        let (directives, _) =
            self.build_directives(&mut scope, &fragment.directives, "FRAGMENT_DEFINITION");
        let selections =
            self.build_selections(&mut scope, &fragment.type_condition, &fragment.selection_set);

        Some(FragmentDefinition {
            name: fragment.name.clone(),
            type_condition: fragment.type_condition.clone(),
            abstract_key,
            variable_definitions,
            used_global_variables: scope.into_inferred(),
            directives,
            selections,
            location: self.location(fragment.name_span),
        })
    }
}

#[cfg(test)]
mod tests {
    use graphql_syntax::parse_query;

    use super::{bind, collect_signatures, BindOptions, FragmentSignatures};
    use crate::diagnostics::Severity;
    use crate::ir::{Selection, SourceId};
    use crate::schema::load_schema;

    const SCHEMA: &str = r#"
        enum Size { SMALL LARGE }
        input PictureOptions { size: Size = SMALL, scale: Float }
        interface Node { id: ID! }
        type User implements Node {
          id: ID!
          name: String
          oldName: String @deprecated(reason: "use name")
          age: Int
          picture(size: Size, options: PictureOptions, ids: [ID!]): String
          friends(first: Int!, after: String): [User]
        }
        type Query { me: User, node(id: ID!): Node }
    "#;

    fn bind_source(text: &str) -> Result<super::BoundDocument, Vec<String>> {
        let schema = load_schema(SCHEMA).expect("schema to load");
        let source = SourceId::new("test.graphql");
        let document = parse_query(text).expect("document to parse");
        let mut signatures = FragmentSignatures::default();
        let (collected, errors) = collect_signatures(&source, &document, &schema);
        assert!(errors.is_empty(), "{:?}", errors);
        for signature in collected {
            signatures.insert(signature).expect("unique fragment names");
        }
        bind(&source, &document, &schema, &signatures, BindOptions::default())
            .map_err(|diagnostics| diagnostics.into_iter().map(|d| d.message).collect())
    }

    #[test]
    fn reports_every_independent_error() {
        let errors = bind_source(
            r#"
            query Q($unused: Boolean, $id: ID!) {
              me { nope name { x } friends { id } }
              node(id: $id, extra: 1) { id }
              other: node { id }
            }
            "#,
        )
        .expect_err("binding should fail");
        insta::assert_snapshot!(errors.join("\n"), @r"
        The type `User` has no field `nope`
        Field `name` of type `String` must not have a selection since type `String` has no subfields
        Missing required argument `first` of type `Int!` on field `User.friends`
        Unknown argument `extra` on field `Query.node`
        Missing required argument `id` of type `ID!` on field `Query.node`
        ");
    }

    #[test]
    fn literal_values_are_type_checked() {
        let errors = bind_source(
            r#"
            query Q {
              me {
                a: picture(size: MEDIUM)
                b: picture(options: {scale: "big", unknown: 1})
                c: picture(ids: ["1", 2, 3.5])
                d: friends(first: 3000000000) { id }
              }
            }
            "#,
        )
        .expect_err("binding should fail");
        insta::assert_snapshot!(errors.join("\n"), @r#"
        Expected a value of type `Size`, found MEDIUM
        Expected a value of type `Float`, found "big"
        Unknown field `unknown` on input type `PictureOptions`
        Expected a value of type `ID`, found 3.5
        Expected a value of type `Int`, found 3000000000
        "#);
    }

    #[test]
    fn variables_must_fit_their_location() {
        let errors = bind_source(
            r#"
            query Q($first: Int, $size: String) {
              me { friends(first: $first) { id } picture(size: $size) missing: picture(size: $nope) }
            }
            "#,
        )
        .expect_err("binding should fail");
        insta::assert_snapshot!(errors.join("\n"), @r"
        Variable `$first` of type `Int` cannot be used where `Int!` is expected
        Variable `$size` of type `String` cannot be used where `Size` is expected
        Variable `$nope` is not defined by operation `Q`
        ");
    }

    #[test]
    fn deprecated_fields_warn() {
        let bound = bind_source("query Q { me { oldName } }").expect("to bind");
        assert_eq!(bound.warnings.len(), 1);
        assert_eq!(bound.warnings[0].severity, Severity::Warning);
        assert_eq!(
            bound.warnings[0].message,
            "The field `User.oldName` is deprecated: use name"
        );
    }

    #[test]
    fn fragment_variables_become_root_arguments() {
        let bound = bind_source(
            r#"
            fragment F on User {
              friends(first: $count) { id }
              picture(size: $size)
            }
            "#,
        )
        .expect("to bind");
        let fragment = &bound.fragments[0];
        let roots: Vec<String> = fragment
            .used_global_variables
            .iter()
            .map(|def| format!("{}: {}", def.name, def.value_type))
            .collect();
        assert_eq!(roots, vec!["count: Int!", "size: Size"]);
    }

    #[test]
    fn conditions_wrap_selections() {
        let bound =
            bind_source("query Q($show: Boolean!) { me { name @include(if: $show) @skip(if: false) } }")
                .expect("to bind");
        let Selection::LinkedField(me) = &bound.operations[0].selections[0] else {
            panic!("expected linked field");
        };
        let Selection::Condition(include) = &me.selections[0] else {
            panic!("expected a condition");
        };
        assert!(include.passing_value);
        let Selection::Condition(skip) = &include.selections[0] else {
            panic!("expected a nested condition");
        };
        assert!(!skip.passing_value);
        assert_eq!(skip.constant_outcome(), Some(true));
        assert!(matches!(skip.selections[0], Selection::ScalarField(_)));
    }

    #[test]
    fn anonymous_operations_are_rejected() {
        let errors = bind_source("{ me { id } }").expect_err("binding should fail");
        assert_eq!(errors, vec!["Operations must be named"]);
    }

    #[test]
    fn diagnostics_are_capped() {
        let schema = load_schema(SCHEMA).expect("schema to load");
        let source = SourceId::new("test.graphql");
        let fields = (0..20).map(|i| format!("f{}", i)).collect::<Vec<_>>().join(" ");
        let document = parse_query(&format!("query Q {{ me {{ {} }} }}", fields)).unwrap();
        let errors = bind(
            &source,
            &document,
            &schema,
            &FragmentSignatures::default(),
            BindOptions { max_diagnostics: 5 },
        )
        .expect_err("binding should fail");
        assert_eq!(errors.len(), 6);
        assert_eq!(errors[5].message, "Too many errors");
    }
}
