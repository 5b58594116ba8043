use std::collections::HashMap;

use graphql_syntax::query::{parse_type, Definition, Document, Value};
use tracing::instrument;

use crate::build::Builder;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{Location, SourceId, VariableDefinition};
use crate::schema::{SchemaModel, TypeReference};

/// What a spread needs to know about a fragment without binding its body.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSignature {
    pub name: String,
    pub type_condition: String,
    /// Local arguments from `@argumentDefinitions`.
    pub variable_definitions: Vec<VariableDefinition>,
    pub location: Location,
}

impl FragmentSignature {
    pub fn local_argument(&self, name: &str) -> Option<&VariableDefinition> {
        self.variable_definitions.iter().find(|def| def.name == name)
    }
}

/// Signatures of every fragment in a batch, by name.
#[derive(Debug, Clone, Default)]
pub struct FragmentSignatures {
    signatures: HashMap<String, FragmentSignature>,
}

impl FragmentSignatures {
    pub fn get(&self, name: &str) -> Option<&FragmentSignature> {
        self.signatures.get(name)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Registers `signature`, failing if the name is already taken.
    pub fn insert(&mut self, signature: FragmentSignature) -> Result<(), Diagnostic> {
        if let Some(existing) = self.signatures.get(&signature.name) {
            return Err(Diagnostic::error(
                DiagnosticKind::Binding,
                format!("Duplicate definition of fragment `{}`", signature.name),
                signature.location.clone(),
            )
            .with_related(existing.location.clone()));
        }
        self.signatures.insert(signature.name.clone(), signature);
        Ok(())
    }
}

/// Reads the signature of every fragment defined in `document`.
#[instrument(level = "trace", skip_all, fields(source = %source))]
pub fn collect_signatures(
    source: &SourceId,
    document: &Document,
    schema: &SchemaModel,
) -> (Vec<FragmentSignature>, Vec<Diagnostic>) {
    let no_signatures = FragmentSignatures::default();
    let mut builder = Builder::new(schema, &no_signatures, source.clone(), usize::MAX);
    let mut signatures = vec![];

    for definition in &document.definitions {
        let Definition::Fragment(fragment) = definition else {
            continue;
        };

        let mut variable_definitions: Vec<VariableDefinition> = vec![];
        for directive in fragment
            .directives
            .iter()
            .filter(|d| d.name == "argumentDefinitions")
        {
            for argument in &directive.arguments {
                if variable_definitions.iter().any(|def| def.name == argument.name) {
                    builder.error(
                        format!(
                            "Duplicate argument definition `{}` on fragment `{}`",
                            argument.name, fragment.name
                        ),
                        argument.span,
                    );
                    continue;
                }

                let Value::Object(fields) = &argument.value else {
                    builder.error(
                        format!(
                            "Expected the definition of argument `{}` to be an object like `{{type: \"Int\", defaultValue: 1}}`",
                            argument.name
                        ),
                        argument.value_span,
                    );
                    continue;
                };

                let type_source = fields.iter().find_map(|(name, value)| match value {
                    Value::String(type_source) if name == "type" => Some(type_source),
                    _ => None,
                });
                let Some(type_source) = type_source else {
                    builder.error(
                        format!(
                            "Expected the definition of argument `{}` to declare its `type` as a string",
                            argument.name
                        ),
                        argument.value_span,
                    );
                    continue;
                };

                let value_type = match parse_type(type_source) {
                    Ok(parsed) => TypeReference::from_syntax(&parsed),
                    Err(error) => {
                        builder.error(
                            format!(
                                "Invalid type `{}` for argument `{}`: {}",
                                type_source, argument.name, error.message
                            ),
                            argument.value_span,
                        );
                        continue;
                    }
                };

                if !schema.is_input_type(value_type.inner_type()) {
                    builder.error(
                        format!(
                            "Argument `{}` of fragment `{}` must have an input type, found `{}`",
                            argument.name, fragment.name, value_type
                        ),
                        argument.value_span,
                    );
                    continue;
                }

                let default_value = fields
                    .iter()
                    .find(|(name, _)| name == "defaultValue")
                    .and_then(|(_, value)| {
                        builder.build_constant_value(value, &value_type, argument.value_span)
                    });

                for (name, _) in fields {
                    if name != "type" && name != "defaultValue" {
                        builder.error(
                            format!(
                                "Unknown key `{}` in the definition of argument `{}`",
                                name, argument.name
                            ),
                            argument.value_span,
                        );
                    }
                }

                variable_definitions.push(VariableDefinition {
                    name: argument.name.clone(),
                    value_type,
                    default_value,
                    location: builder.location(argument.span),
                });
            }
        }

        signatures.push(FragmentSignature {
            name: fragment.name.clone(),
            type_condition: fragment.type_condition.clone(),
            variable_definitions,
            location: builder.location(fragment.name_span),
        });
    }

    (signatures, builder.diagnostics.into_inner())
}

#[cfg(test)]
mod tests {
    use graphql_syntax::parse_query;

    use super::{collect_signatures, FragmentSignatures};
    use crate::ir::{ConstantValue, SourceId};
    use crate::schema::load_schema;

    #[test]
    fn reads_argument_definitions() {
        let schema = load_schema("type Query { a: Int }").unwrap();
        let document = parse_query(
            r#"fragment F on Query @argumentDefinitions(count: {type: "Int!", defaultValue: 10}, cursor: {type: "String"}) { a }"#,
        )
        .unwrap();
        let (signatures, errors) =
            collect_signatures(&SourceId::new("a.graphql"), &document, &schema);
        assert!(errors.is_empty());
        let signature = &signatures[0];
        assert_eq!(signature.type_condition, "Query");
        let count = signature.local_argument("count").unwrap();
        assert_eq!(count.value_type.to_string(), "Int!");
        assert_eq!(count.default_value, Some(ConstantValue::Int(10)));
        assert!(!count.is_required());
        assert!(signature.local_argument("cursor").unwrap().default_value.is_none());
    }

    #[test]
    fn rejects_bad_definitions() {
        let schema = load_schema("type Query { a: Int }").unwrap();
        let document = parse_query(
            r#"fragment F on Query @argumentDefinitions(a: 1, b: {type: "Query"}, c: {type: "[Int"}, d: {type: "Int", defaultValue: "x"}) { a }"#,
        )
        .unwrap();
        let (_, errors) = collect_signatures(&SourceId::new("a.graphql"), &document, &schema);
        let messages: Vec<_> = errors.into_iter().map(|d| d.message).collect();
        insta::assert_snapshot!(messages.join("\n"), @r#"
        Expected the definition of argument `a` to be an object like `{type: "Int", defaultValue: 1}`
        Argument `b` of fragment `F` must have an input type, found `Query`
        Invalid type `[Int` for argument `c`: Expected `]`, found <EOF>
        Expected a value of type `Int`, found "x"
        "#);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let schema = load_schema("type Query { a: Int }").unwrap();
        let source = SourceId::new("a.graphql");
        let document = parse_query("fragment F on Query { a } fragment F on Query { a }").unwrap();
        let (collected, _) = collect_signatures(&source, &document, &schema);
        let mut signatures = FragmentSignatures::default();
        let mut results = collected.into_iter().map(|s| signatures.insert(s));
        assert!(results.next().unwrap().is_ok());
        let error = results.next().unwrap().unwrap_err();
        assert_eq!(error.message, "Duplicate definition of fragment `F`");
        assert_eq!(error.related.len(), 1);
    }
}
