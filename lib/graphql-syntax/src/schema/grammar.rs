use combine::easy::{Error, Info};
use combine::{
    between, choice, many, many1, optional, parser, position, sep_by1, Parser, StdParseResult,
};

use crate::error::ParseError;
use crate::helpers::{
    const_value, description, directives, end_position, ident, kind, name, name_except,
    parse_all, punct, type_reference,
};
use crate::position::{Pos, Span};
use crate::schema::ast::*;
use crate::tokenizer::{Kind, ParseLimits, Token, TokenStream};

/// Parses a type-system document (SDL).
pub fn parse_schema(source: &str) -> Result<Document, ParseError> {
    parse_schema_with_limits(source, ParseLimits::default())
}

pub fn parse_schema_with_limits(source: &str, limits: ParseLimits) -> Result<Document, ParseError> {
    parse_all(
        source,
        limits,
        many(parser(definition)).map(|definitions| Document { definitions }),
    )
}

fn definition<'a>(input: &mut TokenStream<'a>) -> StdParseResult<Definition, TokenStream<'a>> {
    (
        position(),
        description(),
        choice((
            // a description on `schema` is accepted and dropped
            schema_body().map(Definition::SchemaDefinition),
            parser(directive_definition).map(Definition::DirectiveDefinition),
            ident("extend").with(choice((
                schema_body().map(Definition::SchemaExtension),
                parser(type_definition)
                    .expected("a type extension")
                    .map(|type_def| Definition::TypeExtension(TypeExtension(type_def))),
            ))),
            parser(type_definition).map(Definition::TypeDefinition),
        ))
        .expected("a type system definition"),
        end_position(),
    )
        .map(|(start, description, mut definition, end)| {
            let span = Span::new(start, end);
            match &mut definition {
                Definition::SchemaDefinition(schema) | Definition::SchemaExtension(schema) => {
                    schema.span = span;
                }
                Definition::DirectiveDefinition(directive) => {
                    directive.span = span;
                    directive.description = description;
                }
                Definition::TypeDefinition(type_def) => {
                    type_def.set_header(span, description);
                }
                Definition::TypeExtension(TypeExtension(type_def)) => {
                    type_def.set_header(span, None);
                }
            }
            definition
        })
        .parse_stream(input)
        .into_result()
}

impl TypeDefinition {
    fn set_header(&mut self, span: Span, description: Option<String>) {
        let (target_span, target_description) = match self {
            TypeDefinition::Scalar(t) => (&mut t.span, &mut t.description),
            TypeDefinition::Object(t) => (&mut t.span, &mut t.description),
            TypeDefinition::Interface(t) => (&mut t.span, &mut t.description),
            TypeDefinition::Union(t) => (&mut t.span, &mut t.description),
            TypeDefinition::Enum(t) => (&mut t.span, &mut t.description),
            TypeDefinition::InputObject(t) => (&mut t.span, &mut t.description),
        };
        *target_span = span;
        *target_description = description;
    }
}

enum RootOperation {
    Query,
    Mutation,
    Subscription,
}

fn root_operation_kind(token: Token<'_>) -> Result<RootOperation, Error<Token<'_>, Token<'_>>> {
    match token.value {
        "query" => Ok(RootOperation::Query),
        "mutation" => Ok(RootOperation::Mutation),
        "subscription" => Ok(RootOperation::Subscription),
        other => Err(Error::Message(Info::Owned(format!(
            "Unknown root operation type `{}`",
            other
        )))),
    }
}

fn root_operation<'a>() -> impl Parser<TokenStream<'a>, Output = (RootOperation, String)> {
    (
        kind(Kind::Name).and_then(root_operation_kind),
        punct(":").with(name()),
    )
}

fn schema_body<'a>() -> impl Parser<TokenStream<'a>, Output = SchemaDefinition> {
    (
        ident("schema"),
        directives(true),
        optional(between(
            punct("{"),
            punct("}"),
            many1(root_operation()).expected("a root operation type"),
        )),
    )
        .map(|(_, directives, operations)| {
            let mut schema = SchemaDefinition {
                directives,
                ..Default::default()
            };
            let operations: Vec<(RootOperation, String)> = operations.unwrap_or_default();
            for (operation, type_name) in operations {
                match operation {
                    RootOperation::Query => schema.query = Some(type_name),
                    RootOperation::Mutation => schema.mutation = Some(type_name),
                    RootOperation::Subscription => schema.subscription = Some(type_name),
                }
            }
            schema
        })
}

/// Type definitions come out with an empty header, filled in by `definition`.
fn type_definition<'a>(input: &mut TokenStream<'a>) -> StdParseResult<TypeDefinition, TokenStream<'a>> {
    let header = Span::default();

    choice((
        (ident("scalar"), name(), directives(true)).map(move |(_, name, directives)| {
            TypeDefinition::Scalar(ScalarType {
                span: header,
                description: None,
                name,
                directives,
            })
        }),
        (
            ident("type"),
            name(),
            implements(),
            directives(true),
            fields_definition(),
        )
            .map(move |(_, name, implements_interfaces, directives, fields)| {
                TypeDefinition::Object(ObjectType {
                    span: header,
                    description: None,
                    name,
                    implements_interfaces,
                    directives,
                    fields,
                })
            }),
        (
            ident("interface"),
            name(),
            implements(),
            directives(true),
            fields_definition(),
        )
            .map(move |(_, name, implements_interfaces, directives, fields)| {
                TypeDefinition::Interface(InterfaceType {
                    span: header,
                    description: None,
                    name,
                    implements_interfaces,
                    directives,
                    fields,
                })
            }),
        (
            ident("union"),
            name(),
            directives(true),
            optional(
                punct("=")
                    .with(optional(punct("|")))
                    .with(sep_by1(name(), punct("|"))),
            ),
        )
            .map(move |(_, name, directives, types)| {
                TypeDefinition::Union(UnionType {
                    span: header,
                    description: None,
                    name,
                    directives,
                    types: types.unwrap_or_default(),
                })
            }),
        (
            ident("enum"),
            name(),
            directives(true),
            optional(between(punct("{"), punct("}"), many(enum_value()))),
        )
            .map(move |(_, name, directives, values)| {
                TypeDefinition::Enum(EnumType {
                    span: header,
                    description: None,
                    name,
                    directives,
                    values: values.unwrap_or_default(),
                })
            }),
        (
            ident("input"),
            name(),
            directives(true),
            optional(between(punct("{"), punct("}"), many(input_value()))),
        )
            .map(move |(_, name, directives, fields)| {
                TypeDefinition::InputObject(InputObjectType {
                    span: header,
                    description: None,
                    name,
                    directives,
                    fields: fields.unwrap_or_default(),
                })
            }),
    ))
    .parse_stream(input)
    .into_result()
}

fn implements<'a>() -> impl Parser<TokenStream<'a>, Output = Vec<String>> {
    optional(
        ident("implements")
            .with(optional(punct("&")))
            .with(sep_by1(name(), punct("&"))),
    )
    .map(|interfaces: Option<Vec<String>>| interfaces.unwrap_or_default())
}

fn fields_definition<'a>() -> impl Parser<TokenStream<'a>, Output = Vec<Field>> {
    optional(between(punct("{"), punct("}"), many(field())))
        .map(|fields: Option<Vec<Field>>| fields.unwrap_or_default())
}

fn arguments_definition<'a>() -> impl Parser<TokenStream<'a>, Output = Vec<InputValue>> {
    optional(between(
        punct("("),
        punct(")"),
        many1(input_value()).expected("an argument definition"),
    ))
    .map(|arguments: Option<Vec<InputValue>>| arguments.unwrap_or_default())
}

fn spanned<'a, P, T>(
    member: P,
) -> impl Parser<TokenStream<'a>, Output = (Pos, Option<String>, T, Pos)>
where
    P: Parser<TokenStream<'a>, Output = T>,
{
    (position(), description(), member, end_position())
}

fn field<'a>() -> impl Parser<TokenStream<'a>, Output = Field> {
    spanned((
        name(),
        arguments_definition(),
        punct(":").with(parser(type_reference)),
        directives(true),
    ))
    .map(
        |(start, description, (name, arguments, field_type, directives), end)| Field {
            span: Span::new(start, end),
            description,
            name,
            arguments,
            field_type,
            directives,
        },
    )
}

fn input_value<'a>() -> impl Parser<TokenStream<'a>, Output = InputValue> {
    spanned((
        name(),
        punct(":").with(parser(type_reference)),
        optional(punct("=").with(parser(const_value))),
        directives(true),
    ))
    .map(
        |(start, description, (name, value_type, default_value, directives), end)| InputValue {
            span: Span::new(start, end),
            description,
            name,
            value_type,
            default_value,
            directives,
        },
    )
}

fn enum_value<'a>() -> impl Parser<TokenStream<'a>, Output = EnumValue> {
    spanned((
        name_except(&["true", "false", "null"], "an enum value"),
        directives(true),
    ))
    .map(
        |(start, description, ((name, _), directives), end)| EnumValue {
            span: Span::new(start, end),
            description,
            name,
            directives,
        },
    )
}

fn directive_definition<'a>(
    input: &mut TokenStream<'a>,
) -> StdParseResult<DirectiveDefinition, TokenStream<'a>> {
    (
        ident("directive"),
        punct("@").with(name()),
        arguments_definition(),
        optional(ident("repeatable")),
        ident("on"),
        optional(punct("|")).with(sep_by1(name(), punct("|"))),
    )
        .map(
            |(_, name, arguments, repeatable, _, locations)| DirectiveDefinition {
                span: Span::default(),
                description: None,
                name,
                arguments,
                repeatable: repeatable.is_some(),
                locations,
            },
        )
        .parse_stream(input)
        .into_result()
}

#[cfg(test)]
mod tests {
    use super::{parse_schema, parse_schema_with_limits};
    use crate::schema::ast::*;
    use crate::tokenizer::ParseLimits;

    #[test]
    fn parses_types() {
        let document = parse_schema(
            r#"
            schema { query: Root }
            """
            A person
            """
            type User implements Node & Named @key(fields: "id") {
              id: ID!
              "the name"
              name(format: String = "short"): String
              friends(first: Int, after: String): [User!]!
            }
            interface Node { id: ID! }
            interface Named { name: String }
            union Entity = | User | Page
            enum Color { RED GREEN }
            input Filter { color: Color = RED, tags: [String!] }
            scalar DateTime @specifiedBy(url: "https://example.com")
            directive @key(fields: String!) repeatable on OBJECT | INTERFACE
            extend type User { age: Int }
            "#,
        )
        .expect("to parse");

        assert_eq!(document.schema_definition().unwrap().query.as_deref(), Some("Root"));

        let Some(TypeDefinition::Object(user)) = document.type_by_name("User") else {
            panic!("expected User");
        };
        assert_eq!(user.description.as_deref(), Some("A person"));
        assert_eq!(user.implements_interfaces, vec!["Node", "Named"]);
        assert_eq!(user.fields.len(), 3);
        assert_eq!(user.fields[1].description.as_deref(), Some("the name"));
        assert_eq!(
            user.fields[1].arguments[0].default_value,
            Some(Value::String("short".to_string()))
        );
        assert_eq!(user.fields[2].field_type.to_string(), "[User!]!");

        let Some(TypeDefinition::Union(entity)) = document.type_by_name("Entity") else {
            panic!("expected Entity");
        };
        assert_eq!(entity.types, vec!["User", "Page"]);

        let directive = document
            .definitions
            .iter()
            .find_map(|def| match def {
                Definition::DirectiveDefinition(d) => Some(d),
                _ => None,
            })
            .unwrap();
        assert!(directive.repeatable);
        assert_eq!(directive.locations, vec!["OBJECT", "INTERFACE"]);

        assert!(document
            .definitions
            .iter()
            .any(|def| matches!(def, Definition::TypeExtension(TypeExtension(TypeDefinition::Object(o))) if o.name == "User")));
    }

    #[test]
    fn definition_span_covers_description() {
        let source = "\"a scalar\" scalar Date @tag\nscalar Other";
        let document = parse_schema(source).unwrap();
        let date = document.type_by_name("Date").unwrap();
        assert_eq!(date.span().text(source), Some("\"a scalar\" scalar Date @tag"));
    }

    #[test]
    fn reports_error_location() {
        let error = parse_schema("type User {\n  name String\n}").unwrap_err();
        assert!(error.message.contains("`:`"), "{}", error.message);
        assert!(error.message.ends_with("found Name `String`"), "{}", error.message);
        assert_eq!((error.span.start.line, error.span.start.column), (2, 8));
    }

    #[test]
    fn rejects_unknown_definition() {
        assert!(parse_schema("typo User { id: ID }").is_err());
    }

    #[test]
    fn rejects_unknown_root_operation() {
        let error = parse_schema("schema { query: Q, fetch: F }").unwrap_err();
        assert_eq!(error.message, "Unknown root operation type `fetch`");
    }

    #[test]
    fn deeply_nested_type_reference_is_rejected() {
        let depth = 10_000;
        let source = format!(
            "type Query {{ f: {}Int{} }}",
            "[".repeat(depth),
            "]".repeat(depth)
        );
        let error = parse_schema(&source).unwrap_err();
        assert_eq!(error.message, "Exceeded the maximum nesting depth of 64");

        let limits = ParseLimits {
            max_tokens: None,
            max_depth: 4,
        };
        assert!(parse_schema_with_limits("type Query { f: [[[Int]]] }", limits).is_ok());
    }
}
