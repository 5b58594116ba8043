use combine::{between, choice, many1, optional, parser, position, Parser, StdParseResult};

use crate::error::ParseError;
use crate::helpers::{
    arguments, const_value, directives, end_position, ident, name, name_except, parse_all, punct,
    spanned_name, type_reference,
};
use crate::position::Span;
use crate::query::ast::*;
use crate::tokenizer::{ParseLimits, TokenStream};

/// Parses an executable document (operations and fragments).
pub fn parse_query(source: &str) -> Result<Document, ParseError> {
    parse_query_with_limits(source, ParseLimits::default())
}

/// Same as [`parse_query`], but fails once the document holds more than
/// `token_limit` tokens.
pub fn parse_query_with_limit(source: &str, token_limit: usize) -> Result<Document, ParseError> {
    parse_query_with_limits(
        source,
        ParseLimits {
            max_tokens: Some(token_limit),
            ..ParseLimits::default()
        },
    )
}

/// Parses an executable document under explicit token and nesting bounds.
pub fn parse_query_with_limits(source: &str, limits: ParseLimits) -> Result<Document, ParseError> {
    parse_all(
        source,
        limits,
        many1(parser(definition))
            .expected("a definition")
            .map(|definitions| Document { definitions }),
    )
}

/// Parses a standalone type reference such as `[ID!]!`.
pub fn parse_type(source: &str) -> Result<Type, ParseError> {
    parse_all(source, ParseLimits::default(), parser(type_reference))
}

pub(crate) fn definition<'a>(input: &mut TokenStream<'a>) -> StdParseResult<Definition, TokenStream<'a>> {
    choice((
        parser(operation_definition).map(Definition::Operation),
        parser(fragment_definition).map(Definition::Fragment),
    ))
    .parse_stream(input)
    .into_result()
}

fn operation_kind<'a>() -> impl Parser<TokenStream<'a>, Output = OperationKind> {
    choice((
        ident("query").map(|_| OperationKind::Query),
        ident("mutation").map(|_| OperationKind::Mutation),
        ident("subscription").map(|_| OperationKind::Subscription),
    ))
}

fn operation_definition<'a>(
    input: &mut TokenStream<'a>,
) -> StdParseResult<OperationDefinition, TokenStream<'a>> {
    let shorthand = (position(), parser(selection_set), end_position()).map(
        |(start, selection_set, end)| OperationDefinition {
            span: Span::new(start, end),
            kind: OperationKind::Query,
            name: None,
            name_span: None,
            variable_definitions: vec![],
            directives: vec![],
            selection_set,
        },
    );

    let named = (
        position(),
        operation_kind(),
        optional(spanned_name()),
        optional(between(
            punct("("),
            punct(")"),
            many1(variable_definition()).expected("a variable definition"),
        )),
        directives(false),
        parser(selection_set),
        end_position(),
    )
        .map(
            |(start, kind, name, variable_definitions, directives, selection_set, end)| {
                let (name, name_span) = name.unzip();
                OperationDefinition {
                    span: Span::new(start, end),
                    kind,
                    name,
                    name_span,
                    variable_definitions: variable_definitions.unwrap_or_default(),
                    directives,
                    selection_set,
                }
            },
        );

    choice((shorthand, named)).parse_stream(input).into_result()
}

fn variable_definition<'a>() -> impl Parser<TokenStream<'a>, Output = VariableDefinition> {
    (
        position(),
        punct("$").with(name()),
        punct(":").with(parser(type_reference)),
        optional(punct("=").with(parser(const_value))),
        directives(true),
        end_position(),
    )
        .map(
            |(start, name, var_type, default_value, directives, end)| VariableDefinition {
                span: Span::new(start, end),
                name,
                var_type,
                default_value,
                directives,
            },
        )
}

fn fragment_definition<'a>(
    input: &mut TokenStream<'a>,
) -> StdParseResult<FragmentDefinition, TokenStream<'a>> {
    (
        position(),
        ident("fragment"),
        name_except(&["on"], "a fragment name"),
        ident("on").with(spanned_name()),
        directives(false),
        parser(selection_set),
        end_position(),
    )
        .map(
            |(start, _, (name, name_span), (type_condition, type_condition_span), directives, selection_set, end)| {
                FragmentDefinition {
                    span: Span::new(start, end),
                    name,
                    name_span,
                    type_condition,
                    type_condition_span,
                    directives,
                    selection_set,
                }
            },
        )
        .parse_stream(input)
        .into_result()
}

fn selection_set<'a>(input: &mut TokenStream<'a>) -> StdParseResult<SelectionSet, TokenStream<'a>> {
    (
        position(),
        between(
            punct("{"),
            punct("}"),
            many1(parser(selection)).expected("a selection"),
        ),
        end_position(),
    )
        .map(|(start, items, end)| SelectionSet {
            span: Span::new(start, end),
            items,
        })
        .parse_stream(input)
        .into_result()
}

fn selection<'a>(input: &mut TokenStream<'a>) -> StdParseResult<Selection, TokenStream<'a>> {
    choice((parser(field).map(Selection::Field), parser(fragment_selection)))
        .parse_stream(input)
        .into_result()
}

fn field<'a>(input: &mut TokenStream<'a>) -> StdParseResult<Field, TokenStream<'a>> {
    (
        position(),
        spanned_name(),
        optional(punct(":").with(spanned_name())),
        arguments(false),
        directives(false),
        end_position(),
        optional(parser(selection_set)),
        end_position(),
    )
        .map(
            |(start, first, aliased, arguments, directives, head_end, selection_set, end)| {
                let (alias, (name, name_span)) = match aliased {
                    Some(name) => (Some(first.0), name),
                    None => (None, first),
                };
                Field {
                    span: Span::new(start, end),
                    alias,
                    name,
                    name_span,
                    arguments,
                    directives,
                    selection_set: selection_set.unwrap_or_else(|| SelectionSet {
                        span: Span::new(head_end, head_end),
                        items: vec![],
                    }),
                }
            },
        )
        .parse_stream(input)
        .into_result()
}

enum FragmentTail {
    Spread(String, Span, Vec<Directive>),
    Inline(Option<(String, Span)>, Vec<Directive>, SelectionSet),
}

fn fragment_selection<'a>(input: &mut TokenStream<'a>) -> StdParseResult<Selection, TokenStream<'a>> {
    let spread = (name_except(&["on"], "a fragment name"), directives(false))
        .map(|((name, span), directives)| FragmentTail::Spread(name, span, directives));
    let inline = (
        optional(ident("on").with(spanned_name())),
        directives(false),
        parser(selection_set),
    )
        .map(|(condition, directives, selection_set)| {
            FragmentTail::Inline(condition, directives, selection_set)
        });

    (
        position(),
        punct("..."),
        choice((spread, inline)),
        end_position(),
    )
        .map(|(start, _, tail, end)| {
            let span = Span::new(start, end);
            match tail {
                FragmentTail::Spread(fragment_name, name_span, directives) => {
                    Selection::FragmentSpread(FragmentSpread {
                        span,
                        fragment_name,
                        name_span,
                        directives,
                    })
                }
                FragmentTail::Inline(condition, directives, selection_set) => {
                    let (type_condition, type_condition_span) = condition.unzip();
                    Selection::InlineFragment(InlineFragment {
                        span,
                        type_condition,
                        type_condition_span,
                        directives,
                        selection_set,
                    })
                }
            }
        })
        .parse_stream(input)
        .into_result()
}

#[cfg(test)]
mod tests {
    use super::{parse_query, parse_query_with_limit, parse_query_with_limits, parse_type};
    use crate::query::ast::*;
    use crate::tokenizer::ParseLimits;

    #[test]
    fn parses_operation_with_fragment() {
        let document = parse_query(
            "query Q($id: ID!, $n: Int = 10) { node(id: $id) { ...F @include(if: true) } } fragment F on User { name }",
        )
        .expect("to parse");

        assert_eq!(document.definitions.len(), 2);
        let op = document.operations().next().unwrap();
        assert_eq!(op.kind, OperationKind::Query);
        assert_eq!(op.name.as_deref(), Some("Q"));
        assert_eq!(op.variable_definitions.len(), 2);
        assert_eq!(op.variable_definitions[1].default_value, Some(Value::Int(10)));

        let Selection::Field(node) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        assert_eq!(node.name, "node");
        assert_eq!(node.arguments[0].value, Value::Variable("id".to_string()));
        let Selection::FragmentSpread(spread) = &node.selection_set.items[0] else {
            panic!("expected a spread");
        };
        assert_eq!(spread.fragment_name, "F");
        assert_eq!(spread.directives[0].name, "include");

        let fragment = document.fragments().next().unwrap();
        assert_eq!(fragment.type_condition, "User");
    }

    #[test]
    fn parses_alias_and_inline_fragments() {
        let document =
            parse_query("{ a: me { ... on User { id } ... @skip(if: $x) { id } } }").unwrap();
        let op = document.operations().next().unwrap();
        assert!(op.name.is_none());
        let Selection::Field(me) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        assert_eq!(me.alias.as_deref(), Some("a"));
        assert_eq!(me.response_key(), "a");
        let Selection::InlineFragment(first) = &me.selection_set.items[0] else {
            panic!("expected an inline fragment");
        };
        assert_eq!(first.type_condition.as_deref(), Some("User"));
        let Selection::InlineFragment(second) = &me.selection_set.items[1] else {
            panic!("expected an inline fragment");
        };
        assert!(second.type_condition.is_none());
    }

    #[test]
    fn field_name_span_points_at_name() {
        let source = "query Q { me { does_not_exist } }";
        let document = parse_query(source).unwrap();
        let op = document.operations().next().unwrap();
        let Selection::Field(me) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        let Selection::Field(field) = &me.selection_set.items[0] else {
            panic!("expected a field");
        };
        assert_eq!(field.name_span.text(source), Some("does_not_exist"));
        assert_eq!(field.name_span.start.column, 16);
        assert_eq!(field.name_span.end.column, 30);
        assert_eq!(me.span.text(source), Some("me { does_not_exist }"));
        assert_eq!(op.span.text(source), Some(source));
    }

    #[test]
    fn unmatched_brace_reports_offending_token() {
        let error = parse_query("query Q { me { { } } }").unwrap_err();
        assert!(error.message.starts_with("Expected"), "{}", error.message);
        assert!(error.message.ends_with("found `{`"), "{}", error.message);
        assert_eq!(error.span.start.line, 1);
        assert_eq!(error.span.start.column, 16);
        assert_eq!(error.span.end.column, 17);
    }

    #[test]
    fn empty_selection_set_reports_closing_brace() {
        let error = parse_query("query Q { }").unwrap_err();
        assert!(error.message.ends_with("found `}`"), "{}", error.message);
        assert_eq!(error.span.start.column, 11);
    }

    #[test]
    fn unexpected_end_of_file() {
        let error = parse_query("query Q { me ").unwrap_err();
        assert!(error.message.contains("`}`"), "{}", error.message);
        assert!(error.message.ends_with("found <EOF>"), "{}", error.message);
    }

    #[test]
    fn variables_are_not_constant() {
        let error = parse_query("query Q($a: Int = $b) { me }").unwrap_err();
        assert_eq!(error.message, "Expected a constant value, found `$`");
        assert_eq!(error.span.start.column, 19);
    }

    #[test]
    fn fragment_named_on_is_rejected() {
        assert!(parse_query("fragment on on User { id }").is_err());
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let error = parse_query("{ a } }").unwrap_err();
        assert_eq!(error.span.start.column, 7);
    }

    #[test]
    fn token_limit() {
        let error = parse_query_with_limit("{ a b c d e f g }", 4).unwrap_err();
        assert_eq!(error.message, "Document exceeds the token limit of 4");
    }

    #[test]
    fn standalone_type() {
        assert_eq!(parse_type("[ID!]!").unwrap().to_string(), "[ID!]!");
        assert!(parse_type("Int Int").is_err());
    }

    #[test]
    fn empty_document() {
        let error = parse_query("  # nothing here\n").unwrap_err();
        assert_eq!(error.message, "Expected a definition, found <EOF>");
    }

    #[test]
    fn deeply_nested_list_value_is_rejected() {
        let depth = 10_000;
        let source = format!(
            "query Deep {{ search(term: {}1{}) {{ __typename }} }}",
            "[".repeat(depth),
            "]".repeat(depth)
        );
        let error = parse_query_with_limit(&source, 100_000).unwrap_err();
        assert_eq!(error.message, "Exceeded the maximum nesting depth of 64");
        assert_eq!(error.span.start.line, 1);
    }

    #[test]
    fn deeply_nested_object_value_is_rejected() {
        let depth = 10_000;
        let source = format!(
            "{{ search(term: {}1{}) }}",
            "{a: ".repeat(depth),
            "}".repeat(depth)
        );
        let error = parse_query(&source).unwrap_err();
        assert_eq!(error.message, "Exceeded the maximum nesting depth of 64");
    }

    #[test]
    fn deeply_nested_selections_are_rejected() {
        let depth = 10_000;
        let source = format!("{}{}", "{ a ".repeat(depth), "}".repeat(depth));
        let error = parse_query(&source).unwrap_err();
        assert_eq!(error.message, "Exceeded the maximum nesting depth of 64");
        // the 65th `{` is the first one past the limit
        assert_eq!(error.span.start.column, 64 * 4 + 1);
    }

    #[test]
    fn nesting_limit_is_configurable() {
        let limits = ParseLimits {
            max_tokens: None,
            max_depth: 3,
        };
        assert!(parse_query_with_limits("{ a { b } }", limits).is_ok());
        let error = parse_query_with_limits("{ a { b { c { d } } } }", limits).unwrap_err();
        assert_eq!(error.message, "Exceeded the maximum nesting depth of 3");
        assert_eq!(error.span.start.column, 13);
    }
}
