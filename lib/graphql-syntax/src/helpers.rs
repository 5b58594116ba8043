use std::marker::PhantomData;

use combine::easy::{Error, Info};
use combine::error::{Commit, Tracked};
use combine::{
    between, choice, eof, many, many1, optional, parser, position, satisfy, ParseResult, Parser,
    StdParseResult, StreamOnce,
};

use crate::common::{Argument, Directive, Type, Value};
use crate::error::ParseError;
use crate::position::{Pos, Span};
use crate::tokenizer::{
    unquote_block_string, unquote_string, InternalError, Kind, ParseLimits, Token, TokenStream,
};

/// Matches a single token by kind and, optionally, by its exact text.
#[derive(Debug, Clone)]
pub(crate) struct Expect<'a> {
    kind: Kind,
    value: Option<&'static str>,
    phantom: PhantomData<&'a u8>,
}

pub(crate) fn kind<'a>(kind: Kind) -> Expect<'a> {
    Expect {
        kind,
        value: None,
        phantom: PhantomData,
    }
}

pub(crate) fn punct<'a>(value: &'static str) -> Expect<'a> {
    Expect {
        kind: Kind::Punctuator,
        value: Some(value),
        phantom: PhantomData,
    }
}

pub(crate) fn ident<'a>(value: &'static str) -> Expect<'a> {
    Expect {
        kind: Kind::Name,
        value: Some(value),
        phantom: PhantomData,
    }
}

impl<'a> Parser<TokenStream<'a>> for Expect<'a> {
    type Output = Token<'a>;
    type PartialState = ();

    #[inline]
    fn parse_lazy(
        &mut self,
        input: &mut TokenStream<'a>,
    ) -> ParseResult<Token<'a>, <TokenStream<'a> as StreamOnce>::Error> {
        let (kind, value) = (self.kind, self.value);
        satisfy(move |token: Token<'a>| {
            token.kind == kind && value.map_or(true, |value| token.value == value)
        })
        .parse_lazy(input)
    }

    fn add_error(&mut self, error: &mut Tracked<InternalError<'a>>) {
        let label = match self.value {
            Some(value) => format!("`{}`", value),
            None => self.kind.label().to_string(),
        };
        error.error.add_error(Error::Expected(Info::Owned(label)));
    }
}

/// Position right after the last consumed token, used to close spans.
pub(crate) fn end_position<'a>() -> impl Parser<TokenStream<'a>, Output = Pos> {
    parser(|input: &mut TokenStream<'a>| Ok((input.last_end(), Commit::Peek(()))))
}

pub(crate) fn name<'a>() -> impl Parser<TokenStream<'a>, Output = String> {
    kind(Kind::Name).map(|token| token.value.to_string())
}

pub(crate) fn spanned_name<'a>() -> impl Parser<TokenStream<'a>, Output = (String, Span)> {
    kind(Kind::Name).map(|token| (token.value.to_string(), token.span))
}

/// A name other than the listed keywords.
pub(crate) fn name_except<'a>(
    reserved: &'static [&'static str],
    expected: &'static str,
) -> impl Parser<TokenStream<'a>, Output = (String, Span)> {
    satisfy(move |token: Token<'a>| token.kind == Kind::Name && !reserved.contains(&token.value))
        .map(|token: Token<'a>| (token.value.to_string(), token.span))
        .expected(expected)
}

pub(crate) fn description<'a>() -> impl Parser<TokenStream<'a>, Output = Option<String>> {
    optional(choice((
        kind(Kind::StringValue).map(|token| unquote_string(token.value)),
        kind(Kind::BlockString).map(|token| unquote_block_string(token.value)),
    )))
}

pub(crate) fn type_reference<'a>(input: &mut TokenStream<'a>) -> StdParseResult<Type, TokenStream<'a>> {
    (
        choice((
            name().map(Type::NamedType),
            between(punct("["), punct("]"), parser(type_reference))
                .map(|item| Type::ListType(Box::new(item))),
        )),
        optional(punct("!")),
    )
        .map(|(inner, bang)| match bang {
            Some(_) => Type::NonNullType(Box::new(inner)),
            None => inner,
        })
        .parse_stream(input)
        .into_result()
}

fn literal<'a>(token: Token<'a>) -> Result<Value, Error<Token<'a>, Token<'a>>> {
    let out_of_range = |what: &str| {
        Error::Message(Info::Owned(format!("{} `{}` is out of range", what, token.value)))
    };
    match token.kind {
        Kind::IntValue => token
            .value
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| out_of_range("Integer")),
        Kind::FloatValue => token
            .value
            .parse::<f64>()
            .ok()
            .filter(|float| float.is_finite())
            .map(Value::Float)
            .ok_or_else(|| out_of_range("Float")),
        Kind::StringValue => Ok(Value::String(unquote_string(token.value))),
        Kind::BlockString => Ok(Value::String(unquote_block_string(token.value))),
        Kind::Name => Ok(match token.value {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            "null" => Value::Null,
            other => Value::Enum(other.to_string()),
        }),
        Kind::Punctuator => Err(Error::Unexpected(Info::Token(token))),
    }
}

fn value_of<'a>(constant: bool, input: &mut TokenStream<'a>) -> StdParseResult<Value, TokenStream<'a>> {
    let nested = move || parser(move |input: &mut TokenStream<'a>| value_of(constant, input));

    choice((
        satisfy(move |token: Token<'a>| !constant && token.is_punctuator("$"))
            .with(name())
            .map(Value::Variable),
        satisfy(|token: Token<'a>| token.kind != Kind::Punctuator).and_then(literal),
        between(punct("["), punct("]"), many(nested())).map(Value::List),
        between(
            punct("{"),
            punct("}"),
            many((name().skip(punct(":")), nested())),
        )
        .map(Value::Object),
    ))
    .expected(if constant { "a constant value" } else { "a value" })
    .parse_stream(input)
    .into_result()
}

pub(crate) fn value<'a>(input: &mut TokenStream<'a>) -> StdParseResult<Value, TokenStream<'a>> {
    value_of(false, input)
}

pub(crate) fn const_value<'a>(input: &mut TokenStream<'a>) -> StdParseResult<Value, TokenStream<'a>> {
    value_of(true, input)
}

fn argument_of<'a>(constant: bool) -> impl Parser<TokenStream<'a>, Output = Argument> {
    (
        position(),
        name(),
        punct(":"),
        position(),
        parser(move |input: &mut TokenStream<'a>| value_of(constant, input)),
        end_position(),
    )
        .map(|(start, name, _, value_start, value, end)| Argument {
            span: Span::new(start, end),
            name,
            value,
            value_span: Span::new(value_start, end),
        })
}

pub(crate) fn arguments<'a>(constant: bool) -> impl Parser<TokenStream<'a>, Output = Vec<Argument>> {
    optional(between(
        punct("("),
        punct(")"),
        many1(argument_of(constant)).expected("an argument"),
    ))
    .map(Option::unwrap_or_default)
}

pub(crate) fn directives<'a>(constant: bool) -> impl Parser<TokenStream<'a>, Output = Vec<Directive>> {
    many(
        (
            position(),
            punct("@"),
            spanned_name(),
            arguments(constant),
            end_position(),
        )
            .map(|(start, _, (name, name_span), arguments, end)| Directive {
                span: Span::new(start, end),
                name,
                name_span,
                arguments,
            }),
    )
}

/// Runs `grammar` over the whole of `source`.
pub(crate) fn parse_all<'a, T, P>(
    source: &'a str,
    limits: ParseLimits,
    grammar: P,
) -> Result<T, ParseError>
where
    P: Parser<TokenStream<'a>, Output = T>,
{
    let mut stream = TokenStream::with_limits(source, limits);
    let result = grammar.skip(eof()).parse_stream(&mut stream).into_result();
    match result {
        Ok((parsed, _)) => Ok(parsed),
        Err(error) => Err(stream
            .take_lexical_error()
            .unwrap_or_else(|| syntax_error(&stream, error.into_inner().error))),
    }
}

/// Renders combine's error set as `Expected <one of>, found <token>`,
/// spanning the offending token.
pub(crate) fn syntax_error<'a>(stream: &TokenStream<'a>, error: InternalError<'a>) -> ParseError {
    let mut expected: Vec<String> = vec![];
    let mut found: Option<Token<'a>> = None;
    let mut message: Option<String> = None;

    for item in error.errors {
        match item {
            Error::Unexpected(Info::Token(token)) | Error::Unexpected(Info::Range(token)) => {
                if found.is_none() {
                    found = Some(token);
                }
            }
            Error::Unexpected(_) => {}
            Error::Expected(info) => {
                let label = describe(info);
                if !expected.contains(&label) {
                    expected.push(label);
                }
            }
            Error::Message(info) => {
                message = message.or_else(|| Some(describe(info)));
            }
            Error::Other(other) => {
                message = message.or_else(|| Some(other.to_string()));
            }
        }
    }

    let found = found.or_else(|| stream.token_at(error.position));
    let span = found
        .map(|token| token.span)
        .unwrap_or_else(|| Span::new(error.position, error.position));

    if let Some(message) = message {
        return ParseError::new(message, span);
    }

    let found = found.map_or_else(|| "<EOF>".to_string(), |token| token.to_string());
    let message = match expected.split_last() {
        None => format!("Unexpected {}", found),
        Some((last, [])) => format!("Expected {}, found {}", last, found),
        Some((last, rest)) => format!("Expected {} or {}, found {}", rest.join(", "), last, found),
    };
    ParseError::new(message, span)
}

fn describe<'a>(info: Info<Token<'a>, Token<'a>>) -> String {
    match info {
        Info::Token(token) | Info::Range(token) => token.to_string(),
        Info::Owned(text) => text,
        Info::Static("end of input") => "<EOF>".to_string(),
        Info::Static(text) => text.to_string(),
    }
}
