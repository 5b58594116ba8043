use std::fmt;

use combine::easy::{Error, Errors, Info};
use combine::stream::ResetStream;
use combine::{Positioned, StreamOnce};

use crate::error::ParseError;
use crate::position::{Pos, Span};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Kind {
    Punctuator,
    Name,
    IntValue,
    FloatValue,
    StringValue,
    BlockString,
}

impl Kind {
    pub fn label(&self) -> &'static str {
        match self {
            Kind::Punctuator => "Punctuator",
            Kind::Name => "Name",
            Kind::IntValue => "Int",
            Kind::FloatValue => "Float",
            Kind::StringValue | Kind::BlockString => "String",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Token<'a> {
    pub kind: Kind,
    /// Raw source text of the token, string tokens keep their quotes.
    pub value: &'a str,
    pub span: Span,
}

impl Token<'_> {
    pub fn is_punctuator(&self, value: &str) -> bool {
        self.kind == Kind::Punctuator && self.value == value
    }

    pub fn is_name(&self, value: &str) -> bool {
        self.kind == Kind::Name && self.value == value
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            Kind::Punctuator => write!(f, "`{}`", self.value),
            Kind::StringValue | Kind::BlockString => write!(f, "String {}", self.value),
            kind => write!(f, "{} `{}`", kind.label(), self.value),
        }
    }
}

pub type InternalError<'a> = Errors<Token<'a>, Token<'a>, Pos>;

/// Bounds applied while reading a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum number of tokens, `None` for unbounded.
    pub max_tokens: Option<usize>,
    /// Maximum number of simultaneously open `(`, `[` and `{`.
    pub max_depth: usize,
}

pub const DEFAULT_MAX_DEPTH: usize = 64;

impl Default for ParseLimits {
    fn default() -> Self {
        ParseLimits {
            max_tokens: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    pos: Pos,
    /// End of the last token handed to the parser.
    last_end: Pos,
    depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(Cursor);

/// Token stream over GraphQL source, skipping whitespace, commas and
/// comments.
///
/// The nesting depth and the token count are enforced here, before the
/// grammar recurses into a nested value or selection set.
#[derive(Debug, Clone)]
pub struct TokenStream<'a> {
    source: &'a str,
    bytes: &'a [u8],
    cursor: Cursor,
    limits: ParseLimits,
    furthest: usize,
    tokens_read: usize,
    /// Token at an offset and the cursor right after it, reused after a reset.
    lookahead: Option<(usize, Token<'a>, Cursor)>,
    lexical_error: Option<ParseError>,
}

impl<'a> StreamOnce for TokenStream<'a> {
    type Token = Token<'a>;
    type Range = Token<'a>;
    type Position = Pos;
    type Error = InternalError<'a>;

    fn uncons(&mut self) -> Result<Token<'a>, Error<Token<'a>, Token<'a>>> {
        let at = self.cursor.pos.offset;
        if let Some((cached_at, token, after)) = self.lookahead {
            if cached_at == at {
                self.cursor = after;
                return Ok(token);
            }
        }

        if at >= self.bytes.len() {
            return Err(Error::end_of_input());
        }

        let start = self.cursor.pos;
        match self.read_token(start) {
            Ok(token) => {
                self.cursor.last_end = token.span.end;
                self.skip_ignored();
                self.lookahead = Some((at, token, self.cursor));
                Ok(token)
            }
            Err(error) => {
                self.cursor.pos = start;
                let message = error.message.clone();
                self.record(error);
                Err(Error::Message(Info::Owned(message)))
            }
        }
    }
}

impl Positioned for TokenStream<'_> {
    fn position(&self) -> Pos {
        self.cursor.pos
    }
}

impl ResetStream for TokenStream<'_> {
    type Checkpoint = Checkpoint;

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.cursor)
    }

    fn reset(&mut self, checkpoint: Checkpoint) -> Result<(), Self::Error> {
        self.cursor = checkpoint.0;
        Ok(())
    }
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_limits(source, ParseLimits::default())
    }

    pub fn with_limits(source: &'a str, limits: ParseLimits) -> Self {
        let mut stream = TokenStream {
            source,
            bytes: source.as_bytes(),
            cursor: Cursor {
                pos: Pos::start(),
                last_end: Pos::start(),
                depth: 0,
            },
            limits,
            furthest: 0,
            tokens_read: 0,
            lookahead: None,
            lexical_error: None,
        };
        stream.skip_ignored();
        stream.cursor.last_end = stream.cursor.pos;
        stream
    }

    /// End position of the last consumed token.
    pub fn last_end(&self) -> Pos {
        self.cursor.last_end
    }

    /// The earliest error raised while reading tokens. Nothing can be parsed
    /// past it, so it is the cause of any failed parse that reached it.
    pub fn take_lexical_error(&mut self) -> Option<ParseError> {
        self.lexical_error.take()
    }

    fn record(&mut self, error: ParseError) {
        let earlier = match &self.lexical_error {
            Some(existing) => error.span.start.offset < existing.span.start.offset,
            None => true,
        };
        if earlier {
            self.lexical_error = Some(error);
        }
    }

    fn peek_byte(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.cursor.pos.offset + ahead).copied()
    }

    fn bump(&mut self) {
        let Some(byte) = self.peek_byte(0) else {
            return;
        };
        let pos = &mut self.cursor.pos;
        pos.offset += 1;
        match byte {
            b'\n' => {
                pos.line += 1;
                pos.column = 1;
            }
            b'\r' => {
                if self.bytes.get(pos.offset) != Some(&b'\n') {
                    pos.line += 1;
                    pos.column = 1;
                }
            }
            // UTF-8 continuation bytes do not start a new column
            0x80..=0xBF => {}
            _ => pos.column += 1,
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn skip_ignored(&mut self) {
        while let Some(byte) = self.peek_byte(0) {
            match byte {
                b' ' | b'\t' | b',' | b'\n' | b'\r' => self.bump(),
                b'#' => {
                    while let Some(byte) = self.peek_byte(0) {
                        if byte == b'\n' || byte == b'\r' {
                            break;
                        }
                        self.bump();
                    }
                }
                0xEF if self.source[self.cursor.pos.offset..].starts_with('\u{feff}') => {
                    self.bump_n('\u{feff}'.len_utf8());
                }
                _ => break,
            }
        }
    }

    fn token(&self, kind: Kind, start: Pos) -> Token<'a> {
        Token {
            kind,
            value: &self.source[start.offset..self.cursor.pos.offset],
            span: Span::new(start, self.cursor.pos),
        }
    }

    fn error_here(&self, message: impl Into<String>, start: Pos) -> ParseError {
        let mut end = self.cursor.pos;
        if end.offset == start.offset {
            end.column += 1;
            end.offset += 1;
        }
        ParseError::new(message, Span::new(start, end))
    }

    fn count_token(&mut self, start: Pos) -> Result<(), ParseError> {
        if start.offset < self.furthest {
            return Ok(());
        }
        self.furthest = start.offset + 1;
        self.tokens_read += 1;
        match self.limits.max_tokens {
            Some(limit) if self.tokens_read > limit => Err(self.error_here(
                format!("Document exceeds the token limit of {}", limit),
                start,
            )),
            _ => Ok(()),
        }
    }

    fn read_token(&mut self, start: Pos) -> Result<Token<'a>, ParseError> {
        self.count_token(start)?;

        let Some(byte) = self.peek_byte(0) else {
            return Err(self.error_here("Unexpected end of input", start));
        };

        match byte {
            b'(' | b'[' | b'{' => {
                if self.cursor.depth >= self.limits.max_depth {
                    return Err(self.error_here(
                        format!(
                            "Exceeded the maximum nesting depth of {}",
                            self.limits.max_depth
                        ),
                        start,
                    ));
                }
                self.cursor.depth += 1;
                self.bump();
                Ok(self.token(Kind::Punctuator, start))
            }
            b')' | b']' | b'}' => {
                self.cursor.depth = self.cursor.depth.saturating_sub(1);
                self.bump();
                Ok(self.token(Kind::Punctuator, start))
            }
            b'!' | b'$' | b'&' | b':' | b'=' | b'@' | b'|' => {
                self.bump();
                Ok(self.token(Kind::Punctuator, start))
            }
            b'.' => {
                if self.peek_byte(1) == Some(b'.') && self.peek_byte(2) == Some(b'.') {
                    self.bump_n(3);
                    Ok(self.token(Kind::Punctuator, start))
                } else {
                    self.bump();
                    Err(self.error_here("Unexpected character `.`, did you mean `...`?", start))
                }
            }
            b'"' => self.read_string(start),
            b'-' | b'0'..=b'9' => self.read_number(start),
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => {
                while let Some(b'_' | b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9') = self.peek_byte(0)
                {
                    self.bump();
                }
                Ok(self.token(Kind::Name, start))
            }
            _ => {
                let ch = self.source[self.cursor.pos.offset..]
                    .chars()
                    .next()
                    .unwrap_or('\u{fffd}');
                self.bump_n(ch.len_utf8());
                Err(self.error_here(format!("Unexpected character {:?}", ch), start))
            }
        }
    }

    fn read_digits(&mut self, start: Pos) -> Result<(), ParseError> {
        match self.peek_byte(0) {
            Some(b'0'..=b'9') => {
                while let Some(b'0'..=b'9') = self.peek_byte(0) {
                    self.bump();
                }
                Ok(())
            }
            _ => {
                self.bump();
                Err(self.error_here("Invalid number, expected a digit", start))
            }
        }
    }

    fn read_number(&mut self, start: Pos) -> Result<Token<'a>, ParseError> {
        let mut kind = Kind::IntValue;

        if self.peek_byte(0) == Some(b'-') {
            self.bump();
        }

        if self.peek_byte(0) == Some(b'0') {
            self.bump();
            if let Some(b'0'..=b'9') = self.peek_byte(0) {
                self.bump();
                return Err(self.error_here("Invalid number, unexpected digit after 0", start));
            }
        } else {
            self.read_digits(start)?;
        }

        if self.peek_byte(0) == Some(b'.') {
            kind = Kind::FloatValue;
            self.bump();
            self.read_digits(start)?;
        }

        if let Some(b'e' | b'E') = self.peek_byte(0) {
            kind = Kind::FloatValue;
            self.bump();
            if let Some(b'+' | b'-') = self.peek_byte(0) {
                self.bump();
            }
            self.read_digits(start)?;
        }

        if let Some(b'.' | b'_' | b'a'..=b'z' | b'A'..=b'Z') = self.peek_byte(0) {
            self.bump();
            return Err(self.error_here("Invalid number, expected digit", start));
        }

        Ok(self.token(kind, start))
    }

    fn read_string(&mut self, start: Pos) -> Result<Token<'a>, ParseError> {
        if self.peek_byte(1) == Some(b'"') && self.peek_byte(2) == Some(b'"') {
            return self.read_block_string(start);
        }

        self.bump();
        loop {
            match self.peek_byte(0) {
                None | Some(b'\n') | Some(b'\r') => {
                    return Err(self.error_here("Unterminated string", start));
                }
                Some(b'"') => {
                    self.bump();
                    return Ok(self.token(Kind::StringValue, start));
                }
                Some(b'\\') => {
                    let escape_start = self.cursor.pos;
                    self.bump();
                    match self.peek_byte(0) {
                        Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => {
                            self.bump()
                        }
                        Some(b'u') => {
                            self.bump();
                            for _ in 0..4 {
                                match self.peek_byte(0) {
                                    Some(b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F') => self.bump(),
                                    _ => {
                                        return Err(self.error_here(
                                            "Invalid unicode escape sequence",
                                            escape_start,
                                        ))
                                    }
                                }
                            }
                        }
                        _ => {
                            self.bump();
                            return Err(
                                self.error_here("Invalid escape sequence", escape_start)
                            );
                        }
                    }
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn read_block_string(&mut self, start: Pos) -> Result<Token<'a>, ParseError> {
        self.bump_n(3);
        loop {
            match self.peek_byte(0) {
                None => return Err(self.error_here("Unterminated block string", start)),
                Some(b'\\')
                    if self.peek_byte(1) == Some(b'"')
                        && self.peek_byte(2) == Some(b'"')
                        && self.peek_byte(3) == Some(b'"') =>
                {
                    self.bump_n(4);
                }
                Some(b'"') if self.peek_byte(1) == Some(b'"') && self.peek_byte(2) == Some(b'"') => {
                    self.bump_n(3);
                    return Ok(self.token(Kind::BlockString, start));
                }
                Some(_) => self.bump(),
            }
        }
    }

    /// Token starting at `pos`, used to name the offending token of an error.
    pub(crate) fn token_at(&self, pos: Pos) -> Option<Token<'a>> {
        let mut lookup = TokenStream::new(self.source);
        lookup.cursor.pos = pos;
        lookup.limits.max_depth = usize::MAX;
        lookup.uncons().ok()
    }
}

/// Decodes the raw text of a `StringValue` token (including quotes).
pub fn unquote_string(raw: &str) -> String {
    let inner = &raw[1..raw.len().saturating_sub(1).max(1)];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('b') => result.push('\u{0008}'),
            Some('f') => result.push('\u{000c}'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => result.push('\u{fffd}'),
                }
            }
            Some(other) => result.push(other),
            None => {}
        }
    }

    result
}

/// Decodes the raw text of a `BlockString` token following the GraphQL
/// block string value algorithm (common indentation and blank edge lines
/// are removed).
pub fn unquote_block_string(raw: &str) -> String {
    let inner = &raw[3..raw.len().saturating_sub(3).max(3)];
    let inner = inner.replace("\\\"\"\"", "\"\"\"");
    let lines: Vec<&str> = inner.split(['\n']).map(|l| l.trim_end_matches('\r')).collect();

    let common_indent = lines
        .iter()
        .skip(1)
        .filter_map(|line| {
            let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
            if indent < line.len() {
                Some(indent)
            } else {
                None
            }
        })
        .min();

    let mut dedented: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| match common_indent {
            Some(indent) if i > 0 => line.get(indent..).unwrap_or(""),
            _ => line,
        })
        .collect();

    while dedented
        .first()
        .is_some_and(|line| line.trim_matches([' ', '\t']).is_empty())
    {
        dedented.remove(0);
    }
    while dedented
        .last()
        .is_some_and(|line| line.trim_matches([' ', '\t']).is_empty())
    {
        dedented.pop();
    }

    dedented.join("\n")
}

#[cfg(test)]
mod tests {
    use combine::easy::Error;
    use combine::{Positioned, StreamOnce};

    use super::{unquote_block_string, unquote_string, Kind, ParseLimits, Token, TokenStream};

    fn tokens(source: &str) -> Vec<Token<'_>> {
        let mut stream = TokenStream::new(source);
        let mut result = vec![];
        loop {
            match stream.uncons() {
                Ok(token) => result.push(token),
                Err(ref error) if *error == Error::end_of_input() => break,
                Err(error) => panic!("failed to tokenize: {}", error),
            }
        }
        result
    }

    fn kinds_and_values(source: &str) -> Vec<(Kind, &str)> {
        tokens(source)
            .into_iter()
            .map(|token| (token.kind, token.value))
            .collect()
    }

    #[test]
    fn punctuators_and_names() {
        assert_eq!(
            kinds_and_values("query Q { ...F, me @include(if: $x) }"),
            vec![
                (Kind::Name, "query"),
                (Kind::Name, "Q"),
                (Kind::Punctuator, "{"),
                (Kind::Punctuator, "..."),
                (Kind::Name, "F"),
                (Kind::Name, "me"),
                (Kind::Punctuator, "@"),
                (Kind::Name, "include"),
                (Kind::Punctuator, "("),
                (Kind::Name, "if"),
                (Kind::Punctuator, ":"),
                (Kind::Punctuator, "$"),
                (Kind::Name, "x"),
                (Kind::Punctuator, ")"),
                (Kind::Punctuator, "}"),
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds_and_values("0 -12 1.5 2e10 -0.25E-3"),
            vec![
                (Kind::IntValue, "0"),
                (Kind::IntValue, "-12"),
                (Kind::FloatValue, "1.5"),
                (Kind::FloatValue, "2e10"),
                (Kind::FloatValue, "-0.25E-3"),
            ]
        );
    }

    #[test]
    fn invalid_numbers() {
        for source in ["01", "1.", "1a"] {
            let mut stream = TokenStream::new(source);
            assert!(stream.uncons().is_err(), "{}", source);
            assert!(stream.take_lexical_error().is_some(), "{}", source);
        }
    }

    #[test]
    fn comments_are_ignored() {
        assert_eq!(
            kinds_and_values("# leading\nname # trailing\n"),
            vec![(Kind::Name, "name")]
        );
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let all = tokens("{\n  me\r\n  you }");
        let (open, me, you) = (all[0], all[1], all[2]);
        assert_eq!((open.span.start.line, open.span.start.column), (1, 1));
        assert_eq!((me.span.start.line, me.span.start.column), (2, 3));
        assert_eq!((me.span.end.line, me.span.end.column), (2, 5));
        assert_eq!((you.span.start.line, you.span.start.column), (3, 3));
    }

    #[test]
    fn position_skips_trailing_whitespace_but_last_end_does_not() {
        let mut stream = TokenStream::new("me   you");
        stream.uncons().unwrap();
        assert_eq!(stream.position().column, 6);
        assert_eq!(stream.last_end().column, 3);
    }

    #[test]
    fn strings() {
        let all = tokens(r#""a\nbA" """ block """"#);
        assert_eq!(all[0].kind, Kind::StringValue);
        assert_eq!(unquote_string(all[0].value), "a\nbA");
        assert_eq!(all[1].kind, Kind::BlockString);
        assert_eq!(unquote_block_string(all[1].value), " block ");
    }

    #[test]
    fn block_string_dedent() {
        let raw = "\"\"\"\n    Hello,\n      World!\n\n    Yours\n  \"\"\"";
        assert_eq!(unquote_block_string(raw), "Hello,\n  World!\n\nYours");
    }

    #[test]
    fn unterminated_string() {
        let mut stream = TokenStream::new("\"abc\n");
        assert!(stream.uncons().is_err());
        let error = stream.take_lexical_error().unwrap();
        assert_eq!(error.message, "Unterminated string");
        assert_eq!(error.span.start.column, 1);
    }

    #[test]
    fn unexpected_character() {
        let mut stream = TokenStream::new("  ?");
        assert!(stream.uncons().is_err());
        let error = stream.take_lexical_error().unwrap();
        assert_eq!(error.message, "Unexpected character '?'");
        assert_eq!((error.span.start.column, error.span.end.column), (3, 4));
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let limits = ParseLimits {
            max_tokens: None,
            max_depth: 3,
        };
        let mut stream = TokenStream::with_limits("[[[ ] ] ] [[[[", limits);
        for _ in 0..6 {
            stream.uncons().expect("balanced brackets to tokenize");
        }
        for _ in 0..3 {
            stream.uncons().expect("to reopen up to the limit");
        }
        assert!(stream.uncons().is_err());
        let error = stream.take_lexical_error().unwrap();
        assert_eq!(error.message, "Exceeded the maximum nesting depth of 3");
        assert_eq!(error.span.start.column, 14);
    }

    #[test]
    fn replayed_tokens_are_counted_once() {
        use combine::stream::ResetStream;

        let limits = ParseLimits {
            max_tokens: Some(2),
            ..ParseLimits::default()
        };
        let mut stream = TokenStream::with_limits("a b c", limits);
        let start = stream.checkpoint();
        stream.uncons().unwrap();
        stream.uncons().unwrap();
        stream.reset(start).unwrap();
        stream.uncons().unwrap();
        stream.uncons().unwrap();
        assert!(stream.uncons().is_err());
        assert_eq!(
            stream.take_lexical_error().unwrap().message,
            "Document exceeds the token limit of 2"
        );
    }
}
