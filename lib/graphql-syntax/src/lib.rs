//! GraphQL Syntax
//! ==============
//!
//! Parser for GraphQL executable documents and type-system definitions
//! (SDL), built from `combine` parsers over a span-tracking token stream,
//! together with a canonical formatter for executable documents.
//!
//! Every node records its [`Span`], and errors point at the offending
//! token. Nesting of `(`, `[` and `{` is bounded by [`ParseLimits`], so
//! arbitrarily deep input fails with an error instead of exhausting the
//! stack.
//!
//! Example: Parse and Format Query
//! -------------------------------
//!
//! ```rust
//! use graphql_syntax::{parse_query, ParseError};
//!
//! # fn parse() -> Result<(), ParseError> {
//! let ast = parse_query("query MyQuery { field1, field2 }")?;
//! assert_eq!(ast.to_string(), "\
//! query MyQuery {
//!   field1
//!   field2
//! }
//! ");
//! # Ok(())
//! # }
//! # fn main() {
//! #    parse().unwrap()
//! # }
//! ```
//!
//! Example: Parse Schema
//! ---------------------
//!
//! ```rust
//! use graphql_syntax::schema::{parse_schema, TypeDefinition};
//!
//! let ast = parse_schema("type Query { users: [User!]! } type User { name: String! }").unwrap();
//! assert!(matches!(ast.type_by_name("User"), Some(TypeDefinition::Object(_))));
//! ```

#[macro_use]
mod format;

mod common;
mod error;
mod helpers;
mod position;
mod tokenizer;

pub mod query;
pub mod schema;
pub mod template;

pub use crate::common::{format_float, write_quoted};
pub use crate::error::ParseError;
pub use crate::format::{format_with_style, Displayable, Formatter, Style};
pub use crate::position::{Pos, Span};
pub use crate::query::{parse_query, parse_query_with_limit, parse_query_with_limits};
pub use crate::schema::{parse_schema, parse_schema_with_limits};
pub use crate::tokenizer::{ParseLimits, DEFAULT_MAX_DEPTH};
