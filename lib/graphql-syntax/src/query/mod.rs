//! Query language AST and parsing utilities
//!
mod ast;
mod format;
mod grammar;

pub use self::ast::*;
pub use self::grammar::{parse_query, parse_query_with_limit, parse_query_with_limits, parse_type};
