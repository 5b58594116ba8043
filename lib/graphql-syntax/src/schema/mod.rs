mod ast;
mod grammar;

pub use self::ast::*;
pub use self::grammar::{parse_schema, parse_schema_with_limits};
