pub(crate) static BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

pub(crate) static DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

/// Directives consumed by the compiler itself; they never reach printed output.
pub static COMPILER_DIRECTIVES: [&str; 3] = ["connection", "arguments", "argumentDefinitions"];

/// Definitions every schema knows about, whether or not the SDL declares them.
pub(crate) static BUILTIN_DEFINITIONS: &str = r#"
directive @skip(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT
directive @include(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT
directive @deprecated(reason: String = "No longer supported") on FIELD_DEFINITION | ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION | ENUM_VALUE
directive @specifiedBy(url: String!) on SCALAR

directive @connection(key: String!, filters: [String]) on FIELD
directive @arguments on FRAGMENT_SPREAD
directive @argumentDefinitions on FRAGMENT_DEFINITION
"#;
