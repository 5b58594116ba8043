use std::fmt;
use std::hash::{Hash, Hasher};

use crate::position::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub span: Span,
    pub name: String,
    pub name_span: Span,
    pub arguments: Vec<Argument>,
}

impl Directive {
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|arg| arg.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub span: Span,
    pub name: String,
    pub value: Value,
    pub value_span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn is_variable(&self) -> bool {
        matches!(self, Value::Variable(_))
    }

    /// Returns true when the value contains no variable reference at any depth.
    pub fn is_constant(&self) -> bool {
        match self {
            Value::Variable(_) => false,
            Value::List(items) => items.iter().all(Value::is_constant),
            Value::Object(fields) => fields.iter().all(|(_, value)| value.is_constant()),
            _ => true,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Variable(_) => "Variable",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Null => "Null",
            Value::Enum(_) => "Enum",
            Value::List(_) => "List",
            Value::Object(_) => "Object",
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Variable(v) => {
                "Value::Variable".hash(state);
                v.hash(state);
            }
            Value::Int(i) => {
                "Value::Int".hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                "Value::Float".hash(state);
                f.to_bits().hash(state);
            }
            Value::String(s) => {
                "Value::String".hash(state);
                s.hash(state);
            }
            Value::Boolean(b) => {
                "Value::Boolean".hash(state);
                b.hash(state);
            }
            Value::Null => "Value::Null".hash(state),
            Value::Enum(e) => {
                "Value::Enum".hash(state);
                e.hash(state);
            }
            Value::List(items) => {
                "Value::List".hash(state);
                items.len().hash(state);
                for item in items {
                    item.hash(state);
                }
            }
            Value::Object(fields) => {
                "Value::Object".hash(state);
                fields.len().hash(state);
                for (name, value) in fields {
                    name.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

/// Type reference as written in source: `Name`, `[Type]`, `Type!`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    NamedType(String),
    ListType(Box<Type>),
    NonNullType(Box<Type>),
}

impl Type {
    pub fn inner_type(&self) -> &str {
        match self {
            Type::NamedType(name) => name,
            Type::ListType(inner) | Type::NonNullType(inner) => inner.inner_type(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::NamedType(name) => write!(f, "{}", name),
            Type::ListType(inner) => write!(f, "[{}]", inner),
            Type::NonNullType(inner) => write!(f, "{}!", inner),
        }
    }
}

/// Writes `value` as a GraphQL string literal.
pub fn write_quoted(f: &mut impl fmt::Write, value: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in value.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{0008}' => f.write_str("\\b")?,
            '\u{000c}' => f.write_str("\\f")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04X}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

/// Formats a float so that it always reads back as a GraphQL `Float`.
pub fn format_float(value: f64) -> String {
    let formatted = format!("{:?}", value);
    if formatted.contains(['.', 'e', 'E']) || !value.is_finite() {
        formatted
    } else {
        format!("{}.0", formatted)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Variable(name) => write!(f, "${}", name),
            Value::Int(i) => f.write_str(itoa::Buffer::new().format(*i)),
            Value::Float(v) => f.write_str(&format_float(*v)),
            Value::String(s) => write_quoted(f, s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
            Value::Enum(name) => f.write_str(name),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str("}")
            }
        }
    }
}
