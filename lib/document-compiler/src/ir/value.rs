use std::fmt::{self, Write};
use std::hash::{Hash, Hasher};

use graphql_syntax::query::Value as SyntaxValue;
use graphql_syntax::{format_float, write_quoted};

use crate::schema::TypeReference;

/// A literal without variable references.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum(String),
    List(Vec<ConstantValue>),
    Object(Vec<(String, ConstantValue)>),
}

impl ConstantValue {
    /// Converts a syntax literal, `None` when it references a variable.
    pub fn from_syntax(value: &SyntaxValue) -> Option<Self> {
        Some(match value {
            SyntaxValue::Variable(_) => return None,
            SyntaxValue::Null => ConstantValue::Null,
            SyntaxValue::Boolean(b) => ConstantValue::Boolean(*b),
            SyntaxValue::Int(i) => ConstantValue::Int(*i),
            SyntaxValue::Float(f) => ConstantValue::Float(*f),
            SyntaxValue::String(s) => ConstantValue::String(s.clone()),
            SyntaxValue::Enum(e) => ConstantValue::Enum(e.clone()),
            SyntaxValue::List(items) => ConstantValue::List(
                items
                    .iter()
                    .map(ConstantValue::from_syntax)
                    .collect::<Option<Vec<_>>>()?,
            ),
            SyntaxValue::Object(fields) => ConstantValue::Object(
                fields
                    .iter()
                    .map(|(name, value)| Some((name.clone(), ConstantValue::from_syntax(value)?)))
                    .collect::<Option<Vec<_>>>()?,
            ),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConstantValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstantValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConstantValue::Null => serde_json::Value::Null,
            ConstantValue::Boolean(b) => serde_json::Value::Bool(*b),
            ConstantValue::Int(i) => serde_json::Value::from(*i),
            ConstantValue::Float(f) => serde_json::Value::from(*f),
            ConstantValue::String(s) | ConstantValue::Enum(s) => {
                serde_json::Value::String(s.clone())
            }
            ConstantValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ConstantValue::to_json).collect())
            }
            ConstantValue::Object(fields) => serde_json::Value::Object(
                sorted_fields(fields)
                    .into_iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Compact form with object fields sorted by name, e.g. `{a:1,b:[RED]}`.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        // writing into a String never fails
        let _ = self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) -> fmt::Result {
        match self {
            ConstantValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out)?;
                }
                out.push(']');
            }
            ConstantValue::Object(fields) => {
                out.push('{');
                for (i, (name, value)) in sorted_fields(fields).into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(name);
                    out.push(':');
                    value.write_canonical(out)?;
                }
                out.push('}');
            }
            scalar => write!(out, "{}", scalar)?,
        }
        Ok(())
    }
}

fn sorted_fields<V>(fields: &[(String, V)]) -> Vec<&(String, V)> {
    let mut sorted: Vec<&(String, V)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
}

impl Hash for ConstantValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ConstantValue::Null => {}
            ConstantValue::Boolean(b) => b.hash(state),
            ConstantValue::Int(i) => i.hash(state),
            ConstantValue::Float(f) => f.to_bits().hash(state),
            ConstantValue::String(s) | ConstantValue::Enum(s) => s.hash(state),
            ConstantValue::List(items) => items.hash(state),
            ConstantValue::Object(fields) => {
                for (name, value) in sorted_fields(fields) {
                    name.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Null => f.write_str("null"),
            ConstantValue::Boolean(b) => write!(f, "{}", b),
            ConstantValue::Int(i) => write!(f, "{}", i),
            ConstantValue::Float(v) => f.write_str(&format_float(*v)),
            ConstantValue::String(s) => write_quoted(f, s),
            ConstantValue::Enum(e) => f.write_str(e),
            ConstantValue::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            ConstantValue::Object(fields) => {
                f.write_char('{')?;
                for (i, (name, value)) in sorted_fields(fields).into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_char('}')
            }
        }
    }
}

/// A reference to an operation variable or fragment argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub name: String,
    pub value_type: TypeReference,
}

/// An argument value after binding.
///
/// Lists and objects containing no variable are always folded into
/// [`IrValue::Constant`].
#[derive(Debug, Clone, PartialEq)]
pub enum IrValue {
    Constant(ConstantValue),
    Variable(Variable),
    List(Vec<IrValue>),
    Object(Vec<(String, IrValue)>),
}

impl IrValue {
    pub fn is_constant(&self) -> bool {
        matches!(self, IrValue::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&ConstantValue> {
        match self {
            IrValue::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Folds a list of values, collapsing it into a constant when possible.
    pub fn list(items: Vec<IrValue>) -> IrValue {
        if items.iter().all(IrValue::is_constant) {
            IrValue::Constant(ConstantValue::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        IrValue::Constant(value) => Some(value),
                        _ => None,
                    })
                    .collect(),
            ))
        } else {
            IrValue::List(items)
        }
    }

    /// Folds an object value, collapsing it into a constant when possible.
    pub fn object(fields: Vec<(String, IrValue)>) -> IrValue {
        if fields.iter().all(|(_, value)| value.is_constant()) {
            IrValue::Constant(ConstantValue::Object(
                fields
                    .into_iter()
                    .filter_map(|(name, value)| match value {
                        IrValue::Constant(value) => Some((name, value)),
                        _ => None,
                    })
                    .collect(),
            ))
        } else {
            IrValue::Object(fields)
        }
    }

    /// Every variable referenced by this value, in order of appearance.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut out = vec![];
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a Variable>) {
        match self {
            IrValue::Constant(_) => {}
            IrValue::Variable(variable) => out.push(variable),
            IrValue::List(items) => items.iter().for_each(|item| item.collect_variables(out)),
            IrValue::Object(fields) => fields
                .iter()
                .for_each(|(_, value)| value.collect_variables(out)),
        }
    }

    /// Replaces variables for which `lookup` returns a value.
    pub fn substitute(&self, lookup: &impl Fn(&Variable) -> Option<IrValue>) -> IrValue {
        match self {
            IrValue::Constant(_) => self.clone(),
            IrValue::Variable(variable) => lookup(variable).unwrap_or_else(|| self.clone()),
            IrValue::List(items) => {
                IrValue::list(items.iter().map(|item| item.substitute(lookup)).collect())
            }
            IrValue::Object(fields) => IrValue::object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.substitute(lookup)))
                    .collect(),
            ),
        }
    }

    /// Compact form used in storage keys and specialization hashes.
    pub fn canonical(&self) -> String {
        match self {
            IrValue::Constant(value) => value.canonical(),
            IrValue::Variable(variable) => format!("${}", variable.name),
            IrValue::List(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(IrValue::canonical)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            IrValue::Object(fields) => format!(
                "{{{}}}",
                sorted_fields(fields)
                    .into_iter()
                    .map(|(name, value)| format!("{}:{}", name, value.canonical()))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

impl fmt::Display for IrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrValue::Constant(value) => write!(f, "{}", value),
            IrValue::Variable(variable) => write!(f, "${}", variable.name),
            IrValue::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            IrValue::Object(fields) => {
                f.write_char('{')?;
                for (i, (name, value)) in sorted_fields(fields).into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_char('}')
            }
        }
    }
}
