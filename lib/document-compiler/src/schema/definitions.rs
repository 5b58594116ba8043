use std::fmt;

use graphql_syntax::query::Type;
use indexmap::IndexMap;
use serde::Serialize;

use crate::ir::ConstantValue;

/// A possibly wrapped reference to a named type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeReference {
    Named(String),
    List(Box<TypeReference>),
    NonNull(Box<TypeReference>),
}

impl TypeReference {
    pub fn named(name: impl Into<String>) -> Self {
        TypeReference::Named(name.into())
    }

    pub fn non_null(self) -> Self {
        match self {
            TypeReference::NonNull(_) => self,
            other => TypeReference::NonNull(Box::new(other)),
        }
    }

    pub fn list(self) -> Self {
        TypeReference::List(Box::new(self))
    }

    pub fn from_syntax(ty: &Type) -> Self {
        match ty {
            Type::NamedType(name) => TypeReference::Named(name.clone()),
            Type::ListType(inner) => TypeReference::List(Box::new(Self::from_syntax(inner))),
            Type::NonNullType(inner) => TypeReference::NonNull(Box::new(Self::from_syntax(inner))),
        }
    }

    /// The named type at the core of the wrappers.
    pub fn inner_type(&self) -> &str {
        match self {
            TypeReference::Named(name) => name,
            TypeReference::List(inner) | TypeReference::NonNull(inner) => inner.inner_type(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeReference::NonNull(_))
    }

    /// The type without its outermost non-null wrapper.
    pub fn nullable(&self) -> &TypeReference {
        match self {
            TypeReference::NonNull(inner) => inner,
            other => other,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), TypeReference::List(_))
    }

    /// Item type of a (possibly non-null) list.
    pub fn item_type(&self) -> Option<&TypeReference> {
        match self.nullable() {
            TypeReference::List(item) => Some(item),
            _ => None,
        }
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeReference::Named(name) => f.write_str(name),
            TypeReference::List(inner) => write!(f, "[{}]", inner),
            TypeReference::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Scalar(ScalarType),
    Enum(EnumType),
    InputObject(InputObjectType),
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
}

impl TypeDefinition {
    pub fn name(&self) -> &str {
        match self {
            TypeDefinition::Scalar(t) => &t.name,
            TypeDefinition::Enum(t) => &t.name,
            TypeDefinition::InputObject(t) => &t.name,
            TypeDefinition::Object(t) => &t.name,
            TypeDefinition::Interface(t) => &t.name,
            TypeDefinition::Union(t) => &t.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeDefinition::Scalar(_) => "scalar",
            TypeDefinition::Enum(_) => "enum",
            TypeDefinition::InputObject(_) => "input object",
            TypeDefinition::Object(_) => "object",
            TypeDefinition::Interface(_) => "interface",
            TypeDefinition::Union(_) => "union",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            TypeDefinition::Object(_) | TypeDefinition::Interface(_) | TypeDefinition::Union(_)
        )
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, TypeDefinition::Interface(_) | TypeDefinition::Union(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TypeDefinition::Scalar(_) | TypeDefinition::Enum(_))
    }

    pub fn is_input_type(&self) -> bool {
        matches!(
            self,
            TypeDefinition::Scalar(_) | TypeDefinition::Enum(_) | TypeDefinition::InputObject(_)
        )
    }

    pub fn is_output_type(&self) -> bool {
        !matches!(self, TypeDefinition::InputObject(_))
    }

    /// Fields of object and interface types.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDefinition>> {
        match self {
            TypeDefinition::Object(t) => Some(&t.fields),
            TypeDefinition::Interface(t) => Some(&t.fields),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().and_then(|fields| fields.get(name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarType {
    pub name: String,
    pub description: Option<String>,
    pub builtin: bool,
    pub specified_by: Option<String>,
}

impl ScalarType {
    pub fn is_custom(&self) -> bool {
        !self.builtin
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValueDefinition>,
}

impl EnumType {
    pub fn has_value(&self, name: &str) -> bool {
        self.values.iter().any(|value| value.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDefinition {
    pub name: String,
    pub description: Option<String>,
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValueDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDefinition>,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDefinition>,
    pub interfaces: Vec<String>,
    /// Object and interface types declaring this interface, sorted.
    pub implementing_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub parent_type: String,
    pub description: Option<String>,
    pub field_type: TypeReference,
    pub arguments: Vec<InputValueDefinition>,
    pub deprecation_reason: Option<String>,
}

impl FieldDefinition {
    pub fn argument(&self, name: &str) -> Option<&InputValueDefinition> {
        self.arguments.iter().find(|arg| arg.name == name)
    }

    pub fn coordinate(&self) -> String {
        format!("{}.{}", self.parent_type, self.name)
    }
}

/// Argument or input object field.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDefinition {
    pub name: String,
    pub description: Option<String>,
    pub value_type: TypeReference,
    pub default_value: Option<ConstantValue>,
}

impl InputValueDefinition {
    /// Non-null without a default value.
    pub fn is_required(&self) -> bool {
        self.value_type.is_non_null() && self.default_value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveDefinition {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<InputValueDefinition>,
    pub locations: Vec<String>,
    pub repeatable: bool,
    pub builtin: bool,
}

impl DirectiveDefinition {
    pub fn argument(&self, name: &str) -> Option<&InputValueDefinition> {
        self.arguments.iter().find(|arg| arg.name == name)
    }

    pub fn allows_location(&self, location: &str) -> bool {
        self.locations.iter().any(|l| l == location)
    }
}

#[cfg(test)]
mod tests {
    use super::TypeReference;
    use graphql_syntax::query::parse_type;

    #[test]
    fn type_reference_helpers() {
        let ty = TypeReference::from_syntax(&parse_type("[User!]!").unwrap());
        assert_eq!(ty.to_string(), "[User!]!");
        assert_eq!(ty.inner_type(), "User");
        assert!(ty.is_non_null());
        assert!(ty.is_list());
        assert_eq!(ty.item_type().map(|t| t.to_string()), Some("User!".to_string()));
        assert_eq!(ty.nullable().to_string(), "[User!]");
        assert_eq!(TypeReference::named("Int").non_null().non_null().to_string(), "Int!");
    }
}
