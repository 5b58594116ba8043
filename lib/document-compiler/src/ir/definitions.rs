use graphql_syntax::query::OperationKind;

use crate::ir::{ConstantValue, Directive, Location, Selection};
use crate::schema::TypeReference;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub value_type: TypeReference,
    pub default_value: Option<ConstantValue>,
    pub location: Location,
}

impl VariableDefinition {
    pub fn is_required(&self) -> bool {
        self.value_type.is_non_null() && self.default_value.is_none()
    }
}

/// An input of a fragment: a local argument bound at every spread, or a
/// root variable supplied by whichever operation reaches the fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentDefinition {
    Local {
        name: String,
        value_type: TypeReference,
        default_value: Option<ConstantValue>,
    },
    Root {
        name: String,
        value_type: TypeReference,
    },
}

impl ArgumentDefinition {
    pub fn name(&self) -> &str {
        match self {
            ArgumentDefinition::Local { name, .. } | ArgumentDefinition::Root { name, .. } => name,
        }
    }

    pub fn value_type(&self) -> &TypeReference {
        match self {
            ArgumentDefinition::Local { value_type, .. }
            | ArgumentDefinition::Root { value_type, .. } => value_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub kind: OperationKind,
    pub name: String,
    /// Root type the operation selects from.
    pub type_name: String,
    pub variable_definitions: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selections: Vec<Selection>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    /// `__is<Type>` when the type condition is an interface or union.
    pub abstract_key: Option<String>,
    /// Local arguments declared with `@argumentDefinitions`.
    pub variable_definitions: Vec<VariableDefinition>,
    /// Variables the fragment reads from the enclosing operation.
    pub used_global_variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selections: Vec<Selection>,
    pub location: Location,
}

impl FragmentDefinition {
    /// Local and root arguments, sorted by name.
    pub fn argument_definitions(&self) -> Vec<ArgumentDefinition> {
        let mut definitions: Vec<ArgumentDefinition> = self
            .variable_definitions
            .iter()
            .map(|def| ArgumentDefinition::Local {
                name: def.name.clone(),
                value_type: def.value_type.clone(),
                default_value: def.default_value.clone(),
            })
            .chain(
                self.used_global_variables
                    .iter()
                    .map(|def| ArgumentDefinition::Root {
                        name: def.name.clone(),
                        value_type: def.value_type.clone(),
                    }),
            )
            .collect();
        definitions.sort_by(|a, b| a.name().cmp(b.name()));
        definitions
    }

    pub fn local_argument(&self, name: &str) -> Option<&VariableDefinition> {
        self.variable_definitions.iter().find(|def| def.name == name)
    }

    pub fn has_local_arguments(&self) -> bool {
        !self.variable_definitions.is_empty()
    }
}
