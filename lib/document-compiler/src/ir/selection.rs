use std::sync::Arc;

use crate::ir::{IrValue, Location, Variable};
use crate::schema::TypeReference;

/// A node of a selection list.
///
/// Payloads sit behind `Arc` so a rewrite only allocates along the path to
/// the node that changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    ScalarField(Arc<ScalarField>),
    LinkedField(Arc<LinkedField>),
    InlineFragment(Arc<InlineFragment>),
    FragmentSpread(Arc<FragmentSpread>),
    Condition(Arc<Condition>),
}

impl Selection {
    pub fn location(&self) -> &Location {
        match self {
            Selection::ScalarField(field) => &field.location,
            Selection::LinkedField(field) => &field.location,
            Selection::InlineFragment(fragment) => &fragment.location,
            Selection::FragmentSpread(spread) => &spread.location,
            Selection::Condition(condition) => &condition.location,
        }
    }

    pub fn storage_key(&self) -> Option<&str> {
        match self {
            Selection::ScalarField(field) => Some(&field.storage_key),
            Selection::LinkedField(field) => Some(&field.storage_key),
            _ => None,
        }
    }

    pub fn response_key(&self) -> Option<&str> {
        match self {
            Selection::ScalarField(field) => Some(field.response_key()),
            Selection::LinkedField(field) => Some(field.response_key()),
            _ => None,
        }
    }

    pub fn selections(&self) -> Option<&[Selection]> {
        match self {
            Selection::ScalarField(_) | Selection::FragmentSpread(_) => None,
            Selection::LinkedField(field) => Some(&field.selections),
            Selection::InlineFragment(fragment) => Some(&fragment.selections),
            Selection::Condition(condition) => Some(&condition.selections),
        }
    }

    pub fn directives(&self) -> &[Directive] {
        match self {
            Selection::ScalarField(field) => &field.directives,
            Selection::LinkedField(field) => &field.directives,
            Selection::InlineFragment(fragment) => &fragment.directives,
            Selection::FragmentSpread(spread) => &spread.directives,
            Selection::Condition(_) => &[],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Selection::ScalarField(_) => "ScalarField",
            Selection::LinkedField(_) => "LinkedField",
            Selection::InlineFragment(_) => "InlineFragment",
            Selection::FragmentSpread(_) => "FragmentSpread",
            Selection::Condition(_) => "Condition",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    /// `None` unless the alias differs from the field name.
    pub alias: Option<String>,
    pub name: String,
    pub parent_type: String,
    pub field_type: TypeReference,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub storage_key: String,
    pub location: Location,
}

impl ScalarField {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkedField {
    pub alias: Option<String>,
    pub name: String,
    pub parent_type: String,
    pub field_type: TypeReference,
    /// Set when the named result type is an object type.
    pub concrete_type: Option<String>,
    pub plural: bool,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub storage_key: String,
    pub selections: Vec<Selection>,
    pub connection: Option<ConnectionMetadata>,
    pub location: Location,
}

impl LinkedField {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn type_name(&self) -> &str {
        self.field_type.inner_type()
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|arg| arg.name == name)
    }

    pub fn directive(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|directive| directive.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirection {
    Forward,
    Backward,
    Bidirectional,
}

impl ConnectionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionDirection::Forward => "forward",
            ConnectionDirection::Backward => "backward",
            ConnectionDirection::Bidirectional => "bidirectional",
        }
    }
}

/// Pagination handle attached to a `@connection` field.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionMetadata {
    pub key: String,
    pub direction: ConnectionDirection,
    /// Variable feeding the cursor argument (`after`/`before`).
    pub cursor: Option<String>,
    /// Variable feeding the count argument (`first`/`last`).
    pub count: Option<String>,
    pub filters: Vec<String>,
    /// Response keys from the definition root down to the field.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    /// `__is<Type>` when the condition is an interface or union.
    pub abstract_key: Option<String>,
    pub directives: Vec<Directive>,
    pub selections: Vec<Selection>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    pub fragment_name: String,
    pub type_condition: String,
    /// Values bound to the fragment's local arguments.
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Variable(Variable),
    Constant(bool),
}

/// A `@skip`/`@include` guarded branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub value: ConditionValue,
    /// Value of `value` for which the selections are kept.
    pub passing_value: bool,
    pub selections: Vec<Selection>,
    pub location: Location,
}

impl Condition {
    /// `Some(true)` if the branch is always taken, `Some(false)` if never.
    pub fn constant_outcome(&self) -> Option<bool> {
        match &self.value {
            ConditionValue::Constant(value) => Some(*value == self.passing_value),
            ConditionValue::Variable(_) => None,
        }
    }

    pub fn directive_name(&self) -> &'static str {
        if self.passing_value {
            "include"
        } else {
            "skip"
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value_type: TypeReference,
    pub value: IrValue,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub location: Location,
}

impl Directive {
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|arg| arg.name == name)
    }
}
