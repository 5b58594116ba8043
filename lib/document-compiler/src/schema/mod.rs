mod builtins;
mod definitions;
mod loader;

use std::collections::HashMap;

use graphql_syntax::query::OperationKind;
use indexmap::IndexMap;

pub use self::builtins::COMPILER_DIRECTIVES;
pub use self::definitions::*;
pub use self::loader::load_schema;

/// The resolved type system a batch of documents is compiled against.
///
/// Built once by [`load_schema`] and never mutated afterwards; share it as
/// `Arc<SchemaModel>`.
#[derive(Debug, Clone)]
pub struct SchemaModel {
    types: IndexMap<String, TypeDefinition>,
    directives: IndexMap<String, DirectiveDefinition>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    /// Sorted object types for every composite type.
    possible_types: HashMap<String, Vec<String>>,
}

impl SchemaModel {
    pub fn type_by_name(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    pub fn directive(&self, name: &str) -> Option<&DirectiveDefinition> {
        self.directives.get(name)
    }

    pub fn directives(&self) -> impl Iterator<Item = &DirectiveDefinition> {
        self.directives.values()
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => self.query_type.as_deref(),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// Field of an object or interface type.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
        self.type_by_name(type_name)
            .and_then(|type_def| type_def.field(field_name))
    }

    pub fn is_composite(&self, name: &str) -> bool {
        self.type_by_name(name)
            .is_some_and(TypeDefinition::is_composite)
    }

    pub fn is_abstract(&self, name: &str) -> bool {
        self.type_by_name(name)
            .is_some_and(TypeDefinition::is_abstract)
    }

    pub fn is_object(&self, name: &str) -> bool {
        matches!(self.type_by_name(name), Some(TypeDefinition::Object(_)))
    }

    pub fn is_input_type(&self, name: &str) -> bool {
        self.type_by_name(name)
            .is_some_and(TypeDefinition::is_input_type)
    }

    /// Object types a value of type `name` may have at runtime, sorted by name.
    pub fn possible_types(&self, name: &str) -> &[String] {
        self.possible_types
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether some runtime object type is possible for both types.
    pub fn types_overlap(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let b_types = self.possible_types(b);
        self.possible_types(a)
            .iter()
            .any(|candidate| b_types.binary_search(candidate).is_ok())
    }

    /// Whether `maybe_sub` can be used where `sup` is expected (output covariance).
    pub fn is_subtype(&self, maybe_sub: &TypeReference, sup: &TypeReference) -> bool {
        match (maybe_sub, sup) {
            _ if maybe_sub == sup => true,
            (TypeReference::NonNull(sub), TypeReference::NonNull(sup)) => self.is_subtype(sub, sup),
            (TypeReference::NonNull(sub), _) => self.is_subtype(sub, sup),
            (_, TypeReference::NonNull(_)) => false,
            (TypeReference::List(sub), TypeReference::List(sup)) => self.is_subtype(sub, sup),
            (TypeReference::List(_), _) | (_, TypeReference::List(_)) => false,
            (TypeReference::Named(sub), TypeReference::Named(sup)) => {
                match self.type_by_name(sup) {
                    Some(TypeDefinition::Union(union)) => union.members.contains(sub),
                    Some(TypeDefinition::Interface(interface)) => {
                        interface.implementing_types.contains(sub)
                    }
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use graphql_syntax::query::OperationKind;

    use super::{load_schema, TypeReference};

    #[test]
    fn possible_types_and_overlap() {
        let schema = load_schema(
            r#"
            interface Node { id: ID! }
            type User implements Node { id: ID! }
            type Page implements Node { id: ID! }
            type Photo { url: String }
            union Media = Photo | Page
            type Query { node: Node }
            "#,
        )
        .expect("to load");

        assert_eq!(schema.possible_types("Node"), ["Page", "User"]);
        assert_eq!(schema.possible_types("Media"), ["Page", "Photo"]);
        assert_eq!(schema.possible_types("User"), ["User"]);
        assert!(schema.types_overlap("Node", "Media"));
        assert!(!schema.types_overlap("User", "Media"));
        assert_eq!(schema.root_type(OperationKind::Query), Some("Query"));
        assert_eq!(schema.root_type(OperationKind::Mutation), None);
        assert!(schema.is_subtype(
            &TypeReference::named("User").non_null(),
            &TypeReference::named("Node")
        ));
        assert!(!schema.is_subtype(
            &TypeReference::named("Node"),
            &TypeReference::named("User")
        ));
    }
}
