//! Flow and TypeScript declarations for response shapes and variables.
//!
//! Types are derived from the reader IR: fragment spreads stay opaque and
//! show up as `$fragmentSpreads` references, conditional selections become
//! optional properties.

use std::collections::{BTreeMap, BTreeSet};

use hive_compiler_config::{artifacts::ArtifactLanguage, CompilerConfig};
use tracing::instrument;

use crate::ir::{FragmentDefinition, OperationDefinition, Selection, VariableDefinition};
use crate::schema::{SchemaModel, TypeDefinition, TypeReference};

const FUTURE_ENUM_VALUE: &str = "%future added value";

#[derive(Debug, Clone, PartialEq)]
enum TypeExpr {
    Named(String),
    Union(Vec<String>),
    Nullable(Box<TypeExpr>),
    List(Box<TypeExpr>),
    Object(ObjectShape),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ObjectShape {
    properties: Vec<Property>,
    fragment_spreads: Vec<String>,
    readonly: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Property {
    key: String,
    optional: bool,
    value: TypeExpr,
}

impl ObjectShape {
    fn push(&mut self, property: Property) {
        match self
            .properties
            .iter_mut()
            .find(|existing| existing.key == property.key)
        {
            Some(existing) => existing.optional &= property.optional,
            None => self.properties.push(property),
        }
    }
}

pub struct TypeGenerator<'a> {
    schema: &'a SchemaModel,
    language: ArtifactLanguage,
    custom_scalars: &'a BTreeMap<String, String>,
    future_proof_enums: bool,
}

impl<'a> TypeGenerator<'a> {
    pub fn new(schema: &'a SchemaModel, config: &'a CompilerConfig) -> Self {
        Self {
            schema,
            language: config.artifact_language,
            custom_scalars: &config.custom_scalar_map,
            future_proof_enums: !config.no_future_proof_enums,
        }
    }

    /// `<Name>$variables`, `<Name>$data` and `<Name>` declarations, `None`
    /// when the configured language emits no types.
    #[instrument(level = "trace", skip_all, fields(operation = %operation.name))]
    pub fn operation_types(&self, operation: &OperationDefinition) -> Option<String> {
        if self.language == ArtifactLanguage::Plain {
            return None;
        }

        let mut out = String::new();
        for (name, shape) in self.input_objects(&operation.variable_definitions) {
            self.declare(&mut out, &name, &TypeExpr::Object(shape));
        }

        let variables = self.variables_shape(&operation.variable_definitions);
        self.declare(
            &mut out,
            &format!("{}$variables", operation.name),
            &TypeExpr::Object(variables),
        );

        let data = self.response_shape(&operation.selections, &operation.type_name);
        self.declare(
            &mut out,
            &format!("{}$data", operation.name),
            &TypeExpr::Object(data),
        );

        let wrapper = ObjectShape {
            properties: vec![
                Property {
                    key: "response".to_string(),
                    optional: false,
                    value: TypeExpr::Named(format!("{}$data", operation.name)),
                },
                Property {
                    key: "variables".to_string(),
                    optional: false,
                    value: TypeExpr::Named(format!("{}$variables", operation.name)),
                },
            ],
            fragment_spreads: vec![],
            readonly: false,
        };
        self.declare(&mut out, &operation.name, &TypeExpr::Object(wrapper));
        Some(out)
    }

    /// `<Name>$data` and `<Name>$key` declarations of a fragment.
    #[instrument(level = "trace", skip_all, fields(fragment = %fragment.name))]
    pub fn fragment_types(&self, fragment: &FragmentDefinition) -> Option<String> {
        if self.language == ArtifactLanguage::Plain {
            return None;
        }

        let mut out = String::new();
        let data = self.response_shape(&fragment.selections, &fragment.type_condition);
        self.declare(
            &mut out,
            &format!("{}$data", fragment.name),
            &TypeExpr::Object(data),
        );

        let key = ObjectShape {
            properties: vec![],
            fragment_spreads: vec![fragment.name.clone()],
            readonly: true,
        };
        self.declare(
            &mut out,
            &format!("{}$key", fragment.name),
            &TypeExpr::Object(key),
        );
        Some(out)
    }

    fn declare(&self, out: &mut String, name: &str, value: &TypeExpr) {
        out.push_str("export type ");
        out.push_str(name);
        out.push_str(" = ");
        self.render(out, value, 0, false);
        out.push_str(";\n");
    }

    fn response_shape(&self, selections: &[Selection], parent_type: &str) -> ObjectShape {
        let mut shape = ObjectShape {
            readonly: true,
            ..Default::default()
        };
        self.collect(selections, parent_type, false, &mut shape);
        shape
    }

    fn collect(
        &self,
        selections: &[Selection],
        parent_type: &str,
        optional: bool,
        shape: &mut ObjectShape,
    ) {
        for selection in selections {
            match selection {
                Selection::ScalarField(field) => shape.push(Property {
                    key: field.response_key().to_string(),
                    optional,
                    value: self.output_type(&field.field_type, None),
                }),
                Selection::LinkedField(field) => {
                    let object = self.response_shape(&field.selections, field.type_name());
                    shape.push(Property {
                        key: field.response_key().to_string(),
                        optional,
                        value: self.output_type(&field.field_type, Some(object)),
                    })
                }
                Selection::InlineFragment(fragment) => {
                    let narrows = fragment
                        .type_condition
                        .as_deref()
                        .is_some_and(|type_condition| type_condition != parent_type);
                    self.collect(&fragment.selections, parent_type, optional || narrows, shape)
                }
                Selection::FragmentSpread(spread) => {
                    if !shape.fragment_spreads.contains(&spread.fragment_name) {
                        shape.fragment_spreads.push(spread.fragment_name.clone());
                    }
                }
                Selection::Condition(condition) => {
                    self.collect(&condition.selections, parent_type, true, shape)
                }
            }
        }
    }

    fn output_type(&self, type_ref: &TypeReference, object: Option<ObjectShape>) -> TypeExpr {
        match type_ref {
            TypeReference::NonNull(inner) => self.output_inner(inner, object),
            other => TypeExpr::Nullable(Box::new(self.output_inner(other, object))),
        }
    }

    fn output_inner(&self, type_ref: &TypeReference, object: Option<ObjectShape>) -> TypeExpr {
        match type_ref {
            TypeReference::NonNull(inner) => self.output_inner(inner, object),
            TypeReference::List(item) => TypeExpr::List(Box::new(self.output_type(item, object))),
            TypeReference::Named(name) => match object {
                Some(object) => TypeExpr::Object(object),
                None => self.leaf(name, self.future_proof_enums),
            },
        }
    }

    fn leaf(&self, name: &str, future_proof: bool) -> TypeExpr {
        match name {
            "ID" | "String" => return TypeExpr::Named("string".to_string()),
            "Int" | "Float" => return TypeExpr::Named("number".to_string()),
            "Boolean" => return TypeExpr::Named("boolean".to_string()),
            _ => {}
        }

        match self.schema.type_by_name(name) {
            Some(TypeDefinition::Enum(enum_type)) => {
                let mut members: Vec<String> = enum_type
                    .values
                    .iter()
                    .map(|value| format!("\"{}\"", value.name))
                    .collect();
                if future_proof {
                    members.push(format!("\"{}\"", FUTURE_ENUM_VALUE));
                }
                TypeExpr::Union(members)
            }
            Some(TypeDefinition::InputObject(_)) => TypeExpr::Named(name.to_string()),
            _ => match self.custom_scalars.get(name) {
                Some(mapped) => TypeExpr::Named(mapped.clone()),
                None => TypeExpr::Named(self.unknown().to_string()),
            },
        }
    }

    fn unknown(&self) -> &'static str {
        match self.language {
            ArtifactLanguage::Flow => "mixed",
            _ => "unknown",
        }
    }

    fn input_type(&self, type_ref: &TypeReference) -> TypeExpr {
        match type_ref {
            TypeReference::NonNull(inner) => self.input_inner(inner),
            other => TypeExpr::Nullable(Box::new(self.input_inner(other))),
        }
    }

    fn input_inner(&self, type_ref: &TypeReference) -> TypeExpr {
        match type_ref {
            TypeReference::NonNull(inner) => self.input_inner(inner),
            TypeReference::List(item) => TypeExpr::List(Box::new(self.input_type(item))),
            TypeReference::Named(name) => self.leaf(name, false),
        }
    }

    fn variables_shape(&self, definitions: &[VariableDefinition]) -> ObjectShape {
        ObjectShape {
            properties: definitions
                .iter()
                .map(|definition| Property {
                    key: definition.name.clone(),
                    optional: !definition.is_required(),
                    value: self.input_type(&definition.value_type),
                })
                .collect(),
            fragment_spreads: vec![],
            readonly: false,
        }
    }

    /// Every input object reachable from `definitions`, sorted by name.
    fn input_objects(&self, definitions: &[VariableDefinition]) -> BTreeMap<String, ObjectShape> {
        let mut shapes = BTreeMap::new();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = definitions
            .iter()
            .map(|definition| definition.value_type.inner_type())
            .collect();

        while let Some(name) = stack.pop() {
            let Some(TypeDefinition::InputObject(input)) = self.schema.type_by_name(name) else {
                continue;
            };
            if !seen.insert(name) {
                continue;
            }
            let properties = input
                .fields
                .values()
                .map(|field| {
                    stack.push(field.value_type.inner_type());
                    Property {
                        key: field.name.clone(),
                        optional: !field.is_required(),
                        value: self.input_type(&field.value_type),
                    }
                })
                .collect();
            shapes.insert(
                name.to_string(),
                ObjectShape {
                    properties,
                    fragment_spreads: vec![],
                    readonly: false,
                },
            );
        }
        shapes
    }

    fn render(&self, out: &mut String, value: &TypeExpr, depth: usize, nullable: bool) {
        let flow = self.language == ArtifactLanguage::Flow;
        match value {
            TypeExpr::Named(name) => out.push_str(name),
            TypeExpr::Union(members) => {
                let wrap = flow && nullable;
                if wrap {
                    out.push('(');
                }
                out.push_str(&members.join(" | "));
                if wrap {
                    out.push(')');
                }
            }
            TypeExpr::Nullable(inner) => {
                if flow {
                    out.push('?');
                    self.render(out, inner, depth, true);
                } else {
                    self.render(out, inner, depth, true);
                    out.push_str(" | null | undefined");
                }
            }
            TypeExpr::List(item) => {
                out.push_str(if flow {
                    "$ReadOnlyArray<"
                } else {
                    "ReadonlyArray<"
                });
                self.render(out, item, depth, false);
                out.push('>');
            }
            TypeExpr::Object(shape) => self.render_object(out, shape, depth),
        }
    }

    fn render_object(&self, out: &mut String, shape: &ObjectShape, depth: usize) {
        let flow = self.language == ArtifactLanguage::Flow;
        let (open, close, separator) = if flow {
            ("{|", "|}", ",")
        } else {
            ("{", "}", ";")
        };

        if shape.properties.is_empty() && shape.fragment_spreads.is_empty() {
            out.push_str(open);
            out.push_str(close);
            return;
        }

        let indent = "  ".repeat(depth + 1);
        out.push_str(open);
        out.push('\n');

        for property in &shape.properties {
            out.push_str(&indent);
            if shape.readonly {
                out.push_str(if flow { "+" } else { "readonly " });
            }
            out.push_str(&property.key);
            if property.optional {
                out.push('?');
            }
            out.push_str(": ");
            self.render(out, &property.value, depth + 1, false);
            out.push_str(separator);
            out.push('\n');
        }

        if !shape.fragment_spreads.is_empty() {
            out.push_str(&indent);
            out.push_str(if flow { "+" } else { "readonly " });
            out.push_str("$fragmentSpreads: ");
            let names: Vec<String> = shape
                .fragment_spreads
                .iter()
                .map(|name| format!("\"{}\"", name))
                .collect();
            out.push_str(&names.join(" | "));
            out.push_str(separator);
            out.push('\n');
        }

        out.push_str(&"  ".repeat(depth));
        out.push_str(close);
    }
}

/// Response paths whose value the schema guarantees to be non-null, e.g.
/// `me.posts.title`. List items share the path of their list.
pub fn non_null_paths(selections: &[Selection]) -> Vec<String> {
    let mut out = vec![];
    collect_non_null_paths(selections, "", &mut out);
    out
}

fn collect_non_null_paths(selections: &[Selection], prefix: &str, out: &mut Vec<String>) {
    for selection in selections {
        match selection {
            Selection::ScalarField(field) => {
                if field.field_type.is_non_null() {
                    push_unique(out, join_path(prefix, field.response_key()));
                }
            }
            Selection::LinkedField(field) => {
                let path = join_path(prefix, field.response_key());
                if field.field_type.is_non_null() {
                    push_unique(out, path.clone());
                }
                collect_non_null_paths(&field.selections, &path, out);
            }
            Selection::InlineFragment(fragment) => {
                collect_non_null_paths(&fragment.selections, prefix, out)
            }
            Selection::Condition(condition) => {
                collect_non_null_paths(&condition.selections, prefix, out)
            }
            Selection::FragmentSpread(_) => {}
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn push_unique(out: &mut Vec<String>, path: String) {
    if !out.contains(&path) {
        out.push(path);
    }
}
