use std::collections::{BTreeSet, HashMap};

use graphql_syntax::parse_schema;
use graphql_syntax::schema::{
    self as sdl, Definition, Directive, Document as SchemaDocument, TypeExtension,
};
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::diagnostics::{Diagnostic, SchemaDiagnostics};
use crate::ir::ConstantValue;
use crate::schema::builtins::{BUILTIN_DEFINITIONS, BUILTIN_SCALARS, DEFAULT_DEPRECATION_REASON};
use crate::schema::definitions::*;
use crate::schema::SchemaModel;

/// Parses and validates SDL text.
///
/// Every violation is reported; a schema with any violation does not load.
pub fn load_schema(sdl: &str) -> Result<SchemaModel, SchemaDiagnostics> {
    let document = parse_schema(sdl)
        .map_err(|error| SchemaDiagnostics::new(vec![Diagnostic::schema(error.to_string())]))?;

    SchemaModel::from_document(&document)
}

impl SchemaModel {
    #[instrument(level = "trace", skip_all, fields(definitions = document.definitions.len()))]
    pub fn from_document(document: &SchemaDocument) -> Result<Self, SchemaDiagnostics> {
        let mut builder = SchemaBuilder::default();
        builder.add_builtins()?;

        let mut extensions = vec![];
        let mut schema_definitions = vec![];

        for definition in &document.definitions {
            match definition {
                Definition::TypeDefinition(type_def) => builder.add_type(type_def, false),
                Definition::TypeExtension(extension) => extensions.push(extension),
                Definition::DirectiveDefinition(directive) => builder.add_directive(directive, false),
                Definition::SchemaDefinition(schema) | Definition::SchemaExtension(schema) => {
                    schema_definitions.push(schema)
                }
            }
        }

        for extension in extensions {
            builder.extend_type(extension);
        }

        for schema in schema_definitions {
            builder.set_root_types(schema);
        }

        builder.finish()
    }
}

#[derive(Default)]
struct SchemaBuilder {
    types: IndexMap<String, TypeDefinition>,
    directives: IndexMap<String, DirectiveDefinition>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    errors: Vec<Diagnostic>,
}

impl SchemaBuilder {
    fn error(&mut self, message: String) {
        self.errors.push(Diagnostic::schema(message));
    }

    fn add_builtins(&mut self) -> Result<(), SchemaDiagnostics> {
        for name in BUILTIN_SCALARS {
            self.types.insert(
                name.to_string(),
                TypeDefinition::Scalar(ScalarType {
                    name: name.to_string(),
                    description: None,
                    builtin: true,
                    specified_by: None,
                }),
            );
        }

        let builtins = parse_schema(BUILTIN_DEFINITIONS).map_err(|error| {
            SchemaDiagnostics::new(vec![Diagnostic::internal(
                format!("Invalid built-in definitions: {}", error),
                None,
            )])
        })?;
        for definition in &builtins.definitions {
            if let Definition::DirectiveDefinition(directive) = definition {
                self.add_directive(directive, true);
            }
        }

        Ok(())
    }

    fn add_type(&mut self, definition: &sdl::TypeDefinition, is_extension: bool) {
        let name = definition.name().to_string();

        if let Some(existing) = self.types.get(&name) {
            let redeclares_builtin = matches!(
                (existing, definition),
                (TypeDefinition::Scalar(ScalarType { builtin: true, .. }), sdl::TypeDefinition::Scalar(_))
            );
            if !redeclares_builtin && !is_extension {
                self.error(format!("Type `{}` is defined more than once", name));
            }
            return;
        }

        let converted = match definition {
            sdl::TypeDefinition::Scalar(scalar) => TypeDefinition::Scalar(ScalarType {
                name: scalar.name.clone(),
                description: scalar.description.clone(),
                builtin: false,
                specified_by: find_directive(&scalar.directives, "specifiedBy")
                    .and_then(|d| d.argument("url"))
                    .and_then(|arg| ConstantValue::from_syntax(&arg.value))
                    .and_then(|value| value.as_str().map(str::to_string)),
            }),
            sdl::TypeDefinition::Enum(enum_type) => TypeDefinition::Enum(EnumType {
                name: enum_type.name.clone(),
                description: enum_type.description.clone(),
                values: enum_type.values.iter().map(convert_enum_value).collect(),
            }),
            sdl::TypeDefinition::InputObject(input) => TypeDefinition::InputObject(InputObjectType {
                name: input.name.clone(),
                description: input.description.clone(),
                fields: input
                    .fields
                    .iter()
                    .map(|field| (field.name.clone(), convert_input_value(field)))
                    .collect(),
            }),
            sdl::TypeDefinition::Object(object) => TypeDefinition::Object(ObjectType {
                name: object.name.clone(),
                description: object.description.clone(),
                fields: convert_fields(&object.name, &object.fields),
                interfaces: object.implements_interfaces.clone(),
            }),
            sdl::TypeDefinition::Interface(interface) => TypeDefinition::Interface(InterfaceType {
                name: interface.name.clone(),
                description: interface.description.clone(),
                fields: convert_fields(&interface.name, &interface.fields),
                interfaces: interface.implements_interfaces.clone(),
                implementing_types: vec![],
            }),
            sdl::TypeDefinition::Union(union) => TypeDefinition::Union(UnionType {
                name: union.name.clone(),
                description: union.description.clone(),
                members: union.types.clone(),
            }),
        };

        self.types.insert(name, converted);
    }

    fn add_directive(&mut self, directive: &sdl::DirectiveDefinition, builtin: bool) {
        if !builtin {
            if let Some(existing) = self.directives.get(&directive.name) {
                if !existing.builtin {
                    self.error(format!(
                        "Directive `@{}` is defined more than once",
                        directive.name
                    ));
                    return;
                }
            }
        }

        self.directives.insert(
            directive.name.clone(),
            DirectiveDefinition {
                name: directive.name.clone(),
                description: directive.description.clone(),
                arguments: directive.arguments.iter().map(convert_input_value).collect(),
                locations: directive.locations.clone(),
                repeatable: directive.repeatable,
                builtin,
            },
        );
    }

    fn extend_type(&mut self, extension: &TypeExtension) {
        let TypeExtension(definition) = extension;
        let name = definition.name();

        let Some(existing) = self.types.get_mut(name) else {
            self.error(format!("Cannot extend undefined type `{}`", name));
            return;
        };

        match (existing, definition) {
            (TypeDefinition::Scalar(_), sdl::TypeDefinition::Scalar(_)) => {}
            (TypeDefinition::Enum(target), sdl::TypeDefinition::Enum(ext)) => {
                target
                    .values
                    .extend(ext.values.iter().map(convert_enum_value));
            }
            (TypeDefinition::InputObject(target), sdl::TypeDefinition::InputObject(ext)) => {
                for field in &ext.fields {
                    target
                        .fields
                        .insert(field.name.clone(), convert_input_value(field));
                }
            }
            (TypeDefinition::Object(target), sdl::TypeDefinition::Object(ext)) => {
                target.fields.extend(convert_fields(&target.name, &ext.fields));
                target.interfaces.extend(ext.implements_interfaces.iter().cloned());
            }
            (TypeDefinition::Interface(target), sdl::TypeDefinition::Interface(ext)) => {
                target.fields.extend(convert_fields(&target.name, &ext.fields));
                target.interfaces.extend(ext.implements_interfaces.iter().cloned());
            }
            (TypeDefinition::Union(target), sdl::TypeDefinition::Union(ext)) => {
                target.members.extend(ext.types.iter().cloned());
            }
            (existing, _) => {
                let message = format!(
                    "Cannot extend {} `{}` with a `{}` extension",
                    existing.kind_name(),
                    name,
                    definition.kind_name()
                );
                self.error(message);
            }
        }
    }

    fn set_root_types(&mut self, schema: &sdl::SchemaDefinition) {
        if let Some(query) = &schema.query {
            self.query_type = Some(query.clone());
        }
        if let Some(mutation) = &schema.mutation {
            self.mutation_type = Some(mutation.clone());
        }
        if let Some(subscription) = &schema.subscription {
            self.subscription_type = Some(subscription.clone());
        }
    }

    fn finish(mut self) -> Result<SchemaModel, SchemaDiagnostics> {
        for (slot, conventional) in [
            (&mut self.query_type, "Query"),
            (&mut self.mutation_type, "Mutation"),
            (&mut self.subscription_type, "Subscription"),
        ] {
            if slot.is_none() && self.types.contains_key(conventional) {
                *slot = Some(conventional.to_string());
            }
        }

        self.compute_implementations();
        let possible_types = self.compute_possible_types();

        let mut validator = SchemaValidator {
            types: &self.types,
            errors: vec![],
        };
        validator.validate_types();
        validator.validate_directives(&self.directives);
        validator.validate_root_types([
            ("query", self.query_type.as_deref()),
            ("mutation", self.mutation_type.as_deref()),
            ("subscription", self.subscription_type.as_deref()),
        ]);
        let validation_errors = validator.errors;
        self.errors.extend(validation_errors);

        if !self.errors.is_empty() {
            debug!("schema failed to load with {} errors", self.errors.len());
            return Err(SchemaDiagnostics::new(self.errors));
        }

        Ok(SchemaModel {
            types: self.types,
            directives: self.directives,
            query_type: self.query_type,
            mutation_type: self.mutation_type,
            subscription_type: self.subscription_type,
            possible_types,
        })
    }

    fn compute_implementations(&mut self) {
        let mut implementations: HashMap<String, BTreeSet<String>> = HashMap::new();
        for type_def in self.types.values() {
            let interfaces = match type_def {
                TypeDefinition::Object(object) => &object.interfaces,
                TypeDefinition::Interface(interface) => &interface.interfaces,
                _ => continue,
            };
            for interface in interfaces {
                implementations
                    .entry(interface.clone())
                    .or_default()
                    .insert(type_def.name().to_string());
            }
        }

        for type_def in self.types.values_mut() {
            if let TypeDefinition::Interface(interface) = type_def {
                if let Some(implementing) = implementations.remove(&interface.name) {
                    interface.implementing_types = implementing.into_iter().collect();
                }
            }
        }
    }

    fn compute_possible_types(&self) -> HashMap<String, Vec<String>> {
        let mut possible_types = HashMap::new();
        for type_def in self.types.values() {
            let members: BTreeSet<String> = match type_def {
                TypeDefinition::Object(object) => BTreeSet::from([object.name.clone()]),
                TypeDefinition::Interface(interface) => interface
                    .implementing_types
                    .iter()
                    .filter(|name| matches!(self.types.get(*name), Some(TypeDefinition::Object(_))))
                    .cloned()
                    .collect(),
                TypeDefinition::Union(union) => union
                    .members
                    .iter()
                    .filter(|name| matches!(self.types.get(*name), Some(TypeDefinition::Object(_))))
                    .cloned()
                    .collect(),
                _ => continue,
            };
            possible_types.insert(type_def.name().to_string(), members.into_iter().collect());
        }
        possible_types
    }
}

struct SchemaValidator<'a> {
    types: &'a IndexMap<String, TypeDefinition>,
    errors: Vec<Diagnostic>,
}

impl<'a> SchemaValidator<'a> {
    fn error(&mut self, message: String) {
        self.errors.push(Diagnostic::schema(message));
    }

    fn validate_types(&mut self) {
        for type_def in self.types.values() {
            match type_def {
                TypeDefinition::Scalar(_) => {}
                TypeDefinition::Enum(enum_type) => {
                    let mut seen = BTreeSet::new();
                    for value in &enum_type.values {
                        if !seen.insert(value.name.as_str()) {
                            self.error(format!(
                                "Enum value `{}.{}` is defined more than once",
                                enum_type.name, value.name
                            ));
                        }
                    }
                }
                TypeDefinition::InputObject(input) => {
                    for field in input.fields.values() {
                        self.validate_input_type(
                            &field.value_type,
                            &format!("`{}.{}`", input.name, field.name),
                        );
                    }
                }
                TypeDefinition::Object(object) => {
                    self.validate_fields(&object.fields);
                    self.validate_implementations(&object.name, &object.fields, &object.interfaces);
                }
                TypeDefinition::Interface(interface) => {
                    self.validate_fields(&interface.fields);
                    self.validate_implementations(
                        &interface.name,
                        &interface.fields,
                        &interface.interfaces,
                    );
                }
                TypeDefinition::Union(union) => {
                    for member in &union.members {
                        match self.types.get(member) {
                            None => self.error(format!(
                                "Unknown type `{}` in union `{}`",
                                member, union.name
                            )),
                            Some(TypeDefinition::Object(_)) => {}
                            Some(other) => self.error(format!(
                                "Union `{}` member `{}` is not an object type, found {}",
                                union.name,
                                member,
                                other.kind_name()
                            )),
                        }
                    }
                }
            }
        }
    }

    fn validate_fields(&mut self, fields: &IndexMap<String, FieldDefinition>) {
        for field in fields.values() {
            let coordinate = field.coordinate();
            match self.types.get(field.field_type.inner_type()) {
                None => self.error(format!(
                    "Unknown type `{}` referenced by `{}`",
                    field.field_type.inner_type(),
                    coordinate
                )),
                Some(type_def) if !type_def.is_output_type() => self.error(format!(
                    "Field `{}` must be an output type but has input type `{}`",
                    coordinate, field.field_type
                )),
                Some(_) => {}
            }

            for argument in &field.arguments {
                self.validate_input_type(
                    &argument.value_type,
                    &format!("`{}({}:)`", coordinate, argument.name),
                );
            }
        }
    }

    fn validate_input_type(&mut self, value_type: &TypeReference, owner: &str) {
        match self.types.get(value_type.inner_type()) {
            None => self.error(format!(
                "Unknown type `{}` referenced by {}",
                value_type.inner_type(),
                owner
            )),
            Some(type_def) if !type_def.is_input_type() => self.error(format!(
                "{} must be an input type but has type `{}`",
                owner, value_type
            )),
            Some(_) => {}
        }
    }

    fn validate_implementations(
        &mut self,
        type_name: &str,
        fields: &IndexMap<String, FieldDefinition>,
        interfaces: &[String],
    ) {
        for interface_name in interfaces {
            let interface = match self.types.get(interface_name) {
                None => {
                    self.error(format!(
                        "Unknown interface `{}` implemented by `{}`",
                        interface_name, type_name
                    ));
                    continue;
                }
                Some(TypeDefinition::Interface(interface)) => interface,
                Some(other) => {
                    self.error(format!(
                        "Type `{}` implements `{}`, which is {} and not an interface",
                        type_name,
                        interface_name,
                        other.kind_name()
                    ));
                    continue;
                }
            };

            for interface_field in interface.fields.values() {
                let Some(field) = fields.get(&interface_field.name) else {
                    self.error(format!(
                        "Interface field `{}` expected but `{}` does not provide it",
                        interface_field.coordinate(),
                        type_name
                    ));
                    continue;
                };

                if !self.is_subtype(&field.field_type, &interface_field.field_type) {
                    self.error(format!(
                        "Interface field `{}` expects type `{}` but `{}` is type `{}`",
                        interface_field.coordinate(),
                        interface_field.field_type,
                        field.coordinate(),
                        field.field_type
                    ));
                }

                for interface_arg in &interface_field.arguments {
                    match field.argument(&interface_arg.name) {
                        None => self.error(format!(
                            "Interface field argument `{}({}:)` expected but `{}` does not provide it",
                            interface_field.coordinate(),
                            interface_arg.name,
                            field.coordinate()
                        )),
                        Some(arg) if arg.value_type != interface_arg.value_type => {
                            self.error(format!(
                                "Interface field argument `{}({}:)` expects type `{}` but `{}({}:)` is type `{}`",
                                interface_field.coordinate(),
                                interface_arg.name,
                                interface_arg.value_type,
                                field.coordinate(),
                                arg.name,
                                arg.value_type
                            ))
                        }
                        Some(_) => {}
                    }
                }

                for arg in &field.arguments {
                    if arg.is_required() && interface_field.argument(&arg.name).is_none() {
                        self.error(format!(
                            "Field `{}` includes required argument `{}` that is missing from the interface field `{}`",
                            field.coordinate(),
                            arg.name,
                            interface_field.coordinate()
                        ));
                    }
                }
            }
        }
    }

    fn is_subtype(&self, maybe_sub: &TypeReference, sup: &TypeReference) -> bool {
        match (maybe_sub, sup) {
            _ if maybe_sub == sup => true,
            (TypeReference::NonNull(sub), TypeReference::NonNull(sup)) => self.is_subtype(sub, sup),
            (TypeReference::NonNull(sub), _) => self.is_subtype(sub, sup),
            (_, TypeReference::NonNull(_)) => false,
            (TypeReference::List(sub), TypeReference::List(sup)) => self.is_subtype(sub, sup),
            (TypeReference::List(_), _) | (_, TypeReference::List(_)) => false,
            (TypeReference::Named(sub), TypeReference::Named(sup)) => {
                match (self.types.get(sub), self.types.get(sup)) {
                    (Some(TypeDefinition::Object(object)), Some(TypeDefinition::Interface(_))) => {
                        object.interfaces.contains(sup)
                    }
                    (Some(TypeDefinition::Interface(interface)), Some(TypeDefinition::Interface(_))) => {
                        interface.interfaces.contains(sup)
                    }
                    (Some(TypeDefinition::Object(_)), Some(TypeDefinition::Union(union))) => {
                        union.members.contains(sub)
                    }
                    _ => false,
                }
            }
        }
    }

    fn validate_directives(&mut self, directives: &IndexMap<String, DirectiveDefinition>) {
        for directive in directives.values() {
            for argument in &directive.arguments {
                self.validate_input_type(
                    &argument.value_type,
                    &format!("`@{}({}:)`", directive.name, argument.name),
                );
            }
        }
    }

    fn validate_root_types<'n>(&mut self, roots: [(&str, Option<&'n str>); 3]) {
        for (operation, root) in roots {
            let Some(root) = root else { continue };
            match self.types.get(root) {
                None => self.error(format!(
                    "Unknown type `{}` used as {} root type",
                    root, operation
                )),
                Some(TypeDefinition::Object(_)) => {}
                Some(other) => self.error(format!(
                    "The {} root type must be an object type, `{}` is {}",
                    operation,
                    root,
                    other.kind_name()
                )),
            }
        }
    }
}

fn find_directive<'d>(directives: &'d [Directive], name: &str) -> Option<&'d Directive> {
    directives.iter().find(|directive| directive.name == name)
}

fn deprecation_reason(directives: &[Directive]) -> Option<String> {
    find_directive(directives, "deprecated").map(|directive| {
        directive
            .argument("reason")
            .and_then(|arg| ConstantValue::from_syntax(&arg.value))
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_DEPRECATION_REASON.to_string())
    })
}

fn convert_fields(parent_type: &str, fields: &[sdl::Field]) -> IndexMap<String, FieldDefinition> {
    fields
        .iter()
        .map(|field| {
            (
                field.name.clone(),
                FieldDefinition {
                    name: field.name.clone(),
                    parent_type: parent_type.to_string(),
                    description: field.description.clone(),
                    field_type: TypeReference::from_syntax(&field.field_type),
                    arguments: field.arguments.iter().map(convert_input_value).collect(),
                    deprecation_reason: deprecation_reason(&field.directives),
                },
            )
        })
        .collect()
}

fn convert_input_value(value: &sdl::InputValue) -> InputValueDefinition {
    InputValueDefinition {
        name: value.name.clone(),
        description: value.description.clone(),
        value_type: TypeReference::from_syntax(&value.value_type),
        default_value: value.default_value.as_ref().and_then(ConstantValue::from_syntax),
    }
}

fn convert_enum_value(value: &sdl::EnumValue) -> EnumValueDefinition {
    EnumValueDefinition {
        name: value.name.clone(),
        description: value.description.clone(),
        deprecation_reason: deprecation_reason(&value.directives),
    }
}

#[cfg(test)]
mod tests {
    use super::load_schema;
    use crate::schema::TypeDefinition;

    fn messages(sdl: &str) -> Vec<String> {
        load_schema(sdl)
            .expect_err("schema should fail to load")
            .diagnostics
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn undeclared_type_fails_the_load() {
        let errors = messages(
            r#"
            type User { name: String, best_friend: InvalidType }
            type Query { me: User }
            "#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("InvalidType"));
        insta::assert_snapshot!(errors[0], @"Unknown type `InvalidType` referenced by `User.best_friend`");
    }

    #[test]
    fn one_diagnostic_per_violation() {
        let errors = messages(
            r#"
            interface Node { id: ID! name(upper: Boolean): String }
            type User implements Node & Missing { id: String name: String }
            union U = User | Node
            input In { user: User }
            type Query { me(filter: User): User in: In }
            "#,
        );
        insta::assert_snapshot!(errors.join("\n"), @r"
        Interface field `Node.id` expects type `ID!` but `User.id` is type `String`
        Interface field argument `Node.name(upper:)` expected but `User.name` does not provide it
        Unknown interface `Missing` implemented by `User`
        Union `U` member `Node` is not an object type, found interface
        `In.user` must be an input type but has type `User`
        `Query.me(filter:)` must be an input type but has type `User`
        Field `Query.in` must be an output type but has input type `In`
        ");
    }

    #[test]
    fn extensions_merge_into_base_type() {
        let schema = load_schema(
            r#"
            type Query { me: User }
            type User { name: String }
            extend type User { age: Int }
            extend enum Color { BLUE }
            enum Color { RED }
            "#,
        )
        .expect("to load");

        let Some(TypeDefinition::Object(user)) = schema.type_by_name("User") else {
            panic!("expected User");
        };
        assert_eq!(user.fields.keys().collect::<Vec<_>>(), ["name", "age"]);
        let Some(TypeDefinition::Enum(color)) = schema.type_by_name("Color") else {
            panic!("expected Color");
        };
        assert!(color.has_value("BLUE"));
    }

    #[test]
    fn extending_undefined_type() {
        assert_eq!(
            messages("type Query { a: Int } extend type Nope { b: Int }"),
            vec!["Cannot extend undefined type `Nope`"]
        );
    }

    #[test]
    fn deprecation_reason_defaults() {
        let schema = load_schema(
            r#"type Query { old: Int @deprecated, older: Int @deprecated(reason: "use new") }"#,
        )
        .expect("to load");
        assert_eq!(
            schema.field("Query", "old").unwrap().deprecation_reason.as_deref(),
            Some("No longer supported")
        );
        assert_eq!(
            schema.field("Query", "older").unwrap().deprecation_reason.as_deref(),
            Some("use new")
        );
    }

    #[test]
    fn syntax_error_is_a_schema_diagnostic() {
        let errors = messages("type Query { a Int }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Syntax Error: Expected"));
        assert!(errors[0].contains("`:`"));
    }
}
