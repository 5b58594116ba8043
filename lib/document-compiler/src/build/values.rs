use std::collections::HashSet;

use graphql_syntax::query::{Argument as SyntaxArgument, Value};
use graphql_syntax::Span;

use crate::build::variables::Scope;
use crate::build::Builder;
use crate::ir::{Argument, ConstantValue, IrValue};
use crate::schema::{InputObjectType, InputValueDefinition, ScalarType, TypeDefinition, TypeReference};

impl Builder<'_> {
    /// Binds the arguments of a field or directive. Errors are recorded and
    /// the offending arguments left out.
    pub(super) fn build_arguments(
        &mut self,
        scope: &mut Scope,
        arguments: &[SyntaxArgument],
        definitions: &[InputValueDefinition],
        owner: &str,
        owner_span: Span,
    ) -> Vec<Argument> {
        let mut seen = HashSet::new();
        let mut built = Vec::with_capacity(arguments.len());

        for argument in arguments {
            if !seen.insert(argument.name.as_str()) {
                self.error(
                    format!("Duplicate argument `{}` on {}", argument.name, owner),
                    argument.span,
                );
                continue;
            }

            let Some(definition) = definitions.iter().find(|def| def.name == argument.name) else {
                self.error(
                    format!("Unknown argument `{}` on {}", argument.name, owner),
                    argument.span,
                );
                continue;
            };

            if let Some(value) = self.build_value(
                scope,
                &argument.value,
                &definition.value_type,
                definition.default_value.is_some(),
                argument.value_span,
            ) {
                built.push(Argument {
                    name: argument.name.clone(),
                    value_type: definition.value_type.clone(),
                    value,
                    location: self.location(argument.span),
                });
            }
        }

        for definition in definitions {
            if definition.is_required() && !seen.contains(definition.name.as_str()) {
                self.error(
                    format!(
                        "Missing required argument `{}` of type `{}` on {}",
                        definition.name, definition.value_type, owner
                    ),
                    owner_span,
                );
            }
        }

        built
    }

    /// Binds a default value; no variable may appear in it.
    pub(super) fn build_constant_value(
        &mut self,
        value: &Value,
        expected: &TypeReference,
        span: Span,
    ) -> Option<ConstantValue> {
        match self.build_value(&mut Scope::constant(), value, expected, false, span)? {
            IrValue::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub(super) fn build_value(
        &mut self,
        scope: &mut Scope,
        value: &Value,
        expected: &TypeReference,
        location_has_default: bool,
        span: Span,
    ) -> Option<IrValue> {
        if let Value::Variable(name) = value {
            return self.build_variable(scope, name, expected, location_has_default, span);
        }

        match expected {
            TypeReference::NonNull(inner) => {
                if matches!(value, Value::Null) {
                    self.error(
                        format!("Expected a non-null value of type `{}`, found null", expected),
                        span,
                    );
                    return None;
                }
                self.build_value(scope, value, inner, false, span)
            }
            _ if matches!(value, Value::Null) => Some(IrValue::Constant(ConstantValue::Null)),
            TypeReference::List(item_type) => match value {
                Value::List(items) => {
                    let mut built = Vec::with_capacity(items.len());
                    let mut valid = true;
                    for item in items {
                        match self.build_value(scope, item, item_type, false, span) {
                            Some(item) => built.push(item),
                            None => valid = false,
                        }
                    }
                    valid.then(|| IrValue::list(built))
                }
                // a single value is accepted where a list is expected
                single => self.build_value(scope, single, item_type, false, span),
            },
            TypeReference::Named(type_name) => {
                let schema = self.schema;
                match schema.type_by_name(type_name) {
                    Some(TypeDefinition::Scalar(scalar)) => self.build_scalar(value, scalar, span),
                    Some(TypeDefinition::Enum(enum_type)) => match value {
                        Value::Enum(name) if enum_type.has_value(name) => {
                            Some(IrValue::Constant(ConstantValue::Enum(name.clone())))
                        }
                        _ => self.type_mismatch(type_name, value, span),
                    },
                    Some(TypeDefinition::InputObject(input)) => match value {
                        Value::Object(fields) => self.build_input_object(scope, fields, input, span),
                        _ => self.type_mismatch(type_name, value, span),
                    },
                    Some(other) => {
                        self.error(
                            format!(
                                "Type `{}` is {} and cannot be used as an input",
                                type_name,
                                other.kind_name()
                            ),
                            span,
                        );
                        None
                    }
                    None => {
                        self.error(format!("Unknown type `{}`", type_name), span);
                        None
                    }
                }
            }
        }
    }

    fn build_scalar(&mut self, value: &Value, scalar: &ScalarType, span: Span) -> Option<IrValue> {
        let accepted = match (scalar.name.as_str(), value) {
            _ if scalar.is_custom() => true,
            ("Int", Value::Int(i)) => i32::try_from(*i).is_ok(),
            ("Float", Value::Int(_) | Value::Float(_)) => true,
            ("String", Value::String(_)) => true,
            ("Boolean", Value::Boolean(_)) => true,
            ("ID", Value::String(_) | Value::Int(_)) => true,
            _ => false,
        };

        if !accepted {
            return self.type_mismatch(&scalar.name, value, span);
        }

        match ConstantValue::from_syntax(value) {
            Some(constant) => Some(IrValue::Constant(constant)),
            None => {
                self.error(
                    format!(
                        "Variables are not allowed inside literals of custom scalar `{}`",
                        scalar.name
                    ),
                    span,
                );
                None
            }
        }
    }

    fn build_input_object(
        &mut self,
        scope: &mut Scope,
        fields: &[(String, Value)],
        input: &InputObjectType,
        span: Span,
    ) -> Option<IrValue> {
        let mut seen = HashSet::new();
        let mut built = Vec::with_capacity(fields.len());
        let mut valid = true;

        for (name, value) in fields {
            if !seen.insert(name.as_str()) {
                self.error(
                    format!("Duplicate field `{}` in input object `{}`", name, input.name),
                    span,
                );
                valid = false;
                continue;
            }

            let Some(definition) = input.fields.get(name) else {
                self.error(
                    format!("Unknown field `{}` on input type `{}`", name, input.name),
                    span,
                );
                valid = false;
                continue;
            };

            match self.build_value(
                scope,
                value,
                &definition.value_type,
                definition.default_value.is_some(),
                span,
            ) {
                Some(value) => built.push((name.clone(), value)),
                None => valid = false,
            }
        }

        for definition in input.fields.values() {
            if definition.is_required() && !seen.contains(definition.name.as_str()) {
                self.error(
                    format!(
                        "Missing required field `{}` of type `{}` on input type `{}`",
                        definition.name, definition.value_type, input.name
                    ),
                    span,
                );
                valid = false;
            }
        }

        valid.then(|| IrValue::object(built))
    }

    fn type_mismatch(&mut self, type_name: &str, value: &Value, span: Span) -> Option<IrValue> {
        self.error(
            format!("Expected a value of type `{}`, found {}", type_name, value),
            span,
        );
        None
    }
}
