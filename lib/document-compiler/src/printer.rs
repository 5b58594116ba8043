//! Canonical GraphQL text for IR definitions.
//!
//! Printing never consults the schema. Arguments are sorted by name and
//! `@include`/`@skip` conditions are written on every selection they guard,
//! so equivalent documents print identically.

use graphql_syntax::{format_with_style, write_quoted, Displayable, Formatter, Style};

use crate::ir::{
    Argument, Condition, ConditionValue, Directive, FragmentDefinition, OperationDefinition,
    Program, Selection, VariableDefinition,
};

pub fn print_operation(operation: &OperationDefinition) -> String {
    format_with_style(operation, &Style::default())
}

pub fn print_fragment(fragment: &FragmentDefinition) -> String {
    format_with_style(fragment, &Style::default())
}

/// The operation followed by every fragment it reaches, sorted by name.
pub fn print_full_operation(program: &Program, operation: &OperationDefinition) -> String {
    let mut text = print_operation(operation);
    for name in program.referenced_fragments(&operation.selections) {
        if let Some(fragment) = program.fragment(&name) {
            text.push('\n');
            text.push_str(&print_fragment(fragment));
        }
    }
    text
}

/// Every operation, then every fragment, in program order.
pub fn print_program(program: &Program) -> String {
    program
        .operations()
        .map(|operation| print_operation(operation))
        .chain(program.fragments().map(|fragment| print_fragment(fragment)))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Displayable for OperationDefinition {
    fn display(&self, f: &mut Formatter) {
        f.write(self.kind.as_str());
        f.write(" ");
        f.write(&self.name);
        print_variable_definitions(f, &self.variable_definitions);
        print_directives(f, &self.directives);
        f.write(" ");
        f.start_block();
        print_selections(f, &self.selections, &[]);
        f.end_block();
    }
}

impl Displayable for FragmentDefinition {
    fn display(&self, f: &mut Formatter) {
        f.write("fragment ");
        f.write(&self.name);
        f.write(" on ");
        f.write(&self.type_condition);

        if !self.variable_definitions.is_empty() {
            let mut definitions: Vec<&VariableDefinition> = self.variable_definitions.iter().collect();
            definitions.sort_by(|a, b| a.name.cmp(&b.name));

            f.write(" @argumentDefinitions(");
            for (i, definition) in definitions.into_iter().enumerate() {
                if i > 0 {
                    f.write(", ");
                }
                f.write(&definition.name);
                f.write(": {type: ");
                let mut quoted = String::new();
                // writing into a String never fails
                let _ = write_quoted(&mut quoted, &definition.value_type.to_string());
                f.write(&quoted);
                if let Some(default_value) = &definition.default_value {
                    f.write(", defaultValue: ");
                    f.write(&default_value.to_string());
                }
                f.write("}");
            }
            f.write(")");
        }

        print_directives(f, &self.directives);
        f.write(" ");
        f.start_block();
        print_selections(f, &self.selections, &[]);
        f.end_block();
    }
}

fn print_variable_definitions(f: &mut Formatter, definitions: &[VariableDefinition]) {
    if definitions.is_empty() {
        return;
    }
    f.write("(");
    for (i, definition) in definitions.iter().enumerate() {
        if i > 0 {
            f.write(", ");
        }
        f.write("$");
        f.write(&definition.name);
        f.write(": ");
        f.write(&definition.value_type.to_string());
        if let Some(default_value) = &definition.default_value {
            f.write(" = ");
            f.write(&default_value.to_string());
        }
    }
    f.write(")");
}

fn print_arguments(f: &mut Formatter, arguments: &[Argument]) {
    if arguments.is_empty() {
        return;
    }
    let mut sorted: Vec<&Argument> = arguments.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    f.write("(");
    for (i, argument) in sorted.into_iter().enumerate() {
        if i > 0 {
            f.write(", ");
        }
        f.write(&argument.name);
        f.write(": ");
        f.write(&argument.value.to_string());
    }
    f.write(")");
}

fn print_directives(f: &mut Formatter, directives: &[Directive]) {
    for directive in directives {
        f.write(" @");
        f.write(&directive.name);
        print_arguments(f, &directive.arguments);
    }
}

/// Writes the guards of a selection, outermost first.
fn print_conditions(f: &mut Formatter, conditions: &[&Condition]) {
    for condition in conditions {
        f.write(" @");
        f.write(condition.directive_name());
        f.write("(if: ");
        match &condition.value {
            ConditionValue::Variable(variable) => {
                f.write("$");
                f.write(&variable.name);
            }
            ConditionValue::Constant(value) => f.write(if *value { "true" } else { "false" }),
        }
        f.write(")");
    }
}

fn print_selections(f: &mut Formatter, selections: &[Selection], conditions: &[&Condition]) {
    for selection in selections {
        match selection {
            Selection::ScalarField(field) => {
                f.indent();
                if let Some(alias) = &field.alias {
                    f.write(alias);
                    f.write(": ");
                }
                f.write(&field.name);
                print_arguments(f, &field.arguments);
                print_directives(f, &field.directives);
                print_conditions(f, conditions);
                f.endline();
            }
            Selection::LinkedField(field) => {
                f.indent();
                if let Some(alias) = &field.alias {
                    f.write(alias);
                    f.write(": ");
                }
                f.write(&field.name);
                print_arguments(f, &field.arguments);
                print_directives(f, &field.directives);
                print_conditions(f, conditions);
                f.write(" ");
                f.start_block();
                print_selections(f, &field.selections, &[]);
                f.end_block();
            }
            Selection::InlineFragment(fragment) => {
                f.indent();
                f.write("...");
                if let Some(type_condition) = &fragment.type_condition {
                    f.write(" on ");
                    f.write(type_condition);
                }
                print_directives(f, &fragment.directives);
                print_conditions(f, conditions);
                f.write(" ");
                f.start_block();
                print_selections(f, &fragment.selections, &[]);
                f.end_block();
            }
            Selection::FragmentSpread(spread) => {
                f.indent();
                f.write("...");
                f.write(&spread.fragment_name);
                if !spread.arguments.is_empty() {
                    f.write(" @arguments");
                    print_arguments(f, &spread.arguments);
                }
                print_directives(f, &spread.directives);
                print_conditions(f, conditions);
                f.endline();
            }
            Selection::Condition(condition) => {
                let mut nested = conditions.to_vec();
                nested.push(condition);
                print_selections(f, &condition.selections, &nested);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use graphql_syntax::parse_query;

    use super::{print_full_operation, print_program};
    use crate::tests::testkit::{bind_program, test_schema};

    #[test]
    fn prints_canonical_text() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Profile($id: ID!, $size: Int = 32, $withFriends: Boolean!) {
              node(id: $id) {
                id
                ... on User @include(if: $withFriends) {
                  friends(orderBy: "name", first: 2) { totalCount }
                }
                ...Picture @arguments(size: $size) @skip(if: $withFriends)
              }
            }
            fragment Picture on User @argumentDefinitions(size: {type: "Int", defaultValue: 16}, crop: {type: "Boolean"}) {
              profilePicture(size: $size) { url }
            }
            "#,
        );

        let operation = program.operation("Profile").expect("operation");
        insta::assert_snapshot!(print_full_operation(&program, operation), @r#"
        query Profile($id: ID!, $size: Int = 32, $withFriends: Boolean!) {
          node(id: $id) {
            id
            ... on User @include(if: $withFriends) {
              friends(first: 2, orderBy: "name") {
                totalCount
              }
            }
            ...Picture @arguments(size: $size) @skip(if: $withFriends)
          }
        }

        fragment Picture on User @argumentDefinitions(crop: {type: "Boolean"}, size: {type: "Int", defaultValue: 16}) {
          profilePicture(size: $size) {
            url
          }
        }
        "#);
    }

    #[test]
    fn printed_text_binds_to_the_same_ir() {
        let schema = test_schema();
        let source = r#"
            query Q($cond: Boolean!) {
              me {
                b: name
                friends(last: 3, before: "x") { edges { cursor } }
                ... on Node { id }
                status @include(if: $cond) @skip(if: false)
              }
            }
        "#;
        let program = bind_program(&schema, source);
        let printed = print_program(&program);

        assert!(parse_query(&printed).is_ok());
        let reprinted = print_program(&bind_program(&schema, &printed));
        assert_eq!(printed, reprinted);
    }
}
