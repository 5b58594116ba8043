use crate::common::{Argument, Directive};
use crate::format::{Displayable, Formatter};
use crate::query::ast::*;

impl Displayable for Document {
    fn display(&self, f: &mut Formatter) {
        for (i, definition) in self.definitions.iter().enumerate() {
            if i > 0 {
                f.endline();
            }
            definition.display(f);
        }
    }
}

impl Displayable for Definition {
    fn display(&self, f: &mut Formatter) {
        match self {
            Definition::Operation(op) => op.display(f),
            Definition::Fragment(fragment) => fragment.display(f),
        }
    }
}

impl Displayable for OperationDefinition {
    fn display(&self, f: &mut Formatter) {
        f.indent();
        let shorthand = self.kind == OperationKind::Query
            && self.name.is_none()
            && self.variable_definitions.is_empty()
            && self.directives.is_empty();

        if !shorthand {
            f.write(self.kind.as_str());
            if let Some(name) = &self.name {
                f.write(" ");
                f.write(name);
            }
            if !self.variable_definitions.is_empty() {
                f.write("(");
                for (i, var) in self.variable_definitions.iter().enumerate() {
                    if i > 0 {
                        f.write(", ");
                    }
                    var.display(f);
                }
                f.write(")");
            }
            format_directives(&self.directives, f);
            f.write(" ");
        }
        self.selection_set.display(f);
    }
}

impl Displayable for VariableDefinition {
    fn display(&self, f: &mut Formatter) {
        f.write("$");
        f.write(&self.name);
        f.write(": ");
        f.write(&self.var_type.to_string());
        if let Some(default_value) = &self.default_value {
            f.write(" = ");
            f.write(&default_value.to_string());
        }
        format_directives(&self.directives, f);
    }
}

impl Displayable for FragmentDefinition {
    fn display(&self, f: &mut Formatter) {
        f.indent();
        f.write("fragment ");
        f.write(&self.name);
        f.write(" on ");
        f.write(&self.type_condition);
        format_directives(&self.directives, f);
        f.write(" ");
        self.selection_set.display(f);
    }
}

impl Displayable for SelectionSet {
    fn display(&self, f: &mut Formatter) {
        f.start_block();
        for item in &self.items {
            item.display(f);
        }
        f.end_block();
    }
}

impl Displayable for Selection {
    fn display(&self, f: &mut Formatter) {
        f.indent();
        match self {
            Selection::Field(field) => field.display(f),
            Selection::FragmentSpread(spread) => spread.display(f),
            Selection::InlineFragment(fragment) => fragment.display(f),
        }
    }
}

impl Displayable for Field {
    fn display(&self, f: &mut Formatter) {
        if let Some(alias) = &self.alias {
            f.write(alias);
            f.write(": ");
        }
        f.write(&self.name);
        format_arguments(&self.arguments, f);
        format_directives(&self.directives, f);
        if self.selection_set.is_empty() {
            f.endline();
        } else {
            f.write(" ");
            self.selection_set.display(f);
        }
    }
}

impl Displayable for FragmentSpread {
    fn display(&self, f: &mut Formatter) {
        f.write("...");
        f.write(&self.fragment_name);
        format_directives(&self.directives, f);
        f.endline();
    }
}

impl Displayable for InlineFragment {
    fn display(&self, f: &mut Formatter) {
        f.write("...");
        if let Some(type_condition) = &self.type_condition {
            f.write(" on ");
            f.write(type_condition);
        }
        format_directives(&self.directives, f);
        f.write(" ");
        self.selection_set.display(f);
    }
}

pub(crate) fn format_arguments(arguments: &[Argument], f: &mut Formatter) {
    if arguments.is_empty() {
        return;
    }
    f.write("(");
    for (i, argument) in arguments.iter().enumerate() {
        if i > 0 {
            f.write(if f.multiline_arguments() { ",\n" } else { ", " });
        }
        f.write(&argument.name);
        f.write(": ");
        f.write(&argument.value.to_string());
    }
    f.write(")");
}

pub(crate) fn format_directives(directives: &[Directive], f: &mut Formatter) {
    for directive in directives {
        f.write(" @");
        f.write(&directive.name);
        format_arguments(&directive.arguments, f);
    }
}

impl_display!(
    Document,
    Definition,
    OperationDefinition,
    FragmentDefinition,
    SelectionSet,
    Selection,
    Field,
    VariableDefinition,
    FragmentSpread,
    InlineFragment,
);
