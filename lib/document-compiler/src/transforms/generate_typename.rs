use std::sync::Arc;

use tracing::instrument;

use crate::diagnostics::Diagnostic;
use crate::ir::{
    storage_key, InlineFragment, LinkedField, Location, Program, Selection, Transformed,
    Transformer,
};
use crate::schema::SchemaModel;
use crate::transforms::{typename_selection, PassContext};

/// This pass selects `__typename` wherever the runtime has to tell concrete
/// types apart: first in every linked field of an interface or union type,
/// and aliased to the abstract key in inline fragments on abstract types.
#[instrument(level = "trace", skip_all)]
pub fn generate_typename(
    program: &Program,
    _ctx: &PassContext,
) -> Result<Program, Vec<Diagnostic>> {
    let mut transform = GenerateTypenameTransform {
        schema: &program.schema,
    };
    Ok(transform
        .transform_program(program)
        .replace_or_else(|| program.clone()))
}

struct GenerateTypenameTransform<'a> {
    schema: &'a SchemaModel,
}

fn with_typename(
    selections: &[Selection],
    parent_type: &str,
    alias: Option<&str>,
    location: &Location,
) -> Option<Vec<Selection>> {
    let key = storage_key(alias, "__typename", &[]);
    if selections
        .iter()
        .any(|selection| selection.storage_key() == Some(key.as_str()))
    {
        return None;
    }

    let mut next = Vec::with_capacity(selections.len() + 1);
    next.push(typename_selection(parent_type, alias, location));
    next.extend(selections.iter().cloned());
    Some(next)
}

impl Transformer for GenerateTypenameTransform<'_> {
    const NAME: &'static str = "GenerateTypenameTransform";

    fn transform_linked_field(&mut self, field: &LinkedField) -> Transformed<Selection> {
        let selections = self
            .transform_selections(&field.selections)
            .replace_or_else(|| field.selections.clone());

        let type_name = field.type_name();
        let added = if self.schema.is_abstract(type_name) {
            with_typename(&selections, type_name, None, &field.location)
        } else {
            None
        };

        let selections = match added {
            Some(selections) => selections,
            None if selections == field.selections => return Transformed::Keep,
            None => selections,
        };
        Transformed::Replace(Selection::LinkedField(Arc::new(LinkedField {
            selections,
            ..field.clone()
        })))
    }

    fn transform_inline_fragment(&mut self, fragment: &InlineFragment) -> Transformed<Selection> {
        let selections = self
            .transform_selections(&fragment.selections)
            .replace_or_else(|| fragment.selections.clone());

        let added = match (&fragment.abstract_key, &fragment.type_condition) {
            (Some(abstract_key), Some(type_condition)) => with_typename(
                &selections,
                type_condition,
                Some(abstract_key.as_str()),
                &fragment.location,
            ),
            _ => None,
        };

        let selections = match added {
            Some(selections) => selections,
            None if selections == fragment.selections => return Transformed::Keep,
            None => selections,
        };
        Transformed::Replace(Selection::InlineFragment(Arc::new(InlineFragment {
            selections,
            ..fragment.clone()
        })))
    }
}
