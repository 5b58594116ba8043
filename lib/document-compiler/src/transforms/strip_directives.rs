use std::sync::Arc;

use tracing::instrument;

use crate::diagnostics::Diagnostic;
use crate::ir::{
    Directive, FragmentDefinition, FragmentSpread, InlineFragment, LinkedField,
    OperationDefinition, Program, ScalarField, Selection, Transformed, Transformer,
};
use crate::transforms::PassContext;

/// This pass removes the directives only the compiler understands, so they
/// never reach printed documents.
#[instrument(level = "trace", skip_all)]
pub fn strip_directives(
    program: &Program,
    ctx: &PassContext,
) -> Result<Program, Vec<Diagnostic>> {
    let mut transform = StripDirectivesTransform { ctx };
    Ok(transform
        .transform_program(program)
        .replace_or_else(|| program.clone()))
}

struct StripDirectivesTransform<'a> {
    ctx: &'a PassContext,
}

impl StripDirectivesTransform<'_> {
    fn strip(&self, directives: &[Directive]) -> Option<Vec<Directive>> {
        if !directives
            .iter()
            .any(|directive| self.ctx.is_internal_directive(&directive.name))
        {
            return None;
        }
        Some(
            directives
                .iter()
                .filter(|directive| !self.ctx.is_internal_directive(&directive.name))
                .cloned()
                .collect(),
        )
    }
}

impl Transformer for StripDirectivesTransform<'_> {
    const NAME: &'static str = "StripDirectivesTransform";

    fn transform_operation(
        &mut self,
        operation: &OperationDefinition,
    ) -> Transformed<OperationDefinition> {
        let selections = self.transform_selections(&operation.selections);
        let directives = self.strip(&operation.directives);
        if selections.is_keep() && directives.is_none() {
            return Transformed::Keep;
        }
        Transformed::Replace(OperationDefinition {
            selections: selections.replace_or_else(|| operation.selections.clone()),
            directives: directives.unwrap_or_else(|| operation.directives.clone()),
            ..operation.clone()
        })
    }

    fn transform_fragment(
        &mut self,
        fragment: &FragmentDefinition,
    ) -> Transformed<FragmentDefinition> {
        let selections = self.transform_selections(&fragment.selections);
        let directives = self.strip(&fragment.directives);
        if selections.is_keep() && directives.is_none() {
            return Transformed::Keep;
        }
        Transformed::Replace(FragmentDefinition {
            selections: selections.replace_or_else(|| fragment.selections.clone()),
            directives: directives.unwrap_or_else(|| fragment.directives.clone()),
            ..fragment.clone()
        })
    }

    fn transform_scalar_field(&mut self, field: &ScalarField) -> Transformed<Selection> {
        match self.strip(&field.directives) {
            None => Transformed::Keep,
            Some(directives) => Transformed::Replace(Selection::ScalarField(Arc::new(
                ScalarField {
                    directives,
                    ..field.clone()
                },
            ))),
        }
    }

    fn transform_linked_field(&mut self, field: &LinkedField) -> Transformed<Selection> {
        let selections = self.transform_selections(&field.selections);
        let directives = self.strip(&field.directives);
        if selections.is_keep() && directives.is_none() {
            return Transformed::Keep;
        }
        Transformed::Replace(Selection::LinkedField(Arc::new(LinkedField {
            selections: selections.replace_or_else(|| field.selections.clone()),
            directives: directives.unwrap_or_else(|| field.directives.clone()),
            ..field.clone()
        })))
    }

    fn transform_inline_fragment(&mut self, fragment: &InlineFragment) -> Transformed<Selection> {
        let selections = self.transform_selections(&fragment.selections);
        let directives = self.strip(&fragment.directives);
        if selections.is_keep() && directives.is_none() {
            return Transformed::Keep;
        }
        Transformed::Replace(Selection::InlineFragment(Arc::new(InlineFragment {
            selections: selections.replace_or_else(|| fragment.selections.clone()),
            directives: directives.unwrap_or_else(|| fragment.directives.clone()),
            ..fragment.clone()
        })))
    }

    fn transform_fragment_spread(&mut self, spread: &FragmentSpread) -> Transformed<Selection> {
        match self.strip(&spread.directives) {
            None => Transformed::Keep,
            Some(directives) => Transformed::Replace(Selection::FragmentSpread(Arc::new(
                FragmentSpread {
                    directives,
                    ..spread.clone()
                },
            ))),
        }
    }
}
