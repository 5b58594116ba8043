use std::sync::Arc;

use tracing::instrument;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{
    FragmentDefinition, FragmentSpread, InlineFragment, Program, Selection, Transformed,
    Transformer,
};
use crate::transforms::PassContext;

/// This pass replaces every fragment spread with an inline fragment holding
/// the fragment's selections, leaving operations self-contained.
///
/// Fragment definitions are dropped from the result. Expansion deeper than
/// the configured fragment depth is reported instead of followed.
#[instrument(level = "trace", skip_all)]
pub fn inline_fragments(
    program: &Program,
    ctx: &PassContext,
) -> Result<Program, Vec<Diagnostic>> {
    let mut transform = InlineFragmentsTransform {
        program,
        max_depth: ctx.max_fragment_depth,
        depth: 0,
        errors: vec![],
    };
    let next = transform.transform_program(program);

    if !transform.errors.is_empty() {
        return Err(transform.errors);
    }

    Ok(next.replace_or_else(|| program.clone()))
}

struct InlineFragmentsTransform<'a> {
    program: &'a Program,
    max_depth: usize,
    depth: usize,
    errors: Vec<Diagnostic>,
}

impl Transformer for InlineFragmentsTransform<'_> {
    const NAME: &'static str = "InlineFragmentsTransform";

    fn transform_fragment(
        &mut self,
        _fragment: &FragmentDefinition,
    ) -> Transformed<FragmentDefinition> {
        Transformed::Delete
    }

    fn transform_fragment_spread(&mut self, spread: &FragmentSpread) -> Transformed<Selection> {
        let program = self.program;
        let Some(fragment) = program.fragment(&spread.fragment_name) else {
            self.errors.push(Diagnostic::internal(
                format!(
                    "Spread of fragment `{}` missing from the program",
                    spread.fragment_name
                ),
                Some(spread.location.clone()),
            ));
            return Transformed::Keep;
        };

        if self.depth >= self.max_depth {
            self.errors.push(Diagnostic::error(
                DiagnosticKind::Transform,
                format!(
                    "Exceeded the maximum fragment depth of {} while inlining fragment `{}`",
                    self.max_depth, fragment.name
                ),
                spread.location.clone(),
            ));
            return Transformed::Delete;
        }

        self.depth += 1;
        let selections = self
            .transform_selections(&fragment.selections)
            .replace_or_else(|| fragment.selections.clone());
        self.depth -= 1;

        let abstract_key = program
            .schema
            .is_abstract(&fragment.type_condition)
            .then(|| format!("__is{}", fragment.type_condition));

        Transformed::Replace(Selection::InlineFragment(Arc::new(InlineFragment {
            type_condition: Some(fragment.type_condition.clone()),
            abstract_key,
            directives: spread.directives.clone(),
            selections,
            location: spread.location.clone(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use crate::printer::print_program;
    use crate::tests::testkit::{bind_program, test_schema};
    use crate::transforms::{inline_fragments, PassContext};

    #[test]
    fn spreads_become_inline_fragments() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q { me { ...UserFields } }
            fragment UserFields on User { name best_friend { ...NodeFields } }
            fragment NodeFields on Node { id }
            "#,
        );

        let result = inline_fragments(&program, &PassContext::default()).expect("to inline");
        assert_eq!(result.fragment_count(), 0);
        insta::assert_snapshot!(print_program(&result), @r"
        query Q {
          me {
            ... on User {
              name
              best_friend {
                ... on Node {
                  id
                }
              }
            }
          }
        }
        ");
    }

    #[test]
    fn cyclic_spreads_stop_at_the_depth_cap() {
        let schema = test_schema();
        let program = bind_program(
            &schema,
            r#"
            query Q { me { ...A } }
            fragment A on User { best_friend { ...B } }
            fragment B on User { best_friend { ...A } }
            "#,
        );

        let errors = inline_fragments(&program, &PassContext::new(4, Vec::<String>::new()))
            .expect_err("to fail");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Exceeded the maximum fragment depth of 4 while inlining fragment `A`"
        );
    }
}
