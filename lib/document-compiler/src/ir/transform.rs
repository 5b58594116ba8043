use std::sync::Arc;

use crate::ir::{
    Condition, FragmentDefinition, FragmentSpread, InlineFragment, LinkedField,
    OperationDefinition, Program, ScalarField, Selection,
};

/// Outcome of rewriting a node that may also be removed.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed<T> {
    Keep,
    Delete,
    Replace(T),
}

/// Outcome of rewriting a node that is never removed.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformedValue<T> {
    Keep,
    Replace(T),
}

impl<T> TransformedValue<T> {
    pub fn replace_or_else(self, keep: impl FnOnce() -> T) -> T {
        match self {
            TransformedValue::Keep => keep(),
            TransformedValue::Replace(value) => value,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, TransformedValue::Keep)
    }
}

/// A rewrite over the IR.
///
/// Every `transform_*` method defaults to a traversal that keeps the node
/// unless one of its children changed. Passes override the hooks they care
/// about and call the matching `default_transform_*` to recurse.
pub trait Transformer {
    const NAME: &'static str;

    fn transform_program(&mut self, program: &Program) -> TransformedValue<Program> {
        self.default_transform_program(program)
    }

    fn default_transform_program(&mut self, program: &Program) -> TransformedValue<Program> {
        let mut next = program.empty_like();
        let mut changed = false;

        for operation in program.operations() {
            match self.transform_operation(operation) {
                Transformed::Keep => next.insert_operation(operation.clone()),
                Transformed::Delete => changed = true,
                Transformed::Replace(replacement) => {
                    changed = true;
                    next.insert_operation(Arc::new(replacement));
                }
            }
        }

        for fragment in program.fragments() {
            match self.transform_fragment(fragment) {
                Transformed::Keep => next.insert_fragment(fragment.clone()),
                Transformed::Delete => changed = true,
                Transformed::Replace(replacement) => {
                    changed = true;
                    next.insert_fragment(Arc::new(replacement));
                }
            }
        }

        if changed {
            TransformedValue::Replace(next)
        } else {
            TransformedValue::Keep
        }
    }

    fn transform_operation(
        &mut self,
        operation: &OperationDefinition,
    ) -> Transformed<OperationDefinition> {
        self.default_transform_operation(operation)
    }

    fn default_transform_operation(
        &mut self,
        operation: &OperationDefinition,
    ) -> Transformed<OperationDefinition> {
        match self.transform_selections(&operation.selections) {
            TransformedValue::Keep => Transformed::Keep,
            TransformedValue::Replace(selections) => Transformed::Replace(OperationDefinition {
                selections,
                ..operation.clone()
            }),
        }
    }

    fn transform_fragment(
        &mut self,
        fragment: &FragmentDefinition,
    ) -> Transformed<FragmentDefinition> {
        self.default_transform_fragment(fragment)
    }

    fn default_transform_fragment(
        &mut self,
        fragment: &FragmentDefinition,
    ) -> Transformed<FragmentDefinition> {
        match self.transform_selections(&fragment.selections) {
            TransformedValue::Keep => Transformed::Keep,
            TransformedValue::Replace(selections) => Transformed::Replace(FragmentDefinition {
                selections,
                ..fragment.clone()
            }),
        }
    }

    fn transform_selections(&mut self, selections: &[Selection]) -> TransformedValue<Vec<Selection>> {
        transform_list(selections, |selection| self.transform_selection(selection))
    }

    fn transform_selection(&mut self, selection: &Selection) -> Transformed<Selection> {
        match selection {
            Selection::ScalarField(field) => self.transform_scalar_field(field),
            Selection::LinkedField(field) => self.transform_linked_field(field),
            Selection::InlineFragment(fragment) => self.transform_inline_fragment(fragment),
            Selection::FragmentSpread(spread) => self.transform_fragment_spread(spread),
            Selection::Condition(condition) => self.transform_condition(condition),
        }
    }

    fn transform_scalar_field(&mut self, _field: &ScalarField) -> Transformed<Selection> {
        Transformed::Keep
    }

    fn transform_linked_field(&mut self, field: &LinkedField) -> Transformed<Selection> {
        self.default_transform_linked_field(field)
    }

    fn default_transform_linked_field(&mut self, field: &LinkedField) -> Transformed<Selection> {
        match self.transform_selections(&field.selections) {
            TransformedValue::Keep => Transformed::Keep,
            TransformedValue::Replace(selections) => {
                Transformed::Replace(Selection::LinkedField(Arc::new(LinkedField {
                    selections,
                    ..field.clone()
                })))
            }
        }
    }

    fn transform_inline_fragment(&mut self, fragment: &InlineFragment) -> Transformed<Selection> {
        self.default_transform_inline_fragment(fragment)
    }

    fn default_transform_inline_fragment(
        &mut self,
        fragment: &InlineFragment,
    ) -> Transformed<Selection> {
        match self.transform_selections(&fragment.selections) {
            TransformedValue::Keep => Transformed::Keep,
            TransformedValue::Replace(selections) => {
                Transformed::Replace(Selection::InlineFragment(Arc::new(InlineFragment {
                    selections,
                    ..fragment.clone()
                })))
            }
        }
    }

    fn transform_fragment_spread(&mut self, _spread: &FragmentSpread) -> Transformed<Selection> {
        Transformed::Keep
    }

    fn transform_condition(&mut self, condition: &Condition) -> Transformed<Selection> {
        self.default_transform_condition(condition)
    }

    fn default_transform_condition(&mut self, condition: &Condition) -> Transformed<Selection> {
        match self.transform_selections(&condition.selections) {
            TransformedValue::Keep => Transformed::Keep,
            TransformedValue::Replace(selections) => {
                Transformed::Replace(Selection::Condition(Arc::new(Condition {
                    selections,
                    ..condition.clone()
                })))
            }
        }
    }
}

/// Applies `f` to each item; the result shares nothing new unless some item changed.
pub fn transform_list<T: Clone>(
    list: &[T],
    mut f: impl FnMut(&T) -> Transformed<T>,
) -> TransformedValue<Vec<T>> {
    let mut result: Option<Vec<T>> = None;

    for (index, item) in list.iter().enumerate() {
        match f(item) {
            Transformed::Keep => {
                if let Some(next) = result.as_mut() {
                    next.push(item.clone());
                }
            }
            Transformed::Delete => {
                if result.is_none() {
                    result = Some(list[..index].to_vec());
                }
            }
            Transformed::Replace(replacement) => result
                .get_or_insert_with(|| list[..index].to_vec())
                .push(replacement),
        }
    }

    match result {
        Some(next) => TransformedValue::Replace(next),
        None => TransformedValue::Keep,
    }
}
