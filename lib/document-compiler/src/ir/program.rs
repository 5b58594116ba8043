use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ir::{FragmentDefinition, FragmentSpread, OperationDefinition, Selection};
use crate::schema::SchemaModel;

/// Every bound definition of a batch, plus the schema they were bound against.
#[derive(Debug, Clone)]
pub struct Program {
    pub schema: Arc<SchemaModel>,
    operations: IndexMap<String, Arc<OperationDefinition>>,
    fragments: IndexMap<String, Arc<FragmentDefinition>>,
}

impl Program {
    pub fn new(schema: Arc<SchemaModel>) -> Self {
        Self {
            schema,
            operations: IndexMap::new(),
            fragments: IndexMap::new(),
        }
    }

    pub fn operation(&self, name: &str) -> Option<&Arc<OperationDefinition>> {
        self.operations.get(name)
    }

    pub fn fragment(&self, name: &str) -> Option<&Arc<FragmentDefinition>> {
        self.fragments.get(name)
    }

    pub fn operations(&self) -> impl Iterator<Item = &Arc<OperationDefinition>> {
        self.operations.values()
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Arc<FragmentDefinition>> {
        self.fragments.values()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn insert_operation(&mut self, operation: Arc<OperationDefinition>) {
        self.operations.insert(operation.name.clone(), operation);
    }

    pub fn insert_fragment(&mut self, fragment: Arc<FragmentDefinition>) {
        self.fragments.insert(fragment.name.clone(), fragment);
    }

    pub fn remove_operation(&mut self, name: &str) -> Option<Arc<OperationDefinition>> {
        self.operations.shift_remove(name)
    }

    pub fn remove_fragment(&mut self, name: &str) -> Option<Arc<FragmentDefinition>> {
        self.fragments.shift_remove(name)
    }

    /// Same schema, no definitions.
    pub fn empty_like(&self) -> Self {
        Self::new(self.schema.clone())
    }

    /// Names of all fragments reachable from `selections`, sorted.
    ///
    /// Spreads of fragments missing from the program are reported too.
    pub fn referenced_fragments(&self, selections: &[Selection]) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<String> = vec![];

        for_each_spread(selections, &mut |spread| stack.push(spread.fragment_name.clone()));

        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(fragment) = self.fragments.get(&name) {
                for_each_spread(&fragment.selections, &mut |spread| {
                    if !seen.contains(&spread.fragment_name) {
                        stack.push(spread.fragment_name.clone());
                    }
                });
            }
        }

        seen
    }
}

/// Calls `visit` for every spread in `selections`, at any depth.
pub fn for_each_spread(selections: &[Selection], visit: &mut impl FnMut(&FragmentSpread)) {
    for selection in selections {
        match selection {
            Selection::FragmentSpread(spread) => visit(spread),
            Selection::ScalarField(_) => {}
            Selection::LinkedField(field) => for_each_spread(&field.selections, visit),
            Selection::InlineFragment(fragment) => for_each_spread(&fragment.selections, visit),
            Selection::Condition(condition) => for_each_spread(&condition.selections, visit),
        }
    }
}
