mod apply_fragment_arguments;
mod connections;
mod flatten;
mod generate_typename;
mod inline_fragments;
mod skip_unreachable;
mod strip_directives;

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use hive_compiler_config::{pipelines::PassId, CompilerConfig};
use tracing::{instrument, trace};

use crate::diagnostics::Diagnostic;
use crate::ir::{storage_key, FragmentDefinition, Location, Program, ScalarField, Selection};
use crate::schema::{TypeReference, COMPILER_DIRECTIVES};

pub use self::apply_fragment_arguments::apply_fragment_arguments;
pub use self::connections::connections;
pub use self::flatten::{flatten, flatten_abstract_types};
pub use self::generate_typename::generate_typename;
pub use self::inline_fragments::inline_fragments;
pub use self::skip_unreachable::skip_unreachable;
pub use self::strip_directives::strip_directives;

/// Fragment name and canonical argument binding.
pub(crate) type SpecializationKey = (String, String);

/// State shared by the passes of a single pipeline run.
///
/// Create one per run: the specialization memo is only valid for the
/// program it was filled from.
#[derive(Debug)]
pub struct PassContext {
    pub max_fragment_depth: usize,
    internal_directives: HashSet<String>,
    specializations: DashMap<SpecializationKey, Arc<FragmentDefinition>>,
}

impl Default for PassContext {
    fn default() -> Self {
        Self::new(100, std::iter::empty::<String>())
    }
}

impl PassContext {
    pub fn new(
        max_fragment_depth: usize,
        extra_internal_directives: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let internal_directives = COMPILER_DIRECTIVES
            .iter()
            .map(|name| name.to_string())
            .chain(extra_internal_directives.into_iter().map(Into::into))
            .collect();

        Self {
            max_fragment_depth,
            internal_directives,
            specializations: DashMap::new(),
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(
            config.max_fragment_depth,
            config.extra_internal_directives.iter().cloned(),
        )
    }

    pub fn is_internal_directive(&self, name: &str) -> bool {
        self.internal_directives.contains(name)
    }

    pub(crate) fn specializations(&self) -> &DashMap<SpecializationKey, Arc<FragmentDefinition>> {
        &self.specializations
    }
}

/// Runs `passes` in order, stopping at the first pass that reports errors.
#[instrument(level = "trace", skip_all, fields(passes = passes.len()))]
pub fn transform(
    program: &Program,
    passes: &[PassId],
    ctx: &PassContext,
) -> Result<Program, Vec<Diagnostic>> {
    let mut current = program.clone();

    for pass in passes {
        current = run_pass(*pass, &current, ctx)?;
        trace!(
            pass = pass.as_str(),
            operations = current.operation_count(),
            fragments = current.fragment_count(),
            "pass completed"
        );
    }

    Ok(current)
}

#[instrument(level = "trace", skip_all, fields(pass = pass.as_str()))]
pub fn run_pass(
    pass: PassId,
    program: &Program,
    ctx: &PassContext,
) -> Result<Program, Vec<Diagnostic>> {
    match pass {
        PassId::ApplyFragmentArguments => apply_fragment_arguments(program, ctx),
        PassId::Connections => connections(program, ctx),
        PassId::Flatten => flatten(program, ctx),
        PassId::FlattenAbstractTypes => flatten_abstract_types(program, ctx),
        PassId::SkipUnreachable => skip_unreachable(program, ctx),
        PassId::InlineFragments => inline_fragments(program, ctx),
        PassId::GenerateTypename => generate_typename(program, ctx),
        PassId::StripDirectives => strip_directives(program, ctx),
    }
}

/// A synthesized `__typename` read, aliased when `alias` is set.
pub(crate) fn typename_selection(
    parent_type: &str,
    alias: Option<&str>,
    location: &Location,
) -> Selection {
    Selection::ScalarField(Arc::new(ScalarField {
        alias: alias.map(str::to_string),
        name: "__typename".to_string(),
        parent_type: parent_type.to_string(),
        field_type: TypeReference::named("String").non_null(),
        arguments: vec![],
        directives: vec![],
        storage_key: storage_key(alias, "__typename", &[]),
        location: location.clone(),
    }))
}
