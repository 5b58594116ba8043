use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifier of a single IR transform pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PassId {
    /// Specializes fragments per distinct `@arguments` binding.
    ApplyFragmentArguments,
    /// Expands `@connection` fields into edges/node/pageInfo selections.
    Connections,
    /// Merges duplicated selections and redundant inline fragments.
    Flatten,
    /// Like `flatten`, and also merges inline fragments on abstract types into their parent.
    FlattenAbstractTypes,
    /// Removes statically unreachable selections.
    SkipUnreachable,
    /// Replaces fragment spreads with inline fragments.
    InlineFragments,
    /// Adds `__typename` where abstract types must be discriminated at runtime.
    GenerateTypename,
    /// Removes compiler-only directives.
    StripDirectives,
}

impl PassId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassId::ApplyFragmentArguments => "apply_fragment_arguments",
            PassId::Connections => "connections",
            PassId::Flatten => "flatten",
            PassId::FlattenAbstractTypes => "flatten_abstract_types",
            PassId::SkipUnreachable => "skip_unreachable",
            PassId::InlineFragments => "inline_fragments",
            PassId::GenerateTypename => "generate_typename",
            PassId::StripDirectives => "strip_directives",
        }
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered pass lists, one per artifact flavor.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PipelinesConfig {
    /// Passes producing the selections read from the client cache.
    #[serde(default = "default_reader_pipeline")]
    pub reader: Vec<PassId>,

    /// Passes producing the selections used to parse network responses.
    #[serde(default = "default_normalization_pipeline")]
    pub normalization: Vec<PassId>,

    /// Passes producing the query text sent over the network.
    #[serde(default = "default_network_pipeline")]
    pub network: Vec<PassId>,
}

impl Default for PipelinesConfig {
    fn default() -> Self {
        Self {
            reader: default_reader_pipeline(),
            normalization: default_normalization_pipeline(),
            network: default_network_pipeline(),
        }
    }
}

fn default_reader_pipeline() -> Vec<PassId> {
    vec![
        PassId::Connections,
        PassId::SkipUnreachable,
        PassId::Flatten,
        PassId::StripDirectives,
    ]
}

fn default_normalization_pipeline() -> Vec<PassId> {
    vec![
        PassId::ApplyFragmentArguments,
        PassId::Connections,
        PassId::InlineFragments,
        PassId::SkipUnreachable,
        PassId::GenerateTypename,
        PassId::FlattenAbstractTypes,
        PassId::StripDirectives,
    ]
}

fn default_network_pipeline() -> Vec<PassId> {
    vec![
        PassId::ApplyFragmentArguments,
        PassId::Connections,
        PassId::SkipUnreachable,
        PassId::GenerateTypename,
        PassId::Flatten,
        PassId::StripDirectives,
    ]
}
