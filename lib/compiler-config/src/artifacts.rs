use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Language of the type declarations emitted next to each artifact.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactLanguage {
    /// Flow type declarations.
    Flow,
    /// TypeScript type declarations.
    #[default]
    Typescript,
    /// No type declarations.
    Plain,
}

keyword_enum!(ArtifactLanguage, "artifact language", {
    Flow => "flow",
    Typescript => "typescript",
    Plain => "plain",
});

/// How a circular fragment reference is reported.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FragmentCycleSeverity {
    /// The documents defining the fragments fail.
    #[default]
    Error,
    /// Reported as a warning; expansion stops at `maxFragmentDepth`.
    Warning,
}

keyword_enum!(FragmentCycleSeverity, "fragment cycle severity", {
    Error => "error",
    Warning => "warning",
});
