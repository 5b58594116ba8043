/// Adds `as_str`, `Display` and case-insensitive `FromStr` to a fieldless
/// enum whose serialized names are listed in the invocation.
macro_rules! keyword_enum {
    ($name:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lowered = s.to_ascii_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == lowered)
                    .ok_or_else(|| {
                        let expected: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        format!(
                            "Invalid {} `{}`, expected one of: {}",
                            $what,
                            s,
                            expected.join(", ")
                        )
                    })
            }
        }
    };
}

pub mod artifacts;
mod env_overrides;
pub mod log;
pub mod pipelines;

use std::path::PathBuf;
use std::{collections::BTreeMap, convert::Infallible};

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    artifacts::{ArtifactLanguage, FragmentCycleSeverity},
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    log::LoggingConfig,
    pipelines::PipelinesConfig,
};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CompilerConfig {
    #[serde(skip)]
    root_directory: PathBuf,

    /// The compiler logger configuration.
    #[serde(default)]
    pub log: LoggingConfig,

    /// The language of the type declarations emitted next to each artifact.
    ///
    /// Can also be set via the `ARTIFACT_LANGUAGE` environment variable.
    #[serde(default)]
    pub artifact_language: ArtifactLanguage,

    /// Adds a `validation` section listing the non-null response paths of every operation.
    #[serde(default)]
    pub generate_extra_validation: bool,

    /// Maps custom scalar names to the type used for them in generated type declarations.
    /// Unmapped custom scalars are typed as `unknown` (TypeScript) or `mixed` (Flow).
    #[serde(default)]
    pub custom_scalar_map: BTreeMap<String, String>,

    /// Drops the `"%future added value"` member from generated enum types.
    #[serde(default)]
    pub no_future_proof_enums: bool,

    /// Severity of a circular fragment reference.
    /// With `warning`, fragment expansion is capped at `maxFragmentDepth` instead.
    #[serde(default)]
    pub fragment_cycle_severity: FragmentCycleSeverity,

    /// The maximum number of errors reported for a single document before binding stops.
    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: usize,

    /// The maximum nesting of fragment expansion performed by transform passes.
    #[serde(default = "default_max_fragment_depth")]
    pub max_fragment_depth: usize,

    /// Additional directives removed from the IR before printing.
    #[serde(default)]
    pub extra_internal_directives: Vec<String>,

    /// The ordered transform passes of each pipeline.
    #[serde(default)]
    pub pipelines: PipelinesConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            root_directory: PathBuf::new(),
            log: LoggingConfig::default(),
            artifact_language: ArtifactLanguage::default(),
            generate_extra_validation: false,
            custom_scalar_map: BTreeMap::new(),
            no_future_proof_enums: false,
            fragment_cycle_severity: FragmentCycleSeverity::default(),
            max_diagnostics: default_max_diagnostics(),
            max_fragment_depth: default_max_fragment_depth(),
            extra_internal_directives: vec![],
            pipelines: PipelinesConfig::default(),
        }
    }
}

impl CompilerConfig {
    /// Directory of the loaded configuration file (or the working directory).
    pub fn root_directory(&self) -> &PathBuf {
        &self.root_directory
    }
}

fn default_max_diagnostics() -> usize {
    100
}

fn default_max_fragment_depth() -> usize {
    100
}

#[derive(Debug, thiserror::Error)]
pub enum CompilerConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to get the current directory: {0}")]
    CurrentDirError(std::io::Error),
    #[error("Failed to parse the configuration file path: {0}")]
    ConfigPathParseError(Infallible),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "compiler.config.yaml",
    "compiler.config.yml",
    "compiler.config.json",
    "compiler.config.json5",
];

fn get_current_dir() -> Result<PathBuf, CompilerConfigError> {
    std::env::current_dir().map_err(CompilerConfigError::CurrentDirError)
}

/// Loads the configuration from `override_config_path`, or from the first
/// `compiler.config.*` file found in the working directory, and applies the
/// environment overrides on top.
pub fn load_config(
    override_config_path: Option<String>,
) -> Result<CompilerConfig, CompilerConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();
    let mut config_root_path = get_current_dir()?;

    if let Some(path_str) = override_config_path {
        let path_buf = path_str
            .parse::<PathBuf>()
            .map_err(CompilerConfigError::ConfigPathParseError)?;
        if let Some(parent_dir) = path_buf.parent() {
            config_root_path = config_root_path.join(parent_dir);
        }
        let as_file: File<FileSourceFile, _> = path_buf.into();
        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    let mut base_cfg = config.build()?.try_deserialize::<CompilerConfig>()?;
    base_cfg.root_directory = config_root_path;

    Ok(base_cfg)
}

pub fn parse_yaml_config(config_raw: &str) -> Result<CompilerConfig, CompilerConfigError> {
    let mut base_cfg = Config::builder()
        .add_source(File::from_str(config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<CompilerConfig>()?;
    base_cfg.root_directory = get_current_dir()?;

    Ok(base_cfg)
}
