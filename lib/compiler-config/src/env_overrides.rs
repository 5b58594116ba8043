use config::{builder::BuilderState, ConfigBuilder, ConfigError};
use envconfig::Envconfig;
use tracing::debug;

use crate::artifacts::{ArtifactLanguage, FragmentCycleSeverity};
use crate::log::{LogFormat, LogLevel};

/// Environment variables taking precedence over the configuration file.
#[derive(Envconfig)]
pub struct EnvVarOverrides {
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "LOG_FILTER")]
    pub log_filter: Option<String>,
    #[envconfig(from = "ARTIFACT_LANGUAGE")]
    pub artifact_language: Option<ArtifactLanguage>,
    #[envconfig(from = "FRAGMENT_CYCLE_SEVERITY")]
    pub fragment_cycle_severity: Option<FragmentCycleSeverity>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvVarOverridesError {
    #[error("Failed to override `{key}`: {source}")]
    FailedToOverrideConfig {
        key: &'static str,
        #[source]
        source: ConfigError,
    },
}

impl EnvVarOverrides {
    /// Configuration keys and the values set for them.
    fn entries(self) -> Vec<(&'static str, String)> {
        let keyword = |value: &'static str| value.to_string();
        [
            ("log.level", self.log_level.map(|v| keyword(v.as_str()))),
            ("log.format", self.log_format.map(|v| keyword(v.as_str()))),
            ("log.filter", self.log_filter),
            (
                "artifactLanguage",
                self.artifact_language.map(|v| keyword(v.as_str())),
            ),
            (
                "fragmentCycleSeverity",
                self.fragment_cycle_severity.map(|v| keyword(v.as_str())),
            ),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect()
    }

    pub fn apply_overrides<T: BuilderState>(
        self,
        config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        self.entries()
            .into_iter()
            .try_fold(config, |config, (key, value)| {
                debug!(key, value = value.as_str(), "applying environment override");
                config
                    .set_override(key, value)
                    .map_err(|source| EnvVarOverridesError::FailedToOverrideConfig { key, source })
            })
    }
}
