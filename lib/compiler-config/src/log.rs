//! Logging of the compiler binaries. The libraries only emit `tracing`
//! events; installing a subscriber is left to the binary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level of emitted events. Overridden by `LOG_LEVEL`.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format. Overridden by `LOG_FORMAT`.
    #[serde(default)]
    pub format: LogFormat,

    /// An `EnvFilter` directive, e.g. `hive_document_compiler::transforms=trace`.
    /// Takes precedence over `level`. Overridden by `LOG_FILTER`.
    #[serde(default)]
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Directive to build the subscriber filter from.
    pub fn env_filter_str(&self) -> &str {
        match &self.filter {
            Some(filter) if !filter.trim().is_empty() => filter,
            _ => self.level.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

keyword_enum!(LogLevel, "log level", {
    Trace => "trace",
    Debug => "debug",
    Info => "info",
    Warn => "warn",
    Error => "error",
});

#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Indented span tree, for reading a single batch.
    #[default]
    PrettyTree,
    /// One line per event.
    PrettyCompact,
    /// Newline-delimited JSON.
    Json,
}

keyword_enum!(LogFormat, "log format", {
    PrettyTree => "pretty-tree",
    PrettyCompact => "pretty-compact",
    Json => "json",
});
