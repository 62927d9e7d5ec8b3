//! Error type for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, parsing, merging or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error while reading a configuration file.
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the originating file.
    #[error("YAML parse error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A `required` config source resolved to nothing.
    #[error("required config source '{pattern}' matched no files")]
    EmptySource { pattern: String },

    /// Invalid glob pattern in a config source.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    BadPattern { pattern: String, reason: String },

    /// A tool was defined in more than one file.
    #[error("duplicate tool '{name}' (first defined in {first}, redefined in {second})")]
    DuplicateTool {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A source was defined in more than one file.
    #[error("duplicate source '{name}' (first defined in {first}, redefined in {second})")]
    DuplicateSource {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A tool references a source that does not exist after merging.
    #[error("tool '{tool}' references unknown source '{source_name}'")]
    UnknownSource { tool: String, source_name: String },

    /// A toolset lists a tool that does not exist after merging.
    #[error("toolset '{toolset}' lists unknown tool '{tool}'")]
    UnknownTool { toolset: String, tool: String },

    /// A spec-level invariant was violated.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The merged configuration is empty.
    #[error("no sources, tools or toolsets found in any configuration file")]
    Empty,
}

impl ConfigError {
    /// Build an [`Invalid`](ConfigError::Invalid) error from anything
    /// displayable.
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}
