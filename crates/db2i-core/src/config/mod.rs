//! Configuration data model.
//!
//! The YAML surface has three top-level sections, all optional per file but
//! at least one present after merging:
//!
//! ```yaml
//! sources:
//!   mysystem:
//!     host: ibmi.example.com
//!     user: SVCUSER
//!     password: "..."
//!
//! tools:
//!   system_status:
//!     source: mysystem
//!     description: One-row system sanity check
//!     statement: SELECT 1 AS X FROM SYSIBM.SYSDUMMY1
//!
//! toolsets:
//!   monitoring:
//!     title: Monitoring
//!     tools: [system_status]
//! ```
//!
//! Documents from multiple files are merged by [`crate::merge::merge_documents`]
//! and the merged root is validated for referential integrity.

pub mod parameter;
pub mod source;
pub mod tool;
pub mod toolset;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use parameter::{ParamType, ParameterSpec, ScalarType};
pub use source::SourceSpec;
pub use tool::{AnnotationSpec, ResponseFormat, SecuritySpec, TableStyle, ToolSpec};
pub use toolset::ToolsetSpec;

/// One parsed configuration document, or the merged root.
///
/// Maps are ordered by name so listings and resource enumerations are
/// deterministic across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database-gateway connection descriptors, by name.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,

    /// SQL tool definitions, by name.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolSpec>,

    /// Named tool groups, by name.
    #[serde(default)]
    pub toolsets: BTreeMap<String, ToolsetSpec>,
}

impl Config {
    /// Parse a single YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Whether the document defines nothing at all.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.tools.is_empty() && self.toolsets.is_empty()
    }

    /// Validate the merged root: per-entry invariants plus referential
    /// integrity between tools, sources and toolsets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::Empty);
        }

        for (name, source) in &self.sources {
            source.validate(name)?;
        }

        for (name, tool) in &self.tools {
            tool.validate(name)?;
            if !self.sources.contains_key(&tool.source) {
                return Err(ConfigError::UnknownSource {
                    tool: name.clone(),
                    source_name: tool.source.clone(),
                });
            }
        }

        for (name, toolset) in &self.toolsets {
            for member in &toolset.tools {
                if !self.tools.contains_key(member) {
                    return Err(ConfigError::UnknownTool {
                        toolset: name.clone(),
                        tool: member.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Names of all toolsets that contain the given tool.
    ///
    /// This is the authoritative membership used for annotations; anything a
    /// tool author wrote under `annotations.toolsets` is ignored.
    pub fn toolsets_of(&self, tool: &str) -> Vec<String> {
        self.toolsets
            .iter()
            .filter(|(_, ts)| ts.tools.iter().any(|t| t == tool))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
