//! Ordered multi-document merge.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::warn;

use crate::config::Config;
use crate::error::ConfigError;

/// Merge behavior knobs, typically sourced from `YAML_*` environment
/// variables.
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Concatenate `tools` arrays of same-named toolsets instead of
    /// replacing the whole toolset.
    pub merge_arrays: bool,
    /// Permit redefinition of a tool name; last definition wins with a
    /// warning.
    pub allow_duplicate_tools: bool,
    /// Permit redefinition of a source name; last definition wins with a
    /// warning.
    pub allow_duplicate_sources: bool,
    /// Run referential validation over the merged root.
    pub validate_merged: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            merge_arrays: true,
            allow_duplicate_tools: false,
            allow_duplicate_sources: false,
            validate_merged: true,
        }
    }
}

/// Merge parsed documents in declared order.
pub fn merge_documents(
    documents: Vec<(PathBuf, Config)>,
    options: &MergeOptions,
) -> Result<Config, ConfigError> {
    let mut merged = Config::default();
    let mut tool_origin: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut source_origin: BTreeMap<String, PathBuf> = BTreeMap::new();

    for (path, doc) in documents {
        for (name, source) in doc.sources {
            if let Some(first) = source_origin.get(&name) {
                if !options.allow_duplicate_sources {
                    return Err(ConfigError::DuplicateSource {
                        name,
                        first: first.clone(),
                        second: path.clone(),
                    });
                }
                warn!(source = %name, file = %path.display(), "duplicate source, last definition wins");
            }
            source_origin.insert(name.clone(), path.clone());
            merged.sources.insert(name, source);
        }

        for (name, tool) in doc.tools {
            if let Some(first) = tool_origin.get(&name) {
                if !options.allow_duplicate_tools {
                    return Err(ConfigError::DuplicateTool {
                        name,
                        first: first.clone(),
                        second: path.clone(),
                    });
                }
                warn!(tool = %name, file = %path.display(), "duplicate tool, last definition wins");
            }
            tool_origin.insert(name.clone(), path.clone());
            merged.tools.insert(name, tool);
        }

        for (name, toolset) in doc.toolsets {
            match merged.toolsets.get_mut(&name) {
                Some(existing) if options.merge_arrays => {
                    existing.tools.extend(toolset.tools);
                    if toolset.title.is_some() {
                        existing.title = toolset.title;
                    }
                    if !toolset.description.is_empty() {
                        existing.description = toolset.description;
                    }
                }
                _ => {
                    merged.toolsets.insert(name, toolset);
                }
            }
        }
    }

    Ok(merged)
}
