//! Tool definitions and per-tool policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

use super::parameter::ParameterSpec;

/// Default destructive keyword set. Tool-level `forbiddenKeywords` entries
/// are merged on top; the defaults are never removable.
pub const DEFAULT_FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "INSERT", "UPDATE", "GRANT", "REVOKE", "ALTER", "CREATE",
    "EXEC", "CALL",
];

/// Default maximum SQL statement length accepted by the validator.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 10_000;

/// A named SQL operation exposed as an MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Disabled tools are parsed and validated but never registered.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name of the source this tool executes against.
    pub source: String,

    /// Human description, surfaced to the agent.
    #[serde(default)]
    pub description: String,

    /// SQL statement. May contain `:name` and `?` placeholders.
    pub statement: String,

    /// Ordered parameter declarations.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// Security policy overrides for this tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySpec>,

    /// How results are rendered back to the agent.
    #[serde(default)]
    pub response_format: ResponseFormat,

    /// Table border style for markdown responses.
    #[serde(default)]
    pub table_style: TableStyle,

    /// Cap on rendered rows in markdown responses.
    #[serde(default = "default_max_display_rows")]
    pub max_display_rows: usize,

    /// Domain tag carried into annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Category tag carried into annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Tool-level metadata, shallow-merged into annotation metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,

    /// Author-supplied annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<AnnotationSpec>,
}

impl ToolSpec {
    /// Validate per-tool invariants. Placeholder/parameter agreement is
    /// checked at registry build, where the SQL lexer is available.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "tool '{name}': source must be non-empty"
            )));
        }
        if self.statement.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "tool '{name}': statement must be non-empty"
            )));
        }
        if !(1..=1000).contains(&self.max_display_rows) {
            return Err(ConfigError::invalid(format!(
                "tool '{name}': maxDisplayRows must be within [1, 1000], got {}",
                self.max_display_rows
            )));
        }

        let mut seen = std::collections::BTreeSet::new();
        for param in &self.parameters {
            param.validate(name)?;
            if !seen.insert(param.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "tool '{name}': duplicate parameter '{}'",
                    param.name
                )));
            }
        }

        if let Some(security) = &self.security {
            security.validate(name)?;
        }

        Ok(())
    }

    /// Effective security policy: tool overrides on top of the defaults.
    pub fn effective_security(&self) -> SecuritySpec {
        match &self.security {
            Some(s) => s.clone(),
            None => SecuritySpec::default(),
        }
    }
}

/// Per-tool security overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySpec {
    /// Restrict statements to SELECT/WITH.
    #[serde(default = "default_true")]
    pub read_only: bool,

    /// Maximum statement length after binding.
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,

    /// Extra forbidden keywords, merged with the defaults. Additions only.
    #[serde(default)]
    pub forbidden_keywords: Vec<String>,
}

impl Default for SecuritySpec {
    fn default() -> Self {
        Self {
            read_only: true,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            forbidden_keywords: Vec::new(),
        }
    }
}

impl SecuritySpec {
    fn validate(&self, tool: &str) -> Result<(), ConfigError> {
        if self.max_query_length == 0 {
            return Err(ConfigError::invalid(format!(
                "tool '{tool}': maxQueryLength must be positive"
            )));
        }
        Ok(())
    }

    /// Full forbidden-keyword set: defaults plus additions, uppercased.
    pub fn all_forbidden_keywords(&self) -> Vec<String> {
        let mut all: Vec<String> = DEFAULT_FORBIDDEN_KEYWORDS
            .iter()
            .map(|k| k.to_string())
            .collect();
        for extra in &self.forbidden_keywords {
            let upper = extra.to_ascii_uppercase();
            if !all.contains(&upper) {
                all.push(upper);
            }
        }
        all
    }
}

/// Response rendering mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Pretty JSON in one text block.
    #[default]
    Json,
    /// Typed markdown table document.
    Markdown,
}

/// Table border style for markdown responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStyle {
    #[default]
    Markdown,
    Ascii,
    Grid,
    Compact,
}

/// Author-supplied annotations for a tool.
///
/// `toolsets` is accepted here only so that files carrying it still parse;
/// the registry discards it and computes membership from the `toolsets`
/// config section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,

    /// Ignored; membership is derived from the toolsets section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolsets: Option<Vec<String>>,

    /// Free-form metadata, shallow-merged with tool-level metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

fn default_max_display_rows() -> usize {
    100
}

fn default_max_query_length() -> usize {
    DEFAULT_MAX_QUERY_LENGTH
}
