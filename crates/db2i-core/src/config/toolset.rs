//! Toolset groups.

use serde::{Deserialize, Serialize};

/// A named group of tools, used for registration filtering and resource
/// discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsetSpec {
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Human description.
    #[serde(default)]
    pub description: String,

    /// Member tool names. Every member must exist after merging.
    #[serde(default)]
    pub tools: Vec<String>,
}
