//! Toolsets and tools published as MCP resources.
//!
//! Stable URI scheme: `toolset://` is the index, `toolset://{name}` one
//! group, `tool://{name}` one tool. All contents are JSON text.

use serde_json::json;

use db2i_core::config::Config;

use crate::error::McpError;
use crate::protocol::{ResourceContent, ResourceDefinition};
use crate::registry::ToolRegistry;

pub const TOOLSET_URI_PREFIX: &str = "toolset://";
pub const TOOL_URI_PREFIX: &str = "tool://";

const MIME_JSON: &str = "application/json";

/// Enumerate all published resources.
pub fn list_resources(config: &Config, registry: &ToolRegistry) -> Vec<ResourceDefinition> {
    let mut resources = vec![ResourceDefinition {
        uri: TOOLSET_URI_PREFIX.to_string(),
        name: "toolsets".to_string(),
        description: Some("Index of all toolsets with their member tools".to_string()),
        mime_type: Some(MIME_JSON.to_string()),
    }];

    for (name, toolset) in &config.toolsets {
        resources.push(ResourceDefinition {
            uri: format!("{TOOLSET_URI_PREFIX}{name}"),
            name: name.clone(),
            description: Some(if toolset.description.is_empty() {
                format!("Toolset '{name}'")
            } else {
                toolset.description.clone()
            }),
            mime_type: Some(MIME_JSON.to_string()),
        });
    }

    for descriptor in registry.list() {
        resources.push(ResourceDefinition {
            uri: format!("{TOOL_URI_PREFIX}{}", descriptor.name),
            name: descriptor.name.clone(),
            description: Some(descriptor.description.clone()),
            mime_type: Some(MIME_JSON.to_string()),
        });
    }

    resources
}

/// Read one resource by URI.
pub fn read_resource(
    uri: &str,
    config: &Config,
    registry: &ToolRegistry,
) -> Result<ResourceContent, McpError> {
    if uri == TOOLSET_URI_PREFIX {
        let index: Vec<_> = config
            .toolsets
            .iter()
            .map(|(name, ts)| toolset_json(name, ts))
            .collect();
        return Ok(content(uri, json!(index).to_string()));
    }

    if let Some(name) = uri.strip_prefix(TOOLSET_URI_PREFIX) {
        let toolset = config
            .toolsets
            .get(name)
            .ok_or_else(|| McpError::NotFound(format!("resource '{uri}'")))?;
        return Ok(content(uri, toolset_json(name, toolset).to_string()));
    }

    if let Some(name) = uri.strip_prefix(TOOL_URI_PREFIX) {
        let descriptor = registry
            .get(name)
            .ok_or_else(|| McpError::NotFound(format!("resource '{uri}'")))?;
        let body = json!({
            "name": descriptor.name,
            "description": descriptor.description,
            "source": descriptor.source,
            "statement": descriptor.statement,
            "inputSchema": descriptor.input_schema,
            "annotations": descriptor.annotations,
        });
        return Ok(content(uri, body.to_string()));
    }

    Err(McpError::NotFound(format!("resource '{uri}'")))
}

fn toolset_json(name: &str, toolset: &db2i_core::config::ToolsetSpec) -> serde_json::Value {
    json!({
        "name": name,
        "title": toolset.title,
        "description": toolset.description,
        "tools": toolset.tools,
    })
}

fn content(uri: &str, text: String) -> ResourceContent {
    ResourceContent {
        uri: uri.to_string(),
        mime_type: MIME_JSON.to_string(),
        text,
    }
}
