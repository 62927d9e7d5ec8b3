//! Tool registry: from merged config to runtime descriptors.
//!
//! Building the registry is the moment declarative tool specs become
//! callable tools: the input schema is synthesized from the parameter list,
//! the output schema is fixed, annotations are resolved (with toolset
//! membership computed from the toolsets section), and the per-tool
//! security policy is compiled. The registry itself is immutable; hot
//! reload builds a new one and swaps the `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use db2i_core::config::{
    Config, ParamType, ParameterSpec, ResponseFormat, TableStyle, ToolSpec,
};
use db2i_policy::{named_placeholders, SecurityPolicy};

use crate::error::McpError;
use crate::protocol::{ToolAnnotations, ToolDefinition};

/// Name of the built-in free-form statement tool.
pub const EXECUTE_SQL_TOOL: &str = "execute_sql";

/// How a descriptor executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Declarative tool from YAML config.
    Config,
    /// Built-in `execute_sql`: the statement is the `sql` argument.
    ExecuteSql,
}

/// Runtime descriptor for one registered tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub kind: ToolKind,
    pub source: String,
    pub statement: String,
    pub parameters: Vec<ParameterSpec>,
    pub input_schema: Value,
    pub output_schema: Value,
    pub annotations: ToolAnnotations,
    pub security: SecurityPolicy,
    pub response_format: ResponseFormat,
    pub table_style: TableStyle,
    pub max_display_rows: usize,
}

impl ToolDescriptor {
    /// Wire shape for `tools/list`.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema.clone(),
            output_schema: Some(self.output_schema.clone()),
            annotations: Some(self.annotations.clone()),
        }
    }
}

/// Immutable name → descriptor map.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<ToolDescriptor>>,
}

impl ToolRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<ToolDescriptor>> {
        self.tools.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &Arc<ToolDescriptor>> {
        self.tools.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Knobs for registry construction.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// When non-empty, only tools whose toolsets intersect this list are
    /// registered.
    pub selected_toolsets: Vec<String>,
    /// Register the built-in `execute_sql` tool against this source.
    pub execute_sql_source: Option<String>,
}

/// Build a registry from a validated config.
pub fn build_registry(
    config: &Config,
    options: &RegistryOptions,
) -> Result<ToolRegistry, McpError> {
    let mut tools = BTreeMap::new();

    for (name, spec) in &config.tools {
        if !spec.enabled {
            continue;
        }

        let toolsets = config.toolsets_of(name);
        if !options.selected_toolsets.is_empty()
            && !toolsets
                .iter()
                .any(|ts| options.selected_toolsets.contains(ts))
        {
            continue;
        }

        let descriptor = build_descriptor(name, spec, toolsets)?;
        tools.insert(name.clone(), Arc::new(descriptor));
    }

    if let Some(source) = &options.execute_sql_source {
        if !config.sources.contains_key(source) {
            return Err(McpError::Configuration(format!(
                "execute_sql source '{source}' is not defined"
            )));
        }
        let descriptor = execute_sql_descriptor(source);
        tools.insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    Ok(ToolRegistry { tools })
}

fn build_descriptor(
    name: &str,
    spec: &ToolSpec,
    toolsets: Vec<String>,
) -> Result<ToolDescriptor, McpError> {
    // Placeholder/parameter agreement is a post-merge invariant; the SQL
    // lexer lives in the policy crate, so it is enforced here.
    let referenced = named_placeholders(&spec.statement);
    for placeholder in &referenced {
        if !spec.parameters.iter().any(|p| p.name == *placeholder) {
            return Err(McpError::Configuration(format!(
                "tool '{name}': statement references undeclared parameter ':{placeholder}'"
            )));
        }
    }

    let security = SecurityPolicy::from_spec(&spec.effective_security());
    let annotations = resolve_annotations(name, spec, toolsets, &security);

    Ok(ToolDescriptor {
        name: name.to_string(),
        description: spec.description.clone(),
        kind: ToolKind::Config,
        source: spec.source.clone(),
        statement: spec.statement.clone(),
        parameters: spec.parameters.clone(),
        input_schema: input_schema(&spec.parameters),
        output_schema: output_schema(),
        annotations,
        security,
        response_format: spec.response_format,
        table_style: spec.table_style,
        max_display_rows: spec.max_display_rows,
    })
}

fn execute_sql_descriptor(source: &str) -> ToolDescriptor {
    let mut sql_param = ParameterSpec::new("sql", ParamType::String);
    sql_param.description = Some("SQL statement to execute (SELECT/WITH only)".into());

    let security = SecurityPolicy::default();
    ToolDescriptor {
        name: EXECUTE_SQL_TOOL.to_string(),
        description: "Execute a read-only SQL statement against the configured system".into(),
        kind: ToolKind::ExecuteSql,
        source: source.to_string(),
        statement: String::new(),
        parameters: vec![sql_param.clone()],
        input_schema: input_schema(std::slice::from_ref(&sql_param)),
        output_schema: output_schema(),
        annotations: ToolAnnotations {
            title: Some("Execute SQL".into()),
            read_only_hint: Some(true),
            ..Default::default()
        },
        security,
        response_format: ResponseFormat::Json,
        table_style: TableStyle::Markdown,
        max_display_rows: 100,
    }
}

/// Resolve the published annotations for a tool.
fn resolve_annotations(
    name: &str,
    spec: &ToolSpec,
    toolsets: Vec<String>,
    security: &SecurityPolicy,
) -> ToolAnnotations {
    let user = spec.annotations.clone().unwrap_or_default();
    // `user.toolsets` is intentionally dropped: membership comes from the
    // toolsets section alone.

    let mut metadata = Map::new();
    for (k, v) in &user.metadata {
        metadata.insert(k.clone(), v.clone());
    }
    for (k, v) in &spec.metadata {
        metadata.insert(k.clone(), v.clone());
    }

    ToolAnnotations {
        title: user.title.clone().or_else(|| Some(title_case(name))),
        read_only_hint: user.read_only_hint.or(Some(security.read_only)),
        destructive_hint: user.destructive_hint,
        idempotent_hint: user.idempotent_hint,
        open_world_hint: user.open_world_hint,
        domain: spec.domain.clone(),
        category: spec.category.clone(),
        toolsets,
        custom_metadata: if metadata.is_empty() {
            Value::Null
        } else {
            Value::Object(metadata)
        },
    }
}

/// Synthesize the JSON input schema from the parameter list.
fn input_schema(parameters: &[ParameterSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for spec in parameters {
        let mut field = Map::new();
        field.insert("type".into(), json!(spec.param_type.json_type()));

        let mut description = spec.description.clone().unwrap_or_default();
        if let Some(allowed) = &spec.allowed_values {
            let list = allowed
                .iter()
                .map(value_label)
                .collect::<Vec<_>>()
                .join(", ");
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(&format!("Must be one of: {list}"));
        }
        if !description.is_empty() {
            field.insert("description".into(), json!(description));
        }

        if let Some(default) = &spec.default {
            field.insert("default".into(), default.clone());
        }
        if let Some(min) = spec.min {
            field.insert("minimum".into(), json!(min));
        }
        if let Some(max) = spec.max {
            field.insert("maximum".into(), json!(max));
        }
        if let Some(pattern) = &spec.pattern {
            field.insert("pattern".into(), json!(pattern));
        }
        if let Some(allowed) = &spec.allowed_values {
            field.insert("enum".into(), json!(allowed));
        }

        match spec.param_type {
            ParamType::Array => {
                let item_type = spec
                    .item_type
                    .expect("config validation guarantees itemType on arrays");
                field.insert("items".into(), json!({ "type": item_type.json_type() }));
                if let Some(min) = spec.min_length {
                    field.insert("minItems".into(), json!(min));
                }
                if let Some(max) = spec.max_length {
                    field.insert("maxItems".into(), json!(max));
                }
            }
            ParamType::String => {
                if let Some(min) = spec.min_length {
                    field.insert("minLength".into(), json!(min));
                }
                if let Some(max) = spec.max_length {
                    field.insert("maxLength".into(), json!(max));
                }
            }
            _ => {}
        }

        properties.insert(spec.name.clone(), Value::Object(field));

        // A default satisfies requiredness, so only defaultless required
        // parameters are listed.
        if spec.is_required() && spec.default.is_none() {
            required.push(json!(spec.name));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// The fixed output schema shared by every tool.
fn output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "success": { "type": "boolean" },
            "data": {
                "type": "array",
                "items": { "type": "object" }
            },
            "metadata": {
                "type": "object",
                "properties": {
                    "executionTimeMs": { "type": "number" },
                    "rowCount": { "type": "integer" },
                    "affectedRows": { "type": "integer" },
                    "columns": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "type": { "type": "string" }
                            }
                        }
                    },
                    "parameterMode": { "type": "string" },
                    "parameterCount": { "type": "integer" },
                    "processedParameters": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "toolName": { "type": "string" },
                    "sqlStatement": { "type": "string" },
                    "parameters": { "type": "object" }
                }
            },
            "error": { "type": "string" },
            "errorCode": { "type": "string" }
        },
        "required": ["success"]
    })
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `system_status` → `System Status`.
fn title_case(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config::from_yaml(
            r#"
sources:
  ibmi: { host: h, user: u, password: p }

tools:
  system_status:
    source: ibmi
    description: Sanity check
    statement: SELECT 1 AS X FROM SYSIBM.SYSDUMMY1
    annotations:
      toolsets: [bogus-claim]
  object_usage:
    source: ibmi
    description: Unused objects
    statement: >-
      SELECT * FROM T WHERE OBJTYPE = :sql_object_type
      AND LIB IN (:library_list) AND MONTHS > :months_unused
    parameters:
      - name: sql_object_type
        type: string
        enum: [INDEX, TABLE]
      - name: months_unused
        type: integer
        min: 1
        max: 120
        default: 1
      - name: library_list
        type: array
        itemType: string
        maxLength: 50
  disabled_tool:
    enabled: false
    source: ibmi
    statement: SELECT 2 FROM SYSIBM.SYSDUMMY1

toolsets:
  monitoring:
    title: Monitoring
    tools: [system_status]
  performance:
    tools: [system_status, object_usage]
"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_enabled_tools_only() {
        let registry = build_registry(&sample_config(), &RegistryOptions::default()).unwrap();
        assert_eq!(registry.names(), vec!["object_usage", "system_status"]);
    }

    #[test]
    fn toolset_membership_is_authoritative() {
        let registry = build_registry(&sample_config(), &RegistryOptions::default()).unwrap();
        let tool = registry.get("system_status").unwrap();
        // The bogus author claim is discarded; computed membership stands.
        assert_eq!(tool.annotations.toolsets, vec!["monitoring", "performance"]);
    }

    #[test]
    fn toolset_filter_restricts_registration() {
        let options = RegistryOptions {
            selected_toolsets: vec!["monitoring".into()],
            ..Default::default()
        };
        let registry = build_registry(&sample_config(), &options).unwrap();
        assert!(registry.get("system_status").is_some());
        assert!(registry.get("object_usage").is_none());
    }

    #[test]
    fn title_falls_back_to_title_case() {
        let registry = build_registry(&sample_config(), &RegistryOptions::default()).unwrap();
        let tool = registry.get("system_status").unwrap();
        assert_eq!(tool.annotations.title.as_deref(), Some("System Status"));
        assert_eq!(tool.annotations.read_only_hint, Some(true));
    }

    #[test]
    fn input_schema_carries_constraints() {
        let registry = build_registry(&sample_config(), &RegistryOptions::default()).unwrap();
        let schema = &registry.get("object_usage").unwrap().input_schema;

        let object_type = &schema["properties"]["sql_object_type"];
        assert_eq!(object_type["type"], "string");
        assert!(object_type["description"]
            .as_str()
            .unwrap()
            .contains("Must be one of: INDEX, TABLE"));

        let months = &schema["properties"]["months_unused"];
        assert_eq!(months["minimum"], 1.0);
        assert_eq!(months["default"], 1);

        let libs = &schema["properties"]["library_list"];
        assert_eq!(libs["items"]["type"], "string");
        assert_eq!(libs["maxItems"], 50);

        // months_unused has a default, so only the defaultless parameters
        // are required.
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "sql_object_type"));
        assert!(!required.iter().any(|v| v == "months_unused"));
    }

    #[test]
    fn undeclared_placeholder_is_a_config_error() {
        let config = Config::from_yaml(
            r#"
sources:
  ibmi: { host: h, user: u, password: p }
tools:
  broken:
    source: ibmi
    statement: SELECT * FROM T WHERE X = :ghost
"#,
        )
        .unwrap();
        let err = build_registry(&config, &RegistryOptions::default()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn execute_sql_registration() {
        let options = RegistryOptions {
            execute_sql_source: Some("ibmi".into()),
            ..Default::default()
        };
        let registry = build_registry(&sample_config(), &options).unwrap();
        let tool = registry.get(EXECUTE_SQL_TOOL).unwrap();
        assert_eq!(tool.kind, ToolKind::ExecuteSql);
        assert!(tool.security.read_only);

        let bad = RegistryOptions {
            execute_sql_source: Some("missing".into()),
            ..Default::default()
        };
        assert!(build_registry(&sample_config(), &bad).is_err());
    }

    #[test]
    fn title_case_conversion() {
        assert_eq!(title_case("system_status"), "System Status");
        assert_eq!(title_case("active-job-info"), "Active Job Info");
        assert_eq!(title_case("simple"), "Simple");
    }
}
