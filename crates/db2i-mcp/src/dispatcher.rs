//! The `tools/call` pipeline.
//!
//! The dispatcher is the single place where typed errors become MCP
//! results. Everything below it returns `Result`; everything above it sees
//! either a formatted success payload or an `isError` result with a stable
//! error code.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use db2i_auth::SessionStore;
use db2i_core::config::{Config, ResponseFormat, SourceSpec};
use db2i_core::context::{CancelToken, RequestContext};
use db2i_core::settings::AuthMode;
use db2i_gateway::pool::DEFAULT_FETCH_SIZE;
use db2i_gateway::{ConnectionCreds, PoolKey, PoolManager};
use db2i_policy::{bind, BindMetadata, ParamMode};

use crate::error::McpError;
use crate::format::{self, OutputMetadata, OutputPayload};
use crate::protocol::{CallToolResult, Content};
use crate::registry::{ToolDescriptor, ToolKind, ToolRegistry};

/// Executes tool calls against the pool manager.
pub struct Dispatcher {
    pools: Arc<PoolManager>,
    sessions: Option<Arc<SessionStore>>,
    auth_mode: AuthMode,
}

impl Dispatcher {
    pub fn new(
        pools: Arc<PoolManager>,
        sessions: Option<Arc<SessionStore>>,
        auth_mode: AuthMode,
    ) -> Self {
        Self {
            pools,
            sessions,
            auth_mode,
        }
    }

    pub fn pools(&self) -> &Arc<PoolManager> {
        &self.pools
    }

    /// Handle one `tools/call` end to end. Never errors: failures become
    /// `isError` results.
    pub async fn dispatch(
        &self,
        registry: Arc<ToolRegistry>,
        config: Arc<Config>,
        name: &str,
        arguments: Value,
        bearer: Option<&str>,
        parent_id: Option<String>,
        cancel: CancelToken,
    ) -> CallToolResult {
        let ctx = RequestContext::for_tool(name, parent_id).with_cancel(cancel);
        debug!(
            request_id = %ctx.request_id,
            operation = %ctx.operation,
            "dispatching tool call"
        );

        // The descriptor is pinned before any await: a registry swap during
        // execution must not change what this call runs.
        let descriptor = match registry.get(name) {
            Some(d) => d.clone(),
            None => {
                return error_result(name, None, &McpError::NotFound(name.to_string()));
            }
        };

        match self.run(&descriptor, &config, arguments, bearer, &ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    tool = %name,
                    code = e.code().as_str(),
                    error = %e,
                    "tool call failed"
                );
                error_result(name, Some(&descriptor), &e)
            }
        }
    }

    async fn run(
        &self,
        descriptor: &Arc<ToolDescriptor>,
        config: &Config,
        arguments: Value,
        bearer: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<CallToolResult, McpError> {
        let source_spec = config.sources.get(&descriptor.source).ok_or_else(|| {
            McpError::Configuration(format!(
                "tool '{}' references unknown source '{}'",
                descriptor.name, descriptor.source
            ))
        })?;
        let (pool_key, creds) = self.resolve_identity(source_spec, &descriptor.source, bearer)?;

        let args_map = argument_map(&arguments)?;
        let (sql, values, bind_metadata) = match descriptor.kind {
            ToolKind::Config => {
                let bound = bind(&descriptor.statement, &descriptor.parameters, &args_map)?;
                (bound.sql, bound.values, bound.metadata)
            }
            ToolKind::ExecuteSql => {
                let sql = args_map
                    .get("sql")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        McpError::Validation("missing required parameter 'sql'".into())
                    })?
                    .to_string();
                (
                    sql,
                    Vec::new(),
                    BindMetadata {
                        mode: ParamMode::None,
                        count: 0,
                        processed_parameters: Vec::new(),
                    },
                )
            }
        };

        // Policy check precedes any gateway contact; the pool layer checks
        // again right before execution.
        descriptor.security.validate_sql(&sql)?;

        let wire: Vec<Value> = values.iter().map(|v| v.to_json()).collect();
        let result = self
            .pools
            .execute_query_paginated(
                &pool_key,
                &creds,
                &sql,
                &wire,
                DEFAULT_FETCH_SIZE,
                Some(&descriptor.security),
                &ctx.cancel,
            )
            .await?;

        info!(
            request_id = %ctx.request_id,
            tool = %descriptor.name,
            rows = result.data.len(),
            execution_time_ms = ?result.execution_time,
            "tool call completed"
        );

        let payload = OutputPayload {
            success: true,
            metadata: OutputMetadata {
                execution_time_ms: result.execution_time,
                row_count: result.data.len(),
                affected_rows: result.update_count,
                columns: if result.columns.is_empty() {
                    None
                } else {
                    Some(result.columns.clone())
                },
                parameter_mode: bind_metadata.mode,
                parameter_count: bind_metadata.count,
                processed_parameters: bind_metadata.processed_parameters,
                tool_name: descriptor.name.clone(),
                sql_statement: format::truncate_sql(&sql),
                parameters: Value::Object(args_map),
            },
            data: result.data,
            error: None,
            error_code: None,
        };

        let text = match descriptor.response_format {
            ResponseFormat::Markdown => format::format_markdown(
                &payload,
                descriptor.table_style,
                descriptor.max_display_rows,
            ),
            ResponseFormat::Json => format::format_json(&payload),
        };

        Ok(CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(serde_json::to_value(&payload)?),
            is_error: None,
        })
    }

    /// Resolve the pool identity for this call.
    ///
    /// Static modes execute as the configured source; `ibmi` mode requires
    /// a bearer token whose session supplies the credentials. The token
    /// itself is the pool key, so each session owns its pool.
    fn resolve_identity(
        &self,
        source: &SourceSpec,
        source_name: &str,
        bearer: Option<&str>,
    ) -> Result<(PoolKey, ConnectionCreds), McpError> {
        match self.auth_mode {
            AuthMode::Ibmi => {
                let token = bearer.ok_or_else(|| {
                    McpError::Authentication("missing bearer token".into())
                })?;
                let sessions = self.sessions.as_ref().ok_or_else(|| {
                    McpError::Configuration("ibmi auth mode without a session store".into())
                })?;
                let record = sessions.get(token)?;
                let creds = ConnectionCreds {
                    host: record
                        .credentials
                        .host
                        .clone()
                        .unwrap_or_else(|| source.host.clone()),
                    port: record.credentials.port.unwrap_or(source.port),
                    user: record.credentials.user.clone(),
                    password: record.credentials.password.clone(),
                    secure: source.secure,
                    ignore_unauthorized: source.ignore_unauthorized,
                };
                Ok((PoolKey::Token(record.token), creds))
            }
            _ => {
                let creds = ConnectionCreds::from_source(source).ok_or_else(|| {
                    McpError::Configuration(format!(
                        "source '{source_name}' has no resolvable password"
                    ))
                })?;
                Ok((PoolKey::Source(source_name.to_string()), creds))
            }
        }
    }
}

fn argument_map(arguments: &Value) -> Result<Map<String, Value>, McpError> {
    match arguments {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        other => Err(McpError::Validation(format!(
            "arguments must be an object, got {}",
            match other {
                Value::Array(_) => "an array",
                Value::String(_) => "a string",
                Value::Number(_) => "a number",
                Value::Bool(_) => "a boolean",
                _ => "an unsupported value",
            }
        ))),
    }
}

/// Convert an error into the MCP failure shape.
fn error_result(
    name: &str,
    descriptor: Option<&Arc<ToolDescriptor>>,
    error: &McpError,
) -> CallToolResult {
    let code = error.code();
    let mut content = vec![Content::text(format!(
        "Error executing '{name}': {error}"
    ))];

    if let Some(descriptor) = descriptor {
        if descriptor.response_format == ResponseFormat::Markdown {
            let sql = (!descriptor.statement.is_empty()).then_some(descriptor.statement.as_str());
            content.push(Content::text(format::format_error_markdown(
                name,
                code,
                &error.to_string(),
                sql,
            )));
        }
    }

    CallToolResult {
        content,
        structured_content: Some(json!({
            "success": false,
            "error": error.to_string(),
            "errorCode": code.as_str(),
            "errorDetails": Value::Null,
        })),
        is_error: Some(true),
    }
}
