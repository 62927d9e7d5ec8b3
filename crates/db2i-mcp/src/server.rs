//! The MCP server: shared state, method routing and the stdio transport.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use db2i_auth::{KeyPair, KeyRing, SessionStore};
use db2i_core::config::Config;
use db2i_core::context::{CancelHandle, CancelToken};
use db2i_core::loader::ConfigSource;
use db2i_core::settings::{AuthMode, Settings, TransportKind};
use db2i_gateway::{PoolKey, PoolManager, PoolSettings};

use crate::dispatcher::Dispatcher;
use crate::error::McpError;
use crate::protocol::{
    rpc_codes, CallToolParams, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, SERVER_NAME,
};
use crate::registry::{build_registry, RegistryOptions, ToolRegistry};
use crate::{http_transport, reload, resources};

/// Shared server state. Registry and config are snapshots behind locks so
/// hot reload can swap them atomically while requests keep the `Arc` they
/// started with.
pub struct ServerState {
    pub settings: Settings,
    pub registry: RwLock<Arc<ToolRegistry>>,
    pub config: RwLock<Arc<Config>>,
    pub sources: Vec<ConfigSource>,
    pub resolved_paths: Mutex<Vec<PathBuf>>,
    pub dispatcher: Dispatcher,
    pub sessions: Option<Arc<SessionStore>>,
    pub key_ring: Option<Arc<KeyRing>>,
    /// In-flight `tools/call` cancellation handles, keyed by JSON-RPC id.
    cancellations: Mutex<HashMap<String, CancelHandle>>,
}

impl ServerState {
    pub fn registry_snapshot(&self) -> Arc<ToolRegistry> {
        self.registry.read().expect("registry lock").clone()
    }

    pub fn config_snapshot(&self) -> Arc<Config> {
        self.config.read().expect("config lock").clone()
    }

    /// Swap in a freshly built registry and config. In-flight calls keep
    /// their captured descriptors.
    pub fn swap(&self, config: Arc<Config>, registry: Arc<ToolRegistry>) {
        *self.config.write().expect("config lock") = config;
        *self.registry.write().expect("registry lock") = registry;
    }
}

/// The server.
pub struct McpServer {
    state: Arc<ServerState>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer").finish_non_exhaustive()
    }
}

impl McpServer {
    /// Build a server from settings, a validated config and the source list
    /// it was loaded from (kept for hot reload).
    pub fn new(
        settings: Settings,
        config: Config,
        sources: Vec<ConfigSource>,
        resolved_paths: Vec<PathBuf>,
    ) -> Result<Self, McpError> {
        let options = RegistryOptions {
            selected_toolsets: settings.selected_toolsets.clone(),
            execute_sql_source: settings
                .execute_sql_enabled
                .then(|| "default".to_string()),
        };
        let registry = build_registry(&config, &options)?;
        info!(
            tools = registry.len(),
            toolsets = config.toolsets.len(),
            sources = config.sources.len(),
            "registry built"
        );

        let sessions = match settings.auth_mode {
            AuthMode::Ibmi => Some(Arc::new(SessionStore::new(
                settings.token_expiry_seconds,
                settings.max_concurrent_sessions,
            ))),
            _ => None,
        };

        let key_ring = if settings.http_auth_enabled {
            let key_id = settings
                .key_id
                .clone()
                .unwrap_or_else(|| "db2i-mcp-1".to_string());
            let pair = match &settings.private_key_path {
                Some(path) => KeyPair::from_pem_file(key_id, path)
                    .map_err(|e| McpError::Configuration(e.to_string()))?,
                None => {
                    return Err(McpError::Configuration(
                        "IBMI_AUTH_PRIVATE_KEY_PATH is required when HTTP auth is enabled"
                            .into(),
                    ))
                }
            };
            Some(Arc::new(KeyRing::new(pair)))
        } else {
            None
        };

        let pools = Arc::new(PoolManager::new(PoolSettings::default()));
        let dispatcher = Dispatcher::new(pools, sessions.clone(), settings.auth_mode);

        Ok(Self {
            state: Arc::new(ServerState {
                settings,
                registry: RwLock::new(Arc::new(registry)),
                config: RwLock::new(Arc::new(config)),
                sources,
                resolved_paths: Mutex::new(resolved_paths),
                dispatcher,
                sessions,
                key_ring,
                cancellations: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Run until the transport ends or the process is interrupted. Pools
    /// are closed on the way out.
    pub async fn run(self: &Arc<Self>) -> Result<(), McpError> {
        let sweeper = self.spawn_session_sweeper();

        let watcher = if self.state.settings.auto_reload {
            match reload::spawn(self.clone()) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(error = %e, "config watcher could not be started");
                    None
                }
            }
        } else {
            None
        };

        let result = match self.state.settings.transport {
            TransportKind::Stdio => {
                tokio::select! {
                    r = self.run_stdio() => r,
                    _ = tokio::signal::ctrl_c() => Ok(()),
                }
            }
            TransportKind::Http => {
                tokio::select! {
                    r = http_transport::serve(self.clone()) => r,
                    _ = tokio::signal::ctrl_c() => Ok(()),
                }
            }
        };

        if let Some(w) = watcher {
            w.stop();
        }
        if let Some(s) = sweeper {
            s.abort();
        }
        self.state.dispatcher.pools().close_all_pools().await;
        info!("server stopped");
        result
    }

    /// Periodic expiry sweep: drop expired sessions and close their pools.
    pub fn spawn_session_sweeper(&self) -> Option<tokio::task::JoinHandle<()>> {
        let sessions = self.state.sessions.clone()?;
        let pools = self.state.dispatcher.pools().clone();
        let period = Duration::from_secs(self.state.settings.cleanup_interval_seconds.max(1));

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                for record in sessions.sweep_expired() {
                    pools.close_pool(&PoolKey::Token(record.token)).await;
                }
            }
        }))
    }

    async fn run_stdio(&self) -> Result<(), McpError> {
        info!("MCP server listening on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    let response = JsonRpcResponse::error(
                        None,
                        rpc_codes::PARSE_ERROR,
                        format!("parse error: {e}"),
                    );
                    write_line(&mut stdout, &response).await?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(request, None).await {
                write_line(&mut stdout, &response).await?;
            }
        }
        Ok(())
    }

    /// Route one JSON-RPC request. Returns `None` for notifications.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        bearer: Option<&str>,
    ) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(id)),
            "notifications/initialized" => None,
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(self.handle_list_tools(id)),
            "tools/call" => Some(self.handle_call_tool(id, request.params, bearer).await),
            "resources/list" => Some(self.handle_list_resources(id)),
            "resources/read" => Some(self.handle_read_resource(id, request.params)),
            "notifications/cancelled" => {
                self.handle_cancelled(request.params);
                None
            }
            "shutdown" => {
                info!("shutdown requested");
                Some(JsonRpcResponse::success(id, Value::Null))
            }
            other => {
                if request.is_notification() {
                    return None;
                }
                Some(JsonRpcResponse::error(
                    id,
                    rpc_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                ))
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {
                    "tools": { "listChanged": true },
                    "resources": {},
                },
            }),
        )
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let registry = self.state.registry_snapshot();
        let tools: Vec<_> = registry.list().map(|d| d.definition()).collect();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_call_tool(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        bearer: Option<&str>,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    rpc_codes::INVALID_PARAMS,
                    format!("Invalid params: {e}"),
                )
            }
            None => {
                return JsonRpcResponse::error(id, rpc_codes::INVALID_PARAMS, "Missing params")
            }
        };

        let registry = self.state.registry_snapshot();
        let config = self.state.config_snapshot();

        let (cancel_key, cancel_token) = match &id {
            Some(id_value) => {
                let key = id_value.to_string();
                let (handle, token) = CancelHandle::new();
                self.state
                    .cancellations
                    .lock()
                    .expect("cancellation lock")
                    .insert(key.clone(), handle);
                (Some(key), token)
            }
            None => (None, CancelToken::never()),
        };

        let parent_id = id.as_ref().map(Value::to_string);
        let result = self
            .state
            .dispatcher
            .dispatch(
                registry,
                config,
                &params.name,
                params.arguments,
                bearer,
                parent_id,
                cancel_token,
            )
            .await;

        if let Some(key) = cancel_key {
            self.state
                .cancellations
                .lock()
                .expect("cancellation lock")
                .remove(&key);
        }

        match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(
                id,
                rpc_codes::INTERNAL_ERROR,
                format!("result serialization failed: {e}"),
            ),
        }
    }

    fn handle_list_resources(&self, id: Option<Value>) -> JsonRpcResponse {
        let registry = self.state.registry_snapshot();
        let config = self.state.config_snapshot();
        let resources = resources::list_resources(&config, &registry);
        JsonRpcResponse::success(id, json!({ "resources": resources }))
    }

    fn handle_read_resource(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let uri = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str);
        let Some(uri) = uri else {
            return JsonRpcResponse::error(id, rpc_codes::INVALID_PARAMS, "Missing uri");
        };

        let registry = self.state.registry_snapshot();
        let config = self.state.config_snapshot();
        match resources::read_resource(uri, &config, &registry) {
            Ok(content) => {
                JsonRpcResponse::success(id, json!({ "contents": [content] }))
            }
            Err(e) => JsonRpcResponse::error(id, rpc_codes::INVALID_PARAMS, e.to_string()),
        }
    }

    /// `notifications/cancelled` aborts the matching in-flight call at its
    /// next suspension point.
    fn handle_cancelled(&self, params: Option<Value>) {
        let request_id = params
            .as_ref()
            .and_then(|p| p.get("requestId"))
            .map(Value::to_string);
        if let Some(key) = request_id {
            let handle = {
                let cancellations = self.state.cancellations.lock().expect("cancellation lock");
                cancellations.get(&key).map(|h| {
                    h.cancel();
                })
            };
            if handle.is_some() {
                info!(request = %key, "in-flight call cancelled");
            }
        }
    }
}

async fn write_line(
    stdout: &mut tokio::io::Stdout,
    response: &JsonRpcResponse,
) -> Result<(), McpError> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    if let Err(e) = stdout.write_all(line.as_bytes()).await {
        error!(error = %e, "stdout write failed");
        return Err(e.into());
    }
    stdout.flush().await?;
    Ok(())
}
