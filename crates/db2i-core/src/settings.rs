//! Process settings from the environment.
//!
//! Every knob has an environment variable; CLI flags override the
//! corresponding field after [`Settings::from_env`] has run.

use std::path::PathBuf;

use crate::config::SourceSpec;
use crate::merge::MergeOptions;

/// Transport the MCP server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

impl TransportKind {
    /// Parse the `MCP_TRANSPORT_TYPE` / `--transport` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "stdio" => Some(TransportKind::Stdio),
            "http" => Some(TransportKind::Http),
            _ => None,
        }
    }
}

/// Authentication mode for inbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    None,
    Jwt,
    Oauth,
    Ibmi,
}

impl AuthMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Some(AuthMode::None),
            "jwt" => Some(AuthMode::Jwt),
            "oauth" => Some(AuthMode::Oauth),
            "ibmi" => Some(AuthMode::Ibmi),
            _ => None,
        }
    }
}

/// The full environment-variable surface of the server.
#[derive(Debug, Clone)]
pub struct Settings {
    pub transport: TransportKind,
    pub http_port: u16,
    pub http_host: String,
    pub allowed_origins: Vec<String>,
    pub auth_mode: AuthMode,

    pub http_auth_enabled: bool,
    pub auth_allow_http: bool,
    pub token_expiry_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub max_concurrent_sessions: usize,
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
    pub key_id: Option<String>,

    /// Static source built from `DB2i_*` variables, when present.
    pub static_source: Option<SourceSpec>,

    pub tools_path: Option<String>,
    pub selected_toolsets: Vec<String>,
    pub merge: MergeOptions,
    pub auto_reload: bool,

    /// Register the built-in free-form `execute_sql` tool.
    pub execute_sql_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            http_port: 3010,
            http_host: "127.0.0.1".into(),
            allowed_origins: Vec::new(),
            auth_mode: AuthMode::None,
            http_auth_enabled: false,
            auth_allow_http: false,
            token_expiry_seconds: 3600,
            cleanup_interval_seconds: 300,
            max_concurrent_sessions: 100,
            private_key_path: None,
            public_key_path: None,
            key_id: None,
            static_source: None,
            tools_path: None,
            selected_toolsets: Vec::new(),
            merge: MergeOptions::default(),
            auto_reload: false,
            execute_sql_enabled: false,
        }
    }
}

impl Settings {
    /// Read all recognized environment variables.
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        let merge_defaults = MergeOptions::default();

        Settings {
            transport: env_str("MCP_TRANSPORT_TYPE")
                .and_then(|v| TransportKind::parse(&v))
                .unwrap_or(defaults.transport),
            http_port: env_parse("MCP_HTTP_PORT").unwrap_or(defaults.http_port),
            http_host: env_str("MCP_HTTP_HOST").unwrap_or(defaults.http_host),
            allowed_origins: env_str("MCP_ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            auth_mode: env_str("MCP_AUTH_MODE")
                .and_then(|v| AuthMode::parse(&v))
                .unwrap_or(defaults.auth_mode),

            http_auth_enabled: env_bool("IBMI_HTTP_AUTH_ENABLED")
                .unwrap_or(defaults.http_auth_enabled),
            auth_allow_http: env_bool("IBMI_AUTH_ALLOW_HTTP").unwrap_or(defaults.auth_allow_http),
            token_expiry_seconds: env_parse("IBMI_AUTH_TOKEN_EXPIRY_SECONDS")
                .unwrap_or(defaults.token_expiry_seconds),
            cleanup_interval_seconds: env_parse("IBMI_AUTH_CLEANUP_INTERVAL_SECONDS")
                .unwrap_or(defaults.cleanup_interval_seconds),
            max_concurrent_sessions: env_parse("IBMI_AUTH_MAX_CONCURRENT_SESSIONS")
                .unwrap_or(defaults.max_concurrent_sessions),
            private_key_path: env_str("IBMI_AUTH_PRIVATE_KEY_PATH").map(PathBuf::from),
            public_key_path: env_str("IBMI_AUTH_PUBLIC_KEY_PATH").map(PathBuf::from),
            key_id: env_str("IBMI_AUTH_KEY_ID"),

            static_source: static_source_from_env(),

            tools_path: env_str("TOOLS_YAML_PATH").filter(|v| !v.is_empty()),
            selected_toolsets: env_str("SELECTED_TOOLSETS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            merge: MergeOptions {
                merge_arrays: env_bool("YAML_MERGE_ARRAYS").unwrap_or(merge_defaults.merge_arrays),
                allow_duplicate_tools: env_bool("YAML_ALLOW_DUPLICATE_TOOLS")
                    .unwrap_or(merge_defaults.allow_duplicate_tools),
                allow_duplicate_sources: env_bool("YAML_ALLOW_DUPLICATE_SOURCES")
                    .unwrap_or(merge_defaults.allow_duplicate_sources),
                validate_merged: env_bool("YAML_VALIDATE_MERGED")
                    .unwrap_or(merge_defaults.validate_merged),
            },
            auto_reload: env_bool("YAML_AUTO_RELOAD").unwrap_or(defaults.auto_reload),

            execute_sql_enabled: env_bool("IBMI_EXECUTE_SQL_ENABLED")
                .unwrap_or(defaults.execute_sql_enabled),
        }
    }
}

/// Build the static source from `DB2i_*` variables. Returns `None` unless a
/// host is configured.
fn static_source_from_env() -> Option<SourceSpec> {
    let host = env_str("DB2i_HOST").filter(|v| !v.is_empty())?;
    Some(SourceSpec {
        host,
        user: env_str("DB2i_USER").unwrap_or_default(),
        password: env_str("DB2i_PASS"),
        password_env: None,
        port: env_parse("DB2i_PORT").unwrap_or(8076),
        secure: env_bool("DB2i_SECURE").unwrap_or(true),
        ignore_unauthorized: env_bool("DB2i_IGNORE_UNAUTHORIZED").unwrap_or(false),
    })
}

fn env_str(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_bool(name: &str) -> Option<bool> {
    env_str(name).map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_str(name).and_then(|v| v.parse().ok())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
