//! Database-gateway source descriptors.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Connection descriptor for one database gateway.
///
/// Immutable after load; tools reference sources by name. The password can
/// be given inline or indirected through an environment variable so config
/// files stay secret-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    /// Gateway hostname.
    pub host: String,

    /// Database user profile.
    pub user: String,

    /// Password, inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password. Takes precedence over the
    /// inline field when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Gateway port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect over TLS. Plain WebSocket is only sensible for local
    /// development gateways.
    #[serde(default = "default_true")]
    pub secure: bool,

    /// Skip TLS certificate verification when connecting.
    #[serde(default)]
    pub ignore_unauthorized: bool,
}

impl SourceSpec {
    /// Validate the descriptor.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "source '{name}': host must be non-empty"
            )));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "source '{name}': user must be non-empty"
            )));
        }
        if self.password.is_none() && self.password_env.is_none() {
            return Err(ConfigError::invalid(format!(
                "source '{name}': one of password or passwordEnv is required"
            )));
        }
        Ok(())
    }

    /// Resolve the password, preferring the environment indirection.
    pub fn resolve_password(&self) -> Option<String> {
        if let Some(var) = &self.password_env {
            if let Ok(value) = std::env::var(var) {
                return Some(value);
            }
        }
        self.password.clone()
    }

    /// Whether the connection parameters of two specs differ in a way that
    /// requires reopening pools (everything except bookkeeping fields).
    pub fn connection_changed(&self, other: &SourceSpec) -> bool {
        self != other
    }
}

fn default_port() -> u16 {
    8076
}

fn default_true() -> bool {
    true
}
