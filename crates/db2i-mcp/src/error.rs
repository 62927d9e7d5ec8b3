//! Server error taxonomy.
//!
//! Lower layers raise their own typed errors; everything converges on
//! [`McpError`] at the dispatcher, which is the only place errors become
//! MCP responses. Error text never includes credentials or statements
//! longer than 500 characters.

use serde::Serialize;
use thiserror::Error;

use db2i_auth::AuthError;
use db2i_core::ConfigError;
use db2i_gateway::GatewayError;
use db2i_policy::PolicyError;

/// Stable error codes surfaced in `structuredContent.errorCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "CONFIGURATION_ERROR")]
    Configuration,
    #[serde(rename = "AUTHENTICATION_ERROR")]
    Authentication,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "RESOURCE_EXHAUSTED")]
    ResourceExhausted,
    #[serde(rename = "DATABASE_ERROR")]
    Database,
    #[serde(rename = "INITIALIZATION_ERROR")]
    Initialization,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Configuration => "CONFIGURATION_ERROR",
            ErrorCode::Authentication => "AUTHENTICATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::Database => "DATABASE_ERROR",
            ErrorCode::Initialization => "INITIALIZATION_ERROR",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Unified server error.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    ResourceExhausted(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("pool initialization failed: {0}")]
    Initialization(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl McpError {
    pub fn code(&self) -> ErrorCode {
        match self {
            McpError::Validation(_) => ErrorCode::Validation,
            McpError::Configuration(_) => ErrorCode::Configuration,
            McpError::Authentication(_) => ErrorCode::Authentication,
            McpError::NotFound(_) => ErrorCode::NotFound,
            McpError::ResourceExhausted(_) => ErrorCode::ResourceExhausted,
            McpError::Database(_) => ErrorCode::Database,
            McpError::Initialization(_) => ErrorCode::Initialization,
            McpError::Cancelled => ErrorCode::Cancelled,
            McpError::Internal(_) | McpError::Io(_) | McpError::Serialization(_) => {
                ErrorCode::Internal
            }
        }
    }
}

impl From<PolicyError> for McpError {
    fn from(e: PolicyError) -> Self {
        McpError::Validation(e.to_string())
    }
}

impl From<GatewayError> for McpError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Policy(p) => p.into(),
            GatewayError::Cancelled => McpError::Cancelled,
            GatewayError::Initialization(msg) => McpError::Initialization(msg),
            GatewayError::InvalidWireValue(msg) => McpError::Validation(msg),
            GatewayError::Database {
                message,
                sql_rc,
                sql_state,
            } => {
                let mut text = message;
                if let Some(rc) = sql_rc {
                    text.push_str(&format!(" (SQLCODE {rc}"));
                    if let Some(state) = sql_state {
                        text.push_str(&format!(", SQLSTATE {state}"));
                    }
                    text.push(')');
                }
                McpError::Database(text)
            }
            GatewayError::Transport(msg) | GatewayError::Tls(msg) => McpError::Database(msg),
        }
    }
}

impl From<AuthError> for McpError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::SessionLimit => McpError::ResourceExhausted(e.to_string()),
            // Auth error displays are already credential-free.
            other => McpError::Authentication(other.to_string()),
        }
    }
}

impl From<ConfigError> for McpError {
    fn from(e: ConfigError) -> Self {
        McpError::Configuration(e.to_string())
    }
}
