//! Gateway error types.

use thiserror::Error;

use db2i_policy::PolicyError;

/// Errors from the gateway client and pool manager.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// WebSocket or framing failure.
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// TLS setup or certificate retrieval failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The gateway reported a SQL failure.
    #[error("database error: {message}")]
    Database {
        message: String,
        sql_rc: Option<i32>,
        sql_state: Option<String>,
    },

    /// The pool could not be created. Retried lazily on the next request.
    #[error("pool initialization failed: {0}")]
    Initialization(String),

    /// A parameter value of a shape the wire does not accept.
    #[error("invalid parameter value on the wire: {0}")]
    InvalidWireValue(String),

    /// The request was cancelled by the client.
    #[error("request cancelled")]
    Cancelled,

    /// Statement rejected by the security policy.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl GatewayError {
    pub(crate) fn transport(e: impl std::fmt::Display) -> Self {
        GatewayError::Transport(e.to_string())
    }
}
