//! Gateway wire types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use db2i_core::config::SourceSpec;

/// Credentials and endpoint for one gateway connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCreds {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// `wss://` when true, plain `ws://` otherwise.
    pub secure: bool,
    /// Skip TLS certificate verification.
    pub ignore_unauthorized: bool,
}

impl ConnectionCreds {
    /// Build credentials from a configured source. Fails when no password
    /// can be resolved.
    pub fn from_source(spec: &SourceSpec) -> Option<Self> {
        Some(Self {
            host: spec.host.clone(),
            port: spec.port,
            user: spec.user.clone(),
            password: spec.resolve_password()?,
            secure: spec.secure,
            ignore_unauthorized: spec.ignore_unauthorized,
        })
    }

    /// Gateway endpoint URL.
    pub fn endpoint(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/db/", self.host, self.port)
    }
}

impl std::fmt::Display for ConnectionCreds {
    // Credentials never appear in logs; only user@host:port is printable.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Column description attached to a result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    /// SQL type name, e.g. `VARCHAR` or `DECIMAL(12,2)`.
    #[serde(default, rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// One gateway result frame, or the aggregate of a paginated fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Cursor id for `fetch_more` / `close_query`, when the query is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub success: bool,

    /// Rows as column-name → value maps.
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,

    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,

    /// Whether the cursor is exhausted.
    #[serde(default)]
    pub is_done: bool,

    #[serde(default)]
    pub sql_rc: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,

    /// Server-side execution time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_count: Option<i64>,

    /// Server job servicing this connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}
