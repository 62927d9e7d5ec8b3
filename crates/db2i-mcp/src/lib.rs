//! # db2i-mcp
//!
//! The MCP server proper: protocol types, the tool registry built from
//! configuration, the request dispatcher, response formatting, transports
//! and hot reload.
//!
//! ```text
//! AI agent
//!    │  MCP (stdio / HTTP)
//!    ▼
//! ┌───────────────────────────────┐
//! │ db2i-mcp server               │
//! │  1. resolve token → identity  │ ← db2i-auth
//! │  2. look up tool descriptor   │ ← registry (from YAML config)
//! │  3. validate + bind arguments │ ← db2i-policy
//! │  4. policy-check the SQL      │ ← db2i-policy
//! │  5. acquire pool, execute     │ ← db2i-gateway
//! │  6. format result             │
//! └──────────────┬────────────────┘
//!                │ WebSocket/JSON
//!                ▼
//!        database gateway → Db2 for i
//! ```
//!
//! The registry is immutable once built; hot reload builds a replacement
//! and swaps it atomically, so a `tools/call` in flight keeps the
//! descriptor it started with.

pub mod dispatcher;
pub mod error;
pub mod format;
pub mod http_transport;
pub mod protocol;
pub mod registry;
pub mod reload;
pub mod resources;
pub mod server;

pub use dispatcher::Dispatcher;
pub use error::{ErrorCode, McpError};
pub use registry::{build_registry, RegistryOptions, ToolDescriptor, ToolRegistry};
pub use server::{McpServer, ServerState};
