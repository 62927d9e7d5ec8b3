//! # db2i-policy
//!
//! Statement-level policy for the Db2 for i MCP server: the SQL security
//! validator and the parameter binder.
//!
//! Both components are pure functions over the statement text and the
//! declarative [`ParameterSpec`](db2i_core::ParameterSpec) list. Neither
//! talks to the network; the pool manager calls the validator immediately
//! before execution and the dispatcher calls the binder immediately before
//! that.
//!
//! The validator is a guardrail, not a SQL parser. It tokenizes
//! conservatively (string literals and comments are opaque), refuses
//! statements carrying restricted keywords, and under read-only policy
//! requires the first real keyword to be `SELECT` or `WITH`. Unclear cases
//! are refused rather than guessed at.

pub mod binder;
pub mod error;
pub mod lexer;
pub mod security;

pub use binder::{bind, named_placeholders, BindMetadata, BoundStatement, ParamMode, SqlValue};
pub use error::PolicyError;
pub use security::SecurityPolicy;
