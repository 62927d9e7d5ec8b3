//! # db2i-gateway
//!
//! Client and pool management for the WebSocket/JSON database gateway that
//! fronts Db2 for i.
//!
//! The [`client`] module is a thin protocol client: one WebSocket connection
//! per opened pool, JSON frames correlated by request id, no retries. The
//! [`pool`] module owns the keyed collection of pools (one per static
//! source or per authenticated identity) with lazy single-flight
//! initialization, health probing and paginated fetch.

pub mod client;
pub mod error;
pub mod pool;
pub mod types;

pub use client::GatewayClient;
pub use error::GatewayError;
pub use pool::{HealthStatus, PoolKey, PoolManager, PoolSettings};
pub use types::{ColumnMetadata, ConnectionCreds, QueryResult};
