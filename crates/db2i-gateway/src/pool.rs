//! Identity-keyed pool management.
//!
//! Every static source and every authenticated identity maps to one pool
//! key. Pools are opened lazily on first use; concurrent first calls share
//! a single initialization (the per-key slot lock is held across the open,
//! so exactly one connect frame reaches the gateway). A failed
//! initialization resets the slot and the next request retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use db2i_core::context::CancelToken;
use db2i_policy::SecurityPolicy;

use crate::client::{self, GatewayClient};
use crate::error::GatewayError;
use crate::types::{ConnectionCreds, QueryResult};

/// Health probe executed by [`PoolManager::check_pool_health`].
const HEALTH_PROBE: &str = "SELECT 1 FROM SYSIBM.SYSDUMMY1";

/// Defensive bound on pagination rounds.
const MAX_FETCH_ROUNDS: usize = 100;

/// Default row count per pagination fetch.
pub const DEFAULT_FETCH_SIZE: usize = 300;

/// Pool identity: a named static source or an opaque token session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    Source(String),
    Token(String),
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Token keys are opaque; print only a short prefix.
            PoolKey::Source(name) => write!(f, "source:{name}"),
            PoolKey::Token(token) => {
                write!(f, "token:{}…", &token[..token.len().min(8)])
            }
        }
    }
}

/// Requested gateway pool sizes.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub starting_size: u32,
    pub max_size: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            starting_size: client::DEFAULT_STARTING_SIZE,
            max_size: client::DEFAULT_MAX_SIZE,
        }
    }
}

/// Last observed health of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

struct PoolState {
    pool: Option<Arc<GatewayClient>>,
    initialized: bool,
    connecting: bool,
    health: HealthStatus,
    last_health_check: Option<Instant>,
    last_error: Option<String>,
    creds: ConnectionCreds,
}

struct PoolSlot {
    state: tokio::sync::Mutex<PoolState>,
}

/// The keyed pool collection.
pub struct PoolManager {
    slots: Mutex<HashMap<PoolKey, Arc<PoolSlot>>>,
    settings: PoolSettings,
}

impl PoolManager {
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Number of live pool slots.
    pub fn pool_count(&self) -> usize {
        self.slots.lock().expect("slot map lock").len()
    }

    /// Health of a key, `Unknown` when the pool has never been opened.
    pub async fn health(&self, key: &PoolKey) -> HealthStatus {
        let slot = {
            let slots = self.slots.lock().expect("slot map lock");
            slots.get(key).cloned()
        };
        match slot {
            Some(slot) => slot.state.lock().await.health,
            None => HealthStatus::Unknown,
        }
    }

    fn slot_for(&self, key: &PoolKey, creds: &ConnectionCreds) -> Arc<PoolSlot> {
        let mut slots = self.slots.lock().expect("slot map lock");
        slots
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(PoolSlot {
                    state: tokio::sync::Mutex::new(PoolState {
                        pool: None,
                        initialized: false,
                        connecting: false,
                        health: HealthStatus::Unknown,
                        last_health_check: None,
                        last_error: None,
                        creds: creds.clone(),
                    }),
                })
            })
            .clone()
    }

    /// Ensure the pool for `key` is open, sharing one initialization among
    /// concurrent callers.
    pub async fn ensure_pool(
        &self,
        key: &PoolKey,
        creds: &ConnectionCreds,
        cancel: &CancelToken,
    ) -> Result<Arc<GatewayClient>, GatewayError> {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        let slot = self.slot_for(key, creds);

        // Holding the slot lock across the open is the single-flight
        // guarantee: later callers block here and observe `initialized`.
        let mut state = slot.state.lock().await;
        if state.initialized {
            if let Some(pool) = &state.pool {
                return Ok(pool.clone());
            }
        }

        state.connecting = true;
        state.creds = creds.clone();
        debug!(pool = %key, "opening gateway pool");

        let open = async {
            let root_certificate = if creds.secure && !creds.ignore_unauthorized {
                Some(client::fetch_root_certificate(&creds.host, creds.port).await?)
            } else {
                None
            };
            GatewayClient::open(
                creds,
                self.settings.starting_size,
                self.settings.max_size,
                root_certificate.as_deref(),
            )
            .await
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            r = open => r,
        };

        match result {
            Ok(pool) => {
                let pool = Arc::new(pool);
                state.pool = Some(pool.clone());
                state.initialized = true;
                state.connecting = false;
                state.health = HealthStatus::Healthy;
                state.last_health_check = Some(Instant::now());
                state.last_error = None;
                info!(pool = %key, job = ?pool.job_id(), "gateway pool opened");
                Ok(pool)
            }
            Err(GatewayError::Cancelled) => {
                state.connecting = false;
                Err(GatewayError::Cancelled)
            }
            Err(e) => {
                state.pool = None;
                state.initialized = false;
                state.connecting = false;
                state.health = HealthStatus::Unhealthy;
                state.last_error = Some(e.to_string());
                warn!(pool = %key, error = %e, "gateway pool initialization failed");
                Err(GatewayError::Initialization(e.to_string()))
            }
        }
    }

    /// Execute one statement on the pool for `key`.
    pub async fn execute_query(
        &self,
        key: &PoolKey,
        creds: &ConnectionCreds,
        sql: &str,
        params: &[Value],
        security: Option<&SecurityPolicy>,
        cancel: &CancelToken,
    ) -> Result<QueryResult, GatewayError> {
        let pool = self.ensure_pool(key, creds, cancel).await?;

        if let Some(policy) = security {
            policy.validate_sql(sql)?;
        }
        validate_wire_params(params)?;

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            r = pool.execute(sql, params) => r,
        }?;

        self.mark_healthy(key).await;
        Ok(result)
    }

    /// Execute a statement and drain its cursor, concatenating rows in
    /// fetch order. The cursor is closed before returning on every path.
    pub async fn execute_query_paginated(
        &self,
        key: &PoolKey,
        creds: &ConnectionCreds,
        sql: &str,
        params: &[Value],
        fetch_size: usize,
        security: Option<&SecurityPolicy>,
        cancel: &CancelToken,
    ) -> Result<QueryResult, GatewayError> {
        let pool = self.ensure_pool(key, creds, cancel).await?;

        if let Some(policy) = security {
            policy.validate_sql(sql)?;
        }
        validate_wire_params(params)?;

        let mut aggregate = tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            r = pool.execute(sql, params) => r,
        }?;

        let Some(query_id) = aggregate.id.clone() else {
            // No open cursor; the single frame is the whole result.
            self.mark_healthy(key).await;
            return Ok(aggregate);
        };

        let mut rounds = 0usize;
        let outcome = loop {
            if aggregate.is_done {
                break Ok(());
            }
            if rounds >= MAX_FETCH_ROUNDS {
                warn!(pool = %key, rounds, "pagination stopped at fetch cap");
                break Ok(());
            }
            rounds += 1;

            let page = tokio::select! {
                _ = cancel.cancelled() => Err(GatewayError::Cancelled),
                r = pool.fetch_more(&query_id, fetch_size) => r,
            };
            match page {
                Ok(page) => {
                    aggregate.data.extend(page.data);
                    aggregate.is_done = page.is_done;
                    if let Some(ms) = page.execution_time {
                        aggregate.execution_time =
                            Some(aggregate.execution_time.unwrap_or(0) + ms);
                    }
                }
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = pool.close_query(&query_id).await {
            warn!(pool = %key, error = %e, "cursor close failed");
        }

        outcome?;
        self.mark_healthy(key).await;
        aggregate.id = None;
        Ok(aggregate)
    }

    /// Probe the pool with a known-safe statement and record the outcome.
    pub async fn check_pool_health(&self, key: &PoolKey) -> HealthStatus {
        let slot = {
            let slots = self.slots.lock().expect("slot map lock");
            slots.get(key).cloned()
        };
        let Some(slot) = slot else {
            return HealthStatus::Unknown;
        };

        let pool = {
            let state = slot.state.lock().await;
            match &state.pool {
                Some(pool) => pool.clone(),
                None => return HealthStatus::Unknown,
            }
        };

        let health = match pool.execute(HEALTH_PROBE, &[]).await {
            Ok(result) if result.success => HealthStatus::Healthy,
            Ok(_) => HealthStatus::Unhealthy,
            Err(e) => {
                let mut state = slot.state.lock().await;
                state.last_error = Some(e.to_string());
                state.health = HealthStatus::Unhealthy;
                state.last_health_check = Some(Instant::now());
                return HealthStatus::Unhealthy;
            }
        };

        let mut state = slot.state.lock().await;
        state.health = health;
        state.last_health_check = Some(Instant::now());
        health
    }

    /// Close and forget the pool for `key`. Idempotent. In-flight calls
    /// holding the client `Arc` finish on the old connection.
    pub async fn close_pool(&self, key: &PoolKey) {
        let slot = {
            let mut slots = self.slots.lock().expect("slot map lock");
            slots.remove(key)
        };
        if let Some(slot) = slot {
            let mut state = slot.state.lock().await;
            if let Some(pool) = state.pool.take() {
                pool.close().await;
            }
            state.initialized = false;
            state.health = HealthStatus::Unknown;
            info!(pool = %key, "gateway pool closed");
        }
    }

    /// Close every pool, best-effort. Never errors.
    pub async fn close_all_pools(&self) {
        let keys: Vec<PoolKey> = {
            let slots = self.slots.lock().expect("slot map lock");
            slots.keys().cloned().collect()
        };
        for key in keys {
            self.close_pool(&key).await;
        }
    }

    async fn mark_healthy(&self, key: &PoolKey) {
        let slot = {
            let slots = self.slots.lock().expect("slot map lock");
            slots.get(key).cloned()
        };
        if let Some(slot) = slot {
            let mut state = slot.state.lock().await;
            state.health = HealthStatus::Healthy;
            state.last_health_check = Some(Instant::now());
        }
    }
}

/// Shallow wire-shape check: only primitive scalars (or arrays of them)
/// may reach the gateway.
fn validate_wire_params(params: &[Value]) -> Result<(), GatewayError> {
    fn ok_scalar(v: &Value) -> bool {
        matches!(
            v,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }
    for (index, value) in params.iter().enumerate() {
        let ok = match value {
            v if ok_scalar(v) => true,
            Value::Array(items) => items.iter().all(ok_scalar),
            _ => false,
        };
        if !ok {
            return Err(GatewayError::InvalidWireValue(format!(
                "parameter at position {index} has unsupported shape"
            )));
        }
    }
    Ok(())
}
