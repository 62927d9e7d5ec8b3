//! In-memory token session store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::AuthError;
use crate::handshake::{generate_token, ClientCredentials};

/// One authenticated session.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    /// The opaque bearer token; also the pool key for this identity.
    pub token: String,
    /// User profile the session authenticated as.
    pub user: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Decrypted credentials, retained for lazy pool reopening. Never
    /// logged or serialized.
    pub credentials: ClientCredentials,
}

impl TokenRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Token → session map with a hard cap and TTL.
pub struct SessionStore {
    inner: Mutex<HashMap<String, TokenRecord>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl_seconds: u64, max_sessions: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds as i64),
            max_sessions,
        }
    }

    /// TTL applied to new sessions, in seconds.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.num_seconds().max(0) as u64
    }

    /// Mint a token for freshly verified credentials.
    pub fn issue(&self, credentials: ClientCredentials) -> Result<TokenRecord, AuthError> {
        let mut sessions = self.inner.lock().expect("session lock");
        if sessions.len() >= self.max_sessions {
            return Err(AuthError::SessionLimit);
        }

        let now = Utc::now();
        let record = TokenRecord {
            token: generate_token(),
            user: credentials.user.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
            credentials,
        };
        sessions.insert(record.token.clone(), record.clone());
        info!(user = %record.user, sessions = sessions.len(), "session issued");
        Ok(record)
    }

    /// Resolve a bearer token. Expired records are dropped on lookup and
    /// reported as invalid.
    pub fn get(&self, token: &str) -> Result<TokenRecord, AuthError> {
        let mut sessions = self.inner.lock().expect("session lock");
        match sessions.get(token) {
            Some(record) if !record.is_expired() => Ok(record.clone()),
            Some(_) => {
                sessions.remove(token);
                Err(AuthError::InvalidToken)
            }
            None => Err(AuthError::InvalidToken),
        }
    }

    /// Explicit logout. Returns the removed record so the caller can tear
    /// down the associated pool.
    pub fn revoke(&self, token: &str) -> Option<TokenRecord> {
        self.inner.lock().expect("session lock").remove(token)
    }

    /// Drop every expired session and return the removed records for pool
    /// teardown.
    pub fn sweep_expired(&self) -> Vec<TokenRecord> {
        let mut sessions = self.inner.lock().expect("session lock");
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, record)| record.is_expired())
            .map(|(token, _)| token.clone())
            .collect();
        let removed: Vec<TokenRecord> = expired
            .iter()
            .filter_map(|token| sessions.remove(token))
            .collect();
        if !removed.is_empty() {
            info!(count = removed.len(), "expired sessions swept");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
