//! RSA keypair management for the credential handshake.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::AuthError;

const KEY_BITS: usize = 2048;

/// An RSA keypair identified by a key id.
///
/// The key id travels in handshake payloads so the server can rotate keys
/// without breaking clients mid-flight; tokens embed no key material, so
/// rotation never invalidates sessions.
#[derive(Debug)]
pub struct KeyPair {
    key_id: String,
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair.
    pub fn generate(key_id: impl Into<String>) -> Result<Self, AuthError> {
        let mut rng = rand::thread_rng();
        let private =
            RsaPrivateKey::new(&mut rng, KEY_BITS).map_err(|e| AuthError::Key(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self {
            key_id: key_id.into(),
            private,
            public,
        })
    }

    /// Load the private key from a PKCS#8 PEM file; the public key is
    /// derived from it.
    pub fn from_pem_file(key_id: impl Into<String>, path: &Path) -> Result<Self, AuthError> {
        let pem = std::fs::read_to_string(path)?;
        let private = RsaPrivateKey::from_pkcs8_pem(pem.trim())
            .map_err(|e| AuthError::Key(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self {
            key_id: key_id.into(),
            private,
            public,
        })
    }

    /// Persist the keypair as PKCS#8 / SPKI PEM files.
    pub fn save_to_files(
        &self,
        private_path: &Path,
        public_path: &Path,
    ) -> Result<(), AuthError> {
        let private_pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::Key(e.to_string()))?;
        std::fs::write(private_path, private_pem.as_bytes())?;
        std::fs::write(public_path, self.public_key_pem()?)?;
        Ok(())
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// SPKI PEM encoding of the public key, as served to clients.
    pub fn public_key_pem(&self) -> Result<String, AuthError> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::Key(e.to_string()))
    }

    /// Unwrap an RSA-OAEP/SHA-256 wrapped AES session key.
    pub fn unwrap_session_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, AuthError> {
        self.private
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| AuthError::Decrypt)
    }
}

/// Lookup table of keypairs by id, with one active signer for new clients.
pub struct KeyRing {
    keys: HashMap<String, Arc<KeyPair>>,
    active_id: String,
}

impl KeyRing {
    /// Build a ring with one active keypair.
    pub fn new(active: KeyPair) -> Self {
        let active_id = active.key_id().to_string();
        let mut keys = HashMap::new();
        keys.insert(active_id.clone(), Arc::new(active));
        Self { keys, active_id }
    }

    /// Add a retired keypair that outstanding clients may still reference.
    pub fn insert(&mut self, key: KeyPair) {
        self.keys.insert(key.key_id().to_string(), Arc::new(key));
    }

    /// The keypair advertised on the public-key endpoint.
    pub fn active(&self) -> &Arc<KeyPair> {
        self.keys
            .get(&self.active_id)
            .expect("active key is always present")
    }

    /// Resolve a client-supplied key id.
    pub fn get(&self, key_id: &str) -> Result<&Arc<KeyPair>, AuthError> {
        self.keys
            .get(key_id)
            .ok_or_else(|| AuthError::UnknownKeyId(key_id.to_string()))
    }
}
