//! The RSA-wrapped AES-GCM credential handshake.
//!
//! Wire layout, all fields base64:
//!
//! - `encryptedSessionKey`: 256-bit AES key wrapped with RSA-OAEP/SHA-256
//! - `iv`: 12-byte GCM nonce
//! - `authTag`: 16-byte GCM tag
//! - `ciphertext`: encrypted credential JSON `{host?, port?, user, password}`

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD};
use base64::Engine as _;
use rand::RngCore;
use rsa::{Oaep, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AuthError;
use crate::keys::KeyRing;

const SESSION_KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const TOKEN_LEN: usize = 32;

/// Encrypted handshake body as POSTed by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePayload {
    pub key_id: String,
    pub encrypted_session_key: String,
    pub iv: String,
    pub auth_tag: String,
    pub ciphertext: String,
}

/// Decrypted client credentials. Host and port fall back to the configured
/// static source when absent.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientCredentials {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
}

// Credentials must never leak through Debug-formatted logs or errors.
impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Decrypt a handshake payload against the key ring.
pub fn decrypt_credentials(
    ring: &KeyRing,
    payload: &HandshakePayload,
) -> Result<ClientCredentials, AuthError> {
    let key = ring.get(&payload.key_id)?;

    let wrapped = decode_field(&payload.encrypted_session_key, "encryptedSessionKey")?;
    let iv = decode_field(&payload.iv, "iv")?;
    let tag = decode_field(&payload.auth_tag, "authTag")?;
    let ciphertext = decode_field(&payload.ciphertext, "ciphertext")?;

    if iv.len() != IV_LEN {
        return Err(AuthError::InvalidPayload(format!(
            "iv must be {IV_LEN} bytes, got {}",
            iv.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(AuthError::InvalidPayload(format!(
            "authTag must be {TAG_LEN} bytes, got {}",
            tag.len()
        )));
    }

    let session_key = key.unwrap_session_key(&wrapped)?;
    if session_key.len() != SESSION_KEY_LEN {
        return Err(AuthError::Decrypt);
    }

    let cipher = Aes256Gcm::new_from_slice(&session_key).map_err(|_| AuthError::Decrypt)?;
    let nonce = Nonce::from_slice(&iv);

    // AES-GCM wants ciphertext || tag.
    let mut combined = ciphertext;
    combined.extend_from_slice(&tag);

    let plaintext = cipher
        .decrypt(nonce, combined.as_ref())
        .map_err(|_| AuthError::Decrypt)?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| AuthError::InvalidPayload(format!("credential JSON: {e}")))
}

/// Encrypt credentials for a given public key. This is the client side of
/// the handshake, used by tooling and tests.
pub fn encrypt_credentials(
    key_id: &str,
    public: &RsaPublicKey,
    creds: &ClientCredentials,
) -> Result<HandshakePayload, AuthError> {
    let mut rng = rand::thread_rng();

    let mut session_key = [0u8; SESSION_KEY_LEN];
    rng.fill_bytes(&mut session_key);
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let plaintext = serde_json::to_vec(creds).map_err(|e| AuthError::Key(e.to_string()))?;

    let cipher = Aes256Gcm::new_from_slice(&session_key).map_err(|_| AuthError::Decrypt)?;
    let nonce = Nonce::from_slice(&iv);
    let sealed = cipher
        .encrypt(nonce, plaintext.as_ref())
        .map_err(|_| AuthError::Decrypt)?;

    // The tag is the trailing 16 bytes.
    let split = sealed.len() - TAG_LEN;
    let (ciphertext, tag) = sealed.split_at(split);

    let wrapped = public
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &session_key)
        .map_err(|e| AuthError::Key(e.to_string()))?;

    Ok(HandshakePayload {
        key_id: key_id.to_string(),
        encrypted_session_key: BASE64.encode(wrapped),
        iv: BASE64.encode(iv),
        auth_tag: BASE64.encode(tag),
        ciphertext: BASE64.encode(ciphertext),
    })
}

/// Generate an opaque 256-bit bearer token, URL-safe base64.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>, AuthError> {
    BASE64
        .decode(value)
        .map_err(|_| AuthError::InvalidPayload(format!("{field} is not valid base64")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyPair, KeyRing};
    use std::sync::OnceLock;

    fn ring() -> &'static KeyRing {
        static RING: OnceLock<KeyRing> = OnceLock::new();
        RING.get_or_init(|| KeyRing::new(KeyPair::generate("hs-key").unwrap()))
    }

    fn creds() -> ClientCredentials {
        ClientCredentials {
            host: None,
            port: None,
            user: "ALICE".into(),
            password: "s3cret!".into(),
        }
    }

    #[test]
    fn handshake_roundtrip() {
        let ring = ring();
        let payload =
            encrypt_credentials("hs-key", ring.active().public_key(), &creds()).unwrap();
        let decrypted = decrypt_credentials(ring, &payload).unwrap();
        assert_eq!(decrypted.user, "ALICE");
        assert_eq!(decrypted.password, "s3cret!");
        assert!(decrypted.host.is_none());
    }

    #[test]
    fn unknown_key_id_rejected() {
        let ring = ring();
        let mut payload =
            encrypt_credentials("hs-key", ring.active().public_key(), &creds()).unwrap();
        payload.key_id = "retired-key".into();
        let err = decrypt_credentials(ring, &payload).unwrap_err();
        assert!(matches!(err, AuthError::UnknownKeyId(_)));
    }

    #[test]
    fn tampered_tag_rejected() {
        let ring = ring();
        let mut payload =
            encrypt_credentials("hs-key", ring.active().public_key(), &creds()).unwrap();
        let mut tag = BASE64.decode(&payload.auth_tag).unwrap();
        tag[0] ^= 0xff;
        payload.auth_tag = BASE64.encode(tag);
        let err = decrypt_credentials(ring, &payload).unwrap_err();
        assert!(matches!(err, AuthError::Decrypt));
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let ring = ring();
        let mut payload =
            encrypt_credentials("hs-key", ring.active().public_key(), &creds()).unwrap();
        let mut ct = BASE64.decode(&payload.ciphertext).unwrap();
        if let Some(byte) = ct.first_mut() {
            *byte ^= 0xff;
        }
        payload.ciphertext = BASE64.encode(ct);
        assert!(matches!(
            decrypt_credentials(ring, &payload).unwrap_err(),
            AuthError::Decrypt
        ));
    }

    #[test]
    fn bad_base64_rejected_with_field_name() {
        let ring = ring();
        let mut payload =
            encrypt_credentials("hs-key", ring.active().public_key(), &creds()).unwrap();
        payload.iv = "!!!not base64!!!".into();
        match decrypt_credentials(ring, &payload).unwrap_err() {
            AuthError::InvalidPayload(msg) => assert!(msg.contains("iv")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_iv_size_rejected() {
        let ring = ring();
        let mut payload =
            encrypt_credentials("hs-key", ring.active().public_key(), &creds()).unwrap();
        payload.iv = BASE64.encode([0u8; 16]);
        assert!(matches!(
            decrypt_credentials(ring, &payload).unwrap_err(),
            AuthError::InvalidPayload(_)
        ));
    }

    #[test]
    fn tokens_are_opaque_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        // 32 bytes, URL-safe base64 without padding.
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
    }

    #[test]
    fn debug_format_redacts_password() {
        let shown = format!("{:?}", creds());
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("<redacted>"));
    }
}
