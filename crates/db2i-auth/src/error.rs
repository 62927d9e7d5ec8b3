//! Authentication errors.
//!
//! Deliberately terse: nothing in these variants may carry key bytes,
//! decrypted credentials or ciphertext fragments.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown handshake key id.
    #[error("unknown key id '{0}'")]
    UnknownKeyId(String),

    /// Malformed handshake payload (bad base64, wrong field sizes).
    #[error("invalid handshake payload: {0}")]
    InvalidPayload(String),

    /// RSA unwrap or AES-GCM decryption failed (including tag mismatch).
    #[error("credential decryption failed")]
    Decrypt,

    /// Credentials did not authenticate against the database.
    #[error("authentication failed")]
    CredentialsRejected,

    /// The session cap is reached.
    #[error("maximum concurrent sessions reached")]
    SessionLimit,

    /// The bearer token is unknown or expired.
    #[error("invalid or expired access token")]
    InvalidToken,

    /// Key loading or generation failed.
    #[error("key error: {0}")]
    Key(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
