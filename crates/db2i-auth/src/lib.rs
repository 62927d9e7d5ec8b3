//! # db2i-auth
//!
//! Credential handshake and token sessions for the Db2 for i MCP server.
//!
//! Clients that bring their own database credentials encrypt them with a
//! fresh 256-bit AES-GCM key, wrap that key with the server's RSA public
//! key (OAEP/SHA-256), and POST the bundle to the auth endpoint. The server
//! unwraps, decrypts, verifies the credentials by opening a gateway pool,
//! and mints an opaque bearer token.
//!
//! Tokens are random bytes with no embedded identity: every request resolves
//! its token against the in-memory [`SessionStore`], and expired sessions
//! are swept periodically so their pools can be torn down.
//!
//! Decrypted credentials are held in memory for the life of the session and
//! never logged; error values from this crate carry no credential material.

pub mod error;
pub mod handshake;
pub mod keys;
pub mod session;

pub use error::AuthError;
pub use handshake::{
    decrypt_credentials, encrypt_credentials, generate_token, ClientCredentials, HandshakePayload,
};
pub use keys::{KeyPair, KeyRing};
pub use session::{SessionStore, TokenRecord};
