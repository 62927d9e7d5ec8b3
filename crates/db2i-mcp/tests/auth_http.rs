//! Credential handshake over the HTTP surface.

mod common;

use common::FakeGateway;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use db2i_auth::{encrypt_credentials, ClientCredentials, KeyPair};
use db2i_core::config::{Config, SourceSpec};
use db2i_core::settings::{AuthMode, Settings};
use db2i_mcp::http_transport::router;
use db2i_mcp::McpServer;

struct Harness {
    app: axum::Router,
    _keys: TempDir,
}

fn sample_config(gateway: &FakeGateway) -> Config {
    Config::from_yaml(&format!(
        r#"
sources:
  default:
    host: 127.0.0.1
    port: {port}
    user: TESTER
    password: pw
    secure: false
tools:
  system_status:
    source: default
    statement: SELECT 1 AS X FROM SYSIBM.SYSDUMMY1
"#,
        port = gateway.addr.port()
    ))
    .unwrap()
}

fn harness(gateway: &FakeGateway, expiry_seconds: u64, allow_http: bool) -> Harness {
    let keys = TempDir::new().unwrap();
    let private_path = keys.path().join("auth.pem");
    let public_path = keys.path().join("auth.pub.pem");
    KeyPair::generate("test-key")
        .unwrap()
        .save_to_files(&private_path, &public_path)
        .unwrap();

    let settings = Settings {
        auth_mode: AuthMode::Ibmi,
        http_auth_enabled: true,
        auth_allow_http: allow_http,
        token_expiry_seconds: expiry_seconds,
        private_key_path: Some(private_path),
        public_key_path: Some(public_path),
        key_id: Some("test-key".into()),
        static_source: Some(SourceSpec {
            host: gateway.addr.ip().to_string(),
            user: "TESTER".into(),
            password: Some("pw".into()),
            password_env: None,
            port: gateway.addr.port(),
            secure: false,
            ignore_unauthorized: true,
        }),
        ..Default::default()
    };

    let server = Arc::new(
        McpServer::new(settings, sample_config(gateway), Vec::new(), Vec::new()).unwrap(),
    );
    Harness {
        app: router(server),
        _keys: keys,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn fetch_public_key(app: &axum::Router) -> (String, RsaPublicKey) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/public-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let key_id = body["keyId"].as_str().unwrap().to_string();
    let pem = body["publicKey"].as_str().unwrap();
    (key_id, RsaPublicKey::from_public_key_pem(pem).unwrap())
}

async fn post_handshake(app: &axum::Router, payload: &Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn call_with_token(app: &axum::Router, token: Option<&str>) -> Value {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder
        .body(Body::from(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "system_status", "arguments": {}},
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["result"].clone()
}

fn client_credentials() -> ClientCredentials {
    ClientCredentials {
        host: None,
        port: None,
        user: "ALICE".into(),
        password: "alice-pw".into(),
    }
}

#[tokio::test]
async fn full_token_handshake_flow() {
    let gateway = FakeGateway::spawn().await;
    let h = harness(&gateway, 3600, true);

    let (key_id, public) = fetch_public_key(&h.app).await;
    assert_eq!(key_id, "test-key");

    let payload = encrypt_credentials(&key_id, &public, &client_credentials()).unwrap();
    let response = post_handshake(&h.app, &serde_json::to_value(&payload).unwrap()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    let token = body["access_token"].as_str().unwrap().to_string();
    // Opaque token: no credential material embedded.
    assert!(!token.contains("ALICE"));

    // Authenticated call succeeds on the per-token pool.
    let result = call_with_token(&h.app, Some(&token)).await;
    assert_eq!(result["structuredContent"]["success"], true);

    // Missing token is refused.
    let anonymous = call_with_token(&h.app, None).await;
    assert_eq!(anonymous["isError"], true);
    assert_eq!(
        anonymous["structuredContent"]["errorCode"],
        "AUTHENTICATION_ERROR"
    );

    // Bogus token is refused.
    let forged = call_with_token(&h.app, Some("not-a-real-token")).await;
    assert_eq!(
        forged["structuredContent"]["errorCode"],
        "AUTHENTICATION_ERROR"
    );
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let gateway = FakeGateway::spawn().await;
    let h = harness(&gateway, 0, true);

    let (key_id, public) = fetch_public_key(&h.app).await;
    let payload = encrypt_credentials(&key_id, &public, &client_credentials()).unwrap();
    let response = post_handshake(&h.app, &serde_json::to_value(&payload).unwrap()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let result = call_with_token(&h.app, Some(&token)).await;
    assert_eq!(result["isError"], true);
    assert_eq!(
        result["structuredContent"]["errorCode"],
        "AUTHENTICATION_ERROR"
    );
}

#[tokio::test]
async fn handshake_refused_over_plain_http_by_default() {
    let gateway = FakeGateway::spawn().await;
    let h = harness(&gateway, 3600, false);

    let (key_id, public) = fetch_public_key(&h.app).await;
    let payload = encrypt_credentials(&key_id, &public, &client_credentials()).unwrap();
    let response = post_handshake(&h.app, &serde_json::to_value(&payload).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["errorCode"], "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn tampered_handshake_is_refused_without_detail() {
    let gateway = FakeGateway::spawn().await;
    let h = harness(&gateway, 3600, true);

    let (key_id, public) = fetch_public_key(&h.app).await;
    let mut payload =
        serde_json::to_value(encrypt_credentials(&key_id, &public, &client_credentials()).unwrap())
            .unwrap();
    // Flip the tag; GCM must refuse.
    payload["authTag"] = json!("AAAAAAAAAAAAAAAAAAAAAA==");

    let response = post_handshake(&h.app, &payload).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    // No credential fragments in the error body.
    let text = body.to_string();
    assert!(!text.contains("alice-pw"));
    assert!(!text.contains("ALICE"));
}
