//! HTTP transport: the `/mcp` endpoint, health, the credential-handshake
//! surface and a CORS allow-list.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    AUTHORIZATION, ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{info, warn};

use db2i_auth::handshake;
use db2i_core::context::CancelToken;
use db2i_core::settings::AuthMode;
use db2i_gateway::{ConnectionCreds, PoolKey};

use crate::error::McpError;
use crate::protocol::{JsonRpcRequest, SERVER_NAME};
use crate::server::McpServer;

/// Serve the HTTP transport until the listener fails.
pub async fn serve(server: Arc<McpServer>) -> Result<(), McpError> {
    let state = server.state().clone();
    let addr = format!("{}:{}", state.settings.http_host, state.settings.http_port);
    let app = router(server);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "MCP server listening on HTTP");
    axum::serve(listener, app)
        .await
        .map_err(|e| McpError::Internal(e.to_string()))
}

/// Build the router. Auth endpoints are mounted only when the handshake
/// surface is enabled.
pub fn router(server: Arc<McpServer>) -> Router {
    let settings = &server.state().settings;

    let mut router = Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(handle_health));

    if settings.auth_mode == AuthMode::Ibmi && settings.http_auth_enabled {
        router = router
            .route("/api/v1/auth/public-key", get(handle_public_key))
            .route("/api/v1/auth", post(handle_auth));
    }

    router
        .layer(middleware::from_fn_with_state(server.clone(), cors))
        .with_state(server)
}

async fn handle_mcp(
    State(server): State<Arc<McpServer>>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let bearer = bearer_token(&headers);
    match server.handle_request(request, bearer.as_deref()).await {
        Some(response) => Json(response).into_response(),
        // Notifications are accepted with no body.
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn handle_health(State(server): State<Arc<McpServer>>) -> Response {
    let registry = server.state().registry_snapshot();
    Json(json!({
        "status": "ok",
        "service": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "tools": registry.len(),
    }))
    .into_response()
}

async fn handle_public_key(State(server): State<Arc<McpServer>>) -> Response {
    let Some(ring) = server.state().key_ring.clone() else {
        return auth_error(StatusCode::NOT_FOUND, "handshake is not enabled");
    };
    let key = ring.active();
    match key.public_key_pem() {
        Ok(pem) => Json(json!({
            "keyId": key.key_id(),
            "publicKey": pem,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "public key encoding failed");
            auth_error(StatusCode::INTERNAL_SERVER_ERROR, "key unavailable")
        }
    }
}

async fn handle_auth(
    State(server): State<Arc<McpServer>>,
    Json(payload): Json<handshake::HandshakePayload>,
) -> Response {
    let state = server.state();

    // Without TLS in front of the server the handshake is refused; the
    // operator opts in explicitly after terminating TLS upstream.
    if !state.settings.auth_allow_http {
        return auth_error(
            StatusCode::UNAUTHORIZED,
            "credential handshake requires TLS (set IBMI_AUTH_ALLOW_HTTP to override)",
        );
    }

    let (Some(ring), Some(sessions)) = (state.key_ring.clone(), state.sessions.clone()) else {
        return auth_error(StatusCode::NOT_FOUND, "handshake is not enabled");
    };

    let credentials = match handshake::decrypt_credentials(&ring, &payload) {
        Ok(c) => c,
        Err(e) => {
            // The taxonomy distinguishes payload shape from crypto failure,
            // but the client sees one generic message either way.
            warn!(error = %e, "handshake decryption failed");
            return auth_error(StatusCode::UNAUTHORIZED, "authentication failed");
        }
    };

    let static_source = state.settings.static_source.clone();
    let host = credentials
        .host
        .clone()
        .or_else(|| static_source.as_ref().map(|s| s.host.clone()));
    let Some(host) = host else {
        return auth_error(StatusCode::UNAUTHORIZED, "authentication failed");
    };
    let creds = ConnectionCreds {
        host,
        port: credentials
            .port
            .or_else(|| static_source.as_ref().map(|s| s.port))
            .unwrap_or(8076),
        user: credentials.user.clone(),
        password: credentials.password.clone(),
        secure: static_source.as_ref().map(|s| s.secure).unwrap_or(true),
        ignore_unauthorized: static_source
            .as_ref()
            .map(|s| s.ignore_unauthorized)
            .unwrap_or(false),
    };

    // Issue first so the session cap is enforced before any gateway work.
    let record = match sessions.issue(credentials) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": e.to_string(),
                    "errorCode": "RESOURCE_EXHAUSTED",
                })),
            )
                .into_response();
        }
    };

    let pools = state.dispatcher.pools();
    let key = PoolKey::Token(record.token.clone());
    if let Err(e) = pools
        .ensure_pool(&key, &creds, &CancelToken::never())
        .await
    {
        sessions.revoke(&record.token);
        warn!(user = %record.user, error = %e, "handshake credential verification failed");
        return auth_error(StatusCode::UNAUTHORIZED, "authentication failed");
    }

    info!(user = %record.user, "session authenticated");
    (
        StatusCode::CREATED,
        Json(json!({
            "access_token": record.token,
            "token_type": "Bearer",
            "expires_in": sessions.ttl_seconds(),
        })),
    )
        .into_response()
}

/// CORS allow-list over the configured origins. With an empty list no CORS
/// headers are emitted at all.
async fn cors(
    State(server): State<Arc<McpServer>>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let allowed = &server.state().settings.allowed_origins;
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let origin_allowed = match &origin {
        Some(o) => allowed.iter().any(|a| a == o),
        None => false,
    };

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if origin_allowed {
            if let Ok(value) = origin.as_deref().unwrap_or("").parse() {
                let headers = response.headers_mut();
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.insert(
                    ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static("GET, POST, OPTIONS"),
                );
                headers.insert(
                    ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static("authorization, content-type"),
                );
            }
        }
        return response;
    }

    let mut response = next.run(request).await;
    if origin_allowed {
        if let Ok(value) = origin.as_deref().unwrap_or("").parse() {
            response
                .headers_mut()
                .insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }
    response
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

fn auth_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": message,
            "errorCode": "AUTHENTICATION_ERROR",
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use db2i_core::config::Config;
    use db2i_core::settings::Settings;
    use tower::ServiceExt;

    fn sample_config() -> Config {
        Config::from_yaml(
            r#"
sources:
  ibmi: { host: h, user: u, password: p }
tools:
  ping:
    source: ibmi
    statement: SELECT 1 FROM SYSIBM.SYSDUMMY1
"#,
        )
        .unwrap()
    }

    fn test_router(settings: Settings) -> Router {
        let server = Arc::new(
            McpServer::new(settings, sample_config(), Vec::new(), Vec::new()).unwrap(),
        );
        router(server)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_tool_count() {
        let app = test_router(Settings::default());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["tools"], 1);
    }

    #[tokio::test]
    async fn mcp_endpoint_routes_requests() {
        let app = test_router(Settings::default());
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"]["tools"][0]["name"], "ping");
    }

    #[tokio::test]
    async fn auth_endpoints_absent_without_ibmi_mode() {
        let app = test_router(Settings::default());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/public-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_headers_only_for_allowed_origins() {
        let settings = Settings {
            allowed_origins: vec!["https://allowed.example".into()],
            ..Default::default()
        };
        let app = test_router(settings);

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "https://allowed.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            allowed
                .headers()
                .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://allowed.example"
        );

        let denied = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(denied.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
