//! WebSocket/JSON protocol client.
//!
//! One [`GatewayClient`] owns one WebSocket connection to the database
//! gateway, which in turn owns a pool of server jobs. Requests carry a
//! client-assigned id; a background reader task routes response frames back
//! to the waiting caller. The client performs no retries: any transport or
//! protocol failure surfaces as a [`GatewayError`] and the connection is
//! considered dead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::types::{ConnectionCreds, QueryResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, GatewayError>>>>>;

/// Default starting/maximum pool sizes requested from the gateway.
pub const DEFAULT_STARTING_SIZE: u32 = 1;
pub const DEFAULT_MAX_SIZE: u32 = 5;

/// Fetch the gateway's TLS certificate, accepting whatever it presents.
///
/// Used to pin the gateway root when a source has certificate verification
/// enabled: the certificate retrieved here is installed as the sole trust
/// root for the subsequent pool connection.
pub async fn fetch_root_certificate(host: &str, port: u16) -> Result<Vec<u8>, GatewayError> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| GatewayError::Tls(e.to_string()))?;
    let connector = tokio_native_tls::TlsConnector::from(connector);

    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(GatewayError::transport)?;
    let tls = connector
        .connect(host, tcp)
        .await
        .map_err(|e| GatewayError::Tls(e.to_string()))?;

    let cert = tls
        .get_ref()
        .peer_certificate()
        .map_err(|e| GatewayError::Tls(e.to_string()))?
        .ok_or_else(|| GatewayError::Tls("gateway presented no certificate".into()))?;
    cert.to_der().map_err(|e| GatewayError::Tls(e.to_string()))
}

/// One open gateway pool.
pub struct GatewayClient {
    writer: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    job_id: Mutex<Option<String>>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient").finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Connect to the gateway and open a pool of `starting_size..max_size`
    /// server jobs.
    ///
    /// `root_certificate` is the DER-encoded trust root to verify against;
    /// `None` with `ignore_unauthorized` unset uses the system roots.
    pub async fn open(
        creds: &ConnectionCreds,
        starting_size: u32,
        max_size: u32,
        root_certificate: Option<&[u8]>,
    ) -> Result<Self, GatewayError> {
        let mut request = creds
            .endpoint()
            .into_client_request()
            .map_err(GatewayError::transport)?;
        let basic = BASE64.encode(format!("{}:{}", creds.user, creds.password));
        request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {basic}"))
                .map_err(GatewayError::transport)?,
        );

        let connector = if creds.secure {
            let mut builder = native_tls::TlsConnector::builder();
            if creds.ignore_unauthorized {
                builder.danger_accept_invalid_certs(true);
            } else if let Some(der) = root_certificate {
                let cert = native_tls::Certificate::from_der(der)
                    .map_err(|e| GatewayError::Tls(e.to_string()))?;
                builder.disable_built_in_roots(true);
                builder.add_root_certificate(cert);
            }
            let tls = builder
                .build()
                .map_err(|e| GatewayError::Tls(e.to_string()))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let (stream, _response) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(GatewayError::transport)?;

        let (writer, reader) = stream.split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader_task = tokio::spawn(read_loop(reader, pending.clone(), closed.clone()));

        let client = Self {
            writer: tokio::sync::Mutex::new(writer),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            reader: reader_task,
            job_id: Mutex::new(None),
        };

        // The connect frame authenticates the credentials against the
        // database and sizes the server-side job pool.
        let response = client
            .call(json!({
                "type": "connect",
                "startingSize": starting_size,
                "maxSize": max_size,
            }))
            .await?;
        let result = parse_result(response)?;
        *client.job_id.lock().expect("job id lock") = result.job_id;

        Ok(client)
    }

    /// Job name of the connection on the server, when reported.
    pub fn job_id(&self) -> Option<String> {
        self.job_id.lock().expect("job id lock").clone()
    }

    /// Execute a statement with positional parameters.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, GatewayError> {
        let response = self
            .call(json!({
                "type": "execute",
                "sql": sql,
                "parameters": params,
            }))
            .await?;
        parse_result(response)
    }

    /// Continue an open cursor.
    pub async fn fetch_more(
        &self,
        query_id: &str,
        fetch_size: usize,
    ) -> Result<QueryResult, GatewayError> {
        let response = self
            .call(json!({
                "type": "sqlmore",
                "queryId": query_id,
                "rows": fetch_size,
            }))
            .await?;
        parse_result(response)
    }

    /// Close an open cursor. Best-effort; a dead connection is not an error
    /// here because the server reaps cursors with it.
    pub async fn close_query(&self, query_id: &str) -> Result<(), GatewayError> {
        match self
            .call(json!({ "type": "sqlclose", "queryId": query_id }))
            .await
        {
            Ok(_) => Ok(()),
            Err(GatewayError::Transport(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Close the pool and the underlying connection. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut writer = self.writer.lock().await;
        let _ = writer.send(Message::Close(None)).await;
        self.reader.abort();
        fail_all_pending(&self.pending, "connection closed");
    }

    /// Send one frame and wait for its correlated response.
    async fn call(&self, mut payload: Value) -> Result<Value, GatewayError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection closed".into()));
        }

        let id = format!("q{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        payload["id"] = Value::from(id.clone());

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending lock")
            .insert(id.clone(), tx);

        let frame = serde_json::to_string(&payload).map_err(GatewayError::transport)?;
        debug!(request_id = %id, "gateway request");
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.send(Message::Text(frame)).await {
                self.pending.lock().expect("pending lock").remove(&id);
                return Err(GatewayError::transport(e));
            }
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Transport(
                "connection closed before response".into(),
            )),
        }
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(mut reader: SplitStream<WsStream>, pending: Pending, closed: Arc<AtomicBool>) {
    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => route_frame(&pending, &text),
            Ok(Message::Binary(bytes)) => {
                if let Ok(text) = String::from_utf8(bytes) {
                    route_frame(&pending, &text);
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "gateway read error");
                break;
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    fail_all_pending(&pending, "gateway connection lost");
}

fn route_frame(pending: &Pending, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "unparseable gateway frame");
            return;
        }
    };
    let Some(id) = value.get("id").and_then(Value::as_str) else {
        warn!("gateway frame without id");
        return;
    };
    let sender = pending.lock().expect("pending lock").remove(id);
    match sender {
        Some(tx) => {
            let _ = tx.send(Ok(value));
        }
        None => warn!(request_id = %id, "gateway frame for unknown request"),
    }
}

fn fail_all_pending(pending: &Pending, reason: &str) {
    let drained: Vec<_> = pending
        .lock()
        .expect("pending lock")
        .drain()
        .map(|(_, tx)| tx)
        .collect();
    for tx in drained {
        let _ = tx.send(Err(GatewayError::Transport(reason.into())));
    }
}

/// Interpret a response frame: protocol errors become `Database` errors, the
/// rest deserializes into [`QueryResult`].
fn parse_result(frame: Value) -> Result<QueryResult, GatewayError> {
    let success = frame
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !success {
        let message = frame
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("gateway request failed")
            .to_string();
        return Err(GatewayError::Database {
            message,
            sql_rc: frame
                .get("sqlRc")
                .and_then(Value::as_i64)
                .map(|v| v as i32),
            sql_state: frame
                .get("sqlState")
                .and_then(Value::as_str)
                .map(String::from),
        });
    }
    serde_json::from_value(frame).map_err(GatewayError::transport)
}
