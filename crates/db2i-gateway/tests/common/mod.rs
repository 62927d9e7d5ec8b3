//! In-process fake gateway for pool tests.
//!
//! Speaks just enough of the WebSocket/JSON protocol to exercise pool
//! initialization, execution, pagination and cursor close.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use db2i_gateway::ConnectionCreds;

pub struct FakeGateway {
    pub addr: SocketAddr,
    /// Number of accepted pool connections.
    pub connects: Arc<AtomicUsize>,
    /// Query ids the client closed.
    pub closed_queries: Arc<Mutex<Vec<String>>>,
}

impl FakeGateway {
    /// Start a fake gateway whose cursors need `pages` fetch-more rounds
    /// before reporting done. `pages == 0` answers every execute with
    /// `isDone: true`.
    pub async fn spawn(pages: usize) -> FakeGateway {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let closed_queries = Arc::new(Mutex::new(Vec::new()));

        let connects_task = connects.clone();
        let closed_task = closed_queries.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                connects_task.fetch_add(1, Ordering::SeqCst);
                let closed = closed_task.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let mut fetches_left = pages;
                    while let Some(Ok(message)) = ws.next().await {
                        let Message::Text(text) = message else {
                            continue;
                        };
                        let frame: Value = serde_json::from_str(&text).unwrap();
                        let id = frame["id"].as_str().unwrap().to_string();
                        let response = match frame["type"].as_str().unwrap() {
                            "connect" => json!({
                                "id": id,
                                "success": true,
                                "jobId": "999999/QUSER/QZDASOINIT",
                            }),
                            "execute" => json!({
                                "id": id,
                                "success": true,
                                "data": [{"X": 1}],
                                "columns": [{"name": "X", "type": "INTEGER"}],
                                "isDone": pages == 0,
                                "sqlRc": 0,
                                "executionTime": 1,
                            }),
                            "sqlmore" => {
                                fetches_left = fetches_left.saturating_sub(1);
                                json!({
                                    "id": id,
                                    "success": true,
                                    "data": [{"X": 1}],
                                    "isDone": fetches_left == 0,
                                    "sqlRc": 0,
                                })
                            }
                            "sqlclose" => {
                                closed
                                    .lock()
                                    .unwrap()
                                    .push(frame["queryId"].as_str().unwrap_or("").to_string());
                                json!({ "id": id, "success": true })
                            }
                            _ => json!({ "id": id, "success": false, "error": "unknown type" }),
                        };
                        if ws
                            .send(Message::Text(response.to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                });
            }
        });

        FakeGateway {
            addr,
            connects,
            closed_queries,
        }
    }

    /// Credentials pointing at this fake, plain `ws://`.
    pub fn creds(&self) -> ConnectionCreds {
        ConnectionCreds {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            user: "TESTER".into(),
            password: "pw".into(),
            secure: false,
            ignore_unauthorized: true,
        }
    }
}
