//! In-process fake gateway for server end-to-end tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

pub struct FakeGateway {
    pub addr: SocketAddr,
    /// Accepted pool connections.
    pub connects: Arc<AtomicUsize>,
    /// Execute frames served.
    pub executes: Arc<AtomicUsize>,
    /// Fetch-more frames served.
    pub fetches: Arc<AtomicUsize>,
}

impl FakeGateway {
    /// Every execute answers one row `{"X": 1}` with `isDone: true`.
    pub async fn spawn() -> FakeGateway {
        Self::spawn_paged(0).await
    }

    /// Accepts connections and answers `connect`, but never responds to
    /// `execute`. Lets tests hold a call in flight indefinitely.
    pub async fn spawn_unresponsive() -> FakeGateway {
        Self::spawn_inner(0, true).await
    }

    /// Cursors need `pages` fetch-more rounds (one row each) before
    /// reporting done.
    pub async fn spawn_paged(pages: usize) -> FakeGateway {
        Self::spawn_inner(pages, false).await
    }

    async fn spawn_inner(pages: usize, swallow_execute: bool) -> FakeGateway {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let executes = Arc::new(AtomicUsize::new(0));
        let fetches = Arc::new(AtomicUsize::new(0));

        let connects_task = connects.clone();
        let executes_task = executes.clone();
        let fetches_task = fetches.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                connects_task.fetch_add(1, Ordering::SeqCst);
                let executes = executes_task.clone();
                let fetches = fetches_task.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let mut fetches_left = pages;
                    while let Some(Ok(Message::Text(text))) = ws.next().await {
                        let frame: Value = serde_json::from_str(&text).unwrap();
                        let id = frame["id"].as_str().unwrap().to_string();
                        let response = match frame["type"].as_str().unwrap() {
                            "connect" => json!({
                                "id": id,
                                "success": true,
                                "jobId": "999999/QUSER/QZDASOINIT",
                            }),
                            "execute" => {
                                executes.fetch_add(1, Ordering::SeqCst);
                                if swallow_execute {
                                    continue;
                                }
                                json!({
                                    "id": id,
                                    "success": true,
                                    "data": [{"X": 1}],
                                    "columns": [{"name": "X", "type": "INTEGER"}],
                                    "isDone": pages == 0,
                                    "sqlRc": 0,
                                    "executionTime": 2,
                                })
                            }
                            "sqlmore" => {
                                fetches.fetch_add(1, Ordering::SeqCst);
                                fetches_left = fetches_left.saturating_sub(1);
                                json!({
                                    "id": id,
                                    "success": true,
                                    "data": [{"X": 1}],
                                    "isDone": fetches_left == 0,
                                    "sqlRc": 0,
                                })
                            }
                            "sqlclose" => json!({ "id": id, "success": true }),
                            _ => json!({ "id": id, "success": false, "error": "unknown" }),
                        };
                        if ws.send(Message::Text(response.to_string())).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        FakeGateway {
            addr,
            connects,
            executes,
            fetches,
        }
    }
}
