//! Per-request context and cancellation.
//!
//! A [`RequestContext`] is created by the dispatcher for every inbound
//! operation and passed by value down the pipeline. It carries correlation
//! ids for logging and a cancellation token the lower layers poll at their
//! suspension points. There is no ambient task-local state; everything a
//! layer needs travels in this struct.

use tokio::sync::watch;
use uuid::Uuid;

/// Immutable per-request metadata.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Fresh id for this request.
    pub request_id: String,
    /// Id of the enclosing transport context, when one exists.
    pub parent_id: Option<String>,
    /// Operation label, e.g. `tool:system_status` or `resources/read`.
    pub operation: String,
    /// Tool name for `tools/call` operations.
    pub tool: Option<String>,
    /// Cancellation signal for this request.
    pub cancel: CancelToken,
}

impl RequestContext {
    /// Create a root context for the given operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            parent_id: None,
            operation: operation.into(),
            tool: None,
            cancel: CancelToken::never(),
        }
    }

    /// Create a context for a tool call underneath a transport context.
    pub fn for_tool(tool: impl Into<String>, parent_id: Option<String>) -> Self {
        let tool = tool.into();
        Self {
            request_id: Uuid::new_v4().to_string(),
            parent_id,
            operation: format!("tool:{tool}"),
            tool: Some(tool),
            cancel: CancelToken::never(),
        }
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Owner side of a cancellation signal.
///
/// Dropping the handle does *not* cancel; cancellation is an explicit act of
/// the transport when the client goes away.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a linked handle/token pair.
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// Fire the cancellation signal. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observer side of a cancellation signal, cloneable into every layer.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that can never fire. Used for contexts without a transport
    /// cancellation source (stdio, internal probes).
    pub fn never() -> Self {
        // One shared channel whose sender lives for the process; clones are
        // cheap and the signal stays permanently false.
        static NEVER: std::sync::OnceLock<(watch::Sender<bool>, watch::Receiver<bool>)> =
            std::sync::OnceLock::new();
        let (_, rx) = NEVER.get_or_init(|| watch::channel(false));
        CancelToken { rx: rx.clone() }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancellation is requested. Pends forever if the handle
    /// is dropped without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}
