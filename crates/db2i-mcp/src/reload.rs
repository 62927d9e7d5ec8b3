//! Hot reload of the YAML configuration.
//!
//! A filesystem watcher observes the directories of the resolved config
//! files. Event bursts are debounced, the original source list is reloaded
//! and revalidated, and only a fully valid result swaps the registry. A
//! broken edit leaves the previous registry serving; in-flight calls are
//! never affected either way.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, warn};

use db2i_core::loader;
use db2i_gateway::PoolKey;

use crate::error::McpError;
use crate::registry::{build_registry, RegistryOptions};
use crate::server::McpServer;

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Running watcher; dropping it (or calling [`stop`](ReloadWatcher::stop))
/// ends observation.
pub struct ReloadWatcher {
    _watcher: RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl ReloadWatcher {
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Start watching the server's resolved config files.
pub fn spawn(server: Arc<McpServer>) -> Result<ReloadWatcher, McpError> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
        match result {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => warn!(error = %e, "config watch error"),
        }
    })
    .map_err(|e| McpError::Internal(format!("watcher: {e}")))?;

    let watch_dirs: BTreeSet<PathBuf> = {
        let resolved = server
            .state()
            .resolved_paths
            .lock()
            .expect("resolved paths lock");
        resolved
            .iter()
            .filter_map(|p| p.parent().map(PathBuf::from))
            .collect()
    };
    if watch_dirs.is_empty() {
        return Err(McpError::Configuration(
            "auto reload enabled but no config files were resolved".into(),
        ));
    }
    for dir in &watch_dirs {
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|e| McpError::Internal(format!("watch {}: {e}", dir.display())))?;
    }
    info!(directories = watch_dirs.len(), "config watcher started");

    let task = tokio::spawn(watch_loop(server, rx));
    Ok(ReloadWatcher {
        _watcher: watcher,
        task,
    })
}

async fn watch_loop(server: Arc<McpServer>, mut rx: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = rx.recv().await {
        if !is_relevant(&event) {
            continue;
        }
        // Editors fire bursts (write, rename, chmod); settle first.
        loop {
            match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
        reload(&server).await;
    }
}

fn is_relevant(event: &Event) -> bool {
    let yaml = event.paths.iter().any(|path| {
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false);
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);
        is_yaml && !hidden
    });
    yaml && matches!(
        event.kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Remove(RemoveKind::File)
    )
}

/// Reload the configuration once. Returns `true` when a new registry was
/// swapped in.
pub async fn reload(server: &Arc<McpServer>) -> bool {
    let state = server.state();

    let outcome = loader::load(&state.sources, &state.settings.merge);
    if !outcome.success {
        for error in &outcome.errors {
            warn!(
                file = ?error.file,
                error = %error.message,
                "config reload rejected, keeping previous registry"
            );
        }
        return false;
    }
    let new_config = outcome.config.expect("successful load carries a config");

    let options = RegistryOptions {
        selected_toolsets: state.settings.selected_toolsets.clone(),
        execute_sql_source: state
            .settings
            .execute_sql_enabled
            .then(|| "default".to_string()),
    };
    let new_registry = match build_registry(&new_config, &options) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "registry rebuild failed, keeping previous registry");
            return false;
        }
    };

    // Pools survive reload unless a source's connection parameters changed;
    // dropping the manager entry lets in-flight calls finish on the old
    // connection while new calls lazily open a replacement.
    let old_config = state.config_snapshot();
    let pools = state.dispatcher.pools();
    for (name, old_source) in &old_config.sources {
        let changed = match new_config.sources.get(name) {
            Some(new_source) => old_source.connection_changed(new_source),
            None => true,
        };
        if changed {
            info!(source = %name, "source connection changed, retiring its pool");
            pools.close_pool(&PoolKey::Source(name.clone())).await;
        }
    }

    *state.resolved_paths.lock().expect("resolved paths lock") = outcome.resolved_paths;
    state.swap(Arc::new(new_config), Arc::new(new_registry));
    info!(
        tools = state.registry_snapshot().len(),
        "configuration reloaded"
    );
    true
}
