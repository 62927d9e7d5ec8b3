//! Config source resolution and multi-file loading.
//!
//! A [`ConfigSource`] names where configuration comes from: a single file, a
//! directory scanned recursively for YAML, or an explicit glob. Sources are
//! resolved to concrete paths, each file is parsed and validated on its own,
//! and the surviving documents are merged in declared order.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::{merge_documents, MergeOptions};

/// Kind of a configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
    Glob,
}

/// One declared configuration source.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub kind: SourceKind,
    pub path: String,
    /// Base directory for relative glob expansion.
    pub base_dir: Option<PathBuf>,
    /// Whether resolving to nothing is an error.
    pub required: bool,
}

impl ConfigSource {
    /// A single-file source.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::File,
            path: path.into(),
            base_dir: None,
            required: true,
        }
    }

    /// A directory source, scanned recursively for `*.yaml` / `*.yml`.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Directory,
            path: path.into(),
            base_dir: None,
            required: true,
        }
    }

    /// An explicit glob source.
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Glob,
            path: pattern.into(),
            base_dir: None,
            required: true,
        }
    }

    /// Infer the kind from the path shape: glob metacharacters win, then an
    /// existing directory, otherwise a file.
    pub fn auto(path: impl Into<String>) -> Self {
        let path = path.into();
        let kind = if path.contains(['*', '?', '[']) {
            SourceKind::Glob
        } else if Path::new(&path).is_dir() {
            SourceKind::Directory
        } else {
            SourceKind::File
        };
        Self {
            kind,
            path,
            base_dir: None,
            required: true,
        }
    }

    /// Mark this source optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the base directory for relative glob expansion.
    pub fn with_base_dir(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base.into());
        self
    }

    /// Resolve to concrete file paths, in a stable order.
    pub fn resolve(&self) -> Result<Vec<PathBuf>, ConfigError> {
        match self.kind {
            SourceKind::File => {
                let path = PathBuf::from(&self.path);
                if path.is_file() {
                    Ok(vec![path])
                } else if self.required {
                    Err(ConfigError::EmptySource {
                        pattern: self.path.clone(),
                    })
                } else {
                    warn!(path = %self.path, "optional config file not found, skipping");
                    Ok(Vec::new())
                }
            }
            SourceKind::Directory => {
                let mut paths = Vec::new();
                for ext in ["yaml", "yml"] {
                    let pattern = format!("{}/**/*.{ext}", self.path.trim_end_matches('/'));
                    paths.extend(expand_glob(&pattern)?);
                }
                paths.sort();
                if paths.is_empty() && self.required {
                    return Err(ConfigError::EmptySource {
                        pattern: self.path.clone(),
                    });
                }
                Ok(paths)
            }
            SourceKind::Glob => {
                let pattern = match &self.base_dir {
                    Some(base) if !Path::new(&self.path).is_absolute() => {
                        base.join(&self.path).to_string_lossy().into_owned()
                    }
                    _ => self.path.clone(),
                };
                let mut paths = expand_glob(&pattern)?;
                paths.sort();
                if paths.is_empty() && self.required {
                    return Err(ConfigError::EmptySource {
                        pattern: self.path.clone(),
                    });
                }
                Ok(paths)
            }
        }
    }
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = glob::glob(pattern).map_err(|e| ConfigError::BadPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => warn!(pattern, error = %e, "unreadable path while expanding glob"),
        }
    }
    Ok(paths)
}

/// One collected load problem, tied to its file when known.
#[derive(Debug, Clone, Serialize)]
pub struct LoadError {
    pub file: Option<PathBuf>,
    pub message: String,
}

/// Counters reported after a load.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LoadStats {
    /// Files successfully parsed.
    pub sources_loaded: usize,
    /// Documents merged into the final config.
    pub sources_merged: usize,
    pub tools_total: usize,
    pub toolsets_total: usize,
    pub sources_total: usize,
}

/// Result of loading and merging a set of config sources.
#[derive(Debug)]
pub struct LoadOutcome {
    /// True when a validated config was produced and no errors were
    /// collected along the way.
    pub success: bool,
    pub config: Option<Config>,
    pub stats: LoadStats,
    pub resolved_paths: Vec<PathBuf>,
    pub errors: Vec<LoadError>,
}

/// Resolve, parse, merge and validate the given sources.
pub fn load(sources: &[ConfigSource], options: &MergeOptions) -> LoadOutcome {
    let mut errors = Vec::new();
    let mut resolved = Vec::new();
    let mut seen = BTreeSet::new();

    for source in sources {
        match source.resolve() {
            Ok(paths) => {
                for path in paths {
                    // Overlapping sources can resolve the same file twice;
                    // first occurrence wins so merge order stays declared.
                    if seen.insert(path.clone()) {
                        resolved.push(path);
                    }
                }
            }
            Err(e) => errors.push(LoadError {
                file: None,
                message: e.to_string(),
            }),
        }
    }

    let mut documents = Vec::new();
    for path in &resolved {
        match std::fs::read_to_string(path) {
            Ok(content) => match Config::from_yaml(&content) {
                Ok(doc) => documents.push((path.clone(), doc)),
                Err(e) => {
                    let location = e
                        .location()
                        .map(|l| format!(" at line {}, column {}", l.line(), l.column()))
                        .unwrap_or_default();
                    errors.push(LoadError {
                        file: Some(path.clone()),
                        message: format!("YAML parse error{location}: {e}"),
                    });
                }
            },
            Err(e) => errors.push(LoadError {
                file: Some(path.clone()),
                message: format!("IO error: {e}"),
            }),
        }
    }

    let sources_loaded = documents.len();
    let sources_merged = documents.len();

    let config = match merge_documents(documents, options) {
        Ok(config) => {
            if options.validate_merged {
                match config.validate() {
                    Ok(()) => Some(config),
                    Err(e) => {
                        errors.push(LoadError {
                            file: None,
                            message: e.to_string(),
                        });
                        None
                    }
                }
            } else {
                Some(config)
            }
        }
        Err(e) => {
            errors.push(LoadError {
                file: None,
                message: e.to_string(),
            });
            None
        }
    };

    let stats = match &config {
        Some(c) => LoadStats {
            sources_loaded,
            sources_merged,
            tools_total: c.tools.len(),
            toolsets_total: c.toolsets.len(),
            sources_total: c.sources.len(),
        },
        None => LoadStats {
            sources_loaded,
            sources_merged: 0,
            ..Default::default()
        },
    };

    LoadOutcome {
        success: config.is_some() && errors.is_empty(),
        config,
        stats,
        resolved_paths: resolved,
        errors,
    }
}
