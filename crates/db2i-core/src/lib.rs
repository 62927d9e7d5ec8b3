//! # db2i-core
//!
//! Shared configuration model and loading machinery for the Db2 for i MCP
//! server.
//!
//! This crate owns everything that turns YAML tool configuration into a
//! validated, merged [`Config`]:
//!
//! - **Data model**: [`SourceSpec`], [`ParameterSpec`], [`ToolSpec`],
//!   [`ToolsetSpec`] and the merged [`Config`] root.
//! - **Loader**: resolution of file / directory / glob config sources into
//!   concrete paths, per-file parsing with collected errors.
//! - **Merger**: ordered multi-document merge with duplicate policy and
//!   post-merge referential validation.
//! - **Settings**: the typed environment-variable surface of the server.
//! - **Request context**: the per-request value threaded through every layer
//!   for logging and cancellation.
//!
//! Configuration is data, not code: tools come exclusively from parsed YAML,
//! and the registry downstream is rebuilt from a fresh [`Config`] on every
//! hot reload.

pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod merge;
pub mod settings;

pub use config::{
    AnnotationSpec, Config, ParamType, ParameterSpec, ResponseFormat, ScalarType, SecuritySpec,
    SourceSpec, TableStyle, ToolSpec, ToolsetSpec,
};
pub use context::{CancelHandle, CancelToken, RequestContext};
pub use error::ConfigError;
pub use loader::{ConfigSource, LoadError, LoadOutcome, LoadStats, SourceKind};
pub use merge::MergeOptions;
pub use settings::{AuthMode, Settings, TransportKind};
