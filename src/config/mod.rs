//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! connectors file (JSON/TOML)
//!     → loader.rs (stat, cache check, read & parse)
//!     → validation.rs (structural, semantic, referential passes)
//!     → schema.rs (typed ConfigDocument)
//!     → atomic swap of Arc<ConfigDocument>
//!
//! On change:
//!     watcher.rs receives filesystem events
//!     → debounce.rs coalesces the burst
//!     → loader.rs reloads
//!     → observers receive Reloaded(snapshot) or Failed(error)
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; a reload replaces the whole document
//! - Nothing is defaulted on failure: errors reach the caller or the observers
//! - One loader instance is passed explicitly to every consumer

pub mod debounce;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{ConfigError, ConfigLoader, ConfigSummary, SourceFormat};
pub use schema::{
    CategoryInfo, CommandServer, ConfigDocument, GlobalSettings, LogLevel, RemoteEndpoint,
    RemoteServer, ServerKind, ServerMap, ServerSpec, TransportDescriptor,
};
pub use validation::{Finding, Severity, ValidationReport, Validator};
pub use watcher::{
    ConfigUpdate, ConfigWatcher, DispatchReport, ObserverError, ObserverId, WatcherError,
    WatcherState,
};
