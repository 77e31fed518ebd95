//! Connector configuration management.
//!
//! Loads, validates and hot-reloads the file that declares which
//! tool-server connectors an agent may use.

pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::{
    ConfigDocument, ConfigError, ConfigLoader, ConfigUpdate, ConfigWatcher, ServerSpec,
    TransportDescriptor, ValidationReport, Validator, WatcherError,
};
pub use lifecycle::Shutdown;
