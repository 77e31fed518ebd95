//! Process lifecycle helpers.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Signal::Shutdown → stop the watcher, exit
//!     SIGHUP → Signal::Reload → manual reload through the watcher
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every ShutdownSignal resolves → background loops exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{Signal, Signals};
