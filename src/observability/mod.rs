//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! loader / watcher produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (parse, reload and observer counters)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or globalSettings.logLevel)
//!     → Prometheus scrape endpoint (optional, binary only)
//! ```
//!
//! # Design Decisions
//! - Metrics go through the `metrics` facade; without a recorder they are no-ops
//! - The library never installs a subscriber; only the binary does

pub mod logging;
pub mod metrics;
