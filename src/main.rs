//! Connector configuration daemon.
//!
//! Loads the connectors file, prints the enabled transports, then keeps the
//! snapshot current until interrupted.
//!
//! ```text
//! SIGHUP          → manual reload
//! SIGINT/SIGTERM  → stop watching, exit
//! file change     → debounced reload, observers notified
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use connector_config::config::{ConfigLoader, ConfigUpdate, ConfigWatcher};
use connector_config::lifecycle::{Signal, Signals};
use connector_config::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "connector-config", version, about = "Load, validate and hot-reload connector configuration")]
struct Cli {
    /// Path to the connectors file (`.json` or `.toml`)
    #[arg(default_value = "config/connectors.json")]
    config: PathBuf,

    /// Load once and keep serving the snapshot without watching the file
    #[arg(long)]
    no_watch: bool,

    /// Override the debounce window in milliseconds
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Expose Prometheus metrics on this address
    #[arg(long, value_name = "ADDR")]
    metrics_address: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let loader = Arc::new(ConfigLoader::new(&cli.config));

    // The first load decides the log level, so it runs before the subscriber exists.
    let document = loader.load()?;
    let settings = document.global_settings.clone().unwrap_or_default();
    logging::init(settings.log_level)?;

    tracing::info!(
        path = %loader.path().display(),
        version = %document.version,
        "connector-config v{} starting",
        env!("CARGO_PKG_VERSION")
    );
    for warning in loader.warnings()? {
        tracing::warn!(field = %warning.field_path, message = %warning.message, "Configuration warning");
    }

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr);
    }

    println!("{}", serde_json::to_string_pretty(&loader.enabled_transports()?)?);

    let mut watcher = ConfigWatcher::new(loader.clone());
    if let Some(ms) = cli.debounce_ms {
        watcher = watcher.with_debounce(Duration::from_millis(ms));
    }
    let watcher = Arc::new(watcher);

    watcher.subscribe(|update| {
        match update {
            ConfigUpdate::Reloaded(document) => {
                let transports = document.enabled_transports();
                tracing::info!(
                    version = %document.version,
                    enabled = transports.len(),
                    "Configuration applied"
                );
                println!("{}", serde_json::to_string_pretty(&transports)?);
            }
            ConfigUpdate::Failed(e) => {
                tracing::error!(error = %e, "Configuration change rejected, previous snapshot stays current");
            }
        }
        Ok(())
    });

    if cli.no_watch || settings.hot_reload == Some(false) {
        tracing::info!("Hot reload disabled");
    } else {
        watcher.start()?;
    }

    let mut signals = Signals::new()?;
    loop {
        match signals.recv().await? {
            Signal::Reload => {
                tracing::info!("Reload requested");
                let watcher = watcher.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || watcher.reload()).await? {
                    tracing::warn!(error = %e, "Manual reload failed");
                }
            }
            Signal::Shutdown => break,
        }
    }

    tracing::info!("Shutdown signal received");
    watcher.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
