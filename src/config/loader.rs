//! Configuration loading from disk.
//!
//! # Responsibilities
//! - Read, parse and validate the configuration source
//! - Cache the last good snapshot keyed by the source's modification stamp
//! - Serve derived views (enabled servers, lookups, summaries)
//!
//! # Design Decisions
//! - The snapshot lives in an `ArcSwapOption`; readers never wait on a reload
//! - Re-parses are serialized by a mutex; the swap happens only after validation
//! - No failure path produces a default value

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::schema::{
    CategoryInfo, ConfigDocument, GlobalSettings, ServerMap, ServerSpec, TransportDescriptor,
};
use crate::config::validation::{Finding, ValidationReport, Validator};
use crate::observability::metrics;

/// Errors raised while loading or querying configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration source does not exist.
    #[error("configuration source not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The source exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// The content is not well-formed JSON/TOML.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// The document is well-formed but breaks one or more rules.
    #[error("configuration failed validation with {0}")]
    Validation(ValidationReport),

    /// No server with this name is configured.
    #[error("no server named `{name}` is configured")]
    UnknownServer { name: String },

    /// Neither the server nor `globalSettings.defaultTimeout` sets a timeout.
    #[error("server `{name}` has no timeout and globalSettings.defaultTimeout is not set")]
    TimeoutNotConfigured { name: String },

    /// The configured timeout cannot be represented as a duration.
    #[error("server `{name}` has an unusable timeout of {seconds} seconds")]
    InvalidTimeout { name: String, seconds: f64 },
}

impl ConfigError {
    /// The validation report, when this is a validation failure.
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            ConfigError::Validation(report) => Some(report),
            _ => None,
        }
    }
}

/// Syntax of the configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Toml,
}

impl SourceFormat {
    /// `.toml` sources are TOML; everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => SourceFormat::Toml,
            _ => SourceFormat::Json,
        }
    }

    fn parse(self, text: &str) -> Result<Value, String> {
        match self {
            SourceFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            SourceFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        }
    }
}

/// Cache key of a snapshot: modification time plus byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceStamp {
    modified: SystemTime,
    len: u64,
}

/// One accepted snapshot and the stamp it was read under.
#[derive(Debug)]
struct CachedSnapshot {
    document: Arc<ConfigDocument>,
    stamp: SourceStamp,
    warnings: Vec<Finding>,
}

/// Overview of the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub path: PathBuf,
    pub version: String,
    pub total_servers: usize,
    pub enabled_servers: usize,
    pub disabled_servers: usize,
    pub enabled_server_names: Vec<String>,
    pub categories: Vec<String>,
    pub has_global_settings: bool,
    #[serde(skip)]
    pub last_modified: SystemTime,
    pub warnings: usize,
}

/// Loads the configuration source and holds the current snapshot.
///
/// Safe to share across threads (`Arc<ConfigLoader>`); every method
/// takes `&self`.
#[derive(Debug)]
pub struct ConfigLoader {
    path: PathBuf,
    format: SourceFormat,
    validator: Validator,
    current: ArcSwapOption<CachedSnapshot>,
    /// Serializes re-parses. Holds the stamp of the last rejected source.
    refresh: Mutex<Option<SourceStamp>>,
    parses: AtomicU64,
}

impl ConfigLoader {
    /// Create a loader for `path`. No I/O happens until the first `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = SourceFormat::from_path(&path);
        Self {
            path,
            format,
            validator: Validator::new(),
            current: ArcSwapOption::empty(),
            refresh: Mutex::new(None),
            parses: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Number of parses performed so far. Cache hits do not count.
    pub fn parse_count(&self) -> u64 {
        self.parses.load(Ordering::Relaxed)
    }

    /// The current snapshot without touching the source.
    pub fn current(&self) -> Option<Arc<ConfigDocument>> {
        self.current.load_full().map(|c| c.document.clone())
    }

    /// Return the current snapshot, re-parsing only if the source changed.
    ///
    /// When the source changed to content that was already rejected by a
    /// previous load or reload, the last good snapshot is returned; the
    /// rejection was reported to whoever triggered it.
    pub fn load(&self) -> Result<Arc<ConfigDocument>, ConfigError> {
        let stamp = self.stamp()?;

        if let Some(cached) = self.current.load_full() {
            if cached.stamp == stamp {
                tracing::trace!(path = %self.path.display(), "Configuration cache hit");
                return Ok(cached.document.clone());
            }
        }

        let mut rejected = self.refresh.lock();
        // Another caller may have refreshed while we waited for the lock.
        if let Some(cached) = self.current.load_full() {
            if cached.stamp == stamp || *rejected == Some(stamp) {
                return Ok(cached.document.clone());
            }
        }
        self.refresh_locked(stamp, &mut rejected)
    }

    /// Re-parse the source unconditionally.
    ///
    /// On failure the previous snapshot stays current and the error is
    /// returned to the caller.
    pub fn reload(&self) -> Result<Arc<ConfigDocument>, ConfigError> {
        let stamp = self.stamp()?;
        let mut rejected = self.refresh.lock();
        let result = self.refresh_locked(stamp, &mut rejected);
        metrics::record_reload(result.is_ok());
        result
    }

    /// Enabled servers of the current snapshot, in source order.
    pub fn enabled_servers(&self) -> Result<ServerMap, ConfigError> {
        Ok(self.load()?.enabled_servers())
    }

    /// Enabled servers in the normalized name → transport shape.
    pub fn enabled_transports(&self) -> Result<BTreeMap<String, TransportDescriptor>, ConfigError> {
        Ok(self.load()?.enabled_transports())
    }

    /// Look up one server, enabled or not.
    pub fn server(&self, name: &str) -> Result<ServerSpec, ConfigError> {
        self.load()?
            .server(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownServer {
                name: name.to_string(),
            })
    }

    pub fn servers_by_category(&self, category: &str) -> Result<ServerMap, ConfigError> {
        Ok(self.load()?.servers_by_category(category))
    }

    pub fn server_names(&self, enabled_only: bool) -> Result<Vec<String>, ConfigError> {
        let document = self.load()?;
        Ok(document
            .server_names(enabled_only)
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// False for disabled and unknown servers alike.
    pub fn is_server_enabled(&self, name: &str) -> Result<bool, ConfigError> {
        Ok(self.load()?.server(name).is_some_and(ServerSpec::enabled))
    }

    pub fn global_settings(&self) -> Result<Option<GlobalSettings>, ConfigError> {
        Ok(self.load()?.global_settings.clone())
    }

    pub fn categories(&self) -> Result<BTreeMap<String, CategoryInfo>, ConfigError> {
        Ok(self.load()?.categories.clone())
    }

    /// Effective timeout of a server: its own `timeout`, else
    /// `globalSettings.defaultTimeout`.
    pub fn server_timeout(&self, name: &str) -> Result<Duration, ConfigError> {
        let document = self.load()?;
        let server = document
            .server(name)
            .ok_or_else(|| ConfigError::UnknownServer {
                name: name.to_string(),
            })?;

        let seconds = server
            .timeout()
            .or_else(|| document.default_timeout())
            .ok_or_else(|| ConfigError::TimeoutNotConfigured {
                name: name.to_string(),
            })?;

        Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidTimeout {
            name: name.to_string(),
            seconds,
        })
    }

    /// Non-blocking findings of the current snapshot.
    pub fn warnings(&self) -> Result<Vec<Finding>, ConfigError> {
        self.load()?;
        Ok(self
            .current
            .load_full()
            .map(|c| c.warnings.clone())
            .unwrap_or_default())
    }

    pub fn summary(&self) -> Result<ConfigSummary, ConfigError> {
        self.load()?;
        let cached = self
            .current
            .load_full()
            .ok_or_else(|| ConfigError::NotFound {
                path: self.path.clone(),
            })?;
        let document = &cached.document;
        let enabled_server_names: Vec<String> = document
            .server_names(true)
            .into_iter()
            .map(String::from)
            .collect();

        Ok(ConfigSummary {
            path: self.path.clone(),
            version: document.version.clone(),
            total_servers: document.servers.len(),
            enabled_servers: enabled_server_names.len(),
            disabled_servers: document.servers.len() - enabled_server_names.len(),
            enabled_server_names,
            categories: document.categories.keys().cloned().collect(),
            has_global_settings: document.global_settings.is_some(),
            last_modified: cached.stamp.modified,
            warnings: cached.warnings.len(),
        })
    }

    fn stamp(&self) -> Result<SourceStamp, ConfigError> {
        let meta = fs::metadata(&self.path).map_err(|e| self.io_error(e))?;
        let modified = meta.modified().map_err(|e| self.io_error(e))?;
        Ok(SourceStamp {
            modified,
            len: meta.len(),
        })
    }

    fn io_error(&self, e: io::Error) -> ConfigError {
        if e.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: self.path.clone(),
            }
        } else {
            ConfigError::Io {
                path: self.path.clone(),
                source: Arc::new(e),
            }
        }
    }

    /// Parse + validate and swap on success. Caller holds the refresh lock.
    fn refresh_locked(
        &self,
        stamp: SourceStamp,
        rejected: &mut Option<SourceStamp>,
    ) -> Result<Arc<ConfigDocument>, ConfigError> {
        match self.read_document() {
            Ok((document, warnings)) => {
                let document = Arc::new(document);
                let enabled = document.servers.iter().filter(|(_, s)| s.enabled()).count();
                tracing::info!(
                    path = %self.path.display(),
                    version = %document.version,
                    servers = document.servers.len(),
                    enabled,
                    warnings = warnings.len(),
                    "Configuration loaded"
                );
                metrics::record_enabled_servers(enabled);

                self.current.store(Some(Arc::new(CachedSnapshot {
                    document: document.clone(),
                    stamp,
                    warnings,
                })));
                *rejected = None;
                Ok(document)
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Configuration rejected");
                *rejected = Some(stamp);
                Err(e)
            }
        }
    }

    fn read_document(&self) -> Result<(ConfigDocument, Vec<Finding>), ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        self.parses.fetch_add(1, Ordering::Relaxed);
        metrics::record_parse();

        let value = self.format.parse(&text).map_err(|message| ConfigError::Parse {
            path: self.path.clone(),
            message,
        })?;

        let report = self.validator.validate(&value);
        for warning in report.warnings() {
            tracing::warn!(
                field = %warning.field_path,
                message = %warning.message,
                "Configuration warning"
            );
        }
        if report.has_errors() {
            return Err(ConfigError::Validation(report));
        }

        // The validator covers every typed constraint, so a decode failure
        // here means the two have drifted apart.
        let document: ConfigDocument =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse {
                path: self.path.clone(),
                message: format!("validated document could not be decoded: {e}"),
            })?;

        let warnings = report.warnings().cloned().collect();
        Ok((document, warnings))
    }
}
