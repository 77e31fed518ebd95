//! Configuration file watcher for hot reload.
//!
//! # Responsibilities
//! - Observe the source's directory for changes to the source file
//! - Coalesce bursts of filesystem events into one reload
//! - Fan each reload outcome out to registered observers
//!
//! # Data Flow
//! ```text
//! notify callback (filtered to the source file)
//!     → unbounded channel
//!     → Debouncer (quiet window)
//!     → ConfigLoader::reload on the blocking pool
//!     → ConfigUpdate::{Reloaded, Failed}
//!     → every observer, in registration order
//! ```
//!
//! # Design Decisions
//! - Failed reloads are forwarded, never retried or absorbed
//! - Observer errors and panics are contained per observer
//! - `stop` cancels a pending debounce but lets a started dispatch finish

use std::any::Any;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::debounce::Debouncer;
use crate::config::loader::{ConfigError, ConfigLoader};
use crate::config::schema::ConfigDocument;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::observability::metrics;

/// Quiet period that must pass after the last filesystem event before a reload.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Upper bound on how long `stop` waits for the background task.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a [`ConfigWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Starting,
    Watching,
    Stopping,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WatcherState::Stopped => "stopped",
            WatcherState::Starting => "starting",
            WatcherState::Watching => "watching",
            WatcherState::Stopping => "stopping",
        })
    }
}

/// Lifecycle errors of the watcher.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("watcher is already {state}")]
    AlreadyRunning { state: WatcherState },

    #[error("cannot watch {}: the file or its directory does not exist", path.display())]
    SourceMissing { path: PathBuf },

    #[error("no Tokio runtime is available to host the watcher task")]
    NoRuntime,

    #[error("filesystem watch failed: {0}")]
    Notify(#[from] notify::Error),
}

/// Outcome of one reload, as delivered to observers.
#[derive(Debug, Clone)]
pub enum ConfigUpdate {
    /// The source changed and the new snapshot is now current.
    Reloaded(Arc<ConfigDocument>),
    /// The source changed but was rejected; the previous snapshot is still current.
    Failed(ConfigError),
}

impl ConfigUpdate {
    pub fn document(&self) -> Option<&Arc<ConfigDocument>> {
        match self {
            ConfigUpdate::Reloaded(document) => Some(document),
            ConfigUpdate::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ConfigError> {
        match self {
            ConfigUpdate::Reloaded(_) => None,
            ConfigUpdate::Failed(e) => Some(e),
        }
    }
}

/// Error an observer may return to report that it could not apply an update.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

type Observer = Arc<dyn Fn(&ConfigUpdate) -> Result<(), ObserverError> + Send + Sync>;

/// Handle returned by [`ConfigWatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// How one update fared across the registered observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Observers {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ObserverId, Observer)>>,
}

impl Observers {
    fn add(&self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, observer));
        id
    }

    fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn dispatch(&self, update: &ConfigUpdate) -> DispatchReport {
        // Call outside the lock so observers may subscribe or unsubscribe.
        let observers = self.entries.lock().clone();
        let mut report = DispatchReport::default();

        for (id, observer) in observers {
            match panic::catch_unwind(AssertUnwindSafe(|| observer(update))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(observer = %id, error = %e, "Observer failed to apply update");
                    metrics::record_observer_failure();
                    report.failed += 1;
                }
                Err(payload) => {
                    tracing::error!(
                        observer = %id,
                        panic = %panic_message(payload.as_ref()),
                        "Observer panicked"
                    );
                    metrics::record_observer_failure();
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers").field("count", &self.len()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Resources held while watching.
struct Running {
    fs_watcher: RecommendedWatcher,
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

struct Lifecycle {
    state: WatcherState,
    running: Option<Running>,
}

/// Watches a [`ConfigLoader`]'s source and notifies observers on change.
pub struct ConfigWatcher {
    loader: Arc<ConfigLoader>,
    debounce: Duration,
    runtime: Option<Handle>,
    lifecycle: Mutex<Lifecycle>,
    observers: Arc<Observers>,
}

impl ConfigWatcher {
    /// Create a stopped watcher over `loader`.
    pub fn new(loader: Arc<ConfigLoader>) -> Self {
        Self {
            loader,
            debounce: DEBOUNCE_WINDOW,
            runtime: None,
            lifecycle: Mutex::new(Lifecycle {
                state: WatcherState::Stopped,
                running: None,
            }),
            observers: Arc::new(Observers::default()),
        }
    }

    /// Override the debounce window.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Host the background task on `handle` instead of the ambient runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn loader(&self) -> &Arc<ConfigLoader> {
        &self.loader
    }

    pub fn source_path(&self) -> &Path {
        self.loader.path()
    }

    pub fn debounce_window(&self) -> Duration {
        self.debounce
    }

    pub fn state(&self) -> WatcherState {
        self.lifecycle.lock().state
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Register an observer. It receives every later update, success or failure.
    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&ConfigUpdate) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        let id = self.observers.add(Arc::new(observer));
        tracing::debug!(observer = %id, "Observer subscribed");
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.observers.remove(id);
        if removed {
            tracing::debug!(observer = %id, "Observer unsubscribed");
        }
        removed
    }

    /// Begin watching the source.
    ///
    /// Fails with [`WatcherError::AlreadyRunning`] unless the watcher is
    /// stopped. Any other failure leaves the watcher stopped.
    pub fn start(&self) -> Result<(), WatcherError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != WatcherState::Stopped {
            return Err(WatcherError::AlreadyRunning {
                state: lifecycle.state,
            });
        }
        lifecycle.state = WatcherState::Starting;

        match self.establish() {
            Ok(running) => {
                lifecycle.running = Some(running);
                lifecycle.state = WatcherState::Watching;
                tracing::info!(
                    path = %self.source_path().display(),
                    debounce_ms = self.debounce.as_millis() as u64,
                    "Config watcher started"
                );
                Ok(())
            }
            Err(e) => {
                lifecycle.state = WatcherState::Stopped;
                tracing::error!(path = %self.source_path().display(), error = %e, "Config watcher failed to start");
                Err(e)
            }
        }
    }

    /// Stop watching. Safe to call repeatedly and when never started.
    ///
    /// A pending debounce is discarded. A reload that already fired is
    /// allowed to finish notifying observers, bounded by a timeout after
    /// which the task is aborted.
    pub async fn stop(&self) {
        let running = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.running.take() {
                Some(running) => {
                    lifecycle.state = WatcherState::Stopping;
                    running
                }
                None => return,
            }
        };

        let Running {
            fs_watcher,
            shutdown,
            task,
        } = running;
        // Trigger before closing the event channel: a closed channel flushes
        // the pending burst, a triggered shutdown discards it.
        shutdown.trigger();
        drop(fs_watcher);

        let abort = task.abort_handle();
        match tokio::time::timeout(STOP_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_cancelled() => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Config watcher task failed"),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = STOP_TIMEOUT.as_secs(),
                    "Config watcher task did not stop in time, aborting"
                );
                abort.abort();
            }
        }

        self.lifecycle.lock().state = WatcherState::Stopped;
        tracing::info!(path = %self.source_path().display(), "Config watcher stopped");
    }

    /// Run `body` with the watcher started, stopping it on every exit path.
    ///
    /// If `body` panics or the returned future is dropped early, the
    /// background task is signalled to stop without being awaited.
    pub async fn scoped<F, Fut, T>(&self, body: F) -> Result<T, WatcherError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.start()?;
        let mut guard = StopGuard(Some(self));
        let output = body().await;
        guard.0 = None;
        self.stop().await;
        Ok(output)
    }

    /// Reload now, notify observers and return the outcome.
    ///
    /// Blocks on file I/O; call from a blocking context when inside a runtime.
    pub fn reload(&self) -> Result<Arc<ConfigDocument>, ConfigError> {
        let result = self.loader.reload();
        let update = match &result {
            Ok(document) => ConfigUpdate::Reloaded(document.clone()),
            Err(e) => ConfigUpdate::Failed(e.clone()),
        };
        self.observers.dispatch(&update);
        result
    }

    fn establish(&self) -> Result<Running, WatcherError> {
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| WatcherError::NoRuntime)?,
        };

        let source = self.source_path();
        let missing = || WatcherError::SourceMissing {
            path: source.to_path_buf(),
        };
        let file_name: OsString = source.file_name().ok_or_else(missing)?.to_os_string();
        let dir = watch_dir(source);
        if !dir.is_dir() || !source.is_file() {
            return Err(missing());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut fs_watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if touches_source(&event, &file_name) => {
                    tracing::trace!(kind = ?event.kind, "Source file event");
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Filesystem watch error"),
            }
        })?;
        // Watch the directory so atomic rename-over saves are seen.
        fs_watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let shutdown = Shutdown::new();
        let task = runtime.spawn(watch_loop(
            self.loader.clone(),
            self.observers.clone(),
            Debouncer::new(rx, self.debounce),
            shutdown.subscribe(),
        ));

        Ok(Running {
            fs_watcher,
            shutdown,
            task,
        })
    }

    /// Signal the background task without awaiting it.
    fn halt(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if let Some(running) = lifecycle.running.take() {
            running.shutdown.trigger();
            lifecycle.state = WatcherState::Stopped;
        }
    }
}

impl fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("source", &self.source_path())
            .field("debounce", &self.debounce)
            .field("state", &self.state())
            .field("observers", &self.observers)
            .finish()
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.halt();
    }
}

struct StopGuard<'a>(Option<&'a ConfigWatcher>);

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if let Some(watcher) = self.0.take() {
            watcher.halt();
        }
    }
}

fn watch_dir(source: &Path) -> &Path {
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn touches_source(event: &Event, file_name: &OsStr) -> bool {
    let relevant = match &event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    relevant && event.paths.iter().any(|p| p.file_name() == Some(file_name))
}

async fn watch_loop(
    loader: Arc<ConfigLoader>,
    observers: Arc<Observers>,
    mut debouncer: Debouncer,
    mut shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            burst = debouncer.next() => {
                let Some(events) = burst else { break };
                tracing::debug!(events, "Configuration source changed");

                let loader = loader.clone();
                let observers = observers.clone();
                let dispatched = tokio::task::spawn_blocking(move || {
                    let update = match loader.reload() {
                        Ok(document) => ConfigUpdate::Reloaded(document),
                        Err(e) => ConfigUpdate::Failed(e),
                    };
                    observers.dispatch(&update)
                })
                .await;

                match dispatched {
                    Ok(report) => tracing::debug!(
                        delivered = report.delivered,
                        failed = report.failed,
                        "Configuration update dispatched"
                    ),
                    Err(e) => tracing::error!(error = %e, "Reload task failed"),
                }
            }
        }
    }
    tracing::debug!("Config watch loop exited");
}
