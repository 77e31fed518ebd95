//! Shared utilities for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use connector_config::config::{ConfigUpdate, ConfigWatcher};
use tokio::sync::mpsc;

/// How long a test waits for a filesystem-driven update before failing.
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(5);

/// A document with a single remote `search` server.
pub fn search_config(enabled: bool) -> String {
    format!(
        r#"{{
  "version": "1.0",
  "servers": {{
    "search": {{"type": "sse", "config": {{"url": "http://localhost:8080/sse"}}, "enabled": {enabled}, "category": "web"}}
  }},
  "globalSettings": {{"maxConcurrentServers": 10, "logLevel": "INFO"}},
  "categories": {{"web": {{"name": "Web", "description": "Web access"}}}}
}}"#
    )
}

/// The representative document from the file format description.
#[allow(dead_code)]
pub const EXAMPLE_CONFIG: &str = r#"{
  "version": "1.0",
  "servers": {
    "time": {"command": "runtime-a", "args": ["serve-time"], "enabled": true, "category": "utility"},
    "search": {"type": "sse", "config": {"url": "http://localhost:8080/sse"}, "enabled": false}
  },
  "globalSettings": {"maxConcurrentServers": 10, "logLevel": "INFO"},
  "categories": {"utility": {"name": "Utility", "description": "..."}}
}"#;

/// Write `contents` to `name` inside `dir` and return the full path.
pub fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Subscribe an observer that forwards every update into a channel.
#[allow(dead_code)]
pub fn channel_observer(watcher: &ConfigWatcher) -> mpsc::UnboundedReceiver<ConfigUpdate> {
    let (tx, rx) = mpsc::unbounded_channel();
    watcher.subscribe(move |update| {
        let _ = tx.send(update.clone());
        Ok(())
    });
    rx
}

/// Wait for the next update or panic after [`UPDATE_TIMEOUT`].
#[allow(dead_code)]
pub async fn next_update(rx: &mut mpsc::UnboundedReceiver<ConfigUpdate>) -> ConfigUpdate {
    tokio::time::timeout(UPDATE_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a configuration update")
        .expect("observer channel closed")
}
