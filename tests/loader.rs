//! Loader behaviour against files on disk.

use std::time::Duration;

use connector_config::config::{ConfigError, ConfigLoader, TransportDescriptor};
use tempfile::TempDir;

mod common;

#[test]
fn test_example_document_enabled_view() {
    let dir = TempDir::new().unwrap();
    let path = common::write_config(dir.path(), "connectors.json", common::EXAMPLE_CONFIG);
    let loader = ConfigLoader::new(path);

    let enabled = loader.enabled_servers().unwrap();
    assert_eq!(enabled.names().collect::<Vec<_>>(), vec!["time"]);
    assert_eq!(loader.server_names(false).unwrap(), vec!["time", "search"]);
    assert!(loader.warnings().unwrap().is_empty());
}

#[test]
fn test_enabled_transports_shape() {
    let dir = TempDir::new().unwrap();
    let path = common::write_config(dir.path(), "connectors.json", &common::search_config(true));
    let loader = ConfigLoader::new(path);

    let transports = loader.enabled_transports().unwrap();
    assert!(matches!(
        transports.get("search"),
        Some(TransportDescriptor::Sse { .. })
    ));

    let json = serde_json::to_value(&transports).unwrap();
    assert_eq!(json["search"]["transport"], "sse");
    assert_eq!(json["search"]["url"], "http://localhost:8080/sse");
}

#[test]
fn test_flipping_enabled_flag_updates_view() {
    let dir = TempDir::new().unwrap();
    let path = common::write_config(dir.path(), "connectors.json", &common::search_config(true));
    let loader = ConfigLoader::new(&path);
    assert!(loader.is_server_enabled("search").unwrap());

    std::fs::write(&path, common::search_config(false)).unwrap();
    loader.reload().unwrap();
    assert!(loader.enabled_servers().unwrap().is_empty());
    assert!(!loader.is_server_enabled("search").unwrap());
}

#[test]
fn test_first_load_errors_are_typed() {
    let dir = TempDir::new().unwrap();

    let missing = ConfigLoader::new(dir.path().join("connectors.json"));
    assert!(matches!(missing.load(), Err(ConfigError::NotFound { .. })));

    let path = common::write_config(dir.path(), "broken.json", "{\"version\": ");
    assert!(matches!(
        ConfigLoader::new(path).load(),
        Err(ConfigError::Parse { .. })
    ));

    let path = common::write_config(dir.path(), "invalid.json", r#"{"version": "one", "servers": {}}"#);
    let err = ConfigLoader::new(path).load().unwrap_err();
    assert!(err.validation_report().unwrap().at("version").is_some());
}

#[test]
fn test_timeouts_and_summary() {
    let dir = TempDir::new().unwrap();
    let contents = common::EXAMPLE_CONFIG.replace(
        r#""logLevel": "INFO""#,
        r#""logLevel": "INFO", "defaultTimeout": 12.5"#,
    );
    let path = common::write_config(dir.path(), "connectors.json", &contents);
    let loader = ConfigLoader::new(path);

    assert_eq!(
        loader.server_timeout("time").unwrap(),
        Duration::from_secs_f64(12.5)
    );
    assert!(matches!(
        loader.server_timeout("nope"),
        Err(ConfigError::UnknownServer { .. })
    ));

    let summary = loader.summary().unwrap();
    assert_eq!(summary.total_servers, 2);
    assert_eq!(summary.enabled_servers, 1);
}
