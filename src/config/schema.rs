//! Configuration schema definitions.
//!
//! This module defines the typed snapshot produced by a successful
//! parse + validate cycle. Every type is immutable once built; a reload
//! replaces the whole [`ConfigDocument`] rather than mutating it.
//!
//! # Design Decisions
//! - `ServerSpec` is a tagged union, one variant per transport shape
//! - `servers` keeps the source order (see [`ServerMap`])
//! - Optional settings stay `Option` instead of receiving silent defaults

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use url::Url;

/// Root of one configuration snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    /// Dotted numeric version (`major.minor[.patch]`).
    pub version: String,

    /// Connector definitions keyed by unique name, in source order.
    pub servers: ServerMap,

    /// Cross-cutting defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_settings: Option<GlobalSettings>,

    /// Category key to display metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, CategoryInfo>,

    /// Free-form provenance. Never checked against business rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

impl ConfigDocument {
    /// Servers with `enabled == true`, in source order.
    pub fn enabled_servers(&self) -> ServerMap {
        self.servers.filter(|_, spec| spec.enabled())
    }

    /// Look up a server by name, enabled or not.
    pub fn server(&self, name: &str) -> Option<&ServerSpec> {
        self.servers.get(name)
    }

    /// Enabled servers assigned to `category`.
    pub fn servers_by_category(&self, category: &str) -> ServerMap {
        self.servers
            .filter(|_, spec| spec.enabled() && spec.category() == Some(category))
    }

    /// Server names, optionally restricted to enabled ones.
    pub fn server_names(&self, enabled_only: bool) -> Vec<&str> {
        self.servers
            .iter()
            .filter(|(_, spec)| !enabled_only || spec.enabled())
            .map(|(name, _)| name)
            .collect()
    }

    /// Normalized transport view of the enabled servers.
    pub fn enabled_transports(&self) -> BTreeMap<String, TransportDescriptor> {
        self.servers
            .iter()
            .filter(|(_, spec)| spec.enabled())
            .map(|(name, spec)| (name.to_string(), spec.transport()))
            .collect()
    }

    /// The `defaultTimeout` global setting, if any.
    pub fn default_timeout(&self) -> Option<f64> {
        self.global_settings.as_ref().and_then(|g| g.default_timeout)
    }
}

/// Ordered name → [`ServerSpec`] mapping.
///
/// Deserializes from a map, keeps the order in which keys were visited
/// and rejects duplicate names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerMap {
    entries: IndexMap<String, ServerSpec>,
}

impl ServerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Replacement keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, spec: ServerSpec) {
        self.entries.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ServerSpec> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServerSpec)> {
        self.entries.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// A new map holding the entries accepted by `keep`, order preserved.
    pub fn filter(&self, mut keep: impl FnMut(&str, &ServerSpec) -> bool) -> ServerMap {
        self.entries
            .iter()
            .filter(|(name, spec)| keep(name, spec))
            .map(|(name, spec)| (name.clone(), spec.clone()))
            .collect()
    }
}

impl FromIterator<(String, ServerSpec)> for ServerMap {
    fn from_iter<I: IntoIterator<Item = (String, ServerSpec)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for ServerMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, spec) in &self.entries {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ServerMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ServerMapVisitor;

        impl<'de> Visitor<'de> for ServerMapVisitor {
            type Value = ServerMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of server name to server definition")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ServerMap, A::Error> {
                let mut entries = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, spec)) = access.next_entry::<String, ServerSpec>()? {
                    if entries.contains_key(&name) {
                        return Err(de::Error::custom(format!("duplicate server name `{name}`")));
                    }
                    entries.insert(name, spec);
                }
                Ok(ServerMap { entries })
            }
        }

        deserializer.deserialize_map(ServerMapVisitor)
    }
}

/// One connector definition.
///
/// The variant is chosen by the presence of `command` (process launch)
/// or `type` (network endpoint). An entry carrying both is rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerSpec {
    Command(CommandServer),
    Sse(RemoteServer),
    StreamableHttp(RemoteServer),
}

/// Discriminant of a [`ServerSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerKind {
    Command,
    Sse,
    StreamableHttp,
}

impl ServerKind {
    /// The literal `type` tag for remote kinds.
    pub fn type_tag(self) -> Option<&'static str> {
        match self {
            ServerKind::Command => None,
            ServerKind::Sse => Some("sse"),
            ServerKind::StreamableHttp => Some("streamable-http"),
        }
    }

    /// Parse a `type` tag. `command` is not a tag and is rejected.
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "sse" => Some(ServerKind::Sse),
            "streamable-http" => Some(ServerKind::StreamableHttp),
            _ => None,
        }
    }
}

impl ServerSpec {
    pub fn kind(&self) -> ServerKind {
        match self {
            ServerSpec::Command(_) => ServerKind::Command,
            ServerSpec::Sse(_) => ServerKind::Sse,
            ServerSpec::StreamableHttp(_) => ServerKind::StreamableHttp,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            ServerSpec::Command(s) => s.enabled,
            ServerSpec::Sse(s) | ServerSpec::StreamableHttp(s) => s.enabled,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            ServerSpec::Command(s) => s.category.as_deref(),
            ServerSpec::Sse(s) | ServerSpec::StreamableHttp(s) => s.category.as_deref(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            ServerSpec::Command(s) => s.description.as_deref(),
            ServerSpec::Sse(s) | ServerSpec::StreamableHttp(s) => s.description.as_deref(),
        }
    }

    /// Per-server timeout in seconds.
    pub fn timeout(&self) -> Option<f64> {
        match self {
            ServerSpec::Command(s) => s.timeout,
            ServerSpec::Sse(s) | ServerSpec::StreamableHttp(s) => s.timeout,
        }
    }

    /// Normalized descriptor handed to connection-establishing consumers.
    pub fn transport(&self) -> TransportDescriptor {
        match self {
            ServerSpec::Command(s) => TransportDescriptor::Stdio {
                command: s.command.clone(),
                args: s.args.clone(),
                env: s.env.clone().unwrap_or_default(),
            },
            ServerSpec::Sse(s) => TransportDescriptor::Sse {
                url: s.config.url.clone(),
                headers: s.config.headers.clone().unwrap_or_default(),
            },
            ServerSpec::StreamableHttp(s) => TransportDescriptor::StreamableHttp {
                url: s.config.url.clone(),
                headers: s.config.headers.clone().unwrap_or_default(),
            },
        }
    }
}

impl Serialize for ServerSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            #[serde(flatten)]
            server: &'a RemoteServer,
        }

        match self {
            ServerSpec::Command(server) => server.serialize(serializer),
            ServerSpec::Sse(server) => Tagged { kind: "sse", server }.serialize(serializer),
            ServerSpec::StreamableHttp(server) => Tagged {
                kind: "streamable-http",
                server,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ServerSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = serde_json::Map::deserialize(deserializer)?;

        let has_command = fields.contains_key("command");
        let tag = fields.remove("type");

        match (has_command, tag) {
            (true, None) => serde_json::from_value(Value::Object(fields))
                .map(ServerSpec::Command)
                .map_err(de::Error::custom),
            (false, Some(Value::String(tag))) => {
                let kind = ServerKind::from_type_tag(&tag).ok_or_else(|| {
                    de::Error::unknown_variant(&tag, &["sse", "streamable-http"])
                })?;
                let server: RemoteServer =
                    serde_json::from_value(Value::Object(fields)).map_err(de::Error::custom)?;
                Ok(match kind {
                    ServerKind::Sse => ServerSpec::Sse(server),
                    _ => ServerSpec::StreamableHttp(server),
                })
            }
            (false, Some(_)) => Err(de::Error::custom("`type` must be a string")),
            (true, Some(_)) => Err(de::Error::custom(
                "server entry mixes `command` and `type` fields",
            )),
            (false, None) => Err(de::Error::custom(
                "server entry has neither `command` nor `type`",
            )),
        }
    }
}

/// A connector launched as a local process.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandServer {
    /// Executable to launch.
    pub command: String,

    /// Arguments passed to the executable, in order.
    pub args: Vec<String>,

    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Extra environment for the launched process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,

    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

/// A connector reached over the network (SSE or streamable HTTP).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteServer {
    pub config: RemoteEndpoint,

    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

/// Network endpoint of a [`RemoteServer`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteEndpoint {
    pub url: Url,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

/// Cross-cutting defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Ceiling on concurrently running connectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_servers: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Whether the surrounding application should watch the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot_reload: Option<bool>,

    /// Fallback timeout in seconds for servers without their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,

    /// Delay between retries in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<f64>,
}

/// Log verbosity as written in the configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [&'static str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Equivalent `tracing` level directive.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(format!("unknown log level `{s}`")),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display metadata for a category.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CategoryInfo {
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// How a consumer reaches one enabled connector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "transport", rename_all = "kebab-case")]
pub enum TransportDescriptor {
    Stdio {
        command: String,
        args: Vec<String>,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },
    Sse {
        url: Url,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
    StreamableHttp {
        url: Url,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ConfigDocument {
        serde_json::from_value(json!({
            "version": "1.0",
            "servers": {
                "time": {"command": "runtime-a", "args": ["serve-time"], "enabled": true, "category": "utility"},
                "search": {"type": "sse", "config": {"url": "http://localhost:8080/sse"}, "enabled": false},
                "docs": {"type": "streamable-http", "config": {"url": "https://docs.example.com/mcp"}, "enabled": true, "category": "utility"}
            },
            "globalSettings": {"maxConcurrentServers": 10, "logLevel": "info", "defaultTimeout": 30},
            "categories": {"utility": {"name": "Utility", "description": "Everyday helpers"}}
        }))
        .unwrap()
    }

    #[test]
    fn test_variant_discrimination() {
        let doc = sample();
        assert_eq!(doc.server("time").unwrap().kind(), ServerKind::Command);
        assert_eq!(doc.server("search").unwrap().kind(), ServerKind::Sse);
        assert_eq!(doc.server("docs").unwrap().kind(), ServerKind::StreamableHttp);
    }

    #[test]
    fn test_mixed_entry_rejected() {
        let result: Result<ServerSpec, _> = serde_json::from_value(json!({
            "command": "runtime-a", "args": [], "type": "sse", "enabled": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_source_order_preserved() {
        let doc = sample();
        let names: Vec<_> = doc.servers.names().collect();
        assert_eq!(names, vec!["time", "search", "docs"]);
    }

    #[test]
    fn test_enabled_views() {
        let doc = sample();
        let enabled: Vec<_> = doc.enabled_servers().names().map(String::from).collect();
        assert_eq!(enabled, vec!["time", "docs"]);
        assert_eq!(doc.server_names(false).len(), 3);
        assert_eq!(doc.servers_by_category("utility").len(), 2);
        assert!(doc.servers_by_category("missing").is_empty());
    }

    #[test]
    fn test_transport_descriptor_shape() {
        let doc = sample();
        let transports = doc.enabled_transports();
        assert!(!transports.contains_key("search"));

        let time = serde_json::to_value(&transports["time"]).unwrap();
        assert_eq!(time, json!({"transport": "stdio", "command": "runtime-a", "args": ["serve-time"]}));

        let docs = serde_json::to_value(&transports["docs"]).unwrap();
        assert_eq!(docs["transport"], "streamable-http");
        assert_eq!(docs["url"], "https://docs.example.com/mcp");
    }

    #[test]
    fn test_serialize_keeps_type_tag() {
        let doc = sample();
        let value = serde_json::to_value(doc.server("search").unwrap()).unwrap();
        assert_eq!(value["type"], "sse");
        assert_eq!(value["config"]["url"], "http://localhost:8080/sse");
    }

    #[test]
    fn test_duplicate_server_name_rejected() {
        let text = r#"{"a": {"command": "x", "args": ["y"], "enabled": true},
                       "a": {"command": "x", "args": ["z"], "enabled": true}}"#;
        let err = serde_json::from_str::<ServerMap>(text).unwrap_err();
        assert!(err.to_string().contains("duplicate server name `a`"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let doc = sample();
        let mut servers = doc.servers.clone();
        let docs = servers.get("docs").unwrap().clone();
        servers.insert("time", docs);
        assert_eq!(servers.names().collect::<Vec<_>>(), vec!["time", "search", "docs"]);
        assert_eq!(servers.get("time").unwrap().kind(), ServerKind::StreamableHttp);
    }

    #[test]
    fn test_log_level_from_string() {
        assert_eq!(LogLevel::try_from("DEBUG".to_string()), Ok(LogLevel::Debug));
        assert!(LogLevel::try_from("loud".to_string()).is_err());

        let settings: GlobalSettings = serde_json::from_value(json!({"logLevel": "Error"})).unwrap();
        assert_eq!(settings.log_level, Some(LogLevel::Error));
        assert_eq!(String::from(LogLevel::Error), "ERROR");
    }

    #[test]
    fn test_log_level_case_insensitive() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!(LogLevel::Critical.as_directive(), "error");
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
