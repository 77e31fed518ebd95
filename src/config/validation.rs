//! Configuration validation.
//!
//! # Responsibilities
//! - Structural checks: required keys, primitive shapes, variant detection
//! - Semantic checks: version and name patterns, URLs, numeric ranges
//! - Referential checks: server categories resolve to declared categories
//!
//! # Design Decisions
//! - Runs on the raw value tree, before typed deserialization, so every
//!   finding can point at the offending field
//! - Passes run in order and stop after the first pass reporting an error
//! - Warnings never block acceptance
//! - Validation is a pure function: `&Value -> ValidationReport`

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::config::schema::{LogLevel, ServerKind};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("identifier pattern"));

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").expect("version pattern"));

/// Timeouts above this many seconds are reported as unusually large.
const LARGE_TIMEOUT_SECS: f64 = 300.0;

const TOP_LEVEL_KEYS: [&str; 5] = ["version", "servers", "globalSettings", "categories", "metadata"];
const COMMON_SERVER_KEYS: [&str; 4] = ["enabled", "description", "category", "timeout"];
const COMMAND_ONLY_KEYS: [&str; 3] = ["command", "args", "env"];
const REMOTE_ONLY_KEYS: [&str; 2] = ["type", "config"];

/// Whether a finding blocks acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Dotted/bracket path to the offending field (`servers.foo.args[0]`).
    /// Empty for the document root.
    pub field_path: String,
    pub message: String,
    pub severity: Severity,
    /// Ways to fix the finding, most likely first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.field_path.is_empty() {
            "<root>"
        } else {
            self.field_path.as_str()
        };
        write!(f, "[{}] {}: {}", self.severity, path, self.message)?;
        if !self.suggestions.is_empty() {
            write!(f, " (suggestions: {})", self.suggestions.join("; "))?;
        }
        Ok(())
    }
}

/// Ordered findings of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    /// True when no finding has `Severity::Error`.
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }

    /// First finding whose path equals `field_path`.
    pub fn at(&self, field_path: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.field_path == field_path)
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub(crate) fn error(&mut self, field_path: impl Into<String>, message: impl Into<String>) {
        self.push(field_path.into(), message.into(), Severity::Error, Vec::new());
    }

    /// Record an error together with remediation hints.
    pub(crate) fn error_with(
        &mut self,
        field_path: impl Into<String>,
        message: impl Into<String>,
        suggestions: Vec<String>,
    ) {
        self.push(field_path.into(), message.into(), Severity::Error, suggestions);
    }

    pub(crate) fn warning(&mut self, field_path: impl Into<String>, message: impl Into<String>) {
        self.push(field_path.into(), message.into(), Severity::Warning, Vec::new());
    }

    fn push(&mut self, field_path: String, message: String, severity: Severity, suggestions: Vec<String>) {
        self.findings.push(Finding {
            field_path,
            message,
            severity,
            suggestions,
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors: Vec<_> = self.errors().collect();
        write!(f, "{} error(s)", errors.len())?;
        for (i, finding) in errors.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{}", finding)?;
        }
        Ok(())
    }
}

/// Stateless validator for raw configuration documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a parsed document.
    pub fn validate(&self, document: &Value) -> ValidationReport {
        let mut report = ValidationReport::default();

        let Some(root) = document.as_object() else {
            report.error("", format!("expected an object, found {}", kind_of(document)));
            return report;
        };

        structural_pass(root, &mut report);
        if report.has_errors() {
            return report;
        }

        semantic_pass(root, &mut report);
        if report.has_errors() {
            return report;
        }

        referential_pass(root, &mut report);
        report
    }
}

fn structural_pass(root: &Map<String, Value>, report: &mut ValidationReport) {
    for key in root.keys() {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            report.warning(key.as_str(), "unrecognized top-level key is ignored");
        }
    }

    match root.get("version") {
        None => missing_field(report, "version"),
        Some(v) => expect_string(v, "version", report),
    }

    match root.get("servers") {
        None => missing_field(report, "servers"),
        Some(Value::Object(servers)) => {
            for (name, entry) in servers {
                check_server_shape(&path("servers", name), entry, report);
            }
        }
        Some(other) => report.error("servers", format!("expected an object, found {}", kind_of(other))),
    }

    if let Some(settings) = root.get("globalSettings") {
        match settings.as_object() {
            Some(settings) => check_settings_shape(settings, report),
            None => report.error(
                "globalSettings",
                format!("expected an object, found {}", kind_of(settings)),
            ),
        }
    }

    if let Some(categories) = root.get("categories") {
        match categories.as_object() {
            Some(categories) => {
                for (key, info) in categories {
                    let at = path("categories", key);
                    let Some(info) = info.as_object() else {
                        report.error(&at, format!("expected an object, found {}", kind_of(info)));
                        continue;
                    };
                    for field in ["name", "description", "color"] {
                        if let Some(v) = info.get(field) {
                            expect_string(v, &path(&at, field), report);
                        }
                    }
                }
            }
            None => report.error(
                "categories",
                format!("expected an object, found {}", kind_of(categories)),
            ),
        }
    }

    if let Some(metadata) = root.get("metadata") {
        if !metadata.is_object() {
            report.error("metadata", format!("expected an object, found {}", kind_of(metadata)));
        }
    }
}

/// Determine which variant `entry` matches and check field shapes for it.
fn check_server_shape(at: &str, entry: &Value, report: &mut ValidationReport) {
    let Some(fields) = entry.as_object() else {
        report.error(at, format!("expected an object, found {}", kind_of(entry)));
        return;
    };

    let command_fields: Vec<&str> = COMMAND_ONLY_KEYS
        .iter()
        .copied()
        .filter(|k| fields.contains_key(*k))
        .collect();
    let remote_fields: Vec<&str> = REMOTE_ONLY_KEYS
        .iter()
        .copied()
        .filter(|k| fields.contains_key(*k))
        .collect();

    let kind = match (fields.contains_key("command"), fields.get("type")) {
        (true, Some(_)) => {
            report.error(at, "entry matches more than one variant: both `command` and `type` are present");
            return;
        }
        (false, None) => {
            report.error(at, "entry matches no variant: expected a `command` or a `type` field");
            return;
        }
        (true, None) => ServerKind::Command,
        (false, Some(Value::String(tag))) => match ServerKind::from_type_tag(tag) {
            Some(kind) => kind,
            None => {
                report.error(
                    path(at, "type"),
                    format!("unknown server type `{tag}`, expected `sse` or `streamable-http`"),
                );
                return;
            }
        },
        (false, Some(other)) => {
            report.error(path(at, "type"), format!("expected a string, found {}", kind_of(other)));
            return;
        }
    };

    let foreign = if kind == ServerKind::Command {
        &remote_fields
    } else {
        &command_fields
    };
    for field in foreign {
        report.error(
            path(at, field),
            format!("field is not allowed on a {} server", kind_label(kind)),
        );
    }

    match fields.get("enabled") {
        None => missing_field(report, &path(at, "enabled")),
        Some(Value::Bool(_)) => {}
        Some(other) => report.error(
            path(at, "enabled"),
            format!("expected a boolean, found {}", kind_of(other)),
        ),
    }
    for field in ["description", "category"] {
        if let Some(v) = fields.get(field) {
            expect_string(v, &path(at, field), report);
        }
    }
    if let Some(v) = fields.get("timeout") {
        expect_number(v, &path(at, "timeout"), report);
    }

    if kind == ServerKind::Command {
        if let Some(v) = fields.get("command") {
            expect_string(v, &path(at, "command"), report);
        }
        match fields.get("args") {
            None => missing_field(report, &path(at, "args")),
            Some(Value::Array(args)) => {
                for (i, arg) in args.iter().enumerate() {
                    expect_string(arg, &index(&path(at, "args"), i), report);
                }
            }
            Some(other) => report.error(
                path(at, "args"),
                format!("expected an array, found {}", kind_of(other)),
            ),
        }
        if let Some(env) = fields.get("env") {
            expect_string_map(env, &path(at, "env"), report);
        }
    } else {
        let config_at = path(at, "config");
        match fields.get("config") {
            None => missing_field(report, &config_at),
            Some(Value::Object(config)) => {
                match config.get("url") {
                    None => missing_field(report, &path(&config_at, "url")),
                    Some(v) => expect_string(v, &path(&config_at, "url"), report),
                }
                if let Some(headers) = config.get("headers") {
                    expect_string_map(headers, &path(&config_at, "headers"), report);
                }
            }
            Some(other) => report.error(
                &config_at,
                format!("expected an object, found {}", kind_of(other)),
            ),
        }
    }

    for key in fields.keys() {
        let known = COMMON_SERVER_KEYS.contains(&key.as_str())
            || COMMAND_ONLY_KEYS.contains(&key.as_str())
            || REMOTE_ONLY_KEYS.contains(&key.as_str());
        if !known {
            report.warning(path(at, key), "unrecognized server field is ignored");
        }
    }
}

fn check_settings_shape(settings: &Map<String, Value>, report: &mut ValidationReport) {
    for (key, value) in settings {
        let at = path("globalSettings", key);
        match key.as_str() {
            "maxConcurrentServers" | "retryAttempts" => expect_integer(value, &at, report),
            "defaultTimeout" | "retryDelay" => expect_number(value, &at, report),
            "logLevel" => expect_string(value, &at, report),
            "hotReload" => {
                if !value.is_boolean() {
                    report.error(&at, format!("expected a boolean, found {}", kind_of(value)));
                }
            }
            _ => report.warning(&at, "unrecognized global setting is ignored"),
        }
    }
}

fn semantic_pass(root: &Map<String, Value>, report: &mut ValidationReport) {
    if let Some(version) = root.get("version").and_then(Value::as_str) {
        if !VERSION.is_match(version) {
            report.error_with(
                "version",
                format!("`{version}` is not a valid version, expected `major.minor[.patch]`"),
                vec!["use a dotted numeric version such as `1.0` or `1.0.0`".to_string()],
            );
        }
    }

    let servers = root.get("servers").and_then(Value::as_object);
    let mut enabled_count = 0usize;

    for (name, entry) in servers.into_iter().flatten() {
        let at = path("servers", name);
        if !IDENTIFIER.is_match(name) {
            report.error_with(
                &at,
                format!("server name `{name}` must start with a letter and contain only letters, digits, `_` or `-`"),
                identifier_suggestions(name),
            );
        }
        let Some(fields) = entry.as_object() else {
            continue;
        };
        if fields.get("enabled").and_then(Value::as_bool) == Some(true) {
            enabled_count += 1;
        }

        if let Some(command) = fields.get("command").and_then(Value::as_str) {
            if command.trim().is_empty() {
                report.error(path(&at, "command"), "command must not be empty");
            }
            if fields.get("args").and_then(Value::as_array).is_some_and(Vec::is_empty) {
                report.error(path(&at, "args"), "args must contain at least one argument");
            }
        }

        if let Some(env) = fields.get("env").and_then(Value::as_object) {
            for key in env.keys() {
                if key.trim().is_empty() {
                    report.error(path(&at, "env"), "environment variable names must not be empty");
                }
            }
        }

        if let Some(url) = fields
            .get("config")
            .and_then(|c| c.get("url"))
            .and_then(Value::as_str)
        {
            check_url(url, &path(&path(&at, "config"), "url"), report);
        }

        if let Some(category) = fields.get("category").and_then(Value::as_str) {
            if category.trim().is_empty() {
                report.error(path(&at, "category"), "category must not be empty");
            }
        }

        if let Some(timeout) = fields.get("timeout").and_then(Value::as_f64) {
            let at = path(&at, "timeout");
            if timeout <= 0.0 {
                report.error(&at, format!("timeout must be greater than 0, found {timeout}"));
            } else if timeout > LARGE_TIMEOUT_SECS {
                report.warning(&at, format!("timeout of {timeout} seconds is unusually large"));
            }
        }
    }

    if let Some(categories) = root.get("categories").and_then(Value::as_object) {
        for key in categories.keys() {
            if !IDENTIFIER.is_match(key) {
                report.error_with(
                    path("categories", key),
                    format!("category key `{key}` must start with a letter and contain only letters, digits, `_` or `-`"),
                    identifier_suggestions(key),
                );
            }
        }
    }

    if let Some(settings) = root.get("globalSettings").and_then(Value::as_object) {
        check_settings_ranges(settings, enabled_count, report);
    }
}

fn check_settings_ranges(
    settings: &Map<String, Value>,
    enabled_count: usize,
    report: &mut ValidationReport,
) {
    if let Some(max) = settings.get("maxConcurrentServers").and_then(as_integer) {
        let at = "globalSettings.maxConcurrentServers";
        if max < 1 {
            report.error(at, format!("must be at least 1, found {max}"));
        } else if u32::try_from(max).is_err() {
            report.error(at, format!("{max} is out of range, the maximum is {}", u32::MAX));
        } else if usize::try_from(max).is_ok_and(|max| enabled_count > max) {
            report.warning(
                at,
                format!("{enabled_count} servers are enabled but at most {max} may run concurrently"),
            );
        }
    }

    if let Some(level) = settings.get("logLevel").and_then(Value::as_str) {
        if level.parse::<LogLevel>().is_err() {
            report.error_with(
                "globalSettings.logLevel",
                format!("`{level}` is not a log level, expected one of {}", LogLevel::ALL.join(", ")),
                vec![format!("set `logLevel` to one of {}", LogLevel::ALL.join(", "))],
            );
        }
    }

    if let Some(timeout) = settings.get("defaultTimeout").and_then(Value::as_f64) {
        if timeout <= 0.0 {
            report.error(
                "globalSettings.defaultTimeout",
                format!("must be greater than 0, found {timeout}"),
            );
        }
    }

    if let Some(attempts) = settings.get("retryAttempts").and_then(as_integer) {
        let at = "globalSettings.retryAttempts";
        if attempts < 0 {
            report.error(at, format!("must be a non-negative integer, found {attempts}"));
        } else if u32::try_from(attempts).is_err() {
            report.error(at, format!("{attempts} is out of range, the maximum is {}", u32::MAX));
        }
    }

    if let Some(delay) = settings.get("retryDelay").and_then(Value::as_f64) {
        if delay < 0.0 {
            report.error(
                "globalSettings.retryDelay",
                format!("must not be negative, found {delay}"),
            );
        }
    }
}

fn check_url(raw: &str, at: &str, report: &mut ValidationReport) {
    let example = || "use an absolute URL such as `http://localhost:8080/sse`".to_string();
    match Url::parse(raw) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            report.error_with(
                at,
                format!("unsupported URL scheme `{}`, expected http or https", url.scheme()),
                vec!["change the scheme to `http` or `https`".to_string()],
            );
        }
        Ok(url) if url.host_str().is_none() => {
            report.error_with(at, format!("`{raw}` has no host"), vec![example()]);
        }
        Ok(_) => {}
        Err(e) => report.error_with(at, format!("`{raw}` is not a well-formed URL: {e}"), vec![example()]),
    }
}

fn referential_pass(root: &Map<String, Value>, report: &mut ValidationReport) {
    let categories = root
        .get("categories")
        .and_then(Value::as_object)
        .filter(|c| !c.is_empty());
    let Some(categories) = categories else {
        return;
    };

    let servers = root.get("servers").and_then(Value::as_object);
    let mut referenced = Vec::new();

    for (name, entry) in servers.into_iter().flatten() {
        let Some(category) = entry.get("category").and_then(Value::as_str) else {
            continue;
        };
        if categories.contains_key(category) {
            referenced.push(category);
        } else {
            let mut suggestions = vec![
                format!("declare `{category}` under `categories`"),
            ];
            let declared: Vec<&str> = categories.keys().map(String::as_str).collect();
            suggestions.push(format!(
                "change the server's category to one of {}",
                declared.join(", ")
            ));
            report.error_with(
                path(&path("servers", name), "category"),
                format!("category `{category}` is not declared in `categories`"),
                suggestions,
            );
        }
    }

    for key in categories.keys() {
        if !referenced.contains(&key.as_str()) {
            report.warning(path("categories", key), "category is not referenced by any server");
        }
    }
}

fn expect_string(value: &Value, at: &str, report: &mut ValidationReport) {
    if !value.is_string() {
        report.error(at, format!("expected a string, found {}", kind_of(value)));
    }
}

fn expect_number(value: &Value, at: &str, report: &mut ValidationReport) {
    if !value.is_number() {
        report.error(at, format!("expected a number, found {}", kind_of(value)));
    }
}

fn expect_integer(value: &Value, at: &str, report: &mut ValidationReport) {
    if !(value.is_i64() || value.is_u64()) {
        report.error(at, format!("expected an integer, found {}", kind_of(value)));
    }
}

/// Integer value of any JSON integer, signed or unsigned.
fn as_integer(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

fn missing_field(report: &mut ValidationReport, at: &str) {
    let field = at.rsplit('.').next().unwrap_or(at);
    report.error_with(
        at,
        "required field is missing",
        vec![format!("add the `{field}` field")],
    );
}

fn identifier_suggestions(raw: &str) -> Vec<String> {
    let mut cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if !cleaned.starts_with(|c: char| c.is_ascii_alphabetic()) {
        cleaned.insert(0, 's');
    }
    vec![format!("rename it to something like `{cleaned}`")]
}

fn expect_string_map(value: &Value, at: &str, report: &mut ValidationReport) {
    let Some(map) = value.as_object() else {
        report.error(at, format!("expected an object, found {}", kind_of(value)));
        return;
    };
    for (key, v) in map {
        expect_string(v, &path(at, key), report);
    }
}

fn path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn index(parent: &str, i: usize) -> String {
    format!("{parent}[{i}]")
}

fn kind_label(kind: ServerKind) -> &'static str {
    match kind {
        ServerKind::Command => "command",
        ServerKind::Sse => "sse",
        ServerKind::StreamableHttp => "streamable-http",
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a float",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "version": "1.0",
            "servers": {
                "time": {"command": "runtime-a", "args": ["serve-time"], "enabled": true, "category": "utility"},
                "search": {"type": "sse", "config": {"url": "http://localhost:8080/sse"}, "enabled": false}
            },
            "globalSettings": {"maxConcurrentServers": 10, "logLevel": "INFO"},
            "categories": {"utility": {"name": "Utility", "description": "..."}}
        })
    }

    fn validate(doc: &Value) -> ValidationReport {
        Validator::new().validate(doc)
    }

    fn error_at(report: &ValidationReport, field_path: &str) -> bool {
        report.errors().any(|f| f.field_path == field_path)
    }

    #[test]
    fn test_valid_document() {
        let report = validate(&valid());
        assert!(report.is_valid(), "{report}");
        assert!(report.is_empty());
    }

    #[test]
    fn test_empty_servers_is_valid() {
        let report = validate(&json!({"version": "1.0", "servers": {}}));
        assert!(report.is_valid());
    }

    #[test]
    fn test_root_must_be_object() {
        let report = validate(&json!([1, 2]));
        assert!(error_at(&report, ""));
    }

    #[test]
    fn test_missing_required_keys() {
        let report = validate(&json!({"servers": {}}));
        assert!(error_at(&report, "version"));

        let report = validate(&json!({"version": "1.0"}));
        assert!(error_at(&report, "servers"));
    }

    #[test]
    fn test_enabled_is_mandatory() {
        let mut doc = valid();
        doc["servers"]["time"].as_object_mut().unwrap().remove("enabled");
        let report = validate(&doc);
        assert!(error_at(&report, "servers.time.enabled"));
    }

    #[test]
    fn test_mixed_variant_rejected() {
        let mut doc = valid();
        doc["servers"]["time"]["type"] = json!("sse");
        let report = validate(&doc);
        assert!(error_at(&report, "servers.time"));
    }

    #[test]
    fn test_foreign_field_rejected() {
        let mut doc = valid();
        doc["servers"]["search"]["args"] = json!(["x"]);
        let report = validate(&doc);
        assert!(error_at(&report, "servers.search.args"));
    }

    #[test]
    fn test_no_variant_rejected() {
        let mut doc = valid();
        doc["servers"]["empty"] = json!({"enabled": true});
        let report = validate(&doc);
        assert!(error_at(&report, "servers.empty"));
    }

    #[test]
    fn test_arg_type_path() {
        let mut doc = valid();
        doc["servers"]["time"]["args"] = json!(["ok", 3]);
        let report = validate(&doc);
        assert!(error_at(&report, "servers.time.args[1]"));
    }

    #[test]
    fn test_structural_errors_stop_later_passes() {
        let mut doc = valid();
        doc["version"] = json!("not-a-version");
        doc["servers"]["time"]["enabled"] = json!("yes");
        let report = validate(&doc);
        assert!(error_at(&report, "servers.time.enabled"));
        assert!(report.at("version").is_none());
    }

    #[test]
    fn test_bad_version() {
        let mut doc = valid();
        doc["version"] = json!("v1");
        assert!(error_at(&validate(&doc), "version"));

        doc["version"] = json!("1.2.3");
        assert!(validate(&doc).is_valid());
    }

    #[test]
    fn test_bad_server_name() {
        let mut doc = valid();
        let entry = doc["servers"]["time"].clone();
        doc["servers"]["9lives"] = entry;
        assert!(error_at(&validate(&doc), "servers.9lives"));
    }

    #[test]
    fn test_bad_url() {
        let mut doc = valid();
        doc["servers"]["search"]["config"]["url"] = json!("not a url");
        assert!(error_at(&validate(&doc), "servers.search.config.url"));

        doc["servers"]["search"]["config"]["url"] = json!("ftp://example.com/feed");
        assert!(error_at(&validate(&doc), "servers.search.config.url"));
    }

    #[test]
    fn test_empty_command_and_args() {
        let mut doc = valid();
        doc["servers"]["time"]["command"] = json!("  ");
        doc["servers"]["time"]["args"] = json!([]);
        let report = validate(&doc);
        assert!(error_at(&report, "servers.time.command"));
        assert!(error_at(&report, "servers.time.args"));
    }

    #[test]
    fn test_concurrency_ceiling() {
        let mut doc = valid();
        doc["globalSettings"]["maxConcurrentServers"] = json!(0);
        assert!(error_at(&validate(&doc), "globalSettings.maxConcurrentServers"));
    }

    #[test]
    fn test_log_level_domain() {
        let mut doc = valid();
        doc["globalSettings"]["logLevel"] = json!("verbose");
        assert!(error_at(&validate(&doc), "globalSettings.logLevel"));
    }

    #[test]
    fn test_large_timeout_is_warning() {
        let mut doc = valid();
        doc["servers"]["time"]["timeout"] = json!(900);
        let report = validate(&doc);
        assert!(report.is_valid());
        let finding = report.at("servers.time.timeout").unwrap();
        assert_eq!(finding.severity, Severity::Warning);
    }

    #[test]
    fn test_non_positive_timeout() {
        let mut doc = valid();
        doc["servers"]["time"]["timeout"] = json!(0);
        assert!(error_at(&validate(&doc), "servers.time.timeout"));
    }

    #[test]
    fn test_dangling_category() {
        let mut doc = valid();
        doc["servers"]["time"]["category"] = json!("missing");
        let report = validate(&doc);
        assert!(error_at(&report, "servers.time.category"));
    }

    #[test]
    fn test_category_without_declared_categories() {
        let mut doc = valid();
        doc.as_object_mut().unwrap().remove("categories");
        assert!(validate(&doc).is_valid());

        doc["categories"] = json!({});
        assert!(validate(&doc).is_valid());
    }

    #[test]
    fn test_unused_category_is_warning() {
        let mut doc = valid();
        doc["categories"]["spare"] = json!({"name": "Spare"});
        let report = validate(&doc);
        assert!(report.is_valid());
        assert_eq!(report.at("categories.spare").unwrap().severity, Severity::Warning);
    }

    #[test]
    fn test_report_display_lists_errors() {
        let mut doc = valid();
        doc["servers"]["time"]["category"] = json!("missing");
        let text = validate(&doc).to_string();
        assert!(text.starts_with("1 error(s)"));
        assert!(text.contains("servers.time.category"));
    }

    #[test]
    fn test_integers_beyond_i64_are_range_checked() {
        let mut doc = valid();
        doc["globalSettings"]["maxConcurrentServers"] = json!(u64::MAX);
        doc["globalSettings"]["retryAttempts"] = json!(u64::MAX);
        let report = validate(&doc);
        assert!(error_at(&report, "globalSettings.maxConcurrentServers"));
        assert!(error_at(&report, "globalSettings.retryAttempts"));
        assert!(report.errors().all(|f| !f.field_path.is_empty()));
    }

    #[test]
    fn test_integer_just_above_u32_rejected() {
        let mut doc = valid();
        doc["globalSettings"]["retryAttempts"] = json!(u64::from(u32::MAX) + 1);
        assert!(error_at(&validate(&doc), "globalSettings.retryAttempts"));

        doc["globalSettings"]["retryAttempts"] = json!(u32::MAX);
        assert!(validate(&doc).is_valid());
    }

    #[test]
    fn test_dangling_category_suggests_fixes() {
        let mut doc = valid();
        doc["servers"]["time"]["category"] = json!("missing");
        let report = validate(&doc);
        let finding = report.at("servers.time.category").unwrap();
        assert_eq!(finding.suggestions.len(), 2);
        assert!(finding.suggestions[0].contains("declare `missing` under `categories`"));
        assert!(finding.suggestions[1].contains("utility"));
        assert!(finding.to_string().contains("(suggestions: declare `missing`"));
    }

    #[test]
    fn test_suggestions_for_common_mistakes() {
        let mut doc = valid();
        doc["version"] = json!("v1");
        let report = validate(&doc);
        assert!(!report.at("version").unwrap().suggestions.is_empty());

        let mut doc = valid();
        doc["servers"]["search"]["config"]["url"] = json!("ftp://example.com/feed");
        doc["globalSettings"]["logLevel"] = json!("LOUD");
        let report = validate(&doc);
        assert!(report.at("servers.search.config.url").unwrap().suggestions[0].contains("http"));
        assert!(report.at("globalSettings.logLevel").unwrap().suggestions[0].contains("WARNING"));

        let mut doc = valid();
        let servers = doc["servers"].as_object_mut().unwrap();
        let search = servers.remove("search").unwrap();
        servers.insert("9 lives".to_string(), search);
        let report = validate(&doc);
        let finding = report.at("servers.9 lives").unwrap();
        assert_eq!(finding.suggestions, vec!["rename it to something like `s9_lives`".to_string()]);
    }

    #[test]
    fn test_missing_field_suggests_adding_it() {
        let mut doc = valid();
        doc["servers"]["time"].as_object_mut().unwrap().remove("args");
        let report = validate(&doc);
        let finding = report.at("servers.time.args").unwrap();
        assert_eq!(finding.suggestions, vec!["add the `args` field".to_string()]);
    }

    #[test]
    fn test_warnings_carry_no_suggestions() {
        let mut doc = valid();
        doc["categories"]["spare"] = json!({"name": "Spare"});
        let report = validate(&doc);
        assert!(report.warnings().all(|f| f.suggestions.is_empty()));
    }
}
