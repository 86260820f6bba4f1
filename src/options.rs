//! Immutable connection options
//!
//! [`ConnectionOptions`] is built once from a [`RawOptions`] record (or a loosely typed
//! JSON map), validated and normalized eagerly, and never mutated afterwards. Every
//! change goes through [`ConnectionOptions::modified_clone`], which runs the same
//! normalization again.

use crate::uri::{Uri, UriPart};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Lowest remote API level this client talks to unless configured otherwise
pub const MINIMUM_API_LEVEL: i64 = 319;

/// Default `User-Agent` sent with every request
pub const DEFAULT_USER_AGENT: &str =
    concat!("AkeebaBackupJsonApiClient/", env!("CARGO_PKG_VERSION"));

/// Well-known locations of the system CA bundle
const SYSTEM_CA_BUNDLES: &[&str] = &[
    "/etc/ssl/certs/ca-certificates.crt",
    "/etc/pki/tls/certs/ca-bundle.crt",
    "/etc/ssl/ca-bundle.pem",
    "/etc/pki/ca-trust/extracted/pem/tls-ca-bundle.pem",
    "/etc/ssl/cert.pem",
    "/usr/local/etc/openssl/cert.pem",
    "/usr/local/share/certs/ca-root-nss.crt",
];

/// HTTP verb used to talk to the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Payload in the query string
    Get,
    /// Payload in a form-encoded body
    Post,
}

impl Verb {
    /// Wire name of the verb
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
        }
    }

    /// Case-insensitive parse; anything but GET or POST is `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Verb::Get),
            "POST" => Some(Verb::Post),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote API version selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Legacy v1 API with encapsulated, challenge-signed payloads
    Json,
    /// v2 API, plain parameters authenticated by query string
    Api,
}

impl View {
    /// Wire name of the view
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Json => "json",
            View::Api => "api",
        }
    }

    /// Case-insensitive parse; unknown or empty values are `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(View::Json),
            "api" => Some(View::Api),
            _ => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated connection settings, as read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawOptions {
    /// Site URL, optionally including the endpoint and `option`/`format`/`view` parameters
    pub host: String,
    /// Secret key
    pub secret: String,
    /// `GET`, `POST` or empty to leave it to autodetection
    pub verb: String,
    /// Entry point file, e.g. `index.php`
    pub endpoint: String,
    /// Joomla! component, e.g. `com_akeebabackup`
    pub component: String,
    /// `json` (v1), `api` (v2) or empty
    pub view: String,
    /// Joomla! format, e.g. `raw`
    pub format: String,
    /// `User-Agent` header value
    #[serde(rename = "ua")]
    pub user_agent: String,
    /// CA bundle file
    #[serde(rename = "capath")]
    pub ca_path: String,
    /// Log raw traffic at debug level
    pub verbose: bool,
    /// Legacy alias that turns on `verbose`
    pub debug: bool,
    /// WordPress site using `admin-ajax.php`
    #[serde(rename = "isWordPress")]
    pub is_wordpress: bool,
    /// Lowest acceptable remote API level
    #[serde(rename = "minApiLevel")]
    pub min_api_level: i64,
    /// Subscriber receiving this connection's log events
    #[serde(skip)]
    pub logger: Option<tracing::Dispatch>,
}

impl Default for RawOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            secret: String::new(),
            verb: "GET".to_string(),
            endpoint: "index.php".to_string(),
            component: String::new(),
            view: String::new(),
            format: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ca_path: String::new(),
            verbose: false,
            debug: false,
            is_wordpress: false,
            min_api_level: MINIMUM_API_LEVEL,
            logger: None,
        }
    }
}

/// Values to replace when deriving new options from existing ones.
///
/// Only the fields set to `Some` are applied.
#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    /// New host
    pub host: Option<String>,
    /// New secret
    pub secret: Option<String>,
    /// New verb (`GET`, `POST` or empty)
    pub verb: Option<String>,
    /// New endpoint
    pub endpoint: Option<String>,
    /// New component
    pub component: Option<String>,
    /// New view
    pub view: Option<String>,
    /// New format
    pub format: Option<String>,
    /// New user agent
    pub user_agent: Option<String>,
    /// New CA bundle path
    pub ca_path: Option<String>,
    /// New verbosity
    pub verbose: Option<bool>,
    /// New WordPress flag
    pub is_wordpress: Option<bool>,
    /// New minimum API level
    pub min_api_level: Option<i64>,
    /// New logger
    pub logger: Option<tracing::Dispatch>,
}

/// Validated, normalized and immutable connection options.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    host: String,
    secret: String,
    endpoint: String,
    component: String,
    verb: Option<Verb>,
    format: String,
    view: Option<View>,
    user_agent: String,
    ca_path: String,
    verbose: bool,
    is_wordpress: bool,
    min_api_level: i64,
    logger: Option<tracing::Dispatch>,
}

impl ConnectionOptions {
    /// Validate and normalize raw options.
    ///
    /// Fails with [`Error::MissingSecret`] or [`Error::MissingHost`] when either is absent,
    /// and with [`Error::MalformedUrl`] when the host cannot be parsed.
    pub fn new(mut raw: RawOptions) -> Result<Self> {
        if raw.debug {
            raw.verbose = true;
        }

        if raw.secret.is_empty() {
            return Err(Error::MissingSecret);
        }

        normalize_host(&mut raw)?;

        if raw.host.is_empty() {
            return Err(Error::MissingHost);
        }

        // Solo and WordPress entry points take no format or component
        match endpoint_file(&raw.endpoint) {
            "remote.php" => {
                raw.format.clear();
                raw.component.clear();
            }
            "admin-ajax.php" => {
                raw.format.clear();
                raw.component.clear();
                raw.is_wordpress = true;
            }
            _ => {}
        }

        Ok(Self {
            host: raw.host,
            secret: raw.secret,
            endpoint: raw.endpoint,
            component: raw.component,
            verb: Verb::parse(&raw.verb),
            format: raw.format,
            view: View::parse(&raw.view),
            user_agent: raw.user_agent,
            ca_path: resolve_ca_path(&raw.ca_path),
            verbose: raw.verbose,
            is_wordpress: raw.is_wordpress,
            min_api_level: raw.min_api_level,
            logger: raw.logger,
        })
    }

    /// Build options from a loosely typed JSON object.
    ///
    /// Strings, numbers and booleans are coerced to the type each option expects. In
    /// `strict` mode an unrecognized key fails with [`Error::UnknownOption`]; otherwise it
    /// is ignored.
    pub fn from_map(map: &Map<String, Value>, strict: bool) -> Result<Self> {
        let mut raw = RawOptions::default();

        for (key, value) in map {
            match key.as_str() {
                "host" => raw.host = string_value(value),
                "secret" => raw.secret = string_value(value),
                "verb" => raw.verb = string_value(value),
                "endpoint" => raw.endpoint = string_value(value),
                "component" => raw.component = string_value(value),
                "view" => raw.view = string_value(value),
                "format" => raw.format = string_value(value),
                "ua" => raw.user_agent = string_value(value),
                "capath" => raw.ca_path = string_value(value),
                "verbose" => raw.verbose = bool_value(value),
                "debug" => raw.debug = bool_value(value),
                "isWordPress" => raw.is_wordpress = bool_value(value),
                "minApiLevel" => {
                    raw.min_api_level = int_value(value).unwrap_or(MINIMUM_API_LEVEL)
                }
                unknown if strict => return Err(Error::UnknownOption(unknown.to_string())),
                unknown => tracing::debug!("Ignoring unknown connection option {}", unknown),
            }
        }

        Self::new(raw)
    }

    /// Create an options builder
    pub fn builder() -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::new()
    }

    /// New options with the overrides merged over the current values.
    ///
    /// The result goes through the same normalization as [`ConnectionOptions::new`], so
    /// e.g. switching the endpoint to `remote.php` also clears the format and component.
    pub fn modified_clone(&self, overrides: OptionOverrides) -> Result<Self> {
        let mut raw = self.to_raw();

        if let Some(host) = overrides.host {
            raw.host = host;
        }
        if let Some(secret) = overrides.secret {
            raw.secret = secret;
        }
        if let Some(verb) = overrides.verb {
            raw.verb = verb;
        }
        if let Some(endpoint) = overrides.endpoint {
            raw.endpoint = endpoint;
        }
        if let Some(component) = overrides.component {
            raw.component = component;
        }
        if let Some(view) = overrides.view {
            raw.view = view;
        }
        if let Some(format) = overrides.format {
            raw.format = format;
        }
        if let Some(user_agent) = overrides.user_agent {
            raw.user_agent = user_agent;
        }
        if let Some(ca_path) = overrides.ca_path {
            raw.ca_path = ca_path;
        }
        if let Some(verbose) = overrides.verbose {
            raw.verbose = verbose;
        }
        if let Some(is_wordpress) = overrides.is_wordpress {
            raw.is_wordpress = is_wordpress;
        }
        if let Some(min_api_level) = overrides.min_api_level {
            raw.min_api_level = min_api_level;
        }
        if let Some(logger) = overrides.logger {
            raw.logger = Some(logger);
        }

        Self::new(raw)
    }

    /// The current values as raw options
    pub fn to_raw(&self) -> RawOptions {
        RawOptions {
            host: self.host.clone(),
            secret: self.secret.clone(),
            verb: self.verb.map(|v| v.as_str().to_string()).unwrap_or_default(),
            endpoint: self.endpoint.clone(),
            component: self.component.clone(),
            view: self.view.map(|v| v.as_str().to_string()).unwrap_or_default(),
            format: self.format.clone(),
            user_agent: self.user_agent.clone(),
            ca_path: self.ca_path.clone(),
            verbose: self.verbose,
            debug: false,
            is_wordpress: self.is_wordpress,
            min_api_level: self.min_api_level,
            logger: self.logger.clone(),
        }
    }

    /// Scheme, host and path of the site, without the endpoint
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Secret key
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Entry point file; may be empty
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Joomla! component; may be empty
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Configured verb, `None` when left to autodetection
    pub fn verb(&self) -> Option<Verb> {
        self.verb
    }

    /// Verb used to send requests; an unset verb means GET
    pub fn effective_verb(&self) -> Verb {
        self.verb.unwrap_or(Verb::Get)
    }

    /// Joomla! format; may be empty
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Configured view, `None` when unset (treated as v1)
    pub fn view(&self) -> Option<View> {
        self.view
    }

    /// `User-Agent` header value
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// CA bundle file, empty when the transport's built-in roots apply
    pub fn ca_path(&self) -> &str {
        &self.ca_path
    }

    /// Whether raw traffic is logged
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Whether the site is WordPress using `admin-ajax.php`
    pub fn is_wordpress(&self) -> bool {
        self.is_wordpress
    }

    /// Lowest acceptable remote API level
    pub fn min_api_level(&self) -> i64 {
        self.min_api_level
    }

    /// Subscriber receiving this connection's log events
    pub fn logger(&self) -> Option<&tracing::Dispatch> {
        self.logger.as_ref()
    }
}

/// Fluent builder for [`ConnectionOptions`]
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptionsBuilder {
    raw: RawOptions,
}

impl ConnectionOptionsBuilder {
    /// Create a builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the site URL
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.raw.host = host.into();
        self
    }

    /// Set the secret key
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.raw.secret = secret.into();
        self
    }

    /// Set the verb; `None` leaves it to autodetection
    pub fn verb(mut self, verb: Option<Verb>) -> Self {
        self.raw.verb = verb.map(|v| v.as_str().to_string()).unwrap_or_default();
        self
    }

    /// Set the entry point file
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.raw.endpoint = endpoint.into();
        self
    }

    /// Set the Joomla! component
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.raw.component = component.into();
        self
    }

    /// Set the view; `None` leaves it to autodetection
    pub fn view(mut self, view: Option<View>) -> Self {
        self.raw.view = view.map(|v| v.as_str().to_string()).unwrap_or_default();
        self
    }

    /// Set the Joomla! format
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.raw.format = format.into();
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.raw.user_agent = user_agent.into();
        self
    }

    /// Set the CA bundle file
    pub fn ca_path(mut self, ca_path: impl Into<String>) -> Self {
        self.raw.ca_path = ca_path.into();
        self
    }

    /// Log raw traffic
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.raw.verbose = verbose;
        self
    }

    /// Mark the site as WordPress using `admin-ajax.php`
    pub fn wordpress(mut self, is_wordpress: bool) -> Self {
        self.raw.is_wordpress = is_wordpress;
        self
    }

    /// Set the lowest acceptable remote API level
    pub fn min_api_level(mut self, level: i64) -> Self {
        self.raw.min_api_level = level;
        self
    }

    /// Send this connection's log events to a specific subscriber
    pub fn logger(mut self, logger: impl Into<tracing::Dispatch>) -> Self {
        self.raw.logger = Some(logger.into());
        self
    }

    /// Validate and build the options
    pub fn build(self) -> Result<ConnectionOptions> {
        ConnectionOptions::new(self.raw)
    }
}

/// Make sure the host has an HTTP(S) scheme, lift `option`, `format` and `view` out of
/// its query string and split a trailing `*.php` file off into the endpoint.
fn normalize_host(raw: &mut RawOptions) -> Result<()> {
    let host = raw.host.trim();

    if host.is_empty() {
        raw.host.clear();
        return Ok(());
    }

    let host = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };

    let mut uri = Uri::parse(&host)?;

    let scheme = uri.scheme.to_ascii_lowercase();
    uri.scheme = match scheme.as_str() {
        "http" | "https" => scheme,
        _ => "http".to_string(),
    };

    if let Some(component) = uri.get_var("option").filter(|v| !v.is_empty()) {
        raw.component = component.to_string();
    }
    if let Some(format) = uri.get_var("format").filter(|v| !v.is_empty()) {
        raw.format = format.to_string();
    }
    if let Some(view) = uri.get_var("view").filter(|v| !v.is_empty()) {
        raw.view = view.to_string();
    }

    let (path, endpoint) = split_path(&uri.path);
    let path = path.trim_start_matches(['/', ' ']).to_string();
    let endpoint = endpoint.to_string();

    uri.path = if path.is_empty() {
        String::new()
    } else {
        format!("/{path}")
    };

    if endpoint.ends_with(".php") {
        raw.endpoint = endpoint;
    }

    raw.host = uri.render(&UriPart::BASE);

    Ok(())
}

/// Split a URL path into its directory and a trailing file name.
///
/// A trailing `*.php` file is returned as the endpoint; any other file (e.g. a stray
/// `index.html`) is dropped. A last segment without a dot is part of the directory.
fn split_path(original: &str) -> (&str, &str) {
    let trimmed = original.trim_matches('/');

    if trimmed.is_empty() {
        return ("", "");
    }

    let (path, file) = match trimmed.rsplit_once('/') {
        Some((path, file)) => (path, file),
        None => ("", trimmed),
    };

    if !file.contains('.') {
        return (trimmed, "");
    }

    if file.ends_with(".php") {
        (path, file)
    } else {
        (path, "")
    }
}

/// Last path segment of an endpoint, e.g. `admin-ajax.php` for `wp-admin/admin-ajax.php`
fn endpoint_file(endpoint: &str) -> &str {
    endpoint.rsplit('/').next().unwrap_or(endpoint)
}

fn resolve_ca_path(given: &str) -> String {
    if !given.is_empty() && Path::new(given).is_file() {
        return given.to_string();
    }

    if !given.is_empty() {
        tracing::debug!("CA bundle {} is not a file; using the system bundle", given);
    }

    if let Ok(env_path) = std::env::var("SSL_CERT_FILE") {
        if Path::new(&env_path).is_file() {
            return env_path;
        }
    }

    SYSTEM_CA_BUNDLES
        .iter()
        .find(|candidate| Path::new(candidate).is_file())
        .map(|candidate| candidate.to_string())
        .unwrap_or_default()
}

fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn bool_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
