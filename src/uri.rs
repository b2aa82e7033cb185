// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection URL parsing.
//!
//! ```text
//! adbc:couchbase:host1[:port1][,host2[:port2]...][/[keyspace]][?opt=val[&opt=val...]]
//! ```
//!
//! Option values are resolved with the priority overlay > URL option > default.
//! Overlay keys come from ADBC database options and are matched
//! case-insensitively, as are URL option keys.

use crate::error::{CouchbaseErrorHelper, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use tracing::warn;

pub const URI_PREFIX: &str = "adbc:couchbase:";
/// Accepted for URLs copied from JDBC-style tooling.
pub const LEGACY_URI_PREFIX: &str = "jdbc:couchbase:";

pub const USER: &str = "user";
pub const PASSWORD: &str = "password";
pub const ENABLE_SSL: &str = "sslenabled";
pub const VERIFY_SERVER_CERTIFICATE: &str = "verifyServerCertificate";
pub const VERIFY_HOSTNAMES: &str = "verifyHostnames";
pub const DEFAULT_BUCKET: &str = "defaultBucket";
pub const META_SAMPLING_SIZE: &str = "meta.sampling.size";
pub const QUERY_SCAN_CONSISTENCY: &str = "query.scan.consistency";
pub const LOGGING_LEVEL: &str = "loggingLevel";

pub const CONNECT_TIMEOUT: &str = "timeout.connectTimeout";
pub const QUERY_TIMEOUT: &str = "timeout.queryTimeout";
pub const MANAGEMENT_TIMEOUT: &str = "timeout.managementTimeout";

pub const META_SAMPLING_SIZE_DEFAULT: usize = 1000;

const RECOGNIZED_KEYS: &[&str] = &[
    USER,
    PASSWORD,
    ENABLE_SSL,
    VERIFY_SERVER_CERTIFICATE,
    VERIFY_HOSTNAMES,
    DEFAULT_BUCKET,
    META_SAMPLING_SIZE,
    QUERY_SCAN_CONSISTENCY,
    LOGGING_LEVEL,
];

/// `"1"` or `"true"` in any case.
pub fn is_true(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Query scan consistency sent with every native query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanConsistency {
    #[default]
    NotBounded,
    RequestPlus,
}

impl ScanConsistency {
    pub const CHOICES: &'static [&'static str] = &["not_bounded", "request_plus"];

    /// Unknown values fall back to `not_bounded`.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "request_plus" => Self::RequestPlus,
            _ => Self::NotBounded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotBounded => "not_bounded",
            Self::RequestPlus => "request_plus",
        }
    }
}

/// Verbosity named by the `loggingLevel` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingLevel {
    Off,
    #[default]
    Severe,
    Warning,
    Info,
    Fine,
    All,
}

impl LoggingLevel {
    pub const CHOICES: &'static [&'static str] = &["off", "severe", "warning", "info", "fine", "all"];

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "severe" => Some(Self::Severe),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "fine" => Some(Self::Fine),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// The matching `tracing` level name, `None` for `off`.
    pub fn tracing_level(&self) -> Option<&'static str> {
        match self {
            Self::Off => None,
            Self::Severe => Some("error"),
            Self::Warning => Some("warn"),
            Self::Info => Some("info"),
            Self::Fine => Some("debug"),
            Self::All => Some("trace"),
        }
    }
}

/// One seed node from the host list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAndPort {
    pub host: String,
    pub port: Option<u16>,
}

impl HostAndPort {
    fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix('[') {
            let end = rest.find(']').ok_or_else(|| {
                CouchbaseErrorHelper::syntax().message(format!("Invalid host: {}", raw))
            })?;
            let host = rest[..end].to_string();
            let port = match rest[end + 1..].strip_prefix(':') {
                Some(p) => Some(parse_port(raw, p)?),
                None => None,
            };
            return Ok(Self { host, port });
        }
        match raw.matches(':').count() {
            0 => Ok(Self {
                host: raw.to_string(),
                port: None,
            }),
            1 => {
                let (host, port) = raw.split_once(':').unwrap_or((raw, ""));
                Ok(Self {
                    host: host.to_string(),
                    port: Some(parse_port(raw, port)?),
                })
            }
            // Bare IPv6 literal.
            _ => Ok(Self {
                host: raw.to_string(),
                port: None,
            }),
        }
    }

    /// Host formatted for use in an URL authority.
    pub fn url_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

fn parse_port(raw: &str, port: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|_| CouchbaseErrorHelper::syntax().message(format!("Invalid port in host: {}", raw)))
}

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.url_host(), port),
            None => write!(f, "{}", self.url_host()),
        }
    }
}

/// HTTP timeouts taken from forwarded `timeout.*` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    pub connect: Option<Duration>,
    pub query: Option<Duration>,
    pub management: Option<Duration>,
}

/// Parses `500ms`, `10s`, `2m`, or a bare number of milliseconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value, "ms"),
    };
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        _ => None,
    }
}

/// Descriptor of one recognized connection option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub default_value: String,
    pub description: &'static str,
    pub choices: &'static [&'static str],
}

const BOOL_CHOICES: &[&str] = &["true", "false"];

/// Every recognized option with its default and allowed choices.
pub fn property_info() -> Vec<PropertyInfo> {
    fn prop(
        name: &'static str,
        default_value: &str,
        description: &'static str,
        choices: &'static [&'static str],
    ) -> PropertyInfo {
        PropertyInfo {
            name,
            default_value: default_value.to_string(),
            description,
            choices,
        }
    }
    vec![
        prop(
            DEFAULT_BUCKET,
            "",
            "Bucket opened while connecting; required by clusters older than 6.5.",
            &[],
        ),
        prop(ENABLE_SSL, "false", "Enable ssl.", BOOL_CHOICES),
        prop(
            VERIFY_SERVER_CERTIFICATE,
            "true",
            "Set to false to use SSL without verifying the identity of the server.",
            BOOL_CHOICES,
        ),
        prop(
            VERIFY_HOSTNAMES,
            "true",
            "Verifies that the server host matches the name stored in the server certificate.",
            BOOL_CHOICES,
        ),
        prop(USER, "", "Username.", &[]),
        prop(PASSWORD, "", "Password.", &[]),
        prop(
            META_SAMPLING_SIZE,
            &META_SAMPLING_SIZE_DEFAULT.to_string(),
            "Number of documents fetched per bucket to infer column metadata.",
            &[],
        ),
        prop(
            QUERY_SCAN_CONSISTENCY,
            ScanConsistency::NotBounded.as_str(),
            "Query scan consistency.",
            ScanConsistency::CHOICES,
        ),
        prop(LOGGING_LEVEL, "severe", "Driver log verbosity.", LoggingLevel::CHOICES),
    ]
}

/// Parsed, immutable connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    uri: String,
    hosts_raw: String,
    hosts: Vec<HostAndPort>,
    username: Option<String>,
    password: Option<String>,
    ssl_enabled: bool,
    verify_server_certificate: bool,
    verify_hostnames: bool,
    default_bucket: Option<String>,
    scan_consistency: ScanConsistency,
    sampling_size: usize,
    logging_level: LoggingLevel,
    logging_level_explicit: bool,
    options_present: bool,
    forwarded: BTreeMap<String, String>,
    timeouts: ConnectionTimeouts,
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("hosts", &self.hosts)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("ssl_enabled", &self.ssl_enabled)
            .field("verify_server_certificate", &self.verify_server_certificate)
            .field("default_bucket", &self.default_bucket)
            .field("scan_consistency", &self.scan_consistency)
            .field("sampling_size", &self.sampling_size)
            .field("forwarded", &self.forwarded)
            .finish()
    }
}

/// Per-key option values in the order they appeared in the URL.
type OptionMap = HashMap<String, Vec<String>>;

/// Characters re-encoded when a forwarded option is written back out.
const OPTION_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b';')
    .add(b'=');

fn decode_component(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn parse_options(options_part: &str) -> OptionMap {
    let mut map: OptionMap = HashMap::new();
    for part in options_part.split(['&', ';']) {
        if let Some((key, value)) = part.split_once('=') {
            map.entry(decode_component(key).to_ascii_lowercase())
                .or_default()
                .push(decode_component(value));
        }
    }
    map
}

struct OptionResolver<'a> {
    overlay: HashMap<String, &'a str>,
    options: Option<&'a OptionMap>,
}

impl<'a> OptionResolver<'a> {
    fn new(overlay: &'a HashMap<String, String>, options: Option<&'a OptionMap>) -> Self {
        let overlay = overlay
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        Self { overlay, options }
    }

    fn get(&self, name: &str) -> Option<&'a str> {
        let key = name.to_ascii_lowercase();
        if let Some(value) = self.overlay.get(&key) {
            return Some(value);
        }
        self.options
            .and_then(|o| o.get(&key))
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).map(is_true).unwrap_or(default)
    }
}

impl ConnectionParameters {
    /// Parses a connection URL, applying `overlay` on top of its options.
    pub fn parse(url: &str, overlay: &HashMap<String, String>) -> Result<Self> {
        let trimmed = url
            .strip_prefix(URI_PREFIX)
            .or_else(|| url.strip_prefix(LEGACY_URI_PREFIX))
            .ok_or_else(|| {
                CouchbaseErrorHelper::syntax()
                    .message(format!("URI needs to start with {}", URI_PREFIX))
            })?;

        let (server_part, options) = match trimmed.split_once('?') {
            Some((server, opts)) => (server, Some(parse_options(opts))),
            None => (trimmed, None),
        };
        let (hosts_raw, keyspace) = match server_part.rfind('/') {
            Some(idx) => (&server_part[..idx], Some(&server_part[idx + 1..])),
            None => (server_part, None),
        };

        let hosts = hosts_raw
            .split(',')
            .filter(|h| !h.trim().is_empty())
            .map(HostAndPort::parse)
            .collect::<Result<Vec<_>>>()?;
        if hosts.is_empty() {
            return Err(CouchbaseErrorHelper::syntax().message("URI does not contain any host"));
        }

        let resolver = OptionResolver::new(overlay, options.as_ref());

        let logging_level = match resolver.get(LOGGING_LEVEL) {
            Some(raw) => LoggingLevel::parse(raw).unwrap_or_else(|| {
                warn!("Unknown logging level {}, using severe", raw);
                LoggingLevel::default()
            }),
            None => LoggingLevel::default(),
        };
        let sampling_size = resolver
            .get(META_SAMPLING_SIZE)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(META_SAMPLING_SIZE_DEFAULT);

        let default_bucket = match keyspace {
            Some(ns) if !ns.is_empty() => Some(ns.to_string()),
            _ => resolver.get(DEFAULT_BUCKET).map(str::to_string),
        };

        let recognized: Vec<String> = RECOGNIZED_KEYS
            .iter()
            .map(|k| k.to_ascii_lowercase())
            .collect();
        let forwarded: BTreeMap<String, String> = options
            .iter()
            .flat_map(|o| o.iter())
            .filter(|(key, _)| !recognized.contains(*key))
            .filter_map(|(key, values)| values.last().map(|v| (key.clone(), v.clone())))
            .collect();

        let timeout = |name: &str| {
            forwarded
                .get(&name.to_ascii_lowercase())
                .and_then(|v| parse_duration(v))
        };
        let timeouts = ConnectionTimeouts {
            connect: timeout(CONNECT_TIMEOUT),
            query: timeout(QUERY_TIMEOUT),
            management: timeout(MANAGEMENT_TIMEOUT),
        };

        Ok(Self {
            uri: url.to_string(),
            hosts_raw: hosts_raw.to_string(),
            hosts,
            username: resolver.get(USER).map(str::to_string),
            password: resolver.get(PASSWORD).map(str::to_string),
            ssl_enabled: resolver.get_bool(ENABLE_SSL, false),
            verify_server_certificate: resolver.get_bool(VERIFY_SERVER_CERTIFICATE, true),
            verify_hostnames: resolver.get_bool(VERIFY_HOSTNAMES, true),
            default_bucket,
            scan_consistency: resolver
                .get(QUERY_SCAN_CONSISTENCY)
                .map(ScanConsistency::parse)
                .unwrap_or_default(),
            sampling_size,
            logging_level,
            logging_level_explicit: resolver.get(LOGGING_LEVEL).is_some(),
            options_present: options.is_some(),
            forwarded,
            timeouts,
        })
    }

    /// Host list plus forwarded options in sorted key order.
    pub fn connection_string(&self) -> String {
        if !self.options_present {
            return self.hosts_raw.clone();
        }
        let pairs: Vec<String> = self
            .forwarded
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, OPTION_COMPONENT),
                    utf8_percent_encode(v, OPTION_COMPONENT)
                )
            })
            .collect();
        format!("{}?{}", self.hosts_raw, pairs.join("&"))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The host list exactly as written in the URL.
    pub fn hosts_raw(&self) -> &str {
        &self.hosts_raw
    }

    pub fn hosts(&self) -> &[HostAndPort] {
        &self.hosts
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn ssl_enabled(&self) -> bool {
        self.ssl_enabled
    }

    pub fn verify_server_certificate(&self) -> bool {
        self.verify_server_certificate
    }

    pub fn verify_hostnames(&self) -> bool {
        self.verify_hostnames
    }

    /// Raw `bucket[.collection]` keyspace, if any.
    pub fn default_bucket(&self) -> Option<&str> {
        self.default_bucket.as_deref()
    }

    pub fn scan_consistency(&self) -> ScanConsistency {
        self.scan_consistency
    }

    pub fn sampling_size(&self) -> usize {
        self.sampling_size
    }

    pub fn logging_level(&self) -> LoggingLevel {
        self.logging_level
    }

    /// Whether `loggingLevel` was given rather than defaulted.
    pub fn logging_level_explicit(&self) -> bool {
        self.logging_level_explicit
    }

    pub fn forwarded_options(&self) -> &BTreeMap<String, String> {
        &self.forwarded
    }

    /// Forwarded options the driver does not act on; only the three timeouts are used.
    pub fn ignored_options(&self) -> impl Iterator<Item = &str> {
        self.forwarded.keys().map(String::as_str).filter(|key| {
            ![CONNECT_TIMEOUT, QUERY_TIMEOUT, MANAGEMENT_TIMEOUT]
                .iter()
                .any(|t| t.eq_ignore_ascii_case(key))
        })
    }

    pub fn timeouts(&self) -> &ConnectionTimeouts {
        &self.timeouts
    }
}

impl fmt::Display for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}
