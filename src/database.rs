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

//! Database implementation for the Couchbase ADBC driver.

use crate::client::HttpClientConfig;
use crate::connection::Connection;
use crate::error::CouchbaseErrorHelper;
use crate::logging::{init_logging, LogConfig};
use crate::session::ClusterSessionFactory;
use crate::uri::{property_info, ConnectionParameters, PASSWORD, USER};
use adbc_core::error::Result;
use adbc_core::options::{OptionConnection, OptionDatabase, OptionValue};
use adbc_core::Optionable;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Prefix of database options that overlay connection URL options.
pub const OPTION_PREFIX: &str = "couchbase.";

const LOG_FILE: &str = "couchbase.log_file";
const HTTP_CONNECT_TIMEOUT_MS: &str = "couchbase.http.connect_timeout_ms";
const HTTP_READ_TIMEOUT_MS: &str = "couchbase.http.read_timeout_ms";
const HTTP_MAX_RETRIES: &str = "couchbase.http.max_retries";

/// Represents a database instance that holds connection configuration.
///
/// The connection URL is set with the standard `uri` option. Any URL option
/// can be overridden with `couchbase.<option>`; overrides win over the URL.
#[derive(Debug, Default)]
pub struct Database {
    uri: Option<String>,
    /// URL option overrides, keyed without the `couchbase.` prefix.
    overlay: HashMap<String, String>,
    log_file: Option<String>,
    http_config: HttpClientConfig,
}

impl Database {
    /// Creates a new Database instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the configured URI.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Returns the URL option overrides.
    pub fn overlay(&self) -> &HashMap<String, String> {
        &self.overlay
    }

    /// Parses the configured URI together with the overrides.
    pub fn connection_parameters(&self) -> crate::error::Result<ConnectionParameters> {
        let uri = self.uri.as_ref().ok_or_else(|| {
            CouchbaseErrorHelper::invalid_argument().message("uri not set")
        })?;
        ConnectionParameters::parse(uri, &self.overlay)
    }

    /// Parse a boolean option value.
    pub(crate) fn parse_bool_option(value: &OptionValue) -> Option<bool> {
        match value {
            OptionValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            OptionValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Parse an integer option value.
    pub(crate) fn parse_int_option(value: &OptionValue) -> Option<i64> {
        match value {
            OptionValue::String(s) => s.trim().parse().ok(),
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn string_value(key: &OptionDatabase, value: OptionValue) -> Result<String> {
        match value {
            OptionValue::String(s) => Ok(s),
            OptionValue::Int(i) => Ok(i.to_string()),
            other => Err(CouchbaseErrorHelper::set_invalid_option(key, &other).to_adbc()),
        }
    }

    fn millis_option(key: &OptionDatabase, value: &OptionValue) -> Result<Duration> {
        Self::parse_int_option(value)
            .filter(|v| *v >= 0)
            .map(|v| Duration::from_millis(v as u64))
            .ok_or_else(|| CouchbaseErrorHelper::set_invalid_option(key, value).to_adbc())
    }

    fn log_config(&self, parameters: &ConnectionParameters) -> LogConfig {
        LogConfig {
            level: parameters
                .logging_level_explicit()
                .then(|| parameters.logging_level()),
            file: self.log_file.clone(),
        }
    }
}

impl Optionable for Database {
    type Option = OptionDatabase;

    fn set_option(&mut self, key: Self::Option, value: OptionValue) -> Result<()> {
        match key {
            OptionDatabase::Uri => {
                self.uri = Some(Self::string_value(&key, value)?);
                Ok(())
            }
            OptionDatabase::Username => {
                let user = Self::string_value(&key, value)?;
                self.overlay.insert(USER.to_string(), user);
                Ok(())
            }
            OptionDatabase::Password => {
                let password = Self::string_value(&key, value)?;
                self.overlay.insert(PASSWORD.to_string(), password);
                Ok(())
            }
            OptionDatabase::Other(ref s) => match s.as_str() {
                LOG_FILE => {
                    self.log_file = Some(Self::string_value(&key, value)?);
                    Ok(())
                }
                HTTP_CONNECT_TIMEOUT_MS => {
                    self.http_config.connect_timeout = Self::millis_option(&key, &value)?;
                    Ok(())
                }
                HTTP_READ_TIMEOUT_MS => {
                    self.http_config.read_timeout = Self::millis_option(&key, &value)?;
                    Ok(())
                }
                HTTP_MAX_RETRIES => match Self::parse_int_option(&value) {
                    Some(v) if v >= 0 => {
                        self.http_config.max_retries = v as u32;
                        Ok(())
                    }
                    _ => Err(CouchbaseErrorHelper::set_invalid_option(&key, &value).to_adbc()),
                },
                other => match other.strip_prefix(OPTION_PREFIX) {
                    Some(name) if !name.is_empty() => {
                        let name = name.to_string();
                        let value = Self::string_value(&key, value)?;
                        self.overlay.insert(name, value);
                        Ok(())
                    }
                    _ => Err(CouchbaseErrorHelper::set_unknown_option(&key).to_adbc()),
                },
            },
            _ => Err(CouchbaseErrorHelper::set_unknown_option(&key).to_adbc()),
        }
    }

    fn get_option_string(&self, key: Self::Option) -> Result<String> {
        let not_set = |name: &str| {
            CouchbaseErrorHelper::invalid_state()
                .message(format!("option '{}' is not set", name))
                .to_adbc()
        };
        match key {
            OptionDatabase::Uri => self.uri.clone().ok_or_else(|| not_set("uri")),
            OptionDatabase::Username => self
                .overlay
                .get(USER)
                .cloned()
                .ok_or_else(|| not_set(key.as_ref())),
            OptionDatabase::Other(ref s) => match s.as_str() {
                LOG_FILE => self.log_file.clone().ok_or_else(|| not_set(LOG_FILE)),
                other => {
                    let Some(name) = other.strip_prefix(OPTION_PREFIX) else {
                        return Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc());
                    };
                    if name.eq_ignore_ascii_case(PASSWORD) {
                        return Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc());
                    }
                    if let Some(value) = self
                        .overlay
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(name))
                        .map(|(_, v)| v.clone())
                    {
                        return Ok(value);
                    }
                    // Fall back to the documented default.
                    property_info()
                        .into_iter()
                        .find(|p| p.name.eq_ignore_ascii_case(name))
                        .map(|p| p.default_value)
                        .ok_or_else(|| CouchbaseErrorHelper::get_unknown_option(&key).to_adbc())
                }
            },
            _ => Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc()),
        }
    }

    fn get_option_bytes(&self, key: Self::Option) -> Result<Vec<u8>> {
        Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc())
    }

    fn get_option_int(&self, key: Self::Option) -> Result<i64> {
        match key {
            OptionDatabase::Other(ref s) => match s.as_str() {
                HTTP_CONNECT_TIMEOUT_MS => Ok(self.http_config.connect_timeout.as_millis() as i64),
                HTTP_READ_TIMEOUT_MS => Ok(self.http_config.read_timeout.as_millis() as i64),
                HTTP_MAX_RETRIES => Ok(self.http_config.max_retries as i64),
                _ => Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc()),
            },
            _ => Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc()),
        }
    }

    fn get_option_double(&self, key: Self::Option) -> Result<f64> {
        Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc())
    }
}

impl adbc_core::Database for Database {
    type ConnectionType = Connection;

    fn new_connection(&self) -> Result<Self::ConnectionType> {
        let parameters = self.connection_parameters().map_err(|e| e.to_adbc())?;
        init_logging(&self.log_config(&parameters));
        debug!("Creating connection to {}", parameters.hosts_raw());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                CouchbaseErrorHelper::invalid_state()
                    .message("Failed to create async runtime")
                    .with_source(e)
                    .to_adbc()
            })?;

        let factory = ClusterSessionFactory::new(self.http_config.clone());
        let session = runtime
            .block_on(factory.open(parameters))
            .map_err(|e| e.to_adbc())?;
        Ok(Connection::new_with_runtime(session, runtime))
    }

    fn new_connection_with_opts(
        &self,
        opts: impl IntoIterator<Item = (OptionConnection, OptionValue)>,
    ) -> Result<Self::ConnectionType> {
        let mut connection = self.new_connection()?;
        for (key, value) in opts {
            connection.set_option(key, value)?;
        }
        Ok(connection)
    }
}
