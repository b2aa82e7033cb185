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

//! Cluster sessions.
//!
//! A [`ClusterSession`] is the live handle a connection uses for every call.
//! [`ClusterSessionFactory`] builds one from [`ConnectionParameters`]: it picks
//! the transport security and the authenticator, bootstraps the service
//! endpoints and, when a default bucket is configured, checks that it exists.

use crate::client::{
    Authenticator, CouchbaseClient, CouchbaseHttpClient, HttpClientConfig, ManagerRequest,
    RestClient, TransportSecurity,
};
use crate::error::{CouchbaseErrorHelper, Result};
use crate::uri::ConnectionParameters;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Environment variable naming the PEM trust store.
pub const TRUST_STORE_ENV: &str = "COUCHBASE_ADBC_TRUST_STORE";
/// Environment variable naming the PEM key store (client certificate and key).
pub const KEY_STORE_ENV: &str = "COUCHBASE_ADBC_KEY_STORE";

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_');

/// Percent-encodes a bucket name for use in a manager path segment.
pub fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Trust,
    Key,
}

impl StoreKind {
    fn env_var(&self) -> &'static str {
        match self {
            StoreKind::Trust => TRUST_STORE_ENV,
            StoreKind::Key => KEY_STORE_ENV,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            StoreKind::Trust => "trustStore",
            StoreKind::Key => "keyStore",
        }
    }

    /// Reads the store named by the environment; `Ok(None)` when unset.
    fn load(&self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Option<Vec<u8>>> {
        let Some(path) = lookup(self.env_var()).filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        std::fs::read(&path).map(Some).map_err(|e| {
            CouchbaseErrorHelper::invalid_argument()
                .message(format!("Failed to read {} {}", self.label(), path))
                .with_source(e)
        })
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Live handle to a cluster, shared by a connection and its statements.
#[derive(Debug)]
pub struct ClusterSession {
    client: Arc<dyn CouchbaseClient>,
    parameters: ConnectionParameters,
    closed: AtomicBool,
}

impl ClusterSession {
    pub fn new(client: Arc<dyn CouchbaseClient>, parameters: ConnectionParameters) -> Self {
        Self {
            client,
            parameters,
            closed: AtomicBool::new(false),
        }
    }

    /// The cluster client, or an invalid-state error after [`close`](Self::close).
    pub fn client(&self) -> Result<&Arc<dyn CouchbaseClient>> {
        if self.is_closed() {
            return Err(CouchbaseErrorHelper::invalid_state().message("Connection is closed"));
        }
        Ok(&self.client)
    }

    pub fn parameters(&self) -> &ConnectionParameters {
        &self.parameters
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Idempotent; returns `true` for the call that actually closed.
    pub fn close(&self) -> bool {
        let closed_now = !self.closed.swap(true, Ordering::AcqRel);
        if closed_now {
            debug!("Closed session for {}", self.parameters.hosts_raw());
        }
        closed_now
    }
}

/// Builds sessions from connection parameters.
#[derive(Debug, Clone, Default)]
pub struct ClusterSessionFactory {
    http_config: HttpClientConfig,
}

impl ClusterSessionFactory {
    pub fn new(http_config: HttpClientConfig) -> Self {
        Self { http_config }
    }

    /// Opens a session; any failure is reported before a session exists.
    pub async fn open(&self, parameters: ConnectionParameters) -> Result<ClusterSession> {
        self.open_with(parameters, &env_lookup).await
    }

    async fn open_with(
        &self,
        parameters: ConnectionParameters,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<ClusterSession> {
        let security = Self::transport_security(&parameters, lookup)?;
        let authenticator = Self::authenticator(&parameters, lookup)?;
        if security.is_tls() && !parameters.verify_hostnames() {
            warn!("verifyHostnames=false is not supported by the TLS stack and is ignored");
        }
        for key in parameters.ignored_options() {
            warn!("Connection option {} is not supported and is ignored", key);
        }

        let http_client = Arc::new(CouchbaseHttpClient::new(
            self.http_config_for(&parameters),
            authenticator,
            security,
        )?);
        let client = RestClient::bootstrap(http_client, parameters.hosts())
            .await?
            .with_query_timeout(parameters.timeouts().query);
        let client: Arc<dyn CouchbaseClient> = Arc::new(client);

        Self::check_default_bucket(client.as_ref(), &parameters).await?;
        Ok(ClusterSession::new(client, parameters))
    }

    fn http_config_for(&self, parameters: &ConnectionParameters) -> HttpClientConfig {
        let mut config = self.http_config.clone();
        let timeouts = parameters.timeouts();
        if let Some(connect) = timeouts.connect {
            config.connect_timeout = connect;
        }
        let read = [timeouts.query, timeouts.management]
            .into_iter()
            .flatten()
            .max();
        if let Some(read) = read {
            config.read_timeout = read;
        }
        config
    }

    fn transport_security(
        parameters: &ConnectionParameters,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<TransportSecurity> {
        if !parameters.ssl_enabled() {
            return Ok(TransportSecurity::Cleartext);
        }
        if !parameters.verify_server_certificate() {
            warn!("TLS enabled without server certificate verification");
            return Ok(TransportSecurity::TrustAny);
        }
        Ok(TransportSecurity::Verified {
            extra_roots_pem: StoreKind::Trust.load(lookup)?,
        })
    }

    fn authenticator(
        parameters: &ConnectionParameters,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Authenticator> {
        let username = parameters.username().filter(|u| !u.is_empty());
        if parameters.ssl_enabled() && username.is_none() {
            let identity_pem = StoreKind::Key.load(lookup)?.ok_or_else(|| {
                CouchbaseErrorHelper::missing_credentials().message("keyStore path is not provided")
            })?;
            return Ok(Authenticator::Certificate { identity_pem });
        }
        match (username, parameters.password()) {
            (Some(username), Some(password)) => Ok(Authenticator::Password {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(CouchbaseErrorHelper::missing_credentials()
                .message("Username or password is not provided")),
        }
    }

    /// Fails when the configured default bucket does not exist.
    async fn check_default_bucket(
        client: &dyn CouchbaseClient,
        parameters: &ConnectionParameters,
    ) -> Result<()> {
        let Some(keyspace) = parameters.default_bucket() else {
            return Ok(());
        };
        // A `bucket.collection` keyspace opens the bucket part.
        let bucket = keyspace.split('.').next().unwrap_or(keyspace);
        let path = format!("/pools/default/buckets/{}", encode_path_segment(bucket));
        client
            .manager(ManagerRequest::get(path))
            .await?
            .error_for_status(&format!("Opening bucket {}", bucket))?;
        Ok(())
    }
}
