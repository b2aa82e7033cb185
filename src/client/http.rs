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

//! HTTP transport for the Couchbase query service and cluster manager.
//!
//! This module provides a low-level HTTP client with:
//! - Connection pooling
//! - Automatic retry with exponential backoff
//! - Basic or client-certificate authentication
//! - TLS trust configuration

use crate::error::{CouchbaseErrorHelper, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, Method, Request, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Read timeout duration.
    pub read_timeout: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retry attempts (doubles each retry).
    pub retry_delay: Duration,
    /// Maximum number of idle connections per host.
    pub max_connections_per_host: usize,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(75),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            max_connections_per_host: 16,
            user_agent: format!("couchbase-adbc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// How the server's certificate is treated.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum TransportSecurity {
    #[default]
    Cleartext,
    /// TLS with system roots plus optional extra PEM roots.
    Verified { extra_roots_pem: Option<Vec<u8>> },
    /// TLS accepting any server certificate.
    TrustAny,
}

impl TransportSecurity {
    pub fn is_tls(&self) -> bool {
        !matches!(self, Self::Cleartext)
    }

    pub fn scheme(&self) -> &'static str {
        if self.is_tls() {
            "https"
        } else {
            "http"
        }
    }
}

impl fmt::Debug for TransportSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cleartext => write!(f, "Cleartext"),
            Self::Verified { extra_roots_pem } => f
                .debug_struct("Verified")
                .field("extra_roots", &extra_roots_pem.is_some())
                .finish(),
            Self::TrustAny => write!(f, "TrustAny"),
        }
    }
}

/// Credentials presented to the cluster.
#[derive(Clone)]
pub enum Authenticator {
    Password { username: String, password: String },
    /// Client certificate and private key in PEM form.
    Certificate { identity_pem: Vec<u8> },
}

impl Authenticator {
    /// `Authorization` header value, if the scheme uses one.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::Password { username, password } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{}:{}", username, password))
            )),
            Self::Certificate { .. } => None,
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Certificate { .. } => write!(f, "Certificate"),
        }
    }
}

/// HTTP client shared by the query and manager calls of one session.
///
/// Non-success statuses are returned to the caller, which owns their
/// interpretation. GET, HEAD and DELETE are retried on 429/502/503/504 and
/// timeouts; any request is retried when the connection cannot be made.
#[derive(Debug)]
pub struct CouchbaseHttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Authenticator,
    security: TransportSecurity,
}

impl CouchbaseHttpClient {
    pub fn new(
        config: HttpClientConfig,
        authenticator: Authenticator,
        security: TransportSecurity,
    ) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .user_agent(&config.user_agent);

        match security {
            TransportSecurity::Cleartext => {}
            TransportSecurity::Verified {
                extra_roots_pem: Some(ref pem),
            } => {
                let roots = reqwest::Certificate::from_pem_bundle(pem).map_err(|e| {
                    CouchbaseErrorHelper::invalid_argument()
                        .message(format!("Failed to read trust store: {}", e))
                })?;
                for root in roots {
                    builder = builder.add_root_certificate(root);
                }
            }
            TransportSecurity::Verified { .. } => {}
            TransportSecurity::TrustAny => {
                warn!("Server certificate verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Authenticator::Certificate { ref identity_pem } = authenticator {
            let identity = reqwest::Identity::from_pem(identity_pem).map_err(|e| {
                CouchbaseErrorHelper::invalid_argument()
                    .message(format!("Failed to read key store: {}", e))
            })?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|e| {
            CouchbaseErrorHelper::cluster().message(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            config,
            authenticator,
            security,
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub fn security(&self) -> &TransportSecurity {
        &self.security
    }

    /// Returns the underlying reqwest client for building requests.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Executes a request, retrying transient failures.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let mut attempts = 0;

        let method = request.method().clone();
        let idempotent = Self::is_idempotent(&method);
        let url = request.url().clone();
        let headers = request.headers().clone();
        let body_bytes = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| b.to_vec());
        let timeout = request.timeout().copied();

        loop {
            attempts += 1;

            let mut req_builder = self.client.request(method.clone(), url.clone());
            for (name, value) in headers.iter() {
                req_builder = req_builder.header(name, value);
            }
            if let Some(auth_header) = self.authenticator.header_value() {
                req_builder = req_builder.header("Authorization", auth_header);
            }
            if let Some(ref body) = body_bytes {
                req_builder = req_builder.body(body.clone());
            }
            if let Some(timeout) = timeout {
                req_builder = req_builder.timeout(timeout);
            }

            let request = req_builder.build().map_err(|e| {
                CouchbaseErrorHelper::cluster().message(format!("Failed to build request: {}", e))
            })?;

            debug!(
                "Executing {} {} (attempt {}/{})",
                method,
                url,
                attempts,
                self.config.max_retries + 1
            );

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    if idempotent
                        && Self::is_retryable_status(status)
                        && attempts <= self.config.max_retries
                    {
                        warn!(
                            "Request failed with {} (attempt {}/{}), retrying...",
                            status,
                            attempts,
                            self.config.max_retries + 1
                        );
                        self.wait_for_retry(attempts).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if Self::is_retryable_error(&e, idempotent)
                        && attempts <= self.config.max_retries
                    {
                        warn!(
                            "Request failed with error (attempt {}/{}): {}, retrying...",
                            attempts,
                            self.config.max_retries + 1,
                            e
                        );
                        self.wait_for_retry(attempts).await;
                        continue;
                    }

                    return Err(CouchbaseErrorHelper::cluster()
                        .message(format!(
                            "HTTP request to {} failed after {} attempts",
                            url, attempts
                        ))
                        .with_source(e));
                }
            }
        }
    }

    fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
        )
    }

    /// A POST may carry DML or create a bucket and must reach the server at most once.
    fn is_idempotent(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::HEAD | Method::DELETE)
    }

    fn is_retryable_error(error: &reqwest::Error, idempotent: bool) -> bool {
        error.is_connect() || (idempotent && error.is_timeout())
    }

    /// Wait with exponential backoff before retry.
    async fn wait_for_retry(&self, attempt: u32) {
        let delay = self.config.retry_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        debug!("Waiting {:?} before retry", delay);
        sleep(delay).await;
    }
}
