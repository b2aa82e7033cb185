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

//! REST client implementation.
//!
//! Implements `CouchbaseClient` over the query service (`/query/service`) and
//! the cluster manager API, after resolving the query endpoint from the
//! node services map of the first reachable seed node.

use crate::client::{
    CouchbaseClient, CouchbaseHttpClient, ManagerRequest, ManagerResponse, QueryOptions,
    QueryResponse,
};
use crate::error::{CouchbaseErrorHelper, Result, ServerError};
use crate::types::{NodeServices, QueryRequest, QueryResponseBody};
use crate::uri::HostAndPort;
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MANAGER_PORT: u16 = 8091;
const MANAGER_TLS_PORT: u16 = 18091;
const QUERY_PORT: u16 = 8093;
const QUERY_TLS_PORT: u16 = 18093;

pub struct RestClient {
    http_client: Arc<CouchbaseHttpClient>,
    manager_base: String,
    query_base: String,
    query_timeout: Option<Duration>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("manager_base", &self.manager_base)
            .field("query_base", &self.query_base)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

fn bracket_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

impl RestClient {
    pub fn new(
        http_client: Arc<CouchbaseHttpClient>,
        manager_base: impl Into<String>,
        query_base: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            manager_base: manager_base.into().trim_end_matches('/').to_string(),
            query_base: query_base.into().trim_end_matches('/').to_string(),
            query_timeout: None,
        }
    }

    /// Server-side timeout sent with every query.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn manager_base(&self) -> &str {
        &self.manager_base
    }

    pub fn query_base(&self) -> &str {
        &self.query_base
    }

    /// Tries each seed in order until one answers `GET /pools/default/nodeServices`.
    pub async fn bootstrap(http_client: Arc<CouchbaseHttpClient>, seeds: &[HostAndPort]) -> Result<Self> {
        let security = http_client.security().clone();
        let scheme = security.scheme();
        let tls = security.is_tls();
        let mut failures = Vec::new();

        for seed in seeds {
            let manager_port = seed
                .port
                .unwrap_or(if tls { MANAGER_TLS_PORT } else { MANAGER_PORT });
            let manager_base = format!("{}://{}:{}", scheme, seed.url_host(), manager_port);
            let url = format!("{}/pools/default/nodeServices", manager_base);
            debug!("Bootstrapping from {}", url);

            let request = http_client
                .inner()
                .request(Method::GET, &url)
                .build()
                .map_err(|e| {
                    CouchbaseErrorHelper::cluster().message(format!("Failed to build request: {}", e))
                })?;
            let response = match http_client.execute(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Seed node {} is unreachable: {}", seed, e);
                    failures.push(format!("{}: {}", seed, e));
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(CouchbaseErrorHelper::cluster()
                    .message(format!("Authentication failed against {}", seed)));
            }
            if !status.is_success() {
                failures.push(format!("{}: HTTP {}", seed, status.as_u16()));
                continue;
            }
            let body = response.text().await.map_err(|e| {
                CouchbaseErrorHelper::cluster()
                    .message("Failed to read node services")
                    .with_source(e)
            })?;

            let query_base = Self::resolve_query_base(&body, seed, scheme, tls);
            debug!("Resolved query service at {}", query_base);
            return Ok(Self::new(http_client, manager_base, query_base));
        }

        Err(CouchbaseErrorHelper::cluster().message(format!(
            "Could not connect to any seed node: {}",
            failures.join("; ")
        )))
    }

    fn resolve_query_base(body: &str, seed: &HostAndPort, scheme: &str, tls: bool) -> String {
        let service = if tls { "n1qlSSL" } else { "n1ql" };
        let found = serde_json::from_str::<NodeServices>(body)
            .ok()
            .and_then(|services| {
                services
                    .find_service(service)
                    .map(|(host, port)| (host.map(bracket_host), port))
            });
        match found {
            Some((host, port)) => format!(
                "{}://{}:{}",
                scheme,
                host.unwrap_or_else(|| seed.url_host()),
                port
            ),
            None => format!(
                "{}://{}:{}",
                scheme,
                seed.url_host(),
                if tls { QUERY_TLS_PORT } else { QUERY_PORT }
            ),
        }
    }

    /// Converts a query service reply into rows or an error.
    fn parse_query_body(status: u16, body: &str) -> Result<QueryResponse> {
        let parsed: QueryResponseBody = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(CouchbaseErrorHelper::cluster()
                    .message(format!("Query service returned HTTP {}: {}", status, body))
                    .with_source(e))
            }
        };

        if !parsed.is_success() || !(200..300).contains(&status) {
            let errors: Vec<ServerError> = parsed.errors.iter().map(ServerError::from_json).collect();
            return Err(CouchbaseErrorHelper::cluster()
                .message(format!(
                    "Query failed with status {}",
                    parsed.status.as_deref().unwrap_or("unknown")
                ))
                .server_errors(errors));
        }

        Ok(QueryResponse {
            rows: parsed.results,
            mutation_count: parsed.metrics.and_then(|m| m.mutation_count),
        })
    }
}

#[async_trait]
impl CouchbaseClient for RestClient {
    async fn query(&self, statement: &str, options: &QueryOptions) -> Result<QueryResponse> {
        let url = format!("{}/query/service", self.query_base);
        let body = QueryRequest {
            statement,
            scan_consistency: options.scan_consistency.as_str(),
            readonly: options.read_only,
            metrics: options.metrics,
            timeout: self.query_timeout.map(|t| format!("{}ms", t.as_millis())),
        };
        debug!("Executing query at {}: {}", url, statement);

        let request = self
            .http_client
            .inner()
            .request(Method::POST, &url)
            .json(&body)
            .build()
            .map_err(|e| {
                CouchbaseErrorHelper::cluster().message(format!("Failed to build request: {}", e))
            })?;

        let response = self.http_client.execute(request).await?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            CouchbaseErrorHelper::cluster()
                .message("Failed to read query response")
                .with_source(e)
        })?;
        Self::parse_query_body(status, &text)
    }

    async fn manager(&self, request: ManagerRequest) -> Result<ManagerResponse> {
        let url = format!("{}{}", self.manager_base, request.path);
        debug!("Cluster manager call: {} {}", request.method, url);

        let mut builder = self.http_client.inner().request(request.method.clone(), &url);
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        let built = builder.build().map_err(|e| {
            CouchbaseErrorHelper::cluster().message(format!("Failed to build request: {}", e))
        })?;

        let response = self.http_client.execute(built).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            CouchbaseErrorHelper::cluster()
                .message("Failed to read cluster manager response")
                .with_source(e)
        })?;
        Ok(ManagerResponse::new(status, body))
    }
}
