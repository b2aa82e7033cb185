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

//! Clients for communicating with a Couchbase cluster.
//!
//! This module provides:
//! - `CouchbaseClient` trait: the two calls everything above the transport needs
//! - `CouchbaseHttpClient`: Low-level HTTP client with retry logic
//! - `RestClient`: Implementation over the query service and cluster manager REST APIs

pub mod http;
pub mod rest;

use crate::error::{CouchbaseErrorHelper, Result};
use crate::uri::ScanConsistency;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

pub use http::{Authenticator, CouchbaseHttpClient, HttpClientConfig, TransportSecurity};
pub use rest::RestClient;

/// Per-request settings for the query service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub scan_consistency: ScanConsistency,
    pub read_only: bool,
    /// Ask the service to report `mutationCount`.
    pub metrics: bool,
}

/// Fully buffered query service result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub rows: Vec<Value>,
    /// Present when the statement mutated documents.
    pub mutation_count: Option<i64>,
}

impl QueryResponse {
    pub fn from_rows(rows: Vec<Value>) -> Self {
        Self {
            rows,
            mutation_count: None,
        }
    }

    pub fn mutations(count: i64) -> Self {
        Self {
            rows: Vec::new(),
            mutation_count: Some(count),
        }
    }
}

/// A call to the cluster manager REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerRequest {
    pub method: Method,
    /// Path and query string, e.g. `/pools/default/buckets`.
    pub path: String,
    /// Form-encoded body parameters.
    pub form: Vec<(String, String)>,
}

impl ManagerRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            form: Vec::new(),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            form: Vec::new(),
        }
    }

    pub fn post_form(path: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            form,
        }
    }

    pub fn is_write(&self) -> bool {
        self.method != Method::GET
    }
}

/// Status and raw body of a manager call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerResponse {
    pub status: u16,
    pub body: String,
}

impl ManagerResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).map_err(|e| {
            CouchbaseErrorHelper::cluster()
                .message(format!("Failed to parse cluster manager response: {}", self.body))
                .with_source(e)
        })
    }

    /// Fails unless the status is 2xx.
    pub fn error_for_status(self, context: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CouchbaseErrorHelper::cluster().message(format!(
                "{} failed with HTTP {}: {}",
                context, self.status, self.body
            )))
        }
    }
}

/// Abstract interface to a Couchbase cluster.
///
/// Implementations buffer full responses; query service errors surface as
/// `ClusterCommunication` errors carrying the server's error entries.
#[async_trait]
pub trait CouchbaseClient: Send + Sync + std::fmt::Debug {
    /// Runs one statement on the query service.
    async fn query(&self, statement: &str, options: &QueryOptions) -> Result<QueryResponse>;

    /// Calls the cluster manager. Non-2xx statuses are returned, not raised.
    async fn manager(&self, request: ManagerRequest) -> Result<ManagerResponse>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_request_constructors() {
        assert!(!ManagerRequest::get("/pools").is_write());
        assert!(ManagerRequest::delete("/pools/default/buckets/b").is_write());
        let post = ManagerRequest::post_form(
            "/pools/default/buckets",
            vec![("name".to_string(), "b".to_string())],
        );
        assert_eq!(post.method, Method::POST);
        assert_eq!(post.form.len(), 1);
    }

    #[test]
    fn test_manager_response_status() {
        let ok = ManagerResponse::new(202, "");
        assert!(ok.is_success());
        let missing = ManagerResponse::new(404, "Requested resource not found.");
        let err = missing.error_for_status("Bucket lookup").unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_manager_response_json() {
        let response = ManagerResponse::new(200, r#"{"name": "b"}"#);
        assert_eq!(response.json().unwrap()["name"], "b");
        assert!(ManagerResponse::new(200, "not json").json().is_err());
    }
}
