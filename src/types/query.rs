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

//! Query service request/response types.
//!
//! These map to the JSON bodies of `POST /query/service`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a query service request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub statement: &'a str,
    pub scan_consistency: &'static str,
    pub readonly: bool,
    pub metrics: bool,
    /// Server-side timeout such as `"75000ms"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Response from the query service.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponseBody {
    #[serde(default, rename = "requestID")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub errors: Vec<Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metrics: Option<QueryMetrics>,
}

impl QueryResponseBody {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
            && self
                .status
                .as_deref()
                .map_or(true, |s| s.eq_ignore_ascii_case("success"))
    }
}

/// Execution metrics reported when `metrics=true`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetrics {
    #[serde(default)]
    pub elapsed_time: Option<String>,
    #[serde(default)]
    pub result_count: Option<i64>,
    #[serde(default)]
    pub mutation_count: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_request_serialization() {
        let request = QueryRequest {
            statement: "SELECT 1",
            scan_consistency: "request_plus",
            readonly: true,
            metrics: true,
            timeout: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "statement": "SELECT 1",
                "scan_consistency": "request_plus",
                "readonly": true,
                "metrics": true
            })
        );
    }

    #[test]
    fn test_response_with_mutations() {
        let body = r#"{
            "requestID": "abc",
            "results": [],
            "status": "success",
            "metrics": {"elapsedTime": "1.2ms", "resultCount": 0, "mutationCount": 3}
        }"#;
        let response: QueryResponseBody = serde_json::from_str(body).unwrap();
        assert!(response.is_success());
        assert_eq!(response.request_id.as_deref(), Some("abc"));
        assert_eq!(response.metrics.unwrap().mutation_count, Some(3));
    }

    #[test]
    fn test_response_with_errors() {
        let body = r#"{
            "errors": [{"code": 12003, "msg": "Keyspace not found in CB datastore: default:missing"}],
            "status": "fatal"
        }"#;
        let response: QueryResponseBody = serde_json::from_str(body).unwrap();
        assert!(!response.is_success());
        assert!(response.results.is_empty());
        assert_eq!(response.errors.len(), 1);
    }
}
