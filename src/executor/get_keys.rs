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

//! `GET KEYS FROM`: document keys from the cluster manager's docs listing.

use super::grammar::GetKeysCommand;
use super::ExecutionResult;
use crate::client::{CouchbaseClient, ManagerRequest};
use crate::error::{CouchbaseErrorHelper, Result};
use crate::reader::ResultCursor;
use crate::session::encode_path_segment;
use serde_json::Value;

fn docs_path(command: &GetKeysCommand) -> String {
    let mut path = format!(
        "/pools/default/buckets/{}/docs?include_docs=false",
        encode_path_segment(&command.table.name)
    );
    if let Some(limit) = command.limit {
        path.push_str(&format!("&limit={}", limit));
    }
    if let Some(offset) = command.offset {
        path.push_str(&format!("&skip={}", offset));
    }
    path
}

pub async fn execute(
    client: &dyn CouchbaseClient,
    command: &GetKeysCommand,
) -> Result<ExecutionResult> {
    if command.table.is_system() {
        return Err(CouchbaseErrorHelper::invalid_argument()
            .message("Cannot get keys from bucket in system schema"));
    }
    let response = client.manager(ManagerRequest::get(docs_path(command))).await?;
    match response.status {
        200 => {}
        404 => {
            return Err(CouchbaseErrorHelper::cluster()
                .message(format!("Bucket not found: {}", command.table.name)))
        }
        status => {
            return Err(CouchbaseErrorHelper::cluster()
                .message(format!("Request did not succeed. Http status: {}", status)))
        }
    }
    let body = response.json()?;
    match body.get("rows") {
        Some(Value::Array(rows)) => Ok(ExecutionResult::rows(ResultCursor::list(rows.clone()))),
        _ => Err(CouchbaseErrorHelper::cluster()
            .message(format!("Result does not contain rows: {}", body))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::grammar::parse_get_keys;
    use super::*;
    use crate::client::mock::MockClient;
    use crate::client::ManagerResponse;
    use crate::error::ErrorKind;
    use crate::reader::RowShape;

    fn command(sql: &str) -> GetKeysCommand {
        parse_get_keys(sql).unwrap().unwrap()
    }

    #[test]
    fn test_docs_path() {
        assert_eq!(
            docs_path(&command("GET KEYS FROM `travel-sample`")),
            "/pools/default/buckets/travel-sample/docs?include_docs=false"
        );
        assert_eq!(
            docs_path(&command("GET KEYS FROM `b%1`")),
            "/pools/default/buckets/b%251/docs?include_docs=false"
        );
        assert_eq!(
            docs_path(&command("GET KEYS FROM b LIMIT 5 OFFSET 10")),
            "/pools/default/buckets/b/docs?include_docs=false&limit=5&skip=10"
        );
    }

    #[tokio::test]
    async fn test_rows_become_list_cursor() {
        let mock = MockClient::new().with_manager(|_, _| {
            Ok(ManagerResponse::new(
                200,
                r#"{"total_rows": 2, "rows": [{"id": "k1"}, {"id": "k2"}]}"#,
            ))
        });
        let mut cursor = execute(&mock, &command("GET KEYS FROM b LIMIT 2"))
            .await
            .unwrap()
            .into_cursor()
            .unwrap();
        assert_eq!(cursor.shape(), RowShape::List);
        assert!(cursor.next());
        assert_eq!(cursor.get(0).unwrap()["id"], "k1");
        assert!(cursor.next());
        assert!(!cursor.next());
        assert_eq!(mock.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_bucket() {
        let mock = MockClient::new()
            .with_manager(|_, _| Ok(ManagerResponse::new(404, "Requested resource not found.")));
        let err = execute(&mock, &command("GET KEYS FROM b")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClusterCommunication);
        assert_eq!(err.to_string(), "Bucket not found: b");
    }

    #[tokio::test]
    async fn test_other_status() {
        let mock = MockClient::new().with_manager(|_, _| Ok(ManagerResponse::new(401, "")));
        let err = execute(&mock, &command("GET KEYS FROM b")).await.unwrap_err();
        assert_eq!(err.to_string(), "Request did not succeed. Http status: 401");
    }

    #[tokio::test]
    async fn test_missing_rows() {
        let mock = MockClient::new().with_manager(|_, _| Ok(ManagerResponse::new(200, r#"{"total_rows": 0}"#)));
        let err = execute(&mock, &command("GET KEYS FROM b")).await.unwrap_err();
        assert!(err.to_string().starts_with("Result does not contain rows: "));
    }

    #[tokio::test]
    async fn test_system_schema_rejected() {
        let mock = MockClient::new();
        let err = execute(&mock, &command("GET KEYS FROM system:keyspaces"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot get keys from bucket in system schema");
        assert!(mock.calls().is_empty());
    }
}
