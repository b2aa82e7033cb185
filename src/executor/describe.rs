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

//! `DESCRIBE BUCKET` and `DESCRIBE INDEXES`.
//!
//! Every result has the single `result` column of type `map`.

use super::bucket_settings::BucketSettings;
use super::grammar::{DescribeBucketCommand, DescribeTarget, TableRef};
use super::readiness::index_status;
use super::{ExecutionResult, StatementExecutor};
use crate::client::{CouchbaseClient, ManagerRequest};
use crate::error::{CouchbaseErrorHelper, Result};
use crate::reader::{ResultCursor, RESULT_COLUMN, RESULT_TYPE};
use crate::sampler::{SchemaSampler, DEFAULT_NAMESPACE};
use crate::session::encode_path_segment;
use serde_json::Value;

fn result_rows(values: Vec<Value>) -> ExecutionResult {
    ExecutionResult::rows(ResultCursor::single_column(
        RESULT_COLUMN,
        RESULT_TYPE,
        values,
    ))
}

pub async fn describe_bucket(
    executor: &StatementExecutor,
    command: &DescribeBucketCommand,
) -> Result<ExecutionResult> {
    match command.target {
        DescribeTarget::Settings => describe_settings(executor.client()?, &command.table.name).await,
        DescribeTarget::Columns => {
            let table = TableRef::new(
                Some(command.table.schema.as_deref().unwrap_or(DEFAULT_NAMESPACE)),
                command.table.name.clone(),
            );
            let columns = SchemaSampler::new(executor).sample(&table).await?;
            Ok(result_rows(columns.iter().map(|c| c.to_json()).collect()))
        }
    }
}

async fn describe_settings(client: &dyn CouchbaseClient, name: &str) -> Result<ExecutionResult> {
    let response = client
        .manager(ManagerRequest::get(format!(
            "/pools/default/buckets/{}",
            encode_path_segment(name)
        )))
        .await?;
    if response.status == 404 {
        return Err(CouchbaseErrorHelper::cluster().message(format!("Bucket not found: {}", name)));
    }
    let response = response.error_for_status(&format!("Describing bucket {}", name))?;
    let settings = BucketSettings::from_manager_json(&response.json()?)?;
    Ok(result_rows(vec![settings.to_json()]))
}

pub async fn describe_indexes(client: &dyn CouchbaseClient) -> Result<ExecutionResult> {
    let status = index_status(client).await?;
    Ok(result_rows(status.indexes))
}

#[cfg(test)]
mod tests {
    use super::super::grammar::parse_describe_bucket;
    use super::super::test_support::executor_with;
    use super::*;
    use crate::client::mock::MockClient;
    use crate::client::{ManagerResponse, QueryResponse};
    use crate::error::ErrorKind;
    use serde_json::json;

    fn command(sql: &str) -> DescribeBucketCommand {
        parse_describe_bucket(sql).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_describe_settings() {
        let mock = MockClient::new().with_manager(|_, _| {
            Ok(ManagerResponse::new(
                200,
                r#"{"name": "b", "bucketType": "membase", "replicaNumber": 1,
                    "quota": {"rawRAM": 104857600}, "controllers": {}}"#,
            ))
        });
        let (executor, mock) = executor_with(mock);
        let mut cursor = describe_bucket(&executor, &command("DESCRIBE BUCKET b"))
            .await
            .unwrap()
            .into_cursor()
            .unwrap();
        assert_eq!(cursor.metadata().columns()[0].name, "result");
        assert_eq!(cursor.metadata().columns()[0].type_name, "map");
        assert!(cursor.next());
        let settings = cursor.get(0).unwrap();
        assert_eq!(settings["ramQuotaMB"], 100);
        assert_eq!(settings["bucketType"], "couchbase");
        assert_eq!(settings["flushEnabled"], false);
        assert!(!cursor.next());
        assert_eq!(mock.manager_requests()[0].path, "/pools/default/buckets/b");
    }

    #[tokio::test]
    async fn test_describe_missing_bucket() {
        let mock = MockClient::new()
            .with_manager(|_, _| Ok(ManagerResponse::new(404, "Requested resource not found.")));
        let (executor, _) = executor_with(mock);
        let err = describe_bucket(&executor, &command("DESCRIBE BUCKET SETTINGS gone"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClusterCommunication);
    }

    #[tokio::test]
    async fn test_describe_columns_defaults_namespace() {
        let mock = MockClient::new().with_query(|_, _| {
            Ok(QueryResponse::from_rows(vec![json!({"x": 1, "y": {"z": "s"}})]))
        });
        let (executor, mock) = executor_with(mock);
        let mut cursor = describe_bucket(&executor, &command("DESCRIBE BUCKET COLUMNS `b`"))
            .await
            .unwrap()
            .into_cursor()
            .unwrap();
        assert!(mock.queries()[0].starts_with("SELECT t.* FROM default:`b` t"));

        let mut rows = Vec::new();
        while cursor.next() {
            rows.push(cursor.get(0).unwrap().clone());
        }
        assert_eq!(
            rows,
            vec![
                json!({"name": "x", "type": 2, "typeName": "numeric"}),
                json!({"name": "y", "type": 2000, "typeName": "object"}),
                json!({"name": "y.z", "type": 12, "typeName": "string"}),
            ]
        );
    }

    #[tokio::test]
    async fn test_describe_indexes() {
        let mock = MockClient::new().with_manager(|_, _| {
            Ok(ManagerResponse::new(
                200,
                r##"{"indexes": [{"bucket": "a", "index": "#primary"}, {"bucket": "b", "index": "ix"}]}"##,
            ))
        });
        let mut cursor = describe_indexes(&mock).await.unwrap().into_cursor().unwrap();
        assert!(cursor.next());
        assert_eq!(cursor.get_by_name("result").unwrap()["bucket"], "a");
        assert!(cursor.next());
        assert!(!cursor.next());
    }

    #[tokio::test]
    async fn test_describe_indexes_failure() {
        let mock = MockClient::new().with_manager(|_, _| Ok(ManagerResponse::new(500, "boom")));
        let err = describe_indexes(&mock).await.unwrap_err();
        assert!(err.to_string().contains("Failed to retrieve index information"));
    }
}
