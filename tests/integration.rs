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

//! Integration tests for the Couchbase ADBC driver.
//!
//! A wiremock server stands in for both the cluster manager and the query
//! service; the driver is used only through the ADBC traits.

use adbc_core::error::Status;
use adbc_core::options::{OptionConnection, OptionDatabase, OptionValue};
use adbc_core::{Connection as _, Database as _, Driver as _, Optionable, Statement as _};
use arrow_array::cast::AsArray;
use arrow_array::{Array, RecordBatch};
use couchbase_adbc::{Connection, Driver};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A cluster whose manager and query service share one mock server.
struct MockCluster {
    runtime: tokio::runtime::Runtime,
    server: MockServer,
}

impl MockCluster {
    fn start() -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        let cluster = Self { runtime, server };
        let addr = cluster.server.address();
        cluster.mount(
            Mock::given(method("GET"))
                .and(path("/pools/default/nodeServices"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "nodesExt": [{
                        "hostname": addr.ip().to_string(),
                        "services": {"mgmt": addr.port(), "n1ql": addr.port()}
                    }]
                }))),
        );
        cluster
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    /// Answers query statements containing `needle` with `body`.
    fn query(&self, needle: &str, body: serde_json::Value) {
        self.mount(
            Mock::given(method("POST"))
                .and(path("/query/service"))
                .and(body_string_contains(needle))
                .respond_with(ResponseTemplate::new(200).set_body_json(body)),
        );
    }

    fn connect(&self) -> Connection {
        let addr = self.server.address();
        let mut driver = Driver::new();
        let mut database = driver.new_database().expect("Failed to create database");
        database
            .set_option(
                OptionDatabase::Uri,
                OptionValue::String(format!("adbc:couchbase:{}:{}", addr.ip(), addr.port())),
            )
            .unwrap();
        database
            .set_option(OptionDatabase::Username, OptionValue::String("Administrator".into()))
            .unwrap();
        database
            .set_option(OptionDatabase::Password, OptionValue::String("password".into()))
            .unwrap();
        database
            .set_option(
                OptionDatabase::Other("couchbase.http.max_retries".into()),
                OptionValue::Int(0),
            )
            .unwrap();
        database.new_connection().expect("Failed to connect")
    }
}

fn run(connection: &mut Connection, sql: &str) -> Vec<RecordBatch> {
    let mut statement = connection.new_statement().unwrap();
    statement.set_sql_query(sql).unwrap();
    statement
        .execute()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_create_insert_select() {
    let cluster = MockCluster::start();
    cluster.mount(
        Mock::given(method("POST"))
            .and(path("/pools/default/buckets"))
            .respond_with(ResponseTemplate::new(202)),
    );
    cluster.mount(
        Mock::given(method("GET"))
            .and(path("/indexStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "indexes": [{"bucket": "t1", "index": "#primary", "status": "Ready"}]
            }))),
    );
    cluster.query("CREATE PRIMARY INDEX", json!({"results": [], "status": "success"}));
    cluster.query(
        "INSERT INTO",
        json!({"results": [], "status": "success", "metrics": {"mutationCount": 1}}),
    );
    cluster.query(
        "SELECT * FROM t1",
        json!({"results": [{"t1": {"x": 1}}], "status": "success"}),
    );

    let mut connection = cluster.connect();

    let batches = run(&mut connection, "CREATE BUCKET WITH PRIMARY INDEX t1");
    assert!(batches.iter().all(|b| b.num_rows() == 0));

    let mut statement = connection.new_statement().unwrap();
    statement
        .set_sql_query(r#"INSERT INTO t1 (KEY, VALUE) VALUES ("k", {"x": 1})"#)
        .unwrap();
    assert_eq!(statement.execute_update().unwrap(), Some(1));

    let batches = run(&mut connection, "SELECT * FROM t1;");
    assert_eq!(batches.len(), 1);
    let column = batches[0].column(0).as_string::<i32>();
    assert_eq!(column.len(), 1);
    let document: serde_json::Value = serde_json::from_str(column.value(0)).unwrap();
    assert_eq!(document, json!({"t1": {"x": 1}}));
}

#[test]
fn test_drop_then_describe_fails() {
    let cluster = MockCluster::start();
    cluster.query("DROP PRIMARY INDEX", json!({"results": [], "status": "success"}));
    cluster.mount(
        Mock::given(method("DELETE"))
            .and(path("/pools/default/buckets/t1"))
            .respond_with(ResponseTemplate::new(200)),
    );
    cluster.mount(
        Mock::given(method("GET"))
            .and(path("/indexStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexes": []}))),
    );
    cluster.mount(
        Mock::given(method("GET"))
            .and(path("/pools/default/buckets/t1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Requested resource not found.")),
    );

    let mut connection = cluster.connect();
    run(&mut connection, "DROP BUCKET t1");

    let mut statement = connection.new_statement().unwrap();
    statement.set_sql_query("DESCRIBE BUCKET SETTINGS t1").unwrap();
    let err = statement.execute().err().unwrap();
    assert_eq!(err.status, Status::IO);
    assert!(err.message.contains("Bucket not found: t1"));
}

#[test]
fn test_read_only_connection_rejects_writes() {
    let cluster = MockCluster::start();
    let mut connection = cluster.connect();
    connection
        .set_option(OptionConnection::ReadOnly, OptionValue::String("true".into()))
        .unwrap();

    let mut statement = connection.new_statement().unwrap();
    statement.set_sql_query("CREATE BUCKET t1").unwrap();
    let err = statement.execute().err().unwrap();
    assert_eq!(err.status, Status::InvalidState);

    let requests = cluster.runtime.block_on(cluster.server.received_requests()).unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
}

#[test]
fn test_connect_fails_without_cluster() {
    let mut driver = Driver::new();
    let mut database = driver.new_database().unwrap();
    database
        .set_option(
            OptionDatabase::Uri,
            OptionValue::String("adbc:couchbase:127.0.0.1:1?user=a&password=b".into()),
        )
        .unwrap();
    database
        .set_option(
            OptionDatabase::Other("couchbase.http.max_retries".into()),
            OptionValue::Int(0),
        )
        .unwrap();
    let err = database.new_connection().unwrap_err();
    assert_eq!(err.status, Status::IO);
}
