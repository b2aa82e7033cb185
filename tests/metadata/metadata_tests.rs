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

//! Integration tests for Connection metadata methods.
//!
//! These tests run against a real Couchbase cluster and verify
//! `get_objects()`, `get_table_schema()`, `get_table_types()` and
//! `get_info()`.
//!
//! ## Setup Requirements
//!
//! These tests require the following environment variables to be set:
//! - `COUCHBASE_URI`: The connection URL (e.g., "adbc:couchbase:localhost")
//! - `COUCHBASE_USER`: A user allowed to read the system catalog
//! - `COUCHBASE_PASSWORD`: The user's password
//!
//! Optionally:
//! - `COUCHBASE_TEST_BUCKET`: A bucket holding at least one document
//!   (default: "travel-sample")
//!
//! ## Running Tests
//!
//! These tests are marked with `#[ignore]` to prevent them from running in CI
//! without a cluster. To run them locally:
//!
//! ```bash
//! export COUCHBASE_URI="adbc:couchbase:localhost"
//! export COUCHBASE_USER="Administrator"
//! export COUCHBASE_PASSWORD="password"
//!
//! cargo test --test metadata_tests -- --ignored --nocapture
//! ```

use adbc_core::options::{InfoCode, ObjectDepth, OptionDatabase, OptionValue};
use adbc_core::Connection as _;
use adbc_core::Database as _;
use adbc_core::Driver as _;
use adbc_core::Optionable;
use arrow_array::cast::AsArray;
use arrow_array::{Array, RecordBatch, RecordBatchReader};
use arrow_schema::DataType;
use couchbase_adbc::Driver;
use std::collections::HashSet;
use std::env;

/// Helper struct for test configuration.
struct TestConfig {
    uri: String,
    user: String,
    password: String,
    bucket: String,
}

impl TestConfig {
    /// Creates a TestConfig from environment variables.
    ///
    /// Panics if required environment variables are not set.
    fn from_env() -> Self {
        Self {
            uri: env::var("COUCHBASE_URI").expect("COUCHBASE_URI not set"),
            user: env::var("COUCHBASE_USER").expect("COUCHBASE_USER not set"),
            password: env::var("COUCHBASE_PASSWORD").expect("COUCHBASE_PASSWORD not set"),
            bucket: env::var("COUCHBASE_TEST_BUCKET")
                .unwrap_or_else(|_| "travel-sample".to_string()),
        }
    }
}

/// Creates a connected database and connection for testing.
fn create_test_connection() -> couchbase_adbc::Connection {
    let config = TestConfig::from_env();

    let mut driver = Driver::new();
    let mut database = driver.new_database().expect("Failed to create database");

    database
        .set_option(OptionDatabase::Uri, OptionValue::String(config.uri))
        .expect("Failed to set uri");
    database
        .set_option(OptionDatabase::Username, OptionValue::String(config.user))
        .expect("Failed to set username");
    database
        .set_option(OptionDatabase::Password, OptionValue::String(config.password))
        .expect("Failed to set password");
    database
        .set_option(
            OptionDatabase::Other("couchbase.meta.sampling.size".into()),
            OptionValue::String("100".into()),
        )
        .expect("Failed to set sampling size");

    database.new_connection().expect("Failed to connect")
}

fn collect(reader: impl RecordBatchReader) -> Vec<RecordBatch> {
    reader
        .collect::<Result<Vec<_>, _>>()
        .expect("reading batches should succeed")
}

/// Table names under the first catalog row, across all schemas.
fn table_names(batches: &[RecordBatch]) -> Vec<(String, String)> {
    let mut names = Vec::new();
    for batch in batches {
        for row in 0..batch.num_rows() {
            let schemas = batch.column(1).as_list::<i32>().value(row);
            let schemas = schemas.as_struct();
            let schema_names = schemas.column(0).as_string::<i32>();
            let tables = schemas.column(1).as_list::<i32>();
            for s in 0..schemas.len() {
                let table_struct = tables.value(s);
                let table_struct = table_struct.as_struct();
                let table_col = table_struct.column(0).as_string::<i32>();
                for t in 0..table_struct.len() {
                    names.push((schema_names.value(s).to_string(), table_col.value(t).to_string()));
                }
            }
        }
    }
    names
}

// =============================================================================
// get_objects Tests at Various Depths
// =============================================================================

/// The single unnamed catalog is the only catalog row.
#[test]
#[ignore]
fn test_get_objects_catalogs_depth() {
    let connection = create_test_connection();

    let reader = connection
        .get_objects(ObjectDepth::Catalogs, None, None, None, None, None)
        .expect("get_objects should succeed");

    let schema = reader.schema();
    assert_eq!(schema.fields().len(), 2, "Should have 2 top-level fields");
    assert_eq!(schema.field(0).name(), "catalog_name");
    assert_eq!(schema.field(1).name(), "catalog_db_schemas");

    let batches = collect(reader);
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 1, "Should have exactly one catalog");
    assert!(batches[0].column(0).is_null(0), "catalog_name should be null");
}

/// Namespaces include `default` and the synthetic `system`.
#[test]
#[ignore]
fn test_get_objects_schemas_depth() {
    let connection = create_test_connection();

    let batches = collect(
        connection
            .get_objects(ObjectDepth::Schemas, None, None, None, None, None)
            .expect("get_objects should succeed"),
    );

    let schemas = batches[0].column(1).as_list::<i32>().value(0);
    let names = schemas.as_struct().column(0).as_string::<i32>();
    let names: Vec<&str> = (0..names.len()).map(|i| names.value(i)).collect();
    println!("Found schemas: {:?}", names);
    assert!(names.contains(&"default"));
    assert!(names.contains(&"system"));
}

/// The test bucket is listed as a table of `default`.
#[test]
#[ignore]
fn test_get_objects_tables_depth() {
    let config = TestConfig::from_env();
    let connection = create_test_connection();

    let batches = collect(
        connection
            .get_objects(
                ObjectDepth::Tables,
                None,
                Some("default"),
                Some(&config.bucket),
                None,
                None,
            )
            .expect("get_objects should succeed"),
    );

    let names = table_names(&batches);
    println!("Found tables: {:?}", names);
    assert_eq!(names, vec![("default".to_string(), config.bucket.clone())]);
}

/// Full depth samples columns of the test bucket.
#[test]
#[ignore]
fn test_get_objects_columns_depth() {
    let config = TestConfig::from_env();
    let connection = create_test_connection();

    let batches = collect(
        connection
            .get_objects(
                ObjectDepth::All,
                None,
                Some("default"),
                Some(&config.bucket),
                None,
                None,
            )
            .expect("get_objects should succeed"),
    );

    let schemas = batches[0].column(1).as_list::<i32>().value(0);
    let tables = schemas.as_struct().column(1).as_list::<i32>().value(0);
    let columns = tables.as_struct().column(2).as_list::<i32>().value(0);
    let columns = columns.as_struct();
    println!("Sampled {} columns", columns.len());
    assert!(columns.len() > 0, "Should have sampled columns");

    let ordinals = columns.column(1).as_primitive::<arrow_array::types::Int32Type>();
    assert_eq!(ordinals.value(0), 1);
}

// =============================================================================
// get_objects Filter Tests
// =============================================================================

/// A named catalog filter matches nothing.
#[test]
#[ignore]
fn test_get_objects_with_catalog_filter() {
    let connection = create_test_connection();

    let batches = collect(
        connection
            .get_objects(ObjectDepth::Catalogs, Some("main"), None, None, None, None)
            .expect("get_objects should succeed"),
    );
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 0);
}

/// System keyspaces follow both patterns.
#[test]
#[ignore]
fn test_get_objects_with_schema_pattern() {
    let connection = create_test_connection();

    let batches = collect(
        connection
            .get_objects(
                ObjectDepth::Tables,
                None,
                Some("sys%"),
                Some("d%"),
                None,
                None,
            )
            .expect("get_objects should succeed"),
    );

    let names = table_names(&batches);
    println!("Found tables: {:?}", names);
    assert!(names.iter().all(|(schema, _)| schema == "system"));
    assert!(names.iter().any(|(_, table)| table == "dual"));
}

/// Only `TABLE` exists, so other types filter everything out.
#[test]
#[ignore]
fn test_get_objects_with_table_type_filter() {
    let connection = create_test_connection();

    let batches = collect(
        connection
            .get_objects(
                ObjectDepth::Tables,
                None,
                None,
                None,
                Some(vec!["VIEW"]),
                None,
            )
            .expect("get_objects should succeed"),
    );
    assert!(table_names(&batches).is_empty());
}

// =============================================================================
// get_table_schema Tests
// =============================================================================

#[test]
#[ignore]
fn test_get_table_schema_existing_table() {
    let config = TestConfig::from_env();
    let connection = create_test_connection();

    let schema = connection
        .get_table_schema(None, Some("default"), &config.bucket)
        .expect("get_table_schema should succeed");

    println!("Bucket {} schema:", config.bucket);
    for field in schema.fields() {
        println!("  - {} : {:?}", field.name(), field.data_type());
    }

    assert!(!schema.fields().is_empty(), "Bucket should have columns");
    assert!(schema.fields().iter().all(|f| f.is_nullable()));
}

/// A missing keyspace samples to an empty schema.
#[test]
#[ignore]
fn test_get_table_schema_nonexistent_table() {
    let connection = create_test_connection();

    let schema = connection
        .get_table_schema(None, Some("default"), "___nonexistent_bucket_12345___")
        .expect("get_table_schema should succeed");
    assert!(schema.fields().is_empty());
}

// =============================================================================
// get_table_types / get_info Tests
// =============================================================================

#[test]
#[ignore]
fn test_get_table_types() {
    let connection = create_test_connection();

    let reader = connection
        .get_table_types()
        .expect("get_table_types should succeed");

    let schema = reader.schema();
    assert_eq!(schema.fields().len(), 1, "Should have 1 field");
    assert_eq!(schema.field(0).name(), "table_type");
    assert_eq!(schema.field(0).data_type(), &DataType::Utf8);

    let batches = collect(reader);
    let types = batches[0].column(0).as_string::<i32>();
    let types: Vec<&str> = (0..types.len()).map(|i| types.value(i)).collect();
    assert_eq!(types, vec!["TABLE"]);
}

#[test]
#[ignore]
fn test_get_info_vendor_version() {
    let connection = create_test_connection();

    let batches = collect(
        connection
            .get_info(Some(HashSet::from([InfoCode::VendorVersion])))
            .expect("get_info should succeed"),
    );
    assert_eq!(batches[0].num_rows(), 1);
    let value = batches[0].column(1).as_union().value(0);
    let version = value.as_string::<i32>().value(0).to_string();
    println!("Server version: {}", version);
    assert_eq!(version.split('.').count(), 2, "Should be major.minor");
}
