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

//! Metadata service for executing metadata queries against `system:` catalogs.
//!
//! This module provides the [`MetadataService`] struct that runs the canned
//! catalog queries (keyspaces, namespaces, indexes), merges in the built-in
//! `system` namespace, and samples documents for column information.
//!
//! ## Example
//!
//! ```ignore
//! use couchbase_adbc::metadata::MetadataService;
//!
//! let service = MetadataService::new(executor, runtime);
//! let schemas = service.list_schemas(None)?;
//! let mut tables = service.get_tables(Some("default"), Some("travel%"))?;
//! ```

use crate::error::{CouchbaseErrorHelper, Result};
use crate::executor::grammar::SYSTEM_SCHEMA;
use crate::executor::StatementExecutor;
use crate::metadata::sql::{like_matches, LikePattern, SqlCommandBuilder, VERSION_QUERY};
use crate::metadata::types::{
    catalogs_metadata, columns_metadata, index_info_metadata, primary_keys_metadata,
    schemas_metadata, table_types_metadata, tables_metadata, IndexColumnInfo, PrimaryKeyInfo,
    SchemaInfo, TableColumn, TableInfo, TABLE_TYPE,
};
use crate::reader::{ColumnMeta, ResultCursor, ResultMetadata};
use crate::sampler::SchemaSampler;
use serde_json::{json, Value};
use tracing::debug;

/// Keyspaces of the built-in `system` namespace, which `system:keyspaces`
/// does not list.
pub const SYSTEM_KEYSPACES: [&str; 12] = [
    "dual",
    "datastores",
    "namespaces",
    "keyspaces",
    "indexes",
    "prepareds",
    "completed_requests",
    "active_requests",
    "my_user_info",
    "user_info",
    "nodes",
    "applicable_roles",
];

/// Service for executing metadata queries.
///
/// Wraps a [`StatementExecutor`] and blocks on the connection's runtime, so
/// every method is synchronous.
#[derive(Debug)]
pub struct MetadataService {
    executor: StatementExecutor,
    runtime: tokio::runtime::Handle,
}

impl MetadataService {
    pub fn new(executor: StatementExecutor, runtime: tokio::runtime::Handle) -> Self {
        Self { executor, runtime }
    }

    fn string_field(cursor: &ResultCursor, name: &str) -> Result<Option<String>> {
        Ok(match cursor.get_by_name(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }

    fn run_meta_query(&self, sql: &str, metadata: ResultMetadata) -> Result<ResultCursor> {
        self.runtime
            .block_on(self.executor.execute_meta_query(sql, metadata))
    }

    /// List namespaces, with `system` added when it matches the pattern.
    pub fn list_schemas(&self, schema_pattern: Option<&str>) -> Result<Vec<SchemaInfo>> {
        let sql = SqlCommandBuilder::new()
            .with_schema_pattern(schema_pattern)
            .build_schemas();
        let mut cursor = self.run_meta_query(&sql, schemas_metadata())?;

        let mut schemas = Vec::new();
        while cursor.next() {
            if let Some(schema_name) = Self::string_field(&cursor, "TABLE_SCHEM")? {
                schemas.push(SchemaInfo { schema_name });
            }
        }
        if like_matches(schema_pattern, SYSTEM_SCHEMA) {
            schemas.push(SchemaInfo {
                schema_name: SYSTEM_SCHEMA.to_string(),
            });
        }
        debug!("Found {} schemas", schemas.len());
        Ok(schemas)
    }

    /// List keyspaces, with the `system` keyspaces added when the namespace
    /// pattern matches `system`.
    pub fn list_tables(
        &self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
    ) -> Result<Vec<TableInfo>> {
        let sql = SqlCommandBuilder::new()
            .with_schema_pattern(schema_pattern)
            .with_table_pattern(table_pattern)
            .build_tables();
        let mut cursor = self.run_meta_query(&sql, tables_metadata())?;

        let mut tables = Vec::new();
        while cursor.next() {
            let schema = Self::string_field(&cursor, "TABLE_SCHEM")?;
            if let Some(name) = Self::string_field(&cursor, "TABLE_NAME")? {
                tables.push(TableInfo::new(schema.unwrap_or_default(), name));
            }
        }
        if like_matches(schema_pattern, SYSTEM_SCHEMA) {
            let table_pattern = LikePattern::new(table_pattern);
            tables.extend(
                SYSTEM_KEYSPACES
                    .iter()
                    .filter(|name| table_pattern.matches(name))
                    .map(|name| TableInfo::new(SYSTEM_SCHEMA, *name)),
            );
        }
        debug!("Found {} tables", tables.len());
        Ok(tables)
    }

    /// Sampled columns of one keyspace, filtered by `column_pattern`.
    pub fn list_table_columns(
        &self,
        table: &TableInfo,
        column_pattern: &LikePattern,
    ) -> Result<Vec<TableColumn>> {
        let sampler = SchemaSampler::new(&self.executor);
        let sampled = self.runtime.block_on(sampler.sample(&table.table_ref()))?;
        Ok(sampled
            .into_iter()
            .filter(|column| column_pattern.matches(&column.name))
            .map(|column| TableColumn {
                schema_name: table.schema_name.clone(),
                table_name: table.table_name.clone(),
                type_name: column.type_name().to_string(),
                xdbc_type: column.type_tag.xdbc_type(),
                column_name: column.name,
            })
            .collect())
    }

    /// Sampled columns of every matching keyspace.
    pub fn list_columns(
        &self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<Vec<TableColumn>> {
        let column_pattern = LikePattern::new(column_pattern);
        let mut columns = Vec::new();
        for table in self.list_tables(schema_pattern, table_pattern)? {
            columns.extend(self.list_table_columns(&table, &column_pattern)?);
        }
        Ok(columns)
    }

    pub fn list_primary_keys(
        &self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
    ) -> Result<Vec<PrimaryKeyInfo>> {
        let sql = SqlCommandBuilder::new()
            .with_schema_pattern(schema_pattern)
            .with_table_pattern(table_pattern)
            .build_primary_keys();
        let mut cursor = self.run_meta_query(&sql, primary_keys_metadata())?;

        let mut keys = Vec::new();
        while cursor.next() {
            let key_seq = cursor
                .get_by_name("KEY_SEQ")?
                .as_i64()
                .and_then(|seq| i16::try_from(seq).ok())
                .unwrap_or(1);
            keys.push(PrimaryKeyInfo {
                schema_name: Self::string_field(&cursor, "TABLE_SCHEM")?.unwrap_or_default(),
                table_name: Self::string_field(&cursor, "TABLE_NAME")?.unwrap_or_default(),
                column_name: Self::string_field(&cursor, "COLUMN_NAME")?
                    .unwrap_or_else(|| "id".to_string()),
                key_seq,
                pk_name: Self::string_field(&cursor, "PK_NAME")?,
            });
        }
        Ok(keys)
    }

    pub fn list_index_info(
        &self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        unique: bool,
    ) -> Result<Vec<IndexColumnInfo>> {
        let sql = SqlCommandBuilder::new()
            .with_schema_pattern(schema_pattern)
            .with_table_pattern(table_pattern)
            .unique_only(unique)
            .build_index_info();
        let raw = ResultMetadata::new(
            ["namespace_id", "keyspace_id", "name", "index_key", "is_primary", "condition"]
                .iter()
                .map(|name| ColumnMeta::new(*name, "string"))
                .collect(),
        );
        let mut cursor = self.run_meta_query(&sql, raw)?;

        let mut entries = Vec::new();
        while cursor.next() {
            let index = json!({
                "namespace_id": cursor.get(0)?,
                "keyspace_id": cursor.get(1)?,
                "name": cursor.get(2)?,
                "index_key": cursor.get(3)?,
                "is_primary": cursor.get(4)?,
                "condition": cursor.get(5)?,
            });
            entries.extend(IndexColumnInfo::expand(&index));
        }
        Ok(entries)
    }

    pub fn get_catalogs(&self) -> ResultCursor {
        ResultCursor::empty(catalogs_metadata())
    }

    pub fn get_schemas(&self, schema_pattern: Option<&str>) -> Result<ResultCursor> {
        let rows = self
            .list_schemas(schema_pattern)?
            .iter()
            .map(SchemaInfo::to_row)
            .collect();
        Ok(ResultCursor::flattened(schemas_metadata(), rows))
    }

    pub fn get_tables(
        &self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
    ) -> Result<ResultCursor> {
        let rows = self
            .list_tables(schema_pattern, table_pattern)?
            .iter()
            .map(TableInfo::to_row)
            .collect();
        Ok(ResultCursor::flattened(tables_metadata(), rows))
    }

    pub fn get_columns(
        &self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<ResultCursor> {
        let rows = self
            .list_columns(schema_pattern, table_pattern, column_pattern)?
            .iter()
            .map(TableColumn::to_row)
            .collect();
        Ok(ResultCursor::flattened(columns_metadata(), rows))
    }

    pub fn get_primary_keys(
        &self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
    ) -> Result<ResultCursor> {
        let rows = self
            .list_primary_keys(schema_pattern, table_pattern)?
            .iter()
            .map(PrimaryKeyInfo::to_row)
            .collect();
        Ok(ResultCursor::flattened(primary_keys_metadata(), rows))
    }

    pub fn get_index_info(
        &self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        unique: bool,
    ) -> Result<ResultCursor> {
        let rows = self
            .list_index_info(schema_pattern, table_pattern, unique)?
            .iter()
            .map(IndexColumnInfo::to_row)
            .collect();
        Ok(ResultCursor::flattened(index_info_metadata(), rows))
    }

    pub fn get_table_types(&self) -> ResultCursor {
        ResultCursor::flattened(table_types_metadata(), vec![vec![json!(TABLE_TYPE)]])
    }

    /// Server version as `major.minor`.
    pub fn database_product_version(&self) -> Result<String> {
        let result = self
            .runtime
            .block_on(self.executor.execute_native(VERSION_QUERY, true))?;
        let rows = result.into_cursor().map(ResultCursor::into_rows).unwrap_or_default();
        if let [row] = rows.as_slice() {
            match row.first().and_then(|document| document.get("$1")) {
                Some(Value::String(version)) => return Ok(short_version(version)),
                Some(Value::Null) | None => {}
                Some(other) => return Ok(short_version(&other.to_string())),
            }
        }
        Err(CouchbaseErrorHelper::cluster().message("Unable to fetch database version"))
    }
}

/// Keeps the first two components of a version split on `.` or `-`.
pub fn short_version(version: &str) -> String {
    let mut parts = version.split(['.', '-']);
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!("{}.{}", major, minor),
        (Some(major), None) => major.to_string(),
        _ => String::new(),
    }
}
