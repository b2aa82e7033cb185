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

//! Column discovery by sampling documents.
//!
//! Buckets have no declared schema, so the columns of a bucket are the
//! union of the field paths seen in up to `meta.sampling.size` documents.
//! Nested object fields are reported as `parent.child`; a `.` or `\` inside
//! a field name is escaped with a backslash.

use crate::error::{CouchbaseErrorHelper, Result};
use crate::executor::grammar::TableRef;
use crate::executor::StatementExecutor;
use crate::metadata::type_mapping::couchbase_type_to_xdbc;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Namespace used when a bucket is named without one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Null,
    Object,
    Array,
    Boolean,
    Double,
    Numeric,
    String,
}

impl TypeTag {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeTag::Null,
            Value::Object(_) => TypeTag::Object,
            Value::Array(_) => TypeTag::Array,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => TypeTag::Numeric,
            Value::Number(_) => TypeTag::Double,
            Value::String(_) => TypeTag::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Object => "object",
            TypeTag::Array => "array",
            TypeTag::Boolean => "boolean",
            TypeTag::Double => "double",
            TypeTag::Numeric => "numeric",
            TypeTag::String => "string",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "null" => TypeTag::Null,
            "object" => TypeTag::Object,
            "array" => TypeTag::Array,
            "boolean" => TypeTag::Boolean,
            "double" => TypeTag::Double,
            "numeric" => TypeTag::Numeric,
            "string" => TypeTag::String,
            _ => return None,
        })
    }

    pub fn xdbc_type(&self) -> i16 {
        couchbase_type_to_xdbc(self.as_str()).unwrap_or_default()
    }
}

/// One discovered column. Equality is by name only.
#[derive(Debug, Clone, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_tag: TypeTag,
}

impl PartialEq for ColumnInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_tag.as_str()
    }

    /// `{name, type, typeName}` as reported by `DESCRIBE BUCKET COLUMNS`.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "type": self.type_tag.xdbc_type(),
            "typeName": self.type_name(),
        })
    }
}

fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if c == '\\' || c == '.' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn qualify(parent: Option<&str>, key: &str) -> String {
    match parent {
        Some(parent) => format!("{}.{}", parent, escape_key(key)),
        None => escape_key(key),
    }
}

/// Accumulates columns across documents in first-seen order.
#[derive(Debug, Default)]
pub struct ColumnCollector {
    columns: Vec<ColumnInfo>,
    positions: HashMap<String, usize>,
}

impl ColumnCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the fields of one document.
    pub fn add_document(&mut self, document: &Map<String, Value>) {
        self.add_fields(document, None);
    }

    fn add_fields(&mut self, fields: &Map<String, Value>, parent: Option<&str>) {
        for (key, value) in fields {
            let name = qualify(parent, key);
            let tag = TypeTag::of(value);
            match self.positions.get(&name) {
                // Only a null observation is replaced.
                Some(&index) => {
                    if self.columns[index].type_tag == TypeTag::Null {
                        self.columns[index].type_tag = tag;
                    }
                }
                None => {
                    self.positions.insert(name.clone(), self.columns.len());
                    self.columns.push(ColumnInfo::new(name.clone(), tag));
                }
            }
            if let Value::Object(children) = value {
                self.add_fields(children, Some(&name));
            }
        }
    }

    pub fn finish(self) -> Vec<ColumnInfo> {
        self.columns
    }
}

/// Infers the columns of a bucket from a sample of its documents.
pub struct SchemaSampler<'a> {
    executor: &'a StatementExecutor,
    sample_size: usize,
}

impl<'a> SchemaSampler<'a> {
    pub fn new(executor: &'a StatementExecutor) -> Self {
        let sample_size = executor.session().parameters().sampling_size();
        Self {
            executor,
            sample_size,
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    fn query_for(&self, table: &TableRef) -> String {
        let namespace = table.schema.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        format!(
            "SELECT t.* FROM {}:`{}` t LIMIT {};",
            namespace, table.name, self.sample_size
        )
    }

    /// Columns of `table`; empty when the keyspace does not exist.
    pub async fn sample(&self, table: &TableRef) -> Result<Vec<ColumnInfo>> {
        let sql = self.query_for(table);
        let result = match self.executor.execute_native(&sql, true).await {
            Ok(result) => result,
            Err(e) if e.is_keyspace_not_found() => {
                debug!("Nothing to sample in {}: {}", table.keyspace(), e);
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(CouchbaseErrorHelper::cluster()
                    .message("Keyspace sampling failed.")
                    .with_source(e))
            }
        };

        let mut collector = ColumnCollector::new();
        if let Some(mut cursor) = result.into_cursor() {
            let mut seen = 0;
            while seen < self.sample_size && cursor.next() {
                seen += 1;
                if let Value::Object(document) = cursor.get(0)? {
                    collector.add_document(document);
                }
            }
            cursor.close();
        }
        let columns = collector.finish();
        debug!("Sampled {} columns from {}", columns.len(), table.keyspace());
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockClient;
    use crate::client::QueryResponse;
    use crate::error::{ErrorKind, ServerError};
    use crate::executor::test_support::executor_with;

    fn collect(documents: &[Value]) -> Vec<(String, &'static str)> {
        let mut collector = ColumnCollector::new();
        for document in documents {
            if let Value::Object(map) = document {
                collector.add_document(map);
            }
        }
        collector
            .finish()
            .into_iter()
            .map(|c| (c.name.clone(), c.type_name()))
            .collect()
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(TypeTag::of(&json!(null)), TypeTag::Null);
        assert_eq!(TypeTag::of(&json!({})), TypeTag::Object);
        assert_eq!(TypeTag::of(&json!([1])), TypeTag::Array);
        assert_eq!(TypeTag::of(&json!(true)), TypeTag::Boolean);
        assert_eq!(TypeTag::of(&json!(7)), TypeTag::Numeric);
        assert_eq!(TypeTag::of(&json!(7.5)), TypeTag::Double);
        assert_eq!(TypeTag::of(&json!("x")), TypeTag::String);
        assert_eq!(TypeTag::of(&json!(1e300)), TypeTag::Double);
        assert_eq!(TypeTag::parse("DOUBLE"), Some(TypeTag::Double));
        assert_eq!(TypeTag::parse("float"), None);
    }

    #[test]
    fn test_null_is_promoted() {
        let columns = collect(&[json!({"a": null}), json!({"a": "x"})]);
        assert_eq!(columns, vec![("a".to_string(), "string")]);
    }

    #[test]
    fn test_first_type_wins() {
        let columns = collect(&[json!({"a": 1}), json!({"a": "x"}), json!({"a": null})]);
        assert_eq!(columns, vec![("a".to_string(), "numeric")]);
    }

    #[test]
    fn test_nested_objects_are_qualified() {
        let columns = collect(&[json!({"a": {"b": 1}})]);
        assert_eq!(
            columns,
            vec![("a".to_string(), "object"), ("a.b".to_string(), "numeric")]
        );
    }

    #[test]
    fn test_arrays_are_terminal() {
        let columns = collect(&[json!({"tags": [{"x": 1}]})]);
        assert_eq!(columns, vec![("tags".to_string(), "array")]);
    }

    #[test]
    fn test_key_escaping() {
        let columns = collect(&[json!({"a.b": {"c\\d": true}})]);
        assert_eq!(
            columns,
            vec![
                ("a\\.b".to_string(), "object"),
                ("a\\.b.c\\\\d".to_string(), "boolean"),
            ]
        );
    }

    #[test]
    fn test_column_json() {
        let column = ColumnInfo::new("a.b", TypeTag::Numeric);
        assert_eq!(
            column.to_json(),
            json!({"name": "a.b", "type": 2, "typeName": "numeric"})
        );
        assert_eq!(column, ColumnInfo::new("a.b", TypeTag::String));
    }

    #[tokio::test]
    async fn test_sample_query_and_limit() {
        let mock = MockClient::new().with_query(|_, _| {
            Ok(QueryResponse::from_rows(vec![
                json!({"id": 1}),
                json!({"id": 2, "name": "x"}),
                json!({"id": 3, "extra": true}),
            ]))
        });
        let (executor, mock) = executor_with(mock);
        let sampler = SchemaSampler::new(&executor).with_sample_size(2);
        let columns = sampler.sample(&TableRef::new(None, "b")).await.unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(mock.queries(), vec!["SELECT t.* FROM default:`b` t LIMIT 2".to_string()]);
    }

    #[tokio::test]
    async fn test_sample_size_from_connection() {
        let (executor, _) = executor_with(MockClient::new());
        assert_eq!(SchemaSampler::new(&executor).sample_size(), 10);
    }

    #[tokio::test]
    async fn test_missing_keyspace_is_empty() {
        let mock = MockClient::new().with_query(|_, _| {
            Err(CouchbaseErrorHelper::cluster()
                .server_errors(vec![ServerError::new("13014", "namespace not found")]))
        });
        let (executor, _) = executor_with(mock);
        let columns = SchemaSampler::new(&executor)
            .sample(&TableRef::new(Some("nope"), "b"))
            .await
            .unwrap();
        assert!(columns.is_empty());
    }

    #[tokio::test]
    async fn test_other_failures_wrap() {
        let mock = MockClient::new().with_query(|_, _| {
            Err(CouchbaseErrorHelper::cluster()
                .server_errors(vec![ServerError::new("5000", "internal")]))
        });
        let (executor, _) = executor_with(mock);
        let err = SchemaSampler::new(&executor)
            .sample(&TableRef::new(None, "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClusterCommunication);
        assert!(err.to_string().starts_with("Keyspace sampling failed."));
    }
}
