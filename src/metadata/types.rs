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

//! Data structures for metadata query results.
//!
//! These types are read from the `system:` catalog queries (or produced by
//! sampling) and turned into flattened XDBC rows for the metadata cursors,
//! or into the nested `get_objects()` structure.
//!
//! Couchbase has no catalogs: every `TABLE_CAT` is null.

use crate::executor::grammar::{strip_backquotes, TableRef};
use crate::reader::{ColumnMeta, ResultMetadata};
use serde_json::{json, Value};

/// XDBC `columnNullable`.
pub const COLUMN_NULLABLE: i16 = 1;

/// XDBC `tableIndexHashed`.
pub const TABLE_INDEX_HASHED: i16 = 2;

/// The only table type a keyspace has.
pub const TABLE_TYPE: &str = "TABLE";

/// Namespace information from `system:namespaces`.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaInfo {
    pub schema_name: String,
}

impl SchemaInfo {
    pub fn to_row(&self) -> Vec<Value> {
        vec![json!(self.schema_name), Value::Null]
    }
}

/// Keyspace information from `system:keyspaces`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    /// The namespace containing this keyspace.
    pub schema_name: String,
    /// The keyspace (bucket) name.
    pub table_name: String,
    pub table_type: String,
}

impl TableInfo {
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            table_type: TABLE_TYPE.to_string(),
        }
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(Some(&self.schema_name), self.table_name.clone())
    }

    pub fn to_row(&self) -> Vec<Value> {
        let mut row = vec![
            Value::Null,
            json!(self.schema_name),
            json!(self.table_name),
            json!(self.table_type),
        ];
        row.resize(10, Value::Null);
        row
    }
}

/// A sampled column of a keyspace.
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub schema_name: String,
    pub table_name: String,
    /// Dotted path of the field.
    pub column_name: String,
    /// Type tag name (`string`, `object`, ...).
    pub type_name: String,
    /// XDBC type code of the tag.
    pub xdbc_type: i16,
}

impl TableColumn {
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Null,
            json!(self.schema_name),
            json!(self.table_name),
            json!(self.column_name),
            json!(self.xdbc_type),
            json!(self.type_name),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            json!(COLUMN_NULLABLE),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            json!("YES"),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            json!("NO"),
        ]
    }
}

/// A primary index, reported as a key on the document id.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyInfo {
    pub schema_name: String,
    pub table_name: String,
    pub column_name: String,
    pub key_seq: i16,
    pub pk_name: Option<String>,
}

impl PrimaryKeyInfo {
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Null,
            json!(self.schema_name),
            json!(self.table_name),
            json!(self.column_name),
            json!(self.key_seq),
            self.pk_name.as_ref().map_or(Value::Null, |n| json!(n)),
        ]
    }
}

/// One key of one index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumnInfo {
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub non_unique: bool,
    pub index_name: Option<String>,
    /// 1-based position of the key within the index.
    pub ordinal_position: i32,
    pub column_name: String,
    /// `"A"` or `"D"`.
    pub asc_or_desc: &'static str,
    pub filter_condition: Option<String>,
}

impl IndexColumnInfo {
    /// Expands one `system:indexes` row into one entry per index key.
    ///
    /// An index without keys (a primary index) is reported on `id`.
    pub fn expand(index: &Value) -> Vec<IndexColumnInfo> {
        let text = |key: &str| index.get(key).and_then(Value::as_str).map(str::to_string);
        let is_primary = match index.get("is_primary") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };
        let entry = |key: &str, ordinal: i32| {
            let (column, direction) = match key.strip_suffix("DESC") {
                Some(rest) => (rest.trim(), "D"),
                None => (key, "A"),
            };
            IndexColumnInfo {
                schema_name: text("namespace_id"),
                table_name: text("keyspace_id"),
                non_unique: !is_primary,
                index_name: text("name"),
                ordinal_position: ordinal,
                column_name: strip_all_backquotes(column),
                asc_or_desc: direction,
                filter_condition: text("condition"),
            }
        };

        let keys: Vec<String> = match index.get("index_key") {
            Some(Value::Array(keys)) => keys
                .iter()
                .map(|k| match k {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };
        if keys.is_empty() {
            return vec![entry("id", 1)];
        }
        keys.iter()
            .zip(1..)
            .map(|(key, ordinal)| entry(key, ordinal))
            .collect()
    }

    pub fn to_row(&self) -> Vec<Value> {
        let text = |v: &Option<String>| v.as_ref().map_or(Value::Null, |s| json!(s));
        vec![
            Value::Null,
            text(&self.schema_name),
            text(&self.table_name),
            json!(self.non_unique),
            Value::Null,
            text(&self.index_name),
            json!(TABLE_INDEX_HASHED),
            json!(self.ordinal_position),
            json!(self.column_name),
            json!(self.asc_or_desc),
            json!(0),
            json!(0),
            text(&self.filter_condition),
        ]
    }
}

fn strip_all_backquotes(key: &str) -> String {
    let trimmed = strip_backquotes(key.trim());
    trimmed.replace('`', "")
}

fn columns(spec: &[(&str, &str)]) -> ResultMetadata {
    ResultMetadata::new(
        spec.iter()
            .map(|(name, type_name)| ColumnMeta::new(*name, *type_name))
            .collect(),
    )
}

pub fn tables_metadata() -> ResultMetadata {
    columns(&[
        ("TABLE_CAT", "string"),
        ("TABLE_SCHEM", "string"),
        ("TABLE_NAME", "string"),
        ("TABLE_TYPE", "string"),
        ("REMARKS", "string"),
        ("TYPE_CAT", "string"),
        ("TYPE_SCHEM", "string"),
        ("TYPE_NAME", "string"),
        ("SELF_REFERENCING_COL_NAME", "string"),
        ("REF_GENERATION", "string"),
    ])
}

pub fn columns_metadata() -> ResultMetadata {
    columns(&[
        ("TABLE_CAT", "string"),
        ("TABLE_SCHEM", "string"),
        ("TABLE_NAME", "string"),
        ("COLUMN_NAME", "string"),
        ("DATA_TYPE", "numeric"),
        ("TYPE_NAME", "string"),
        ("COLUMN_SIZE", "numeric"),
        ("BUFFER_LENGTH", "numeric"),
        ("DECIMAL_DIGITS", "numeric"),
        ("NUM_PREC_RADIX", "numeric"),
        ("NULLABLE", "numeric"),
        ("REMARKS", "string"),
        ("COLUMN_DEF", "string"),
        ("SQL_DATA_TYPE", "numeric"),
        ("SQL_DATETIME_SUB", "numeric"),
        ("CHAR_OCTET_LENGTH", "numeric"),
        ("ORDINAL_POSITION", "numeric"),
        ("IS_NULLABLE", "string"),
        ("SCOPE_CATLOG", "string"),
        ("SCOPE_SCHEMA", "string"),
        ("SCOPE_TABLE", "string"),
        ("SOURCE_DATA_TYPE", "numeric"),
        ("IS_AUTOINCREMENT", "string"),
    ])
}

pub fn primary_keys_metadata() -> ResultMetadata {
    columns(&[
        ("TABLE_CAT", "string"),
        ("TABLE_SCHEM", "string"),
        ("TABLE_NAME", "string"),
        ("COLUMN_NAME", "string"),
        ("KEY_SEQ", "short"),
        ("PK_NAME", "string"),
    ])
}

pub fn index_info_metadata() -> ResultMetadata {
    columns(&[
        ("TABLE_CAT", "string"),
        ("TABLE_SCHEM", "string"),
        ("TABLE_NAME", "string"),
        ("NON_UNIQUE", "boolean"),
        ("INDEX_QUALIFIER", "string"),
        ("INDEX_NAME", "string"),
        ("TYPE", "numeric"),
        ("ORDINAL_POSITION", "numeric"),
        ("COLUMN_NAME", "string"),
        ("ASC_OR_DESC", "string"),
        ("CARDINALITY", "numeric"),
        ("PAGES", "numeric"),
        ("FILTER_CONDITION", "string"),
    ])
}

pub fn schemas_metadata() -> ResultMetadata {
    columns(&[("TABLE_SCHEM", "string"), ("TABLE_CATALOG", "string")])
}

pub fn catalogs_metadata() -> ResultMetadata {
    columns(&[("TABLE_CAT", "string")])
}

pub fn table_types_metadata() -> ResultMetadata {
    columns(&[("TABLE_TYPE", "string")])
}
