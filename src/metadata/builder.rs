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

//! Builder for constructing the nested Arrow structure for get_objects().
//!
//! Couchbase has a single unnamed catalog, so the result has at most one
//! row, with a null `catalog_name`. Namespaces, keyspaces, sampled columns
//! and primary indexes are accumulated and then flattened level by level:
//! every list column is built once from its child values and offsets.
//!
//! # Example
//!
//! ```ignore
//! let mut builder = GetObjectsBuilder::new();
//! builder.add_schema("default");
//! builder.add_table(&TableInfo::new("default", "beers"));
//! builder.add_columns(&columns);
//! let reader = builder.build()?;
//! ```

use crate::error::{CouchbaseErrorHelper, Result};
use crate::metadata::schemas::{
    column_fields, column_item, constraint_column_name_item, constraint_fields, constraint_item,
    db_schema_fields, db_schema_item, get_objects_schema, table_fields, table_item, usage_fields,
    usage_item,
};
use crate::metadata::types::{PrimaryKeyInfo, TableColumn, TableInfo, COLUMN_NULLABLE};

use arrow_array::{
    ArrayRef, BooleanArray, Int16Array, Int32Array, ListArray, RecordBatch, RecordBatchIterator,
    RecordBatchReader, StringArray, StructArray,
};
use arrow_buffer::{OffsetBuffer, ScalarBuffer};
use arrow_schema::{ArrowError, Field, Fields};
use std::sync::Arc;

/// Accumulates get_objects() metadata for the single Couchbase catalog.
#[derive(Default)]
pub struct GetObjectsBuilder {
    include_catalog: bool,
    schemas: Vec<SchemaEntry>,
}

struct SchemaEntry {
    name: String,
    tables: Vec<TableEntry>,
}

struct TableEntry {
    info: TableInfo,
    columns: Vec<TableColumn>,
    primary_keys: Vec<PrimaryKeyInfo>,
}

fn arrow_error(e: ArrowError) -> crate::error::Error {
    CouchbaseErrorHelper::invalid_state()
        .message("Failed to build get_objects result")
        .with_source(e)
}

fn list(item: Field, offsets: Vec<i32>, values: ArrayRef) -> Result<ArrayRef> {
    let offsets = OffsetBuffer::new(ScalarBuffer::from(offsets));
    Ok(Arc::new(
        ListArray::try_new(Arc::new(item), offsets, values, None).map_err(arrow_error)?,
    ))
}

fn structs(fields: Vec<Field>, arrays: Vec<ArrayRef>) -> Result<ArrayRef> {
    Ok(Arc::new(
        StructArray::try_new(Fields::from(fields), arrays, None).map_err(arrow_error)?,
    ))
}

/// Offsets for consecutive runs of the given lengths.
fn offsets_of(lengths: impl Iterator<Item = usize>) -> Vec<i32> {
    let mut offsets = vec![0i32];
    let mut current = 0i32;
    for length in lengths {
        current += length as i32;
        offsets.push(current);
    }
    offsets
}

impl GetObjectsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits the catalog row even when no schema was added.
    pub fn add_catalog(&mut self) {
        self.include_catalog = true;
    }

    /// Adds a namespace. Adding one twice is a no-op.
    pub fn add_schema(&mut self, schema_name: &str) {
        self.include_catalog = true;
        if !self.schemas.iter().any(|s| s.name == schema_name) {
            self.schemas.push(SchemaEntry {
                name: schema_name.to_string(),
                tables: Vec::new(),
            });
        }
    }

    fn table_mut(&mut self, schema_name: &str, table_name: &str) -> Option<&mut TableEntry> {
        self.schemas
            .iter_mut()
            .find(|s| s.name == schema_name)?
            .tables
            .iter_mut()
            .find(|t| t.info.table_name == table_name)
    }

    /// Adds a keyspace, creating its namespace when needed.
    pub fn add_table(&mut self, table: &TableInfo) {
        self.add_schema(&table.schema_name);
        if self.table_mut(&table.schema_name, &table.table_name).is_some() {
            return;
        }
        if let Some(schema) = self.schemas.iter_mut().find(|s| s.name == table.schema_name) {
            schema.tables.push(TableEntry {
                info: table.clone(),
                columns: Vec::new(),
                primary_keys: Vec::new(),
            });
        }
    }

    /// Adds columns to the tables they name. Unknown tables are skipped.
    pub fn add_columns(&mut self, columns: &[TableColumn]) {
        for column in columns {
            if let Some(table) = self.table_mut(&column.schema_name, &column.table_name) {
                table.columns.push(column.clone());
            }
        }
    }

    /// Adds primary indexes as `PRIMARY KEY` constraints.
    pub fn add_primary_keys(&mut self, keys: &[PrimaryKeyInfo]) {
        for key in keys {
            if let Some(table) = self.table_mut(&key.schema_name, &key.table_name) {
                table.primary_keys.push(key.clone());
            }
        }
    }

    /// Builds a reader yielding one RecordBatch with the complete result.
    pub fn build(self) -> Result<impl RecordBatchReader + Send> {
        let schema = Arc::new(get_objects_schema());
        let catalog_rows = usize::from(self.include_catalog);
        let tables: Vec<&TableEntry> = self.schemas.iter().flat_map(|s| s.tables.iter()).collect();

        let table_columns = self.columns_list(&tables)?;
        let table_constraints = self.constraints_list(&tables)?;
        let table_structs = structs(
            table_fields(),
            vec![
                Arc::new(StringArray::from_iter_values(
                    tables.iter().map(|t| t.info.table_name.as_str()),
                )),
                Arc::new(StringArray::from_iter_values(
                    tables.iter().map(|t| t.info.table_type.as_str()),
                )),
                table_columns,
                table_constraints,
            ],
        )?;

        let schema_tables = list(
            table_item(),
            offsets_of(self.schemas.iter().map(|s| s.tables.len())),
            table_structs,
        )?;
        let schema_structs = structs(
            db_schema_fields(),
            vec![
                Arc::new(StringArray::from_iter(
                    self.schemas.iter().map(|s| Some(s.name.as_str())),
                )),
                schema_tables,
            ],
        )?;

        let schema_count = if self.include_catalog {
            self.schemas.len()
        } else {
            0
        };
        let catalog_schemas = list(
            db_schema_item(),
            offsets_of(std::iter::repeat(schema_count).take(catalog_rows)),
            schema_structs,
        )?;
        let catalog_names: ArrayRef =
            Arc::new(StringArray::from(vec![None::<&str>; catalog_rows]));

        let batch = RecordBatch::try_new(schema.clone(), vec![catalog_names, catalog_schemas])
            .map_err(arrow_error)?;
        Ok(RecordBatchIterator::new(vec![Ok(batch)], schema))
    }

    fn columns_list(&self, tables: &[&TableEntry]) -> Result<ArrayRef> {
        let columns: Vec<(usize, &TableColumn)> = tables
            .iter()
            .flat_map(|t| t.columns.iter().enumerate())
            .collect();
        let count = columns.len();
        let none_utf8 = || Arc::new(StringArray::from(vec![None::<&str>; count])) as ArrayRef;
        let none_i16 = || Arc::new(Int16Array::from(vec![None::<i16>; count])) as ArrayRef;
        let none_i32 = || Arc::new(Int32Array::from(vec![None::<i32>; count])) as ArrayRef;
        let xdbc_types = || {
            Arc::new(Int16Array::from_iter_values(
                columns.iter().map(|(_, c)| c.xdbc_type),
            )) as ArrayRef
        };

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                columns.iter().map(|(_, c)| c.column_name.as_str()),
            )),
            Arc::new(Int32Array::from_iter_values(
                columns.iter().map(|(i, _)| *i as i32 + 1),
            )),
            none_utf8(),
            xdbc_types(),
            Arc::new(StringArray::from_iter_values(
                columns.iter().map(|(_, c)| c.type_name.as_str()),
            )),
            none_i32(),
            none_i16(),
            none_i16(),
            Arc::new(Int16Array::from(vec![COLUMN_NULLABLE; count])),
            none_utf8(),
            xdbc_types(),
            none_i16(),
            none_i32(),
            Arc::new(StringArray::from(vec![Some("YES"); count])),
            none_utf8(),
            none_utf8(),
            none_utf8(),
            Arc::new(BooleanArray::from(vec![Some(false); count])),
            Arc::new(BooleanArray::from(vec![Some(false); count])),
        ];
        list(
            column_item(),
            offsets_of(tables.iter().map(|t| t.columns.len())),
            structs(column_fields(), arrays)?,
        )
    }

    fn constraints_list(&self, tables: &[&TableEntry]) -> Result<ArrayRef> {
        // One constraint per primary index; each covers the document id.
        let keys: Vec<&PrimaryKeyInfo> = tables.iter().flat_map(|t| t.primary_keys.iter()).collect();
        let count = keys.len();

        let column_names = list(
            constraint_column_name_item(),
            offsets_of(keys.iter().map(|_| 1)),
            Arc::new(StringArray::from_iter_values(
                keys.iter().map(|k| k.column_name.as_str()),
            )),
        )?;
        let usage = list(
            usage_item(),
            vec![0i32; count + 1],
            structs(
                usage_fields(),
                vec![
                    Arc::new(StringArray::from(Vec::<Option<&str>>::new())),
                    Arc::new(StringArray::from(Vec::<Option<&str>>::new())),
                    Arc::new(StringArray::from(Vec::<&str>::new())),
                    Arc::new(StringArray::from(Vec::<&str>::new())),
                ],
            )?,
        )?;
        let constraint_structs = structs(
            constraint_fields(),
            vec![
                Arc::new(StringArray::from_iter(keys.iter().map(|k| k.pk_name.as_deref()))),
                Arc::new(StringArray::from(vec!["PRIMARY KEY"; count])),
                column_names,
                usage,
            ],
        )?;
        list(
            constraint_item(),
            offsets_of(tables.iter().map(|t| t.primary_keys.len())),
            constraint_structs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Array, RecordBatchReader};

    fn column(table: &str, name: &str, type_name: &str, xdbc_type: i16) -> TableColumn {
        TableColumn {
            schema_name: "default".into(),
            table_name: table.into(),
            column_name: name.into(),
            type_name: type_name.into(),
            xdbc_type,
        }
    }

    fn single_batch(builder: GetObjectsBuilder) -> RecordBatch {
        let mut reader = builder.build().unwrap();
        let batch = reader.next().unwrap().unwrap();
        assert!(reader.next().is_none());
        batch
    }

    fn as_list(array: &ArrayRef) -> &ListArray {
        array.as_any().downcast_ref::<ListArray>().unwrap()
    }

    fn as_struct(array: &ArrayRef) -> &StructArray {
        array.as_any().downcast_ref::<StructArray>().unwrap()
    }

    fn as_strings(array: &ArrayRef) -> &StringArray {
        array.as_any().downcast_ref::<StringArray>().unwrap()
    }

    #[test]
    fn test_empty_builder_has_no_rows() {
        let builder = GetObjectsBuilder::new();
        let reader = GetObjectsBuilder::new().build().unwrap();
        assert_eq!(reader.schema().fields().len(), 2);
        assert_eq!(single_batch(builder).num_rows(), 0);
    }

    #[test]
    fn test_catalog_only() {
        let mut builder = GetObjectsBuilder::new();
        builder.add_catalog();
        let batch = single_batch(builder);
        assert_eq!(batch.num_rows(), 1);
        assert!(batch.column(0).is_null(0));
        assert_eq!(as_list(batch.column(1)).value_length(0), 0);
    }

    #[test]
    fn test_nested_structure() {
        let mut builder = GetObjectsBuilder::new();
        builder.add_schema("default");
        builder.add_schema("system");
        builder.add_table(&TableInfo::new("default", "beers"));
        builder.add_table(&TableInfo::new("default", "users"));
        builder.add_table(&TableInfo::new("default", "beers"));
        builder.add_table(&TableInfo::new("system", "dual"));
        builder.add_columns(&[
            column("beers", "name", "string", 12),
            column("beers", "abv", "numeric", 2),
            column("users", "email", "string", 12),
            column("missing", "x", "string", 12),
        ]);
        builder.add_primary_keys(&[PrimaryKeyInfo {
            schema_name: "default".into(),
            table_name: "users".into(),
            column_name: "id".into(),
            key_seq: 1,
            pk_name: Some("#primary".into()),
        }]);
        let batch = single_batch(builder);
        assert_eq!(batch.num_rows(), 1);

        let schemas = as_list(batch.column(1));
        assert_eq!(schemas.value_length(0), 2);
        let schema_structs = as_struct(schemas.values());
        assert_eq!(as_strings(schema_structs.column(0)).value(1), "system");

        let tables = as_list(schema_structs.column(1));
        assert_eq!(tables.value_length(0), 2);
        assert_eq!(tables.value_length(1), 1);
        let table_structs = as_struct(tables.values());
        assert_eq!(as_strings(table_structs.column(0)).value(1), "users");
        assert_eq!(as_strings(table_structs.column(1)).value(0), "TABLE");

        let columns = as_list(table_structs.column(2));
        assert_eq!(columns.value_length(0), 2);
        assert_eq!(columns.value_length(1), 1);
        assert_eq!(columns.value_length(2), 0);
        let column_structs = as_struct(columns.values());
        assert_eq!(as_strings(column_structs.column(0)).value(1), "abv");
        let ordinals = column_structs
            .column(1)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(ordinals.values().to_vec(), vec![1, 2, 1]);
        let xdbc = column_structs
            .column(3)
            .as_any()
            .downcast_ref::<Int16Array>()
            .unwrap();
        assert_eq!(xdbc.value(1), 2);

        let constraints = as_list(table_structs.column(3));
        assert_eq!(constraints.value_length(0), 0);
        assert_eq!(constraints.value_length(1), 1);
        let constraint_structs = as_struct(constraints.values());
        assert_eq!(as_strings(constraint_structs.column(0)).value(0), "#primary");
        assert_eq!(as_strings(constraint_structs.column(1)).value(0), "PRIMARY KEY");
        let key_columns = as_list(constraint_structs.column(2));
        assert_eq!(as_strings(key_columns.values()).value(0), "id");
    }
}
