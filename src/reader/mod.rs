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

//! Result readers that turn row cursors into Arrow record batches.
//!
//! This module provides:
//! - `ResultCursor`: Forward-only rows with declared column types
//! - `CursorReader`: Batches a cursor into Arrow, honoring a shared close flag
//! - `EmptyReader`: Schema-only result for statements without rows

pub mod cursor;

use crate::error::{CouchbaseErrorHelper, Result};
use crate::metadata::type_mapping::couchbase_type_to_arrow;
use arrow_array::builder::{BooleanBuilder, Float64Builder, Int16Builder, Int64Builder, StringBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use cursor::{ColumnMeta, ResultCursor, ResultMetadata, RowShape, RESULT_COLUMN, RESULT_TYPE};

/// Rows per record batch.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Trait for result readers.
pub trait ResultReader: Send {
    /// Get the schema of the result.
    fn schema(&self) -> Result<SchemaRef>;

    /// Get the next record batch, or None if end of results.
    fn next_batch(&mut self) -> Result<Option<RecordBatch>>;
}

pub fn schema_for(metadata: &ResultMetadata) -> SchemaRef {
    let fields: Vec<Field> = metadata
        .columns()
        .iter()
        .map(|column| Field::new(&column.name, couchbase_type_to_arrow(&column.type_name), true))
        .collect();
    Arc::new(Schema::new(fields))
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn build_column(data_type: &DataType, values: &[&Value]) -> ArrayRef {
    match data_type {
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(values.len());
            values.iter().for_each(|v| builder.append_option(as_bool(v)));
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(values.len());
            values.iter().for_each(|v| builder.append_option(as_i64(v)));
            Arc::new(builder.finish())
        }
        DataType::Int16 => {
            let mut builder = Int16Builder::with_capacity(values.len());
            values
                .iter()
                .for_each(|v| builder.append_option(as_i64(v).and_then(|i| i16::try_from(i).ok())));
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(values.len());
            values.iter().for_each(|v| builder.append_option(v.as_f64()));
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * 16);
            values.iter().for_each(|v| builder.append_option(json_text(v)));
            Arc::new(builder.finish())
        }
    }
}

/// Drains a [`ResultCursor`] in batches.
///
/// Once `closed` is set (by the statement starting a new execution) the
/// cursor is closed and no more batches are produced.
pub struct CursorReader {
    cursor: ResultCursor,
    schema: SchemaRef,
    batch_size: usize,
    closed: Arc<AtomicBool>,
}

impl CursorReader {
    pub fn new(cursor: ResultCursor, closed: Arc<AtomicBool>) -> Self {
        let schema = schema_for(cursor.metadata());
        Self {
            cursor,
            schema,
            batch_size: DEFAULT_BATCH_SIZE,
            closed,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl ResultReader for CursorReader {
    fn schema(&self) -> Result<SchemaRef> {
        Ok(self.schema.clone())
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        if self.closed.load(Ordering::Acquire) {
            self.cursor.close();
            return Ok(None);
        }
        let width = self.schema.fields().len();
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(self.batch_size.min(self.cursor.remaining()));
        while rows.len() < self.batch_size && self.cursor.next() {
            let mut row = Vec::with_capacity(width);
            for index in 0..width {
                row.push(self.cursor.get(index)?.clone());
            }
            rows.push(row);
        }
        if rows.is_empty() {
            return Ok(None);
        }

        let columns: Vec<ArrayRef> = self
            .schema
            .fields()
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let values: Vec<&Value> = rows.iter().map(|row| &row[index]).collect();
                build_column(field.data_type(), &values)
            })
            .collect();
        let batch = RecordBatch::try_new(self.schema.clone(), columns).map_err(|e| {
            CouchbaseErrorHelper::invalid_state()
                .message("Failed to build record batch")
                .with_source(e)
        })?;
        tracing::debug!("Produced record batch with {} rows", batch.num_rows());
        Ok(Some(batch))
    }
}

/// Empty reader for statements with no rows (updates, DDL).
pub struct EmptyReader {
    schema: SchemaRef,
}

impl EmptyReader {
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }
}

impl ResultReader for EmptyReader {
    fn schema(&self) -> Result<SchemaRef> {
        Ok(self.schema.clone())
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        Ok(None)
    }
}

/// Adapter to make ResultReader work as arrow's RecordBatchReader.
pub struct ResultReaderAdapter {
    inner: Box<dyn ResultReader + Send>,
    schema: SchemaRef,
}

impl ResultReaderAdapter {
    /// Create a new adapter wrapping a ResultReader.
    pub fn new(inner: Box<dyn ResultReader + Send>) -> Result<Self> {
        let schema = inner.schema()?;
        Ok(Self { inner, schema })
    }
}

impl arrow_array::RecordBatchReader for ResultReaderAdapter {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl Iterator for ResultReaderAdapter {
    type Item = std::result::Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => Some(Err(ArrowError::ExternalError(Box::new(e)))),
        }
    }
}
