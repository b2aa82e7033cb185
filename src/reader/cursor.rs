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

//! Forward-only row cursor over fully buffered results.
//!
//! `next()` returns `false` once the rows run out or the cursor is closed,
//! and keeps returning `false`. Reading a value without a current row, or
//! from a column that does not exist, fails with `ResultExhausted`.

use crate::error::{CouchbaseErrorHelper, Result};
use serde_json::Value;
use std::collections::VecDeque;

/// Column holding whole documents and command results.
pub const RESULT_COLUMN: &str = "result";
/// Declared type of [`RESULT_COLUMN`].
pub const RESULT_TYPE: &str = "map";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMetadata {
    columns: Vec<ColumnMeta>,
}

impl ResultMetadata {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self { columns }
    }

    /// The single `result` column of type `map`.
    pub fn result_column() -> Self {
        Self::new(vec![ColumnMeta::new(RESULT_COLUMN, RESULT_TYPE)])
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Exact match first, then ASCII case-insensitive.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// One column holding a JSON object per row.
    Document,
    /// Named metadata columns with declared types.
    Flattened,
    /// One value per row.
    List,
}

#[derive(Debug)]
pub struct ResultCursor {
    shape: RowShape,
    metadata: ResultMetadata,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    closed: bool,
}

impl ResultCursor {
    fn build(shape: RowShape, metadata: ResultMetadata, rows: Vec<Vec<Value>>) -> Self {
        Self {
            shape,
            metadata,
            rows: rows.into(),
            current: None,
            closed: false,
        }
    }

    /// Query service rows, each exposed whole in the `result` column.
    pub fn documents(rows: Vec<Value>) -> Self {
        Self::build(
            RowShape::Document,
            ResultMetadata::result_column(),
            rows.into_iter().map(|row| vec![row]).collect(),
        )
    }

    /// One named column holding one value per row.
    pub fn single_column(
        name: impl Into<String>,
        type_name: impl Into<String>,
        values: Vec<Value>,
    ) -> Self {
        Self::build(
            RowShape::Document,
            ResultMetadata::new(vec![ColumnMeta::new(name, type_name)]),
            values.into_iter().map(|value| vec![value]).collect(),
        )
    }

    /// Elements of a list, one per row.
    pub fn list(values: Vec<Value>) -> Self {
        Self::build(
            RowShape::List,
            ResultMetadata::result_column(),
            values.into_iter().map(|value| vec![value]).collect(),
        )
    }

    /// Rows given column by column. Short rows are padded with nulls.
    pub fn flattened(metadata: ResultMetadata, rows: Vec<Vec<Value>>) -> Self {
        let width = metadata.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self::build(RowShape::Flattened, metadata, rows)
    }

    /// Rows given as JSON objects keyed by column name.
    pub fn from_objects(metadata: ResultMetadata, objects: Vec<Value>) -> Self {
        let rows = objects
            .into_iter()
            .map(|object| {
                metadata
                    .columns()
                    .iter()
                    .map(|column| object.get(&column.name).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self::build(RowShape::Flattened, metadata, rows)
    }

    pub fn empty(metadata: ResultMetadata) -> Self {
        Self::build(RowShape::Flattened, metadata, Vec::new())
    }

    pub fn shape(&self) -> RowShape {
        self.shape
    }

    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    /// Rows not yet reached by `next()`.
    pub fn remaining(&self) -> usize {
        if self.closed {
            0
        } else {
            self.rows.len()
        }
    }

    pub fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.current = self.rows.pop_front();
        self.current.is_some()
    }

    fn current_row(&self) -> Result<&[Value]> {
        self.current
            .as_deref()
            .ok_or_else(|| CouchbaseErrorHelper::exhausted().message("Result cursor has no current row"))
    }

    /// Value at a zero-based column index in the current row.
    pub fn get(&self, index: usize) -> Result<&Value> {
        self.current_row()?.get(index).ok_or_else(|| {
            CouchbaseErrorHelper::exhausted()
                .message(format!("Column index {} is out of range", index))
        })
    }

    pub fn get_by_name(&self, name: &str) -> Result<&Value> {
        let row = self.current_row()?;
        self.metadata
            .index_of(name)
            .and_then(|index| row.get(index))
            .ok_or_else(|| {
                CouchbaseErrorHelper::exhausted().message(format!("Column '{}' does not exist", name))
            })
    }

    /// Drops all buffered rows. Calling it again does nothing.
    pub fn close(&mut self) {
        self.closed = true;
        self.current = None;
        self.rows.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Consumes the remaining rows, for callers that need all of them.
    pub fn into_rows(mut self) -> Vec<Vec<Value>> {
        let mut rows = Vec::with_capacity(self.rows.len());
        while self.next() {
            if let Some(row) = self.current.take() {
                rows.push(row);
            }
        }
        rows
    }
}
