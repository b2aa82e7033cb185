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

//! Statement implementation for the Couchbase ADBC driver.

use crate::database::Database;
use crate::error::CouchbaseErrorHelper;
use crate::executor::{ExecutionResult, StatementExecutor};
use crate::reader::{
    schema_for, CursorReader, EmptyReader, ResultMetadata, ResultReader, ResultReaderAdapter,
    DEFAULT_BATCH_SIZE,
};
use adbc_core::error::Result;
use adbc_core::options::{OptionStatement, OptionValue};
use adbc_core::Optionable;
use arrow_array::RecordBatchReader;
use arrow_schema::Schema;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle as RuntimeHandle;
use tracing::debug;

/// Rows per Arrow batch produced by `execute()`.
pub const BATCH_SIZE: &str = "couchbase.statement.batch_size";

/// Represents a N1QL statement or driver command to run against a cluster.
///
/// A Statement is created from a Connection and is used to execute queries
/// and retrieve results. Executing again closes the previous result.
#[derive(Debug)]
pub struct Statement {
    /// The statement text to execute.
    query: Option<String>,
    executor: StatementExecutor,
    /// The owning connection's read-only flag.
    read_only: Arc<AtomicBool>,
    /// Tokio runtime handle for async operations.
    runtime_handle: RuntimeHandle,
    /// Close flag of the reader returned by the last execution.
    current_result: Option<Arc<AtomicBool>>,
    batch_size: usize,
}

impl Statement {
    /// Creates a new Statement.
    pub(crate) fn new(
        executor: StatementExecutor,
        read_only: Arc<AtomicBool>,
        runtime_handle: RuntimeHandle,
    ) -> Self {
        Self {
            query: None,
            executor,
            read_only,
            runtime_handle,
            current_result: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Returns the current statement text.
    pub fn sql_query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn close_current_result(&mut self) {
        if let Some(closed) = self.current_result.take() {
            closed.store(true, Ordering::Release);
        }
    }

    /// Runs the statement, closing whatever the previous run returned.
    fn run(&mut self) -> crate::error::Result<ExecutionResult> {
        let query = self
            .query
            .clone()
            .ok_or_else(|| CouchbaseErrorHelper::invalid_state().message("No query set"))?;
        self.close_current_result();

        debug!("Executing statement: {}", query);
        let read_only = self.read_only.load(Ordering::Acquire);
        self.runtime_handle
            .block_on(self.executor.execute(&query, read_only))
    }

    fn reader_for(&mut self, result: ExecutionResult) -> crate::error::Result<ResultReaderAdapter> {
        let reader: Box<dyn ResultReader + Send> = match result.into_cursor() {
            Some(cursor) => {
                let closed = Arc::new(AtomicBool::new(false));
                self.current_result = Some(closed.clone());
                Box::new(CursorReader::new(cursor, closed).with_batch_size(self.batch_size))
            }
            None => Box::new(EmptyReader::new(schema_for(&ResultMetadata::result_column()))),
        };
        ResultReaderAdapter::new(reader)
    }
}

impl Optionable for Statement {
    type Option = OptionStatement;

    fn set_option(&mut self, key: Self::Option, value: OptionValue) -> Result<()> {
        match key {
            OptionStatement::Other(ref s) if s == BATCH_SIZE => {
                match Database::parse_int_option(&value) {
                    Some(size) if size > 0 => {
                        self.batch_size = size as usize;
                        Ok(())
                    }
                    _ => Err(CouchbaseErrorHelper::set_invalid_option(&key, &value).to_adbc()),
                }
            }
            _ => Err(CouchbaseErrorHelper::set_unknown_option(&key).to_adbc()),
        }
    }

    fn get_option_string(&self, key: Self::Option) -> Result<String> {
        match key {
            OptionStatement::Other(ref s) if s == BATCH_SIZE => Ok(self.batch_size.to_string()),
            _ => Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc()),
        }
    }

    fn get_option_bytes(&self, key: Self::Option) -> Result<Vec<u8>> {
        Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc())
    }

    fn get_option_int(&self, key: Self::Option) -> Result<i64> {
        match key {
            OptionStatement::Other(ref s) if s == BATCH_SIZE => Ok(self.batch_size as i64),
            _ => Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc()),
        }
    }

    fn get_option_double(&self, key: Self::Option) -> Result<f64> {
        Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc())
    }
}

impl adbc_core::Statement for Statement {
    fn set_sql_query(&mut self, query: impl AsRef<str>) -> Result<()> {
        self.query = Some(query.as_ref().to_string());
        Ok(())
    }

    fn set_substrait_plan(&mut self, _plan: impl AsRef<[u8]>) -> Result<()> {
        Err(CouchbaseErrorHelper::not_implemented()
            .message("Substrait plans")
            .to_adbc())
    }

    fn prepare(&mut self) -> Result<()> {
        Err(CouchbaseErrorHelper::not_implemented()
            .message("prepare")
            .to_adbc())
    }

    fn get_parameter_schema(&self) -> Result<Schema> {
        Err(CouchbaseErrorHelper::not_implemented()
            .message("get_parameter_schema")
            .to_adbc())
    }

    fn bind(&mut self, _batch: arrow_array::RecordBatch) -> Result<()> {
        Err(CouchbaseErrorHelper::not_implemented()
            .message("bind parameters")
            .to_adbc())
    }

    fn bind_stream(&mut self, _stream: Box<dyn RecordBatchReader + Send>) -> Result<()> {
        Err(CouchbaseErrorHelper::not_implemented()
            .message("bind_stream")
            .to_adbc())
    }

    #[allow(refining_impl_trait)]
    fn execute(&mut self) -> Result<impl RecordBatchReader + Send + 'static> {
        let result = self.run().map_err(|e| e.to_adbc())?;
        self.reader_for(result).map_err(|e| e.to_adbc())
    }

    fn execute_update(&mut self) -> Result<Option<i64>> {
        let result = self.run().map_err(|e| e.to_adbc())?;
        Ok(result.update_count())
    }

    fn execute_schema(&mut self) -> Result<Schema> {
        let reader = self.execute()?;
        Ok((*reader.schema()).clone())
    }

    fn execute_partitions(&mut self) -> Result<adbc_core::PartitionedResult> {
        Err(CouchbaseErrorHelper::not_implemented()
            .message("execute_partitions")
            .to_adbc())
    }

    fn cancel(&mut self) -> Result<()> {
        Err(CouchbaseErrorHelper::not_implemented()
            .message("Couchbase provides no support for interrupting an operation.")
            .to_adbc())
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        self.close_current_result();
    }
}
