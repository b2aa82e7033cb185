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

//! Connection implementation for the Couchbase ADBC driver.

use crate::database::Database;
use crate::error::CouchbaseErrorHelper;
use crate::executor::StatementExecutor;
use crate::metadata::sql::{like_matches, LikePattern};
use crate::metadata::type_mapping::couchbase_type_to_arrow;
use crate::metadata::types::TABLE_TYPE;
use crate::metadata::{GetObjectsBuilder, MetadataService, TableInfo};
use crate::sampler::DEFAULT_NAMESPACE;
use crate::session::ClusterSession;
use crate::statement::Statement;
use adbc_core::error::Result;
use adbc_core::options::{InfoCode, ObjectDepth, OptionConnection, OptionValue};
use adbc_core::schemas::{GET_INFO_SCHEMA, GET_TABLE_TYPES_SCHEMA};
use adbc_core::Optionable;
use arrow_array::{
    new_empty_array, ArrayRef, RecordBatch, RecordBatchIterator, RecordBatchReader, StringArray,
    UInt32Array, UnionArray,
};
use arrow_buffer::ScalarBuffer;
use arrow_schema::{ArrowError, DataType, Field, Schema};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DRIVER_NAME: &str = "Couchbase ADBC Driver";
pub const VENDOR_NAME: &str = "Couchbase";

const CANCEL_UNSUPPORTED: &str = "Couchbase provides no support for interrupting an operation.";

/// Represents an active connection to a Couchbase cluster.
///
/// A Connection is created from a Database and is used to create Statements
/// for executing N1QL and driver commands. It owns the cluster session and
/// the Tokio runtime every blocking call runs on.
#[derive(Debug)]
pub struct Connection {
    session: Arc<ClusterSession>,

    // Shared with statements so a change applies to their next execution.
    read_only: Arc<AtomicBool>,

    // Tokio runtime for async operations
    runtime: tokio::runtime::Runtime,
}

/// Type alias for our empty reader used in stub implementations.
type EmptyReader =
    RecordBatchIterator<std::vec::IntoIter<std::result::Result<RecordBatch, ArrowError>>>;

impl Connection {
    /// Called by Database::new_connection() once the session is open.
    pub(crate) fn new_with_runtime(session: ClusterSession, runtime: tokio::runtime::Runtime) -> Self {
        debug!("Opened connection to {}", session.parameters().hosts_raw());
        Self {
            session: Arc::new(session),
            read_only: Arc::new(AtomicBool::new(false)),
            runtime,
        }
    }

    pub fn session(&self) -> &Arc<ClusterSession> {
        &self.session
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Returns whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Closes the session. Later calls are no-ops.
    pub fn close(&self) {
        self.session.close();
    }

    /// Catalog metadata over this connection's session.
    pub fn metadata(&self) -> MetadataService {
        MetadataService::new(
            StatementExecutor::new(self.session.clone()),
            self.runtime.handle().clone(),
        )
    }

    fn get_info_entries(&self, codes: Option<&HashSet<InfoCode>>) -> Vec<(u32, String)> {
        let wanted = |code: InfoCode| codes.map_or(true, |c| c.contains(&code));
        let mut entries = Vec::new();
        if wanted(InfoCode::VendorName) {
            entries.push((InfoCode::VendorName as u32, VENDOR_NAME.to_string()));
        }
        if wanted(InfoCode::VendorVersion) {
            match self.metadata().database_product_version() {
                Ok(version) => entries.push((InfoCode::VendorVersion as u32, version)),
                Err(e) => warn!("Could not determine the server version: {}", e),
            }
        }
        if wanted(InfoCode::DriverName) {
            entries.push((InfoCode::DriverName as u32, DRIVER_NAME.to_string()));
        }
        if wanted(InfoCode::DriverVersion) {
            entries.push((
                InfoCode::DriverVersion as u32,
                env!("CARGO_PKG_VERSION").to_string(),
            ));
        }
        entries
    }
}

/// Builds a `get_info()` batch holding string values only.
fn info_batch(entries: &[(u32, String)]) -> crate::error::Result<RecordBatch> {
    let arrow_error = |e: ArrowError| {
        CouchbaseErrorHelper::invalid_state()
            .message("Failed to build get_info result")
            .with_source(e)
    };
    let schema = GET_INFO_SCHEMA.clone();
    let DataType::Union(fields, _) = schema.field(1).data_type() else {
        return Err(CouchbaseErrorHelper::invalid_state().message("get_info value is not a union"));
    };
    let string_type_id = fields
        .iter()
        .find(|(_, field)| field.data_type() == &DataType::Utf8)
        .map(|(type_id, _)| type_id)
        .ok_or_else(|| CouchbaseErrorHelper::invalid_state().message("get_info has no string value"))?;

    let strings: ArrayRef = Arc::new(StringArray::from_iter_values(
        entries.iter().map(|(_, value)| value.as_str()),
    ));
    let children: Vec<ArrayRef> = fields
        .iter()
        .map(|(type_id, field)| {
            if type_id == string_type_id {
                strings.clone()
            } else {
                new_empty_array(field.data_type())
            }
        })
        .collect();
    let type_ids = ScalarBuffer::from(vec![string_type_id; entries.len()]);
    let offsets = ScalarBuffer::from((0..entries.len() as i32).collect::<Vec<_>>());
    let values = UnionArray::try_new(fields.clone(), type_ids, Some(offsets), children)
        .map_err(arrow_error)?;

    let names = UInt32Array::from_iter_values(entries.iter().map(|(code, _)| *code));
    RecordBatch::try_new(schema, vec![Arc::new(names), Arc::new(values)]).map_err(arrow_error)
}

impl Optionable for Connection {
    type Option = OptionConnection;

    fn set_option(&mut self, key: Self::Option, value: OptionValue) -> Result<()> {
        match key {
            OptionConnection::ReadOnly => match Database::parse_bool_option(&value) {
                Some(read_only) => {
                    self.read_only.store(read_only, Ordering::Release);
                    Ok(())
                }
                None => Err(CouchbaseErrorHelper::set_invalid_option(&key, &value).to_adbc()),
            },
            OptionConnection::AutoCommit => {
                // Every statement commits on its own; the value is ignored.
                Ok(())
            }
            _ => Err(CouchbaseErrorHelper::set_unknown_option(&key).to_adbc()),
        }
    }

    fn get_option_string(&self, key: Self::Option) -> Result<String> {
        match key {
            OptionConnection::ReadOnly => Ok(self.is_read_only().to_string()),
            OptionConnection::AutoCommit => Ok("true".to_string()),
            _ => Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc()),
        }
    }

    fn get_option_bytes(&self, key: Self::Option) -> Result<Vec<u8>> {
        Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc())
    }

    fn get_option_int(&self, key: Self::Option) -> Result<i64> {
        Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc())
    }

    fn get_option_double(&self, key: Self::Option) -> Result<f64> {
        Err(CouchbaseErrorHelper::get_unknown_option(&key).to_adbc())
    }
}

impl adbc_core::Connection for Connection {
    type StatementType = Statement;

    fn new_statement(&mut self) -> Result<Self::StatementType> {
        if self.is_closed() {
            return Err(CouchbaseErrorHelper::invalid_state()
                .message("Connection is closed")
                .to_adbc());
        }
        Ok(Statement::new(
            StatementExecutor::new(self.session.clone()),
            self.read_only.clone(),
            self.runtime.handle().clone(),
        ))
    }

    fn cancel(&mut self) -> Result<()> {
        Err(CouchbaseErrorHelper::not_implemented()
            .message(CANCEL_UNSUPPORTED)
            .to_adbc())
    }

    fn get_info(&self, codes: Option<HashSet<InfoCode>>) -> Result<impl RecordBatchReader + Send> {
        let entries = self.get_info_entries(codes.as_ref());
        let batch = info_batch(&entries).map_err(|e| e.to_adbc())?;
        Ok(RecordBatchIterator::new(
            vec![Ok(batch)],
            GET_INFO_SCHEMA.clone(),
        ))
    }

    fn get_objects(
        &self,
        depth: ObjectDepth,
        catalog: Option<&str>,
        db_schema: Option<&str>,
        table_name: Option<&str>,
        table_type: Option<Vec<&str>>,
        column_name: Option<&str>,
    ) -> Result<impl RecordBatchReader + Send> {
        let mut builder = GetObjectsBuilder::new();

        // The only catalog has no name, so a filter matches only if it
        // accepts the empty string.
        if like_matches(catalog, "") {
            builder.add_catalog();
            if !matches!(depth, ObjectDepth::Catalogs) {
                self.collect_objects(
                    &mut builder,
                    depth,
                    db_schema,
                    table_name,
                    table_type,
                    column_name,
                )
                .map_err(|e| e.to_adbc())?;
            }
        }

        builder.build().map_err(|e| e.to_adbc())
    }

    fn get_table_schema(
        &self,
        _catalog: Option<&str>,
        db_schema: Option<&str>,
        table_name: &str,
    ) -> Result<Schema> {
        let table = TableInfo::new(db_schema.unwrap_or(DEFAULT_NAMESPACE), table_name);
        let columns = self
            .metadata()
            .list_table_columns(&table, &LikePattern::any())
            .map_err(|e| e.to_adbc())?;
        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Field::new(&c.column_name, couchbase_type_to_arrow(&c.type_name), true))
            .collect();
        Ok(Schema::new(fields))
    }

    fn get_table_types(&self) -> Result<impl RecordBatchReader + Send> {
        let array = StringArray::from(vec![TABLE_TYPE]);
        let batch = RecordBatch::try_new(GET_TABLE_TYPES_SCHEMA.clone(), vec![Arc::new(array)])
            .map_err(|e| {
                CouchbaseErrorHelper::invalid_state()
                    .message("Failed to build get_table_types result")
                    .with_source(e)
                    .to_adbc()
            })?;

        Ok(RecordBatchIterator::new(
            vec![Ok(batch)],
            GET_TABLE_TYPES_SCHEMA.clone(),
        ))
    }

    fn read_partition(
        &self,
        _partition: impl AsRef<[u8]>,
    ) -> Result<impl RecordBatchReader + Send> {
        Err::<EmptyReader, _>(
            CouchbaseErrorHelper::not_implemented()
                .message("read_partition")
                .to_adbc(),
        )
    }

    fn commit(&mut self) -> Result<()> {
        // Couchbase is auto-commit only
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_statistic_names(&self) -> Result<impl RecordBatchReader + Send> {
        Err::<EmptyReader, _>(
            CouchbaseErrorHelper::not_implemented()
                .message("get_statistic_names")
                .to_adbc(),
        )
    }

    fn get_statistics(
        &self,
        _catalog: Option<&str>,
        _db_schema: Option<&str>,
        _table_name: Option<&str>,
        _approximate: bool,
    ) -> Result<impl RecordBatchReader + Send> {
        Err::<EmptyReader, _>(
            CouchbaseErrorHelper::not_implemented()
                .message("get_statistics")
                .to_adbc(),
        )
    }
}

impl Connection {
    fn collect_objects(
        &self,
        builder: &mut GetObjectsBuilder,
        depth: ObjectDepth,
        db_schema: Option<&str>,
        table_name: Option<&str>,
        table_type: Option<Vec<&str>>,
        column_name: Option<&str>,
    ) -> crate::error::Result<()> {
        let metadata = self.metadata();
        for schema in metadata.list_schemas(db_schema)? {
            builder.add_schema(&schema.schema_name);
        }
        if matches!(depth, ObjectDepth::Schemas) {
            return Ok(());
        }

        let mut tables = metadata.list_tables(db_schema, table_name)?;
        // Client-side table_type filtering
        if let Some(ref types) = table_type {
            tables.retain(|t| types.iter().any(|tt| t.table_type.eq_ignore_ascii_case(tt)));
        }
        for table in &tables {
            builder.add_table(table);
        }
        if matches!(depth, ObjectDepth::Tables) {
            return Ok(());
        }

        let column_pattern = LikePattern::new(column_name);
        for table in &tables {
            builder.add_columns(&metadata.list_table_columns(table, &column_pattern)?);
        }
        builder.add_primary_keys(&metadata.list_primary_keys(db_schema, table_name)?);
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.session.close();
    }
}
