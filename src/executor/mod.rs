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

//! Statement execution.
//!
//! Text is first offered to the bucket and index commands the driver runs
//! itself (see [`grammar`]); anything they do not claim goes to the query
//! service unchanged.

pub mod bucket_settings;
pub mod create_bucket;
pub mod describe;
pub mod drop_bucket;
pub mod get_keys;
pub mod grammar;
pub mod readiness;

use crate::client::{CouchbaseClient, QueryOptions};
use crate::error::{CouchbaseErrorHelper, Result};
use crate::reader::{ResultCursor, ResultMetadata};
use crate::session::ClusterSession;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Outcome of offering a statement to an executor.
#[derive(Debug)]
pub enum ExecutionResult {
    /// No interpreter recognized the text.
    Unclaimed,
    /// Never carries both a cursor and an update count.
    Claimed {
        success: bool,
        cursor: Option<ResultCursor>,
        update_count: Option<i64>,
    },
}

impl ExecutionResult {
    pub fn done() -> Self {
        ExecutionResult::Claimed {
            success: true,
            cursor: None,
            update_count: None,
        }
    }

    pub fn rows(cursor: ResultCursor) -> Self {
        ExecutionResult::Claimed {
            success: true,
            cursor: Some(cursor),
            update_count: None,
        }
    }

    pub fn updated(count: i64) -> Self {
        ExecutionResult::Claimed {
            success: true,
            cursor: None,
            update_count: Some(count),
        }
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self, ExecutionResult::Claimed { .. })
    }

    pub fn update_count(&self) -> Option<i64> {
        match self {
            ExecutionResult::Claimed { update_count, .. } => *update_count,
            ExecutionResult::Unclaimed => None,
        }
    }

    pub fn into_cursor(self) -> Option<ResultCursor> {
        match self {
            ExecutionResult::Claimed { cursor, .. } => cursor,
            ExecutionResult::Unclaimed => None,
        }
    }
}

/// The commands the driver interprets itself, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandInterpreter {
    CreateBucket,
    DropBucket,
    DescribeBucket,
    DescribeIndexes,
    GetKeys,
}

impl CommandInterpreter {
    pub const ALL: [CommandInterpreter; 5] = [
        CommandInterpreter::CreateBucket,
        CommandInterpreter::DropBucket,
        CommandInterpreter::DescribeBucket,
        CommandInterpreter::DescribeIndexes,
        CommandInterpreter::GetKeys,
    ];

    pub fn matches(&self, sql: &str) -> Result<bool> {
        Ok(match self {
            CommandInterpreter::CreateBucket => grammar::parse_create_bucket(sql)?.is_some(),
            CommandInterpreter::DropBucket => grammar::parse_drop_bucket(sql)?.is_some(),
            CommandInterpreter::DescribeBucket => grammar::parse_describe_bucket(sql)?.is_some(),
            CommandInterpreter::DescribeIndexes => grammar::parse_describe_indexes(sql)?,
            CommandInterpreter::GetKeys => grammar::parse_get_keys(sql)?.is_some(),
        })
    }

    pub fn requires_write(&self) -> bool {
        matches!(
            self,
            CommandInterpreter::CreateBucket | CommandInterpreter::DropBucket
        )
    }

    pub async fn execute(&self, executor: &StatementExecutor, sql: &str) -> Result<ExecutionResult> {
        let client = executor.client()?;
        match self {
            CommandInterpreter::CreateBucket => match grammar::parse_create_bucket(sql)? {
                Some(command) => create_bucket::execute(client, &command).await,
                None => Ok(ExecutionResult::Unclaimed),
            },
            CommandInterpreter::DropBucket => match grammar::parse_drop_bucket(sql)? {
                Some(command) => drop_bucket::execute(client, &command).await,
                None => Ok(ExecutionResult::Unclaimed),
            },
            CommandInterpreter::DescribeBucket => match grammar::parse_describe_bucket(sql)? {
                Some(command) => describe::describe_bucket(executor, &command).await,
                None => Ok(ExecutionResult::Unclaimed),
            },
            CommandInterpreter::DescribeIndexes => {
                if grammar::parse_describe_indexes(sql)? {
                    describe::describe_indexes(client).await
                } else {
                    Ok(ExecutionResult::Unclaimed)
                }
            }
            CommandInterpreter::GetKeys => match grammar::parse_get_keys(sql)? {
                Some(command) => get_keys::execute(client, &command).await,
                None => Ok(ExecutionResult::Unclaimed),
            },
        }
    }
}

/// First-match dispatch over [`CommandInterpreter::ALL`].
pub struct CommandRegistry;

impl CommandRegistry {
    /// Runs the first interpreter that recognizes `sql`.
    ///
    /// Write commands on a read-only connection fail before any cluster call.
    pub async fn try_execute(
        executor: &StatementExecutor,
        sql: &str,
        read_only: bool,
    ) -> Result<ExecutionResult> {
        for interpreter in CommandInterpreter::ALL {
            if !interpreter.matches(sql)? {
                continue;
            }
            if read_only && interpreter.requires_write() {
                return Err(CouchbaseErrorHelper::read_only());
            }
            debug!("Dispatching to {:?}", interpreter);
            return interpreter.execute(executor, sql).await;
        }
        Ok(ExecutionResult::Unclaimed)
    }
}

/// Runs statements against one cluster session.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    session: Arc<ClusterSession>,
}

impl StatementExecutor {
    pub fn new(session: Arc<ClusterSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<ClusterSession> {
        &self.session
    }

    pub(crate) fn client(&self) -> Result<&dyn CouchbaseClient> {
        Ok(self.session.client()?.as_ref())
    }

    fn query_options(&self, read_only: bool) -> QueryOptions {
        QueryOptions {
            scan_consistency: self.session.parameters().scan_consistency(),
            read_only,
            metrics: true,
        }
    }

    /// Executes one statement, custom command or native query.
    pub async fn execute(&self, sql: &str, read_only: bool) -> Result<ExecutionResult> {
        let sql = normalize(sql);
        match CommandRegistry::try_execute(self, sql, read_only).await? {
            ExecutionResult::Unclaimed => self.execute_native(sql, read_only).await,
            claimed => Ok(claimed),
        }
    }

    /// Sends `sql` to the query service without offering it to the
    /// command interpreters.
    pub async fn execute_native(&self, sql: &str, read_only: bool) -> Result<ExecutionResult> {
        let sql = normalize(sql);
        debug!("Executing query: {}", sql);
        let response = self
            .client()?
            .query(sql, &self.query_options(read_only))
            .await?;
        if let Some(count) = response.mutation_count {
            return Ok(ExecutionResult::updated(count));
        }
        if starts_with_ignore_case(sql, "infer") {
            let elements = match response.rows.into_iter().next() {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => vec![other],
            };
            return Ok(ExecutionResult::rows(ResultCursor::list(elements)));
        }
        Ok(ExecutionResult::rows(ResultCursor::documents(response.rows)))
    }

    /// Runs a catalog query whose rows are objects keyed by the declared
    /// column names.
    pub async fn execute_meta_query(&self, sql: &str, metadata: ResultMetadata) -> Result<ResultCursor> {
        debug!("Executing metadata query: {}", sql);
        let response = self
            .client()?
            .query(sql, &self.query_options(true))
            .await?;
        Ok(ResultCursor::from_objects(metadata, response.rows))
    }
}

/// Trims whitespace and one trailing `;`.
fn normalize(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').map_or(trimmed, str::trim_end)
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}


#[cfg(test)]
mod tests {
    use super::test_support::executor_with;
    use super::*;
    use crate::client::mock::MockClient;
    use crate::client::{ManagerResponse, QueryResponse};
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  SELECT 1;  "), "SELECT 1");
        assert_eq!(normalize("SELECT 1 ; "), "SELECT 1");
        assert_eq!(normalize("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_dispatch_order_and_write_flags() {
        let writes: Vec<bool> = CommandInterpreter::ALL
            .iter()
            .map(|i| i.requires_write())
            .collect();
        assert_eq!(writes, vec![true, true, false, false, false]);
        assert!(CommandInterpreter::GetKeys.matches("GET KEYS FROM b").unwrap());
        assert!(!CommandInterpreter::GetKeys.matches("SELECT 1").unwrap());
    }

    #[tokio::test]
    async fn test_read_only_blocks_writes_before_any_call() {
        let (executor, mock) = executor_with(MockClient::new());
        for sql in ["CREATE BUCKET b", "DROP BUCKET b", "create table with primary index b wait until ready"] {
            let err = executor.execute(sql, true).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ReadOnlyViolation);
            assert_eq!(
                err.to_string(),
                "The server or request is read-only and cannot accept this write statement."
            );
        }
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_only_allows_reads() {
        let mock = MockClient::new().with_manager(|_, _| {
            Ok(ManagerResponse::new(200, r#"{"indexes": []}"#))
        });
        let (executor, mock) = executor_with(mock);
        let result = executor.execute("DESCRIBE INDEXES", true).await.unwrap();
        assert!(result.is_claimed());
        assert_eq!(mock.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_native_query_rows() {
        let mock = MockClient::new().with_query(|_, _| {
            Ok(QueryResponse::from_rows(vec![json!({"t1": {"x": 1}})]))
        });
        let (executor, mock) = executor_with(mock);
        let mut cursor = executor
            .execute("SELECT t1 FROM default:`b` t1;", false)
            .await
            .unwrap()
            .into_cursor()
            .unwrap();
        assert!(cursor.next());
        assert_eq!(cursor.get(0).unwrap(), &json!({"t1": {"x": 1}}));

        let calls = mock.calls();
        match &calls[0] {
            crate::client::mock::RecordedCall::Query { statement, options } => {
                assert_eq!(statement, "SELECT t1 FROM default:`b` t1");
                assert!(options.metrics);
                assert!(!options.read_only);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mutation_count_becomes_update_count() {
        let mock = MockClient::new().with_query(|_, _| Ok(QueryResponse::mutations(3)));
        let (executor, _) = executor_with(mock);
        let result = executor
            .execute("UPDATE b SET x = 1", false)
            .await
            .unwrap();
        assert_eq!(result.update_count(), Some(3));
        assert!(result.into_cursor().is_none());
    }

    #[tokio::test]
    async fn test_infer_returns_list_cursor() {
        let mock = MockClient::new().with_query(|_, _| {
            Ok(QueryResponse::from_rows(vec![json!([{"#docs": 1}, {"#docs": 2}])]))
        });
        let (executor, _) = executor_with(mock);
        let mut cursor = executor
            .execute("INFER `b`", false)
            .await
            .unwrap()
            .into_cursor()
            .unwrap();
        assert!(cursor.next());
        assert!(cursor.next());
        assert_eq!(cursor.get(0).unwrap()["#docs"], 2);
        assert!(!cursor.next());

        let mock = MockClient::new();
        let (executor, _) = executor_with(mock);
        let mut cursor = executor
            .execute("infer b", false)
            .await
            .unwrap()
            .into_cursor()
            .unwrap();
        assert!(!cursor.next());
    }

    #[tokio::test]
    async fn test_query_errors_surface_unchanged() {
        let mock = MockClient::new().with_query(|_, _| {
            Err(CouchbaseErrorHelper::cluster()
                .message("Query failed")
                .server_errors(vec![crate::error::ServerError::new("3000", "syntax error")]))
        });
        let (executor, mock) = executor_with(mock);
        let err = executor.execute("SELEC 1", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClusterCommunication);
        assert!(err.has_code("3000"));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_meta_query_flattens_rows() {
        let mock = MockClient::new().with_query(|_, _| {
            Ok(QueryResponse::from_rows(vec![json!({"TABLE_SCHEM": "default"})]))
        });
        let (executor, _) = executor_with(mock);
        let metadata = ResultMetadata::new(vec![
            crate::reader::ColumnMeta::new("TABLE_SCHEM", "string"),
            crate::reader::ColumnMeta::new("TABLE_CATALOG", "string"),
        ]);
        let mut cursor = executor
            .execute_meta_query("SELECT 1", metadata)
            .await
            .unwrap();
        assert!(cursor.next());
        assert_eq!(cursor.get(0).unwrap(), "default");
        assert!(cursor.get(1).unwrap().is_null());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_calls() {
        let (executor, mock) = executor_with(MockClient::new());
        executor.session().close();
        let err = executor.execute("SELECT 1", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(mock.calls().is_empty());
    }
}
