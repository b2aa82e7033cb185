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

//! `DROP BUCKET`.

use super::grammar::DropBucketCommand;
use super::readiness::{check_primary_index_gone, ReadinessWaiter};
use super::ExecutionResult;
use crate::client::{CouchbaseClient, ManagerRequest, QueryOptions};
use crate::error::{CouchbaseErrorHelper, Result};
use crate::session::encode_path_segment;
use std::time::Duration;
use tracing::{debug, info};

const INDEX_GONE_TIMEOUT: Duration = Duration::from_secs(30);

/// Query service code for a keyspace that does not exist.
const KEYSPACE_NOT_FOUND: &str = "12003";

pub async fn execute(
    client: &dyn CouchbaseClient,
    command: &DropBucketCommand,
) -> Result<ExecutionResult> {
    if command.table.is_system() {
        return Err(CouchbaseErrorHelper::invalid_argument()
            .message("Cannot drop bucket in system schema"));
    }
    let name = command.table.name.as_str();

    let statement = format!("DROP PRIMARY INDEX IF EXISTS ON {}", command.table.keyspace());
    match client.query(&statement, &QueryOptions::default()).await {
        Ok(_) => {}
        Err(e) if e.has_code(KEYSPACE_NOT_FOUND) || e.mentions("not exist") => {
            debug!("No primary index to drop on {}: {}", name, e);
        }
        Err(e) => return Err(e),
    }

    let response = client
        .manager(ManagerRequest::delete(format!(
            "/pools/default/buckets/{}",
            encode_path_segment(name)
        )))
        .await?;
    if response.status == 404 {
        debug!("Bucket {} does not exist", name);
        return Ok(ExecutionResult::done());
    }
    response.error_for_status(&format!("Dropping bucket {}", name))?;
    info!("Dropped bucket {}", name);

    ReadinessWaiter::new(INDEX_GONE_TIMEOUT)
        .wait_for("A requested index", move || {
            check_primary_index_gone(client, name)
        })
        .await?;
    Ok(ExecutionResult::done())
}
