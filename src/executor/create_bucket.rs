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

//! `CREATE BUCKET`.

use super::bucket_settings::{BucketSettings, BucketSettingsPatch};
use super::grammar::CreateBucketCommand;
use super::readiness::{check_primary_index_ready, ReadinessWaiter};
use super::ExecutionResult;
use crate::client::{CouchbaseClient, ManagerRequest, QueryOptions};
use crate::error::{CouchbaseErrorHelper, Result};
use crate::session::encode_path_segment;
use std::time::Duration;
use tracing::{debug, info};

const INDEX_CREATE_TIMEOUT: Duration = Duration::from_secs(60);
const INDEX_READY_TIMEOUT: Duration = Duration::from_secs(60);
const BUCKET_READY_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn execute(
    client: &dyn CouchbaseClient,
    command: &CreateBucketCommand,
) -> Result<ExecutionResult> {
    if command.table.is_system() {
        return Err(CouchbaseErrorHelper::invalid_argument()
            .message("Cannot create bucket in system schema"));
    }
    let name = command.table.name.as_str();
    let patch = match command.settings {
        Some(ref params) => BucketSettingsPatch::parse(params)?,
        None => BucketSettingsPatch::default(),
    };
    let settings = BucketSettings::new(name).apply(&patch);
    create(client, &settings).await?;

    if command.primary_index {
        create_primary_index(client, &command.table.keyspace()).await?;
        ReadinessWaiter::new(INDEX_READY_TIMEOUT)
            .wait_for("A requested index", move || {
                check_primary_index_ready(client, name)
            })
            .await?;
    } else if command.wait_until_ready {
        wait_for_bucket(client, name).await?;
    }
    Ok(ExecutionResult::done())
}

async fn create(client: &dyn CouchbaseClient, settings: &BucketSettings) -> Result<()> {
    let response = client
        .manager(ManagerRequest::post_form(
            "/pools/default/buckets",
            settings.to_form(),
        ))
        .await?;
    if response.is_success() {
        info!("Created bucket {}", settings.name);
        return Ok(());
    }
    if response.body.contains("already exists") {
        debug!("Bucket {} already exists", settings.name);
        return Ok(());
    }
    Err(CouchbaseErrorHelper::cluster().message(format!(
        "Failed to create bucket {}: HTTP {}: {}",
        settings.name, response.status, response.body
    )))
}

/// The index service may still be starting on a fresh bucket; those
/// failures mention `GSI` and are retried.
async fn create_primary_index(client: &dyn CouchbaseClient, keyspace: &str) -> Result<()> {
    let statement = format!(
        "CREATE PRIMARY INDEX IF NOT EXISTS ON {} WITH {{\"num_replica\":0}}",
        keyspace
    );
    let statement = statement.as_str();
    let options = QueryOptions::default();
    let options = &options;
    ReadinessWaiter::new(INDEX_CREATE_TIMEOUT)
        .wait_for("Primary index", move || async move {
            match client.query(statement, options).await {
                Ok(_) => Ok(()),
                Err(e) if e.mentions("GSI") => {
                    Err(CouchbaseErrorHelper::not_ready().message(e.to_string()))
                }
                Err(e) => Err(e),
            }
        })
        .await
}

async fn wait_for_bucket(client: &dyn CouchbaseClient, name: &str) -> Result<()> {
    let path = format!(
        "/pools/default/buckets/{}/docs?include_docs=false",
        encode_path_segment(name)
    );
    let path = path.as_str();
    ReadinessWaiter::new(BUCKET_READY_TIMEOUT)
        .wait_for(name, move || async move {
            let response = client.manager(ManagerRequest::get(path)).await?;
            if response.is_success() {
                Ok(())
            } else {
                Err(CouchbaseErrorHelper::not_ready().message(format!(
                    "Failed to retrieve cluster information: Response status={} Response body={}",
                    response.status, response.body
                )))
            }
        })
        .await
}
