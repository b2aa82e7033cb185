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

//! Bounded retry for eventually consistent cluster state.
//!
//! Probes report "not yet" with a `TransientNotReady` error; every other
//! error ends the wait immediately.

use crate::client::{CouchbaseClient, ManagerRequest};
use crate::error::{CouchbaseErrorHelper, Error, ErrorKind, Result};
use crate::types::IndexStatusResponse;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

pub const PRIMARY_INDEX_NAME: &str = "#primary";

const BASE_DELAY: Duration = Duration::from_millis(50);
const MAX_DELAY: Duration = Duration::from_secs(3);

/// Exponential backoff (50ms doubling up to 3s) under an overall deadline.
#[derive(Debug, Clone)]
pub struct ReadinessWaiter {
    timeout: Duration,
    base_delay: Duration,
    max_delay: Duration,
}

impl ReadinessWaiter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Runs `probe` until it succeeds, fails with anything but
    /// `TransientNotReady`, or the deadline passes.
    ///
    /// On deadline the error reads
    /// `"{resource} is still not ready after {timeout:?}. {last probe message}"`.
    pub async fn wait_for<T, F, Fut>(&self, resource: &str, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut attempt = 0u32;
        loop {
            match probe().await {
                Ok(value) => return Ok(value),
                Err(e) if e.kind() == ErrorKind::TransientNotReady => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(self.timed_out(resource, &e));
                    }
                    let delay = self.delay_for(attempt).min(deadline - now);
                    attempt += 1;
                    debug!("{} not ready ({}), retrying in {:?}", resource, e, delay);
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn timed_out(&self, resource: &str, last: &Error) -> Error {
        let mut message = format!("{} is still not ready after {:?}.", resource, self.timeout);
        if !last.message_text().is_empty() {
            message.push(' ');
            message.push_str(last.message_text());
        }
        CouchbaseErrorHelper::timeout().message(message)
    }
}

/// Fetches `/indexStatus`.
pub async fn index_status(client: &dyn CouchbaseClient) -> Result<IndexStatusResponse> {
    let response = client
        .manager(ManagerRequest::get("/indexStatus"))
        .await?
        .error_for_status("Failed to retrieve index information")?;
    serde_json::from_str(&response.body).map_err(|e| {
        CouchbaseErrorHelper::cluster()
            .message(format!(
                "Failed to retrieve index information: {}",
                response.body
            ))
            .with_source(e)
    })
}

fn not_ready(states: &BTreeMap<String, String>) -> Error {
    let rendered: Vec<String> = states.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    CouchbaseErrorHelper::not_ready().message(format!(
        "Unready index name -> state: {{{}}}",
        rendered.join(", ")
    ))
}

fn qualified_states<'a>(entries: impl Iterator<Item = &'a Value>) -> BTreeMap<String, String> {
    entries
        .map(|entry| {
            let field = |name: &str| {
                entry
                    .get(name)
                    .and_then(Value::as_str)
                    .unwrap_or("null")
                    .to_string()
            };
            (
                format!("{}:{}", field("bucket"), field("index")),
                field("status"),
            )
        })
        .collect()
}

/// Succeeds once the bucket's primary index reports `Ready`.
pub async fn check_primary_index_ready(client: &dyn CouchbaseClient, bucket: &str) -> Result<()> {
    let status = index_status(client).await?;
    let matching: Vec<&Value> = status.find(bucket, PRIMARY_INDEX_NAME).collect();
    if matching.is_empty() {
        let mut states = BTreeMap::new();
        states.insert(PRIMARY_INDEX_NAME.to_string(), "notFound".to_string());
        return Err(not_ready(&states));
    }
    let offline = qualified_states(
        matching
            .into_iter()
            .filter(|entry| entry.get("status").and_then(Value::as_str) != Some("Ready")),
    );
    if offline.is_empty() {
        Ok(())
    } else {
        Err(not_ready(&offline))
    }
}

/// Succeeds once no primary index of the bucket is listed.
pub async fn check_primary_index_gone(client: &dyn CouchbaseClient, bucket: &str) -> Result<()> {
    let status = index_status(client).await?;
    let present = qualified_states(status.find(bucket, PRIMARY_INDEX_NAME));
    if present.is_empty() {
        Ok(())
    } else {
        Err(not_ready(&present))
    }
}
