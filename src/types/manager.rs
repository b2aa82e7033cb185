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

//! Cluster manager payloads used for bootstrap and index readiness.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// `GET /pools/default/nodeServices`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeServices {
    #[serde(default)]
    pub nodes_ext: Vec<NodeServicesEntry>,
}

/// One node with the ports of the services it runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeServicesEntry {
    /// Absent on single-node clusters; the seed host applies.
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub services: HashMap<String, u16>,
    #[serde(default)]
    pub this_node: bool,
}

impl NodeServices {
    /// First node exposing `service`, with that service's port.
    pub fn find_service(&self, service: &str) -> Option<(Option<&str>, u16)> {
        self.nodes_ext.iter().find_map(|node| {
            node.services
                .get(service)
                .map(|port| (node.hostname.as_deref(), *port))
        })
    }
}

/// `GET /indexStatus`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexStatusResponse {
    #[serde(default)]
    pub indexes: Vec<Value>,
}

impl IndexStatusResponse {
    /// Entries describing `index` on `bucket`.
    pub fn find<'a>(&'a self, bucket: &'a str, index: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.indexes.iter().filter(move |entry| {
            entry.get("bucket").and_then(Value::as_str) == Some(bucket)
                && entry.get("index").and_then(Value::as_str) == Some(index)
        })
    }
}
