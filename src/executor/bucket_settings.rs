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

//! Bucket settings: the `WITH {...}` block of `CREATE BUCKET`, the form body
//! sent to the cluster manager, and the view returned by `DESCRIBE BUCKET`.
//!
//! The `WITH` block is read leniently: unquoted field names and single-quoted
//! strings are accepted, and both field names and enum values are matched
//! without regard to case.

use crate::error::{CouchbaseErrorHelper, Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketType {
    Couchbase,
    Memcached,
    Ephemeral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompressionMode {
    Off,
    Passive,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictResolutionType {
    #[serde(rename = "seqno")]
    SequenceNumber,
    #[serde(rename = "lww")]
    Timestamp,
    #[serde(rename = "custom")]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EvictionPolicy {
    #[serde(rename = "fullEviction")]
    FullEviction,
    #[serde(rename = "valueOnly")]
    ValueOnly,
    #[serde(rename = "noEviction")]
    NoEviction,
    #[serde(rename = "nruEviction")]
    NotRecentlyUsed,
}

impl BucketType {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "couchbase" | "membase" => Some(Self::Couchbase),
            "memcached" => Some(Self::Memcached),
            "ephemeral" => Some(Self::Ephemeral),
            _ => None,
        }
    }

    fn wire(&self) -> &'static str {
        match self {
            Self::Couchbase => "couchbase",
            Self::Memcached => "memcached",
            Self::Ephemeral => "ephemeral",
        }
    }
}

impl CompressionMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "passive" => Some(Self::Passive),
            "active" => Some(Self::Active),
            _ => None,
        }
    }

    fn wire(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Passive => "passive",
            Self::Active => "active",
        }
    }
}

impl ConflictResolutionType {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "seqno" | "sequence_number" => Some(Self::SequenceNumber),
            "lww" | "timestamp" => Some(Self::Timestamp),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    fn wire(&self) -> &'static str {
        match self {
            Self::SequenceNumber => "seqno",
            Self::Timestamp => "lww",
            Self::Custom => "custom",
        }
    }
}

impl EvictionPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "fulleviction" | "full" => Some(Self::FullEviction),
            "valueonly" | "value_only" => Some(Self::ValueOnly),
            "noeviction" | "no_eviction" => Some(Self::NoEviction),
            "nrueviction" | "not_recently_used" => Some(Self::NotRecentlyUsed),
            _ => None,
        }
    }

    fn wire(&self) -> &'static str {
        match self {
            Self::FullEviction => "fullEviction",
            Self::ValueOnly => "valueOnly",
            Self::NoEviction => "noEviction",
            Self::NotRecentlyUsed => "nruEviction",
        }
    }
}

/// Optional overrides written in a `WITH {...}` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSettingsPatch {
    pub flush_enabled: Option<bool>,
    pub ram_quota_mb: Option<u64>,
    pub replica_number: Option<u32>,
    pub replica_indexes: Option<bool>,
    pub max_ttl: Option<u32>,
    pub compression_mode: Option<CompressionMode>,
    pub bucket_type: Option<BucketType>,
    pub conflict_resolution_type: Option<ConflictResolutionType>,
    pub eviction_policy: Option<EvictionPolicy>,
}

/// Complete settings of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSettings {
    #[serde(skip)]
    pub name: String,
    pub flush_enabled: bool,
    #[serde(rename = "ramQuotaMB")]
    pub ram_quota_mb: u64,
    pub replica_number: u32,
    pub replica_indexes: bool,
    #[serde(rename = "maxTTL")]
    pub max_ttl: u32,
    pub compression_mode: CompressionMode,
    pub bucket_type: BucketType,
    pub conflict_resolution_type: ConflictResolutionType,
    pub eviction_policy: Option<EvictionPolicy>,
}

impl BucketSettings {
    /// Settings used by `CREATE BUCKET` when nothing is overridden.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flush_enabled: false,
            ram_quota_mb: 100,
            replica_number: 1,
            replica_indexes: false,
            max_ttl: 0,
            compression_mode: CompressionMode::Passive,
            bucket_type: BucketType::Couchbase,
            conflict_resolution_type: ConflictResolutionType::SequenceNumber,
            eviction_policy: None,
        }
    }

    pub fn apply(mut self, patch: &BucketSettingsPatch) -> Self {
        if let Some(v) = patch.flush_enabled {
            self.flush_enabled = v;
        }
        if let Some(v) = patch.ram_quota_mb {
            self.ram_quota_mb = v;
        }
        if let Some(v) = patch.replica_number {
            self.replica_number = v;
        }
        if let Some(v) = patch.replica_indexes {
            self.replica_indexes = v;
        }
        if let Some(v) = patch.max_ttl {
            self.max_ttl = v;
        }
        if let Some(v) = patch.compression_mode {
            self.compression_mode = v;
        }
        if let Some(v) = patch.bucket_type {
            self.bucket_type = v;
        }
        if let Some(v) = patch.conflict_resolution_type {
            self.conflict_resolution_type = v;
        }
        if let Some(v) = patch.eviction_policy {
            self.eviction_policy = Some(v);
        }
        self
    }

    /// Form body for `POST /pools/default/buckets`.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("name".to_string(), self.name.clone()),
            ("bucketType".to_string(), self.bucket_type.wire().to_string()),
            ("ramQuotaMB".to_string(), self.ram_quota_mb.to_string()),
            (
                "flushEnabled".to_string(),
                if self.flush_enabled { "1" } else { "0" }.to_string(),
            ),
            ("maxTTL".to_string(), self.max_ttl.to_string()),
            (
                "compressionMode".to_string(),
                self.compression_mode.wire().to_string(),
            ),
            (
                "conflictResolutionType".to_string(),
                self.conflict_resolution_type.wire().to_string(),
            ),
        ];
        if self.bucket_type != BucketType::Memcached {
            form.push(("replicaNumber".to_string(), self.replica_number.to_string()));
        }
        if self.bucket_type == BucketType::Couchbase {
            form.push((
                "replicaIndex".to_string(),
                if self.replica_indexes { "1" } else { "0" }.to_string(),
            ));
        }
        if let Some(policy) = self.eviction_policy {
            form.push(("evictionPolicy".to_string(), policy.wire().to_string()));
        }
        form
    }

    /// Reads `GET /pools/default/buckets/{name}`.
    pub fn from_manager_json(value: &Value) -> Result<Self> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CouchbaseErrorHelper::cluster()
                    .message(format!("Bucket description has no name: {}", value))
            })?;
        let mut settings = Self::new(name);
        settings.flush_enabled = value
            .get("controllers")
            .and_then(|c| c.get("flush"))
            .is_some();
        if let Some(raw) = value
            .get("quota")
            .and_then(|q| q.get("rawRAM"))
            .and_then(Value::as_u64)
        {
            settings.ram_quota_mb = raw / (1024 * 1024);
        }
        if let Some(n) = value.get("replicaNumber").and_then(Value::as_u64) {
            settings.replica_number = u32::try_from(n).unwrap_or(u32::MAX);
        }
        if let Some(b) = value.get("replicaIndex").and_then(Value::as_bool) {
            settings.replica_indexes = b;
        }
        if let Some(n) = value.get("maxTTL").and_then(Value::as_u64) {
            settings.max_ttl = u32::try_from(n).unwrap_or(u32::MAX);
        }
        let text = |field: &str| value.get(field).and_then(Value::as_str);
        if let Some(t) = text("bucketType").and_then(BucketType::parse) {
            settings.bucket_type = t;
        }
        if let Some(m) = text("compressionMode").and_then(CompressionMode::parse) {
            settings.compression_mode = m;
        }
        if let Some(c) = text("conflictResolutionType").and_then(ConflictResolutionType::parse) {
            settings.conflict_resolution_type = c;
        }
        settings.eviction_policy = text("evictionPolicy").and_then(EvictionPolicy::parse);
        Ok(settings)
    }

    /// The `DESCRIBE BUCKET SETTINGS` row value.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn decode_error(params: &str) -> Error {
    CouchbaseErrorHelper::syntax().message(format!("Could not decode from JSON: {}", params))
}

/// Rewrites unquoted field names and single-quoted strings into strict JSON.
fn relax_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    if chars[i - 1] == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() && chars[i + 1] == '\'' => {
                            out.push('\'');
                            i += 2;
                        }
                        '\\' if i + 1 < chars.len() => {
                            out.push('\\');
                            out.push(chars[i + 1]);
                            i += 2;
                        }
                        '"' => {
                            out.push_str("\\\"");
                            i += 1;
                        }
                        other => {
                            out.push(other);
                            i += 1;
                        }
                    }
                }
                out.push('"');
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ':' {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl BucketSettingsPatch {
    /// Parses a `{...}` settings block.
    pub fn parse(params: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(&relax_json(params)).map_err(|_| decode_error(params))?;
        let object: &Map<String, Value> = value.as_object().ok_or_else(|| decode_error(params))?;

        let mut patch = Self::default();
        for (key, value) in object {
            if value.is_null() {
                continue;
            }
            let bad = || decode_error(params);
            let text = || value.as_str().ok_or_else(bad);
            match key.to_ascii_lowercase().as_str() {
                "flushenabled" => patch.flush_enabled = Some(as_bool(value).ok_or_else(bad)?),
                "ramquotamb" => patch.ram_quota_mb = Some(as_u64(value).ok_or_else(bad)?),
                "replicanumber" => {
                    let n = as_u64(value).ok_or_else(bad)?;
                    patch.replica_number = Some(u32::try_from(n).map_err(|_| bad())?);
                }
                "replicaindexes" => patch.replica_indexes = Some(as_bool(value).ok_or_else(bad)?),
                "maxttl" => {
                    let n = as_u64(value).ok_or_else(bad)?;
                    patch.max_ttl = Some(u32::try_from(n).map_err(|_| bad())?);
                }
                "compressionmode" => {
                    patch.compression_mode = Some(CompressionMode::parse(text()?).ok_or_else(bad)?)
                }
                "buckettype" => patch.bucket_type = Some(BucketType::parse(text()?).ok_or_else(bad)?),
                "conflictresolutiontype" => {
                    patch.conflict_resolution_type =
                        Some(ConflictResolutionType::parse(text()?).ok_or_else(bad)?)
                }
                "evictionpolicy" => {
                    patch.eviction_policy = Some(EvictionPolicy::parse(text()?).ok_or_else(bad)?)
                }
                _ => return Err(bad()),
            }
        }
        Ok(patch)
    }
}
