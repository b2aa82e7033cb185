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

//! Grammar of the bucket and index commands handled by the driver itself.
//!
//! ```text
//! CREATE BUCKET|TABLE [WITH PRIMARY INDEX] [<schema>:]<name> [WAIT UNTIL READY] [WITH {<json>}]
//! DROP BUCKET|TABLE [<schema>:]<name>
//! DESCRIBE BUCKET [COLUMNS|SETTINGS] [<schema>:]<name>
//! DESCRIBE INDEXES
//! GET KEYS FROM [<schema>:]<name> [LIMIT <n>] [OFFSET <n>]
//! ```
//!
//! Keywords are case-insensitive and a trailing `;` is optional. `<name>` is
//! a plain identifier or one wrapped in backquotes.

use crate::error::{CouchbaseErrorHelper, Result};
use regex::{Captures, Regex};
use std::sync::OnceLock;

pub const SYSTEM_SCHEMA: &str = "system";

const NAME: &str = r"(?:(?P<schema>[A-Za-z]+):)?(?P<name>`[0-9A-Za-z_.%\-]+`|[0-9A-Za-z_.%\-]+)";
const TRAILER: &str = r"\s*;?\s*\z";

static CREATE_BUCKET: OnceLock<Regex> = OnceLock::new();
static DROP_BUCKET: OnceLock<Regex> = OnceLock::new();
static DESCRIBE_BUCKET: OnceLock<Regex> = OnceLock::new();
static DESCRIBE_INDEXES: OnceLock<Regex> = OnceLock::new();
static GET_KEYS: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: impl FnOnce() -> String) -> Result<&'static Regex> {
    if let Some(regex) = cell.get() {
        return Ok(regex);
    }
    let compiled = Regex::new(&source()).map_err(|e| {
        CouchbaseErrorHelper::invalid_state()
            .message("Invalid command grammar")
            .with_source(e)
    })?;
    Ok(cell.get_or_init(|| compiled))
}

fn create_bucket_pattern() -> Result<&'static Regex> {
    pattern(&CREATE_BUCKET, || {
        format!(
            r"(?is)\ACREATE\s+(?:BUCKET|TABLE)(?P<index>\s+WITH\s+PRIMARY\s+INDEX)?\s+{}(?P<wait>\s+WAIT\s+UNTIL\s+READY)?(?:\s+WITH\s+(?P<params>\{{.*\}}))?(?P<wait_after>\s+WAIT\s+UNTIL\s+READY)?{}",
            NAME, TRAILER
        )
    })
}

fn drop_bucket_pattern() -> Result<&'static Regex> {
    pattern(&DROP_BUCKET, || {
        format!(r"(?i)\ADROP\s+(?:BUCKET|TABLE)\s+{}{}", NAME, TRAILER)
    })
}

fn describe_bucket_pattern() -> Result<&'static Regex> {
    pattern(&DESCRIBE_BUCKET, || {
        format!(
            r"(?i)\ADESCRIBE\s+BUCKET\s+(?:(?P<kind>COLUMNS|SETTINGS)\s+)?{}{}",
            NAME, TRAILER
        )
    })
}

fn describe_indexes_pattern() -> Result<&'static Regex> {
    pattern(&DESCRIBE_INDEXES, || {
        format!(r"(?i)\ADESCRIBE\s+INDEXES{}", TRAILER)
    })
}

fn get_keys_pattern() -> Result<&'static Regex> {
    pattern(&GET_KEYS, || {
        format!(
            r"(?i)\AGET\s+KEYS\s+FROM\s+{}(?:\s+LIMIT\s+(?P<limit>\d+))?(?:\s+OFFSET\s+(?P<offset>\d+))?{}",
            NAME, TRAILER
        )
    })
}

/// Removes one pair of surrounding backquotes.
pub fn strip_backquotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('`') && s.ends_with('`') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// A bucket named by a command, with its optional namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.into(),
        }
    }

    fn from_captures(caps: &Captures<'_>) -> Self {
        Self {
            schema: caps.name("schema").map(|m| m.as_str().to_string()),
            name: caps
                .name("name")
                .map(|m| strip_backquotes(m.as_str()).to_string())
                .unwrap_or_default(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.schema
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(SYSTEM_SCHEMA))
    }

    /// ``schema:`name` `` or `` `name` `` for use in a query.
    pub fn keyspace(&self) -> String {
        match self.schema {
            Some(ref schema) => format!("{}:`{}`", schema, self.name),
            None => format!("`{}`", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBucketCommand {
    pub table: TableRef,
    pub primary_index: bool,
    pub wait_until_ready: bool,
    /// The `{...}` settings block, as written.
    pub settings: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropBucketCommand {
    pub table: TableRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeTarget {
    Settings,
    Columns,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeBucketCommand {
    pub target: DescribeTarget,
    pub table: TableRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetKeysCommand {
    pub table: TableRef,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn parse_create_bucket(sql: &str) -> Result<Option<CreateBucketCommand>> {
    let Some(caps) = create_bucket_pattern()?.captures(sql) else {
        return Ok(None);
    };
    Ok(Some(CreateBucketCommand {
        table: TableRef::from_captures(&caps),
        primary_index: caps.name("index").is_some(),
        wait_until_ready: caps.name("wait").is_some() || caps.name("wait_after").is_some(),
        settings: caps.name("params").map(|m| m.as_str().to_string()),
    }))
}

pub fn parse_drop_bucket(sql: &str) -> Result<Option<DropBucketCommand>> {
    Ok(drop_bucket_pattern()?
        .captures(sql)
        .map(|caps| DropBucketCommand {
            table: TableRef::from_captures(&caps),
        }))
}

pub fn parse_describe_bucket(sql: &str) -> Result<Option<DescribeBucketCommand>> {
    Ok(describe_bucket_pattern()?.captures(sql).map(|caps| {
        let target = match caps.name("kind") {
            Some(kind) if kind.as_str().eq_ignore_ascii_case("columns") => DescribeTarget::Columns,
            _ => DescribeTarget::Settings,
        };
        DescribeBucketCommand {
            target,
            table: TableRef::from_captures(&caps),
        }
    }))
}

pub fn parse_describe_indexes(sql: &str) -> Result<bool> {
    Ok(describe_indexes_pattern()?.is_match(sql))
}

pub fn parse_get_keys(sql: &str) -> Result<Option<GetKeysCommand>> {
    let Some(caps) = get_keys_pattern()?.captures(sql) else {
        return Ok(None);
    };
    let number = |group: &str| -> Result<Option<u64>> {
        caps.name(group)
            .map(|m| {
                m.as_str().parse::<u64>().map_err(|_| {
                    CouchbaseErrorHelper::syntax()
                        .message(format!("Invalid {} value: {}", group, m.as_str()))
                })
            })
            .transpose()
    };
    Ok(Some(GetKeysCommand {
        table: TableRef::from_captures(&caps),
        limit: number("limit")?,
        offset: number("offset")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_bucket_variants() {
        let cmd = parse_create_bucket("CREATE BUCKET foo").unwrap().unwrap();
        assert_eq!(cmd.table, TableRef::new(None, "foo"));
        assert!(!cmd.primary_index);
        assert!(!cmd.wait_until_ready);
        assert!(cmd.settings.is_none());

        let cmd = parse_create_bucket("create table with primary index default:`my-bucket` wait until ready;")
            .unwrap()
            .unwrap();
        assert_eq!(cmd.table, TableRef::new(Some("default"), "my-bucket"));
        assert!(cmd.primary_index);
        assert!(cmd.wait_until_ready);
    }

    #[test]
    fn test_create_bucket_with_settings_in_either_order() {
        let cmd = parse_create_bucket("CREATE BUCKET b WAIT UNTIL READY WITH {ramQuotaMB: 256}")
            .unwrap()
            .unwrap();
        assert!(cmd.wait_until_ready);
        assert_eq!(cmd.settings.as_deref(), Some("{ramQuotaMB: 256}"));

        let cmd = parse_create_bucket("CREATE BUCKET b WITH {\n  'flushEnabled': true\n} WAIT UNTIL READY")
            .unwrap()
            .unwrap();
        assert!(cmd.wait_until_ready);
        assert_eq!(cmd.settings.as_deref(), Some("{\n  'flushEnabled': true\n}"));
    }

    #[test]
    fn test_create_bucket_rejects_garbage() {
        assert!(parse_create_bucket("CREATE INDEX ix ON b(x)").unwrap().is_none());
        assert!(parse_create_bucket("CREATE BUCKET b WITH nothing").unwrap().is_none());
    }

    #[test]
    fn test_drop_bucket() {
        let cmd = parse_drop_bucket("DROP TABLE `b.c`").unwrap().unwrap();
        assert_eq!(cmd.table.name, "b.c");
        assert!(parse_drop_bucket("DROP INDEX b.ix").unwrap().is_none());
        let cmd = parse_drop_bucket("drop bucket system:keyspaces").unwrap().unwrap();
        assert!(cmd.table.is_system());
    }

    #[test]
    fn test_describe_bucket() {
        let cmd = parse_describe_bucket("DESCRIBE BUCKET b").unwrap().unwrap();
        assert_eq!(cmd.target, DescribeTarget::Settings);

        let cmd = parse_describe_bucket("describe bucket columns `travel-sample`;")
            .unwrap()
            .unwrap();
        assert_eq!(cmd.target, DescribeTarget::Columns);
        assert_eq!(cmd.table.name, "travel-sample");

        // A bucket literally called "columns".
        let cmd = parse_describe_bucket("DESCRIBE BUCKET columns").unwrap().unwrap();
        assert_eq!(cmd.target, DescribeTarget::Settings);
        assert_eq!(cmd.table.name, "columns");
    }

    #[test]
    fn test_describe_indexes() {
        assert!(parse_describe_indexes("DESCRIBE INDEXES").unwrap());
        assert!(parse_describe_indexes("describe   indexes ;").unwrap());
        assert!(!parse_describe_indexes("DESCRIBE INDEXES b").unwrap());
    }

    #[test]
    fn test_get_keys() {
        let cmd = parse_get_keys("GET KEYS FROM b LIMIT 10 OFFSET 20").unwrap().unwrap();
        assert_eq!(cmd.limit, Some(10));
        assert_eq!(cmd.offset, Some(20));

        let cmd = parse_get_keys("get keys from `b`").unwrap().unwrap();
        assert_eq!(cmd.limit, None);
        assert_eq!(cmd.offset, None);

        let err = parse_get_keys("GET KEYS FROM b LIMIT 99999999999999999999999").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Syntax);
    }

    #[test]
    fn test_spaced_backquoted_name_rejected() {
        assert!(parse_get_keys("GET KEYS FROM `travel sample`").unwrap().is_none());
        assert!(parse_get_keys("GET KEYS FROM `travel-sample`").unwrap().is_some());
    }

    #[test]
    fn test_keyspace_rendering() {
        assert_eq!(TableRef::new(None, "b").keyspace(), "`b`");
        assert_eq!(TableRef::new(Some("default"), "b").keyspace(), "default:`b`");
    }

    #[test]
    fn test_strip_backquotes() {
        assert_eq!(strip_backquotes("`a`"), "a");
        assert_eq!(strip_backquotes("a"), "a");
        assert_eq!(strip_backquotes("`"), "`");
    }
}
