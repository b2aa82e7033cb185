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

//! N1QL command builder for metadata queries.
//!
//! Builds `SELECT ... FROM system:<catalog>` queries (keyspaces, namespaces,
//! indexes) with optional LIKE filters. Column aliases follow the XDBC names
//! so rows can be read back by name.

use regex::Regex;

/// Query returning the server version as `$1`.
pub const VERSION_QUERY: &str = "SELECT version() FROM system:dual;";

/// Builds N1QL queries against the `system:` catalogs.
///
/// # Examples
///
/// ```ignore
/// let sql = SqlCommandBuilder::new()
///     .with_schema_pattern(Some("default"))
///     .build_tables();
/// assert!(sql.ends_with("WHERE namespace_id LIKE 'default' ORDER BY TABLE_TYPE, TABLE_CAT, TABLE_SCHEM, TABLE_NAME"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct SqlCommandBuilder {
    schema_pattern: Option<String>,
    table_pattern: Option<String>,
    unique_only: bool,
}

impl SqlCommandBuilder {
    /// Create a new builder with no filters set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace pattern filter (SQL LIKE syntax with `%` and `_`).
    pub fn with_schema_pattern(mut self, pattern: Option<&str>) -> Self {
        self.schema_pattern = pattern.map(Self::quote_literal);
        self
    }

    /// Set the keyspace pattern filter (SQL LIKE syntax with `%` and `_`).
    pub fn with_table_pattern(mut self, pattern: Option<&str>) -> Self {
        self.table_pattern = pattern.map(Self::quote_literal);
        self
    }

    /// Restrict index queries to primary indexes.
    pub fn unique_only(mut self, unique: bool) -> Self {
        self.unique_only = unique;
        self
    }

    /// Keyspaces as tables, aliased to the XDBC table columns.
    pub fn build_tables(&self) -> String {
        let mut sql = String::from(
            "SELECT null AS TABLE_CAT, namespace_id AS TABLE_SCHEM, name AS TABLE_NAME, \
             'TABLE' AS TABLE_TYPE, null AS REMARKS, null AS TYPE_CAT, null AS TYPE_SCHEM, \
             null AS TYPE_NAME, null AS SELF_REFERENCING_COL_NAME, null AS REF_GENERATION \
             FROM system:keyspaces",
        );
        let mut filters = Vec::new();
        if let Some(ref pattern) = self.schema_pattern {
            filters.push(format!("namespace_id LIKE {}", pattern));
        }
        if let Some(ref pattern) = self.table_pattern {
            filters.push(format!("name LIKE {}", pattern));
        }
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters.join(" AND "));
        }
        sql.push_str(" ORDER BY TABLE_TYPE, TABLE_CAT, TABLE_SCHEM, TABLE_NAME");
        sql
    }

    /// Namespaces as schemas.
    pub fn build_schemas(&self) -> String {
        let mut sql =
            String::from("SELECT id AS TABLE_SCHEM, null AS TABLE_CATALOG FROM system:namespaces");
        if let Some(ref pattern) = self.schema_pattern {
            sql.push_str(&format!(" WHERE name LIKE {}", pattern));
        }
        sql.push_str(" ORDER BY TABLE_CATALOG, TABLE_SCHEM");
        sql
    }

    /// Primary indexes as single-column primary keys on the document id.
    pub fn build_primary_keys(&self) -> String {
        let mut sql = String::from(
            "SELECT null AS TABLE_CAT, namespace_id AS TABLE_SCHEM, keyspace_id AS TABLE_NAME, \
             'id' AS COLUMN_NAME, 1 AS KEY_SEQ, name AS PK_NAME \
             FROM system:indexes WHERE is_primary = true",
        );
        if let Some(ref pattern) = self.schema_pattern {
            sql.push_str(&format!(" AND namespace_id LIKE {}", pattern));
        }
        if let Some(ref pattern) = self.table_pattern {
            sql.push_str(&format!(" AND keyspace_id LIKE {}", pattern));
        }
        sql.push_str(" ORDER BY COLUMN_NAME, TABLE_SCHEM, TABLE_NAME");
        sql
    }

    /// Raw index definitions; rows are expanded per key by the caller.
    pub fn build_index_info(&self) -> String {
        let mut sql = String::from(
            "SELECT namespace_id, keyspace_id, name, index_key, is_primary, `condition` \
             FROM system:indexes",
        );
        let mut filters = Vec::new();
        if let Some(ref pattern) = self.table_pattern {
            filters.push(format!("keyspace_id LIKE {}", pattern));
        }
        if let Some(ref pattern) = self.schema_pattern {
            filters.push(format!("namespace_id LIKE {}", pattern));
        }
        if self.unique_only {
            filters.push("is_primary = true".to_string());
        }
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters.join(" AND "));
        }
        sql.push_str(" ORDER BY name");
        sql
    }

    /// Quote a pattern as a N1QL string literal, doubling embedded quotes.
    fn quote_literal(pattern: &str) -> String {
        format!("'{}'", pattern.replace('\'', "''"))
    }
}

/// A SQL LIKE pattern compiled once for client-side filtering.
///
/// `%` matches any run, `_` one character, and `\` escapes the next
/// character. A `None` pattern matches everything.
#[derive(Debug, Clone)]
pub enum LikePattern {
    Any,
    Regex(Regex),
    /// A pattern too large to compile matches nothing.
    Never,
}

impl LikePattern {
    pub fn new(pattern: Option<&str>) -> Self {
        match pattern {
            None => Self::Any,
            Some(p) => Regex::new(&like_to_regex(p)).map_or(Self::Never, Self::Regex),
        }
    }

    /// Matches every value.
    pub fn any() -> Self {
        Self::Any
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Regex(re) => re.is_match(value),
            Self::Never => false,
        }
    }
}

fn like_to_regex(pattern: &str) -> String {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    source.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    source
}

/// Evaluates a SQL LIKE `pattern` against a single `value`.
pub fn like_matches(pattern: Option<&str>, value: &str) -> bool {
    LikePattern::new(pattern).matches(value)
}
