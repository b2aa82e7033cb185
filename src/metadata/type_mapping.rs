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

//! Couchbase type name → Arrow/XDBC type mapping.
//!
//! Type names are the tags produced by document sampling (`object`,
//! `numeric`, ...) and the declared types of catalog result columns.

use arrow_schema::DataType;

/// Map a Couchbase type name to an Arrow DataType.
///
/// Objects and arrays are represented as JSON strings.
pub fn couchbase_type_to_arrow(type_name: &str) -> DataType {
    match type_name.to_ascii_lowercase().as_str() {
        "boolean" => DataType::Boolean,
        "short" => DataType::Int16,
        "numeric" | "int" | "integer" | "long" => DataType::Int64,
        "float" | "double" => DataType::Float64,
        "string" | "varchar" => DataType::Utf8,
        "map" | "object" | "array" => DataType::Utf8,
        _ => DataType::Utf8, // Default fallback
    }
}

/// Map a Couchbase type name to its XDBC/JDBC type code.
///
/// Returns `None` for names outside the known set.
pub fn couchbase_type_to_xdbc(type_name: &str) -> Option<i16> {
    let code = match type_name.to_ascii_lowercase().as_str() {
        "map" | "object" => 2000,               // JDBC JAVA_OBJECT
        "array" => 2003,                        // JDBC ARRAY
        "numeric" => 2,                         // JDBC NUMERIC
        "int" | "integer" | "short" => 4,       // JDBC INTEGER
        "long" => -5,                           // JDBC BIGINT
        "boolean" => 16,                        // JDBC BOOLEAN
        "string" => 12,                         // JDBC VARCHAR
        "null" => 0,                            // JDBC NULL
        "float" => 6,                           // JDBC FLOAT
        "double" => 8,                          // JDBC DOUBLE
        _ => return None,
    };
    Some(code)
}
