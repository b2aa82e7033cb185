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

//! Metadata service for ADBC Connection interface methods.
//!
//! Catalog information comes from N1QL queries against the `system:`
//! keyspaces; column information comes from document sampling.
//!
//! ## Module Structure
//!
//! - `sql`: N1QL command builder for catalog queries
//! - `types`: Data structures and XDBC row layouts
//! - `service`: Runs the queries and merges built-in `system` entries
//! - `schemas` / `builder`: Nested Arrow result of `get_objects()`
//! - `type_mapping`: Couchbase type names to Arrow and XDBC types

pub mod builder;
pub mod schemas;
pub mod service;
pub mod sql;
pub mod type_mapping;
pub mod types;

// Re-export commonly used types
pub use builder::GetObjectsBuilder;
pub use service::MetadataService;
pub use sql::SqlCommandBuilder;
pub use types::{IndexColumnInfo, PrimaryKeyInfo, SchemaInfo, TableColumn, TableInfo};
