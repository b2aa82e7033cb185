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

//! Couchbase ADBC Driver for Rust
//!
//! This crate provides an ADBC (Arrow Database Connectivity) driver for
//! Couchbase clusters. Statements are N1QL text sent to the query service,
//! plus a small set of commands the driver interprets itself against the
//! cluster manager REST API.
//!
//! ## Overview
//!
//! The driver implements the standard ADBC traits from `adbc_core`:
//! - [`Driver`] - Entry point for creating database connections
//! - [`Database`] - Holds connection configuration
//! - [`Connection`] - Active session with a cluster
//! - [`Statement`] - N1QL and command execution
//!
//! ## Driver commands
//!
//! - `CREATE BUCKET|TABLE [WITH PRIMARY INDEX] <name> [WAIT UNTIL READY] [WITH {json}]`
//! - `DROP BUCKET|TABLE <name>`
//! - `DESCRIBE BUCKET [COLUMNS|SETTINGS] <name>` and `DESCRIBE INDEXES`
//! - `GET KEYS FROM <name> [LIMIT n] [OFFSET n]`
//!
//! Everything else goes to the query service unchanged. Buckets map to
//! tables, namespaces to schemas, and there is a single unnamed catalog.
//! Column metadata is inferred by sampling documents.
//!
//! ## Example
//!
//! ```ignore
//! use couchbase_adbc::Driver;
//! use adbc_core::{Connection as _, Database as _, Driver as _, Statement as _};
//! use adbc_core::options::{OptionDatabase, OptionValue};
//! use adbc_core::Optionable;
//!
//! let mut driver = Driver::new();
//! let mut database = driver.new_database()?;
//! database.set_option(OptionDatabase::Uri, OptionValue::String("adbc:couchbase:localhost".into()))?;
//! database.set_option(OptionDatabase::Username, OptionValue::String("Administrator".into()))?;
//! database.set_option(OptionDatabase::Password, OptionValue::String("password".into()))?;
//!
//! let mut connection = database.new_connection()?;
//! let mut statement = connection.new_statement()?;
//! statement.set_sql_query("SELECT * FROM `travel-sample` LIMIT 10")?;
//! let result = statement.execute()?;
//! ```
//!
//! ## Configuration Options
//!
//! ### Connection URL
//!
//! `adbc:couchbase:host1[:port1][,host2[:port2]...][/bucket][?option=value&...]`
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `user` / `password` | | Credentials |
//! | `sslenabled` | false | Use TLS |
//! | `verifyServerCertificate` | true | Verify the server certificate |
//! | `verifyHostnames` | true | Verify the certificate host name |
//! | `defaultBucket` | | Bucket opened while connecting |
//! | `meta.sampling.size` | 1000 | Documents sampled per bucket for column metadata |
//! | `query.scan.consistency` | not_bounded | `not_bounded` or `request_plus` |
//! | `loggingLevel` | severe | `off`, `severe`, `warning`, `info`, `fine`, `all` |
//!
//! ### Database Options
//!
//! | Option | Description |
//! |--------|-------------|
//! | `uri` | Connection URL |
//! | `username` / `password` | Override the URL credentials |
//! | `couchbase.<option>` | Override any URL option |
//! | `couchbase.log_file` | Write logs to a file instead of stderr |
//! | `couchbase.http.connect_timeout_ms` | HTTP connect timeout |
//! | `couchbase.http.read_timeout_ms` | HTTP read timeout |
//! | `couchbase.http.max_retries` | Retries of transient HTTP failures |
//!
//! ### Connection and Statement Options
//!
//! | Option | Description |
//! |--------|-------------|
//! | `adbc.connection.readonly` | Reject statements that write |
//! | `adbc.connection.autocommit` | Accepted; always on |
//! | `couchbase.statement.batch_size` | Rows per Arrow batch |

pub mod client;
pub mod connection;
pub mod database;
pub mod driver;
pub mod error;
pub mod executor;
mod logging;
pub mod metadata;
pub mod reader;
pub mod sampler;
pub mod session;
pub mod statement;
pub mod types;
pub mod uri;

// Re-export main types
pub use connection::Connection;
pub use database::Database;
pub use driver::Driver;
pub use error::{CouchbaseErrorHelper, Error, ErrorKind, Result};
pub use statement::Statement;

// Re-export client types for advanced users
pub use client::{CouchbaseClient, CouchbaseHttpClient, HttpClientConfig, RestClient};

// Re-export configuration types
pub use uri::ConnectionParameters;

// FFI export: produces AdbcCouchbaseInit and AdbcDriverInit symbols
// when built with `cargo build --features ffi`
#[cfg(feature = "ffi")]
adbc_ffi::export_driver!(AdbcCouchbaseInit, crate::driver::Driver);
