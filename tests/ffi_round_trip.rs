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

//! FFI round-trip integration tests.
//!
//! These tests load the driver as a shared library through `dlopen` (the same
//! code path C/C++ consumers use) and validate that options, errors, and the
//! driver lifecycle work correctly across the FFI boundary.
//!
//! Run with: `cargo test --features ffi`

#![cfg(feature = "ffi")]

use adbc_core::options::{AdbcVersion, OptionDatabase, OptionValue};
use adbc_core::{Database, Driver, Optionable};
use adbc_driver_manager::ManagedDriver;

/// Load the driver shared library via dlopen + dlsym.
fn load_driver() -> ManagedDriver {
    ManagedDriver::load_dynamic_from_name(
        "couchbase_adbc",
        Some(b"AdbcCouchbaseInit"),
        AdbcVersion::V110,
    )
    .expect("Failed to load libcouchbase_adbc shared library")
}

#[test]
fn test_driver_loads() {
    let _driver = load_driver();
    // If we get here, the shared library loaded and the entry point resolved.
}

#[test]
fn test_database_set_get_options() {
    let mut driver = load_driver();
    let mut db = driver.new_database().expect("new_database failed");

    db.set_option(
        OptionDatabase::Uri,
        OptionValue::String("adbc:couchbase:localhost?sslenabled=true".into()),
    )
    .expect("set uri failed");

    db.set_option(
        OptionDatabase::Other("couchbase.defaultBucket".into()),
        OptionValue::String("travel-sample".into()),
    )
    .expect("set defaultBucket failed");

    let uri = db
        .get_option_string(OptionDatabase::Uri)
        .expect("get uri failed");
    assert_eq!(uri, "adbc:couchbase:localhost?sslenabled=true");

    let bucket = db
        .get_option_string(OptionDatabase::Other("couchbase.defaultBucket".into()))
        .expect("get defaultBucket failed");
    assert_eq!(bucket, "travel-sample");

    // Unset URL options report their defaults.
    let sampling = db
        .get_option_string(OptionDatabase::Other("couchbase.meta.sampling.size".into()))
        .expect("get meta.sampling.size failed");
    assert_eq!(sampling, "1000");

    db.set_option(
        OptionDatabase::Other("couchbase.http.max_retries".into()),
        OptionValue::String("2".into()),
    )
    .expect("set max_retries failed");

    let retries = db
        .get_option_int(OptionDatabase::Other("couchbase.http.max_retries".into()))
        .expect("get max_retries failed");
    assert_eq!(retries, 2);
}

#[test]
fn test_database_missing_required_options() {
    let mut driver = load_driver();
    let db = driver.new_database().expect("new_database failed");

    // Attempting to create a connection without a URI should return an
    // error, not panic.
    let result = db.new_connection();
    assert!(result.is_err(), "Expected error when uri is missing");
}

#[test]
fn test_unknown_option_error() {
    let mut driver = load_driver();
    let mut db = driver.new_database().expect("new_database failed");

    let result = db.set_option(
        OptionDatabase::Other("totally.unknown.option".into()),
        OptionValue::String("value".into()),
    );
    assert!(result.is_err(), "Expected error for unknown option");
}
