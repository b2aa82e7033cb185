// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! ADBC Driver implementation for Couchbase.

use crate::database::Database;
use crate::uri::{self, PropertyInfo};
use adbc_core::error::Result;
use adbc_core::options::{OptionDatabase, OptionValue};
use adbc_core::Optionable;

/// The main entry point for the Couchbase ADBC driver.
///
/// The Driver is responsible for creating Database instances, which in turn
/// create Connections.
#[derive(Debug, Default)]
pub struct Driver {}

impl Driver {
    /// Creates a new Driver instance.
    pub fn new() -> Self {
        Self {}
    }

    /// Describes every connection option the driver recognizes.
    ///
    /// Values reflect `url` and `overrides`; unparseable input falls back to
    /// the documented defaults.
    pub fn property_info(
        url: &str,
        overrides: &std::collections::HashMap<String, String>,
    ) -> Vec<PropertyInfo> {
        let mut props = uri::property_info();
        if let Ok(params) = uri::ConnectionParameters::parse(url, overrides) {
            for prop in props.iter_mut() {
                let value = match prop.name {
                    uri::USER => params.username().map(str::to_string),
                    uri::ENABLE_SSL => Some(params.ssl_enabled().to_string()),
                    uri::VERIFY_SERVER_CERTIFICATE => {
                        Some(params.verify_server_certificate().to_string())
                    }
                    uri::VERIFY_HOSTNAMES => Some(params.verify_hostnames().to_string()),
                    uri::DEFAULT_BUCKET => params.default_bucket().map(str::to_string),
                    uri::META_SAMPLING_SIZE => Some(params.sampling_size().to_string()),
                    uri::QUERY_SCAN_CONSISTENCY => {
                        Some(params.scan_consistency().as_str().to_string())
                    }
                    _ => None,
                };
                if let Some(value) = value {
                    prop.default_value = value;
                }
            }
        }
        props
    }
}

impl adbc_core::Driver for Driver {
    type DatabaseType = Database;

    fn new_database(&mut self) -> Result<Self::DatabaseType> {
        Ok(Database::new())
    }

    fn new_database_with_opts(
        &mut self,
        opts: impl IntoIterator<Item = (OptionDatabase, OptionValue)>,
    ) -> Result<Self::DatabaseType> {
        let mut database = Database::new();
        for (key, value) in opts {
            database.set_option(key, value)?;
        }
        Ok(database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbc_core::Driver as _;
    use std::collections::HashMap;

    #[test]
    fn test_driver_new() {
        let mut driver = Driver::new();
        assert!(driver.new_database().is_ok());
    }

    #[test]
    fn test_driver_new_database_with_opts() {
        let mut driver = Driver::new();
        let db = driver
            .new_database_with_opts([(
                OptionDatabase::Uri,
                OptionValue::String("adbc:couchbase:localhost".into()),
            )])
            .unwrap();
        assert_eq!(db.uri(), Some("adbc:couchbase:localhost"));
    }

    #[test]
    fn test_property_info_reflects_url() {
        let props = Driver::property_info(
            "adbc:couchbase:localhost/travel?sslenabled=true&meta.sampling.size=7",
            &HashMap::new(),
        );
        let value = |name: &str| {
            props
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.default_value.clone())
                .unwrap()
        };
        assert_eq!(value("sslenabled"), "true");
        assert_eq!(value("defaultBucket"), "travel");
        assert_eq!(value("meta.sampling.size"), "7");
        assert_eq!(value("password"), "");
    }

    #[test]
    fn test_property_info_bad_url_uses_defaults() {
        let props = Driver::property_info("jdbc:mysql://x", &HashMap::new());
        let ssl = props.iter().find(|p| p.name == "sslenabled").unwrap();
        assert_eq!(ssl.default_value, "false");
        assert!(ssl.choices.contains(&"true"));
    }
}
