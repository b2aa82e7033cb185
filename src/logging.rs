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

//! Logging configuration for the Couchbase ADBC driver.
//!
//! ## Configuration priority
//!
//! 1. `loggingLevel` connection option (URL or `couchbase.loggingLevel`)
//! 2. `RUST_LOG` environment variable
//! 3. Default: `error` (the `severe` level)
//!
//! Output goes to stderr unless `couchbase.log_file` names a file.
//!
//! ```bash
//! RUST_LOG=couchbase_adbc=debug ./my_adbc_app
//! ```

use crate::uri::LoggingLevel;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Default)]
pub(crate) struct LogConfig {
    /// Level given explicitly; `None` defers to `RUST_LOG`.
    pub level: Option<LoggingLevel>,
    /// Log file path. If unset, logs go to stderr.
    pub file: Option<String>,
}

/// Where the subscriber's filter comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterSource {
    Off,
    Directive(String),
    /// `RUST_LOG`, falling back to the `severe` level.
    Environment,
}

impl LogConfig {
    fn filter_source(&self) -> FilterSource {
        match self.level {
            Some(level) => match level.tracing_level() {
                Some(l) => FilterSource::Directive(format!("couchbase_adbc={}", l)),
                None => FilterSource::Off,
            },
            None => FilterSource::Environment,
        }
    }
}

/// Installs the tracing subscriber at most once per process; the first
/// connection to be opened decides the configuration.
pub(crate) fn init_logging(config: &LogConfig) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let filter = match config.filter_source() {
            FilterSource::Off => return,
            FilterSource::Directive(directive) => EnvFilter::new(directive),
            FilterSource::Environment => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("couchbase_adbc=error")),
        };

        if let Some(ref path) = config.file {
            let file = match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("couchbase-adbc: failed to open log file {}: {}", path, e);
                    return;
                }
            };

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_target(false)
                        .with_ansi(false)
                        .with_timer(SystemTime),
                )
                .try_init()
                .ok();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_timer(SystemTime),
                )
                .try_init()
                .ok();
        }
    });
}
