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

//! Error types for the Couchbase ADBC driver.
//!
//! Errors are built through [`CouchbaseErrorHelper`], carried internally as
//! [`Error`], and converted to `adbc_core::error::Error` at the ADBC boundary
//! with [`Error::to_adbc`].

use adbc_core::error::{Error as AdbcError, Status};
use std::fmt;

/// Result alias used throughout the driver.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of driver failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("syntax error")]
    Syntax,
    #[error("missing credentials")]
    MissingCredentials,
    #[error("read-only violation")]
    ReadOnlyViolation,
    #[error("cluster communication error")]
    ClusterCommunication,
    #[error("resource not ready")]
    TransientNotReady,
    #[error("timeout")]
    Timeout,
    #[error("result exhausted")]
    ResultExhausted,
    #[error("unsupported operation")]
    Unsupported,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid state")]
    InvalidState,
}

/// One entry of the `errors` array returned by the query service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

impl ServerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Parses `{"code": 12003, "msg": "..."}`; the code may be a number or a string.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let code = match value.get("code") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        let message = value
            .get("msg")
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        Self { code, message }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Driver error.
#[derive(Debug, thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    server_errors: Vec<ServerError>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if !self.server_errors.is_empty() {
            let entries: Vec<String> = self.server_errors.iter().map(|e| e.to_string()).collect();
            write!(f, " {}", entries.join(", "))?;
        }
        Ok(())
    }
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: String::new(),
            server_errors: Vec::new(),
            source: None,
        }
    }

    /// Sets the human-readable message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attaches the query service error entries.
    pub fn server_errors(mut self, errors: Vec<ServerError>) -> Self {
        self.server_errors = errors;
        self
    }

    /// Attaches an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message_text(&self) -> &str {
        &self.message
    }

    pub fn server_error_entries(&self) -> &[ServerError] {
        &self.server_errors
    }

    /// True when any server entry or the message mentions `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.message.contains(needle)
            || self
                .server_errors
                .iter()
                .any(|e| e.message.contains(needle))
    }

    /// True when any server entry carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.server_errors.iter().any(|e| e.code == code)
    }

    /// A single server entry whose code is 12003 or in the 13xxx range,
    /// which the query service uses for missing keyspaces and namespaces.
    pub fn is_keyspace_not_found(&self) -> bool {
        match self.server_errors.as_slice() {
            [only] => only.code == "12003" || only.code.starts_with("13"),
            _ => false,
        }
    }

    fn status(&self) -> Status {
        match self.kind {
            ErrorKind::Syntax | ErrorKind::InvalidArgument => Status::InvalidArguments,
            ErrorKind::MissingCredentials => Status::Unauthenticated,
            ErrorKind::ReadOnlyViolation
            | ErrorKind::TransientNotReady
            | ErrorKind::ResultExhausted
            | ErrorKind::InvalidState => Status::InvalidState,
            ErrorKind::ClusterCommunication => {
                if self.is_keyspace_not_found() {
                    Status::NotFound
                } else {
                    Status::IO
                }
            }
            ErrorKind::Timeout => Status::Timeout,
            ErrorKind::Unsupported => Status::NotImplemented,
        }
    }

    /// Converts into the ADBC error type.
    pub fn to_adbc(&self) -> AdbcError {
        let mut message = self.to_string();
        if let Some(ref source) = self.source {
            message = format!("{}: {}", message, source);
        }
        let mut error = AdbcError::with_message_and_status(message, self.status());
        if let Some(code) = self
            .server_errors
            .first()
            .and_then(|e| e.code.parse::<i32>().ok())
        {
            error.vendor_code = code;
        }
        error
    }
}

impl From<Error> for AdbcError {
    fn from(error: Error) -> Self {
        error.to_adbc()
    }
}

/// Builder entry points for driver errors.
pub struct CouchbaseErrorHelper;

impl CouchbaseErrorHelper {
    pub fn syntax() -> Error {
        Error::new(ErrorKind::Syntax)
    }

    pub fn missing_credentials() -> Error {
        Error::new(ErrorKind::MissingCredentials)
    }

    pub fn read_only() -> Error {
        Error::new(ErrorKind::ReadOnlyViolation)
            .message("The server or request is read-only and cannot accept this write statement.")
    }

    pub fn cluster() -> Error {
        Error::new(ErrorKind::ClusterCommunication)
    }

    pub fn not_ready() -> Error {
        Error::new(ErrorKind::TransientNotReady)
    }

    pub fn timeout() -> Error {
        Error::new(ErrorKind::Timeout)
    }

    pub fn exhausted() -> Error {
        Error::new(ErrorKind::ResultExhausted)
    }

    pub fn not_implemented() -> Error {
        Error::new(ErrorKind::Unsupported)
    }

    pub fn invalid_argument() -> Error {
        Error::new(ErrorKind::InvalidArgument)
    }

    pub fn invalid_state() -> Error {
        Error::new(ErrorKind::InvalidState)
    }

    pub fn set_unknown_option(key: &impl AsRef<str>) -> Error {
        Self::not_implemented().message(format!("Unknown option: {}", key.as_ref()))
    }

    pub fn get_unknown_option(key: &impl AsRef<str>) -> Error {
        Error::new(ErrorKind::InvalidArgument)
            .message(format!("Option not set or unknown: {}", key.as_ref()))
    }

    pub fn set_invalid_option(key: &impl AsRef<str>, value: &impl fmt::Debug) -> Error {
        Self::invalid_argument().message(format!(
            "Invalid value for option {}: {:?}",
            key.as_ref(),
            value
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_error_from_json() {
        let e = ServerError::from_json(&json!({"code": 12003, "msg": "Keyspace not found"}));
        assert_eq!(e.code, "12003");
        assert_eq!(e.message, "Keyspace not found");

        let e = ServerError::from_json(&json!({"code": "5000", "message": "boom"}));
        assert_eq!(e.code, "5000");
        assert_eq!(e.message, "boom");
    }

    #[test]
    fn test_keyspace_not_found_classification() {
        let single = CouchbaseErrorHelper::cluster()
            .server_errors(vec![ServerError::new("13014", "no such namespace")]);
        assert!(single.is_keyspace_not_found());

        let missing = CouchbaseErrorHelper::cluster()
            .server_errors(vec![ServerError::new("12003", "Keyspace not found")]);
        assert!(missing.is_keyspace_not_found());

        let two = CouchbaseErrorHelper::cluster().server_errors(vec![
            ServerError::new("13014", "a"),
            ServerError::new("13014", "b"),
        ]);
        assert!(!two.is_keyspace_not_found());

        let other = CouchbaseErrorHelper::cluster()
            .server_errors(vec![ServerError::new("5000", "internal")]);
        assert!(!other.is_keyspace_not_found());
    }

    #[test]
    fn test_display_includes_server_entries() {
        let e = CouchbaseErrorHelper::cluster()
            .message("Query failed")
            .server_errors(vec![ServerError::new("4000", "No index available")]);
        assert_eq!(e.to_string(), "Query failed [4000] No index available");
    }

    #[test]
    fn test_to_adbc_status_mapping() {
        assert_eq!(
            CouchbaseErrorHelper::syntax().to_adbc().status,
            Status::InvalidArguments
        );
        assert_eq!(
            CouchbaseErrorHelper::read_only().to_adbc().status,
            Status::InvalidState
        );
        assert_eq!(
            CouchbaseErrorHelper::timeout().to_adbc().status,
            Status::Timeout
        );
        assert_eq!(
            CouchbaseErrorHelper::missing_credentials().to_adbc().status,
            Status::Unauthenticated
        );
        let not_found = CouchbaseErrorHelper::cluster()
            .server_errors(vec![ServerError::new("12003", "Keyspace not found")]);
        let adbc = not_found.to_adbc();
        assert_eq!(adbc.status, Status::NotFound);
        assert_eq!(adbc.vendor_code, 12003);
    }

    #[test]
    fn test_mentions_and_codes() {
        let e = CouchbaseErrorHelper::cluster()
            .server_errors(vec![ServerError::new("5000", "GSI CreatePrimaryIndex() failed")]);
        assert!(e.mentions("GSI"));
        assert!(e.has_code("5000"));
        assert!(!e.has_code("12003"));
    }
}
