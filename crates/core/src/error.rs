// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured errors for the storage layer and persisted error values.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP statuses the retry classifier treats as transient.
pub const RETRYABLE_STATUS: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Network error codes the retry classifier treats as transient.
pub const RETRYABLE_NETWORK_CODES: [&str; 9] = [
    "ECONNRESET",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "ENOTFOUND",
    "EAI_AGAIN",
    "EPIPE",
    "ECONNABORTED",
    "ENETUNREACH",
    "EHOSTUNREACH",
];

/// Error from the storage/queue layer, classified by behavior.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Attempted modification of a terminal entity.
    #[error("{entity} {id} is terminal")]
    TerminalConflict { entity: &'static str, id: String },

    /// Entity lookup miss.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Run was written by a newer runtime than this one.
    #[error("run version {run} is newer than runtime version {runtime}")]
    UnsupportedVersion { run: u32, runtime: u32 },

    /// Malformed event data.
    #[error("validation: {0}")]
    Validation(String),

    /// Transport-level failure from a remote backend.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Socket-level failure, carrying the platform error code.
    #[error("network error: {code}")]
    Network { code: String },

    /// Request aborted by a deadline.
    #[error("request timed out")]
    Timeout,
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn terminal(entity: &'static str, id: impl Into<String>) -> Self {
        Self::TerminalConflict { entity, id: id.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// HTTP status this error surfaces as, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TerminalConflict { .. } => Some(410),
            Self::NotFound { .. } => Some(404),
            Self::Validation(_) => Some(400),
            Self::Api { status, .. } => Some(*status),
            Self::UnsupportedVersion { .. } | Self::Network { .. } | Self::Timeout => None,
        }
    }

    /// True when the retry classifier may re-issue the failed call.
    ///
    /// Transient statuses and socket failures retry; every other 4xx bails
    /// immediately, as do validation and terminal-state errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => RETRYABLE_STATUS.contains(status),
            Self::Network { code } => {
                RETRYABLE_NETWORK_CODES.iter().any(|c| c.eq_ignore_ascii_case(code))
            }
            Self::Timeout => true,
            _ => false,
        }
    }

    /// Short machine-readable kind tag, stored in [`ErrorValue::code`].
    pub fn code(&self) -> &'static str {
        match self {
            Self::TerminalConflict { .. } => "terminal_conflict",
            Self::NotFound { .. } => "not_found",
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::Validation(_) => "validation",
            Self::Api { .. } => "api",
            Self::Network { .. } => "network",
            Self::Timeout => "timeout",
        }
    }
}

/// Persisted structured error: `{message, stack?, code?}`.
///
/// Older runtimes wrote flat variants (a bare string, or objects keyed
/// `error`/`msg`/`trace`/`name`); deserialization coerces all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorValue {
    pub message: String,
    pub stack: Option<String>,
    pub code: Option<String>,
}

impl ErrorValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), stack: None, code: None }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<&StoreError> for ErrorValue {
    fn from(err: &StoreError) -> Self {
        ErrorValue::new(err.to_string()).with_code(err.code())
    }
}

impl std::fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Serialize for ErrorValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut len = 1;
        if self.stack.is_some() {
            len += 1;
        }
        if self.code.is_some() {
            len += 1;
        }
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("message", &self.message)?;
        if let Some(stack) = &self.stack {
            map.serialize_entry("stack", stack)?;
        }
        if let Some(code) = &self.code {
            map.serialize_entry("code", code)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ErrorValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(coerce_error_value(&value))
    }
}

/// Coerce a persisted error of any vintage into [`ErrorValue`].
pub fn coerce_error_value(value: &serde_json::Value) -> ErrorValue {
    match value {
        serde_json::Value::String(s) => ErrorValue::new(s.clone()),
        serde_json::Value::Object(map) => {
            let field = |keys: &[&str]| {
                keys.iter()
                    .find_map(|k| map.get(*k))
                    .and_then(|v| v.as_str())
                    .map(str::to_owned)
            };
            ErrorValue {
                message: field(&["message", "error", "msg"]).unwrap_or_default(),
                stack: field(&["stack", "trace"]),
                code: field(&["code", "name"]),
            }
        }
        _ => ErrorValue::default(),
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
