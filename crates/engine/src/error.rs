// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error kinds.
//!
//! Step functions fail with [`StepError`], whose variant decides the retry
//! path. Workflow functions fail (or suspend) with [`FlowError`]. Handler
//! plumbing fails with [`EngineError`].

use std::time::Duration;
use thiserror::Error;
use wl_core::{ErrorValue, StoreError};

/// Error thrown by a user step function, classified by behavior.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// Unrecoverable by the user's own statement: fail the step now,
    /// surface the failure to the awaiting workflow.
    #[error("{message}")]
    Fatal { message: String },

    /// Recoverable; optionally names the instant before which the step must
    /// not run again.
    #[error("{message}")]
    Retryable { message: String, retry_after: Option<Duration> },

    /// Storage/queue-layer failure the step chose to surface unchanged.
    #[error(transparent)]
    Api(#[from] StoreError),

    /// Anything else: retried until the attempt budget runs out.
    #[error("{message}")]
    Other { message: String },
}

impl StepError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal { message: message.into() }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable { message: message.into(), retry_after: None }
    }

    pub fn retry_after(message: impl Into<String>, delay: Duration) -> Self {
        Self::Retryable { message: message.into(), retry_after: Some(delay) }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other { message: message.into() }
    }

    pub fn to_error_value(&self) -> ErrorValue {
        match self {
            Self::Api(err) => ErrorValue::from(err),
            Self::Fatal { message } => ErrorValue::new(message.clone()).with_code("fatal"),
            Self::Retryable { message, .. } => {
                ErrorValue::new(message.clone()).with_code("retryable")
            }
            Self::Other { message } => ErrorValue::new(message.clone()),
        }
    }
}

/// Control flow out of a workflow function.
///
/// `Suspend` is not a failure: it means the replay reached a call whose
/// event has not landed yet, so the orchestrator parks the run. `Fail` is
/// the user-visible run failure.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("run suspended")]
    Suspend,

    #[error("{0}")]
    Fail(ErrorValue),
}

impl FlowError {
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(ErrorValue::new(message))
    }
}

impl From<ErrorValue> for FlowError {
    fn from(value: ErrorValue) -> Self {
        Self::Fail(value)
    }
}

/// Internal handler failure: bad message, missing registration, or a
/// storage error the handler could not classify away.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("malformed queue message: {0}")]
    BadMessage(String),

    #[error("no handler registered for topic {0}")]
    UnknownTopic(String),
}

impl EngineError {
    pub fn bad_message(err: impl std::fmt::Display) -> Self {
        Self::BadMessage(err.to_string())
    }
}
