// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step entity: one durable, individually retryable call inside a run.

use crate::error::ErrorValue;
use crate::run::RunId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

crate::define_key! {
    /// Caller-supplied step identifier, deterministic per call site and
    /// opaque to the store.
    pub struct StepId;
}

/// Lifecycle status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

crate::simple_display! {
    StepStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Persisted step input: positional arguments plus variables captured at the
/// call site. Argument order and closure key order are preserved so replay
/// sees exactly what the first execution saw.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepInput {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub closure: IndexMap<String, Value>,
}

impl StepInput {
    pub fn args(args: Vec<Value>) -> Self {
        Self { args, closure: IndexMap::new() }
    }
}

/// A durable step call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub run_id: RunId,
    pub step_id: StepId,
    pub step_name: SmolStr,
    pub status: StepStatus,
    #[serde(default)]
    pub input: StepInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
    /// Incremented on each start; never decreases.
    #[serde(default)]
    pub attempt: u32,
    /// Set by the first start only, immutable thereafter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    /// Future instant gating re-execution after a retryable failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elide payload fields for cheap list pagination (`resolve_data = none`).
    pub fn strip_data(mut self) -> Self {
        self.input = StepInput::default();
        self.output = None;
        self
    }
}

crate::builder! {
    pub struct StepBuilder => Step {
        into {
            run_id: RunId = "run-t0000000000000001",
            step_id: StepId = "step//app//add#0",
            step_name: SmolStr = "step//app//add",
        }
        set {
            status: StepStatus = StepStatus::Pending,
            input: StepInput = StepInput::default(),
            attempt: u32 = 0,
            created_at_ms: u64 = 1_000_000,
            updated_at_ms: u64 = 1_000_000,
        }
        option {
            output: Value = None,
            error: ErrorValue = None,
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
            retry_after_ms: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
