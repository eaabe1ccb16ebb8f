// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run entity: one execution instance of a workflow.

use crate::error::ErrorValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

crate::define_id! {
    /// Unique, sortable identifier for a run instance.
    pub struct RunId("run-");
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Terminal statuses are sticky: no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }
}

crate::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// A run instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    #[serde(default)]
    pub deployment_id: String,
    pub workflow_name: SmolStr,
    pub spec_version: u32,
    /// Serialized positional arguments, order preserved across replay.
    #[serde(default)]
    pub input: Vec<Value>,
    /// Opaque caller-supplied context, key order preserved.
    #[serde(default)]
    pub execution_context: IndexMap<String, Value>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    /// After this instant a terminal run's data may be dropped (keys retained).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at_ms: Option<u64>,
    pub updated_at_ms: u64,
}

impl Run {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elide payload fields for cheap list pagination (`resolve_data = none`).
    pub fn strip_data(mut self) -> Self {
        self.input = Vec::new();
        self.execution_context = IndexMap::new();
        self.output = None;
        self
    }
}

crate::builder! {
    pub struct RunBuilder => Run {
        into {
            run_id: RunId = "run-t0000000000000001",
            deployment_id: String = "dpl-test",
            workflow_name: SmolStr = "workflow//app//main",
        }
        set {
            spec_version: u32 = crate::version::SPEC_VERSION,
            input: Vec<Value> = Vec::new(),
            execution_context: IndexMap<String, Value> = IndexMap::new(),
            status: RunStatus = RunStatus::Pending,
            created_at_ms: u64 = 1_000_000,
            updated_at_ms: u64 = 1_000_000,
        }
        option {
            output: Value = None,
            error: ErrorValue = None,
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
            expired_at_ms: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
