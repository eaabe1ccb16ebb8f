// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event records and their typed bodies.
//!
//! Every state-changing operation flows through exactly one event. Bodies
//! serialize with `{"type": "event_name", ...fields}` format; the set of
//! event types is closed.

use crate::error::ErrorValue;
use crate::hook::HookId;
use crate::run::RunId;
use crate::step::{StepId, StepInput};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

crate::define_id! {
    /// Unique, sortable identifier for an event. Strictly increasing within
    /// a run; the ordering key for replay and pagination cursors.
    pub struct EventId("evt-");
}

/// Tag-only view of the closed event-type set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunCreated,
    RunStarted,
    RunCompleted,
    RunFailed,
    RunCancelled,
    StepCreated,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepRetrying,
    HookCreated,
    HookReceived,
    HookConflict,
    HookDisposed,
    WaitCreated,
    WaitCompleted,
}

crate::simple_display! {
    EventType {
        RunCreated => "run_created",
        RunStarted => "run_started",
        RunCompleted => "run_completed",
        RunFailed => "run_failed",
        RunCancelled => "run_cancelled",
        StepCreated => "step_created",
        StepStarted => "step_started",
        StepCompleted => "step_completed",
        StepFailed => "step_failed",
        StepRetrying => "step_retrying",
        HookCreated => "hook_created",
        HookReceived => "hook_received",
        HookConflict => "hook_conflict",
        HookDisposed => "hook_disposed",
        WaitCreated => "wait_created",
        WaitCompleted => "wait_completed",
    }
}

/// Typed event body. The single write path `events.create` validates the
/// body, derives entity mutations from it, and appends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventBody {
    RunCreated {
        workflow_name: SmolStr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spec_version: Option<u32>,
        #[serde(default)]
        input: Vec<Value>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        execution_context: IndexMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deployment_id: Option<String>,
    },

    RunStarted,

    RunCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },

    RunFailed {
        error: ErrorValue,
    },

    RunCancelled,

    StepCreated {
        step_id: StepId,
        step_name: SmolStr,
        #[serde(default)]
        input: StepInput,
    },

    StepStarted {
        step_id: StepId,
    },

    StepCompleted {
        step_id: StepId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },

    StepFailed {
        step_id: StepId,
        error: ErrorValue,
        /// True when no further attempts are allowed; false records an
        /// informational failure preceding a retry.
        #[serde(default)]
        fatal: bool,
    },

    StepRetrying {
        step_id: StepId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },

    HookCreated {
        hook_id: HookId,
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },

    HookReceived {
        hook_id: HookId,
        payload: Value,
    },

    HookConflict {
        token: String,
    },

    HookDisposed {
        hook_id: HookId,
    },

    WaitCreated {
        wait_id: SmolStr,
        wake_at_ms: u64,
    },

    WaitCompleted {
        wait_id: SmolStr,
    },
}

impl EventBody {
    pub fn event_type(&self) -> EventType {
        match self {
            EventBody::RunCreated { .. } => EventType::RunCreated,
            EventBody::RunStarted => EventType::RunStarted,
            EventBody::RunCompleted { .. } => EventType::RunCompleted,
            EventBody::RunFailed { .. } => EventType::RunFailed,
            EventBody::RunCancelled => EventType::RunCancelled,
            EventBody::StepCreated { .. } => EventType::StepCreated,
            EventBody::StepStarted { .. } => EventType::StepStarted,
            EventBody::StepCompleted { .. } => EventType::StepCompleted,
            EventBody::StepFailed { .. } => EventType::StepFailed,
            EventBody::StepRetrying { .. } => EventType::StepRetrying,
            EventBody::HookCreated { .. } => EventType::HookCreated,
            EventBody::HookReceived { .. } => EventType::HookReceived,
            EventBody::HookConflict { .. } => EventType::HookConflict,
            EventBody::HookDisposed { .. } => EventType::HookDisposed,
            EventBody::WaitCreated { .. } => EventType::WaitCreated,
            EventBody::WaitCompleted { .. } => EventType::WaitCompleted,
        }
    }

    /// The step/hook/wait identifier this event refers to, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            EventBody::StepCreated { step_id, .. }
            | EventBody::StepStarted { step_id }
            | EventBody::StepCompleted { step_id, .. }
            | EventBody::StepFailed { step_id, .. }
            | EventBody::StepRetrying { step_id, .. } => Some(step_id.as_str()),
            EventBody::HookCreated { hook_id, .. }
            | EventBody::HookReceived { hook_id, .. }
            | EventBody::HookDisposed { hook_id } => Some(hook_id.as_str()),
            EventBody::WaitCreated { wait_id, .. } | EventBody::WaitCompleted { wait_id } => {
                Some(wait_id.as_str())
            }
            _ => None,
        }
    }

    /// True for events that transition the run's own status.
    pub fn is_run_transition(&self) -> bool {
        matches!(
            self,
            EventBody::RunStarted
                | EventBody::RunCompleted { .. }
                | EventBody::RunFailed { .. }
                | EventBody::RunCancelled
        )
    }

    /// True for events that only append to the log without touching entities.
    pub fn is_log_only(&self) -> bool {
        matches!(
            self,
            EventBody::HookReceived { .. }
                | EventBody::HookConflict { .. }
                | EventBody::WaitCreated { .. }
                | EventBody::WaitCompleted { .. }
        )
    }

    /// Drop payload-heavy fields (`resolve_data = none` reads).
    pub fn strip_data(self) -> Self {
        match self {
            EventBody::RunCreated { workflow_name, spec_version, deployment_id, .. } => {
                EventBody::RunCreated {
                    workflow_name,
                    spec_version,
                    input: Vec::new(),
                    execution_context: IndexMap::new(),
                    deployment_id,
                }
            }
            EventBody::RunCompleted { .. } => EventBody::RunCompleted { output: None },
            EventBody::StepCreated { step_id, step_name, .. } => {
                EventBody::StepCreated { step_id, step_name, input: StepInput::default() }
            }
            EventBody::StepCompleted { step_id, .. } => {
                EventBody::StepCompleted { step_id, output: None }
            }
            EventBody::HookCreated { hook_id, token, .. } => {
                EventBody::HookCreated { hook_id, token, metadata: None }
            }
            EventBody::HookReceived { hook_id, .. } => {
                EventBody::HookReceived { hook_id, payload: Value::Null }
            }
            other => other,
        }
    }
}

/// A persisted event row. The typed body serializes under `event_data`
/// with its `type` tag inside, keeping row-level fields (`spec_version`,
/// timestamps) distinct from event payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run_id: RunId,
    pub event_id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<SmolStr>,
    #[serde(rename = "event_data")]
    pub body: EventBody,
    pub created_at_ms: u64,
    pub spec_version: u32,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.body.event_type()
    }

    /// Elide payload fields for cheap list pagination.
    pub fn strip_data(mut self) -> Self {
        self.body = self.body.strip_data();
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
