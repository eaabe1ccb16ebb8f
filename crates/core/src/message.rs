// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue message DTOs shared by the dispatcher and its handlers.

use crate::run::RunId;
use crate::step::StepId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::HashMap;

/// Propagated trace headers. Opaque to the core; carried verbatim so a
/// backend can stitch spans across queue hops.
pub type TraceContext = HashMap<String, String>;

/// One orchestrator tick, delivered on `workflow.<workflow_name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMessage {
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub trace: TraceContext,
    /// Enqueue instant, for queue-overhead telemetry.
    pub requested_at_ms: u64,
}

/// One step invocation, delivered on `step.<step_name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMessage {
    pub run_id: RunId,
    pub step_id: StepId,
    pub workflow_name: SmolStr,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub trace: TraceContext,
    pub requested_at_ms: u64,
}

/// What a handler tells the queue about the delivery it just received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Done with this delivery.
    Ack,
    /// Hide the message and redeliver after the given number of seconds.
    Defer { timeout_seconds: u64 },
}

/// Reserved marker key: a payload carrying it is a health probe and must be
/// answered with success and no side effects.
pub const HEALTH_CHECK_KEY: &str = "__health_check__";

/// Build a health-probe payload.
pub fn health_probe() -> Value {
    serde_json::json!({ HEALTH_CHECK_KEY: true })
}

/// True when `payload` is the reserved health-probe marker.
pub fn is_health_probe(payload: &Value) -> bool {
    payload
        .as_object()
        .and_then(|map| map.get(HEALTH_CHECK_KEY))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
