// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery for hooks.
//!
//! External callers POST to `/.well-known/workflow/v1/webhook/<token>`. The
//! HTTP adapter is out of scope; this module is the framework-independent
//! entry: look the hook up by token, log `hook_received` with the request
//! payload, wake the orchestrator, and hand back the resume payload as the
//! response body.

use crate::error::EngineError;
use crate::orchestrate::enqueue_flow;
use serde_json::{json, Value};
use std::sync::Arc;
use wl_core::{EventBody, TraceContext};
use wl_world::{ResolveData, World};

/// Base path of the workflow surface.
pub const WELL_KNOWN_BASE: &str = "/.well-known/workflow/v1";

/// Orchestration endpoint paths (conventional; served by the embedding
/// framework adapter).
pub const FLOW_PATH: &str = "/.well-known/workflow/v1/flow";
pub const STEP_PATH: &str = "/.well-known/workflow/v1/step";

/// Webhook URL path for a hook token.
pub fn webhook_path(token: &str) -> String {
    format!("{WELL_KNOWN_BASE}/webhook/{}", encode_component(token))
}

/// Generate a fresh opaque hook token.
pub fn new_token() -> String {
    nanoid::nanoid!(24)
}

/// Percent-encode one path segment, keeping RFC 3986 unreserved characters.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}

/// Deliver a webhook request to the hook addressed by `token`.
///
/// Unknown tokens surface as `NotFound` (404). Returns the payload the
/// hook's run resumes with, which is also the webhook response body.
pub async fn deliver_webhook(
    world: &Arc<dyn World>,
    token: &str,
    body: Value,
    headers: TraceContext,
    now_ms: u64,
) -> Result<Value, EngineError> {
    let hook = world.get_hook_by_token(token).await?;
    let payload = json!({ "body": body, "headers": headers });

    world
        .create_event(
            hook.run_id,
            EventBody::HookReceived { hook_id: hook.hook_id.clone(), payload: payload.clone() },
        )
        .await?;

    let run = world.get_run(&hook.run_id, ResolveData::None).await?;
    enqueue_flow(world, hook.run_id, &run.workflow_name, &headers, now_ms).await?;

    tracing::info!(run_id = %hook.run_id, hook_id = %hook.hook_id, "webhook delivered");
    Ok(payload)
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
