// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow replay context.
//!
//! A workflow function is replayed from the top on every orchestrator tick.
//! Calls into this context do not run step bodies; they resolve against the
//! run's event log. A call whose event has not landed yet buffers a command
//! (step/hook/wait creation) and suspends the replay by returning
//! [`FlowError::Suspend`], which the workflow function propagates with `?`.
//!
//! Determinism contract: given the same event log, the workflow function
//! must make the same context calls in the same order. Call identities are
//! `<base>#<occurrence>` where the base comes from the manifest (or the
//! step name) and the occurrence index counts calls per base during one
//! replay.

use crate::error::FlowError;
use crate::hooks::webhook_path;
use crate::manifest::Manifest;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wl_core::{Event, EventBody, HookId, Run, RunId, StepId, StepInput};

/// Buffered effect the orchestrator persists when the replay settles.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    CreateStep { step_id: StepId, step_name: SmolStr, input: StepInput },
    CreateHook { hook_id: HookId, token: String, metadata: Option<Value> },
    CreateWait { wait_id: SmolStr, wake_at_ms: u64 },
    CompleteWait { wait_id: SmolStr },
}

struct CtxInner {
    run: Run,
    now_ms: u64,
    manifest: Option<Arc<Manifest>>,
    /// Event bodies grouped by correlation id, in log order.
    by_correlation: HashMap<SmolStr, Vec<EventBody>>,
    counters: Mutex<HashMap<SmolStr, u32>>,
    commands: Mutex<Vec<Command>>,
}

/// Handle passed to workflow functions. Cheap to clone.
#[derive(Clone)]
pub struct WorkflowCtx {
    inner: Arc<CtxInner>,
}

impl WorkflowCtx {
    pub(crate) fn new(
        run: Run,
        events: &[Event],
        now_ms: u64,
        manifest: Option<Arc<Manifest>>,
    ) -> Self {
        let mut by_correlation: HashMap<SmolStr, Vec<EventBody>> = HashMap::new();
        for event in events {
            if let Some(correlation) = &event.correlation_id {
                by_correlation.entry(correlation.clone()).or_default().push(event.body.clone());
            }
        }
        Self {
            inner: Arc::new(CtxInner {
                run,
                now_ms,
                manifest,
                by_correlation,
                counters: Mutex::new(HashMap::new()),
                commands: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.inner.run.run_id
    }

    /// The run's positional input arguments, order preserved.
    pub fn input(&self) -> &[Value] {
        &self.inner.run.input
    }

    pub fn execution_context(&self) -> &IndexMap<String, Value> {
        &self.inner.run.execution_context
    }

    /// Drain the buffered commands (orchestrator only).
    pub(crate) fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *self.inner.commands.lock())
    }

    fn correlated(&self, id: &str) -> &[EventBody] {
        self.inner.by_correlation.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Next occurrence index for `base` during this replay.
    fn occurrence(&self, base: &str) -> u32 {
        let mut counters = self.inner.counters.lock();
        let counter = counters.entry(SmolStr::new(base)).or_insert(0);
        let n = *counter;
        *counter += 1;
        n
    }

    fn push(&self, command: Command) {
        self.inner.commands.lock().push(command);
    }

    /// Call a declared step with positional arguments.
    ///
    /// Parallel step calls: invoke `step` for every branch before `?`-ing
    /// any result; each unresolved branch buffers its own creation, so all
    /// of them dispatch before the replay suspends.
    pub fn step(&self, step_name: &str, args: Vec<Value>) -> Result<Value, FlowError> {
        self.step_captured(step_name, args, IndexMap::new())
    }

    /// Like [`Self::step`], additionally persisting variables captured at
    /// the call site. Key order is preserved across replay.
    pub fn step_captured(
        &self,
        step_name: &str,
        args: Vec<Value>,
        closure: IndexMap<String, Value>,
    ) -> Result<Value, FlowError> {
        let base = self
            .inner
            .manifest
            .as_deref()
            .and_then(|m| m.step_id_for(step_name))
            .unwrap_or(step_name);
        let step_id = format!("{base}#{}", self.occurrence(base));

        let mut created = false;
        for body in self.correlated(&step_id) {
            match body {
                EventBody::StepCompleted { output, .. } => {
                    return Ok(output.clone().unwrap_or(Value::Null))
                }
                EventBody::StepFailed { error, fatal: true, .. } => {
                    return Err(FlowError::Fail(error.clone()))
                }
                EventBody::StepCreated { .. } => created = true,
                _ => {}
            }
        }
        if !created {
            self.push(Command::CreateStep {
                step_id: StepId::new(&step_id),
                step_name: SmolStr::new(step_name),
                input: StepInput { args, closure },
            });
        }
        // Unresolved either way: a dispatch is (or is about to be) in flight.
        Err(FlowError::Suspend)
    }

    /// Durable sleep. Suspends until the wake instant has passed.
    pub fn sleep(&self, duration: Duration) -> Result<(), FlowError> {
        let wait_id = SmolStr::new(format!("wait#{}", self.occurrence("wait")));

        let mut wake_at_ms = None;
        for body in self.correlated(&wait_id) {
            match body {
                EventBody::WaitCompleted { .. } => return Ok(()),
                EventBody::WaitCreated { wake_at_ms: at, .. } => wake_at_ms = Some(*at),
                _ => {}
            }
        }
        match wake_at_ms {
            Some(at) if self.inner.now_ms >= at => {
                // Wake instant passed: complete the wait and keep executing.
                self.push(Command::CompleteWait { wait_id });
                Ok(())
            }
            // Early re-entry; the delayed wake message is still pending.
            Some(_) => Err(FlowError::Suspend),
            None => {
                let at = self.inner.now_ms + duration.as_millis() as u64;
                self.push(Command::CreateWait { wait_id, wake_at_ms: at });
                Err(FlowError::Suspend)
            }
        }
    }

    /// Create a durable hook with a generated token.
    ///
    /// Creation itself never suspends: the handle is returned immediately
    /// and [`HookHandle::received`] is the suspension point.
    pub fn create_hook(&self) -> HookHandle {
        self.create_hook_with(None, None)
    }

    pub fn create_hook_with(
        &self,
        token: Option<String>,
        metadata: Option<Value>,
    ) -> HookHandle {
        // Run-qualified so hook ids are globally unique while staying
        // deterministic per call site.
        let hook_id =
            HookId::new(format!("{}/hook#{}", self.run_id(), self.occurrence("hook")));

        let mut known_token = None;
        let mut exists = false;
        for body in self.correlated(hook_id.as_str()) {
            match body {
                EventBody::HookCreated { token, .. } => {
                    exists = true;
                    known_token = Some(token.clone());
                }
                EventBody::HookConflict { token, .. } => {
                    exists = true;
                    known_token = Some(token.clone());
                }
                _ => {}
            }
        }

        let token = match known_token {
            Some(token) => token,
            None => token.unwrap_or_else(|| nanoid::nanoid!(24)),
        };
        if !exists {
            self.push(Command::CreateHook {
                hook_id: hook_id.clone(),
                token: token.clone(),
                metadata,
            });
        }
        HookHandle { ctx: self.clone(), hook_id, token }
    }
}

/// A created hook. Await its payload with [`HookHandle::received`].
#[derive(Clone)]
pub struct HookHandle {
    ctx: WorkflowCtx,
    hook_id: HookId,
    token: String,
}

impl HookHandle {
    pub fn hook_id(&self) -> &HookId {
        &self.hook_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Webhook URL path external callers POST to.
    pub fn url(&self) -> String {
        webhook_path(&self.token)
    }

    /// Resolve the hook's payload, suspending until a webhook delivery
    /// lands. A token conflict recorded at creation surfaces here as a
    /// workflow-visible failure.
    pub fn received(&self) -> Result<Value, FlowError> {
        for body in self.ctx.correlated(self.hook_id.as_str()) {
            match body {
                EventBody::HookReceived { payload, .. } => return Ok(payload.clone()),
                EventBody::HookConflict { token } => {
                    return Err(FlowError::Fail(
                        wl_core::ErrorValue::new(format!(
                            "hook token {token} is already held by a live hook"
                        ))
                        .with_code("hook_conflict"),
                    ))
                }
                _ => {}
            }
        }
        Err(FlowError::Suspend)
    }
}

#[cfg(test)]
#[path = "ctx_tests.rs"]
mod tests;
