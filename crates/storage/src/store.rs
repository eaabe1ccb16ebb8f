// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single write path: validate an event, derive entity mutations,
//! append the event, return the result.
//!
//! Validation runs in a fixed order; every failure maps to one specific
//! error kind so callers can branch on behavior (terminal conflict → 410,
//! missing entity → 404, and so on).

use crate::state::{hooks, runs, steps, StoreState};
use smol_str::SmolStr;
use wl_core::event::EventId;
use wl_core::{
    Event, EventBody, IdGen, Run, RunId, RunStatus, StoreError, VersionGate, SPEC_VERSION,
};
use wl_world::EventResult;

/// Per-write context: the clock reading, the ID generator, and the
/// deployment this store serves.
pub struct WriteCtx<'a> {
    pub now_ms: u64,
    pub idgen: &'a IdGen,
    pub deployment_id: &'a str,
}

/// Create one event. See module docs for pipeline order.
pub fn create(
    state: &mut StoreState,
    ctx: &WriteCtx<'_>,
    run_id: RunId,
    body: EventBody,
) -> Result<EventResult, StoreError> {
    if let EventBody::RunCreated { .. } = &body {
        return create_run(state, ctx, run_id, body);
    }
    if run_id.is_empty() {
        return Err(StoreError::validation("event is missing a run_id"));
    }

    // The run-status fetch is skipped for step_completed / step_retrying:
    // those validate inside the step-update predicate instead.
    let check_run_state =
        !matches!(body, EventBody::StepCompleted { .. } | EventBody::StepRetrying { .. });

    let run = state
        .runs
        .get(&run_id)
        .ok_or_else(|| StoreError::not_found("run", run_id.as_str()))?;
    let spec_version = run.spec_version;

    match VersionGate::classify(spec_version) {
        VersionGate::Unsupported => {
            return Err(StoreError::UnsupportedVersion { run: spec_version, runtime: SPEC_VERSION })
        }
        VersionGate::Legacy => return legacy(state, ctx, run_id, body, spec_version),
        VersionGate::Current => {}
    }

    if check_run_state && run.is_terminal() {
        match &body {
            // Cancelling a cancelled run is idempotent: log, return current state.
            EventBody::RunCancelled if run.status == RunStatus::Cancelled => {
                let event = append(state, ctx, run_id, body, spec_version);
                return Ok(EventResult {
                    event,
                    run: state.runs.get(&run_id).cloned(),
                    step: None,
                    hook: None,
                });
            }

            EventBody::RunStarted
            | EventBody::RunCompleted { .. }
            | EventBody::RunFailed { .. }
            | EventBody::RunCancelled => {
                return Err(StoreError::terminal("run", run_id.as_str()))
            }

            EventBody::StepCreated { .. } | EventBody::HookCreated { .. } => {
                return Err(StoreError::terminal("run", run_id.as_str()))
            }

            // A step of a terminal run may only change while it is running,
            // so an in-flight completion or failure can still land.
            EventBody::StepStarted { step_id } | EventBody::StepFailed { step_id, .. } => {
                let step = state
                    .step(&run_id, step_id)
                    .ok_or_else(|| StoreError::not_found("step", step_id.as_str()))?;
                if step.status != wl_core::StepStatus::Running {
                    return Err(StoreError::terminal("run", run_id.as_str()));
                }
            }

            // Hook receipt/disposal fall through to the existence guard
            // (their hooks were deleted at termination); waits are log-only.
            _ => {}
        }
    }

    match &body {
        EventBody::StepCreated { step_id, .. } => {
            if state.step(&run_id, step_id).is_some() {
                return Err(StoreError::validation(format!("step {step_id} already exists")));
            }
        }

        EventBody::StepStarted { step_id } | EventBody::StepRetrying { step_id, .. } => {
            state
                .step(&run_id, step_id)
                .ok_or_else(|| StoreError::not_found("step", step_id.as_str()))?;
        }

        // Conditional update: the predicate is `status NOT IN {completed,
        // failed}`. Zero affected rows triggers a secondary lookup to pick
        // the precise error.
        EventBody::StepCompleted { step_id, .. } | EventBody::StepFailed { step_id, .. } => {
            match state.step(&run_id, step_id) {
                None => return Err(StoreError::not_found("step", step_id.as_str())),
                Some(step) if step.is_terminal() => {
                    return Err(StoreError::terminal("step", step_id.as_str()))
                }
                Some(_) => {}
            }
        }

        EventBody::HookReceived { hook_id, .. } | EventBody::HookDisposed { hook_id } => {
            state
                .hooks
                .get(hook_id)
                .filter(|hook| hook.run_id == run_id)
                .ok_or_else(|| StoreError::not_found("hook", hook_id.as_str()))?;
        }

        // Token uniqueness across live hooks: a duplicate logs a
        // hook_conflict event instead of mutating state. The conflict is
        // correlated to the attempted hook id so replay can observe it.
        EventBody::HookCreated { hook_id, token, .. } => {
            if state.tokens.contains_key(token) {
                let conflict = EventBody::HookConflict { token: token.clone() };
                let correlation = Some(SmolStr::new(hook_id.as_str()));
                let event =
                    append_with(state, ctx, run_id, conflict, spec_version, correlation);
                return Ok(EventResult { event, run: None, step: None, hook: None });
            }
        }

        _ => {}
    }

    let step = steps::apply(state, &run_id, &body, ctx.now_ms);
    let hook = hooks::apply(state, &run_id, &body, ctx.now_ms);
    let run_changed = runs::apply(state, &run_id, &body, ctx.now_ms);
    let event = append(state, ctx, run_id, body, spec_version);
    Ok(EventResult {
        event,
        run: run_changed.then(|| state.runs.get(&run_id).cloned()).flatten(),
        step,
        hook,
    })
}

/// `run_created`: synthesize the run id server-side when the caller sent an
/// empty one, insert the run as pending, and log the event.
fn create_run(
    state: &mut StoreState,
    ctx: &WriteCtx<'_>,
    run_id: RunId,
    body: EventBody,
) -> Result<EventResult, StoreError> {
    let EventBody::RunCreated { workflow_name, spec_version, input, execution_context, deployment_id } =
        &body
    else {
        return Err(StoreError::validation("expected run_created body"));
    };

    let run_id = if run_id.is_empty() {
        RunId::generate(ctx.idgen, ctx.now_ms)
    } else {
        run_id
    };
    if state.runs.contains_key(&run_id) {
        return Err(StoreError::validation(format!("run {run_id} already exists")));
    }

    let version = (*spec_version).unwrap_or(SPEC_VERSION);
    if VersionGate::classify(version) == VersionGate::Unsupported {
        return Err(StoreError::UnsupportedVersion { run: version, runtime: SPEC_VERSION });
    }

    let run = Run {
        run_id,
        deployment_id: deployment_id.clone().unwrap_or_else(|| ctx.deployment_id.to_string()),
        workflow_name: workflow_name.clone(),
        spec_version: version,
        input: input.clone(),
        execution_context: execution_context.clone(),
        status: RunStatus::Pending,
        output: None,
        error: None,
        created_at_ms: ctx.now_ms,
        started_at_ms: None,
        completed_at_ms: None,
        expired_at_ms: None,
        updated_at_ms: ctx.now_ms,
    };
    state.runs.insert(run_id, run.clone());
    let event = append(state, ctx, run_id, body, version);
    Ok(EventResult { event, run: Some(run), step: None, hook: None })
}

/// Restricted handler for runs from before the event-sourcing threshold:
/// cancellation mutates the run directly, wait completion only logs, and
/// everything else is refused.
fn legacy(
    state: &mut StoreState,
    ctx: &WriteCtx<'_>,
    run_id: RunId,
    body: EventBody,
    spec_version: u32,
) -> Result<EventResult, StoreError> {
    match &body {
        EventBody::RunCancelled => {
            let status = state.runs.get(&run_id).map(|r| r.status);
            match status {
                Some(RunStatus::Cancelled) => {}
                Some(s) if s.is_terminal() => {
                    return Err(StoreError::terminal("run", run_id.as_str()))
                }
                _ => runs::cancel(state, &run_id, ctx.now_ms),
            }
            let event = append(state, ctx, run_id, body, spec_version);
            Ok(EventResult { event, run: state.runs.get(&run_id).cloned(), step: None, hook: None })
        }

        EventBody::WaitCompleted { .. } => {
            let event = append(state, ctx, run_id, body, spec_version);
            Ok(EventResult { event, run: None, step: None, hook: None })
        }

        other => Err(StoreError::validation(format!(
            "legacy run {run_id} does not accept {}",
            other.event_type()
        ))),
    }
}

/// Append the event row. The generated event id is strictly increasing, so
/// log order equals wall-clock order of successful writes.
fn append(
    state: &mut StoreState,
    ctx: &WriteCtx<'_>,
    run_id: RunId,
    body: EventBody,
    spec_version: u32,
) -> Event {
    let correlation = body.correlation_id().map(SmolStr::new);
    append_with(state, ctx, run_id, body, spec_version, correlation)
}

fn append_with(
    state: &mut StoreState,
    ctx: &WriteCtx<'_>,
    run_id: RunId,
    body: EventBody,
    spec_version: u32,
    correlation_id: Option<SmolStr>,
) -> Event {
    let event = Event {
        run_id,
        event_id: EventId::generate(ctx.idgen, ctx.now_ms),
        correlation_id,
        body,
        created_at_ms: ctx.now_ms,
        spec_version,
    };
    state.events.entry(run_id).or_default().push(event.clone());
    tracing::debug!(
        run_id = %run_id,
        event_id = %event.event_id,
        event_type = %event.event_type(),
        "event appended"
    );
    event
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
