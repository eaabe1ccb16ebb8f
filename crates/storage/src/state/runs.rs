// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run entity derivations.

use super::StoreState;
use wl_core::{EventBody, RunId, RunStatus};

/// Apply a run-transition event. Returns true when the run row changed.
///
/// Handlers are idempotent: re-applying an event leaves the same state.
/// Terminal transitions also garbage-collect the run's hooks, atomically
/// with the event append because the caller holds the state lock.
pub(crate) fn apply(state: &mut StoreState, run_id: &RunId, body: &EventBody, now_ms: u64) -> bool {
    let Some(run) = state.runs.get_mut(run_id) else {
        return false;
    };

    match body {
        EventBody::RunStarted => {
            run.status = RunStatus::Running;
            if run.started_at_ms.is_none() {
                run.started_at_ms = Some(now_ms);
            }
            run.updated_at_ms = now_ms;
            true
        }

        EventBody::RunCompleted { output } => {
            run.status = RunStatus::Completed;
            run.output.clone_from(output);
            finish(run, now_ms);
            state.delete_hooks_of(run_id);
            true
        }

        EventBody::RunFailed { error } => {
            run.status = RunStatus::Failed;
            run.error = Some(error.clone());
            finish(run, now_ms);
            state.delete_hooks_of(run_id);
            true
        }

        EventBody::RunCancelled => {
            cancel(state, run_id, now_ms);
            true
        }

        _ => false,
    }
}

/// Direct cancellation, shared with the legacy handler.
pub(crate) fn cancel(state: &mut StoreState, run_id: &RunId, now_ms: u64) {
    if let Some(run) = state.runs.get_mut(run_id) {
        run.status = RunStatus::Cancelled;
        finish(run, now_ms);
    }
    state.delete_hooks_of(run_id);
}

fn finish(run: &mut wl_core::Run, now_ms: u64) {
    if run.completed_at_ms.is_none() {
        run.completed_at_ms = Some(now_ms);
    }
    run.updated_at_ms = now_ms;
}
