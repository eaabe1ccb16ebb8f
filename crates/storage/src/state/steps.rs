// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step entity derivations.

use super::StoreState;
use wl_core::{EventBody, RunId, Step, StepStatus};

/// Apply a step event. Returns the affected step, cloned for the caller's
/// result. Validation has already run; missing rows are a no-op here.
pub(crate) fn apply(
    state: &mut StoreState,
    run_id: &RunId,
    body: &EventBody,
    now_ms: u64,
) -> Option<Step> {
    match body {
        EventBody::StepCreated { step_id, step_name, input } => {
            let step = Step {
                run_id: *run_id,
                step_id: step_id.clone(),
                step_name: step_name.clone(),
                status: StepStatus::Pending,
                input: input.clone(),
                output: None,
                error: None,
                attempt: 0,
                started_at_ms: None,
                completed_at_ms: None,
                retry_after_ms: None,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            };
            state.steps.entry(*run_id).or_default().insert(step_id.clone(), step.clone());
            Some(step)
        }

        EventBody::StepStarted { step_id } => {
            let step = state.step_mut(run_id, step_id)?;
            step.status = StepStatus::Running;
            step.attempt += 1;
            if step.started_at_ms.is_none() {
                step.started_at_ms = Some(now_ms);
            }
            step.updated_at_ms = now_ms;
            Some(step.clone())
        }

        EventBody::StepCompleted { step_id, output } => {
            let step = state.step_mut(run_id, step_id)?;
            step.status = StepStatus::Completed;
            step.output.clone_from(output);
            step.completed_at_ms = Some(now_ms);
            step.updated_at_ms = now_ms;
            Some(step.clone())
        }

        EventBody::StepFailed { step_id, error, .. } => {
            let step = state.step_mut(run_id, step_id)?;
            step.status = StepStatus::Failed;
            step.error = Some(error.clone());
            step.completed_at_ms = Some(now_ms);
            step.updated_at_ms = now_ms;
            Some(step.clone())
        }

        EventBody::StepRetrying { step_id, error, retry_after_ms } => {
            let step = state.step_mut(run_id, step_id)?;
            step.status = StepStatus::Pending;
            if error.is_some() {
                step.error.clone_from(error);
            }
            step.retry_after_ms = *retry_after_ms;
            step.updated_at_ms = now_ms;
            Some(step.clone())
        }

        _ => None,
    }
}
