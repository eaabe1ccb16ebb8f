// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity state owned by the store.
//!
//! The store exclusively owns these rows; everything else reads them through
//! the `World` facade. All mutation goes through [`crate::store::create`],
//! which holds the state lock across the event append and its derived
//! entity update, so the pair is atomic relative to readers.

pub(crate) mod hooks;
pub(crate) mod runs;
pub(crate) mod steps;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use wl_core::{Event, Hook, HookId, Run, RunId, Step, StepId};

/// One in-memory stream: ordered chunks plus a closed flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamRecord {
    pub chunks: Vec<Value>,
    pub closed: bool,
}

/// Entity maps plus the per-run event logs.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreState {
    pub runs: HashMap<RunId, Run>,
    /// Steps per run, in creation order.
    pub steps: HashMap<RunId, IndexMap<StepId, Step>>,
    /// Live hooks. Hook IDs are run-qualified by the orchestrator, so the
    /// map is global.
    pub hooks: HashMap<HookId, Hook>,
    /// Live token index; uniqueness across live hooks is enforced here.
    pub tokens: HashMap<String, HookId>,
    /// Append-only event logs, strictly ordered by event id.
    pub events: HashMap<RunId, Vec<Event>>,
    /// Stream chunks keyed by `(run, stream)`.
    pub streams: HashMap<(RunId, String), StreamRecord>,
}

impl StoreState {
    pub fn step(&self, run_id: &RunId, step_id: &StepId) -> Option<&Step> {
        self.steps.get(run_id)?.get(step_id)
    }

    pub fn step_mut(&mut self, run_id: &RunId, step_id: &StepId) -> Option<&mut Step> {
        self.steps.get_mut(run_id)?.get_mut(step_id)
    }

    /// Live hooks of one run, in creation order.
    pub fn hooks_of(&self, run_id: &RunId) -> Vec<Hook> {
        let mut hooks: Vec<Hook> =
            self.hooks.values().filter(|h| h.run_id == *run_id).cloned().collect();
        hooks.sort_by(|a, b| {
            (a.created_at_ms, a.hook_id.as_str()).cmp(&(b.created_at_ms, b.hook_id.as_str()))
        });
        hooks
    }

    /// Delete every hook owned by `run_id`, releasing its tokens.
    pub(crate) fn delete_hooks_of(&mut self, run_id: &RunId) {
        let doomed: Vec<HookId> = self
            .hooks
            .iter()
            .filter(|(_, h)| h.run_id == *run_id)
            .map(|(id, _)| id.clone())
            .collect();
        for hook_id in doomed {
            if let Some(hook) = self.hooks.remove(&hook_id) {
                self.tokens.remove(&hook.token);
            }
        }
    }

    /// Drop payload data (keys retained) of terminal runs whose expiry has
    /// passed. Events, steps, and the run keep their identities.
    pub fn expire_before(&mut self, now_ms: u64) {
        let expired: Vec<RunId> = self
            .runs
            .values()
            .filter(|r| r.is_terminal() && r.expired_at_ms.is_some_and(|at| at <= now_ms))
            .map(|r| r.run_id)
            .collect();
        for run_id in expired {
            if let Some(run) = self.runs.get_mut(&run_id) {
                *run = run.clone().strip_data();
            }
            if let Some(steps) = self.steps.get_mut(&run_id) {
                for step in steps.values_mut() {
                    *step = step.clone().strip_data();
                }
            }
            if let Some(events) = self.events.get_mut(&run_id) {
                for event in events.iter_mut() {
                    *event = event.clone().strip_data();
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
