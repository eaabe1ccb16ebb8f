// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wl_core::{Run, RunStatus, Step};

fn hook(run_id: &str, hook_id: &str, token: &str, created_at_ms: u64) -> Hook {
    Hook {
        run_id: RunId::from_string(run_id),
        hook_id: HookId::new(hook_id),
        token: token.to_string(),
        metadata: None,
        created_at_ms,
    }
}

fn insert_hook(state: &mut StoreState, h: Hook) {
    state.tokens.insert(h.token.clone(), h.hook_id.clone());
    state.hooks.insert(h.hook_id.clone(), h);
}

#[test]
fn hooks_of_filters_by_run_in_creation_order() {
    let mut state = StoreState::default();
    insert_hook(&mut state, hook("run-a", "h#1", "t1", 200));
    insert_hook(&mut state, hook("run-a", "h#0", "t0", 100));
    insert_hook(&mut state, hook("run-b", "h#2", "t2", 150));

    let hooks = state.hooks_of(&RunId::from_string("run-a"));
    let ids: Vec<&str> = hooks.iter().map(|h| h.hook_id.as_str()).collect();
    assert_eq!(ids, vec!["h#0", "h#1"]);
}

#[test]
fn delete_hooks_of_releases_tokens() {
    let mut state = StoreState::default();
    insert_hook(&mut state, hook("run-a", "h#0", "t0", 100));
    insert_hook(&mut state, hook("run-b", "h#1", "t1", 100));

    state.delete_hooks_of(&RunId::from_string("run-a"));
    assert!(!state.tokens.contains_key("t0"));
    assert!(state.tokens.contains_key("t1"));
    assert_eq!(state.hooks.len(), 1);
}

#[test]
fn expire_drops_data_but_keeps_keys() {
    let mut state = StoreState::default();
    let run = Run::builder()
        .status(RunStatus::Completed)
        .input(vec![serde_json::json!("payload")])
        .output(serde_json::json!(15))
        .expired_at_ms(2_000u64)
        .build();
    let run_id = run.run_id;
    state.runs.insert(run_id, run);
    let step = Step::builder()
        .run_id(run_id)
        .output(serde_json::json!("chunk"))
        .build();
    let step_id = step.step_id.clone();
    state.steps.entry(run_id).or_default().insert(step_id.clone(), step);

    state.expire_before(1_999);
    assert!(state.runs.get(&run_id).unwrap().output.is_some(), "not yet expired");

    state.expire_before(2_000);
    let run = state.runs.get(&run_id).unwrap();
    assert!(run.input.is_empty());
    assert!(run.output.is_none());
    assert_eq!(run.status, RunStatus::Completed, "keys and status retained");
    assert!(state.step(&run_id, &step_id).unwrap().output.is_none());
}

#[test]
fn expire_skips_live_runs() {
    let mut state = StoreState::default();
    let run = Run::builder()
        .status(RunStatus::Running)
        .input(vec![serde_json::json!(1)])
        .expired_at_ms(100u64)
        .build();
    let run_id = run.run_id;
    state.runs.insert(run_id, run);
    state.expire_before(u64::MAX);
    assert!(!state.runs.get(&run_id).unwrap().input.is_empty());
}
