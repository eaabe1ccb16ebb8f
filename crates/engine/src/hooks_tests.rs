// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::Registry;
use crate::test_helpers::harness;
use serde_json::json;
use wl_core::{RunStatus, StoreError};
use yare::parameterized;

#[parameterized(
    plain = { "tok123", "/.well-known/workflow/v1/webhook/tok123" },
    spaces = { "a b", "/.well-known/workflow/v1/webhook/a%20b" },
    slash = { "a/b", "/.well-known/workflow/v1/webhook/a%2Fb" },
    unreserved = { "A-z_0.9~", "/.well-known/workflow/v1/webhook/A-z_0.9~" },
    unicode = { "é", "/.well-known/workflow/v1/webhook/%C3%A9" },
)]
fn webhook_paths_are_url_encoded(token: &str, expected: &str) {
    assert_eq!(webhook_path(token), expected);
}

#[test]
fn tokens_are_opaque_and_unique() {
    let a = new_token();
    let b = new_token();
    assert_ne!(a, b);
    assert!(a.len() >= 20);
}

fn hook_registry() -> Registry {
    Registry::builder()
        .workflow("workflow//app//approval", |ctx: crate::WorkflowCtx| async move {
            let hook = ctx.create_hook_with(Some("tok-approval".into()), None);
            let payload = hook.received()?;
            Ok(json!({ "approved_by": payload["body"]["user"] }))
        })
        .build()
}

#[tokio::test]
async fn webhook_resumes_a_suspended_run() {
    let h = harness(hook_registry());
    let run_id = h.runtime.start_run("workflow//app//approval", vec![]).await.unwrap();
    h.runtime.drain().await.unwrap();

    // Suspended on the hook; the hook row is live.
    assert_eq!(h.run(&run_id).await.status, RunStatus::Running);
    let hooks = h.world.list_hooks(&run_id).await.unwrap();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].token, "tok-approval");

    // External POST to the webhook.
    let response = h
        .runtime
        .deliver_webhook("tok-approval", json!({"user": "ada"}), Default::default())
        .await
        .unwrap();
    assert_eq!(response["body"]["user"], "ada");

    h.runtime.drain().await.unwrap();
    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output, Some(json!({"approved_by": "ada"})));

    // Hook garbage-collected with the terminal event.
    assert!(h.world.list_hooks(&run_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let h = harness(hook_registry());
    let err = h
        .runtime
        .deliver_webhook("tok-ghost", json!({}), Default::default())
        .await
        .unwrap_err();
    match err {
        crate::EngineError::Store(StoreError::NotFound { .. }) => {}
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn webhook_after_run_completion_is_not_found() {
    let h = harness(hook_registry());
    let run_id = h.runtime.start_run("workflow//app//approval", vec![]).await.unwrap();
    h.runtime.drain().await.unwrap();
    h.runtime.deliver_webhook("tok-approval", json!({"user": "ada"}), Default::default())
        .await
        .unwrap();
    h.runtime.drain().await.unwrap();
    assert_eq!(h.run(&run_id).await.status, RunStatus::Completed);

    // Token died with the run.
    let err = h
        .runtime
        .deliver_webhook("tok-approval", json!({"user": "bob"}), Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, crate::EngineError::Store(StoreError::NotFound { .. })));
}
