// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::StepError;
use crate::registry::Registry;
use crate::test_helpers::harness;
use serde_json::{json, Value};
use wl_core::{Clock, RunStatus, StepStatus};

fn add_ten_registry() -> Registry {
    Registry::builder()
        .workflow("workflow//app//add_ten", |ctx: crate::WorkflowCtx| async move {
            let a = ctx.input().first().cloned().unwrap_or(Value::Null);
            let sum = ctx.step("step//app//add", vec![a, json!(10)])?;
            Ok(sum)
        })
        .step("step//app//add", |_ctx, input| async move {
            let a = input.args[0].as_i64().unwrap_or(0);
            let b = input.args[1].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        })
        .build()
}

#[tokio::test]
async fn single_step_workflow_runs_to_completion() {
    let h = harness(add_ten_registry());
    let run_id = h.runtime.start_run("workflow//app//add_ten", vec![json!(5)]).await.unwrap();
    h.runtime.drain().await.unwrap();

    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output, Some(json!(15)));
    assert!(run.started_at_ms.is_some());

    let step = h.step(&run_id, "step//app//add#0").await;
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.output, Some(json!(15)));
    assert_eq!(step.attempt, 1);

    use wl_core::EventType::*;
    assert_eq!(
        h.event_types(&run_id).await,
        vec![RunCreated, RunStarted, StepCreated, StepStarted, StepCompleted, RunCompleted]
    );
}

#[tokio::test]
async fn redelivered_ticks_are_idempotent() {
    let h = harness(add_ten_registry());
    let run_id = h.runtime.start_run("workflow//app//add_ten", vec![json!(5)]).await.unwrap();

    // Several duplicate tick messages for the same run.
    for _ in 0..3 {
        h.world
            .queue(
                &wl_core::workflow_topic("workflow//app//add_ten"),
                json!(wl_core::FlowMessage {
                    run_id,
                    trace: Default::default(),
                    requested_at_ms: h.clock.epoch_ms(),
                }),
                None,
            )
            .await
            .unwrap();
    }
    h.runtime.drain().await.unwrap();

    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output, Some(json!(15)));

    // Exactly one step execution despite the duplicate deliveries.
    let step = h.step(&run_id, "step//app//add#0").await;
    assert_eq!(step.attempt, 1);
    let steps: Vec<_> = h
        .event_types(&run_id)
        .await
        .into_iter()
        .filter(|t| *t == wl_core::EventType::StepCreated)
        .collect();
    assert_eq!(steps.len(), 1);
}

#[tokio::test]
async fn unregistered_workflow_fails_the_run() {
    let h = harness(Registry::builder().build());
    let run_id = h.runtime.start_run("workflow//app//ghost", vec![]).await.unwrap();
    h.runtime.drain().await.unwrap();

    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Failed);
    let error = run.error.unwrap();
    assert!(error.message.contains("not registered"));
    assert_eq!(error.code.as_deref(), Some("unregistered"));
}

#[tokio::test]
async fn tick_for_cancelled_run_exits_quietly() {
    let h = harness(add_ten_registry());
    let run_id = h.runtime.start_run("workflow//app//add_ten", vec![json!(5)]).await.unwrap();
    h.runtime.cancel_run(&run_id).await.unwrap();
    h.runtime.drain().await.unwrap();

    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Cancelled);
    // No step ever dispatched.
    use wl_core::EventType::*;
    assert_eq!(h.event_types(&run_id).await, vec![RunCreated, RunCancelled]);
}

#[tokio::test]
async fn parallel_step_calls_dispatch_together() {
    let registry = Registry::builder()
        .workflow("workflow//app//fan_out", |ctx: crate::WorkflowCtx| async move {
            // Both branches register before either result is demanded.
            let left = ctx.step("step//app//left", vec![]);
            let right = ctx.step("step//app//right", vec![]);
            let (left, right) = (left?, right?);
            Ok(json!([left, right]))
        })
        .step("step//app//left", |_ctx, _input| async { Ok(json!("L")) })
        .step("step//app//right", |_ctx, _input| async { Ok(json!("R")) })
        .build();

    let h = harness(registry);
    let run_id = h.runtime.start_run("workflow//app//fan_out", vec![]).await.unwrap();

    // First drain round: the tick creates *both* steps before suspending.
    h.runtime.drain().await.unwrap();
    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output, Some(json!(["L", "R"])));

    let created: Vec<_> = h
        .event_types(&run_id)
        .await
        .into_iter()
        .filter(|t| *t == wl_core::EventType::StepCreated)
        .collect();
    assert_eq!(created.len(), 2);
}

#[tokio::test]
async fn sleep_suspends_until_wake_instant() {
    let registry = Registry::builder()
        .workflow("workflow//app//nap", |ctx: crate::WorkflowCtx| async move {
            ctx.sleep(std::time::Duration::from_secs(30))?;
            Ok(json!("rested"))
        })
        .build();

    let h = harness(registry);
    let run_id = h.runtime.start_run("workflow//app//nap", vec![]).await.unwrap();
    h.runtime.drain().await.unwrap();

    // Suspended on the wait; nothing visible until the clock reaches it.
    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Running);

    h.clock.advance(std::time::Duration::from_secs(30));
    h.runtime.drain().await.unwrap();

    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output, Some(json!("rested")));

    use wl_core::EventType::*;
    assert_eq!(
        h.event_types(&run_id).await,
        vec![RunCreated, RunStarted, WaitCreated, WaitCompleted, RunCompleted]
    );
}

#[tokio::test]
async fn tick_for_unknown_run_is_dropped() {
    let h = harness(add_ten_registry());
    h.world
        .queue(
            &wl_core::workflow_topic("workflow//app//add_ten"),
            json!({"run_id": "run-missing", "requested_at_ms": 0}),
            None,
        )
        .await
        .unwrap();
    // Handled without error and without poisoning the queue.
    assert_eq!(h.runtime.drain().await.unwrap(), 1);
    assert!(wl_world::QueueConsumer::is_idle(h.world.as_ref()).await.unwrap());
}

#[tokio::test]
async fn workflow_observes_fatal_step_failure() {
    let registry = Registry::builder()
        .workflow("workflow//app//fragile", |ctx: crate::WorkflowCtx| async move {
            match ctx.step("step//app//explode", vec![]) {
                Ok(v) => Ok(v),
                Err(crate::FlowError::Fail(error)) => {
                    // The recorded error is thrown into user code; wrap it.
                    Err(crate::FlowError::Fail(
                        wl_core::ErrorValue::new(format!("step said: {}", error.message)),
                    ))
                }
                Err(suspend) => Err(suspend),
            }
        })
        .step("step//app//explode", |_ctx, _input| async {
            Err::<Value, _>(StepError::fatal("kaboom"))
        })
        .build();

    let h = harness(registry);
    let run_id = h.runtime.start_run("workflow//app//fragile", vec![]).await.unwrap();
    h.runtime.drain().await.unwrap();

    let run = h.run(&run_id).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.unwrap().message, "step said: kaboom");
}
