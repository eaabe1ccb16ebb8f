// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run orchestration.
//!
//! One tick per `workflow.<workflow_name>` delivery. A tick is idempotent
//! and safe to repeat: it replays the workflow function against the run's
//! event log, persists whatever new commands the replay buffered, and
//! either suspends (pending events emitted, no terminal event, return) or
//! settles the run (`run_completed` / `run_failed`). Re-entry is driven by
//! `events.create` of an awaited event re-enqueueing this topic; the queue
//! keeps at most one tick in flight per run.

use crate::ctx::{Command, WorkflowCtx};
use crate::error::{EngineError, FlowError};
use crate::manifest::Manifest;
use crate::registry::Registry;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wl_core::{
    workflow_topic, step_topic, ErrorValue, Event, EventBody, EventType, FlowMessage,
    HandlerOutcome, Run, RunId, RunStatus, StepMessage, StoreError, TraceContext,
};
use wl_world::{ListEvents, ResolveData, World};

/// Enqueue an orchestrator tick for a run.
pub(crate) async fn enqueue_flow(
    world: &Arc<dyn World>,
    run_id: RunId,
    workflow_name: &str,
    trace: &TraceContext,
    now_ms: u64,
) -> Result<(), EngineError> {
    let msg = FlowMessage { run_id, trace: trace.clone(), requested_at_ms: now_ms };
    world
        .queue(&workflow_topic(workflow_name), json!(msg), None)
        .await
        .map_err(EngineError::from)
}

/// Handler for `workflow.<workflow_name>` deliveries.
pub struct Orchestrator {
    world: Arc<dyn World>,
    registry: Arc<Registry>,
    manifest: Option<Arc<Manifest>>,
}

impl Orchestrator {
    pub fn new(
        world: Arc<dyn World>,
        registry: Arc<Registry>,
        manifest: Option<Arc<Manifest>>,
    ) -> Self {
        Self { world, registry, manifest }
    }

    pub async fn tick(
        &self,
        msg: &FlowMessage,
        now_ms: u64,
    ) -> Result<HandlerOutcome, EngineError> {
        let run = match self.world.get_run(&msg.run_id, ResolveData::All).await {
            Ok(run) => run,
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(run_id = %msg.run_id, "tick for unknown run");
                return Ok(HandlerOutcome::Ack);
            }
            Err(err) => return Err(err.into()),
        };
        if run.is_terminal() {
            return Ok(HandlerOutcome::Ack);
        }

        if run.status == RunStatus::Pending {
            match self.world.create_event(run.run_id, EventBody::RunStarted).await {
                Ok(_) => {}
                Err(err) if gone(&err) => return Ok(HandlerOutcome::Ack),
                Err(err) => return Err(err.into()),
            }
        }

        let Some(flow) = self.registry.workflow(run.workflow_name.as_str()) else {
            let error =
                ErrorValue::new(format!("workflow {} is not registered", run.workflow_name))
                    .with_code("unregistered");
            self.settle(run.run_id, EventBody::RunFailed { error }).await?;
            return Ok(HandlerOutcome::Ack);
        };
        let flow = flow.clone();

        let events = self.load_events(&run.run_id).await?;
        let ctx = WorkflowCtx::new(run.clone(), &events, now_ms, self.manifest.clone());
        let outcome = (*flow)(ctx.clone()).await;
        let commands = ctx.take_commands();
        let conflicted = self.flush(&run, commands, &msg.trace, now_ms).await?;

        match outcome {
            Ok(output) => {
                tracing::info!(run_id = %run.run_id, "run completed");
                self.settle(run.run_id, EventBody::RunCompleted { output: Some(output) })
                    .await?;
            }
            Err(FlowError::Fail(error)) => {
                tracing::info!(run_id = %run.run_id, error = %error, "run failed");
                self.settle(run.run_id, EventBody::RunFailed { error }).await?;
            }
            Err(FlowError::Suspend) => {
                tracing::debug!(run_id = %run.run_id, "run suspended");
                if conflicted {
                    // A hook creation collided during the flush; re-tick so
                    // the conflict surfaces into the waiting replay.
                    enqueue_flow(&self.world, run.run_id, &run.workflow_name, &msg.trace, now_ms)
                        .await?;
                }
            }
        }
        Ok(HandlerOutcome::Ack)
    }

    /// Persist the replay's buffered commands. Returns true when a hook
    /// creation came back as a conflict.
    async fn flush(
        &self,
        run: &Run,
        commands: Vec<Command>,
        trace: &TraceContext,
        now_ms: u64,
    ) -> Result<bool, EngineError> {
        let mut conflicted = false;
        for command in commands {
            match command {
                Command::CreateStep { step_id, step_name, input } => {
                    let created = self
                        .world
                        .create_event(
                            run.run_id,
                            EventBody::StepCreated {
                                step_id: step_id.clone(),
                                step_name: step_name.clone(),
                                input,
                            },
                        )
                        .await;
                    match created {
                        Ok(_) => {}
                        Err(err) if gone(&err) => return Ok(conflicted),
                        Err(err) => return Err(err.into()),
                    }
                    let msg = StepMessage {
                        run_id: run.run_id,
                        step_id,
                        workflow_name: run.workflow_name.clone(),
                        trace: trace.clone(),
                        requested_at_ms: now_ms,
                    };
                    self.world.queue(&step_topic(&step_name), json!(msg), None).await?;
                }

                Command::CreateHook { hook_id, token, metadata } => {
                    let created = self
                        .world
                        .create_event(
                            run.run_id,
                            EventBody::HookCreated { hook_id, token, metadata },
                        )
                        .await;
                    match created {
                        Ok(result) => {
                            if result.event.event_type() == EventType::HookConflict {
                                conflicted = true;
                            }
                        }
                        Err(err) if gone(&err) => return Ok(conflicted),
                        Err(err) => return Err(err.into()),
                    }
                }

                Command::CreateWait { wait_id, wake_at_ms } => {
                    let created = self
                        .world
                        .create_event(
                            run.run_id,
                            EventBody::WaitCreated { wait_id, wake_at_ms },
                        )
                        .await;
                    match created {
                        Ok(_) => {}
                        Err(err) if gone(&err) => return Ok(conflicted),
                        Err(err) => return Err(err.into()),
                    }
                    // Delayed self-wake at the wait's wake instant.
                    let delay = Duration::from_millis(wake_at_ms.saturating_sub(now_ms));
                    let msg = FlowMessage {
                        run_id: run.run_id,
                        trace: trace.clone(),
                        requested_at_ms: now_ms,
                    };
                    self.world
                        .queue(&workflow_topic(&run.workflow_name), json!(msg), Some(delay))
                        .await?;
                }

                Command::CompleteWait { wait_id } => {
                    match self
                        .world
                        .create_event(run.run_id, EventBody::WaitCompleted { wait_id })
                        .await
                    {
                        Ok(_) => {}
                        Err(err) if gone(&err) => return Ok(conflicted),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
        Ok(conflicted)
    }

    /// Write a terminal run event, treating 410 as "already settled".
    async fn settle(&self, run_id: RunId, body: EventBody) -> Result<(), EngineError> {
        match self.world.create_event(run_id, body).await {
            Ok(_) => Ok(()),
            Err(err) if gone(&err) => {
                tracing::debug!(run_id = %run_id, "run settled elsewhere");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read the run's full event log, following pagination cursors.
    async fn load_events(&self, run_id: &RunId) -> Result<Vec<Event>, EngineError> {
        let mut events = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .world
                .list_events(
                    run_id,
                    ListEvents { cursor, limit: Some(500), resolve_data: ResolveData::All },
                )
                .await?;
            events.extend(page.items);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(events),
            }
        }
    }
}

fn gone(err: &StoreError) -> bool {
    err.status() == Some(410)
}

#[cfg(test)]
#[path = "orchestrate_tests.rs"]
mod tests;
