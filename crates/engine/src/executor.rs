// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step execution pipeline.
//!
//! One invocation per `step.<step_name>` delivery. The state machine:
//! pending → running (`step_started`), then running → completed on success,
//! → failed on fatal or exhausted retries, → pending (`step_retrying`) on a
//! retryable error with a deferral. Completed and failed are terminal.
//!
//! Exactly-once step effects are best-effort: a crash between the user body
//! and the `step_completed` write re-executes the body on redelivery. Step
//! authors design idempotently.

use crate::error::{EngineError, StepError};
use crate::orchestrate::enqueue_flow;
use crate::registry::Registry;
use crate::serialize::{self, Background, StreamHandle};
use std::sync::Arc;
use std::time::Duration;
use wl_core::{ErrorValue, EventBody, HandlerOutcome, RunId, StepId, StepMessage, StoreError};
use wl_world::{ResolveData, World};

/// Deferral applied when a retryable error names no wake-up instant.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Per-invocation context handed to the user step function.
#[derive(Clone)]
pub struct StepCtx {
    pub run_id: RunId,
    pub step_id: StepId,
    /// Attempt number of this invocation, 1-based.
    pub attempt: u32,
    pub started_at_ms: Option<u64>,
    /// Base URL of the workflow surface this deployment serves.
    pub workflow_url: String,
    world: Arc<dyn World>,
    background: Background,
    streams: Vec<StreamHandle>,
}

impl StepCtx {
    /// Hydrated stream handles referenced by this step's input.
    pub fn streams(&self) -> &[StreamHandle] {
        &self.streams
    }

    /// Open a stream of this run by id.
    pub fn stream(&self, stream_id: &str) -> StreamHandle {
        StreamHandle::new(self.world.clone(), self.run_id, stream_id)
    }

    /// Queue a fire-and-forget stream write; awaited best-effort after the
    /// step body returns.
    pub fn write_stream_background(&self, stream_id: &str, chunk: serde_json::Value) {
        let handle = self.stream(stream_id);
        self.background.spawn(async move { handle.write(chunk).await });
    }
}

/// Handler for `step.<step_name>` deliveries.
pub struct StepExecutor {
    world: Arc<dyn World>,
    registry: Arc<Registry>,
    workflow_url: String,
}

impl StepExecutor {
    pub fn new(world: Arc<dyn World>, registry: Arc<Registry>, workflow_url: String) -> Self {
        Self { world, registry, workflow_url }
    }

    pub async fn handle(
        &self,
        msg: &StepMessage,
        now_ms: u64,
    ) -> Result<HandlerOutcome, EngineError> {
        let step = match self.world.get_step(&msg.run_id, &msg.step_id, ResolveData::All).await {
            Ok(step) => step,
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(run_id = %msg.run_id, step_id = %msg.step_id, "step delivery for unknown step");
                return Ok(HandlerOutcome::Ack);
            }
            Err(err) => return Err(err.into()),
        };

        let Some(def) = self.registry.step(step.step_name.as_str()) else {
            let error = ErrorValue::new(format!("step {} is not registered", step.step_name))
                .with_code("unregistered");
            return self.fail_fatal(msg, error, now_ms).await;
        };
        let max_retries = def.max_retries;

        // Idempotent re-entry pre-checks.
        if step.attempt + 1 > max_retries + 1 {
            let error = ErrorValue::new("exceeded max retries").with_code("max_retries");
            return self.fail_fatal(msg, error, now_ms).await;
        }
        if step.is_terminal() {
            // Erroneous re-delivery of a settled step: the continuation may
            // have been lost, so wake the orchestrator and drop the message.
            enqueue_flow(&self.world, msg.run_id, &msg.workflow_name, &msg.trace, now_ms)
                .await?;
            return Ok(HandlerOutcome::Ack);
        }
        if let Some(retry_after) = step.retry_after_ms {
            if retry_after > now_ms {
                let timeout_seconds = (retry_after - now_ms).div_ceil(1000).max(1);
                return Ok(HandlerOutcome::Defer { timeout_seconds });
            }
        }

        let started = match self
            .world
            .create_event(msg.run_id, EventBody::StepStarted { step_id: msg.step_id.clone() })
            .await
        {
            Ok(result) => result.step,
            Err(err) if gone(&err) => return Ok(HandlerOutcome::Ack),
            Err(err) => return Err(err.into()),
        };
        let attempt = started.as_ref().map(|s| s.attempt).unwrap_or(step.attempt + 1);
        let started_at_ms = started.as_ref().and_then(|s| s.started_at_ms);

        let hydrated = serialize::hydrate(&self.world, msg.run_id, &step.input);
        let background = Background::new();
        let ctx = StepCtx {
            run_id: msg.run_id,
            step_id: msg.step_id.clone(),
            attempt,
            started_at_ms,
            workflow_url: self.workflow_url.clone(),
            world: self.world.clone(),
            background: background.clone(),
            streams: hydrated.streams,
        };

        tracing::info!(
            run_id = %msg.run_id,
            step_id = %msg.step_id,
            step = %step.step_name,
            attempt,
            queue_ms = now_ms.saturating_sub(msg.requested_at_ms),
            "step invocation"
        );
        let result = (*def.func)(ctx, hydrated.input).await;
        background.finish().await;

        match result {
            Ok(output) => {
                let output = serialize::dehydrate(output);
                match self
                    .world
                    .create_event(
                        msg.run_id,
                        EventBody::StepCompleted {
                            step_id: msg.step_id.clone(),
                            output: Some(output),
                        },
                    )
                    .await
                {
                    Ok(_) => {}
                    Err(err) if gone(&err) => return Ok(HandlerOutcome::Ack),
                    Err(err) => return Err(err.into()),
                }
                enqueue_flow(&self.world, msg.run_id, &msg.workflow_name, &msg.trace, now_ms)
                    .await?;
                Ok(HandlerOutcome::Ack)
            }
            Err(err) => self.settle_error(msg, attempt, max_retries, err, now_ms).await,
        }
    }

    /// Classify a thrown step error into its retry path.
    async fn settle_error(
        &self,
        msg: &StepMessage,
        attempt: u32,
        max_retries: u32,
        err: StepError,
        now_ms: u64,
    ) -> Result<HandlerOutcome, EngineError> {
        match err {
            StepError::Fatal { .. } => {
                let error = err.to_error_value();
                self.write_failed(msg, error, true).await?;
                enqueue_flow(&self.world, msg.run_id, &msg.workflow_name, &msg.trace, now_ms)
                    .await?;
                Ok(HandlerOutcome::Ack)
            }

            // The run finished underneath us; nothing left to record.
            StepError::Api(ref api) if api.status() == Some(410) => {
                tracing::debug!(run_id = %msg.run_id, step_id = %msg.step_id, "run already terminal");
                Ok(HandlerOutcome::Ack)
            }

            StepError::Retryable { ref retry_after, .. } => {
                let delay = retry_after.unwrap_or(DEFAULT_RETRY_DELAY);
                let error = err.to_error_value();
                self.write_retrying(msg, Some(error), now_ms, delay).await?;
                Ok(HandlerOutcome::Defer { timeout_seconds: delay.as_secs().max(1) })
            }

            other => {
                if attempt >= max_retries + 1 {
                    let error = ErrorValue::new("exceeded max retries").with_code("max_retries");
                    self.write_failed(msg, error, true).await?;
                    enqueue_flow(&self.world, msg.run_id, &msg.workflow_name, &msg.trace, now_ms)
                        .await?;
                    return Ok(HandlerOutcome::Ack);
                }
                // Informational failure, then back to pending for a retry.
                let error = other.to_error_value();
                self.write_failed(msg, error.clone(), false).await?;
                self.write_retrying(msg, Some(error), now_ms, DEFAULT_RETRY_DELAY).await?;
                Ok(HandlerOutcome::Defer {
                    timeout_seconds: DEFAULT_RETRY_DELAY.as_secs().max(1),
                })
            }
        }
    }

    async fn fail_fatal(
        &self,
        msg: &StepMessage,
        error: ErrorValue,
        now_ms: u64,
    ) -> Result<HandlerOutcome, EngineError> {
        self.write_failed(msg, error, true).await?;
        enqueue_flow(&self.world, msg.run_id, &msg.workflow_name, &msg.trace, now_ms).await?;
        Ok(HandlerOutcome::Ack)
    }

    async fn write_failed(
        &self,
        msg: &StepMessage,
        error: ErrorValue,
        fatal: bool,
    ) -> Result<(), EngineError> {
        match self
            .world
            .create_event(
                msg.run_id,
                EventBody::StepFailed { step_id: msg.step_id.clone(), error, fatal },
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if gone(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_retrying(
        &self,
        msg: &StepMessage,
        error: Option<ErrorValue>,
        now_ms: u64,
        delay: Duration,
    ) -> Result<(), EngineError> {
        let retry_after_ms = Some(now_ms + delay.as_millis() as u64);
        match self
            .world
            .create_event(
                msg.run_id,
                EventBody::StepRetrying { step_id: msg.step_id.clone(), error, retry_after_ms },
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if gone(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn gone(err: &StoreError) -> bool {
    err.status() == Some(410)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
