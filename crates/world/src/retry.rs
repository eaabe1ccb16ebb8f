// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency-aware retry decorator over [`World`].
//!
//! Reads are side-effect free and retried on transient failures; writes,
//! queue pushes, and stream mutations are never retried because a lost
//! response does not prove a lost effect.

use crate::world::{EventResult, ListEvents, ListRuns, ListSteps, Page, ResolveData, World};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wl_core::{Event, EventBody, Hook, HookId, Run, RunId, Step, StepId, StoreError};

/// Exponential backoff parameters for idempotent reads.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the delay before retry number `attempt` (0-based).
    pub fn cap_for(&self, attempt: u32) -> Duration {
        let factor = self.factor.saturating_pow(attempt);
        self.min_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Randomized delay in `[cap/2, cap]`, never below the minimum.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap = self.cap_for(attempt);
        let half = cap / 2;
        (half + jitter(half)).max(self.min_delay)
    }
}

/// Cheap jitter in `[0, cap]` from the system clock's subsecond nanos.
fn jitter(cap: Duration) -> Duration {
    let cap_ms = cap.as_millis() as u64;
    if cap_ms == 0 {
        return Duration::ZERO;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    Duration::from_millis(nanos % (cap_ms + 1))
}

/// Decorator that retries idempotent operations per [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrying<W> {
    inner: W,
    policy: RetryPolicy,
}

impl<W> Retrying<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, policy: RetryPolicy::default() }
    }

    pub fn with_policy(inner: W, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::debug!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying idempotent call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<W: World> World for Retrying<W> {
    async fn get_deployment_id(&self) -> Result<String, StoreError> {
        self.with_retry("get_deployment_id", || self.inner.get_deployment_id()).await
    }

    async fn get_run(&self, run_id: &RunId, resolve: ResolveData) -> Result<Run, StoreError> {
        self.with_retry("runs.get", || self.inner.get_run(run_id, resolve)).await
    }

    async fn list_runs(&self, params: ListRuns) -> Result<Page<Run>, StoreError> {
        self.with_retry("runs.list", || self.inner.list_runs(params.clone())).await
    }

    async fn cancel_run(&self, run_id: &RunId) -> Result<EventResult, StoreError> {
        // Write: not retried.
        self.inner.cancel_run(run_id).await
    }

    async fn get_step(
        &self,
        run_id: &RunId,
        step_id: &StepId,
        resolve: ResolveData,
    ) -> Result<Step, StoreError> {
        self.with_retry("steps.get", || self.inner.get_step(run_id, step_id, resolve)).await
    }

    async fn list_steps(
        &self,
        run_id: &RunId,
        params: ListSteps,
    ) -> Result<Page<Step>, StoreError> {
        self.with_retry("steps.list", || self.inner.list_steps(run_id, params.clone())).await
    }

    async fn create_event(
        &self,
        run_id: RunId,
        body: EventBody,
    ) -> Result<EventResult, StoreError> {
        // Write: not retried.
        self.inner.create_event(run_id, body).await
    }

    async fn list_events(
        &self,
        run_id: &RunId,
        params: ListEvents,
    ) -> Result<Page<Event>, StoreError> {
        self.with_retry("events.list", || self.inner.list_events(run_id, params.clone())).await
    }

    async fn list_events_by_correlation_id(
        &self,
        run_id: &RunId,
        correlation_id: &str,
    ) -> Result<Vec<Event>, StoreError> {
        self.with_retry("events.list_by_correlation_id", || {
            self.inner.list_events_by_correlation_id(run_id, correlation_id)
        })
        .await
    }

    async fn get_hook(&self, hook_id: &HookId) -> Result<Hook, StoreError> {
        self.with_retry("hooks.get", || self.inner.get_hook(hook_id)).await
    }

    async fn get_hook_by_token(&self, token: &str) -> Result<Hook, StoreError> {
        self.with_retry("hooks.get_by_token", || self.inner.get_hook_by_token(token)).await
    }

    async fn list_hooks(&self, run_id: &RunId) -> Result<Vec<Hook>, StoreError> {
        self.with_retry("hooks.list", || self.inner.list_hooks(run_id)).await
    }

    async fn dispose_hook(
        &self,
        run_id: &RunId,
        hook_id: &HookId,
    ) -> Result<EventResult, StoreError> {
        // Write: not retried.
        self.inner.dispose_hook(run_id, hook_id).await
    }

    async fn queue(
        &self,
        topic: &str,
        payload: Value,
        delay: Option<Duration>,
    ) -> Result<(), StoreError> {
        // Enqueue is not idempotent: a duplicate push is a duplicate delivery.
        self.inner.queue(topic, payload, delay).await
    }

    async fn write_to_stream(
        &self,
        run_id: &RunId,
        stream_id: &str,
        chunk: Value,
    ) -> Result<(), StoreError> {
        self.inner.write_to_stream(run_id, stream_id, chunk).await
    }

    async fn read_from_stream(
        &self,
        run_id: &RunId,
        stream_id: &str,
    ) -> Result<Vec<Value>, StoreError> {
        self.with_retry("read_from_stream", || self.inner.read_from_stream(run_id, stream_id))
            .await
    }

    async fn close_stream(&self, run_id: &RunId, stream_id: &str) -> Result<(), StoreError> {
        self.inner.close_stream(run_id, stream_id).await
    }

    async fn list_streams_by_run_id(&self, run_id: &RunId) -> Result<Vec<String>, StoreError> {
        self.with_retry("list_streams_by_run_id", || self.inner.list_streams_by_run_id(run_id))
            .await
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
