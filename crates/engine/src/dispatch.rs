// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-topic queue dispatcher.
//!
//! Pulls deliveries from the queue, routes `workflow.*` to the orchestrator
//! and `step.*` to the step executor, and translates handler outcomes back
//! into queue operations (ack, or defer to extend visibility). Delivery is
//! at-least-once; handlers are idempotent by construction. A reserved
//! health-probe payload is answered with success and no side effects.

use crate::error::EngineError;
use crate::executor::StepExecutor;
use crate::orchestrate::Orchestrator;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wl_core::{is_health_probe, split_topic, Clock, HandlerOutcome, TopicKind};
use wl_world::{Delivery, QueueConsumer};

/// Deliveries that error this many times are dropped as poison.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 10;

/// Redelivery delay after a handler error.
const REDELIVERY_DELAY: Duration = Duration::from_secs(1);

/// Poll interval while the queue is empty.
const IDLE_POLL: Duration = Duration::from_millis(25);

pub struct Dispatcher<C: Clock> {
    queue: Arc<dyn QueueConsumer>,
    clock: C,
    orchestrator: Arc<Orchestrator>,
    executor: Arc<StepExecutor>,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(
        queue: Arc<dyn QueueConsumer>,
        clock: C,
        orchestrator: Arc<Orchestrator>,
        executor: Arc<StepExecutor>,
    ) -> Self {
        Self { queue, clock, orchestrator, executor }
    }

    /// Process ready deliveries until the queue has nothing visible.
    /// Deterministic given a fake clock; the embedding loop for tests and
    /// single-process servers.
    pub async fn drain(&self) -> Result<usize, EngineError> {
        let mut processed = 0usize;
        while let Some(delivery) = self.queue.pull(self.clock.epoch_ms()).await? {
            self.dispatch(delivery).await;
            processed += 1;
        }
        Ok(processed)
    }

    /// Long-running pump; exits on cancellation.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            let pulled = tokio::select! {
                _ = shutdown.cancelled() => return,
                pulled = self.queue.pull(self.clock.epoch_ms()) => pulled,
            };
            match pulled {
                Ok(Some(delivery)) => self.dispatch(delivery).await,
                Ok(None) => tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                },
                Err(err) => {
                    tracing::error!(error = %err, "queue pull failed");
                    tokio::time::sleep(REDELIVERY_DELAY).await;
                }
            }
        }
    }

    /// Route one delivery and settle it with the queue.
    pub async fn dispatch(&self, delivery: Delivery) {
        let start = self.clock.now();
        let outcome = self.route(&delivery).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(HandlerOutcome::Ack) => {
                tracing::debug!(topic = %delivery.topic, elapsed_ms, "delivery handled");
                self.settle(|| self.queue.ack(&delivery.delivery_id)).await;
            }
            Ok(HandlerOutcome::Defer { timeout_seconds }) => {
                tracing::debug!(topic = %delivery.topic, elapsed_ms, timeout_seconds, "delivery deferred");
                self.settle(|| {
                    self.queue.defer(&delivery.delivery_id, Duration::from_secs(timeout_seconds))
                })
                .await;
            }
            Err(err) => {
                tracing::error!(
                    topic = %delivery.topic,
                    attempt = delivery.attempt,
                    elapsed_ms,
                    error = %err,
                    "handler error"
                );
                if delivery.attempt >= MAX_DELIVERY_ATTEMPTS {
                    tracing::error!(topic = %delivery.topic, "dropping poison delivery");
                    self.settle(|| self.queue.ack(&delivery.delivery_id)).await;
                } else {
                    self.settle(|| self.queue.defer(&delivery.delivery_id, REDELIVERY_DELAY))
                        .await;
                }
            }
        }
    }

    async fn route(&self, delivery: &Delivery) -> Result<HandlerOutcome, EngineError> {
        // Health probes succeed without touching any handler state.
        if is_health_probe(&delivery.payload) {
            return Ok(HandlerOutcome::Ack);
        }
        let now_ms = self.clock.epoch_ms();
        match split_topic(&delivery.topic) {
            Some((TopicKind::Workflow, _)) => {
                let msg = decode(&delivery.payload)?;
                self.orchestrator.tick(&msg, now_ms).await
            }
            Some((TopicKind::Step, _)) => {
                let msg = decode(&delivery.payload)?;
                self.executor.handle(&msg, now_ms).await
            }
            None => Err(EngineError::UnknownTopic(delivery.topic.clone())),
        }
    }

    async fn settle<F, Fut>(&self, op: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(), wl_core::StoreError>>,
    {
        if let Err(err) = op().await {
            tracing::error!(error = %err, "queue settle failed");
        }
    }
}

fn decode<T: DeserializeOwned>(payload: &serde_json::Value) -> Result<T, EngineError> {
    serde_json::from_value(payload.clone()).map_err(EngineError::bad_message)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
