// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime facade: a `World`, the registries, and the dispatcher wired
//! together. The embedding server constructs one `Runtime` per deployment
//! and drives it either with [`Runtime::run`] (long-lived pump) or
//! [`Runtime::drain`] (deterministic, single-process).

use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::executor::StepExecutor;
use crate::hooks::{self, WELL_KNOWN_BASE};
use crate::manifest::Manifest;
use crate::orchestrate::{enqueue_flow, Orchestrator};
use crate::registry::Registry;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wl_core::{Clock, EventBody, Run, RunId, StoreError, TraceContext};
use wl_world::{QueueConsumer, ResolveData, Retrying, World};

pub struct Runtime<C: Clock> {
    world: Arc<dyn World>,
    clock: C,
    dispatcher: Dispatcher<C>,
}

impl<C: Clock> Runtime<C> {
    /// Wire a runtime over a backend that serves both storage and queue
    /// (the usual case; the reference in-memory world does). The storage
    /// side is decorated with the idempotency-aware retry classifier.
    pub fn new<W>(backend: Arc<W>, registry: Registry, clock: C) -> Self
    where
        W: World + QueueConsumer,
    {
        Self::with_manifest(backend, registry, clock, None)
    }

    pub fn with_manifest<W>(
        backend: Arc<W>,
        registry: Registry,
        clock: C,
        manifest: Option<Manifest>,
    ) -> Self
    where
        W: World + QueueConsumer,
    {
        let queue: Arc<dyn QueueConsumer> = backend.clone();
        let world: Arc<dyn World> = Arc::new(Retrying::new(backend));
        let registry = Arc::new(registry);
        let manifest = manifest.map(Arc::new);

        let orchestrator =
            Arc::new(Orchestrator::new(world.clone(), registry.clone(), manifest));
        let executor = Arc::new(StepExecutor::new(
            world.clone(),
            registry.clone(),
            WELL_KNOWN_BASE.to_string(),
        ));
        let dispatcher = Dispatcher::new(queue, clock.clone(), orchestrator, executor);

        Self { world, clock, dispatcher }
    }

    /// The decorated storage facade.
    pub fn world(&self) -> &Arc<dyn World> {
        &self.world
    }

    /// Submit a new run and enqueue its first orchestrator tick.
    pub async fn start_run(
        &self,
        workflow_name: &str,
        input: Vec<Value>,
    ) -> Result<RunId, EngineError> {
        self.start_run_with(workflow_name, input, IndexMap::new()).await
    }

    pub async fn start_run_with(
        &self,
        workflow_name: &str,
        input: Vec<Value>,
        execution_context: IndexMap<String, Value>,
    ) -> Result<RunId, EngineError> {
        let result = self
            .world
            .create_event(
                RunId::empty(),
                EventBody::RunCreated {
                    workflow_name: workflow_name.into(),
                    spec_version: None,
                    input,
                    execution_context,
                    deployment_id: None,
                },
            )
            .await?;
        let run_id = result.event.run_id;
        enqueue_flow(
            &self.world,
            run_id,
            workflow_name,
            &TraceContext::new(),
            self.clock.epoch_ms(),
        )
        .await?;
        tracing::info!(run_id = %run_id, workflow = workflow_name, "run submitted");
        Ok(run_id)
    }

    /// Cancel a run. The next orchestrator tick observes the terminal
    /// status and exits; the store has already dropped the run's hooks.
    pub async fn cancel_run(&self, run_id: &RunId) -> Result<(), EngineError> {
        self.world.cancel_run(run_id).await?;
        Ok(())
    }

    pub async fn get_run(&self, run_id: &RunId) -> Result<Run, StoreError> {
        self.world.get_run(run_id, ResolveData::All).await
    }

    /// Webhook entry point: resolve the token, log the receipt, wake the
    /// run. Returns the payload the run resumes with (the response body).
    pub async fn deliver_webhook(
        &self,
        token: &str,
        body: Value,
        headers: TraceContext,
    ) -> Result<Value, EngineError> {
        hooks::deliver_webhook(&self.world, token, body, headers, self.clock.epoch_ms()).await
    }

    /// Process ready deliveries until the queue is quiet. Returns how many
    /// deliveries were handled.
    pub async fn drain(&self) -> Result<usize, EngineError> {
        let mut total = 0usize;
        loop {
            let processed = self.dispatcher.drain().await?;
            total += processed;
            if processed == 0 {
                return Ok(total);
            }
        }
    }

    /// Long-running delivery pump; exits on cancellation.
    pub async fn run(&self, shutdown: CancellationToken) {
        self.dispatcher.run(shutdown).await;
    }
}
