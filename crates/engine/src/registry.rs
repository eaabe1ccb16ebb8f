// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow and step function registries.
//!
//! Functions are keyed by their stable textual names
//! (`workflow//<file>//<function>`, `step//<file>//<function>`). A step
//! registration carries its retry policy; the executor resolves
//! `max_retries` from here.

use crate::ctx::WorkflowCtx;
use crate::error::{FlowError, StepError};
use crate::executor::StepCtx;
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use wl_core::StepInput;

/// Default retry budget: 3 retries, 4 total attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

type BoxFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A registered workflow body. Replayed, never resumed: every tick runs it
/// from the top against the event log, so it must be deterministic given
/// that log.
pub type FlowFn = Arc<dyn Fn(WorkflowCtx) -> BoxFut<Result<Value, FlowError>> + Send + Sync>;

/// A registered step body.
pub type StepFn =
    Arc<dyn Fn(StepCtx, StepInput) -> BoxFut<Result<Value, StepError>> + Send + Sync>;

#[derive(Clone)]
pub struct StepDef {
    pub func: StepFn,
    pub max_retries: u32,
}

#[derive(Default)]
pub struct RegistryBuilder {
    workflows: HashMap<SmolStr, FlowFn>,
    steps: HashMap<SmolStr, StepDef>,
}

impl RegistryBuilder {
    pub fn workflow<F, Fut>(mut self, name: impl Into<SmolStr>, func: F) -> Self
    where
        F: Fn(WorkflowCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FlowError>> + Send + 'static,
    {
        let func: FlowFn = Arc::new(move |ctx| Box::pin(func(ctx)));
        self.workflows.insert(name.into(), func);
        self
    }

    pub fn step<F, Fut>(self, name: impl Into<SmolStr>, func: F) -> Self
    where
        F: Fn(StepCtx, StepInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        self.step_with_retries(name, DEFAULT_MAX_RETRIES, func)
    }

    pub fn step_with_retries<F, Fut>(
        mut self,
        name: impl Into<SmolStr>,
        max_retries: u32,
        func: F,
    ) -> Self
    where
        F: Fn(StepCtx, StepInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        let func: StepFn = Arc::new(move |ctx, input| Box::pin(func(ctx, input)));
        self.steps.insert(name.into(), StepDef { func, max_retries });
        self
    }

    pub fn build(self) -> Registry {
        Registry { workflows: self.workflows, steps: self.steps }
    }
}

/// Immutable lookup table handed to the orchestrator and step executor.
pub struct Registry {
    workflows: HashMap<SmolStr, FlowFn>,
    steps: HashMap<SmolStr, StepDef>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn workflow(&self, name: &str) -> Option<&FlowFn> {
        self.workflows.get(name)
    }

    pub fn step(&self, name: &str) -> Option<&StepDef> {
        self.steps.get(name)
    }

    pub fn workflow_names(&self) -> impl Iterator<Item = &SmolStr> {
        self.workflows.keys()
    }
}
