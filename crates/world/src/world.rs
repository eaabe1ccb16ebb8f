// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `World` facade: every storage, queue, and stream operation the
//! runtime performs, behind one polymorphic interface.
//!
//! All entity mutations go through [`World::create_event`], the single write
//! path. Reads are side-effect free and safe to retry; the decorator in
//! [`crate::retry`] relies on exactly that split.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wl_core::{Event, EventBody, Hook, HookId, Run, RunId, RunStatus, Step, StepId, StoreError};

/// How much payload data reads should resolve.
///
/// `None` elides input/output/metadata/event data so list endpoints can
/// paginate cheaply; `All` returns everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveData {
    #[default]
    All,
    None,
}

/// One page of a cursor-paginated listing. The cursor is the last item's
/// sort key; passing it back resumes immediately after that item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self { items: Vec::new(), cursor: None }
    }
}

/// Parameters for `runs.list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRuns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub resolve_data: ResolveData,
}

/// Parameters for `steps.list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSteps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub resolve_data: ResolveData,
}

/// Parameters for `events.list`. The cursor is an event id; events are
/// strictly ordered by it within a run, so cursors are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListEvents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub resolve_data: ResolveData,
}

/// Result of the single write path: the created event plus every entity the
/// derivation touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResult {
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<Run>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<Hook>,
}

/// The abstract backend. Implementations must make each event insert and
/// its derived entity update atomic relative to other readers; where a
/// backend cannot, terminal-state transitions must at minimum be serialized.
#[async_trait]
pub trait World: Send + Sync + 'static {
    async fn get_deployment_id(&self) -> Result<String, StoreError>;

    // -- runs --
    async fn get_run(&self, run_id: &RunId, resolve: ResolveData) -> Result<Run, StoreError>;
    async fn list_runs(&self, params: ListRuns) -> Result<Page<Run>, StoreError>;
    /// Convenience wrapper over `create_event(run_cancelled)`.
    async fn cancel_run(&self, run_id: &RunId) -> Result<EventResult, StoreError>;

    // -- steps --
    async fn get_step(
        &self,
        run_id: &RunId,
        step_id: &StepId,
        resolve: ResolveData,
    ) -> Result<Step, StoreError>;
    async fn list_steps(&self, run_id: &RunId, params: ListSteps) -> Result<Page<Step>, StoreError>;

    // -- events --
    /// The single write path: validate, derive entity mutations, append.
    /// An empty `run_id` with a `run_created` body synthesizes a new run id.
    async fn create_event(&self, run_id: RunId, body: EventBody)
        -> Result<EventResult, StoreError>;
    async fn list_events(
        &self,
        run_id: &RunId,
        params: ListEvents,
    ) -> Result<Page<Event>, StoreError>;
    async fn list_events_by_correlation_id(
        &self,
        run_id: &RunId,
        correlation_id: &str,
    ) -> Result<Vec<Event>, StoreError>;

    // -- hooks --
    async fn get_hook(&self, hook_id: &HookId) -> Result<Hook, StoreError>;
    async fn get_hook_by_token(&self, token: &str) -> Result<Hook, StoreError>;
    async fn list_hooks(&self, run_id: &RunId) -> Result<Vec<Hook>, StoreError>;
    /// Convenience wrapper over `create_event(hook_disposed)`.
    async fn dispose_hook(
        &self,
        run_id: &RunId,
        hook_id: &HookId,
    ) -> Result<EventResult, StoreError>;

    // -- queue --
    /// Enqueue `payload` on `topic`, optionally delaying first visibility.
    async fn queue(
        &self,
        topic: &str,
        payload: Value,
        delay: Option<Duration>,
    ) -> Result<(), StoreError>;

    // -- streams --
    async fn write_to_stream(
        &self,
        run_id: &RunId,
        stream_id: &str,
        chunk: Value,
    ) -> Result<(), StoreError>;
    async fn read_from_stream(
        &self,
        run_id: &RunId,
        stream_id: &str,
    ) -> Result<Vec<Value>, StoreError>;
    async fn close_stream(&self, run_id: &RunId, stream_id: &str) -> Result<(), StoreError>;
    async fn list_streams_by_run_id(&self, run_id: &RunId) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<W: World + ?Sized> World for Arc<W> {
    async fn get_deployment_id(&self) -> Result<String, StoreError> {
        (**self).get_deployment_id().await
    }

    async fn get_run(&self, run_id: &RunId, resolve: ResolveData) -> Result<Run, StoreError> {
        (**self).get_run(run_id, resolve).await
    }

    async fn list_runs(&self, params: ListRuns) -> Result<Page<Run>, StoreError> {
        (**self).list_runs(params).await
    }

    async fn cancel_run(&self, run_id: &RunId) -> Result<EventResult, StoreError> {
        (**self).cancel_run(run_id).await
    }

    async fn get_step(
        &self,
        run_id: &RunId,
        step_id: &StepId,
        resolve: ResolveData,
    ) -> Result<Step, StoreError> {
        (**self).get_step(run_id, step_id, resolve).await
    }

    async fn list_steps(
        &self,
        run_id: &RunId,
        params: ListSteps,
    ) -> Result<Page<Step>, StoreError> {
        (**self).list_steps(run_id, params).await
    }

    async fn create_event(
        &self,
        run_id: RunId,
        body: EventBody,
    ) -> Result<EventResult, StoreError> {
        (**self).create_event(run_id, body).await
    }

    async fn list_events(
        &self,
        run_id: &RunId,
        params: ListEvents,
    ) -> Result<Page<Event>, StoreError> {
        (**self).list_events(run_id, params).await
    }

    async fn list_events_by_correlation_id(
        &self,
        run_id: &RunId,
        correlation_id: &str,
    ) -> Result<Vec<Event>, StoreError> {
        (**self).list_events_by_correlation_id(run_id, correlation_id).await
    }

    async fn get_hook(&self, hook_id: &HookId) -> Result<Hook, StoreError> {
        (**self).get_hook(hook_id).await
    }

    async fn get_hook_by_token(&self, token: &str) -> Result<Hook, StoreError> {
        (**self).get_hook_by_token(token).await
    }

    async fn list_hooks(&self, run_id: &RunId) -> Result<Vec<Hook>, StoreError> {
        (**self).list_hooks(run_id).await
    }

    async fn dispose_hook(
        &self,
        run_id: &RunId,
        hook_id: &HookId,
    ) -> Result<EventResult, StoreError> {
        (**self).dispose_hook(run_id, hook_id).await
    }

    async fn queue(
        &self,
        topic: &str,
        payload: Value,
        delay: Option<Duration>,
    ) -> Result<(), StoreError> {
        (**self).queue(topic, payload, delay).await
    }

    async fn write_to_stream(
        &self,
        run_id: &RunId,
        stream_id: &str,
        chunk: Value,
    ) -> Result<(), StoreError> {
        (**self).write_to_stream(run_id, stream_id, chunk).await
    }

    async fn read_from_stream(
        &self,
        run_id: &RunId,
        stream_id: &str,
    ) -> Result<Vec<Value>, StoreError> {
        (**self).read_from_stream(run_id, stream_id).await
    }

    async fn close_stream(&self, run_id: &RunId, stream_id: &str) -> Result<(), StoreError> {
        (**self).close_stream(run_id, stream_id).await
    }

    async fn list_streams_by_run_id(&self, run_id: &RunId) -> Result<Vec<String>, StoreError> {
        (**self).list_streams_by_run_id(run_id).await
    }
}
