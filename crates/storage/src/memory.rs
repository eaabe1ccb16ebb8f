// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference backend.
//!
//! Implements the full `World` facade over [`StoreState`] behind a single
//! lock, plus an in-process delayable queue and a stream table. The event
//! append and its derived entity update happen under one lock acquisition,
//! so they are atomic relative to every reader.

use crate::state::{StoreState, StreamRecord};
use crate::store::{self, WriteCtx};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use wl_core::{
    Clock, Event, EventBody, Hook, HookId, IdGen, Run, RunId, Step, StepId, StoreError,
    SystemClock,
};
use wl_world::{
    Delivery, EventResult, ListEvents, ListRuns, ListSteps, Page, QueueConsumer, ResolveData,
    World,
};

const DEFAULT_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone)]
struct QueuedMessage {
    topic: String,
    payload: Value,
    ready_at_ms: u64,
    attempt: u32,
}

impl QueuedMessage {
    fn run_key(&self) -> Option<String> {
        self.payload.get("run_id").and_then(Value::as_str).map(str::to_owned)
    }

    fn is_flow(&self) -> bool {
        self.topic.starts_with("workflow.")
    }
}

#[derive(Default)]
struct QueueState {
    next_delivery: u64,
    messages: VecDeque<QueuedMessage>,
    in_flight: HashMap<String, QueuedMessage>,
    /// Runs with an orchestrator delivery in flight. The queue, not the
    /// handler, guarantees at-most-one tick per run.
    busy_runs: HashSet<String>,
}

/// The reference `World`: entity store, queue, and streams in one process.
pub struct MemoryWorld<C: Clock = SystemClock> {
    state: Mutex<StoreState>,
    queue: Mutex<QueueState>,
    clock: C,
    idgen: IdGen,
    deployment_id: String,
}

impl MemoryWorld<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryWorld<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryWorld<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            queue: Mutex::new(QueueState::default()),
            clock,
            idgen: IdGen::new(),
            deployment_id: format!("dpl-{}", nanoid_tail()),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Inspect entity state under the lock (tests and diagnostics).
    pub fn with_state<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.state.lock())
    }

    /// Drop payload data of terminal runs whose expiry has passed.
    pub fn expire(&self) {
        self.state.lock().expire_before(self.clock.epoch_ms());
    }

    fn write_ctx(&self) -> (u64, String) {
        (self.clock.epoch_ms(), self.deployment_id.clone())
    }
}

fn nanoid_tail() -> String {
    nanoid::nanoid!(10)
}

/// Slice `items` after `cursor` (exclusive) up to `limit`, returning the
/// page and the cursor of its last item.
fn paginate<T>(
    items: Vec<T>,
    cursor: Option<&str>,
    limit: Option<usize>,
    key: impl Fn(&T) -> String,
) -> Page<T> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
    let skipped: Vec<T> = match cursor {
        Some(cursor) => items.into_iter().filter(|item| key(item).as_str() > cursor).collect(),
        None => items,
    };
    let more = skipped.len() > limit;
    let page: Vec<T> = skipped.into_iter().take(limit).collect();
    let cursor = if more { page.last().map(&key) } else { None };
    Page { items: page, cursor }
}

#[async_trait]
impl<C: Clock> World for MemoryWorld<C> {
    async fn get_deployment_id(&self) -> Result<String, StoreError> {
        Ok(self.deployment_id.clone())
    }

    async fn get_run(&self, run_id: &RunId, resolve: ResolveData) -> Result<Run, StoreError> {
        let state = self.state.lock();
        let run = state
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("run", run_id.as_str()))?;
        Ok(match resolve {
            ResolveData::All => run,
            ResolveData::None => run.strip_data(),
        })
    }

    async fn list_runs(&self, params: ListRuns) -> Result<Page<Run>, StoreError> {
        let state = self.state.lock();
        let mut runs: Vec<Run> = state
            .runs
            .values()
            .filter(|run| params.status.map_or(true, |s| run.status == s))
            .cloned()
            .collect();
        // Sortable IDs: creation order.
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        drop(state);
        let mut page = paginate(runs, params.cursor.as_deref(), params.limit, |run: &Run| {
            run.run_id.as_str().to_string()
        });
        if params.resolve_data == ResolveData::None {
            page.items = page.items.into_iter().map(Run::strip_data).collect();
        }
        Ok(page)
    }

    async fn cancel_run(&self, run_id: &RunId) -> Result<EventResult, StoreError> {
        self.create_event(*run_id, EventBody::RunCancelled).await
    }

    async fn get_step(
        &self,
        run_id: &RunId,
        step_id: &StepId,
        resolve: ResolveData,
    ) -> Result<Step, StoreError> {
        let state = self.state.lock();
        let step = state
            .step(run_id, step_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("step", step_id.as_str()))?;
        Ok(match resolve {
            ResolveData::All => step,
            ResolveData::None => step.strip_data(),
        })
    }

    async fn list_steps(
        &self,
        run_id: &RunId,
        params: ListSteps,
    ) -> Result<Page<Step>, StoreError> {
        let state = self.state.lock();
        let steps: Vec<Step> =
            state.steps.get(run_id).map(|m| m.values().cloned().collect()).unwrap_or_default();
        drop(state);
        // Creation order; the cursor is the last step id at its position.
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
        let start = match params.cursor.as_deref() {
            Some(cursor) => steps
                .iter()
                .position(|s| s.step_id.as_str() == cursor)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };
        let remaining = &steps[start.min(steps.len())..];
        let more = remaining.len() > limit;
        let mut items: Vec<Step> = remaining.iter().take(limit).cloned().collect();
        let cursor = if more {
            items.last().map(|s| s.step_id.as_str().to_string())
        } else {
            None
        };
        if params.resolve_data == ResolveData::None {
            items = items.into_iter().map(Step::strip_data).collect();
        }
        Ok(Page { items, cursor })
    }

    async fn create_event(
        &self,
        run_id: RunId,
        body: EventBody,
    ) -> Result<EventResult, StoreError> {
        let (now_ms, deployment_id) = self.write_ctx();
        let ctx = WriteCtx { now_ms, idgen: &self.idgen, deployment_id: &deployment_id };
        let mut state = self.state.lock();
        store::create(&mut state, &ctx, run_id, body)
    }

    async fn list_events(
        &self,
        run_id: &RunId,
        params: ListEvents,
    ) -> Result<Page<Event>, StoreError> {
        let state = self.state.lock();
        let events: Vec<Event> = state.events.get(run_id).cloned().unwrap_or_default();
        drop(state);
        let mut page = paginate(events, params.cursor.as_deref(), params.limit, |event: &Event| {
            event.event_id.as_str().to_string()
        });
        if params.resolve_data == ResolveData::None {
            page.items = page.items.into_iter().map(Event::strip_data).collect();
        }
        Ok(page)
    }

    async fn list_events_by_correlation_id(
        &self,
        run_id: &RunId,
        correlation_id: &str,
    ) -> Result<Vec<Event>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .events
            .get(run_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.correlation_id.as_deref() == Some(correlation_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_hook(&self, hook_id: &HookId) -> Result<Hook, StoreError> {
        let state = self.state.lock();
        state
            .hooks
            .get(hook_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("hook", hook_id.as_str()))
    }

    async fn get_hook_by_token(&self, token: &str) -> Result<Hook, StoreError> {
        let state = self.state.lock();
        state
            .tokens
            .get(token)
            .and_then(|hook_id| state.hooks.get(hook_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("hook", token))
    }

    async fn list_hooks(&self, run_id: &RunId) -> Result<Vec<Hook>, StoreError> {
        Ok(self.state.lock().hooks_of(run_id))
    }

    async fn dispose_hook(
        &self,
        run_id: &RunId,
        hook_id: &HookId,
    ) -> Result<EventResult, StoreError> {
        self.create_event(*run_id, EventBody::HookDisposed { hook_id: hook_id.clone() }).await
    }

    async fn queue(
        &self,
        topic: &str,
        payload: Value,
        delay: Option<Duration>,
    ) -> Result<(), StoreError> {
        let ready_at_ms =
            self.clock.epoch_ms() + delay.map(|d| d.as_millis() as u64).unwrap_or(0);
        let mut queue = self.queue.lock();
        queue.messages.push_back(QueuedMessage {
            topic: topic.to_string(),
            payload,
            ready_at_ms,
            attempt: 0,
        });
        Ok(())
    }

    async fn write_to_stream(
        &self,
        run_id: &RunId,
        stream_id: &str,
        chunk: Value,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let record =
            state.streams.entry((*run_id, stream_id.to_string())).or_insert_with(StreamRecord::default);
        if record.closed {
            return Err(StoreError::validation(format!("stream {stream_id} is closed")));
        }
        record.chunks.push(chunk);
        Ok(())
    }

    async fn read_from_stream(
        &self,
        run_id: &RunId,
        stream_id: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let state = self.state.lock();
        state
            .streams
            .get(&(*run_id, stream_id.to_string()))
            .map(|record| record.chunks.clone())
            .ok_or_else(|| StoreError::not_found("stream", stream_id))
    }

    async fn close_stream(&self, run_id: &RunId, stream_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let record = state
            .streams
            .get_mut(&(*run_id, stream_id.to_string()))
            .ok_or_else(|| StoreError::not_found("stream", stream_id))?;
        record.closed = true;
        Ok(())
    }

    async fn list_streams_by_run_id(&self, run_id: &RunId) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state
            .streams
            .keys()
            .filter(|(rid, _)| rid == run_id)
            .map(|(_, sid)| sid.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl<C: Clock> QueueConsumer for MemoryWorld<C> {
    async fn pull(&self, now_ms: u64) -> Result<Option<Delivery>, StoreError> {
        let mut queue = self.queue.lock();
        let position = queue.messages.iter().position(|msg| {
            if msg.ready_at_ms > now_ms {
                return false;
            }
            // At-most-one orchestrator delivery per run.
            if msg.is_flow() {
                if let Some(run) = msg.run_key() {
                    return !queue.busy_runs.contains(&run);
                }
            }
            true
        });
        let Some(position) = position else {
            return Ok(None);
        };
        let Some(mut message) = queue.messages.remove(position) else {
            return Ok(None);
        };
        message.attempt += 1;
        if message.is_flow() {
            if let Some(run) = message.run_key() {
                queue.busy_runs.insert(run);
            }
        }
        queue.next_delivery += 1;
        let delivery_id = format!("dlv-{:08}", queue.next_delivery);
        let delivery = Delivery {
            delivery_id: delivery_id.clone(),
            topic: message.topic.clone(),
            payload: message.payload.clone(),
            attempt: message.attempt,
        };
        queue.in_flight.insert(delivery_id, message);
        Ok(Some(delivery))
    }

    async fn ack(&self, delivery_id: &str) -> Result<(), StoreError> {
        let mut queue = self.queue.lock();
        if let Some(message) = queue.in_flight.remove(delivery_id) {
            release(&mut queue, &message);
        }
        Ok(())
    }

    async fn defer(&self, delivery_id: &str, delay: Duration) -> Result<(), StoreError> {
        let mut queue = self.queue.lock();
        if let Some(mut message) = queue.in_flight.remove(delivery_id) {
            release(&mut queue, &message);
            message.ready_at_ms = self.clock.epoch_ms() + delay.as_millis() as u64;
            queue.messages.push_back(message);
        }
        Ok(())
    }

    async fn is_idle(&self) -> Result<bool, StoreError> {
        let queue = self.queue.lock();
        Ok(queue.messages.is_empty() && queue.in_flight.is_empty())
    }
}

fn release(queue: &mut QueueState, message: &QueuedMessage) {
    if message.is_flow() {
        if let Some(run) = message.run_key() {
            queue.busy_runs.remove(&run);
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
