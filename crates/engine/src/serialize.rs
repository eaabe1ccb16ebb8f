// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hydrate/dehydrate of structured step values.
//!
//! Persisted values may embed scalar references to runtime resources; the
//! only reference kind the core defines is a stream: `{"$stream": "<id>"}`.
//! Hydration binds each reference to a live [`StreamHandle`] scoped to the
//! step's run; dehydration canonicalizes outgoing markers back to the bare
//! reference form. Writes queued during the step run land best-effort on a
//! [`Background`] set, with client-disconnect aborts suppressed.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wl_core::{RunId, StepInput, StoreError};
use wl_world::World;

/// Marker key for a persisted stream reference.
pub const STREAM_MARKER: &str = "$stream";

/// A persistable stream reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamRef {
    pub stream_id: String,
}

impl StreamRef {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self { stream_id: stream_id.into() }
    }

    pub fn to_value(&self) -> Value {
        json!({ STREAM_MARKER: self.stream_id })
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let stream_id = map.get(STREAM_MARKER)?.as_str()?;
        Some(Self::new(stream_id))
    }
}

/// Deep-scan a value tree for stream references.
pub fn stream_refs(value: &Value) -> Vec<StreamRef> {
    let mut refs = Vec::new();
    collect_refs(value, &mut refs);
    refs
}

fn collect_refs(value: &Value, refs: &mut Vec<StreamRef>) {
    if let Some(reference) = StreamRef::from_value(value) {
        refs.push(reference);
        return;
    }
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_refs(v, refs)),
        Value::Object(map) => map.values().for_each(|v| collect_refs(v, refs)),
        _ => {}
    }
}

/// A live stream bound to one run's world.
#[derive(Clone)]
pub struct StreamHandle {
    world: Arc<dyn World>,
    run_id: RunId,
    stream_id: String,
}

impl StreamHandle {
    pub fn new(world: Arc<dyn World>, run_id: RunId, stream_id: impl Into<String>) -> Self {
        Self { world, run_id, stream_id: stream_id.into() }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn reference(&self) -> StreamRef {
        StreamRef::new(self.stream_id.clone())
    }

    pub async fn read_all(&self) -> Result<Vec<Value>, StoreError> {
        self.world.read_from_stream(&self.run_id, &self.stream_id).await
    }

    pub async fn write(&self, chunk: Value) -> Result<(), StoreError> {
        self.world.write_to_stream(&self.run_id, &self.stream_id, chunk).await
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        self.world.close_stream(&self.run_id, &self.stream_id).await
    }
}

/// Step input with its stream references resolved to live handles.
pub struct Hydrated {
    pub input: StepInput,
    pub streams: Vec<StreamHandle>,
}

/// Bind every stream reference in `input` to a handle on this run's world.
/// Argument order and closure key order pass through untouched.
pub fn hydrate(world: &Arc<dyn World>, run_id: RunId, input: &StepInput) -> Hydrated {
    let mut refs = Vec::new();
    for arg in &input.args {
        collect_refs(arg, &mut refs);
    }
    for value in input.closure.values() {
        collect_refs(value, &mut refs);
    }
    refs.dedup();
    let streams = refs
        .into_iter()
        .map(|r| StreamHandle::new(world.clone(), run_id, r.stream_id))
        .collect();
    Hydrated { input: input.clone(), streams }
}

/// Canonicalize an outgoing value: any object carrying the stream marker is
/// reduced to the bare reference, dropping handle-local fields.
pub fn dehydrate(value: Value) -> Value {
    if let Some(reference) = StreamRef::from_value(&value) {
        return reference.to_value();
    }
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(dehydrate).collect()),
        Value::Object(map) => {
            if map.contains_key(STREAM_MARKER) {
                return match map.get(STREAM_MARKER).and_then(Value::as_str) {
                    Some(id) => StreamRef::new(id).to_value(),
                    None => Value::Object(map),
                };
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, dehydrate(v))).collect())
        }
        scalar => scalar,
    }
}

/// Best-effort background writes launched during a step run.
///
/// `finish` awaits everything queued so far: failures that look like a
/// disconnected client are expected and suppressed, anything else is
/// logged. No error ever reaches the step result path.
#[derive(Clone, Default)]
pub struct Background {
    handles: Arc<Mutex<Vec<JoinHandle<Result<(), StoreError>>>>>,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        self.handles.lock().push(tokio::spawn(task));
    }

    pub async fn finish(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if is_abort(&err) => {
                    tracing::debug!(error = %err, "background write aborted");
                }
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "background write failed");
                }
                Err(join) if join.is_cancelled() => {}
                Err(join) => {
                    tracing::warn!(error = %join, "background write panicked");
                }
            }
        }
    }
}

/// Client went away mid-write: expected during shutdown and redelivery.
fn is_abort(err: &StoreError) -> bool {
    match err {
        StoreError::Timeout => true,
        StoreError::Network { code } => {
            code.eq_ignore_ascii_case("ECONNABORTED")
                || code.eq_ignore_ascii_case("EPIPE")
                || code.eq_ignore_ascii_case("ECONNRESET")
        }
        _ => false,
    }
}

#[cfg(test)]
#[path = "serialize_tests.rs"]
mod tests;
