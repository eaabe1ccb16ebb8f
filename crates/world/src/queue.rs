// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consumption side of the queue contract.
//!
//! [`crate::World::queue`] is the producer half. A dispatcher drains
//! deliveries through this trait: at-least-once, an attempt counter per
//! delivery, and deferral to postpone visibility. The queue, not the
//! handler, enforces at-most-one in-flight orchestrator delivery per run.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use wl_core::StoreError;

/// One message handed to a handler. `attempt` starts at 1 and counts
/// deliveries, not handler successes.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_id: String,
    pub topic: String,
    pub payload: Value,
    pub attempt: u32,
}

#[async_trait]
pub trait QueueConsumer: Send + Sync + 'static {
    /// Pop the next visible delivery at `now_ms`, or `None` when the queue
    /// has nothing ready. A popped delivery is invisible until acked,
    /// deferred, or returned.
    async fn pull(&self, now_ms: u64) -> Result<Option<Delivery>, StoreError>;

    /// Delivery handled; drop it.
    async fn ack(&self, delivery_id: &str) -> Result<(), StoreError>;

    /// Hide the delivery and redeliver after `delay`, bumping its attempt.
    async fn defer(&self, delivery_id: &str, delay: Duration) -> Result<(), StoreError>;

    /// True when no message is queued or in flight. Drives test drains.
    async fn is_idle(&self) -> Result<bool, StoreError>;
}
