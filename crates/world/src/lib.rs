// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wl-world: the abstract storage + queue + stream facade and the
//! idempotency-aware retry classifier that decorates it.

pub mod queue;
pub mod retry;
pub mod world;

pub use queue::{Delivery, QueueConsumer};
pub use retry::{RetryPolicy, Retrying};
pub use world::{EventResult, ListEvents, ListRuns, ListSteps, Page, ResolveData, World};
