// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for engine tests: an in-memory world on a fake clock
//! driven through the real runtime.

use crate::registry::Registry;
use crate::runtime::Runtime;
use std::sync::Arc;
use wl_core::{EventType, FakeClock, Run, RunId, Step, StepId};
use wl_storage::MemoryWorld;
use wl_world::{ListEvents, QueueConsumer, ResolveData, World};

pub(crate) struct TestHarness {
    pub world: Arc<MemoryWorld<FakeClock>>,
    pub clock: FakeClock,
    pub runtime: Runtime<FakeClock>,
}

pub(crate) fn harness(registry: Registry) -> TestHarness {
    let clock = FakeClock::new();
    let world = Arc::new(MemoryWorld::with_clock(clock.clone()));
    let runtime = Runtime::new(world.clone(), registry, clock.clone());
    TestHarness { world, clock, runtime }
}

impl TestHarness {
    pub async fn run(&self, run_id: &RunId) -> Run {
        self.world.get_run(run_id, ResolveData::All).await.unwrap()
    }

    pub async fn step(&self, run_id: &RunId, step_id: &str) -> Step {
        self.world.get_step(run_id, &StepId::new(step_id), ResolveData::All).await.unwrap()
    }

    pub async fn event_types(&self, run_id: &RunId) -> Vec<EventType> {
        self.world
            .list_events(run_id, ListEvents::default())
            .await
            .unwrap()
            .items
            .iter()
            .map(|e| e.event_type())
            .collect()
    }

    /// Drain, advancing the fake clock by `step_ms` between rounds until
    /// the queue is fully idle (deferred deliveries included).
    pub async fn drain_with_time(&self, step_ms: u64, max_rounds: u32) {
        for _ in 0..max_rounds {
            self.runtime.drain().await.unwrap();
            if self.world.is_idle().await.unwrap() {
                return;
            }
            self.clock.advance(std::time::Duration::from_millis(step_ms));
        }
        panic!("queue never went idle");
    }
}
