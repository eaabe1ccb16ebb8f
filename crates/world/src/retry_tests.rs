// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

/// Backend stub that fails with a scripted sequence of errors before
/// succeeding, counting every call it receives.
#[derive(Default)]
struct ScriptedWorld {
    failures: Mutex<VecDeque<StoreError>>,
    calls: AtomicU32,
}

impl ScriptedWorld {
    fn failing(times: usize, err: StoreError) -> Self {
        let world = Self::default();
        let mut failures = world.failures.lock();
        for _ in 0..times {
            failures.push_back(err.clone());
        }
        drop(failures);
        world
    }

    fn take(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn sample_result() -> EventResult {
    EventResult {
        event: Event {
            run_id: RunId::from_string("run-a"),
            event_id: wl_core::event::EventId::from_string("evt-1"),
            correlation_id: None,
            body: EventBody::RunCancelled,
            created_at_ms: 0,
            spec_version: wl_core::SPEC_VERSION,
        },
        run: None,
        step: None,
        hook: None,
    }
}

#[async_trait]
impl World for ScriptedWorld {
    async fn get_deployment_id(&self) -> Result<String, StoreError> {
        self.take().map(|_| "dpl-test".into())
    }

    async fn get_run(&self, _run_id: &RunId, _resolve: ResolveData) -> Result<Run, StoreError> {
        self.take().map(|_| Run::builder().build())
    }

    async fn list_runs(&self, _params: ListRuns) -> Result<Page<Run>, StoreError> {
        self.take().map(|_| Page::empty())
    }

    async fn cancel_run(&self, _run_id: &RunId) -> Result<EventResult, StoreError> {
        self.take().map(|_| sample_result())
    }

    async fn get_step(
        &self,
        _run_id: &RunId,
        _step_id: &StepId,
        _resolve: ResolveData,
    ) -> Result<Step, StoreError> {
        self.take().map(|_| Step::builder().build())
    }

    async fn list_steps(
        &self,
        _run_id: &RunId,
        _params: ListSteps,
    ) -> Result<Page<Step>, StoreError> {
        self.take().map(|_| Page::empty())
    }

    async fn create_event(
        &self,
        _run_id: RunId,
        _body: EventBody,
    ) -> Result<EventResult, StoreError> {
        self.take().map(|_| sample_result())
    }

    async fn list_events(
        &self,
        _run_id: &RunId,
        _params: ListEvents,
    ) -> Result<Page<Event>, StoreError> {
        self.take().map(|_| Page::empty())
    }

    async fn list_events_by_correlation_id(
        &self,
        _run_id: &RunId,
        _correlation_id: &str,
    ) -> Result<Vec<Event>, StoreError> {
        self.take().map(|_| Vec::new())
    }

    async fn get_hook(&self, _hook_id: &HookId) -> Result<Hook, StoreError> {
        self.take().map(|_| Hook {
            run_id: RunId::from_string("run-a"),
            hook_id: HookId::new("h#0"),
            token: "t".into(),
            metadata: None,
            created_at_ms: 0,
        })
    }

    async fn get_hook_by_token(&self, token: &str) -> Result<Hook, StoreError> {
        self.take().map(|_| Hook {
            run_id: RunId::from_string("run-a"),
            hook_id: HookId::new("h#0"),
            token: token.into(),
            metadata: None,
            created_at_ms: 0,
        })
    }

    async fn list_hooks(&self, _run_id: &RunId) -> Result<Vec<Hook>, StoreError> {
        self.take().map(|_| Vec::new())
    }

    async fn dispose_hook(
        &self,
        _run_id: &RunId,
        _hook_id: &HookId,
    ) -> Result<EventResult, StoreError> {
        self.take().map(|_| sample_result())
    }

    async fn queue(
        &self,
        _topic: &str,
        _payload: Value,
        _delay: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.take()
    }

    async fn write_to_stream(
        &self,
        _run_id: &RunId,
        _stream_id: &str,
        _chunk: Value,
    ) -> Result<(), StoreError> {
        self.take()
    }

    async fn read_from_stream(
        &self,
        _run_id: &RunId,
        _stream_id: &str,
    ) -> Result<Vec<Value>, StoreError> {
        self.take().map(|_| Vec::new())
    }

    async fn close_stream(&self, _run_id: &RunId, _stream_id: &str) -> Result<(), StoreError> {
        self.take()
    }

    async fn list_streams_by_run_id(&self, _run_id: &RunId) -> Result<Vec<String>, StoreError> {
        self.take().map(|_| Vec::new())
    }
}

fn rid() -> RunId {
    RunId::from_string("run-a")
}

fn sid() -> StepId {
    StepId::new("s#0")
}

fn hid() -> HookId {
    HookId::new("h#0")
}

/// Dispatch a single operation by its classifier name, discarding the value.
async fn call(world: &Retrying<ScriptedWorld>, op: &str) -> Result<(), StoreError> {
    match op {
        "get_deployment_id" => world.get_deployment_id().await.map(|_| ()),
        "runs.get" => world.get_run(&rid(), ResolveData::All).await.map(|_| ()),
        "runs.list" => world.list_runs(ListRuns::default()).await.map(|_| ()),
        "runs.cancel" => world.cancel_run(&rid()).await.map(|_| ()),
        "steps.get" => world.get_step(&rid(), &sid(), ResolveData::All).await.map(|_| ()),
        "steps.list" => world.list_steps(&rid(), ListSteps::default()).await.map(|_| ()),
        "events.create" => {
            world.create_event(rid(), EventBody::RunCancelled).await.map(|_| ())
        }
        "events.list" => world.list_events(&rid(), ListEvents::default()).await.map(|_| ()),
        "events.list_by_correlation_id" => {
            world.list_events_by_correlation_id(&rid(), "s#0").await.map(|_| ())
        }
        "hooks.get" => world.get_hook(&hid()).await.map(|_| ()),
        "hooks.get_by_token" => world.get_hook_by_token("t").await.map(|_| ()),
        "hooks.list" => world.list_hooks(&rid()).await.map(|_| ()),
        "hooks.dispose" => world.dispose_hook(&rid(), &hid()).await.map(|_| ()),
        "queue" => world.queue("workflow.w", serde_json::json!({}), None).await,
        "write_to_stream" => {
            world.write_to_stream(&rid(), "out", serde_json::json!("x")).await
        }
        "read_from_stream" => world.read_from_stream(&rid(), "out").await.map(|_| ()),
        "close_stream" => world.close_stream(&rid(), "out").await,
        "list_streams_by_run_id" => world.list_streams_by_run_id(&rid()).await.map(|_| ()),
        other => panic!("unknown op {other}"),
    }
}

fn unavailable() -> StoreError {
    StoreError::Api { status: 503, message: "unavailable".into() }
}

const IDEMPOTENT_OPS: [&str; 12] = [
    "get_deployment_id",
    "runs.get",
    "runs.list",
    "steps.get",
    "steps.list",
    "events.list",
    "events.list_by_correlation_id",
    "hooks.get",
    "hooks.get_by_token",
    "hooks.list",
    "read_from_stream",
    "list_streams_by_run_id",
];

const NON_IDEMPOTENT_OPS: [&str; 6] = [
    "events.create",
    "runs.cancel",
    "hooks.dispose",
    "queue",
    "write_to_stream",
    "close_stream",
];

#[tokio::test(start_paused = true)]
async fn idempotent_op_retries_transient_failures() {
    for op in IDEMPOTENT_OPS {
        // Three 503s then success: the fourth attempt lands.
        let world = Retrying::new(ScriptedWorld::failing(3, unavailable()));
        call(&world, op).await.unwrap_or_else(|e| panic!("{op} should recover: {e}"));
        assert_eq!(world.inner().calls(), 4, "{op}");

        // Persistent 503: gives up after the fourth attempt.
        let world = Retrying::new(ScriptedWorld::failing(8, unavailable()));
        let err = call(&world, op).await.unwrap_err();
        assert_eq!(err.status(), Some(503), "{op}");
        assert_eq!(world.inner().calls(), 4, "{op}");
    }
}

#[tokio::test(start_paused = true)]
async fn not_found_bails_immediately() {
    for op in ["runs.get", "events.list", "hooks.get_by_token"] {
        let world =
            Retrying::new(ScriptedWorld::failing(1, StoreError::not_found("run", "run-a")));
        let err = call(&world, op).await.unwrap_err();
        assert_eq!(err.status(), Some(404), "{op}");
        assert_eq!(world.inner().calls(), 1, "{op}");
    }
}

#[tokio::test(start_paused = true)]
async fn non_idempotent_op_never_retries() {
    for op in NON_IDEMPOTENT_OPS {
        let world = Retrying::new(ScriptedWorld::failing(1, unavailable()));
        let err = call(&world, op).await.unwrap_err();
        assert_eq!(err.status(), Some(503), "{op}");
        assert_eq!(world.inner().calls(), 1, "{op}");
    }
}

#[tokio::test(start_paused = true)]
async fn network_codes_retry_reads() {
    let world = Retrying::new(ScriptedWorld::failing(
        2,
        StoreError::Network { code: "ECONNRESET".into() },
    ));
    call(&world, "runs.get").await.unwrap();
    assert_eq!(world.inner().calls(), 3);
}

#[test]
fn backoff_caps_and_floors() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.cap_for(0), Duration::from_millis(250));
    assert_eq!(policy.cap_for(1), Duration::from_millis(500));
    assert_eq!(policy.cap_for(2), Duration::from_millis(1000));
    assert_eq!(policy.cap_for(10), Duration::from_secs(5));
    for attempt in 0..6 {
        let delay = policy.delay_for(attempt);
        assert!(delay >= policy.min_delay, "floor violated at attempt {attempt}");
        assert!(delay <= policy.max_delay, "cap violated at attempt {attempt}");
    }
}
