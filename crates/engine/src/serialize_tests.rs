// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use wl_core::{FakeClock, RunId, StepInput};
use wl_storage::MemoryWorld;

#[test]
fn stream_refs_deep_scan() {
    let value = json!({
        "a": {"$stream": "logs"},
        "b": [1, {"$stream": "metrics"}, {"nested": {"$stream": "logs"}}],
        "c": "plain",
    });
    let mut ids: Vec<String> = stream_refs(&value).into_iter().map(|r| r.stream_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["logs", "logs", "metrics"]);
}

#[test]
fn marker_round_trip() {
    let reference = StreamRef::new("out");
    let value = reference.to_value();
    assert_eq!(value, json!({"$stream": "out"}));
    assert_eq!(StreamRef::from_value(&value), Some(reference));
    assert_eq!(StreamRef::from_value(&json!({"$stream": 42})), None);
    assert_eq!(StreamRef::from_value(&json!("out")), None);
}

#[test]
fn dehydrate_canonicalizes_markers() {
    let output = json!({
        "stream": {"$stream": "out", "buffered": [1, 2, 3], "pos": 7},
        "list": [{"$stream": "aux", "fd": 3}],
        "plain": {"keep": "me"},
    });
    let dehydrated = dehydrate(output);
    assert_eq!(
        dehydrated,
        json!({
            "stream": {"$stream": "out"},
            "list": [{"$stream": "aux"}],
            "plain": {"keep": "me"},
        })
    );
}

#[test]
fn hydrate_binds_handles_for_each_reference() {
    let world: Arc<dyn World> = Arc::new(MemoryWorld::with_clock(FakeClock::new()));
    let input = StepInput {
        args: vec![json!({"$stream": "logs"}), json!(5)],
        closure: [("extra".to_string(), json!({"$stream": "metrics"}))].into_iter().collect(),
    };
    let hydrated = hydrate(&world, RunId::from_string("run-a"), &input);
    assert_eq!(hydrated.input, input, "values pass through untouched");
    let ids: Vec<&str> = hydrated.streams.iter().map(StreamHandle::stream_id).collect();
    assert_eq!(ids, vec!["logs", "metrics"]);
}

#[tokio::test]
async fn stream_handles_read_and_write_through_world() {
    let world: Arc<dyn World> = Arc::new(MemoryWorld::with_clock(FakeClock::new()));
    let handle = StreamHandle::new(world, RunId::from_string("run-a"), "out");
    handle.write(json!("chunk-1")).await.unwrap();
    handle.write(json!("chunk-2")).await.unwrap();
    assert_eq!(handle.read_all().await.unwrap(), vec![json!("chunk-1"), json!("chunk-2")]);
    handle.close().await.unwrap();
    assert!(handle.write(json!("late")).await.is_err());
}

#[tokio::test]
async fn background_finish_awaits_all_writes() {
    let world: Arc<dyn World> = Arc::new(MemoryWorld::with_clock(FakeClock::new()));
    let background = Background::new();
    for i in 0..3 {
        let handle = StreamHandle::new(world.clone(), RunId::from_string("run-a"), "out");
        background.spawn(async move { handle.write(json!(i)).await });
    }
    background.finish().await;

    let handle = StreamHandle::new(world, RunId::from_string("run-a"), "out");
    assert_eq!(handle.read_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn background_suppresses_failures() {
    let background = Background::new();
    background.spawn(async { Err(wl_core::StoreError::Timeout) });
    background.spawn(async {
        Err(wl_core::StoreError::Network { code: "ECONNABORTED".into() })
    });
    background.spawn(async { Err(wl_core::StoreError::validation("real failure")) });
    // Nothing panics and nothing propagates; failures are logged only.
    background.finish().await;
}
