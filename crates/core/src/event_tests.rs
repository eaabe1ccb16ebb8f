// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_event(body: EventBody) -> Event {
    Event {
        run_id: RunId::from_string("run-a"),
        event_id: EventId::from_string("evt-0001"),
        correlation_id: body.correlation_id().map(SmolStr::new),
        body,
        created_at_ms: 1_000_000,
        spec_version: crate::version::SPEC_VERSION,
    }
}

#[test]
fn bodies_serialize_with_type_tag() {
    let body = EventBody::StepCompleted {
        step_id: StepId::new("s#0"),
        output: Some(serde_json::json!(15)),
    };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["type"], "step_completed");
    assert_eq!(json["step_id"], "s#0");
    assert_eq!(json["output"], 15);
}

#[test]
fn unit_bodies_serialize_as_bare_tags() {
    let json = serde_json::to_value(EventBody::RunCancelled).unwrap();
    assert_eq!(json, serde_json::json!({"type": "run_cancelled"}));
    let back: EventBody = serde_json::from_value(json).unwrap();
    assert_eq!(back, EventBody::RunCancelled);
}

#[test]
fn event_row_nests_body_under_event_data() {
    let event = sample_event(EventBody::StepStarted { step_id: StepId::new("s#0") });
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event_data"]["type"], "step_started");
    assert_eq!(json["event_data"]["step_id"], "s#0");
    assert_eq!(json["run_id"], "run-a");
    assert_eq!(json["correlation_id"], "s#0");
    let back: Event = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn row_and_body_versions_stay_distinct() {
    let event = Event {
        run_id: RunId::from_string("run-a"),
        event_id: EventId::from_string("evt-0001"),
        correlation_id: None,
        body: EventBody::RunCreated {
            workflow_name: "workflow//app//main".into(),
            spec_version: Some(2),
            input: vec![],
            execution_context: IndexMap::new(),
            deployment_id: None,
        },
        created_at_ms: 1,
        spec_version: 2,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["spec_version"], 2);
    assert_eq!(json["event_data"]["spec_version"], 2);
    let back: Event = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn correlation_ids_cover_steps_hooks_waits() {
    let step = EventBody::StepRetrying {
        step_id: StepId::new("s#1"),
        error: None,
        retry_after_ms: None,
    };
    assert_eq!(step.correlation_id(), Some("s#1"));

    let hook = EventBody::HookDisposed { hook_id: HookId::new("h#0") };
    assert_eq!(hook.correlation_id(), Some("h#0"));

    let wait = EventBody::WaitCreated { wait_id: "w#0".into(), wake_at_ms: 99 };
    assert_eq!(wait.correlation_id(), Some("w#0"));

    assert_eq!(EventBody::RunStarted.correlation_id(), None);
}

#[test]
fn event_type_tags_match_wire_names() {
    let cases: Vec<(EventBody, &str)> = vec![
        (EventBody::RunStarted, "run_started"),
        (EventBody::RunCompleted { output: None }, "run_completed"),
        (EventBody::HookConflict { token: "t".into() }, "hook_conflict"),
        (EventBody::WaitCompleted { wait_id: "w".into() }, "wait_completed"),
    ];
    for (body, tag) in cases {
        assert_eq!(body.event_type().to_string(), tag);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], tag);
    }
}

#[test]
fn log_only_partition() {
    assert!(EventBody::HookConflict { token: "t".into() }.is_log_only());
    assert!(EventBody::WaitCreated { wait_id: "w".into(), wake_at_ms: 0 }.is_log_only());
    assert!(!EventBody::HookDisposed { hook_id: HookId::new("h") }.is_log_only());
    assert!(!EventBody::RunStarted.is_log_only());
}

#[test]
fn strip_data_keeps_identity_fields() {
    let body = EventBody::StepCreated {
        step_id: StepId::new("s#0"),
        step_name: "step//app//add".into(),
        input: StepInput::args(vec![serde_json::json!("huge")]),
    };
    match body.strip_data() {
        EventBody::StepCreated { step_id, step_name, input } => {
            assert_eq!(step_id.as_str(), "s#0");
            assert_eq!(step_name, "step//app//add");
            assert!(input.args.is_empty());
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[test]
fn legacy_error_field_coerces_inside_event() {
    let raw = serde_json::json!({
        "run_id": "run-a",
        "event_id": "evt-0002",
        "event_data": { "type": "run_failed", "error": "plain string failure" },
        "created_at_ms": 1,
        "spec_version": 2,
    });
    let event: Event = serde_json::from_value(raw).unwrap();
    match event.body {
        EventBody::RunFailed { error } => assert_eq!(error.message, "plain string failure"),
        other => panic!("unexpected body: {other:?}"),
    }
}
