// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn sample() -> Manifest {
    serde_json::from_value(json!({
        "version": "1.0.0",
        "steps": {
            "src/flows.rs": {
                "add": { "stepId": "stp_9f2c" },
                "send": { "stepId": "stp_11aa" }
            }
        },
        "workflows": {
            "src/flows.rs": {
                "add_ten": { "workflowId": "wf_77", "graph": {"nodes": []} }
            }
        }
    }))
    .unwrap()
}

#[test]
fn resolves_step_and_workflow_ids() {
    let manifest = sample();
    assert_eq!(manifest.step_id_for("step//src/flows.rs//add"), Some("stp_9f2c"));
    assert_eq!(manifest.step_id_for("step//src/flows.rs//send"), Some("stp_11aa"));
    assert_eq!(manifest.workflow_id_for("workflow//src/flows.rs//add_ten"), Some("wf_77"));
}

#[test]
fn unknown_names_resolve_to_none() {
    let manifest = sample();
    assert_eq!(manifest.step_id_for("step//src/flows.rs//missing"), None);
    assert_eq!(manifest.step_id_for("step//other.rs//add"), None);
    // Kind mismatch: a workflow name is not a step name.
    assert_eq!(manifest.step_id_for("workflow//src/flows.rs//add_ten"), None);
    assert_eq!(manifest.workflow_id_for("step//src/flows.rs//add"), None);
    assert_eq!(manifest.step_id_for("not-a-name"), None);
}

#[test]
fn graph_payload_is_carried_verbatim() {
    let manifest = sample();
    let entry = &manifest.workflows["src/flows.rs"]["add_ten"];
    assert_eq!(entry.graph, Some(json!({"nodes": []})));
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.json");
    std::fs::write(&path, serde_json::to_string(&sample()).unwrap()).unwrap();

    let manifest = Manifest::load(&path).unwrap();
    assert_eq!(manifest.version, "1.0.0");
    assert_eq!(manifest.step_id_for("step//src/flows.rs//add"), Some("stp_9f2c"));
}

#[test]
fn load_errors_are_classified() {
    let dir = tempfile::tempdir().unwrap();
    let missing = Manifest::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(missing, ManifestError::Io(_)));

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{not json").unwrap();
    let parse = Manifest::load(&path).unwrap_err();
    assert!(matches!(parse, ManifestError::Parse(_)));
}

#[test]
fn empty_manifest_deserializes_with_defaults() {
    let manifest: Manifest = serde_json::from_value(json!({})).unwrap();
    assert!(manifest.steps.is_empty());
    assert!(manifest.workflows.is_empty());
}
