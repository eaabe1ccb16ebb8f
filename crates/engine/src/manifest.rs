// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest file consumption.
//!
//! The build-time bundler writes `manifest.json`; the runtime reads it only
//! to resolve stable identities. Step and workflow ids in the manifest are
//! opaque: the engine never interprets them, it just keys call sites on
//! them. The `graph` payload is carried through untouched for external
//! viewers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use wl_core::names::{split_function_name, TopicKind};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEntry {
    #[serde(rename = "stepId")]
    pub step_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEntry {
    #[serde(rename = "workflowId")]
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Value>,
}

/// `manifest.json`: `{version, steps: {file: {fn: {stepId}}}, workflows:
/// {file: {fn: {workflowId, graph}}}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub steps: HashMap<String, HashMap<String, StepEntry>>,
    #[serde(default)]
    pub workflows: HashMap<String, HashMap<String, WorkflowEntry>>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Resolve the manifest step id for a stable step name
    /// (`step//<file>//<function>`), if the manifest knows it.
    pub fn step_id_for(&self, step_name: &str) -> Option<&str> {
        let (kind, file, function) = split_function_name(step_name)?;
        if kind != TopicKind::Step {
            return None;
        }
        Some(self.steps.get(file)?.get(function)?.step_id.as_str())
    }

    /// Resolve the manifest workflow id for a stable workflow name.
    pub fn workflow_id_for(&self, workflow_name: &str) -> Option<&str> {
        let (kind, file, function) = split_function_name(workflow_name)?;
        if kind != TopicKind::Workflow {
            return None;
        }
        Some(self.workflows.get(file)?.get(function)?.workflow_id.as_str())
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
