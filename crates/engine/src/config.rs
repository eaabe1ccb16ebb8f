// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine.

use std::path::PathBuf;

/// Backend selector: which `World` implementation to wire up.
pub fn target_world() -> Option<String> {
    var("WORKFLOW_TARGET_WORLD")
}

/// Filesystem root for the local backend.
pub fn local_data_dir() -> Option<PathBuf> {
    var("WORKFLOW_LOCAL_DATA_DIR").map(PathBuf::from)
}

/// Relational-DB backend URL.
pub fn postgres_url() -> Option<String> {
    var("WORKFLOW_POSTGRES_URL")
}

/// Manifest location override (default: `manifest.json` in the cwd).
pub fn manifest_path() -> PathBuf {
    var("WORKFLOW_MANIFEST_PATH").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("manifest.json"))
}

/// Local HTTP port for the embedding server.
pub fn port() -> u16 {
    var("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000)
}

/// Hosted-backend credentials.
pub fn team() -> Option<String> {
    var("WORKFLOW_TEAM")
}

pub fn project() -> Option<String> {
    var("WORKFLOW_PROJECT")
}

pub fn auth_token() -> Option<String> {
    var("WORKFLOW_AUTH_TOKEN")
}

pub fn environment() -> Option<String> {
    var("WORKFLOW_ENV")
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}
