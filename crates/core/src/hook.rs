// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook entity: a durable, token-addressable suspension point.

use crate::run::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

crate::define_key! {
    /// Caller-supplied hook identifier, deterministic per call site and
    /// opaque to the store.
    pub struct HookId;
}

/// A suspension point a run is waiting on. The token is globally unique
/// across live hooks; hooks die with their owning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub run_id: RunId,
    pub hook_id: HookId,
    /// Opaque string embedded into the webhook URL.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_at_ms: u64,
}
