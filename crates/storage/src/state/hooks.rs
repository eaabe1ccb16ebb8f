// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook entity derivations.

use super::StoreState;
use wl_core::{EventBody, Hook, RunId};

/// Apply a hook event. Token uniqueness was checked by validation; receipt
/// and conflict events are log-only and handled by the caller.
pub(crate) fn apply(
    state: &mut StoreState,
    run_id: &RunId,
    body: &EventBody,
    now_ms: u64,
) -> Option<Hook> {
    match body {
        EventBody::HookCreated { hook_id, token, metadata } => {
            let hook = Hook {
                run_id: *run_id,
                hook_id: hook_id.clone(),
                token: token.clone(),
                metadata: metadata.clone(),
                created_at_ms: now_ms,
            };
            state.tokens.insert(token.clone(), hook_id.clone());
            state.hooks.insert(hook_id.clone(), hook.clone());
            Some(hook)
        }

        EventBody::HookDisposed { hook_id } => {
            let hook = state.hooks.remove(hook_id)?;
            state.tokens.remove(&hook.token);
            Some(hook)
        }

        _ => None,
    }
}
