// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for tests in this crate and downstream crates
//! (enabled via the `test-support` feature).

use crate::clock::FakeClock;
use crate::id::IdGen;

/// Deterministic clock + generator pair for tests: the clock starts at the
/// fake epoch and the generator produces strictly increasing IDs from it.
pub fn fixed_ids() -> (FakeClock, IdGen) {
    (FakeClock::new(), IdGen::new())
}

/// JSON value literal shorthand.
pub fn val(v: impl serde::Serialize) -> serde_json::Value {
    serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
}
