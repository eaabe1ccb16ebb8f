// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable textual identifiers and queue topic naming.
//!
//! Workflows and steps are identified by `workflow//<file>//<function>` and
//! `step//<file>//<function>`. Each deployment uses two queue topics per
//! function: `workflow.<workflow_name>` and `step.<step_name>`.

use smol_str::SmolStr;

const SEPARATOR: &str = "//";

/// Which of the two per-deployment topics a queue name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Workflow,
    Step,
}

crate::simple_display! {
    TopicKind {
        Workflow => "workflow",
        Step => "step",
    }
}

/// Build the stable identifier `<kind>//<file>//<function>`.
pub fn function_name(kind: TopicKind, file: &str, function: &str) -> SmolStr {
    SmolStr::new(format!("{kind}{SEPARATOR}{file}{SEPARATOR}{function}"))
}

/// Split a stable identifier into `(kind, file, function)`.
pub fn split_function_name(name: &str) -> Option<(TopicKind, &str, &str)> {
    let (kind, rest) = name.split_once(SEPARATOR)?;
    let kind = match kind {
        "workflow" => TopicKind::Workflow,
        "step" => TopicKind::Step,
        _ => return None,
    };
    let (file, function) = rest.split_once(SEPARATOR)?;
    if file.is_empty() || function.is_empty() {
        return None;
    }
    Some((kind, file, function))
}

/// Queue topic for orchestrator ticks of a workflow.
pub fn workflow_topic(workflow_name: &str) -> String {
    format!("workflow.{workflow_name}")
}

/// Queue topic for invocations of a step.
pub fn step_topic(step_name: &str) -> String {
    format!("step.{step_name}")
}

/// Split a queue topic into its kind and the function name it carries.
pub fn split_topic(topic: &str) -> Option<(TopicKind, &str)> {
    if let Some(name) = topic.strip_prefix("workflow.") {
        return Some((TopicKind::Workflow, name));
    }
    topic.strip_prefix("step.").map(|name| (TopicKind::Step, name))
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
