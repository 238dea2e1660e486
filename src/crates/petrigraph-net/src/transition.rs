//! Action and synchronization nodes of a Petri net.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a transition represents in the originating workflow.
///
/// Semantically every kind fires the same way; the kind matters to the
/// projector (loop breaking, choice conditions) and to the executor
/// (timer delays, error routing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionKind {
    #[default]
    Action,
    /// One branch of a guarded choice.
    Choice,
    /// Splits one token into parallel branch tokens.
    Fork,
    /// Consumes all branch tokens of a parallel region.
    Join,
    /// Carries the back-arc of a declared loop.
    Loop,
    /// Error-handler entry.
    Error,
    /// Fixed reverse action fired on the compensation path.
    Compensation,
    /// Action with a declared delay, recorded for the executor.
    Timer,
}

/// An action node. Fires by atomically consuming input tokens and
/// producing output tokens per arc weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Stable id, unique within the net.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_action")]
    pub kind: TransitionKind,
    /// Opaque guard expression. Absent means always enabled. Guards must
    /// be side-effect-free over the marking and net metadata; evaluation
    /// is delegated to a [`GuardEvaluator`](crate::GuardEvaluator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    /// Reference to the external side effect this transition performs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_ref: Option<String>,
    /// Higher fires first among simultaneously enabled transitions.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn is_action(kind: &TransitionKind) -> bool {
    *kind == TransitionKind::Action
}

fn is_zero(priority: &i32) -> bool {
    *priority == 0
}

impl Transition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind: TransitionKind::Action,
            guard: None,
            action_ref: None,
            priority: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: TransitionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn with_action_ref(mut self, action_ref: impl Into<String>) -> Self {
        self.action_ref = Some(action_ref.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
