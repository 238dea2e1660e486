//! State-holding nodes of a Petri net.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role of a place within the net.
///
/// The kind does not change firing semantics. It records what the grammar
/// compiler intended the place for, and the projector uses `Decision` to
/// annotate choice surfaces in projection notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaceKind {
    #[default]
    Normal,
    /// Entry place that receives the initial token.
    Source,
    /// Terminal place; a derived terminal marking leaves tokens only here.
    Sink,
    /// Pre-place of a choice whose outgoing transitions carry disjoint guards.
    Decision,
}

/// A state-holding node. Holds a non-negative token count at runtime
/// (tracked by [`Marking`](crate::Marking), not by the place itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    /// Stable id, unique within the net.
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_normal")]
    pub kind: PlaceKind,
    /// Maximum tokens the place may hold. `None` means unbounded.
    /// Must be at least 1 when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn is_normal(kind: &PlaceKind) -> bool {
    *kind == PlaceKind::Normal
}

impl Place {
    /// Create a plain place with no capacity bound.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind: PlaceKind::Normal,
            capacity: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: PlaceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
