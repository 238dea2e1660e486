//! Directed weighted edges between places and transitions.

use serde::{Deserialize, Serialize};

/// Firing semantics of an arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArcKind {
    /// Consumes `weight` tokens from the source (input) or produces
    /// `weight` tokens into the target (output).
    #[default]
    Normal,
    /// Input only: enabled while the source place holds fewer than
    /// `weight` tokens. Consumes nothing.
    Inhibitor,
    /// Input only: always satisfied, empties the source place on fire.
    Reset,
    /// Input only: requires `weight` tokens without consuming them.
    Read,
}

/// A directed weighted edge. The bipartite invariant (place-to-transition
/// or transition-to-place, never anything else) is checked by
/// [`PetriNet::structural_violations`](crate::PetriNet::structural_violations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arc {
    pub source: String,
    pub target: String,
    /// Token weight, at least 1.
    #[serde(default = "default_weight", skip_serializing_if = "is_default_weight")]
    pub weight: u64,
    #[serde(default, skip_serializing_if = "is_normal")]
    pub kind: ArcKind,
}

fn default_weight() -> u64 {
    1
}

fn is_default_weight(weight: &u64) -> bool {
    *weight == 1
}

fn is_normal(kind: &ArcKind) -> bool {
    *kind == ArcKind::Normal
}

impl Arc {
    /// Weight-1 normal arc.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight: 1,
            kind: ArcKind::Normal,
        }
    }

    pub fn with_weight(mut self, weight: u64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_kind(mut self, kind: ArcKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sort key for the canonical form: (source, target, kind).
    pub(crate) fn canonical_key(&self) -> (&str, &str, ArcKind) {
        (&self.source, &self.target, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weight_and_kind_are_implicit() {
        let arc = Arc::new("p1", "t1");
        let json = serde_json::to_value(&arc).unwrap();
        assert!(json.get("weight").is_none());
        assert!(json.get("kind").is_none());

        let parsed: Arc = serde_json::from_str(r#"{"source":"p1","target":"t1"}"#).unwrap();
        assert_eq!(parsed.weight, 1);
        assert_eq!(parsed.kind, ArcKind::Normal);
    }

    #[test]
    fn inhibitor_round_trips() {
        let arc = Arc::new("p1", "t1").with_weight(2).with_kind(ArcKind::Inhibitor);
        let json = serde_json::to_string(&arc).unwrap();
        assert_eq!(arc, serde_json::from_str(&json).unwrap());
    }
}
