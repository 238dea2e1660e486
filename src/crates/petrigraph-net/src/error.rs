//! Error types for net construction and firing.

use crate::guard::GuardError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result type using [`NetError`].
pub type Result<T> = std::result::Result<T, NetError>;

/// A single structural rule broken by a net. The structural validator
/// returns all violations at once rather than stopping at the first.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructuralViolation {
    /// Arc connects two places or two transitions.
    #[error("arc {from} -> {target} is not bipartite")]
    NonBipartiteArc { from: String, target: String },

    /// Arc endpoint names a node that does not exist.
    #[error("arc {from} -> {target} references unknown node '{missing}'")]
    UnknownEndpoint {
        from: String,
        target: String,
        missing: String,
    },

    /// The same id is used by more than one place or transition.
    #[error("duplicate id '{id}'")]
    DuplicateId { id: String },

    /// Initial marking puts tokens on an undeclared place.
    #[error("initial marking references unknown place '{place}'")]
    UnknownMarkedPlace { place: String },

    /// A transition with no input arc would be spontaneously enabled
    /// forever, which is a grammar error.
    #[error("transition '{transition}' has no input arc")]
    TransitionWithoutInput { transition: String },

    /// Declared capacity below 1.
    #[error("place '{place}' declares capacity {capacity}, minimum is 1")]
    InvalidCapacity { place: String, capacity: u64 },

    /// Arc weight below 1.
    #[error("arc {from} -> {target} declares weight 0, minimum is 1")]
    InvalidArcWeight { from: String, target: String },

    /// An inhibitor, reset or read arc used as a transition output.
    #[error("arc {from} -> {target} uses an input-only arc kind on an output")]
    InputOnlyArcKindOnOutput { from: String, target: String },
}

/// Errors from net operations.
#[derive(Debug, Error)]
pub enum NetError {
    /// The net breaks one or more structural invariants.
    #[error("net is structurally invalid: {}", format_violations(.0))]
    Structural(Vec<StructuralViolation>),

    #[error("unknown transition '{0}'")]
    UnknownTransition(String),

    #[error("unknown place '{0}'")]
    UnknownPlace(String),

    /// Attempt to fire a transition that is not enabled in the given
    /// marking.
    #[error("transition '{0}' is not enabled")]
    NotEnabled(String),

    /// Guard evaluation failed; the transition id is carried so callers
    /// can surface it.
    #[error("guard on transition '{transition}' failed: {source}")]
    Guard {
        transition: String,
        #[source]
        source: GuardError,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_violations(violations: &[StructuralViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
