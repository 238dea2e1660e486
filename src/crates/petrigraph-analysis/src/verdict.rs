//! Verdict grammar for validations.

use petrigraph_net::{Marking, StructuralViolation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The individual checks a validation can run. Declaration order is
/// severity order: when several checks fail in the same run, the
/// smallest variant wins the verdict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckKind {
    Structural,
    Deadlock,
    Boundedness,
    Reachability,
    Liveness,
}

impl CheckKind {
    pub fn all() -> Vec<CheckKind> {
        vec![
            CheckKind::Structural,
            CheckKind::Deadlock,
            CheckKind::Boundedness,
            CheckKind::Reachability,
            CheckKind::Liveness,
        ]
    }
}

/// A concrete firing sequence exhibiting a property, from the initial
/// marking to `final_marking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Witness {
    pub firing_sequence: Vec<String>,
    pub final_marking: Marking,
}

/// A failed check with diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: CheckKind,
    /// Human-readable explanation, always present alongside the machine
    /// kind.
    pub diagnostic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,
    /// For structural failures, the full violation list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<StructuralViolation>,
    /// For liveness failures, the transitions that never fired.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dead_transitions: Vec<String>,
}

/// Why a validation could not reach a conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconclusiveReason {
    KBoundExhausted,
    Timeout,
    Cancelled,
}

/// Lifecycle of one exploration. `Budgeted` always yields an
/// inconclusive verdict unless a conclusive failure witness was already
/// in hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExplorationPhase {
    #[default]
    New,
    Running,
    Done,
    Budgeted,
}

/// Counters accumulated while exploring, reported with every verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub distinct_markings: u64,
    pub transitions_fired: u64,
    pub max_tokens_observed: u64,
    pub elapsed_ms: u64,
    pub phase: ExplorationPhase,
}

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass {
        stats: SearchStats,
        /// Firing sequence to a terminal marking, when reachability ran
        /// and found one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        terminal_witness: Option<Witness>,
    },
    Fail {
        #[serde(flatten)]
        failure: Failure,
        stats: SearchStats,
    },
    Inconclusive {
        reason: InconclusiveReason,
        stats: SearchStats,
    },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }

    pub fn stats(&self) -> &SearchStats {
        match self {
            Verdict::Pass { stats, .. }
            | Verdict::Fail { stats, .. }
            | Verdict::Inconclusive { stats, .. } => stats,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass { stats, .. } => {
                write!(f, "PASS ({} markings)", stats.distinct_markings)
            }
            Verdict::Fail { failure, .. } => {
                write!(f, "FAIL[{:?}]: {}", failure.kind, failure.diagnostic)
            }
            Verdict::Inconclusive { reason, stats } => write!(
                f,
                "INCONCLUSIVE[{:?}] after {} markings",
                reason, stats.distinct_markings
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_matches_declaration_order() {
        assert!(CheckKind::Structural < CheckKind::Deadlock);
        assert!(CheckKind::Deadlock < CheckKind::Boundedness);
        assert!(CheckKind::Boundedness < CheckKind::Reachability);
        assert!(CheckKind::Reachability < CheckKind::Liveness);
    }

    #[test]
    fn verdict_serializes_with_status_tag() {
        let verdict = Verdict::Inconclusive {
            reason: InconclusiveReason::KBoundExhausted,
            stats: SearchStats::default(),
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "INCONCLUSIVE");
        assert_eq!(json["reason"], "K_BOUND_EXHAUSTED");
    }
}
