//! Simulation configuration, trace events and outcomes.

use petrigraph_net::{GuardError, Marking};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the simulator picks among enabled transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationMode {
    /// Highest priority first, ties broken by lexicographic transition
    /// id. No randomness anywhere.
    #[default]
    Deterministic,
    /// Uniform choice over enabled transitions from a seeded PRNG; the
    /// same seed on the same net reproduces the same trace.
    Random,
    /// An external caller picks each firing through
    /// [`InteractiveSimulation`](crate::InteractiveSimulation).
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub mode: SimulationMode,
    /// Required when `mode` is `Random`, ignored otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
    /// Pacing delay between steps, for observation.
    #[serde(default)]
    pub step_delay_ms: u64,
    /// Optional wall-clock budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub trace_events: bool,
    #[serde(default = "default_true")]
    pub stop_on_terminal: bool,
}

fn default_max_steps() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::Deterministic,
            seed: None,
            max_steps: default_max_steps(),
            step_delay_ms: 0,
            max_time_ms: None,
            trace_events: true,
            stop_on_terminal: true,
        }
    }
}

impl SimulatorConfig {
    /// Reject configurations that cannot produce a reproducible run.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.mode == SimulationMode::Random && self.seed.is_none() {
            return Err(SimulationError::SeedRequired);
        }
        Ok(())
    }
}

/// One firing, with the markings on either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub step_index: u64,
    pub transition_id: String,
    pub pre_marking: Marking,
    pub post_marking: Marking,
    pub timestamp_offset_ms: u64,
}

/// Why a simulation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    /// Reached a terminal marking.
    Completed,
    /// No transition enabled in a non-terminal marking.
    Deadlock,
    MaxStepsReached,
    Timeout,
    Cancelled,
    /// A runtime failure, typically guard evaluation; carries the
    /// offending transition when known.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transition_id: Option<String>,
    },
}

/// The full result of a run: status, step count, trace (empty when
/// trace recording was disabled) and the marking the net stopped in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    #[serde(flatten)]
    pub status: SimulationStatus,
    pub steps: u64,
    pub trace: Vec<TraceEvent>,
    pub final_marking: Marking,
}

/// Typed failures surfaced to the caller rather than recorded in the
/// outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("random mode requires a seed for reproducibility")]
    SeedRequired,

    #[error("interactive mode must be driven through an interactive session")]
    InteractiveMode,

    #[error("unknown transition '{0}'")]
    UnknownTransition(String),

    #[error("transition '{0}' is not enabled in the current marking")]
    NotEnabled(String),

    #[error("simulation already finished")]
    SessionClosed,

    #[error("guard on transition '{transition}' failed: {source}")]
    Guard {
        transition: String,
        #[source]
        source: GuardError,
    },
}
