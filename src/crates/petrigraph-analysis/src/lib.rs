//! # petrigraph-analysis - Formal Validation and Simulation
//!
//! The two read-only analyses that run against a compiled net:
//!
//! - **Validator**: bounded exploration of the reachability graph that
//!   decides structural soundness, deadlock freedom, reachability of a
//!   terminal marking, transition liveness and boundedness, producing
//!   counter-example witnesses (concrete firing sequences) on failure.
//! - **Simulator**: deterministic, seeded-random or interactive firing
//!   of enabled transitions, yielding an observable trace.
//!
//! Both are blocking, CPU-bound, deterministic pure functions over the
//! net. They never spawn threads; concurrency lives solely in the DAG
//! executor. Long runs are bounded by explicit budgets (marking count,
//! wall clock) and honor a cooperative
//! [`CancelFlag`](petrigraph_net::CancelFlag) between units of work.
//!
//! ## Verdicts
//!
//! A validation ends in exactly one of:
//!
//! - `Pass` - every requested check held; carries the witness firing
//!   sequence to a terminal marking when one was found
//! - `Fail` - a check failed; carries the failure kind, a human-readable
//!   diagnostic and a witness where the engine computed one. When
//!   several checks fail, the most severe wins: structural over
//!   deadlock over boundedness over reachability over liveness.
//! - `Inconclusive` - a budget ran out first; carries the partial stats
//!   and the reason (k-bound exhausted, timeout, cancelled)
//!
//! A `Fail` verdict is a perfectly good analytical result, not an
//! error; only budget exhaustion is surfaced as incomplete.

pub mod observability;
pub mod simulator;
pub mod trace;
pub mod validator;
pub mod verdict;

pub use observability::{NoopObservability, Observability};
pub use simulator::{InteractiveSimulation, Simulator};
pub use trace::{
    SimulationError, SimulationMode, SimulationOutcome, SimulationStatus, SimulatorConfig,
    TraceEvent,
};
pub use validator::{SearchStrategy, Validator, ValidatorConfig};
pub use verdict::{
    CheckKind, ExplorationPhase, Failure, InconclusiveReason, SearchStats, Verdict, Witness,
};
