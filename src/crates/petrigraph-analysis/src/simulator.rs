//! Token-flow simulation.
//!
//! The simulator fires one enabled transition per step under the
//! configured policy and records a [`TraceEvent`] per firing. It is a
//! blocking pure function: `Deterministic` runs are a function of the
//! net alone, `Random` runs of the net and the seed. Guards are
//! evaluated for real here (unlike the validator's permissive default),
//! so choice branches resolve the way they would in production.

use crate::observability::{NoopObservability, Observability};
use crate::trace::{
    SimulationError, SimulationMode, SimulationOutcome, SimulationStatus, SimulatorConfig,
    TraceEvent,
};
use petrigraph_net::{
    CancelFlag, DefaultGuardEvaluator, GuardEvaluator, Marking, NetError, PetriNet, PlaceKind,
    Transition,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

/// Derived terminal rule shared by the batch and interactive paths.
fn is_terminal(net: &PetriNet, marking: &Marking, quiescent: bool) -> bool {
    if !net.terminal_markings.is_empty() {
        return net.terminal_markings.iter().any(|m| m == marking);
    }
    quiescent
        && marking.nonzero().all(|(place, _)| {
            net.place(place)
                .map(|p| p.kind == PlaceKind::Sink)
                .unwrap_or(false)
        })
}

fn guard_failure(error: NetError) -> SimulationStatus {
    match error {
        NetError::Guard { transition, source } => SimulationStatus::Error {
            message: source.to_string(),
            transition_id: Some(transition),
        },
        other => SimulationStatus::Error {
            message: other.to_string(),
            transition_id: None,
        },
    }
}

/// Batch simulator for the deterministic and random modes.
pub struct Simulator<'a> {
    config: SimulatorConfig,
    evaluator: &'a dyn GuardEvaluator,
    observability: &'a dyn Observability,
}

impl<'a> Simulator<'a> {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            evaluator: &DefaultGuardEvaluator,
            observability: &NoopObservability,
        }
    }

    pub fn with_evaluator(mut self, evaluator: &'a dyn GuardEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_observability(mut self, observability: &'a dyn Observability) -> Self {
        self.observability = observability;
        self
    }

    pub fn run(&self, net: &PetriNet) -> Result<SimulationOutcome, SimulationError> {
        self.run_with_cancel(net, &CancelFlag::new())
    }

    /// Run to completion, checking the cancellation flag between steps.
    /// A cancelled run returns `Cancelled` with the partial trace
    /// intact.
    pub fn run_with_cancel(
        &self,
        net: &PetriNet,
        cancel: &CancelFlag,
    ) -> Result<SimulationOutcome, SimulationError> {
        self.config.validate()?;
        if self.config.mode == SimulationMode::Interactive {
            return Err(SimulationError::InteractiveMode);
        }
        let mut rng = self.config.seed.map(StdRng::seed_from_u64);

        let started = Instant::now();
        let mut marking = net.initial_marking.clone();
        let mut trace = Vec::new();
        let mut steps = 0u64;

        let status = loop {
            if cancel.is_cancelled() {
                break SimulationStatus::Cancelled;
            }
            if let Some(budget) = self.config.max_time_ms {
                if started.elapsed().as_millis() as u64 >= budget {
                    break SimulationStatus::Timeout;
                }
            }

            let enabled = match net.enabled_transitions(&marking, self.evaluator) {
                Ok(enabled) => enabled,
                Err(error) => break guard_failure(error),
            };

            if self.config.stop_on_terminal && is_terminal(net, &marking, enabled.is_empty()) {
                break SimulationStatus::Completed;
            }
            if enabled.is_empty() {
                break if is_terminal(net, &marking, true) {
                    SimulationStatus::Completed
                } else {
                    SimulationStatus::Deadlock
                };
            }
            if steps >= self.config.max_steps {
                break SimulationStatus::MaxStepsReached;
            }

            let chosen = match self.config.mode {
                SimulationMode::Deterministic => pick_deterministic(&enabled),
                SimulationMode::Random => {
                    // validate() guarantees the rng exists in this mode.
                    let rng = rng.as_mut().expect("seeded rng");
                    enabled[rng.gen_range(0..enabled.len())]
                }
                SimulationMode::Interactive => unreachable!("rejected above"),
            };

            let next = match net.fire(&chosen.id, &marking, self.evaluator) {
                Ok(next) => next,
                Err(error) => break guard_failure(error),
            };
            if self.config.trace_events {
                trace.push(TraceEvent {
                    step_index: steps,
                    transition_id: chosen.id.clone(),
                    pre_marking: marking.clone(),
                    post_marking: next.clone(),
                    timestamp_offset_ms: started.elapsed().as_millis() as u64,
                });
            }
            self.observability.counter("simulator.steps", 1);
            tracing::trace!(step = steps, transition = %chosen.id, "fired");
            marking = next;
            steps += 1;

            if self.config.step_delay_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(self.config.step_delay_ms));
            }
        };

        Ok(SimulationOutcome {
            status,
            steps,
            trace,
            final_marking: marking,
        })
    }
}

/// Highest priority wins; ties break on lexicographic id. `enabled` is
/// already id-sorted, so the first maximum is the winner.
fn pick_deterministic<'t>(enabled: &[&'t Transition]) -> &'t Transition {
    enabled
        .iter()
        .copied()
        .max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.id.cmp(&a.id))
        })
        .expect("caller checked non-empty")
}

/// A suspended simulation waiting for an external party to choose each
/// firing. Invalid choices are rejected with a typed error and leave
/// the session suspended and unchanged.
pub struct InteractiveSimulation<'a> {
    net: &'a PetriNet,
    evaluator: &'a dyn GuardEvaluator,
    config: SimulatorConfig,
    marking: Marking,
    trace: Vec<TraceEvent>,
    steps: u64,
    started: Instant,
    settled: Option<SimulationStatus>,
}

impl<'a> InteractiveSimulation<'a> {
    pub fn new(net: &'a PetriNet, config: SimulatorConfig) -> Self {
        Self {
            net,
            evaluator: &DefaultGuardEvaluator,
            config,
            marking: net.initial_marking.clone(),
            trace: Vec::new(),
            steps: 0,
            started: Instant::now(),
            settled: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: &'a dyn GuardEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn marking(&self) -> &Marking {
        &self.marking
    }

    /// Transitions currently offered to the caller, id-sorted.
    pub fn enabled(&self) -> Result<Vec<&'a Transition>, SimulationError> {
        self.net
            .enabled_transitions(&self.marking, self.evaluator)
            .map_err(|error| match error {
                NetError::Guard { transition, source } => {
                    SimulationError::Guard { transition, source }
                }
                other => SimulationError::Guard {
                    transition: String::new(),
                    source: petrigraph_net::GuardError::Evaluation {
                        expr: String::new(),
                        message: other.to_string(),
                    },
                },
            })
    }

    /// Fire the named transition. Rejects unknown or disabled choices
    /// without advancing the session.
    pub fn choose_fire(&mut self, transition_id: &str) -> Result<&TraceEvent, SimulationError> {
        if self.settled.is_some() {
            return Err(SimulationError::SessionClosed);
        }
        if self.net.transition(transition_id).is_none() {
            return Err(SimulationError::UnknownTransition(transition_id.to_string()));
        }
        let next = match self.net.fire(transition_id, &self.marking, self.evaluator) {
            Ok(next) => next,
            Err(NetError::NotEnabled(id)) => return Err(SimulationError::NotEnabled(id)),
            Err(NetError::Guard { transition, source }) => {
                return Err(SimulationError::Guard { transition, source })
            }
            Err(other) => {
                return Err(SimulationError::Guard {
                    transition: transition_id.to_string(),
                    source: petrigraph_net::GuardError::Evaluation {
                        expr: String::new(),
                        message: other.to_string(),
                    },
                })
            }
        };

        let event = TraceEvent {
            step_index: self.steps,
            transition_id: transition_id.to_string(),
            pre_marking: self.marking.clone(),
            post_marking: next.clone(),
            timestamp_offset_ms: self.started.elapsed().as_millis() as u64,
        };
        self.marking = next;
        self.steps += 1;
        self.trace.push(event);

        // Settle the session if the firing ended the run.
        let enabled_empty = self
            .enabled()
            .map(|enabled| enabled.is_empty())
            .unwrap_or(false);
        if self.config.stop_on_terminal && is_terminal(self.net, &self.marking, enabled_empty) {
            self.settled = Some(SimulationStatus::Completed);
        } else if enabled_empty {
            self.settled = Some(SimulationStatus::Deadlock);
        } else if self.steps >= self.config.max_steps {
            self.settled = Some(SimulationStatus::MaxStepsReached);
        }

        Ok(self.trace.last().expect("just pushed"))
    }

    pub fn status(&self) -> Option<&SimulationStatus> {
        self.settled.as_ref()
    }

    /// Close the session. An unsettled session counts as cancelled by
    /// the caller; the partial trace is preserved either way.
    pub fn into_outcome(self) -> SimulationOutcome {
        let trace = if self.config.trace_events {
            self.trace
        } else {
            Vec::new()
        };
        SimulationOutcome {
            status: self.settled.unwrap_or(SimulationStatus::Cancelled),
            steps: self.steps,
            trace,
            final_marking: self.marking,
        }
    }
}
