//! Bounded reachability search and the soundness checks built on it.
//!
//! Starting from the initial marking, the validator explores the
//! reachability graph breadth-first (or depth-first), canonicalizing
//! each visited marking into a seen-set and remembering, per marking,
//! the predecessor and firing that produced it. Witnesses are
//! reconstructed by walking that predecessor chain back to the root.
//!
//! Budgets make the search total: a hard cap on distinct markings, a
//! wall-clock limit and a cooperative cancellation flag, all checked
//! between marking expansions. Running out of budget yields an
//! `Inconclusive` verdict unless a conclusive failure witness was
//! already in hand.
//!
//! Guards are evaluated permissively by default so the whole state
//! space is covered regardless of runtime metadata; callers may inject
//! a stricter evaluator.

use crate::observability::{NoopObservability, Observability};
use crate::verdict::{
    CheckKind, ExplorationPhase, Failure, InconclusiveReason, SearchStats, Verdict, Witness,
};
use petrigraph_net::{
    CancelFlag, GuardEvaluator, Marking, PermissiveGuardEvaluator, PetriNet, PlaceKind,
    TransitionIo,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Instant;

/// Frontier discipline for the exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStrategy {
    #[default]
    Bfs,
    Dfs,
}

/// Validation budgets and check selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Hard cap on distinct markings explored.
    #[serde(default = "default_k_bound")]
    pub k_bound: u64,
    /// Wall-clock budget for the whole search.
    #[serde(default = "default_max_time_ms")]
    pub max_time_ms: u64,
    /// Per-place token cap used to call a net unbounded.
    #[serde(default = "default_capacity_cap")]
    pub capacity_cap: u64,
    #[serde(default)]
    pub strategy: SearchStrategy,
    /// Which checks to run. Defaults to all of them.
    #[serde(default = "default_checks")]
    pub checks: BTreeSet<CheckKind>,
}

fn default_k_bound() -> u64 {
    200
}

fn default_max_time_ms() -> u64 {
    30_000
}

fn default_capacity_cap() -> u64 {
    1_000
}

fn default_checks() -> BTreeSet<CheckKind> {
    CheckKind::all().into_iter().collect()
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            k_bound: default_k_bound(),
            max_time_ms: default_max_time_ms(),
            capacity_cap: default_capacity_cap(),
            strategy: SearchStrategy::Bfs,
            checks: default_checks(),
        }
    }
}

type TerminalPredicate<'a> = Box<dyn Fn(&Marking) -> bool + Send + Sync + 'a>;

/// The formal validator. Construct with a config, optionally swap the
/// guard evaluator, observability sink or terminal predicate, then run
/// [`validate`](Validator::validate) against any number of nets.
pub struct Validator<'a> {
    config: ValidatorConfig,
    evaluator: &'a dyn GuardEvaluator,
    observability: &'a dyn Observability,
    terminal_predicate: Option<TerminalPredicate<'a>>,
}

impl<'a> Validator<'a> {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            evaluator: &PermissiveGuardEvaluator,
            observability: &NoopObservability,
            terminal_predicate: None,
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

    /// Override the terminal-marking decision entirely.
    pub fn with_terminal_predicate(
        mut self,
        predicate: impl Fn(&Marking) -> bool + Send + Sync + 'a,
    ) -> Self {
        self.terminal_predicate = Some(Box::new(predicate));
        self
    }

    pub fn validate(&self, net: &PetriNet) -> Verdict {
        self.validate_with_cancel(net, &CancelFlag::new())
    }

    pub fn validate_with_cancel(&self, net: &PetriNet, cancel: &CancelFlag) -> Verdict {
        let started = Instant::now();
        let checks = &self.config.checks;
        let mut stats = SearchStats {
            phase: ExplorationPhase::New,
            ..SearchStats::default()
        };

        if checks.contains(&CheckKind::Structural) {
            let violations = net.structural_violations();
            if !violations.is_empty() {
                stats.phase = ExplorationPhase::Done;
                stats.elapsed_ms = started.elapsed().as_millis() as u64;
                let diagnostic = format!(
                    "net breaks {} structural invariant(s): {}",
                    violations.len(),
                    violations
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join("; ")
                );
                return Verdict::Fail {
                    failure: Failure {
                        kind: CheckKind::Structural,
                        diagnostic,
                        witness: None,
                        violations,
                        dead_transitions: Vec::new(),
                    },
                    stats,
                };
            }
        }

        if self.config.k_bound == 0 {
            stats.phase = ExplorationPhase::Budgeted;
            stats.elapsed_ms = started.elapsed().as_millis() as u64;
            return Verdict::Inconclusive {
                reason: InconclusiveReason::KBoundExhausted,
                stats,
            };
        }

        let search = self.explore(net, cancel, started, &mut stats);
        self.decide(net, search, stats)
    }

    fn explore(
        &self,
        net: &PetriNet,
        cancel: &CancelFlag,
        started: Instant,
        stats: &mut SearchStats,
    ) -> SearchOutcome {
        let io_map = net.io_map();
        let mut order: Vec<&str> = net.transitions.iter().map(|t| t.id.as_str()).collect();
        order.sort_unstable();

        let mut markings: Vec<Marking> = vec![net.initial_marking.clone()];
        let mut seen: HashMap<Marking, usize> = HashMap::new();
        seen.insert(net.initial_marking.clone(), 0);
        let mut predecessors: Vec<Option<(usize, String)>> = vec![None];
        let mut frontier: VecDeque<usize> = VecDeque::from([0]);

        let mut outcome = SearchOutcome::default();
        self.track_tokens(&net.initial_marking, 0, stats, &mut outcome);
        stats.phase = ExplorationPhase::Running;

        while let Some(current) = match self.config.strategy {
            SearchStrategy::Bfs => frontier.pop_front(),
            SearchStrategy::Dfs => frontier.pop_back(),
        } {
            if cancel.is_cancelled() {
                outcome.budget = Some(InconclusiveReason::Cancelled);
                break;
            }
            if started.elapsed().as_millis() as u64 >= self.config.max_time_ms {
                outcome.budget = Some(InconclusiveReason::Timeout);
                break;
            }

            let marking = markings[current].clone();
            self.observability.counter("validator.markings_expanded", 1);

            let mut enabled: Vec<&str> = Vec::new();
            for &tid in &order {
                match net.is_enabled_with_io(tid, &io_map[tid], &marking, self.evaluator) {
                    Ok(true) => enabled.push(tid),
                    Ok(false) => {}
                    Err(error) => {
                        // An erroring guard cannot enable its transition.
                        tracing::warn!(transition = tid, %error, "guard evaluation failed during search");
                    }
                }
            }

            if enabled.is_empty() {
                if self.marking_is_terminal(net, &marking, true) {
                    outcome.terminal.get_or_insert(current);
                } else {
                    outcome.deadlock.get_or_insert(current);
                }
                continue;
            }
            if self.marking_is_terminal(net, &marking, false) {
                outcome.terminal.get_or_insert(current);
            }

            for tid in enabled {
                outcome.fired.insert(tid.to_string());
                stats.transitions_fired += 1;
                self.observability.counter("validator.transitions_fired", 1);
                let successor = match net.fire_io(tid, &io_map[tid], &marking, self.evaluator) {
                    Ok(successor) => successor,
                    Err(error) => {
                        tracing::warn!(transition = tid, %error, "firing failed during search");
                        continue;
                    }
                };
                if seen.contains_key(&successor) {
                    continue;
                }
                if markings.len() as u64 >= self.config.k_bound {
                    outcome.budget = Some(InconclusiveReason::KBoundExhausted);
                    break;
                }
                let successor_id = markings.len();
                seen.insert(successor.clone(), successor_id);
                predecessors.push(Some((current, tid.to_string())));
                self.track_tokens(&successor, successor_id, stats, &mut outcome);
                markings.push(successor);
                frontier.push_back(successor_id);
            }
            if outcome.budget.is_some() {
                break;
            }
        }

        stats.distinct_markings = markings.len() as u64;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        stats.phase = if outcome.budget.is_some() {
            ExplorationPhase::Budgeted
        } else {
            ExplorationPhase::Done
        };
        outcome.markings = markings;
        outcome.predecessors = predecessors;
        outcome
    }

    fn track_tokens(
        &self,
        marking: &Marking,
        marking_id: usize,
        stats: &mut SearchStats,
        outcome: &mut SearchOutcome,
    ) {
        for (place, tokens) in marking.nonzero() {
            stats.max_tokens_observed = stats.max_tokens_observed.max(tokens);
            let entry = outcome.max_tokens.entry(place.to_string()).or_insert(0);
            *entry = (*entry).max(tokens);
            if tokens > self.config.capacity_cap && outcome.unbounded.is_none() {
                outcome.unbounded = Some((place.to_string(), marking_id));
            }
        }
    }

    /// Declared terminal markings and the predicate override count even
    /// while transitions remain enabled; the derived sink-only rule
    /// additionally requires quiescence.
    fn marking_is_terminal(&self, net: &PetriNet, marking: &Marking, quiescent: bool) -> bool {
        if let Some(predicate) = &self.terminal_predicate {
            return predicate(marking);
        }
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

    /// Apply the severity ladder: deadlock, then boundedness, then the
    /// budget, then reachability, then liveness.
    fn decide(&self, net: &PetriNet, search: SearchOutcome, stats: SearchStats) -> Verdict {
        let checks = &self.config.checks;

        if checks.contains(&CheckKind::Deadlock) {
            if let Some(marking_id) = search.deadlock {
                let witness = search.witness(marking_id);
                let diagnostic = format!(
                    "deadlock after [{}]: marking {} enables no transition and is not terminal",
                    witness.firing_sequence.join(", "),
                    witness.final_marking
                );
                return Verdict::Fail {
                    failure: Failure {
                        kind: CheckKind::Deadlock,
                        diagnostic,
                        witness: Some(witness),
                        violations: Vec::new(),
                        dead_transitions: Vec::new(),
                    },
                    stats,
                };
            }
        }

        if checks.contains(&CheckKind::Boundedness) {
            if let Some((place, marking_id)) = &search.unbounded {
                let witness = search.witness(*marking_id);
                let diagnostic = format!(
                    "place '{}' exceeded the capacity cap of {} tokens; the net is unbounded",
                    place, self.config.capacity_cap
                );
                return Verdict::Fail {
                    failure: Failure {
                        kind: CheckKind::Boundedness,
                        diagnostic,
                        witness: Some(witness),
                        violations: Vec::new(),
                        dead_transitions: Vec::new(),
                    },
                    stats,
                };
            }
        }

        if let Some(reason) = search.budget {
            return Verdict::Inconclusive { reason, stats };
        }

        if checks.contains(&CheckKind::Reachability) && search.terminal.is_none() {
            let diagnostic = format!(
                "search completed over {} marking(s) without reaching a terminal marking",
                stats.distinct_markings
            );
            return Verdict::Fail {
                failure: Failure {
                    kind: CheckKind::Reachability,
                    diagnostic,
                    witness: None,
                    violations: Vec::new(),
                    dead_transitions: Vec::new(),
                },
                stats,
            };
        }

        if checks.contains(&CheckKind::Liveness) {
            let dead: Vec<String> = {
                let mut dead: Vec<String> = net
                    .transitions
                    .iter()
                    .filter(|t| !search.fired.contains(&t.id))
                    .map(|t| t.id.clone())
                    .collect();
                dead.sort_unstable();
                dead
            };
            if !dead.is_empty() {
                let shortfalls: Vec<String> = dead
                    .iter()
                    .map(|tid| search.input_shortfall(net, tid))
                    .collect();
                return Verdict::Fail {
                    failure: Failure {
                        kind: CheckKind::Liveness,
                        diagnostic: format!(
                            "{} transition(s) never fired: {}",
                            dead.len(),
                            shortfalls.join("; ")
                        ),
                        witness: None,
                        violations: Vec::new(),
                        dead_transitions: dead,
                    },
                    stats,
                };
            }
        }

        let terminal_witness = search
            .terminal
            .filter(|_| checks.contains(&CheckKind::Reachability))
            .map(|id| search.witness(id));
        Verdict::Pass {
            stats,
            terminal_witness,
        }
    }
}

/// Everything the exploration learned, kept separate from the verdict
/// decision so the severity ladder stays readable.
#[derive(Default)]
struct SearchOutcome {
    markings: Vec<Marking>,
    predecessors: Vec<Option<(usize, String)>>,
    fired: BTreeSet<String>,
    max_tokens: HashMap<String, u64>,
    deadlock: Option<usize>,
    terminal: Option<usize>,
    unbounded: Option<(String, usize)>,
    budget: Option<InconclusiveReason>,
}

impl SearchOutcome {
    /// Reconstruct the firing sequence from the initial marking to the
    /// given one by walking the predecessor chain.
    fn witness(&self, marking_id: usize) -> Witness {
        let mut sequence = Vec::new();
        let mut current = marking_id;
        while let Some((previous, transition)) = &self.predecessors[current] {
            sequence.push(transition.clone());
            current = *previous;
        }
        sequence.reverse();
        Witness {
            firing_sequence: sequence,
            final_marking: self.markings[marking_id].clone(),
        }
    }

    /// Explain why a transition never fired by comparing each input
    /// requirement against the maximum token count ever observed there.
    fn input_shortfall(&self, net: &PetriNet, transition_id: &str) -> String {
        let io: TransitionIo<'_> = net.transition_io(transition_id);
        let mut parts = Vec::new();
        for arc in &io.inputs {
            let seen = self.max_tokens.get(arc.source.as_str()).copied().unwrap_or(0);
            match arc.kind {
                petrigraph_net::ArcKind::Normal | petrigraph_net::ArcKind::Read => {
                    if seen < arc.weight {
                        parts.push(format!(
                            "needs {} token(s) at '{}' but at most {} ever arrived",
                            arc.weight, arc.source, seen
                        ));
                    }
                }
                petrigraph_net::ArcKind::Inhibitor => {
                    if seen >= arc.weight {
                        parts.push(format!(
                            "requires fewer than {} token(s) at '{}'",
                            arc.weight, arc.source
                        ));
                    }
                }
                petrigraph_net::ArcKind::Reset => {}
            }
        }
        if parts.is_empty() {
            format!("'{transition_id}' never fired")
        } else {
            format!("'{}' never fired ({})", transition_id, parts.join(", "))
        }
    }
}
