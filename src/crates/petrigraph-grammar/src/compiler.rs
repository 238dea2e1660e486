//! Step fragments and dependency stitching.
//!
//! Each step compiles to a small net fragment; fragments connect by
//! having a step's transitions consume the output places of its
//! dependencies. Steps without dependencies get a `pre_` place holding
//! one token in the initial marking.

use crate::error::{GrammarError, Result};
use crate::intent::{IntentSpec, IntentStep, StepKind};
use crate::naming;
use petrigraph_net::{
    Arc, LoopBackArc, Marking, NetMetadata, PetriNet, Place, PlaceKind, Transition,
    TransitionKind, SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

/// Diagnostics emitted while compiling, returned alongside the net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "note", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildNote {
    StepCompiled {
        step: String,
        transitions: Vec<String>,
    },
    SourcePlace {
        place: String,
    },
    SinkPlace {
        place: String,
    },
    SyncResolved {
        sync: String,
        parallel: String,
    },
    LoopBackRecorded {
        transition: String,
        places: Vec<String>,
    },
    ErrorRouted {
        handler: String,
        handled: String,
    },
}

impl fmt::Display for BuildNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildNote::StepCompiled { step, transitions } => {
                write!(f, "step '{}' compiled to [{}]", step, transitions.join(", "))
            }
            BuildNote::SourcePlace { place } => write!(f, "source place '{place}'"),
            BuildNote::SinkPlace { place } => write!(f, "sink place '{place}'"),
            BuildNote::SyncResolved { sync, parallel } => {
                write!(f, "sync '{sync}' joins parallel '{parallel}'")
            }
            BuildNote::LoopBackRecorded { transition, places } => {
                write!(f, "loop back edge '{}' -> [{}]", transition, places.join(", "))
            }
            BuildNote::ErrorRouted { handler, handled } => {
                write!(f, "errors of '{handled}' route to handler '{handler}'")
            }
        }
    }
}

/// The compiler's output: an immutable, structurally valid net plus the
/// notes accumulated while assembling it.
#[derive(Debug, Clone)]
pub struct BuildProduct {
    pub net: PetriNet,
    pub notes: Vec<BuildNote>,
}

/// Compile an intent specification into a Petri net.
///
/// Fails with a typed [`GrammarError`] on any grammar conflict; the net
/// that comes back has already passed structural validation.
pub fn compile(intent: &IntentSpec) -> Result<BuildProduct> {
    intent.validate()?;
    Compilation::new(intent).run()
}

struct Compilation<'a> {
    intent: &'a IntentSpec,
    steps_by_id: HashMap<&'a str, &'a IntentStep>,
    places: Vec<Place>,
    transitions: Vec<Transition>,
    arcs: Vec<Arc>,
    initial_marking: Marking,
    loop_backs: Vec<(String, String)>,
    notes: Vec<BuildNote>,
}

impl<'a> Compilation<'a> {
    fn new(intent: &'a IntentSpec) -> Self {
        Self {
            intent,
            steps_by_id: intent.steps.iter().map(|s| (s.id.as_str(), s)).collect(),
            places: Vec::new(),
            transitions: Vec::new(),
            arcs: Vec::new(),
            initial_marking: Marking::new(),
            loop_backs: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn run(mut self) -> Result<BuildProduct> {
        let intent = self.intent;
        for step in &intent.steps {
            self.compile_step(step)?;
        }
        self.mark_decision_places();
        self.mark_source_and_sink_places();

        let net = PetriNet {
            places: self.places,
            transitions: self.transitions,
            arcs: self.arcs,
            initial_marking: self.initial_marking,
            terminal_markings: Vec::new(),
            loop_back_arcs: self
                .loop_backs
                .into_iter()
                .map(|(transition, place)| LoopBackArc { transition, place })
                .collect(),
            metadata: NetMetadata {
                schema_version: SCHEMA_VERSION.to_string(),
                origin_intent: Some(self.intent.name.clone()),
                context: BTreeMap::new(),
            },
        };
        net.validate_structure()?;
        tracing::debug!(
            intent = %self.intent.name,
            places = net.places.len(),
            transitions = net.transitions.len(),
            "compiled intent"
        );
        Ok(BuildProduct {
            net,
            notes: self.notes,
        })
    }

    /// Places a step's transitions consume. Steps without dependencies
    /// (error handlers excepted) own a token-carrying `pre_` place.
    fn input_places(&mut self, step: &IntentStep) -> Result<Vec<String>> {
        if step.dependencies.is_empty() {
            if step.kind == StepKind::Error {
                return Ok(Vec::new());
            }
            let pre = naming::pre_place(&step.id);
            if !self.places.iter().any(|p| p.id == pre) {
                self.places
                    .push(Place::new(&pre, format!("before {}", step.id)));
                self.initial_marking.set(pre.clone(), 1);
            }
            return Ok(vec![pre]);
        }
        let mut inputs = Vec::new();
        for dependency in &step.dependencies {
            let dep = self.steps_by_id[dependency.as_str()];
            if dep.kind == StepKind::Parallel {
                let index = dep
                    .metadata
                    .branches
                    .iter()
                    .position(|b| b == &step.id)
                    .ok_or_else(|| GrammarError::UnresolvedBranch {
                        step: step.id.clone(),
                        parallel: dep.id.clone(),
                    })?;
                inputs.push(naming::branch_place(&dep.id, index));
            } else {
                inputs.push(naming::post_place(&dep.id));
            }
        }
        Ok(inputs)
    }

    fn add_post_place(&mut self, step_id: &str) -> String {
        let post = naming::post_place(step_id);
        self.places
            .push(Place::new(&post, format!("after {step_id}")));
        post
    }

    fn base_transition(&self, step: &IntentStep, id: String, kind: TransitionKind) -> Transition {
        let mut transition = Transition::new(id, step.id.clone())
            .with_kind(kind)
            .with_description(step.description.clone());
        transition.guard = step.guard.clone();
        transition.action_ref = Some(
            step.metadata
                .action_ref
                .clone()
                .unwrap_or_else(|| step.id.clone()),
        );
        let meta = &mut transition.metadata;
        meta.insert("stepId".to_string(), serde_json::json!(step.id));
        if let Some(timeout) = step.timeout_ms {
            meta.insert("timeoutMs".to_string(), serde_json::json!(timeout));
        }
        if let Some(retry) = &step.metadata.retry {
            meta.insert(
                "retry".to_string(),
                serde_json::to_value(retry).unwrap_or(serde_json::Value::Null),
            );
        }
        if let Some(delay) = step.metadata.delay_ms {
            meta.insert("delayMs".to_string(), serde_json::json!(delay));
        }
        if !step.metadata.matrix.is_empty() {
            meta.insert(
                "matrix".to_string(),
                serde_json::to_value(&step.metadata.matrix).unwrap_or(serde_json::Value::Null),
            );
        }
        transition
    }

    fn connect_inputs(&mut self, inputs: &[String], transition_id: &str) {
        for input in inputs {
            self.arcs.push(Arc::new(input.clone(), transition_id));
        }
    }

    fn note_step(&mut self, step: &IntentStep, transitions: Vec<String>) {
        self.notes.push(BuildNote::StepCompiled {
            step: step.id.clone(),
            transitions,
        });
    }

    fn compile_step(&mut self, step: &IntentStep) -> Result<()> {
        match step.kind {
            StepKind::Action | StepKind::Timer => self.compile_action(step),
            StepKind::Choice => self.compile_choice(step),
            StepKind::Parallel => self.compile_parallel(step),
            StepKind::Sync => self.compile_sync(step),
            StepKind::Loop => self.compile_loop(step),
            StepKind::Error => self.compile_error(step),
            StepKind::Compensation => self.compile_compensation(step),
        }
    }

    fn compile_action(&mut self, step: &IntentStep) -> Result<()> {
        let inputs = self.input_places(step)?;
        let post = self.add_post_place(&step.id);
        let kind = if step.kind == StepKind::Timer {
            TransitionKind::Timer
        } else {
            TransitionKind::Action
        };
        let tid = naming::action_transition(&step.id);
        let transition = self.base_transition(step, tid.clone(), kind);
        self.transitions.push(transition);
        self.connect_inputs(&inputs, &tid);
        self.arcs.push(Arc::new(&tid, post));
        self.note_step(step, vec![tid]);
        Ok(())
    }

    fn compile_choice(&mut self, step: &IntentStep) -> Result<()> {
        let inputs = self.input_places(step)?;
        let post = self.add_post_place(&step.id);
        let mut tids = Vec::new();
        let paths = step.metadata.paths.clone();
        for (index, path) in paths.iter().enumerate() {
            let tid = naming::choice_transition(&step.id, index);
            let mut transition =
                self.base_transition(step, tid.clone(), TransitionKind::Choice);
            transition.name = path.name.clone();
            transition.guard = Some(path.guard.clone());
            transition.action_ref = Some(
                path.action_ref
                    .clone()
                    .unwrap_or_else(|| format!("{}:{}", step.id, path.name)),
            );
            transition
                .metadata
                .insert("pathIndex".to_string(), serde_json::json!(index));
            self.transitions.push(transition);
            self.connect_inputs(&inputs, &tid);
            self.arcs.push(Arc::new(&tid, post.clone()));
            tids.push(tid);
        }
        self.note_step(step, tids);
        Ok(())
    }

    fn compile_parallel(&mut self, step: &IntentStep) -> Result<()> {
        let inputs = self.input_places(step)?;
        let tid = naming::fork_transition(&step.id);
        let transition = self.base_transition(step, tid.clone(), TransitionKind::Fork);
        self.transitions.push(transition);
        self.connect_inputs(&inputs, &tid);
        for (index, branch) in step.metadata.branches.iter().enumerate() {
            let place = naming::branch_place(&step.id, index);
            self.places
                .push(Place::new(&place, format!("branch {branch}")));
            self.arcs.push(Arc::new(&tid, place));
        }
        self.note_step(step, vec![tid]);
        Ok(())
    }

    fn compile_sync(&mut self, step: &IntentStep) -> Result<()> {
        let parallel = self.resolve_sync_target(step)?;
        let inputs = self.input_places(step)?;
        let post = self.add_post_place(&step.id);
        let tid = naming::join_transition(&step.id);
        let transition = self.base_transition(step, tid.clone(), TransitionKind::Join);
        self.transitions.push(transition);
        self.connect_inputs(&inputs, &tid);
        self.arcs.push(Arc::new(&tid, post));
        self.notes.push(BuildNote::SyncResolved {
            sync: step.id.clone(),
            parallel,
        });
        self.note_step(step, vec![tid]);
        Ok(())
    }

    /// Explicit `syncTarget` must name an existing parallel step;
    /// otherwise the sole parallel among the sync's transitive
    /// dependencies is used.
    fn resolve_sync_target(&self, step: &IntentStep) -> Result<String> {
        if let Some(target) = &step.metadata.sync_target {
            return match self.steps_by_id.get(target.as_str()) {
                Some(candidate) if candidate.kind == StepKind::Parallel => Ok(target.clone()),
                _ => Err(GrammarError::UnresolvedSync {
                    step: step.id.clone(),
                    target: Some(target.clone()),
                }),
            };
        }
        let mut queue: VecDeque<&str> =
            step.dependencies.iter().map(String::as_str).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let candidate = self.steps_by_id[id];
            if candidate.kind == StepKind::Parallel {
                return Ok(candidate.id.clone());
            }
            queue.extend(candidate.dependencies.iter().map(String::as_str));
        }
        Err(GrammarError::UnresolvedSync {
            step: step.id.clone(),
            target: None,
        })
    }

    fn compile_loop(&mut self, step: &IntentStep) -> Result<()> {
        // validate() guarantees the condition is present.
        let condition = step.metadata.condition.clone().unwrap_or_default();
        let back_to = step
            .metadata
            .back_to
            .clone()
            .or_else(|| step.dependencies.first().cloned())
            .ok_or_else(|| GrammarError::UnknownLoopTarget {
                step: step.id.clone(),
                target: String::new(),
            })?;
        let back_target = self
            .steps_by_id
            .get(back_to.as_str())
            .copied()
            .ok_or_else(|| GrammarError::UnknownLoopTarget {
                step: step.id.clone(),
                target: back_to.clone(),
            })?
            .clone();

        let inputs = self.input_places(step)?;
        let post = self.add_post_place(&step.id);

        // Back edge: re-enters the body head while the condition holds.
        let back_tid = naming::loop_back_transition(&step.id);
        let mut back = self.base_transition(step, back_tid.clone(), TransitionKind::Loop);
        back.guard = Some(condition.clone());
        back.action_ref = None;
        if let Some(max) = step.metadata.max_iterations {
            back.metadata
                .insert("maxIterations".to_string(), serde_json::json!(max));
        }
        self.transitions.push(back);
        self.connect_inputs(&inputs, &back_tid);
        let back_places = self.input_places(&back_target)?;
        for place in &back_places {
            self.arcs.push(Arc::new(&back_tid, place.clone()));
            self.loop_backs.push((back_tid.clone(), place.clone()));
        }
        self.notes.push(BuildNote::LoopBackRecorded {
            transition: back_tid.clone(),
            places: back_places,
        });

        // Exit edge: leaves the loop once the condition stops holding.
        let exit_tid = naming::loop_exit_transition(&step.id);
        let mut exit = self.base_transition(step, exit_tid.clone(), TransitionKind::Loop);
        exit.guard = Some(format!("!{condition}"));
        exit.action_ref = None;
        self.transitions.push(exit);
        self.connect_inputs(&inputs, &exit_tid);
        self.arcs.push(Arc::new(&exit_tid, post));

        self.note_step(step, vec![back_tid, exit_tid]);
        Ok(())
    }

    fn compile_error(&mut self, step: &IntentStep) -> Result<()> {
        let err_place = naming::error_place(&step.id);
        self.places
            .push(Place::new(&err_place, format!("errors for {}", step.id)));

        // Alternative guarded transitions route each handled step's
        // failure into the error place, contending for the same input
        // tokens as the handled step itself.
        for handled_id in step.metadata.handles.clone() {
            let handled = self
                .steps_by_id
                .get(handled_id.as_str())
                .copied()
                .ok_or_else(|| GrammarError::UnknownHandledStep {
                    step: step.id.clone(),
                    target: handled_id.clone(),
                })?
                .clone();
            let inputs = self.input_places(&handled)?;
            let tid = naming::error_transition(&handled.id, &step.id);
            let mut transition = Transition::new(&tid, format!("{} failed", handled.id))
                .with_kind(TransitionKind::Error)
                .with_guard(format!("step_failed.{}", handled.id));
            transition
                .metadata
                .insert("stepId".to_string(), serde_json::json!(step.id));
            transition
                .metadata
                .insert("handledStep".to_string(), serde_json::json!(handled.id));
            self.transitions.push(transition);
            self.connect_inputs(&inputs, &tid);
            self.arcs.push(Arc::new(&tid, err_place.clone()));
            self.notes.push(BuildNote::ErrorRouted {
                handler: step.id.clone(),
                handled: handled.id.clone(),
            });
        }

        // The handler itself consumes the error token.
        let mut inputs = self.input_places(step)?;
        inputs.push(err_place);
        let post = self.add_post_place(&step.id);
        let tid = naming::action_transition(&step.id);
        let transition = self.base_transition(step, tid.clone(), TransitionKind::Error);
        self.transitions.push(transition);
        self.connect_inputs(&inputs, &tid);
        self.arcs.push(Arc::new(&tid, post));
        self.note_step(step, vec![tid]);
        Ok(())
    }

    fn compile_compensation(&mut self, step: &IntentStep) -> Result<()> {
        let inputs = self.input_places(step)?;
        let post = self.add_post_place(&step.id);
        let targets = step.metadata.compensates.clone();
        if targets.is_empty() {
            let tid = naming::action_transition(&step.id);
            let transition =
                self.base_transition(step, tid.clone(), TransitionKind::Compensation);
            self.transitions.push(transition);
            self.connect_inputs(&inputs, &tid);
            self.arcs.push(Arc::new(&tid, post));
            self.note_step(step, vec![tid]);
            return Ok(());
        }

        // Fixed reverse actions in declared order, chained through
        // intermediate places.
        let mut current_inputs = inputs;
        let mut tids = Vec::new();
        for (index, target) in targets.iter().enumerate() {
            let tid = naming::compensation_transition(&step.id, index);
            let mut transition = Transition::new(&tid, format!("undo {target}"))
                .with_kind(TransitionKind::Compensation)
                .with_action_ref(format!("undo:{target}"));
            transition
                .metadata
                .insert("stepId".to_string(), serde_json::json!(step.id));
            transition
                .metadata
                .insert("compensates".to_string(), serde_json::json!(target));
            self.transitions.push(transition);
            self.connect_inputs(&current_inputs, &tid);
            let output = if index + 1 == targets.len() {
                post.clone()
            } else {
                let chain = naming::compensation_place(&step.id, index);
                self.places
                    .push(Place::new(&chain, format!("compensating {}", step.id)));
                chain
            };
            self.arcs.push(Arc::new(&tid, output.clone()));
            current_inputs = vec![output];
            tids.push(tid);
        }
        self.note_step(step, tids);
        Ok(())
    }

    /// Input places of choice steps become decision surfaces.
    fn mark_decision_places(&mut self) {
        let mut decision_places: HashSet<String> = HashSet::new();
        for step in &self.intent.steps {
            if step.kind != StepKind::Choice {
                continue;
            }
            for transition_index in 0..step.metadata.paths.len() {
                let tid = naming::choice_transition(&step.id, transition_index);
                for arc in self.arcs.iter().filter(|a| a.target == tid) {
                    decision_places.insert(arc.source.clone());
                }
            }
        }
        for place in &mut self.places {
            if decision_places.contains(&place.id) && place.kind == PlaceKind::Normal {
                place.kind = PlaceKind::Decision;
            }
        }
    }

    /// Derive source/sink roles from connectivity and note them.
    fn mark_source_and_sink_places(&mut self) {
        let has_outgoing: HashSet<&str> =
            self.arcs.iter().map(|a| a.source.as_str()).collect();
        let has_incoming: HashSet<&str> =
            self.arcs.iter().map(|a| a.target.as_str()).collect();
        let mut notes = Vec::new();
        for place in &mut self.places {
            let outgoing = has_outgoing.contains(place.id.as_str());
            let incoming = has_incoming.contains(place.id.as_str());
            if !outgoing && place.kind == PlaceKind::Normal {
                place.kind = PlaceKind::Sink;
                notes.push(BuildNote::SinkPlace {
                    place: place.id.clone(),
                });
            } else if !incoming && place.kind == PlaceKind::Normal {
                place.kind = PlaceKind::Source;
                notes.push(BuildNote::SourcePlace {
                    place: place.id.clone(),
                });
            }
        }
        self.notes.extend(notes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{ChoicePath, StepMetadata};

    fn action(id: &str) -> IntentStep {
        IntentStep::new(id, StepKind::Action)
    }

    #[test]
    fn single_action_builds_minimal_net() {
        let intent = IntentSpec::new("one", vec![action("work")]);
        let product = compile(&intent).unwrap();
        let net = &product.net;
        assert_eq!(net.places.len(), 2);
        assert_eq!(net.transitions.len(), 1);
        assert_eq!(net.arcs.len(), 2);
        assert_eq!(net.initial_marking.get("pre_work"), 1);
        assert_eq!(net.initial_marking.total_tokens(), 1);
        assert!(net.transition("t_work").is_some());
        assert_eq!(
            net.place("pre_work").unwrap().kind,
            PlaceKind::Source
        );
        assert_eq!(net.place("post_work").unwrap().kind, PlaceKind::Sink);
    }

    #[test]
    fn compilation_is_deterministic_byte_for_byte() {
        let intent = IntentSpec::new(
            "repeat",
            vec![
                action("build"),
                action("test").depends_on("build"),
                action("deploy").depends_on("test"),
            ],
        );
        let first = compile(&intent).unwrap().net.to_canonical_json().unwrap();
        let second = compile(&intent).unwrap().net.to_canonical_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn dependent_steps_consume_dependency_post_places() {
        let intent = IntentSpec::new(
            "chain",
            vec![action("a"), action("b").depends_on("a")],
        );
        let net = compile(&intent).unwrap().net;
        // b has no pre place of its own.
        assert!(net.place("pre_b").is_none());
        assert!(net
            .arcs
            .iter()
            .any(|arc| arc.source == "post_a" && arc.target == "t_b"));
    }

    #[test]
    fn choice_paths_share_inputs_and_mark_decision() {
        let intent = IntentSpec::new(
            "devops",
            vec![
                action("run_tests"),
                IntentStep::new("gate", StepKind::Choice)
                    .depends_on("run_tests")
                    .with_metadata(StepMetadata {
                        paths: vec![
                            ChoicePath {
                                name: "deploy".into(),
                                guard: "tests_passed".into(),
                                action_ref: None,
                            },
                            ChoicePath {
                                name: "alert".into(),
                                guard: "!tests_passed".into(),
                                action_ref: None,
                            },
                        ],
                        ..Default::default()
                    }),
            ],
        );
        let net = compile(&intent).unwrap().net;
        assert!(net.transition("t_gate_0").is_some());
        assert!(net.transition("t_gate_1").is_some());
        assert_eq!(
            net.transition("t_gate_0").unwrap().guard.as_deref(),
            Some("tests_passed")
        );
        // Both alternatives contend for the same token.
        assert!(net.arcs.iter().any(|a| a.source == "post_run_tests" && a.target == "t_gate_0"));
        assert!(net.arcs.iter().any(|a| a.source == "post_run_tests" && a.target == "t_gate_1"));
        assert_eq!(
            net.place("post_run_tests").unwrap().kind,
            PlaceKind::Decision
        );
    }

    fn parallel_intent(with_sync: bool) -> IntentSpec {
        let mut steps = vec![
            action("warm_up"),
            IntentStep::new("practice", StepKind::Parallel)
                .depends_on("warm_up")
                .with_metadata(StepMetadata {
                    branches: vec!["pass_practice".into(), "shoot_practice".into()],
                    ..Default::default()
                }),
            action("pass_practice").depends_on("practice"),
            action("shoot_practice").depends_on("practice"),
        ];
        if with_sync {
            steps.push(
                IntentStep::new("regroup", StepKind::Sync)
                    .depends_on("pass_practice")
                    .depends_on("shoot_practice"),
            );
            steps.push(action("cooldown").depends_on("regroup"));
        }
        IntentSpec::new("football", steps)
    }

    #[test]
    fn fork_and_join_form_a_diamond() {
        let net = compile(&parallel_intent(true)).unwrap().net;
        assert!(net.transition("t_practice_fork").is_some());
        assert!(net.transition("t_regroup_join").is_some());
        // Fork fans out into one branch place per declared branch.
        assert!(net.arcs.iter().any(|a| a.source == "t_practice_fork" && a.target == "branch_practice_0"));
        assert!(net.arcs.iter().any(|a| a.source == "t_practice_fork" && a.target == "branch_practice_1"));
        // Branch heads consume their own branch place.
        assert!(net.arcs.iter().any(|a| a.source == "branch_practice_0" && a.target == "t_pass_practice"));
        assert!(net.arcs.iter().any(|a| a.source == "branch_practice_1" && a.target == "t_shoot_practice"));
        // The join consumes both branch tails.
        assert!(net.arcs.iter().any(|a| a.source == "post_pass_practice" && a.target == "t_regroup_join"));
        assert!(net.arcs.iter().any(|a| a.source == "post_shoot_practice" && a.target == "t_regroup_join"));
    }

    #[test]
    fn parallel_without_join_still_builds() {
        // The missing join is a liveness problem for the validator, not
        // a grammar conflict.
        let product = compile(&parallel_intent(false)).unwrap();
        assert!(product.net.transition("t_practice_fork").is_some());
    }

    #[test]
    fn dependent_of_parallel_must_be_a_branch() {
        let intent = IntentSpec::new(
            "bad",
            vec![
                IntentStep::new("par", StepKind::Parallel).with_metadata(StepMetadata {
                    branches: vec!["a".into()],
                    ..Default::default()
                }),
                action("a").depends_on("par"),
                action("b").depends_on("par"),
            ],
        );
        match compile(&intent) {
            Err(GrammarError::UnresolvedBranch { step, parallel }) => {
                assert_eq!(step, "b");
                assert_eq!(parallel, "par");
            }
            other => panic!("expected unresolved branch, got {other:?}"),
        }
    }

    #[test]
    fn sync_without_parallel_is_unresolved() {
        let intent = IntentSpec::new(
            "lonely",
            vec![
                action("a"),
                IntentStep::new("join", StepKind::Sync).depends_on("a"),
            ],
        );
        assert!(matches!(
            compile(&intent),
            Err(GrammarError::UnresolvedSync { .. })
        ));
    }

    #[test]
    fn loop_records_back_arcs_and_negated_exit() {
        let intent = IntentSpec::new(
            "poll",
            vec![
                action("fetch"),
                IntentStep::new("again", StepKind::Loop)
                    .depends_on("fetch")
                    .with_metadata(StepMetadata {
                        condition: Some("more_pages".into()),
                        ..Default::default()
                    }),
                action("report").depends_on("again"),
            ],
        );
        let net = compile(&intent).unwrap().net;
        let back = net.transition("t_again_back").unwrap();
        assert_eq!(back.kind, TransitionKind::Loop);
        assert_eq!(back.guard.as_deref(), Some("more_pages"));
        let exit = net.transition("t_again_exit").unwrap();
        assert_eq!(exit.guard.as_deref(), Some("!more_pages"));
        // The back edge re-enters fetch's input place and is recorded.
        assert!(net.arcs.iter().any(|a| a.source == "t_again_back" && a.target == "pre_fetch"));
        assert_eq!(net.loop_back_arcs.len(), 1);
        assert_eq!(net.loop_back_arcs[0].transition, "t_again_back");
        assert_eq!(net.loop_back_arcs[0].place, "pre_fetch");
    }

    #[test]
    fn error_handler_contends_with_handled_step() {
        let intent = IntentSpec::new(
            "guarded",
            vec![
                action("deploy"),
                IntentStep::new("onfail", StepKind::Error).with_metadata(StepMetadata {
                    handles: vec!["deploy".into()],
                    ..Default::default()
                }),
            ],
        );
        let net = compile(&intent).unwrap().net;
        let err_transition = net.transition("t_deploy_err_onfail").unwrap();
        assert_eq!(err_transition.kind, TransitionKind::Error);
        assert_eq!(err_transition.guard.as_deref(), Some("step_failed.deploy"));
        // The error alternative consumes the same input as t_deploy.
        assert!(net.arcs.iter().any(|a| a.source == "pre_deploy" && a.target == "t_deploy_err_onfail"));
        assert!(net.arcs.iter().any(|a| a.source == "t_deploy_err_onfail" && a.target == "err_onfail"));
        // The handler consumes the error place.
        assert!(net.arcs.iter().any(|a| a.source == "err_onfail" && a.target == "t_onfail"));
        // No free token for the handler: it only runs on error.
        assert_eq!(net.initial_marking.get("err_onfail"), 0);
    }

    #[test]
    fn compensation_chains_reverse_actions_in_order() {
        let intent = IntentSpec::new(
            "undo",
            vec![
                action("provision"),
                action("configure").depends_on("provision"),
                IntentStep::new("rollback", StepKind::Compensation)
                    .depends_on("configure")
                    .with_metadata(StepMetadata {
                        compensates: vec!["configure".into(), "provision".into()],
                        ..Default::default()
                    }),
            ],
        );
        let net = compile(&intent).unwrap().net;
        let first = net.transition("t_rollback_comp_0").unwrap();
        let second = net.transition("t_rollback_comp_1").unwrap();
        assert_eq!(first.action_ref.as_deref(), Some("undo:configure"));
        assert_eq!(second.action_ref.as_deref(), Some("undo:provision"));
        // Chained through the intermediate place.
        assert!(net.arcs.iter().any(|a| a.source == "t_rollback_comp_0" && a.target == "comp_rollback_0"));
        assert!(net.arcs.iter().any(|a| a.source == "comp_rollback_0" && a.target == "t_rollback_comp_1"));
        assert!(net.arcs.iter().any(|a| a.source == "t_rollback_comp_1" && a.target == "post_rollback"));
    }

    #[test]
    fn timer_step_records_delay() {
        let intent = IntentSpec::new(
            "wait",
            vec![IntentStep::new("pause", StepKind::Timer).with_metadata(StepMetadata {
                delay_ms: Some(5_000),
                ..Default::default()
            })],
        );
        let net = compile(&intent).unwrap().net;
        let transition = net.transition("t_pause").unwrap();
        assert_eq!(transition.kind, TransitionKind::Timer);
        assert_eq!(
            transition.metadata.get("delayMs"),
            Some(&serde_json::json!(5_000))
        );
    }
}
