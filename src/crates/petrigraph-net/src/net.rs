//! The immutable net bundle: nodes, arcs, markings and firing rules.

use crate::arc::{Arc, ArcKind};
use crate::error::{NetError, Result, StructuralViolation};
use crate::guard::{GuardContext, GuardEvaluator};
use crate::marking::Marking;
use crate::place::{Place, PlaceKind};
use crate::transition::Transition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Version tag carried in net metadata and on the wire.
pub const SCHEMA_VERSION: &str = "1";

/// Net-level metadata. The schema is closed: unknown keys are rejected
/// when deserializing so cross-component hints cannot smuggle through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NetMetadata {
    pub schema_version: String,
    /// Name of the intent specification this net was compiled from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_intent: Option<String>,
    /// Free-form values the guard evaluator may observe.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl Default for NetMetadata {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            origin_intent: None,
            context: BTreeMap::new(),
        }
    }
}

/// A loop back-arc declared by the grammar compiler. The projector breaks
/// the cycle exactly here and records the break in its notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoopBackArc {
    /// The loop transition carrying the back edge.
    pub transition: String,
    /// The pre-place the back edge feeds.
    pub place: String,
}

/// Input and output arcs of one transition, borrowed from the net.
#[derive(Debug, Clone, Default)]
pub struct TransitionIo<'a> {
    pub inputs: Vec<&'a Arc>,
    pub outputs: Vec<&'a Arc>,
}

/// An immutable Petri net. Built once (normally by the grammar compiler),
/// then shared read-only across validator, simulator and projector.
///
/// Transitions and places reference each other by id only; the net owns
/// the arrays and analyses walk by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PetriNet {
    pub places: Vec<Place>,
    pub transitions: Vec<Transition>,
    pub arcs: Vec<Arc>,
    pub initial_marking: Marking,
    /// Markings any of which counts as a successful terminal state. When
    /// empty, a marking is terminal iff no transition is enabled and only
    /// `Sink` places hold tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terminal_markings: Vec<Marking>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loop_back_arcs: Vec<LoopBackArc>,
    #[serde(default)]
    pub metadata: NetMetadata,
}

impl PetriNet {
    /// Pure constructor accepting all final fields.
    pub fn new(
        places: Vec<Place>,
        transitions: Vec<Transition>,
        arcs: Vec<Arc>,
        initial_marking: Marking,
    ) -> Self {
        Self {
            places,
            transitions,
            arcs,
            initial_marking,
            terminal_markings: Vec::new(),
            loop_back_arcs: Vec::new(),
            metadata: NetMetadata::default(),
        }
    }

    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    /// Input and output arcs of a transition.
    pub fn transition_io(&self, transition_id: &str) -> TransitionIo<'_> {
        let mut io = TransitionIo::default();
        for arc in &self.arcs {
            if arc.target == transition_id {
                io.inputs.push(arc);
            } else if arc.source == transition_id {
                io.outputs.push(arc);
            }
        }
        io
    }

    /// Input/output arcs for every transition in one pass. Analyses that
    /// fire repeatedly should build this once instead of calling
    /// [`transition_io`](Self::transition_io) per step.
    pub fn io_map(&self) -> HashMap<&str, TransitionIo<'_>> {
        let mut map: HashMap<&str, TransitionIo<'_>> = self
            .transitions
            .iter()
            .map(|t| (t.id.as_str(), TransitionIo::default()))
            .collect();
        for arc in &self.arcs {
            if let Some(io) = map.get_mut(arc.target.as_str()) {
                io.inputs.push(arc);
            }
            if let Some(io) = map.get_mut(arc.source.as_str()) {
                io.outputs.push(arc);
            }
        }
        map
    }

    /// Run every structural check and return the full violation list.
    /// An empty list means the net is structurally valid.
    pub fn structural_violations(&self) -> Vec<StructuralViolation> {
        let mut violations = Vec::new();

        let place_ids: HashSet<&str> = self.places.iter().map(|p| p.id.as_str()).collect();
        let transition_ids: HashSet<&str> =
            self.transitions.iter().map(|t| t.id.as_str()).collect();

        // Duplicate ids across places and transitions combined.
        let mut seen: HashSet<&str> = HashSet::new();
        for id in self
            .places
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.transitions.iter().map(|t| t.id.as_str()))
        {
            if !seen.insert(id) {
                violations.push(StructuralViolation::DuplicateId { id: id.to_string() });
            }
        }

        for place in &self.places {
            if let Some(capacity) = place.capacity {
                if capacity == 0 {
                    violations.push(StructuralViolation::InvalidCapacity {
                        place: place.id.clone(),
                        capacity,
                    });
                }
            }
        }

        for arc in &self.arcs {
            let source_is_place = place_ids.contains(arc.source.as_str());
            let source_is_transition = transition_ids.contains(arc.source.as_str());
            let target_is_place = place_ids.contains(arc.target.as_str());
            let target_is_transition = transition_ids.contains(arc.target.as_str());

            if !source_is_place && !source_is_transition {
                violations.push(StructuralViolation::UnknownEndpoint {
                    from: arc.source.clone(),
                    target: arc.target.clone(),
                    missing: arc.source.clone(),
                });
                continue;
            }
            if !target_is_place && !target_is_transition {
                violations.push(StructuralViolation::UnknownEndpoint {
                    from: arc.source.clone(),
                    target: arc.target.clone(),
                    missing: arc.target.clone(),
                });
                continue;
            }
            let bipartite = (source_is_place && target_is_transition)
                || (source_is_transition && target_is_place);
            if !bipartite {
                violations.push(StructuralViolation::NonBipartiteArc {
                    from: arc.source.clone(),
                    target: arc.target.clone(),
                });
            }
            if arc.weight == 0 {
                violations.push(StructuralViolation::InvalidArcWeight {
                    from: arc.source.clone(),
                    target: arc.target.clone(),
                });
            }
            if source_is_transition && arc.kind != ArcKind::Normal {
                violations.push(StructuralViolation::InputOnlyArcKindOnOutput {
                    from: arc.source.clone(),
                    target: arc.target.clone(),
                });
            }
        }

        for (place, _) in self.initial_marking.nonzero() {
            if !place_ids.contains(place) {
                violations.push(StructuralViolation::UnknownMarkedPlace {
                    place: place.to_string(),
                });
            }
        }

        for transition in &self.transitions {
            let has_input = self.arcs.iter().any(|a| a.target == transition.id);
            if !has_input {
                violations.push(StructuralViolation::TransitionWithoutInput {
                    transition: transition.id.clone(),
                });
            }
        }

        violations
    }

    /// Structural validation as a result, for `?`-style call sites.
    pub fn validate_structure(&self) -> Result<()> {
        let violations = self.structural_violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(NetError::Structural(violations))
        }
    }

    /// Decide whether a transition is enabled in `marking`.
    ///
    /// Checks input arcs per their kind, pre-checks output capacities,
    /// then evaluates the guard (if any) through `evaluator`. Guard
    /// failures surface as [`NetError::Guard`] with the transition id.
    pub fn is_enabled(
        &self,
        transition_id: &str,
        marking: &Marking,
        evaluator: &dyn GuardEvaluator,
    ) -> Result<bool> {
        let transition = self
            .transition(transition_id)
            .ok_or_else(|| NetError::UnknownTransition(transition_id.to_string()))?;
        let io = self.transition_io(transition_id);
        self.io_enabled(transition, &io, marking, evaluator)
    }

    /// Enabled-check against a precomputed [`TransitionIo`], for hot
    /// loops over [`io_map`](Self::io_map).
    pub fn is_enabled_with_io(
        &self,
        transition_id: &str,
        io: &TransitionIo<'_>,
        marking: &Marking,
        evaluator: &dyn GuardEvaluator,
    ) -> Result<bool> {
        let transition = self
            .transition(transition_id)
            .ok_or_else(|| NetError::UnknownTransition(transition_id.to_string()))?;
        self.io_enabled(transition, io, marking, evaluator)
    }

    fn io_enabled(
        &self,
        transition: &Transition,
        io: &TransitionIo<'_>,
        marking: &Marking,
        evaluator: &dyn GuardEvaluator,
    ) -> Result<bool> {
        for arc in &io.inputs {
            let tokens = marking.get(&arc.source);
            let satisfied = match arc.kind {
                ArcKind::Normal | ArcKind::Read => tokens >= arc.weight,
                ArcKind::Inhibitor => tokens < arc.weight,
                ArcKind::Reset => true,
            };
            if !satisfied {
                return Ok(false);
            }
        }
        // Capacity pre-check: refuse to enable rather than overflow.
        for arc in &io.outputs {
            if let Some(place) = self.place(&arc.target) {
                if let Some(capacity) = place.capacity {
                    if marking.get(&arc.target) + arc.weight > capacity {
                        return Ok(false);
                    }
                }
            }
        }
        if let Some(guard) = &transition.guard {
            let ctx = GuardContext {
                marking,
                metadata: &self.metadata.context,
            };
            return evaluator
                .evaluate(guard, &ctx)
                .map_err(|source| NetError::Guard {
                    transition: transition.id.clone(),
                    source,
                });
        }
        Ok(true)
    }

    /// Fire a transition, producing the successor marking. The input
    /// marking is left untouched.
    pub fn fire(
        &self,
        transition_id: &str,
        marking: &Marking,
        evaluator: &dyn GuardEvaluator,
    ) -> Result<Marking> {
        let io = self.transition_io(transition_id);
        self.fire_io(transition_id, &io, marking, evaluator)
    }

    /// Fire using a precomputed [`TransitionIo`], for hot loops over
    /// [`io_map`](Self::io_map).
    pub fn fire_io(
        &self,
        transition_id: &str,
        io: &TransitionIo<'_>,
        marking: &Marking,
        evaluator: &dyn GuardEvaluator,
    ) -> Result<Marking> {
        let transition = self
            .transition(transition_id)
            .ok_or_else(|| NetError::UnknownTransition(transition_id.to_string()))?;
        if !self.io_enabled(transition, io, marking, evaluator)? {
            return Err(NetError::NotEnabled(transition_id.to_string()));
        }
        let mut next = marking.clone();
        for arc in &io.inputs {
            match arc.kind {
                ArcKind::Normal => {
                    let tokens = next.get(&arc.source);
                    next.set(arc.source.clone(), tokens - arc.weight);
                }
                ArcKind::Reset => next.set(arc.source.clone(), 0),
                ArcKind::Inhibitor | ArcKind::Read => {}
            }
        }
        for arc in &io.outputs {
            let tokens = next.get(&arc.target);
            next.set(arc.target.clone(), tokens + arc.weight);
        }
        Ok(next)
    }

    /// All transitions enabled in `marking`, sorted by id so enumeration
    /// order is deterministic.
    pub fn enabled_transitions(
        &self,
        marking: &Marking,
        evaluator: &dyn GuardEvaluator,
    ) -> Result<Vec<&Transition>> {
        let mut enabled = Vec::new();
        for transition in &self.transitions {
            let io = self.transition_io(&transition.id);
            if self.io_enabled(transition, &io, marking, evaluator)? {
                enabled.push(transition);
            }
        }
        enabled.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(enabled)
    }

    /// Decide whether a marking is terminal.
    ///
    /// With declared terminal markings, membership decides. Otherwise the
    /// marking must enable nothing and keep tokens only on `Sink` places.
    pub fn is_terminal(&self, marking: &Marking, evaluator: &dyn GuardEvaluator) -> Result<bool> {
        if !self.terminal_markings.is_empty() {
            return Ok(self.terminal_markings.iter().any(|m| m == marking));
        }
        if !self.enabled_transitions(marking, evaluator)?.is_empty() {
            return Ok(false);
        }
        let only_sinks = marking.nonzero().all(|(place_id, _)| {
            self.place(place_id)
                .map(|p| p.kind == PlaceKind::Sink)
                .unwrap_or(false)
        });
        Ok(only_sinks)
    }
}

/// Assembly-time builder used by the grammar compiler. Collects nodes and
/// arcs incrementally and emits the final immutable net in one step,
/// running structural validation on build.
#[derive(Debug, Default)]
pub struct NetBuilder {
    places: Vec<Place>,
    transitions: Vec<Transition>,
    arcs: Vec<Arc>,
    initial_marking: Marking,
    terminal_markings: Vec<Marking>,
    loop_back_arcs: Vec<LoopBackArc>,
    metadata: NetMetadata,
}

impl NetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_place(&mut self, place: Place) -> &mut Self {
        self.places.push(place);
        self
    }

    pub fn add_transition(&mut self, transition: Transition) -> &mut Self {
        self.transitions.push(transition);
        self
    }

    pub fn add_arc(&mut self, arc: Arc) -> &mut Self {
        self.arcs.push(arc);
        self
    }

    /// Put `tokens` on a place in the initial marking.
    pub fn mark_initial(&mut self, place_id: impl Into<String>, tokens: u64) -> &mut Self {
        let place_id = place_id.into();
        let current = self.initial_marking.get(&place_id);
        self.initial_marking.set(place_id, current + tokens);
        self
    }

    pub fn declare_terminal(&mut self, marking: Marking) -> &mut Self {
        self.terminal_markings.push(marking);
        self
    }

    pub fn record_loop_back(
        &mut self,
        transition: impl Into<String>,
        place: impl Into<String>,
    ) -> &mut Self {
        self.loop_back_arcs.push(LoopBackArc {
            transition: transition.into(),
            place: place.into(),
        });
        self
    }

    pub fn origin_intent(&mut self, name: impl Into<String>) -> &mut Self {
        self.metadata.origin_intent = Some(name.into());
        self
    }

    pub fn context_value(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> &mut Self {
        self.metadata.context.insert(key.into(), value);
        self
    }

    pub fn has_place(&self, id: &str) -> bool {
        self.places.iter().any(|p| p.id == id)
    }

    pub fn has_transition(&self, id: &str) -> bool {
        self.transitions.iter().any(|t| t.id == id)
    }

    /// Emit the immutable net, failing with the full violation list if a
    /// structural invariant is broken.
    pub fn build(self) -> Result<PetriNet> {
        let net = PetriNet {
            places: self.places,
            transitions: self.transitions,
            arcs: self.arcs,
            initial_marking: self.initial_marking,
            terminal_markings: self.terminal_markings,
            loop_back_arcs: self.loop_back_arcs,
            metadata: self.metadata,
        };
        net.validate_structure()?;
        tracing::debug!(
            places = net.places.len(),
            transitions = net.transitions.len(),
            arcs = net.arcs.len(),
            "built net"
        );
        Ok(net)
    }
}
