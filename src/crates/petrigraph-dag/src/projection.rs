//! Net-to-DAG projection with transitive reduction.
//!
//! Nodes are exactly the transitions of the net. For every pair
//! `(a, b)` where an output arc of `a` feeds a place that is a normal or
//! read input of `b`, the projection adds an edge `a -> b`; the place is
//! consumed into the edge. Inhibitor and reset inputs express absence,
//! not sequencing, so they produce no edges.
//!
//! Declared loop back-arcs are skipped during edge construction and
//! recorded as `LoopBroken` notes; any cycle that survives means the net
//! encoded an undeclared loop and projection refuses it. Transitive
//! reduction then removes every unconditional edge that duplicates a
//! longer path (condition-carrying edges gate execution and are never
//! dropped).

use crate::dag::{DagEdge, DagNode, ProjectionNote, TaskDag};
use crate::error::ProjectionError;
use crate::executor::retry::RetryPolicy;
use petrigraph_net::{ArcKind, PetriNet, PlaceKind};
use std::collections::{HashMap, HashSet};

/// A projected DAG plus the notes explaining what projection did.
#[derive(Debug, Clone)]
pub struct Projection {
    pub dag: TaskDag,
    pub notes: Vec<ProjectionNote>,
}

/// Project a net onto its transition-level task DAG.
pub fn project(net: &PetriNet) -> Result<Projection, ProjectionError> {
    let mut notes = Vec::new();

    let loop_backs: HashSet<(&str, &str)> = net
        .loop_back_arcs
        .iter()
        .map(|lb| (lb.transition.as_str(), lb.place.as_str()))
        .collect();
    for lb in &net.loop_back_arcs {
        if net.transition(&lb.transition).is_none() {
            return Err(ProjectionError::UnknownLoopElement(lb.transition.clone()));
        }
        if net.place(&lb.place).is_none() {
            return Err(ProjectionError::UnknownLoopElement(lb.place.clone()));
        }
    }

    let nodes: Vec<DagNode> = net.transitions.iter().map(|t| lift_node(net, &t.id)).collect();

    // producers[p] = transitions outputting into p (loop back-arcs cut
    // here); consumers[p] = transitions sequenced after p.
    let mut producers: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut consumers: HashMap<&str, Vec<&str>> = HashMap::new();
    for arc in &net.arcs {
        let source_is_transition = net.transition(&arc.source).is_some();
        if source_is_transition {
            if loop_backs.contains(&(arc.source.as_str(), arc.target.as_str())) {
                notes.push(ProjectionNote::LoopBroken {
                    transition: arc.source.clone(),
                    place: arc.target.clone(),
                });
                continue;
            }
            producers.entry(arc.target.as_str()).or_default().push(arc.source.as_str());
        } else if matches!(arc.kind, ArcKind::Normal | ArcKind::Read) {
            consumers.entry(arc.source.as_str()).or_default().push(arc.target.as_str());
        }
    }

    let mut edges: Vec<DagEdge> = Vec::new();
    let mut seen_edges: HashSet<(String, String)> = HashSet::new();
    for place in &net.places {
        let produced_by = producers.get(place.id.as_str());
        let consumed_by = consumers.get(place.id.as_str());
        let (Some(produced_by), Some(consumed_by)) = (produced_by, consumed_by) else {
            continue;
        };
        let mut surface: Vec<(String, String)> = Vec::new();
        for &from in produced_by {
            for &to in consumed_by {
                if !seen_edges.insert((from.to_string(), to.to_string())) {
                    continue;
                }
                let condition = net.transition(to).and_then(|t| t.guard.clone());
                edges.push(DagEdge {
                    from: from.to_string(),
                    to: to.to_string(),
                    condition,
                });
                surface.push((from.to_string(), to.to_string()));
            }
        }
        if place.kind == PlaceKind::Decision && surface.len() > 1 {
            let mut transitions: Vec<String> =
                consumed_by.iter().map(|t| t.to_string()).collect();
            transitions.sort_unstable();
            transitions.dedup();
            notes.push(ProjectionNote::DecisionSurface {
                place: place.id.clone(),
                transitions,
            });
        }
    }

    edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
    let mut dag = TaskDag { nodes, edges };

    if let Err(cycle) = dag.topological_order() {
        return Err(ProjectionError::CyclicResult { cycle });
    }

    let reduced = transitive_reduction(&mut dag);
    notes.extend(reduced);

    tracing::debug!(
        nodes = dag.nodes.len(),
        edges = dag.edges.len(),
        notes = notes.len(),
        "projected net onto task dag"
    );
    Ok(Projection { dag, notes })
}

fn lift_node(net: &PetriNet, transition_id: &str) -> DagNode {
    let transition = net.transition(transition_id).expect("projecting own transitions");
    let io = net.transition_io(transition_id);
    let meta = &transition.metadata;
    DagNode {
        id: transition.id.clone(),
        name: transition.name.clone(),
        kind: transition.kind,
        step_id: meta
            .get("stepId")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        action_ref: transition.action_ref.clone(),
        input_places: io.inputs.iter().map(|a| a.source.clone()).collect(),
        output_places: io.outputs.iter().map(|a| a.target.clone()).collect(),
        timeout_ms: meta.get("timeoutMs").and_then(|v| v.as_u64()),
        delay_ms: meta.get("delayMs").and_then(|v| v.as_u64()),
        retry: meta
            .get("retry")
            .and_then(|v| serde_json::from_value::<RetryPolicy>(v.clone()).ok()),
    }
}

/// Remove unconditional edges duplicated by a longer path. Unique on a
/// DAG and idempotent; edges carrying a condition gate their target and
/// are kept even when redundant as plain sequencing.
fn transitive_reduction(dag: &mut TaskDag) -> Vec<ProjectionNote> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &dag.edges {
        adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
    }

    // reachable_without(u, v): can u reach v without taking the direct
    // u -> v edge?
    let reachable_without = |from: &str, to: &str| -> bool {
        let mut stack: Vec<&str> = adjacency
            .get(from)
            .map(|next| next.iter().copied().filter(|&n| n != to).collect())
            .unwrap_or_default();
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = adjacency.get(current) {
                stack.extend(next.iter().copied());
            }
        }
        false
    };

    let mut removed: Vec<ProjectionNote> = Vec::new();
    let mut keep: Vec<DagEdge> = Vec::new();
    for edge in &dag.edges {
        if edge.condition.is_none() && reachable_without(&edge.from, &edge.to) {
            removed.push(ProjectionNote::EdgeReduced {
                from: edge.from.clone(),
                to: edge.to.clone(),
            });
        } else {
            keep.push(edge.clone());
        }
    }
    dag.edges = keep;
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use petrigraph_grammar::{compile, ChoicePath, IntentSpec, IntentStep, StepKind, StepMetadata};
    use petrigraph_net::{Arc, NetBuilder, Place, Transition, TransitionKind};

    fn action(id: &str) -> IntentStep {
        IntentStep::new(id, StepKind::Action)
    }

    fn devops_net() -> PetriNet {
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
        compile(&intent).unwrap().net
    }

    #[test]
    fn devops_projects_three_nodes_and_two_conditional_edges() {
        let projection = project(&devops_net()).unwrap();
        let dag = &projection.dag;
        assert_eq!(dag.nodes.len(), 3);
        assert_eq!(dag.edges.len(), 2);
        for edge in &dag.edges {
            assert_eq!(edge.from, "t_run_tests");
            assert!(edge.condition.is_some(), "choice edges carry guards");
        }
        // The decision surface is noted.
        assert!(projection.notes.iter().any(|n| matches!(
            n,
            ProjectionNote::DecisionSurface { place, .. } if place == "post_run_tests"
        )));
    }

    #[test]
    fn nodes_carry_cross_references() {
        let projection = project(&devops_net()).unwrap();
        let node = projection.dag.node("t_run_tests").unwrap();
        assert_eq!(node.step_id.as_deref(), Some("run_tests"));
        assert_eq!(node.input_places, vec!["pre_run_tests"]);
        assert_eq!(node.output_places, vec!["post_run_tests"]);
        assert_eq!(node.kind, TransitionKind::Action);

        let choice = projection.dag.node("t_gate_0").unwrap();
        assert_eq!(choice.step_id.as_deref(), Some("gate"));
        assert_eq!(choice.kind, TransitionKind::Choice);
    }

    #[test]
    fn fork_join_projects_a_diamond() {
        let intent = IntentSpec::new(
            "football",
            vec![
                action("warm_up"),
                IntentStep::new("practice", StepKind::Parallel)
                    .depends_on("warm_up")
                    .with_metadata(StepMetadata {
                        branches: vec!["pass_practice".into(), "shoot_practice".into()],
                        ..Default::default()
                    }),
                action("pass_practice").depends_on("practice"),
                action("shoot_practice").depends_on("practice"),
                IntentStep::new("regroup", StepKind::Sync)
                    .depends_on("pass_practice")
                    .depends_on("shoot_practice"),
                action("cooldown").depends_on("regroup"),
            ],
        );
        let projection = project(&compile(&intent).unwrap().net).unwrap();
        let dag = &projection.dag;
        assert_eq!(dag.nodes.len(), 6);
        let has_edge = |from: &str, to: &str| dag.edges.iter().any(|e| e.from == from && e.to == to);
        assert!(has_edge("t_warm_up", "t_practice_fork"));
        assert!(has_edge("t_practice_fork", "t_pass_practice"));
        assert!(has_edge("t_practice_fork", "t_shoot_practice"));
        assert!(has_edge("t_pass_practice", "t_regroup_join"));
        assert!(has_edge("t_shoot_practice", "t_regroup_join"));
        assert!(has_edge("t_regroup_join", "t_cooldown"));
        assert_eq!(dag.edges.len(), 6);
    }

    #[test]
    fn declared_loop_is_broken_with_a_note() {
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
        let projection = project(&compile(&intent).unwrap().net).unwrap();
        assert!(projection.notes.iter().any(|n| matches!(
            n,
            ProjectionNote::LoopBroken { transition, place }
                if transition == "t_again_back" && place == "pre_fetch"
        )));
        // Acyclic after the break.
        assert!(projection.dag.topological_order().is_ok());
    }

    #[test]
    fn undeclared_cycle_is_refused() {
        let mut builder = NetBuilder::new();
        builder
            .add_place(Place::new("p1", "a"))
            .add_place(Place::new("p2", "b"))
            .add_transition(Transition::new("t1", "forward"))
            .add_transition(Transition::new("t2", "back"))
            .add_arc(Arc::new("p1", "t1"))
            .add_arc(Arc::new("t1", "p2"))
            .add_arc(Arc::new("p2", "t2"))
            .add_arc(Arc::new("t2", "p1"))
            .mark_initial("p1", 1);
        let net = builder.build().unwrap();
        match project(&net) {
            Err(ProjectionError::CyclicResult { cycle }) => {
                assert_eq!(cycle, vec!["t1", "t2"]);
            }
            other => panic!("expected cyclic result, got {other:?}"),
        }
    }

    #[test]
    fn redundant_direct_edge_is_reduced() {
        // a -> b -> c with an extra direct place from a to c.
        let mut builder = NetBuilder::new();
        builder
            .add_place(Place::new("p0", "start"))
            .add_place(Place::new("p_ab", "a to b"))
            .add_place(Place::new("p_bc", "b to c"))
            .add_place(Place::new("p_ac", "a to c"))
            .add_place(Place::new("end", "end"))
            .add_transition(Transition::new("t_a", "a"))
            .add_transition(Transition::new("t_b", "b"))
            .add_transition(Transition::new("t_c", "c"))
            .add_arc(Arc::new("p0", "t_a"))
            .add_arc(Arc::new("t_a", "p_ab"))
            .add_arc(Arc::new("t_a", "p_ac"))
            .add_arc(Arc::new("p_ab", "t_b"))
            .add_arc(Arc::new("t_b", "p_bc"))
            .add_arc(Arc::new("p_bc", "t_c"))
            .add_arc(Arc::new("p_ac", "t_c"))
            .add_arc(Arc::new("t_c", "end"))
            .mark_initial("p0", 1);
        let net = builder.build().unwrap();
        let projection = project(&net).unwrap();
        let dag = &projection.dag;
        assert_eq!(dag.edges.len(), 2, "a->c must be reduced away");
        assert!(projection.notes.iter().any(|n| matches!(
            n,
            ProjectionNote::EdgeReduced { from, to } if from == "t_a" && to == "t_c"
        )));
    }

    #[test]
    fn reduction_is_idempotent() {
        let projection = project(&devops_net()).unwrap();
        let mut dag = projection.dag.clone();
        let removed = transitive_reduction(&mut dag);
        assert!(removed.is_empty());
        assert_eq!(dag.edges, projection.dag.edges);
    }

    #[test]
    fn parallel_producers_and_consumers_fan_out() {
        // Two producers into one place consumed by two transitions:
        // four edges, no reduction possible.
        let mut builder = NetBuilder::new();
        builder
            .add_place(Place::new("in_a", "in a"))
            .add_place(Place::new("in_b", "in b"))
            .add_place(Place::new("hub", "hub"))
            .add_place(Place::new("out_c", "out c"))
            .add_place(Place::new("out_d", "out d"))
            .add_transition(Transition::new("t_a", "a"))
            .add_transition(Transition::new("t_b", "b"))
            .add_transition(Transition::new("t_c", "c"))
            .add_transition(Transition::new("t_d", "d"))
            .add_arc(Arc::new("in_a", "t_a"))
            .add_arc(Arc::new("in_b", "t_b"))
            .add_arc(Arc::new("t_a", "hub"))
            .add_arc(Arc::new("t_b", "hub"))
            .add_arc(Arc::new("hub", "t_c"))
            .add_arc(Arc::new("hub", "t_d"))
            .add_arc(Arc::new("t_c", "out_c"))
            .add_arc(Arc::new("t_d", "out_d"))
            .mark_initial("in_a", 1)
            .mark_initial("in_b", 1);
        let net = builder.build().unwrap();
        let projection = project(&net).unwrap();
        assert_eq!(projection.dag.edges.len(), 4);
    }

    #[test]
    fn inhibitor_inputs_do_not_create_edges() {
        let mut builder = NetBuilder::new();
        builder
            .add_place(Place::new("p_in", "in"))
            .add_place(Place::new("p_flag", "flag"))
            .add_place(Place::new("p_out", "out"))
            .add_place(Place::new("p_end", "end"))
            .add_transition(Transition::new("t_set", "set flag"))
            .add_transition(Transition::new("t_go", "go unless flagged"))
            .add_arc(Arc::new("p_in", "t_set"))
            .add_arc(Arc::new("t_set", "p_flag"))
            .add_arc(Arc::new("p_out", "t_go"))
            .add_arc(Arc::new("p_flag", "t_go").with_kind(petrigraph_net::ArcKind::Inhibitor))
            .add_arc(Arc::new("t_go", "p_end"))
            .mark_initial("p_in", 1)
            .mark_initial("p_out", 1);
        let net = builder.build().unwrap();
        let projection = project(&net).unwrap();
        // The inhibitor relationship between t_set and t_go is absence,
        // not sequencing.
        assert!(projection.dag.edges.is_empty());
    }
}
