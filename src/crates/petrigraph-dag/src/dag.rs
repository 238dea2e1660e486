//! The projected task graph.

use crate::executor::retry::RetryPolicy;
use petrigraph_net::TransitionKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// One executable node: a transition lifted out of the net, carrying
/// cross-references to the elements it straddled and the intent step it
/// came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagNode {
    /// The transition id this node was projected from.
    pub id: String,
    pub name: String,
    pub kind: TransitionKind,
    /// Originating intent step, when the net was compiled from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_ref: Option<String>,
    /// Input place ids the transition consumed from.
    pub input_places: Vec<String>,
    /// Output place ids the transition produced into.
    pub output_places: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Timer delay to observe before dispatching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

/// A sequencing edge. The condition, when present, is the guard of the
/// target transition and gates whether the target runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Notes emitted while projecting: what was dropped, broken or fanned
/// out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "note", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionNote {
    /// Edge removed by transitive reduction.
    EdgeReduced { from: String, to: String },
    /// Declared loop back-arc broken at projection time.
    LoopBroken { transition: String, place: String },
    /// A decision place whose choice surface became multiple outgoing
    /// edges.
    DecisionSurface {
        place: String,
        transitions: Vec<String>,
    },
}

/// An acyclic task graph ready for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskDag {
    pub nodes: Vec<DagNode>,
    pub edges: Vec<DagEdge>,
}

impl TaskDag {
    pub fn node(&self, id: &str) -> Option<&DagNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a DagEdge> + 'a {
        self.edges.iter().filter(move |e| e.to == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a DagEdge> + 'a {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Nodes with no incoming edges, in node order.
    pub fn roots(&self) -> Vec<&DagNode> {
        let targets: HashSet<&str> = self.edges.iter().map(|e| e.to.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(n.id.as_str()))
            .collect()
    }

    /// Kahn topological order. Returns the ids in a valid execution
    /// order, or the nodes stuck on a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        for edge in &self.edges {
            if let Some(degree) = in_degree.get_mut(edge.to.as_str()) {
                *degree += 1;
            }
        }
        let mut queue: VecDeque<&str> = {
            let mut roots: Vec<&str> = in_degree
                .iter()
                .filter(|(_, &degree)| degree == 0)
                .map(|(&id, _)| id)
                .collect();
            roots.sort_unstable();
            roots.into()
        };
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            order.push(current.to_string());
            let mut released: Vec<&str> = Vec::new();
            for edge in self.edges.iter().filter(|e| e.from == current) {
                if let Some(degree) = in_degree.get_mut(edge.to.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        released.push(edge.to.as_str());
                    }
                }
            }
            released.sort_unstable();
            queue.extend(released);
        }
        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            let mut stuck: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            stuck.sort_unstable();
            Err(stuck)
        }
    }

    /// Graphviz rendering of the task graph; conditional edges are
    /// dashed and labelled.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph task_dag {\n");
        output.push_str("    rankdir=TB;\n");
        output.push_str("    node [shape=box, style=rounded];\n");
        for node in &self.nodes {
            output.push_str(&format!(
                "    \"{}\" [label=\"{}\"];\n",
                node.id,
                node.name.replace('"', "\\\"")
            ));
        }
        for edge in &self.edges {
            match &edge.condition {
                Some(condition) => output.push_str(&format!(
                    "    \"{}\" -> \"{}\" [label=\"{}\", style=dashed];\n",
                    edge.from,
                    edge.to,
                    condition.replace('"', "\\\"")
                )),
                None => {
                    output.push_str(&format!("    \"{}\" -> \"{}\";\n", edge.from, edge.to))
                }
            }
        }
        output.push_str("}\n");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> DagNode {
        DagNode {
            id: id.to_string(),
            name: id.to_string(),
            kind: TransitionKind::Action,
            step_id: None,
            action_ref: None,
            input_places: vec![],
            output_places: vec![],
            timeout_ms: None,
            delay_ms: None,
            retry: None,
        }
    }

    fn edge(from: &str, to: &str) -> DagEdge {
        DagEdge {
            from: from.to_string(),
            to: to.to_string(),
            condition: None,
        }
    }

    #[test]
    fn topological_order_respects_edges() {
        let dag = TaskDag {
            nodes: vec![node("c"), node("a"), node("b")],
            edges: vec![edge("a", "b"), edge("b", "c")],
        };
        assert_eq!(dag.topological_order().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_reports_the_stuck_nodes() {
        let dag = TaskDag {
            nodes: vec![node("a"), node("b")],
            edges: vec![edge("a", "b"), edge("b", "a")],
        };
        assert_eq!(dag.topological_order().unwrap_err(), vec!["a", "b"]);
    }

    #[test]
    fn roots_are_nodes_without_incoming_edges() {
        let dag = TaskDag {
            nodes: vec![node("a"), node("b"), node("c")],
            edges: vec![edge("a", "c"), edge("b", "c")],
        };
        let roots: Vec<&str> = dag.roots().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, vec!["a", "b"]);
    }

    #[test]
    fn dot_marks_conditional_edges() {
        let mut dag = TaskDag {
            nodes: vec![node("a"), node("b")],
            edges: vec![edge("a", "b")],
        };
        dag.edges[0].condition = Some("approved".to_string());
        let dot = dag.to_dot();
        assert!(dot.contains("style=dashed"));
        assert!(dot.contains("approved"));
    }
}
