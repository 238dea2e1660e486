//! Intent specification: the contract consumed by the compiler.
//!
//! An intent is an ordered list of steps, each with a kind, optional
//! dependencies on earlier steps, an optional guard and a closed
//! metadata schema. Unknown step kinds and unknown metadata keys are
//! parse errors, never silently carried along.

use crate::error::{GrammarError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Step kinds recognized by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Action,
    Choice,
    Parallel,
    Sync,
    Loop,
    Error,
    Compensation,
    Timer,
}

/// One guarded alternative of a choice step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChoicePath {
    /// Suffix for the generated transition name.
    pub name: String,
    /// Guard expression for this path. Paths are expected to be
    /// pairwise disjoint; the grammar does not verify disjointness
    /// (guards are opaque) but the validator will expose overlaps as
    /// extra reachable branches.
    pub guard: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_ref: Option<String>,
}

/// Retry policy requested for a step, carried through projection to the
/// executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetrySpec {
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_initial_delay() -> u64 {
    500
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> u64 {
    30_000
}

/// Closed per-step metadata. Which fields are meaningful depends on the
/// step kind; the compiler rejects kind/metadata mismatches it cannot
/// compile (e.g. a parallel step with no branches).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepMetadata {
    /// Choice: the guarded paths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<ChoicePath>,
    /// Parallel: step ids of the branch heads, in branch order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
    /// Sync: id of the parallel step being joined. Optional; when
    /// absent the compiler resolves the sole parallel among the sync's
    /// transitive dependencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_target: Option<String>,
    /// Loop: continuation condition (guard on the back edge).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Loop: step id where iteration re-enters. Defaults to the loop's
    /// first dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    /// Error: step ids whose error outcome routes into this handler.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handles: Vec<String>,
    /// Compensation: step ids to reverse, in declared (reverse) order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compensates: Vec<String>,
    /// Timer: delay before the action, recorded for the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    /// Matrix fan-out declared by the original workflow, recorded
    /// verbatim for downstream tooling.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub matrix: BTreeMap<String, Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySpec>,
    /// Override for the dispatched action reference; defaults to the
    /// step id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_ref: Option<String>,
}

/// A single workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntentStep {
    pub id: String,
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "StepMetadata::is_empty")]
    pub metadata: StepMetadata,
}

impl StepMetadata {
    pub fn is_empty(&self) -> bool {
        self == &StepMetadata::default()
    }
}

impl IntentStep {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            description: String::new(),
            dependencies: Vec::new(),
            guard: None,
            timeout_ms: None,
            metadata: StepMetadata::default(),
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn with_metadata(mut self, metadata: StepMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The full intent specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntentSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// The natural-language or YAML source this intent was derived
    /// from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<String>,
    pub steps: Vec<IntentStep>,
}

impl IntentSpec {
    pub fn new(name: impl Into<String>, steps: Vec<IntentStep>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            original_prompt: None,
            steps,
        }
    }

    pub fn step(&self, id: &str) -> Option<&IntentStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Parse from JSON. Unknown step kinds and unknown fields fail here.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GrammarError::Parse {
            message: e.to_string(),
        })
    }

    /// Check the intent for grammar conflicts without compiling it:
    /// emptiness, duplicate ids, unknown dependencies, dependency
    /// cycles, then per-kind shape rules.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(GrammarError::EmptyIntent);
        }

        let mut ids: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(GrammarError::DuplicateStepId {
                    id: step.id.clone(),
                });
            }
        }

        for step in &self.steps {
            for dependency in &step.dependencies {
                if !ids.contains(dependency.as_str()) {
                    return Err(GrammarError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.find_dependency_cycle() {
            return Err(GrammarError::DependencyCycle { cycle });
        }

        for step in &self.steps {
            match step.kind {
                StepKind::Choice if step.metadata.paths.is_empty() => {
                    return Err(GrammarError::ChoiceWithoutPaths {
                        step: step.id.clone(),
                    });
                }
                StepKind::Parallel if step.metadata.branches.is_empty() => {
                    return Err(GrammarError::ParallelWithoutBranches {
                        step: step.id.clone(),
                    });
                }
                StepKind::Loop if step.metadata.condition.is_none() => {
                    return Err(GrammarError::LoopWithoutCondition {
                        step: step.id.clone(),
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Locate a cycle in the dependency graph, if any, and return it as
    /// a closed path (first id repeated last). Declared loops live in
    /// loop metadata, not in dependencies, so they never trip this.
    fn find_dependency_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let deps: HashMap<&str, &[String]> = self
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s.dependencies.as_slice()))
            .collect();
        let mut colors: HashMap<&str, Color> =
            self.steps.iter().map(|s| (s.id.as_str(), Color::White)).collect();
        let mut stack: Vec<&str> = Vec::new();

        fn visit<'a>(
            node: &'a str,
            deps: &HashMap<&'a str, &'a [String]>,
            colors: &mut HashMap<&'a str, Color>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            colors.insert(node, Color::Gray);
            stack.push(node);
            if let Some(node_deps) = deps.get(node) {
                for dependency in node_deps.iter() {
                    match colors.get(dependency.as_str()) {
                        Some(Color::Gray) => {
                            // Found a back edge; slice the cycle out of the stack.
                            let start = stack
                                .iter()
                                .position(|&n| n == dependency.as_str())
                                .unwrap_or(0);
                            let mut cycle: Vec<String> =
                                stack[start..].iter().map(|s| s.to_string()).collect();
                            cycle.push(dependency.clone());
                            return Some(cycle);
                        }
                        Some(Color::White) => {
                            if let Some(cycle) =
                                visit(dependency.as_str(), deps, colors, stack)
                            {
                                return Some(cycle);
                            }
                        }
                        _ => {}
                    }
                }
            }
            stack.pop();
            colors.insert(node, Color::Black);
            None
        }

        for step in &self.steps {
            if colors[step.id.as_str()] == Color::White {
                if let Some(cycle) = visit(step.id.as_str(), &deps, &mut colors, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}
