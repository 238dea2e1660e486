//! Workflow-YAML import.
//!
//! Converts a GitHub-Actions-style workflow document into an
//! [`IntentSpec`]: each job becomes an `Action` step whose `needs`
//! entries become dependencies. Job keys are read into a `BTreeMap`, so
//! the derived step order (and therefore the compiled net) is
//! deterministic regardless of document order. Dangling or cyclic
//! `needs` references are reported by the regular intent validation.

use crate::error::{GrammarError, Result};
use crate::intent::{IntentSpec, IntentStep, StepKind, StepMetadata};
use serde::Deserialize;
use std::collections::BTreeMap;

/// The subset of a workflow document the grammar cares about. Unknown
/// keys (runners, env, concrete shell steps) are intentionally ignored;
/// they belong to the executing system, not to the control flow.
#[derive(Debug, Deserialize)]
struct WorkflowDoc {
    #[serde(default)]
    name: Option<String>,
    jobs: BTreeMap<String, WorkflowJob>,
}

#[derive(Debug, Deserialize)]
struct WorkflowJob {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    needs: Needs,
    #[serde(default, rename = "if")]
    condition: Option<String>,
    #[serde(default, rename = "timeout-minutes")]
    timeout_minutes: Option<u64>,
    #[serde(default)]
    strategy: Option<Strategy>,
}

#[derive(Debug, Deserialize)]
struct Strategy {
    #[serde(default)]
    matrix: BTreeMap<String, Vec<serde_json::Value>>,
}

/// `needs` accepts either a single job id or a list.
#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum Needs {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl Needs {
    fn into_vec(self) -> Vec<String> {
        match self {
            Needs::None => Vec::new(),
            Needs::One(id) => vec![id],
            Needs::Many(ids) => ids,
        }
    }
}

/// Parse a workflow YAML document into an intent specification.
///
/// The result still has to pass [`IntentSpec::validate`] (the compiler
/// runs it); this function only fails on malformed YAML.
pub fn intent_from_workflow_yaml(yaml: &str) -> Result<IntentSpec> {
    let doc: WorkflowDoc = serde_yaml::from_str(yaml).map_err(|e| GrammarError::Parse {
        message: format!("invalid workflow yaml: {e}"),
    })?;
    if doc.jobs.is_empty() {
        return Err(GrammarError::EmptyIntent);
    }

    let steps = doc
        .jobs
        .into_iter()
        .map(|(id, job)| {
            let mut step = IntentStep::new(id, StepKind::Action);
            step.description = job.name.unwrap_or_default();
            step.dependencies = job.needs.into_vec();
            step.guard = job.condition;
            step.timeout_ms = job.timeout_minutes.map(|minutes| minutes * 60_000);
            if let Some(strategy) = job.strategy {
                if !strategy.matrix.is_empty() {
                    step.metadata = StepMetadata {
                        matrix: strategy.matrix,
                        ..Default::default()
                    };
                }
            }
            step
        })
        .collect();

    let mut intent = IntentSpec::new(
        doc.name.unwrap_or_else(|| "workflow".to_string()),
        steps,
    );
    intent.original_prompt = Some(yaml.to_string());
    Ok(intent)
}
