//! Bounded-concurrency DAG execution.
//!
//! One scheduler loop owns all run state. Ready nodes are handed to
//! spawned workers (at most `max_concurrency` in flight); workers push
//! their results back over a single FIFO channel, so every dependent
//! node observes its predecessors' outputs happens-before it starts.
//!
//! Readiness follows the edge rules: an edge is *satisfied* when its
//! source succeeded and its condition (if any) evaluates true against
//! the accumulated outputs; *void* when its source was skipped or the
//! condition was false; *poisoned* when its source failed, timed out or
//! was cancelled. A node with a poisoned edge is cancelled, a node with
//! no satisfied edge (but incoming edges) is skipped, and a node with
//! at least one satisfied edge and nothing unresolved becomes ready.

pub mod dispatcher;
pub mod retry;

use crate::dag::{DagEdge, DagNode, TaskDag};
use crate::error::ExecutorError;
use petrigraph_net::{DefaultGuardEvaluator, GuardContext, GuardEvaluator, Marking};
use self::dispatcher::{ActionDispatcher, NodeResult, NodeStatus};
use self::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Maximum nodes in `Running` at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Cancel everything on the first unrecoverable failure. When
    /// false, independent branches run to completion and only the
    /// failed node's dependents are cancelled.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
    /// Policy for nodes that declare none of their own.
    #[serde(default)]
    pub default_retry: RetryPolicy,
    /// Timeout for nodes that declare none of their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,
}

fn default_max_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_fail_fast() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            fail_fast: default_fail_fast(),
            default_retry: RetryPolicy::default(),
            default_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_nodes: usize,
    pub succeeded: usize,
    /// Includes timeouts: a node that ran out of attempts on timeouts
    /// failed all the same.
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub wall_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: uuid::Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub results: BTreeMap<String, NodeResult>,
    pub summary: RunSummary,
}

/// Runs a projected DAG against an injected dispatcher.
pub struct DagExecutor {
    config: ExecutorConfig,
    dispatcher: Arc<dyn ActionDispatcher>,
}

enum EdgeClass {
    Unresolved,
    Satisfied,
    Void,
    Poisoned,
}

impl DagExecutor {
    pub fn new(config: ExecutorConfig, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    pub async fn run(&self, dag: &TaskDag) -> Result<RunReport, ExecutorError> {
        self.run_with_cancel(dag, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        dag: &TaskDag,
        cancel: CancellationToken,
    ) -> Result<RunReport, ExecutorError> {
        let run_id = uuid::Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let started = Instant::now();
        tracing::info!(%run_id, nodes = dag.nodes.len(), "executing dag");

        let worker_cancel = cancel.child_token();
        let mut states: HashMap<String, NodeStatus> = dag
            .nodes
            .iter()
            .map(|n| (n.id.clone(), NodeStatus::Pending))
            .collect();
        let mut results: BTreeMap<String, NodeResult> = BTreeMap::new();
        let mut outputs: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        let mut running = 0usize;
        let (tx, mut rx) = mpsc::channel::<(String, NodeResult)>(dag.nodes.len().max(1));

        loop {
            if cancel.is_cancelled() {
                cancel_unstarted(&mut states, &mut results);
            } else {
                self.resolve_pending(dag, &mut states, &mut results, &outputs);
            }

            // Hand ready nodes to workers, up to the cap, in id order so
            // scheduling is reproducible.
            let mut ready: Vec<String> = states
                .iter()
                .filter(|(_, &status)| status == NodeStatus::Ready)
                .map(|(id, _)| id.clone())
                .collect();
            ready.sort_unstable();
            for node_id in ready {
                if running >= self.config.max_concurrency || cancel.is_cancelled() {
                    break;
                }
                let node = dag.node(&node_id).expect("states track dag nodes");
                states.insert(node_id.clone(), NodeStatus::Running);
                running += 1;
                self.spawn_worker(node, &outputs, tx.clone(), worker_cancel.clone());
            }

            if running == 0 {
                if states.values().all(|s| s.is_terminal()) {
                    break;
                }
                if cancel.is_cancelled() {
                    cancel_unstarted(&mut states, &mut results);
                    continue;
                }
                let pending = states.values().filter(|s| !s.is_terminal()).count();
                return Err(ExecutorError::Stalled { pending });
            }

            let received = tokio::select! {
                _ = cancel.cancelled(), if !cancel.is_cancelled() => None,
                message = rx.recv() => Some(message.ok_or(ExecutorError::ChannelClosed)?),
            };
            let Some((node_id, result)) = received else {
                continue;
            };
            running -= 1;
            tracing::debug!(node = %node_id, status = ?result.status, attempts = result.attempts, "node finished");

            if result.status == NodeStatus::Succeeded {
                merge_outputs(&mut outputs, &node_id, result.outputs.as_ref());
            }
            let unrecoverable = matches!(result.status, NodeStatus::Failed | NodeStatus::TimedOut);
            states.insert(node_id.clone(), result.status);
            results.insert(node_id, result);

            if unrecoverable && self.config.fail_fast {
                worker_cancel.cancel();
                cancel_unstarted(&mut states, &mut results);
            }
        }

        let summary = summarize(&results, dag.nodes.len(), started.elapsed());
        tracing::info!(
            %run_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "dag run finished"
        );
        Ok(RunReport {
            run_id,
            started_at,
            results,
            summary,
        })
    }

    /// Promote pending nodes whose incoming edges are all resolved.
    fn resolve_pending(
        &self,
        dag: &TaskDag,
        states: &mut HashMap<String, NodeStatus>,
        results: &mut BTreeMap<String, NodeResult>,
        outputs: &BTreeMap<String, serde_json::Value>,
    ) {
        // Iterate to a fixpoint: skipping a node can resolve its
        // dependents in the same pass.
        loop {
            let mut changed = false;
            for node in &dag.nodes {
                if states[&node.id] != NodeStatus::Pending {
                    continue;
                }
                let mut any_satisfied = false;
                let mut any_poisoned = false;
                let mut any_unresolved = false;
                let mut has_incoming = false;
                for edge in dag.incoming(&node.id) {
                    has_incoming = true;
                    match classify_edge(edge, states, outputs) {
                        EdgeClass::Unresolved => any_unresolved = true,
                        EdgeClass::Satisfied => any_satisfied = true,
                        EdgeClass::Void => {}
                        EdgeClass::Poisoned => any_poisoned = true,
                    }
                }
                let next = if any_poisoned {
                    Some(NodeStatus::Cancelled)
                } else if any_unresolved {
                    None
                } else if !has_incoming || any_satisfied {
                    Some(NodeStatus::Ready)
                } else {
                    Some(NodeStatus::Skipped)
                };
                if let Some(next) = next {
                    states.insert(node.id.clone(), next);
                    if next != NodeStatus::Ready {
                        results.insert(node.id.clone(), NodeResult::with_status(next));
                    }
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn spawn_worker(
        &self,
        node: &DagNode,
        outputs: &BTreeMap<String, serde_json::Value>,
        tx: mpsc::Sender<(String, NodeResult)>,
        cancel: CancellationToken,
    ) {
        let dispatcher = self.dispatcher.clone();
        let policy = node.retry.clone().unwrap_or_else(|| self.config.default_retry.clone());
        let timeout_ms = node.timeout_ms.or(self.config.default_timeout_ms);
        let delay_ms = node.delay_ms;
        let node_id = node.id.clone();
        let action_ref = node.action_ref.clone();
        let inputs = serde_json::json!({
            "nodeId": node.id,
            "stepId": node.step_id,
            "outputs": outputs,
        });
        tokio::spawn(async move {
            let result = run_node(
                dispatcher, &node_id, action_ref, inputs, policy, timeout_ms, delay_ms, cancel,
            )
            .await;
            // The scheduler may already be gone on external cancel.
            let _ = tx.send((node_id, result)).await;
        });
    }
}

fn cancel_unstarted(
    states: &mut HashMap<String, NodeStatus>,
    results: &mut BTreeMap<String, NodeResult>,
) {
    for (id, status) in states.iter_mut() {
        if matches!(status, NodeStatus::Pending | NodeStatus::Ready) {
            *status = NodeStatus::Cancelled;
            results.insert(id.clone(), NodeResult::with_status(NodeStatus::Cancelled));
        }
    }
}

fn classify_edge(
    edge: &DagEdge,
    states: &HashMap<String, NodeStatus>,
    outputs: &BTreeMap<String, serde_json::Value>,
) -> EdgeClass {
    match states.get(&edge.from).copied() {
        None => EdgeClass::Void,
        Some(NodeStatus::Succeeded) => match &edge.condition {
            None => EdgeClass::Satisfied,
            Some(expr) => {
                if condition_holds(expr, outputs) {
                    EdgeClass::Satisfied
                } else {
                    EdgeClass::Void
                }
            }
        },
        Some(NodeStatus::Skipped) => EdgeClass::Void,
        Some(NodeStatus::Failed | NodeStatus::TimedOut | NodeStatus::Cancelled) => {
            EdgeClass::Poisoned
        }
        Some(NodeStatus::Pending | NodeStatus::Ready | NodeStatus::Running) => {
            EdgeClass::Unresolved
        }
    }
}

/// Conditions reuse the guard syntax, evaluated against accumulated
/// outputs instead of a marking. An unevaluable condition gates closed.
fn condition_holds(expr: &str, outputs: &BTreeMap<String, serde_json::Value>) -> bool {
    let marking = Marking::new();
    let ctx = GuardContext {
        marking: &marking,
        metadata: outputs,
    };
    match DefaultGuardEvaluator.evaluate(expr, &ctx) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%error, "edge condition failed to evaluate; treating as false");
            false
        }
    }
}

fn merge_outputs(
    outputs: &mut BTreeMap<String, serde_json::Value>,
    node_id: &str,
    produced: Option<&serde_json::Value>,
) {
    let Some(produced) = produced else { return };
    // Keep the full payload under the node id and lift object fields to
    // the top level so conditions can reference them directly.
    outputs.insert(node_id.to_string(), produced.clone());
    if let serde_json::Value::Object(fields) = produced {
        for (key, value) in fields {
            outputs.insert(key.clone(), value.clone());
        }
    }
}

fn summarize(
    results: &BTreeMap<String, NodeResult>,
    total_nodes: usize,
    wall: Duration,
) -> RunSummary {
    let mut summary = RunSummary {
        total_nodes,
        wall_time_ms: wall.as_millis() as u64,
        ..RunSummary::default()
    };
    for result in results.values() {
        match result.status {
            NodeStatus::Succeeded => summary.succeeded += 1,
            NodeStatus::Failed | NodeStatus::TimedOut => summary.failed += 1,
            NodeStatus::Skipped => summary.skipped += 1,
            NodeStatus::Cancelled => summary.cancelled += 1,
            _ => {}
        }
    }
    summary
}

#[allow(clippy::too_many_arguments)]
async fn run_node(
    dispatcher: Arc<dyn ActionDispatcher>,
    node_id: &str,
    action_ref: Option<String>,
    inputs: serde_json::Value,
    policy: RetryPolicy,
    timeout_ms: Option<u64>,
    delay_ms: Option<u64>,
    cancel: CancellationToken,
) -> NodeResult {
    let started = Instant::now();

    // Timer nodes observe their declared delay first.
    if let Some(delay) = delay_ms {
        tokio::select! {
            _ = cancel.cancelled() => {
                return finalize(NodeResult::with_status(NodeStatus::Cancelled), 0, started);
            }
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
        }
    }

    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return finalize(NodeResult::with_status(NodeStatus::Cancelled), attempts, started);
        }
        attempts += 1;

        let attempt = dispatcher.dispatch(node_id, action_ref.as_deref(), inputs.clone(), cancel.clone());
        let result = match timeout_ms {
            Some(budget) => tokio::select! {
                _ = cancel.cancelled() => NodeResult::with_status(NodeStatus::Cancelled),
                outcome = tokio::time::timeout(Duration::from_millis(budget), attempt) => {
                    match outcome {
                        Ok(result) => result,
                        Err(_) => NodeResult {
                            status: NodeStatus::TimedOut,
                            outputs: None,
                            error_message: Some(format!("no result within {budget}ms")),
                            error_code: Some("TIMEOUT".to_string()),
                            duration_ms: 0,
                            attempts: 0,
                        },
                    }
                }
            },
            None => tokio::select! {
                _ = cancel.cancelled() => NodeResult::with_status(NodeStatus::Cancelled),
                result = attempt => result,
            },
        };

        match result.status {
            NodeStatus::Succeeded | NodeStatus::Cancelled | NodeStatus::Skipped => {
                return finalize(result, attempts, started);
            }
            NodeStatus::Failed | NodeStatus::TimedOut => {
                if !policy.should_retry(attempts) || cancel.is_cancelled() {
                    return finalize(result, attempts, started);
                }
                let delay = policy.delay_after(attempts);
                tracing::warn!(
                    node = node_id,
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "node attempt failed, backing off before retry"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return finalize(result, attempts, started);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            // A dispatcher returning a non-terminal status is a contract
            // violation; recover it into a failure.
            NodeStatus::Pending | NodeStatus::Ready | NodeStatus::Running => {
                let mut failed = result;
                failed.status = NodeStatus::Failed;
                failed.error_code = Some("BAD_DISPATCHER_STATUS".to_string());
                return finalize(failed, attempts, started);
            }
        }
    }
}

fn finalize(mut result: NodeResult, attempts: u32, started: Instant) -> NodeResult {
    result.attempts = attempts;
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}
