//! Whole-pipeline tests: intent -> net -> verdict -> trace -> dag ->
//! execution, with every stage consuming the previous one's product.

use async_trait::async_trait;
use petrigraph_analysis::{
    SimulationStatus, Simulator, SimulatorConfig, Validator, ValidatorConfig,
};
use petrigraph_dag::{
    project, ActionDispatcher, DagExecutor, ExecutorConfig, NodeResult, NodeStatus,
};
use petrigraph_grammar::{compile, ChoicePath, IntentSpec, IntentStep, StepKind, StepMetadata};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn action(id: &str) -> IntentStep {
    IntentStep::new(id, StepKind::Action)
}

/// "run tests; if pass deploy; if fail alert"
fn devops_intent() -> IntentSpec {
    IntentSpec::new(
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
                            action_ref: Some("deploy".into()),
                        },
                        ChoicePath {
                            name: "alert".into(),
                            guard: "!tests_passed".into(),
                            action_ref: Some("alert".into()),
                        },
                    ],
                    ..Default::default()
                }),
        ],
    )
}

/// "warm-up, then pass and shoot in parallel, then cooldown"
fn football_intent() -> IntentSpec {
    IntentSpec::new(
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
    )
}

/// Records which nodes ran; succeeds everything with fixed outputs.
struct RecordingDispatcher {
    outputs: BTreeMap<String, serde_json::Value>,
    ran: std::sync::Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    fn new() -> Self {
        Self {
            outputs: BTreeMap::new(),
            ran: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn with_output(mut self, node_id: &str, value: serde_json::Value) -> Self {
        self.outputs.insert(node_id.to_string(), value);
        self
    }
}

#[async_trait]
impl ActionDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        node_id: &str,
        _action_ref: Option<&str>,
        _inputs: serde_json::Value,
        _cancel: CancellationToken,
    ) -> NodeResult {
        self.ran.lock().unwrap().push(node_id.to_string());
        NodeResult::succeeded(self.outputs.get(node_id).cloned())
    }
}

#[test]
fn devops_pipeline_builds_validates_and_simulates() {
    let product = compile(&devops_intent()).unwrap();
    let net = product.net;
    assert!(net.places.len() >= 4);
    assert!(net.transitions.len() >= 3);
    assert_eq!(net.initial_marking.total_tokens(), 1);

    let verdict = Validator::new(ValidatorConfig::default()).validate(&net);
    assert!(verdict.is_pass(), "expected PASS, got {verdict}");

    // Deterministic simulation resolves the choice one way only.
    let mut with_outcome = net.clone();
    with_outcome
        .metadata
        .context
        .insert("tests_passed".to_string(), serde_json::json!(false));
    let outcome = Simulator::new(SimulatorConfig::default())
        .run(&with_outcome)
        .unwrap();
    assert_eq!(outcome.status, SimulationStatus::Completed);
    let fired: Vec<&str> = outcome
        .trace
        .iter()
        .map(|e| e.transition_id.as_str())
        .collect();
    assert_eq!(fired[0], "t_run_tests");
    let choices = fired
        .iter()
        .filter(|t| **t == "t_gate_0" || **t == "t_gate_1")
        .count();
    assert_eq!(choices, 1, "exactly one of deploy/alert fires");

    let projection = project(&net).unwrap();
    assert_eq!(projection.dag.nodes.len(), 3);
    assert_eq!(projection.dag.edges.len(), 2);
}

#[tokio::test]
async fn devops_execution_takes_the_deploy_branch() {
    let net = compile(&devops_intent()).unwrap().net;
    let dag = project(&net).unwrap().dag;

    let dispatcher = Arc::new(
        RecordingDispatcher::new()
            .with_output("t_run_tests", serde_json::json!({"tests_passed": true})),
    );
    let executor = DagExecutor::new(ExecutorConfig::default(), dispatcher.clone());
    let report = executor.run(&dag).await.unwrap();

    assert_eq!(report.results["t_run_tests"].status, NodeStatus::Succeeded);
    assert_eq!(report.results["t_gate_0"].status, NodeStatus::Succeeded);
    assert_eq!(report.results["t_gate_1"].status, NodeStatus::Skipped);
    let ran = dispatcher.ran.lock().unwrap();
    assert!(!ran.contains(&"t_gate_1".to_string()));
}

#[test]
fn football_pipeline_has_a_fork_join_diamond() {
    let net = compile(&football_intent()).unwrap().net;
    let verdict = Validator::new(ValidatorConfig::default()).validate(&net);
    assert!(verdict.is_pass(), "expected PASS, got {verdict}");

    let outcome = Simulator::new(SimulatorConfig::default()).run(&net).unwrap();
    assert_eq!(outcome.status, SimulationStatus::Completed);
    assert!(outcome.trace.len() >= 4);
    let fired: Vec<&str> = outcome
        .trace
        .iter()
        .map(|e| e.transition_id.as_str())
        .collect();
    let position = |id: &str| fired.iter().position(|t| *t == id).unwrap();
    assert!(position("t_pass_practice") < position("t_cooldown"));
    assert!(position("t_shoot_practice") < position("t_cooldown"));

    let dag = project(&net).unwrap().dag;
    // warm_up -> fork -> two branches -> join -> cooldown.
    assert_eq!(dag.roots().len(), 1);
    let order = dag.topological_order().unwrap();
    assert_eq!(order.first().map(String::as_str), Some("t_warm_up"));
    assert_eq!(order.last().map(String::as_str), Some("t_cooldown"));
}

#[tokio::test]
async fn football_execution_completes_every_node() {
    let net = compile(&football_intent()).unwrap().net;
    let dag = project(&net).unwrap().dag;
    let executor = DagExecutor::new(
        ExecutorConfig::default(),
        Arc::new(RecordingDispatcher::new()),
    );
    let report = executor.run(&dag).await.unwrap();
    assert_eq!(report.summary.succeeded, dag.nodes.len());
    assert_eq!(report.summary.failed + report.summary.cancelled, 0);
}

#[test]
fn canonical_json_is_reproducible_across_compiles() {
    let first = compile(&football_intent()).unwrap().net;
    let second = compile(&football_intent()).unwrap().net;
    assert_eq!(
        first.to_canonical_json().unwrap(),
        second.to_canonical_json().unwrap()
    );
}
