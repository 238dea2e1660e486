//! End-to-end API tests: status-code contract and the full
//! build -> validate -> simulate -> project pipeline over HTTP.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use petrigraph_server::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
    let response = create_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn devops_intent() -> Value {
    json!({
        "name": "devops",
        "description": "run tests; if pass deploy; if fail alert",
        "steps": [
            {"id": "run_tests", "kind": "ACTION"},
            {
                "id": "gate",
                "kind": "CHOICE",
                "dependencies": ["run_tests"],
                "metadata": {
                    "paths": [
                        {"name": "deploy", "guard": "tests_passed"},
                        {"name": "alert", "guard": "!tests_passed"}
                    ]
                }
            }
        ]
    })
}

#[tokio::test]
async fn build_compiles_the_devops_intent() {
    let (status, body) = post("/build", json!({"intent": devops_intent()})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schemaVersion"], "1");
    let net = &body["net"];
    assert!(net["places"].as_array().unwrap().len() >= 4);
    assert!(net["transitions"].as_array().unwrap().len() >= 3);
    assert!(!body["notes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn full_pipeline_over_http() {
    // Build.
    let (status, build) = post("/build", json!({"intent": devops_intent()})).await;
    assert_eq!(status, StatusCode::OK);
    let net = build["net"].clone();

    // Validate: PASS with a terminal witness.
    let (status, validate) = post("/validate", json!({"net": net})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(validate["verdict"]["status"], "PASS");
    assert!(validate["verdict"]["terminalWitness"]["firingSequence"]
        .as_array()
        .unwrap()
        .contains(&json!("t_run_tests")));

    // Simulate: exactly one of the two choice branches fires.
    let (status, simulate) = post("/simulate", json!({"net": net})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(simulate["status"], "COMPLETED");
    let fired: Vec<&str> = simulate["trace"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["transitionId"].as_str().unwrap())
        .collect();
    assert_eq!(fired[0], "t_run_tests");
    let choice_count = fired
        .iter()
        .filter(|t| **t == "t_gate_0" || **t == "t_gate_1")
        .count();
    assert_eq!(choice_count, 1);

    // Project: three transition nodes, two edges.
    let (status, dag) = post("/dag", json!({"net": net})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dag["dag"]["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(dag["dag"]["edges"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn build_rejects_missing_needs_target_as_conflict() {
    let yaml = "jobs:\n  deploy:\n    needs: build\n";
    let (status, body) = post("/build", json!({"workflowYaml": yaml})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONSTRUCTION_CONFLICT");
    let ids = body["error"]["details"]["offendingIds"].as_array().unwrap();
    assert!(ids.contains(&json!("deploy")));
    assert!(ids.contains(&json!("build")));
}

#[tokio::test]
async fn build_reports_needs_cycles_with_all_members() {
    let yaml = "jobs:\n  a:\n    needs: b\n  b:\n    needs: c\n  c:\n    needs: a\n";
    let (status, body) = post("/build", json!({"workflowYaml": yaml})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let ids = body["error"]["details"]["offendingIds"].as_array().unwrap();
    for member in ["a", "b", "c"] {
        assert!(ids.contains(&json!(member)), "cycle must name '{member}'");
    }
}

#[tokio::test]
async fn build_without_intent_or_yaml_is_invalid_input() {
    let (status, body) = post("/build", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn build_with_unknown_step_kind_is_a_parse_error() {
    let (status, body) = post(
        "/build",
        json!({"intent": {"name": "x", "steps": [{"id": "a", "kind": "TELEPORT"}]}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "PARSE_ERROR");
}

#[tokio::test]
async fn empty_intent_is_a_build_conflict() {
    let (status, body) = post("/build", json!({"intent": {"name": "x", "steps": []}})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONSTRUCTION_CONFLICT");
}

#[tokio::test]
async fn structurally_broken_net_fails_validation_with_200() {
    // An orphan transition with no input arc: a structural FAIL verdict
    // is still a successful analysis.
    let net = json!({
        "places": [{"id": "p1", "name": "a"}],
        "transitions": [{"id": "t1", "name": "orphan"}],
        "arcs": [{"source": "t1", "target": "p1"}],
        "initialMarking": {}
    });
    let (status, body) = post("/validate", json!({"net": net})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"]["status"], "FAIL");
    assert_eq!(body["verdict"]["kind"], "STRUCTURAL");
}

#[tokio::test]
async fn zero_k_bound_maps_to_422_with_bound_reason() {
    let (_, build) = post("/build", json!({"intent": devops_intent()})).await;
    let (status, body) = post(
        "/validate",
        json!({"net": build["net"], "config": {"kBound": 0}}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_INCONCLUSIVE");
    assert_eq!(body["error"]["details"]["reason"], "INCONCLUSIVE_BOUND");
    assert!(body["error"]["details"]["stats"].is_object());
}

#[tokio::test]
async fn deadlocked_net_fails_validation_with_witness_and_200() {
    // A fork whose join transition is missing: cooldown waits on a
    // place nothing feeds.
    let net = json!({
        "places": [
            {"id": "start", "name": "start"},
            {"id": "br_a", "name": "branch a"},
            {"id": "br_b", "name": "branch b"},
            {"id": "done_a", "name": "a done"},
            {"id": "done_b", "name": "b done"},
            {"id": "joined", "name": "joined"},
            {"id": "end", "name": "end", "kind": "SINK"}
        ],
        "transitions": [
            {"id": "t_fork", "name": "fork"},
            {"id": "t_a", "name": "a"},
            {"id": "t_b", "name": "b"},
            {"id": "t_cooldown", "name": "cooldown"}
        ],
        "arcs": [
            {"source": "start", "target": "t_fork"},
            {"source": "t_fork", "target": "br_a"},
            {"source": "t_fork", "target": "br_b"},
            {"source": "br_a", "target": "t_a"},
            {"source": "t_a", "target": "done_a"},
            {"source": "br_b", "target": "t_b"},
            {"source": "t_b", "target": "done_b"},
            {"source": "joined", "target": "t_cooldown"},
            {"source": "t_cooldown", "target": "end"}
        ],
        "initialMarking": {"start": 1}
    });
    let (status, body) = post("/validate", json!({"net": net})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"]["status"], "FAIL");
    assert_eq!(body["verdict"]["kind"], "DEADLOCK");
    let sequence = body["verdict"]["witness"]["firingSequence"].as_array().unwrap();
    assert!(sequence.contains(&json!("t_a")));
    assert!(sequence.contains(&json!("t_b")));
    assert!(!sequence.contains(&json!("t_cooldown")));
    // Both branches completed in the stalled marking.
    assert_eq!(body["verdict"]["witness"]["finalMarking"]["done_a"], 1);
    assert_eq!(body["verdict"]["witness"]["finalMarking"]["done_b"], 1);
}

#[tokio::test]
async fn random_simulation_without_seed_is_invalid_input() {
    let (_, build) = post("/build", json!({"intent": devops_intent()})).await;
    let (status, body) = post(
        "/simulate",
        json!({"net": build["net"], "config": {"mode": "RANDOM"}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn guard_engine_failure_maps_to_simulation_error() {
    let net = json!({
        "places": [
            {"id": "p1", "name": "in"},
            {"id": "p2", "name": "out", "kind": "SINK"}
        ],
        "transitions": [
            {"id": "t1", "name": "gated", "guard": "a && (b || c)"}
        ],
        "arcs": [
            {"source": "p1", "target": "t1"},
            {"source": "t1", "target": "p2"}
        ],
        "initialMarking": {"p1": 1}
    });
    let (status, body) = post("/simulate", json!({"net": net})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "SIMULATION_ERROR");
    assert_eq!(body["error"]["details"]["transitionId"], "t1");
}

#[tokio::test]
async fn undeclared_cycle_maps_to_projection_error() {
    let net = json!({
        "places": [
            {"id": "p1", "name": "a"},
            {"id": "p2", "name": "b"}
        ],
        "transitions": [
            {"id": "t1", "name": "fwd"},
            {"id": "t2", "name": "back"}
        ],
        "arcs": [
            {"source": "p1", "target": "t1"},
            {"source": "t1", "target": "p2"},
            {"source": "p2", "target": "t2"},
            {"source": "t2", "target": "p1"}
        ],
        "initialMarking": {"p1": 1}
    });
    let (status, body) = post("/dag", json!({"net": net})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "DAG_PROJECTION_ERROR");
}

#[tokio::test]
async fn health_reports_component_status() {
    let response = create_router()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["validator"], "ok");
}

#[tokio::test]
async fn canonical_net_bytes_are_stable_across_builds() {
    let (_, first) = post("/build", json!({"intent": devops_intent()})).await;
    let (_, second) = post("/build", json!({"intent": devops_intent()})).await;
    assert_eq!(
        serde_json::to_string(&first["net"]).unwrap(),
        serde_json::to_string(&second["net"]).unwrap()
    );
}
