//! Endpoint handlers. Each one parses its own body from JSON so that
//! malformed requests land in the error envelope instead of axum's
//! default rejection.

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    BuildRequest, BuildResponse, ComponentHealth, DagRequest, DagResponse, HealthResponse,
    SimulateRequest, SimulateResponse, ValidateRequest, ValidateResponse,
};
use crate::api::routes::AppState;
use axum::extract::State;
use axum::Json;
use petrigraph_analysis::{SimulationStatus, Simulator, Validator, Verdict};
use petrigraph_grammar::{compile, intent_from_workflow_yaml, IntentSpec};
use petrigraph_net::{PetriNet, SCHEMA_VERSION};

fn parse_body<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> ApiResult<T> {
    serde_json::from_value(body).map_err(|e| ApiError::InvalidInput(e.to_string()))
}

/// Nets arrive unvalidated on purpose: the validator reports structural
/// problems as a FAIL verdict, which is a 200-level analysis result.
fn parse_net(net: serde_json::Value) -> ApiResult<PetriNet> {
    serde_json::from_value(net).map_err(|e| ApiError::InvalidInput(format!("net: {e}")))
}

/// POST /build
pub async fn build(Json(body): Json<serde_json::Value>) -> ApiResult<Json<BuildResponse>> {
    let request: BuildRequest = parse_body(body)?;
    let intent = match (request.intent, request.workflow_yaml) {
        (Some(raw), None) => serde_json::from_value::<IntentSpec>(raw)
            .map_err(|e| ApiError::ParseError(e.to_string()))?,
        (None, Some(yaml)) => intent_from_workflow_yaml(&yaml)?,
        (Some(_), Some(_)) => {
            return Err(ApiError::InvalidInput(
                "provide either 'intent' or 'workflowYaml', not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(ApiError::InvalidInput(
                "one of 'intent' or 'workflowYaml' is required".to_string(),
            ))
        }
    };

    let product = compile(&intent)?;
    let net = product
        .net
        .to_canonical_value()
        .map_err(|e| ApiError::EngineError(e.to_string()))?;
    tracing::info!(
        intent = %intent.name,
        places = product.net.places.len(),
        transitions = product.net.transitions.len(),
        "built net"
    );
    Ok(Json(BuildResponse {
        schema_version: SCHEMA_VERSION.to_string(),
        net,
        notes: product.notes,
    }))
}

/// POST /validate
pub async fn validate(Json(body): Json<serde_json::Value>) -> ApiResult<Json<ValidateResponse>> {
    let request: ValidateRequest = parse_body(body)?;
    let net = parse_net(request.net)?;
    let config = request.config.unwrap_or_default();

    let verdict = tokio::task::spawn_blocking(move || {
        Validator::new(config).validate(&net)
    })
    .await
    .map_err(|e| ApiError::EngineError(format!("validator task failed: {e}")))?;

    if let Verdict::Inconclusive { reason, stats } = &verdict {
        return Err(ApiError::ValidationInconclusive {
            reason: *reason,
            stats: stats.clone(),
        });
    }
    tracing::info!(verdict = %verdict, "validation finished");
    Ok(Json(ValidateResponse {
        schema_version: SCHEMA_VERSION.to_string(),
        verdict,
    }))
}

/// POST /simulate
pub async fn simulate(Json(body): Json<serde_json::Value>) -> ApiResult<Json<SimulateResponse>> {
    let request: SimulateRequest = parse_body(body)?;
    let net = parse_net(request.net)?;
    net.validate_structure()
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    let config = request.config.unwrap_or_default();
    config
        .validate()
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let outcome = tokio::task::spawn_blocking(move || Simulator::new(config).run(&net))
        .await
        .map_err(|e| ApiError::EngineError(format!("simulator task failed: {e}")))?
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    if let SimulationStatus::Error {
        message,
        transition_id,
    } = &outcome.status
    {
        return Err(ApiError::SimulationError {
            message: message.clone(),
            transition_id: transition_id.clone(),
        });
    }
    tracing::info!(steps = outcome.steps, "simulation finished");
    Ok(Json(SimulateResponse {
        schema_version: SCHEMA_VERSION.to_string(),
        outcome,
    }))
}

/// POST /dag
pub async fn dag(Json(body): Json<serde_json::Value>) -> ApiResult<Json<DagResponse>> {
    let request: DagRequest = parse_body(body)?;
    let net = parse_net(request.net)?;
    net.validate_structure()
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let projection = petrigraph_dag::project(&net)
        .map_err(|e| ApiError::DagProjectionError(e.to_string()))?;
    tracing::info!(
        nodes = projection.dag.nodes.len(),
        edges = projection.dag.edges.len(),
        "projected dag"
    );
    Ok(Json(DagResponse {
        schema_version: SCHEMA_VERSION.to_string(),
        dag: projection.dag,
        notes: projection.notes,
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        schema_version: SCHEMA_VERSION.to_string(),
        uptime_ms: state.started.elapsed().as_millis() as u64,
        components: ComponentHealth::default(),
    })
}
