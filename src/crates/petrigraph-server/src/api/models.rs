//! Request and response DTOs.

use petrigraph_analysis::{SimulatorConfig, ValidatorConfig, Verdict};
use petrigraph_dag::{ProjectionNote, TaskDag};
use petrigraph_grammar::BuildNote;
use serde::{Deserialize, Serialize};

/// `POST /build` input: either a structured intent spec or a workflow
/// YAML document to import. Exactly one must be present. The intent is
/// taken as raw JSON here so that intent-level problems surface as
/// PARSE_ERROR rather than a generic invalid request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildRequest {
    #[serde(default)]
    pub intent: Option<serde_json::Value>,
    #[serde(default)]
    pub workflow_yaml: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    pub schema_version: String,
    /// The compiled net in canonical form.
    pub net: serde_json::Value,
    pub notes: Vec<BuildNote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidateRequest {
    pub net: serde_json::Value,
    #[serde(default)]
    pub config: Option<ValidatorConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub schema_version: String,
    pub verdict: Verdict,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulateRequest {
    pub net: serde_json::Value,
    #[serde(default)]
    pub config: Option<SimulatorConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub schema_version: String,
    #[serde(flatten)]
    pub outcome: petrigraph_analysis::SimulationOutcome,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DagRequest {
    pub net: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DagResponse {
    pub schema_version: String,
    pub dag: TaskDag,
    pub notes: Vec<ProjectionNote>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub schema_version: String,
    pub uptime_ms: u64,
    pub components: ComponentHealth,
}

/// Per-component liveness. The core components are in-process and pure,
/// so their health is a compile-time fact; the field exists for parity
/// with deployments that split them out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub grammar: &'static str,
    pub validator: &'static str,
    pub simulator: &'static str,
    pub projector: &'static str,
    pub executor: &'static str,
}

impl Default for ComponentHealth {
    fn default() -> Self {
        Self {
            grammar: "ok",
            validator: "ok",
            simulator: "ok",
            projector: "ok",
            executor: "ok",
        }
    }
}
