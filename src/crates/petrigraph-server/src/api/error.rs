//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use petrigraph_analysis::{InconclusiveReason, SearchStats};
use petrigraph_grammar::GrammarError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a handler can refuse with. The variants mirror the wire
/// error codes one to one.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("build failed: {0}")]
    BuildError(String),

    /// Grammar conflict; carries the offending ids for the response.
    #[error("construction conflict: {message}")]
    ConstructionConflict {
        message: String,
        offending_ids: Vec<String>,
    },

    /// Budget-exhausted validation; the partial stats travel in the
    /// error details.
    #[error("validation inconclusive")]
    ValidationInconclusive {
        reason: InconclusiveReason,
        stats: SearchStats,
    },

    #[error("simulation error: {message}")]
    SimulationError {
        message: String,
        transition_id: Option<String>,
    },

    #[error("dag projection error: {0}")]
    DagProjectionError(String),

    #[error("engine error: {0}")]
    EngineError(String),
}

/// The wire envelope: `{schemaVersion, error: {code, message, details?}}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub schema_version: String,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::ParseError(_) => StatusCode::BAD_REQUEST,
            ApiError::ConstructionConflict { .. } => StatusCode::CONFLICT,
            ApiError::ValidationInconclusive { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BuildError(_)
            | ApiError::SimulationError { .. }
            | ApiError::DagProjectionError(_)
            | ApiError::EngineError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::ParseError(_) => "PARSE_ERROR",
            ApiError::BuildError(_) => "BUILD_ERROR",
            ApiError::ConstructionConflict { .. } => "CONSTRUCTION_CONFLICT",
            ApiError::ValidationInconclusive { .. } => "VALIDATION_INCONCLUSIVE",
            ApiError::SimulationError { .. } => "SIMULATION_ERROR",
            ApiError::DagProjectionError(_) => "DAG_PROJECTION_ERROR",
            ApiError::EngineError(_) => "ENGINE_ERROR",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::ConstructionConflict { offending_ids, .. } => {
                Some(serde_json::json!({ "offendingIds": offending_ids }))
            }
            ApiError::ValidationInconclusive { reason, stats } => Some(serde_json::json!({
                "reason": inconclusive_code(*reason),
                "stats": stats,
            })),
            ApiError::SimulationError { transition_id, .. } => transition_id
                .as_ref()
                .map(|id| serde_json::json!({ "transitionId": id })),
            _ => None,
        }
    }
}

/// The two budget variants stay distinguishable on the wire.
fn inconclusive_code(reason: InconclusiveReason) -> &'static str {
    match reason {
        InconclusiveReason::KBoundExhausted => "INCONCLUSIVE_BOUND",
        InconclusiveReason::Timeout => "INCONCLUSIVE_TIMEOUT",
        InconclusiveReason::Cancelled => "INCONCLUSIVE_CANCELLED",
    }
}

impl From<GrammarError> for ApiError {
    fn from(error: GrammarError) -> Self {
        if error.is_conflict() {
            ApiError::ConstructionConflict {
                offending_ids: error.offending_ids(),
                message: error.to_string(),
            }
        } else {
            match error {
                GrammarError::Parse { message } => ApiError::ParseError(message),
                other => ApiError::BuildError(other.to_string()),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = ErrorEnvelope {
            schema_version: petrigraph_net::SCHEMA_VERSION.to_string(),
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        tracing::debug!(code = envelope.error.code, status = %status, "request refused");
        (status, Json(envelope)).into_response()
    }
}
