//! Guard expression evaluation seam.
//!
//! Guards are opaque strings attached to transitions. The core never
//! interprets them itself; it hands the expression and a read-only
//! [`GuardContext`] to an injected [`GuardEvaluator`]. Production wiring
//! plugs in a real expression engine; tests and the default pipeline use
//! [`DefaultGuardEvaluator`], which understands just enough syntax to
//! drive choice branches.

use crate::marking::Marking;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// What a guard may observe: the current marking and the net metadata.
/// Guards must be side-effect-free over this context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardContext<'a> {
    pub marking: &'a Marking,
    pub metadata: &'a BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("cannot evaluate guard expression '{expr}': {message}")]
    Evaluation { expr: String, message: String },
}

/// Side-effect-free evaluator for guard expressions.
pub trait GuardEvaluator: Send + Sync {
    fn evaluate(&self, expr: &str, ctx: &GuardContext<'_>) -> Result<bool, GuardError>;
}

/// Minimal evaluator for the expressions the grammar compiler emits.
///
/// Supported forms:
/// - `true` / `false` literals (case-insensitive)
/// - `!expr` negation
/// - a bare key, looked up in the net metadata and interpreted truthily
///   (boolean value, nonzero number, nonempty string)
/// - a place id, interpreted as "holds at least one token"
///
/// Anything else is an evaluation error, surfaced to callers as a typed
/// failure rather than a silent default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGuardEvaluator;

impl GuardEvaluator for DefaultGuardEvaluator {
    fn evaluate(&self, expr: &str, ctx: &GuardContext<'_>) -> Result<bool, GuardError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Ok(true);
        }
        if let Some(inner) = trimmed.strip_prefix('!') {
            return self.evaluate(inner, ctx).map(|value| !value);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => return Ok(true),
            "false" => return Ok(false),
            _ => {}
        }
        if let Some(value) = lookup(ctx.metadata, trimmed) {
            return Ok(truthy(value));
        }
        if ctx.marking.get(trimmed) > 0 {
            return Ok(true);
        }
        // Unknown identifiers evaluate false rather than erroring so that
        // disjoint choice guards (e.g. "pass" / "fail") stay disjoint
        // until the deciding metadata arrives.
        if is_identifier(trimmed) {
            return Ok(false);
        }
        Err(GuardError::Evaluation {
            expr: expr.to_string(),
            message: "unsupported expression syntax".to_string(),
        })
    }
}

/// Evaluator that treats every guard as satisfied. Useful for analyses
/// that should explore all branches regardless of guard values.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveGuardEvaluator;

impl GuardEvaluator for PermissiveGuardEvaluator {
    fn evaluate(&self, _expr: &str, _ctx: &GuardContext<'_>) -> Result<bool, GuardError> {
        Ok(true)
    }
}

fn lookup<'a>(
    metadata: &'a BTreeMap<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut segments = path.split('.');
    let mut current = metadata.get(segments.next()?)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Null => false,
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

fn is_identifier(expr: &str) -> bool {
    !expr.is_empty()
        && expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}
