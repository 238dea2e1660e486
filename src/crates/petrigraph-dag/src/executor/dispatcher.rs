//! The contract between the executor and the outside world.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Final state of a node. Transitions are monotonic; the only backward
/// move is the retry bookkeeping Running -> Failed -> Ready inside the
/// executor, which callers never observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    #[serde(rename = "TIMEOUT")]
    TimedOut,
    Cancelled,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Succeeded
                | NodeStatus::Failed
                | NodeStatus::TimedOut
                | NodeStatus::Cancelled
                | NodeStatus::Skipped
        )
    }
}

/// What one node produced, including the attempts spent on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub duration_ms: u64,
    pub attempts: u32,
}

impl NodeResult {
    pub fn succeeded(outputs: Option<serde_json::Value>) -> Self {
        Self {
            status: NodeStatus::Succeeded,
            outputs,
            error_message: None,
            error_code: None,
            duration_ms: 0,
            attempts: 0,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: NodeStatus::Failed,
            outputs: None,
            error_message: Some(message.into()),
            error_code: None,
            duration_ms: 0,
            attempts: 0,
        }
    }

    pub(crate) fn with_status(status: NodeStatus) -> Self {
        Self {
            status,
            outputs: None,
            error_message: None,
            error_code: None,
            duration_ms: 0,
            attempts: 0,
        }
    }
}

/// External side-effect runner injected into the executor. Dispatcher
/// failures are reported through the returned [`NodeResult`], never by
/// panicking; the executor recovers every result into its report. The
/// dispatcher is expected to honor the cancellation token it is given.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        node_id: &str,
        action_ref: Option<&str>,
        inputs: serde_json::Value,
        cancel: CancellationToken,
    ) -> NodeResult;
}
