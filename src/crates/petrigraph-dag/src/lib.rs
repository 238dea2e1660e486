//! # petrigraph-dag - Projection and Execution
//!
//! The last two stages of the pipeline:
//!
//! - **Projection**: derive a transition-level task DAG from a verified
//!   net. Places are consumed into the edges; declared loop back-arcs
//!   are broken (and noted); the edge set is transitively reduced; each
//!   node carries cross-references back to the net elements and intent
//!   step that spawned it.
//! - **Execution**: run the projected DAG by delegating each node to an
//!   injected [`ActionDispatcher`], with a bounded concurrency cap,
//!   per-node retry policies with exponential backoff, per-node
//!   timeouts, fail-fast or independent-branch failure handling, and
//!   cooperative cancellation.
//!
//! The executor is the only component in the whole pipeline that spawns
//! tasks. Worker results flow back to the single scheduler loop over
//! one FIFO channel, so dependent nodes observe a happens-before edge
//! on their predecessors' outputs.
//!
//! ## Edge conditions
//!
//! An edge into a guarded transition carries that guard as its
//! condition. At run time the condition is evaluated against the
//! accumulated outputs of completed nodes; a false condition prunes the
//! target subtree (`SKIPPED`) unless the target remains reachable
//! through some other satisfied edge.

pub mod dag;
pub mod error;
pub mod executor;
pub mod projection;

pub use dag::{DagEdge, DagNode, ProjectionNote, TaskDag};
pub use error::{ExecutorError, ProjectionError};
pub use executor::dispatcher::{ActionDispatcher, NodeResult, NodeStatus};
pub use executor::retry::RetryPolicy;
pub use executor::{DagExecutor, ExecutorConfig, RunReport, RunSummary};
pub use projection::{project, Projection};
