//! Projection and executor errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectionError {
    /// The projected graph still contains a cycle after breaking all
    /// declared loop back-arcs. The net encoded a loop the grammar
    /// never declared, which the projector refuses to guess about.
    #[error("projection is cyclic through [{}]; undeclared loop in the net", cycle.join(" -> "))]
    CyclicResult { cycle: Vec<String> },

    /// A loop back-arc references elements missing from the net.
    #[error("loop back-arc references unknown element '{0}'")]
    UnknownLoopElement(String),
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The scheduler stopped making progress with nodes still
    /// unresolved. Indicates a scheduling bug, not a workload failure;
    /// workload failures land in node results.
    #[error("scheduler stalled with {pending} unresolved node(s)")]
    Stalled { pending: usize },

    /// A worker's result channel closed before its result arrived.
    #[error("worker result channel closed unexpectedly")]
    ChannelClosed,
}
