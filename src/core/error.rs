use thiserror::Error;

/// The error type carried by node work, capabilities and batch work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node '{0}' already exists in the graph")]
    DuplicateNode(String),

    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("Graph has no nodes")]
    EmptyGraph,

    #[error("Graph has no source node: every node has at least one incoming edge")]
    NoSourceNode,

    #[error("Graph has no sink node: every node has at least one outgoing edge")]
    NoSinkNode,

    #[error("Cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("Node '{node}' failed and starves its dependents [{}]: {source}", .dependents.join(", "))]
    NodeFailed {
        node: String,
        dependents: Vec<String>,
        #[source]
        source: BoxError,
    },

    /// The graph's only sink failed.
    ///
    /// A sink has no dependents, so its failure alone does not stop the run:
    /// the remaining nodes still execute. With a single sink there is nothing
    /// left to return, and the otherwise non-fatal failure surfaces here once
    /// the run finishes. Graphs with several sinks instead return the
    /// surviving results and list the failure in `GraphRun::failures`.
    #[error("Sink node '{node}' failed, no result to return: {message}")]
    SinkFailed { node: String, message: String },

    #[error("Graph run cancelled before node '{node}' completed")]
    Cancelled { node: String },
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid batch options: {0}")]
    InvalidOptions(String),

    #[error(
        "{failed} of {total} items failed (more than half); first failure in batch {batch_index}: {message}"
    )]
    TooManyFailures {
        failed: usize,
        total: usize,
        batch_index: usize,
        message: String,
    },
}
