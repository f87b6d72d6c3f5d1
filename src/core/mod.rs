pub mod batch;
pub mod error;
pub mod graph;
pub mod telemetry;
pub mod validation;

/// The value passed between nodes and plugin capabilities.
pub type NodeValue = serde_json::Value;
